//! Assembly of the fly, its terrain, actuators and sensors into a scene.

use flygym_ir::ModelDescription;

use crate::config::{ControlMode, EnvOptions, PhysicsConfig};
use crate::error::PhysicsError;
use crate::pose::{Pose, PoseLibrary};
use crate::sensors::SensorSet;
use crate::terrain::terrain_for;
use crate::world::{ActuatorHandle, HingeHandle, PhysicsWorld, WorldSnapshot};

/// Load and validate the bundled NeuroMechFly description.
pub fn bundled_model() -> Result<ModelDescription, PhysicsError> {
    let json = std::fs::read_to_string(flygym_ir::data::model_path())?;
    let model = ModelDescription::from_json(&json)?;
    model.validate()?;
    Ok(model)
}

/// An assembled simulation: world, active actuators, sensors and the
/// post-assembly baseline that `reset` returns to.
pub struct Scene {
    world: PhysicsWorld,
    root: String,
    actuated_joints: Vec<String>,
    controls: Vec<ActuatorHandle>,
    control_mode: ControlMode,
    joint_sensors: SensorSet,
    body_sensors: SensorSet,
    pose: Pose,
    baseline: WorldSnapshot,
}

impl Scene {
    /// Assemble the bundled model with the bundled poses.
    pub fn assemble(options: &EnvOptions) -> Result<Self, PhysicsError> {
        Self::assemble_with(&bundled_model()?, &PoseLibrary::bundled(), options)
    }

    /// Assemble `model`, taking the initial pose from `poses`.
    pub fn assemble_with(
        model: &ModelDescription,
        poses: &PoseLibrary,
        options: &EnvOptions,
    ) -> Result<Self, PhysicsError> {
        options.validate()?;
        let root = model
            .root()
            .map(|b| b.name.clone())
            .ok_or(flygym_ir::ModelError::RootCount(0))?;

        let mut world = PhysicsWorld::new();
        world.set_timestep(options.timestep);

        let terrain = terrain_for(&options.terrain);
        terrain.build(&mut world)?;
        world.add_model(model, terrain.spawn_pose())?;

        // Every actuated DoF must carry all three actuator types.
        let mut controls = Vec::with_capacity(options.actuated_joints.len());
        for joint in &options.actuated_joints {
            world.hinge(joint)?;
            for mode in ControlMode::ALL {
                let actuator = world.actuator(joint, *mode)?;
                if *mode == options.control {
                    controls.push(actuator);
                }
            }
        }
        for &actuator in &controls {
            world.activate(actuator);
        }

        let joint_sensors = SensorSet::joints(&world, &options.actuated_joints)?;
        let body_sensors = SensorSet::body(&world, &root)?;

        apply_physics_overrides(&mut world, &options.physics, &options.actuated_joints)?;
        apply_compliance(&mut world, &options.physics);

        let pose = poses.load(options.init_pose)?.filtered(&options.actuated_joints);
        let baseline = world.snapshot();

        let mut scene = Self {
            world,
            root,
            actuated_joints: options.actuated_joints.clone(),
            controls,
            control_mode: options.control,
            joint_sensors,
            body_sensors,
            pose,
            baseline,
        };
        scene.apply_pose()?;

        log::debug!(
            "assembled scene: terrain {}, {} actuated DoFs under {} control, pose {} ({} joints)",
            options.terrain.kind(),
            scene.actuated_joints.len(),
            scene.control_mode,
            options.init_pose,
            scene.pose.len()
        );
        Ok(scene)
    }

    /// Write the initial pose into the world.
    fn apply_pose(&mut self) -> Result<(), PhysicsError> {
        let mut write = self.world.write_state();
        for (joint, angle) in self.pose.iter() {
            write.stage(joint, angle)?;
        }
        write.commit();
        Ok(())
    }

    /// Return to the post-assembly state and re-apply the initial pose.
    pub fn reset(&mut self) -> Result<(), PhysicsError> {
        self.world.restore(&self.baseline);
        self.apply_pose()
    }

    /// Write one control value per actuated DoF, in DoF order.
    pub fn apply_controls(&mut self, values: &[f64]) -> Result<(), PhysicsError> {
        if values.len() != self.controls.len() {
            return Err(PhysicsError::ActionShape {
                expected: self.controls.len(),
                got: values.len(),
            });
        }
        for (&actuator, &value) in self.controls.iter().zip(values) {
            self.world.set_control(actuator, value);
        }
        Ok(())
    }

    /// Advance the world by one timestep.
    pub fn step(&mut self) {
        self.world.step();
    }

    /// Joint sensor data: five values per actuated DoF.
    pub fn joint_data(&self) -> Result<Vec<f64>, PhysicsError> {
        self.joint_sensors.read(&self.world)
    }

    /// Root body sensor data: position, linear velocity, quaternion, angular
    /// velocity.
    pub fn body_data(&self) -> Result<Vec<f64>, PhysicsError> {
        self.body_sensors.read(&self.world)
    }

    /// The physics world.
    pub fn world(&self) -> &PhysicsWorld {
        &self.world
    }

    /// Name of the root body.
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Actuated DoFs in action order.
    pub fn actuated_joints(&self) -> &[String] {
        &self.actuated_joints
    }

    /// Active actuator of each actuated DoF.
    pub fn controls(&self) -> &[ActuatorHandle] {
        &self.controls
    }

    /// Controller type.
    pub fn control_mode(&self) -> ControlMode {
        self.control_mode
    }

    /// Initial pose, restricted to the actuated DoFs.
    pub fn pose(&self) -> &Pose {
        &self.pose
    }
}

fn apply_physics_overrides(
    world: &mut PhysicsWorld,
    physics: &PhysicsConfig,
    actuated_joints: &[String],
) -> Result<(), PhysicsError> {
    world.set_fly_friction(physics.friction[0]);
    log::debug!(
        "fly friction {}; torsional {} and rolling {} are not modelled",
        physics.friction[0],
        physics.friction[1],
        physics.friction[2]
    );
    for joint in actuated_joints {
        let hinge = world.hinge(joint)?;
        world.set_joint_stiffness(hinge, physics.joint_stiffness);
    }
    world.set_gravity(physics.gravity);
    Ok(())
}

fn apply_compliance(world: &mut PhysicsWorld, physics: &PhysicsConfig) {
    let hinges: Vec<HingeHandle> = world
        .hinge_handles()
        .filter(|&h| world.hinge_segment(h).is_some_and(|s| physics.is_compliant(s)))
        .collect();
    for segment in &physics.compliant_segments {
        if !hinges.iter().any(|&h| world.hinge_segment(h) == Some(segment.as_str())) {
            log::warn!("compliant segment {segment} matches no joint");
        }
    }

    for hinge in hinges {
        world.set_joint_stiffness(hinge, physics.compliant_stiffness);
        world.set_joint_damping(hinge, physics.compliant_damping);
        let name = world.hinge_name(hinge).to_string();
        if let Ok(actuator) = world.actuator(&name, ControlMode::Position) {
            world.set_position_gain(actuator, physics.compliant_kp);
        }
    }
    log::debug!("compliance applied to segments {:?}", physics.compliant_segments);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{InitPose, RenderConfig};
    use crate::world::tests::leg_model;
    use approx::assert_relative_eq;
    use flygym_ir::ActuatorKind;

    fn leg_poses() -> (tempfile::TempDir, PoseLibrary) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("default.toml"),
            "[joints]\njoint_Coxa = 20.0\njoint_Tibia = -30.0\n",
        )
        .unwrap();
        let library = PoseLibrary::new(dir.path());
        (dir, library)
    }

    fn leg_options(joints: &[&str]) -> EnvOptions {
        EnvOptions {
            render: RenderConfig::Headless,
            actuated_joints: joints.iter().map(|j| j.to_string()).collect(),
            ..EnvOptions::default()
        }
    }

    #[test]
    fn test_assemble_leg() {
        let (_dir, poses) = leg_poses();
        let options = leg_options(&["joint_Tibia", "joint_Coxa_roll"]);
        let scene = Scene::assemble_with(&leg_model(), &poses, &options).unwrap();

        assert_eq!(scene.root(), "Thorax");
        assert_eq!(scene.controls().len(), 2);
        assert_eq!(scene.joint_data().unwrap().len(), 10);
        assert_eq!(scene.body_data().unwrap().len(), 13);
        for &actuator in scene.controls() {
            assert!(scene.world().is_active(actuator));
            assert!(scene.world().actuator_name(actuator).starts_with("actuator_position_"));
        }
        // joint_Coxa is not actuated, so it is filtered out of the pose
        assert_eq!(scene.pose().len(), 1);
        let tibia = scene.world().hinge("joint_Tibia").unwrap();
        assert_relative_eq!(
            scene.world().joint_position(tibia),
            -30f64.to_radians(),
            epsilon = 1e-4
        );
    }

    #[test]
    fn test_overrides_apply_to_actuated_joints() {
        let (_dir, poses) = leg_poses();
        let mut options = leg_options(&["joint_Tibia"]);
        options.physics.gravity = [0.0, 0.0, -1.0];
        options.physics.friction = [0.3, 0.0, 0.0];
        let scene = Scene::assemble_with(&leg_model(), &poses, &options).unwrap();
        let world = scene.world();

        assert_eq!(world.gravity().z, -1.0);
        assert!(world.fly_friction().iter().all(|&f| f == 0.3));
        let tibia = world.hinge("joint_Tibia").unwrap();
        let coxa = world.hinge("joint_Coxa").unwrap();
        assert_eq!(world.joint_passive(tibia).0, 2500.0);
        assert_eq!(world.joint_passive(coxa).0, 0.0);
    }

    #[test]
    fn test_compliance_by_segment() {
        let (_dir, poses) = leg_poses();
        let mut options = leg_options(&["joint_Tibia"]);
        options.physics.compliant_segments = vec!["Tibia".to_string()];
        let scene = Scene::assemble_with(&leg_model(), &poses, &options).unwrap();
        let world = scene.world();

        let tibia = world.hinge("joint_Tibia").unwrap();
        assert_eq!(world.joint_passive(tibia), (0.0, 100.0));
        let pos = world.actuator("joint_Tibia", ControlMode::Position).unwrap();
        assert_eq!(world.actuator_kind(pos), ActuatorKind::Position { kp: 5.0, kv: 300.0 });
    }

    #[test]
    fn test_unmatched_compliant_segment_is_skipped() {
        let (_dir, poses) = leg_poses();
        let mut options = leg_options(&["joint_Tibia"]);
        options.physics.compliant_segments = vec!["Wing".to_string(), "Tibia".to_string()];
        let scene = Scene::assemble_with(&leg_model(), &poses, &options).unwrap();
        let world = scene.world();

        let tibia = world.hinge("joint_Tibia").unwrap();
        assert_eq!(world.joint_passive(tibia), (0.0, 100.0));
        let coxa = world.hinge("joint_Coxa").unwrap();
        assert_eq!(world.joint_passive(coxa), (0.0, 0.0));
    }

    #[test]
    fn test_bundled_tarsi_are_compliant() {
        let options = leg_options(&["joint_LFTibia"]);
        let scene = Scene::assemble(&options).unwrap();
        let world = scene.world();

        for leg in flygym_ir::LEGS {
            for segment in ["Tarsus2", "Tarsus3", "Tarsus4", "Tarsus5"] {
                let joint = format!("joint_{leg}{segment}");
                let hinge = world.hinge(&joint).unwrap();
                assert_eq!(world.joint_passive(hinge), (0.0, 100.0), "{joint}");
                let pos = world.actuator(&joint, ControlMode::Position).unwrap();
                let kind = world.actuator_kind(pos);
                assert!(
                    matches!(kind, ActuatorKind::Position { kp, .. } if kp == 5.0),
                    "{joint}"
                );
            }
            let tarsus1 = format!("joint_{leg}Tarsus1");
            let pos = world.actuator(&tarsus1, ControlMode::Position).unwrap();
            assert!(matches!(
                world.actuator_kind(pos),
                ActuatorKind::Position { kp, .. } if kp == 20000.0
            ));
        }
    }

    #[test]
    fn test_missing_actuator_is_fatal() {
        let (_dir, poses) = leg_poses();
        let mut model = leg_model();
        model.actuators.retain(|a| a.name != "actuator_velocity_joint_Tibia");
        let result = Scene::assemble_with(&model, &poses, &leg_options(&["joint_Tibia"]));
        match result {
            Err(PhysicsError::MissingActuator { joint, control, expected }) => {
                assert_eq!(joint, "joint_Tibia");
                assert_eq!(control, "velocity");
                assert_eq!(expected, "actuator_velocity_joint_Tibia");
            }
            other => panic!("expected missing actuator, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_unknown_joint_is_fatal() {
        let (_dir, poses) = leg_poses();
        let result = Scene::assemble_with(&leg_model(), &poses, &leg_options(&["joint_Wing"]));
        assert!(matches!(result, Err(PhysicsError::MissingJoint(_))));
    }

    #[test]
    fn test_control_width_is_checked() {
        let (_dir, poses) = leg_poses();
        let mut scene =
            Scene::assemble_with(&leg_model(), &poses, &leg_options(&["joint_Tibia"])).unwrap();
        assert!(matches!(
            scene.apply_controls(&[0.0, 1.0]),
            Err(PhysicsError::ActionShape { expected: 1, got: 2 })
        ));
        scene.apply_controls(&[0.4]).unwrap();
        assert_eq!(scene.world().control(scene.controls()[0]), 0.4);
    }

    #[test]
    fn test_reset_restores_pose() {
        let (_dir, poses) = leg_poses();
        let mut options = leg_options(&["joint_Tibia"]);
        options.control = ControlMode::Torque;
        options.init_pose = InitPose::Default;
        let mut scene = Scene::assemble_with(&leg_model(), &poses, &options).unwrap();
        let initial = scene.body_data().unwrap();

        scene.apply_controls(&[1e5]).unwrap();
        for _ in 0..20 {
            scene.step();
        }
        assert_ne!(scene.body_data().unwrap(), initial);

        scene.reset().unwrap();
        assert_eq!(scene.body_data().unwrap(), initial);
        assert_eq!(scene.world().control(scene.controls()[0]), 0.0);
    }
}
