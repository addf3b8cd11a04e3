//! Physics world management using Rapier3d.

use std::collections::HashMap;

use flygym_ir::{ActuatorKind, BodyDef, GeomClass, ModelDescription};
use nalgebra::{Isometry3, UnitVector3, Vector3};
use parry3d::shape::SharedShape;
use rapier3d::dynamics::{
    CCDSolver, ImpulseJointHandle, ImpulseJointSet, IntegrationParameters, IslandManager,
    JointAxis, MassProperties, MultibodyJointSet, RigidBodyBuilder, RigidBodyHandle,
    RigidBodySet,
};
use rapier3d::geometry::{
    BroadPhaseMultiSap, ColliderBuilder, ColliderHandle, ColliderSet, NarrowPhase,
};
use rapier3d::pipeline::{PhysicsPipeline, QueryPipeline};

use crate::colliders::{color_bytes, geom_collider};
use crate::config::ControlMode;
use crate::error::PhysicsError;
use crate::joints::{
    child_pose, fixed_joint, hinge_angle, hinge_axis, hinge_frame, hinge_joint, hinge_rate,
    to_vector, welded_pose,
};

/// Length scale of the body description, used for Rapier's tolerances.
const LENGTH_UNIT: f32 = 100.0;

/// Position, linear velocity and angular velocity of a body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyState {
    /// World pose.
    pub position: Isometry3<f32>,
    /// Linear velocity.
    pub linvel: Vector3<f32>,
    /// Angular velocity.
    pub angvel: Vector3<f32>,
}

/// Index of an actuator in the world's registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActuatorHandle(usize);

/// Index of a hinge DoF in the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HingeHandle(usize);

/// A hinge DoF bound to a Rapier revolute joint.
#[derive(Debug, Clone)]
struct Hinge {
    name: String,
    segment: Option<String>,
    joint: ImpulseJointHandle,
    parent: RigidBodyHandle,
    child: RigidBodyHandle,
    frame1: Isometry3<f32>,
    frame2: Isometry3<f32>,
    stiffness: f32,
    damping: f32,
}

/// Edge of the kinematic tree, in parent-first order.
#[derive(Debug, Clone)]
struct Link {
    parent: RigidBodyHandle,
    child: RigidBodyHandle,
    frame1: Isometry3<f32>,
    frame2: Isometry3<f32>,
    hinge: Option<usize>,
}

#[derive(Debug, Clone)]
struct Actuator {
    name: String,
    hinge: usize,
    kind: ActuatorKind,
    force_range: Option<(f64, f64)>,
    active: bool,
    control: f64,
}

impl Actuator {
    fn clamp(&self, force: f64) -> f64 {
        match self.force_range {
            Some((lo, hi)) => force.clamp(lo, hi),
            None => force,
        }
    }
}

/// A collider together with what the renderer needs to draw it.
#[derive(Clone)]
pub struct RenderItem {
    /// Collision shape.
    pub shape: SharedShape,
    /// World pose of the shape.
    pub pose: Isometry3<f32>,
    /// Base color.
    pub color: [u8; 3],
    /// Whether the shape belongs to the terrain.
    pub terrain: bool,
}

/// Saved dynamic state of every fly body and actuator control.
#[derive(Debug, Clone)]
pub struct WorldSnapshot {
    bodies: Vec<(RigidBodyHandle, BodyState)>,
    controls: Vec<f64>,
}

/// Physics simulation world.
pub struct PhysicsWorld {
    // Rapier components
    pipeline: PhysicsPipeline,
    gravity: Vector3<f32>,
    integration_params: IntegrationParameters,
    islands: IslandManager,
    broad_phase: BroadPhaseMultiSap,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
    query_pipeline: QueryPipeline,

    // Mapping from the body description to Rapier
    body_by_name: HashMap<String, RigidBodyHandle>,
    fly_bodies: Vec<RigidBodyHandle>,
    fly_colliders: Vec<(ColliderHandle, GeomClass)>,
    colors: HashMap<ColliderHandle, [u8; 3]>,
    hinges: Vec<Hinge>,
    hinge_by_name: HashMap<String, usize>,
    links: Vec<Link>,
    actuators: Vec<Actuator>,
    registry: HashMap<(String, ControlMode), ActuatorHandle>,
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl PhysicsWorld {
    /// Create an empty physics world.
    pub fn new() -> Self {
        let mut integration_params = IntegrationParameters::default();
        integration_params.length_unit = LENGTH_UNIT;

        Self {
            pipeline: PhysicsPipeline::new(),
            gravity: Vector3::new(0.0, 0.0, -9.81e5),
            integration_params,
            islands: IslandManager::new(),
            broad_phase: BroadPhaseMultiSap::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
            body_by_name: HashMap::new(),
            fly_bodies: Vec::new(),
            fly_colliders: Vec::new(),
            colors: HashMap::new(),
            hinges: Vec::new(),
            hinge_by_name: HashMap::new(),
            links: Vec::new(),
            actuators: Vec::new(),
            registry: HashMap::new(),
        }
    }

    /// Set the integration timestep in seconds.
    pub fn set_timestep(&mut self, dt: f64) {
        self.integration_params.dt = dt as f32;
    }

    /// Integration timestep in seconds.
    pub fn timestep(&self) -> f64 {
        f64::from(self.integration_params.dt)
    }

    /// Set gravity vector.
    pub fn set_gravity(&mut self, gravity: [f64; 3]) {
        self.gravity = Vector3::new(gravity[0] as f32, gravity[1] as f32, gravity[2] as f32);
    }

    /// Gravity vector.
    pub fn gravity(&self) -> Vector3<f32> {
        self.gravity
    }

    /// Add a static terrain collider.
    pub fn insert_terrain(&mut self, collider: ColliderBuilder, color: [f64; 3]) -> ColliderHandle {
        let handle = self.colliders.insert(collider.build());
        self.colors.insert(handle, color_bytes(color));
        handle
    }

    /// Number of terrain colliders.
    pub fn terrain_count(&self) -> usize {
        self.colliders
            .iter()
            .filter(|(_, c)| c.parent().is_none())
            .count()
    }

    /// Iterate over terrain colliders.
    pub fn terrain_shapes(&self) -> impl Iterator<Item = (&SharedShape, &Isometry3<f32>)> {
        self.colliders
            .iter()
            .filter(|(_, c)| c.parent().is_none())
            .map(|(_, c)| (c.shared_shape(), c.position()))
    }

    /// Instantiate an articulated body with its root at `root_pose`.
    ///
    /// Bodies carrying several hinges are split into a chain of light links,
    /// one revolute joint per hinge. Bodies without hinges are welded to
    /// their parent.
    pub fn add_model(
        &mut self,
        model: &ModelDescription,
        root_pose: Isometry3<f32>,
    ) -> Result<(), PhysicsError> {
        model.validate()?;

        for body in &model.bodies {
            match &body.parent {
                None => {
                    let handle = self.insert_body(model, body, root_pose);
                    self.body_by_name.insert(body.name.clone(), handle);
                }
                Some(parent) => {
                    let parent_handle = self.body_handle(parent)?;
                    self.attach_body(model, body, parent_handle)?;
                }
            }
        }

        for def in &model.actuators {
            let hinge = self
                .hinge_by_name
                .get(&def.joint)
                .copied()
                .ok_or_else(|| PhysicsError::MissingJoint(def.joint.clone()))?;
            let mode = match def.kind {
                ActuatorKind::Position { .. } => ControlMode::Position,
                ActuatorKind::Velocity { .. } => ControlMode::Velocity,
                ActuatorKind::Motor { .. } => ControlMode::Torque,
            };
            let handle = ActuatorHandle(self.actuators.len());
            self.actuators.push(Actuator {
                name: def.name.clone(),
                hinge,
                kind: def.kind,
                force_range: def.force_range,
                active: false,
                control: 0.0,
            });
            self.registry.insert((def.joint.clone(), mode), handle);
        }

        log::debug!(
            "added model {}: {} bodies, {} hinges, {} actuators",
            model.name,
            self.fly_bodies.len(),
            self.hinges.len(),
            self.actuators.len()
        );
        Ok(())
    }

    fn attach_body(
        &mut self,
        model: &ModelDescription,
        body: &BodyDef,
        parent: RigidBodyHandle,
    ) -> Result<(), PhysicsError> {
        let anchor = to_vector(body.pos);
        let parent_pose = self.pose(parent);

        if body.joints.is_empty() {
            let frame1 = Isometry3::translation(anchor.x, anchor.y, anchor.z);
            let frame2 = Isometry3::identity();
            let child = self.insert_body(model, body, welded_pose(&parent_pose, &frame1, &frame2));
            self.impulse_joints
                .insert(parent, child, fixed_joint(frame1, frame2), true);
            self.links.push(Link {
                parent,
                child,
                frame1,
                frame2,
                hinge: None,
            });
            self.body_by_name.insert(body.name.clone(), child);
            return Ok(());
        }

        let mut prev = parent;
        let mut prev_pose = parent_pose;
        for (i, def) in body.joints.iter().enumerate() {
            let axis = UnitVector3::try_new(to_vector(def.axis), 1e-9)
                .ok_or_else(|| PhysicsError::DegenerateAxis(def.name.clone()))?
                .into_inner();
            let offset = if i == 0 { anchor } else { Vector3::zeros() };
            let frame1 = hinge_frame(offset, axis);
            let frame2 = hinge_frame(Vector3::zeros(), axis);
            let pose = child_pose(&prev_pose, &frame1, 0.0, &frame2);

            let child = if i + 1 == body.joints.len() {
                self.insert_body(model, body, pose)
            } else {
                self.insert_link(model, pose)
            };

            let joint = self.impulse_joints.insert(
                prev,
                child,
                hinge_joint(frame1, frame2, def.range),
                true,
            );
            let index = self.hinges.len();
            self.hinges.push(Hinge {
                name: def.name.clone(),
                segment: body.segment.clone(),
                joint,
                parent: prev,
                child,
                frame1,
                frame2,
                stiffness: def.stiffness as f32,
                damping: def.damping as f32,
            });
            self.hinge_by_name.insert(def.name.clone(), index);
            self.links.push(Link {
                parent: prev,
                child,
                frame1,
                frame2,
                hinge: Some(index),
            });
            prev = child;
            prev_pose = pose;
        }
        self.body_by_name.insert(body.name.clone(), prev);
        Ok(())
    }

    fn insert_body(
        &mut self,
        model: &ModelDescription,
        body: &BodyDef,
        pose: Isometry3<f32>,
    ) -> RigidBodyHandle {
        let mut builder = RigidBodyBuilder::dynamic().position(pose).can_sleep(false);
        if body.geoms.is_empty() {
            builder = builder.additional_mass_properties(link_mass(model));
        }
        let handle = self.bodies.insert(builder.build());
        self.fly_bodies.push(handle);

        for geom in &body.geoms {
            let collider = geom_collider(geom, model.density, 1.0).build();
            let collider_handle =
                self.colliders
                    .insert_with_parent(collider, handle, &mut self.bodies);
            self.colors.insert(collider_handle, color_bytes(geom.color));
            self.fly_colliders.push((collider_handle, geom.class));
        }
        handle
    }

    fn insert_link(&mut self, model: &ModelDescription, pose: Isometry3<f32>) -> RigidBodyHandle {
        let handle = self.bodies.insert(
            RigidBodyBuilder::dynamic()
                .position(pose)
                .can_sleep(false)
                .additional_mass_properties(link_mass(model))
                .build(),
        );
        self.fly_bodies.push(handle);
        handle
    }

    fn pose(&self, handle: RigidBodyHandle) -> Isometry3<f32> {
        self.bodies
            .get(handle)
            .map(|b| *b.position())
            .unwrap_or_else(Isometry3::identity)
    }

    fn angvel(&self, handle: RigidBodyHandle) -> Vector3<f32> {
        self.bodies
            .get(handle)
            .map(|b| *b.angvel())
            .unwrap_or_else(Vector3::zeros)
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    /// Rigid body of a named body segment.
    pub fn body_handle(&self, name: &str) -> Result<RigidBodyHandle, PhysicsError> {
        self.body_by_name
            .get(name)
            .copied()
            .ok_or_else(|| PhysicsError::MissingBody(name.to_string()))
    }

    /// Current state of a named body segment.
    pub fn body_state(&self, name: &str) -> Result<BodyState, PhysicsError> {
        let handle = self.body_handle(name)?;
        let body = self
            .bodies
            .get(handle)
            .ok_or_else(|| PhysicsError::MissingBody(name.to_string()))?;
        Ok(BodyState {
            position: *body.position(),
            linvel: *body.linvel(),
            angvel: *body.angvel(),
        })
    }

    /// Hinge DoF by joint name.
    pub fn hinge(&self, name: &str) -> Result<HingeHandle, PhysicsError> {
        self.hinge_by_name
            .get(name)
            .map(|&i| HingeHandle(i))
            .ok_or_else(|| PhysicsError::MissingJoint(name.to_string()))
    }

    /// Names of all hinge DoFs, in model order.
    pub fn hinge_names(&self) -> impl Iterator<Item = &str> {
        self.hinges.iter().map(|h| h.name.as_str())
    }

    /// Every hinge DoF, in model order.
    pub fn hinge_handles(&self) -> impl Iterator<Item = HingeHandle> {
        (0..self.hinges.len()).map(HingeHandle)
    }

    /// Body segment tag of a hinge's body.
    pub fn hinge_segment(&self, hinge: HingeHandle) -> Option<&str> {
        self.hinges[hinge.0].segment.as_deref()
    }

    /// Name of a hinge.
    pub fn hinge_name(&self, hinge: HingeHandle) -> &str {
        &self.hinges[hinge.0].name
    }

    /// Actuator driving `joint` in `mode`.
    pub fn actuator(&self, joint: &str, mode: ControlMode) -> Result<ActuatorHandle, PhysicsError> {
        self.registry
            .get(&(joint.to_string(), mode))
            .copied()
            .ok_or_else(|| PhysicsError::MissingActuator {
                joint: joint.to_string(),
                control: mode.as_str(),
                expected: flygym_ir::actuator_name(mode.as_str(), joint),
            })
    }

    /// Name of an actuator.
    pub fn actuator_name(&self, actuator: ActuatorHandle) -> &str {
        &self.actuators[actuator.0].name
    }

    /// Number of rigid bodies of the fly, virtual links included.
    pub fn fly_body_count(&self) -> usize {
        self.fly_bodies.len()
    }

    /// Number of hinge DoFs.
    pub fn hinge_count(&self) -> usize {
        self.hinges.len()
    }

    /// Number of actuators.
    pub fn actuator_count(&self) -> usize {
        self.actuators.len()
    }

    // =========================================================================
    // Overrides
    // =========================================================================

    /// Set the sliding friction of every collision geom of the fly.
    pub fn set_fly_friction(&mut self, friction: f64) {
        for (handle, class) in &self.fly_colliders {
            if *class != GeomClass::Collision {
                continue;
            }
            if let Some(collider) = self.colliders.get_mut(*handle) {
                collider.set_friction(friction as f32);
            }
        }
    }

    /// Sliding friction of the fly's collision geoms.
    pub fn fly_friction(&self) -> Vec<f32> {
        self.fly_colliders
            .iter()
            .filter(|(_, class)| *class == GeomClass::Collision)
            .filter_map(|(h, _)| self.colliders.get(*h).map(|c| c.friction()))
            .collect()
    }

    /// Passive stiffness of a hinge.
    pub fn set_joint_stiffness(&mut self, hinge: HingeHandle, stiffness: f64) {
        self.hinges[hinge.0].stiffness = stiffness as f32;
    }

    /// Passive damping of a hinge.
    pub fn set_joint_damping(&mut self, hinge: HingeHandle, damping: f64) {
        self.hinges[hinge.0].damping = damping as f32;
    }

    /// Passive stiffness and damping of a hinge.
    pub fn joint_passive(&self, hinge: HingeHandle) -> (f64, f64) {
        let h = &self.hinges[hinge.0];
        (f64::from(h.stiffness), f64::from(h.damping))
    }

    /// Change the proportional gain of a position actuator.
    ///
    /// Other actuator types are left untouched.
    pub fn set_position_gain(&mut self, actuator: ActuatorHandle, gain: f64) {
        if let ActuatorKind::Position { kp, .. } = &mut self.actuators[actuator.0].kind {
            *kp = gain;
        }
        self.drive_motor(actuator);
    }

    /// Actuator type and gains.
    pub fn actuator_kind(&self, actuator: ActuatorHandle) -> ActuatorKind {
        self.actuators[actuator.0].kind
    }

    // =========================================================================
    // Control
    // =========================================================================

    /// Let an actuator drive its joint.
    pub fn activate(&mut self, actuator: ActuatorHandle) {
        self.actuators[actuator.0].active = true;
        self.drive_motor(actuator);
    }

    /// Whether an actuator drives its joint.
    pub fn is_active(&self, actuator: ActuatorHandle) -> bool {
        self.actuators[actuator.0].active
    }

    /// Set an actuator's control value.
    pub fn set_control(&mut self, actuator: ActuatorHandle, value: f64) {
        self.actuators[actuator.0].control = value;
        self.drive_motor(actuator);
    }

    /// Current control value of an actuator.
    pub fn control(&self, actuator: ActuatorHandle) -> f64 {
        self.actuators[actuator.0].control
    }

    fn drive_motor(&mut self, actuator: ActuatorHandle) {
        let act = &self.actuators[actuator.0];
        if !act.active {
            return;
        }
        let target = act.control as f32;
        let max_force = act.force_range.map(|(lo, hi)| lo.abs().max(hi.abs()) as f32);
        let joint = self.hinges[act.hinge].joint;
        let Some(joint) = self.impulse_joints.get_mut(joint, true) else {
            return;
        };
        match act.kind {
            ActuatorKind::Position { kp, kv } => {
                joint
                    .data
                    .set_motor_position(JointAxis::AngX, target, kp as f32, kv as f32);
            }
            ActuatorKind::Velocity { kv } => {
                joint.data.set_motor_velocity(JointAxis::AngX, target, kv as f32);
            }
            // Applied as body torques in `step`.
            ActuatorKind::Motor { .. } => return,
        }
        if let Some(max_force) = max_force {
            joint.data.set_motor_max_force(JointAxis::AngX, max_force);
        }
    }

    // =========================================================================
    // Readings
    // =========================================================================

    /// Hinge angle in radians.
    pub fn joint_position(&self, hinge: HingeHandle) -> f64 {
        let h = &self.hinges[hinge.0];
        f64::from(hinge_angle(
            &self.pose(h.parent),
            &h.frame1,
            &self.pose(h.child),
            &h.frame2,
        ))
    }

    /// Hinge rate in radians per second.
    pub fn joint_velocity(&self, hinge: HingeHandle) -> f64 {
        let h = &self.hinges[hinge.0];
        f64::from(hinge_rate(
            &self.pose(h.parent),
            &h.frame1,
            &self.angvel(h.parent),
            &self.angvel(h.child),
        ))
    }

    /// Force produced by an actuator in the current state.
    ///
    /// Inactive actuators produce no force.
    pub fn actuator_force(&self, actuator: ActuatorHandle) -> f64 {
        let act = &self.actuators[actuator.0];
        if !act.active {
            return 0.0;
        }
        let hinge = HingeHandle(act.hinge);
        let force = match act.kind {
            ActuatorKind::Position { kp, kv } => {
                kp * (act.control - self.joint_position(hinge)) - kv * self.joint_velocity(hinge)
            }
            ActuatorKind::Velocity { kv } => kv * (act.control - self.joint_velocity(hinge)),
            ActuatorKind::Motor { gear } => gear * act.control,
        };
        act.clamp(force)
    }

    // =========================================================================
    // Simulation
    // =========================================================================

    /// Advance the simulation by one timestep.
    pub fn step(&mut self) {
        self.apply_joint_torques();

        self.pipeline.step(
            &self.gravity,
            &self.integration_params,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            Some(&mut self.query_pipeline),
            &(),
            &(),
        );

        for handle in &self.fly_bodies {
            if let Some(body) = self.bodies.get_mut(*handle) {
                body.reset_torques(false);
            }
        }
    }

    /// Passive spring/damper torques plus direct torque actuators.
    fn apply_joint_torques(&mut self) {
        let mut torques: Vec<f32> = (0..self.hinges.len())
            .map(|i| {
                let h = &self.hinges[i];
                if h.stiffness == 0.0 && h.damping == 0.0 {
                    return 0.0;
                }
                let q = self.joint_position(HingeHandle(i)) as f32;
                let qd = self.joint_velocity(HingeHandle(i)) as f32;
                -h.stiffness * q - h.damping * qd
            })
            .collect();

        for act in &self.actuators {
            if let (true, ActuatorKind::Motor { gear }) = (act.active, act.kind) {
                torques[act.hinge] += act.clamp(gear * act.control) as f32;
            }
        }

        for (h, torque) in self.hinges.iter().zip(torques) {
            if torque == 0.0 {
                continue;
            }
            let axis = hinge_axis(&self.pose(h.parent), &h.frame1) * torque;
            if let Some(child) = self.bodies.get_mut(h.child) {
                child.add_torque(axis, true);
            }
            if let Some(parent) = self.bodies.get_mut(h.parent) {
                parent.add_torque(-axis, true);
            }
        }
    }

    /// Capture the dynamic state of the fly.
    pub fn snapshot(&self) -> WorldSnapshot {
        let bodies = self
            .fly_bodies
            .iter()
            .filter_map(|&h| {
                self.bodies.get(h).map(|b| {
                    (
                        h,
                        BodyState {
                            position: *b.position(),
                            linvel: *b.linvel(),
                            angvel: *b.angvel(),
                        },
                    )
                })
            })
            .collect();
        WorldSnapshot {
            bodies,
            controls: self.actuators.iter().map(|a| a.control).collect(),
        }
    }

    /// Return the fly to a captured state.
    pub fn restore(&mut self, snapshot: &WorldSnapshot) {
        for (handle, state) in &snapshot.bodies {
            if let Some(body) = self.bodies.get_mut(*handle) {
                body.set_position(state.position, true);
                body.set_linvel(state.linvel, true);
                body.set_angvel(state.angvel, true);
                body.reset_forces(true);
                body.reset_torques(true);
            }
        }
        for (_, joint) in self.impulse_joints.iter_mut() {
            joint.impulses.fill(0.0);
        }
        for (i, control) in snapshot.controls.iter().enumerate() {
            self.set_control(ActuatorHandle(i), *control);
        }
    }

    /// Begin a joint-angle write.
    pub fn write_state(&mut self) -> StateWrite<'_> {
        StateWrite {
            world: self,
            staged: HashMap::new(),
        }
    }

    /// Re-pose the fly by forward kinematics, keeping the root in place.
    fn apply_forward_kinematics(&mut self, staged: &HashMap<usize, f32>) {
        let angles: Vec<f32> = (0..self.hinges.len())
            .map(|i| match staged.get(&i) {
                Some(angle) => *angle,
                None => self.joint_position(HingeHandle(i)) as f32,
            })
            .collect();

        for k in 0..self.links.len() {
            let link = &self.links[k];
            let parent = self.pose(link.parent);
            let pose = match link.hinge {
                Some(i) => child_pose(&parent, &link.frame1, angles[i], &link.frame2),
                None => welded_pose(&parent, &link.frame1, &link.frame2),
            };
            let child = link.child;
            if let Some(body) = self.bodies.get_mut(child) {
                body.set_position(pose, true);
            }
        }
    }

    /// Every collider with its current world pose and color.
    ///
    /// Poses are derived from the parent bodies, so they are current even
    /// before the first step after a state write.
    pub fn render_items(&self) -> Vec<RenderItem> {
        self.colliders
            .iter()
            .map(|(handle, collider)| {
                let pose = match (collider.parent(), collider.position_wrt_parent()) {
                    (Some(parent), Some(local)) => self.pose(parent) * local,
                    _ => *collider.position(),
                };
                RenderItem {
                    shape: collider.shared_shape().clone(),
                    pose,
                    color: self.colors.get(&handle).copied().unwrap_or([200, 200, 200]),
                    terrain: collider.parent().is_none(),
                }
            })
            .collect()
    }
}

fn link_mass(model: &ModelDescription) -> MassProperties {
    MassProperties::from_ball(model.density as f32, model.link_radius as f32)
}

/// A scoped joint-angle write.
///
/// Angles are staged by joint name and reach the world only through
/// [`StateWrite::commit`]. Dropping the write without committing leaves the
/// world untouched.
pub struct StateWrite<'w> {
    world: &'w mut PhysicsWorld,
    staged: HashMap<usize, f32>,
}

impl StateWrite<'_> {
    /// Stage a joint angle in radians.
    pub fn stage(&mut self, joint: &str, angle: f64) -> Result<&mut Self, PhysicsError> {
        let hinge = self.world.hinge(joint)?;
        self.staged.insert(hinge.0, angle as f32);
        Ok(self)
    }

    /// Number of staged angles.
    pub fn len(&self) -> usize {
        self.staged.len()
    }

    /// Whether nothing is staged.
    pub fn is_empty(&self) -> bool {
        self.staged.is_empty()
    }

    /// Write all staged angles.
    pub fn commit(self) {
        self.world.apply_forward_kinematics(&self.staged);
    }
}
