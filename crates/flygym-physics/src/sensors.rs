//! Joint and body sensors producing a flat sensor-data vector.

use crate::config::ControlMode;
use crate::error::PhysicsError;
use crate::world::{ActuatorHandle, HingeHandle, PhysicsWorld};

/// Sensor readings per actuated DoF: position, velocity and one force per
/// actuator type.
pub const JOINT_SENSORS_PER_DOF: usize = 5;

/// Body sensor readings: position, linear velocity, quaternion and angular
/// velocity.
pub const BODY_SENSOR_DIM: usize = 13;

/// What a sensor measures.
#[derive(Debug, Clone, PartialEq)]
pub enum SensorKind {
    /// Hinge angle.
    JointPos(HingeHandle),
    /// Hinge rate.
    JointVel(HingeHandle),
    /// Force produced by an actuator.
    ActuatorForce(ActuatorHandle),
    /// World position of a body.
    FramePos(String),
    /// Linear velocity of a body.
    FrameLinVel(String),
    /// Orientation of a body as `[w, x, y, z]`.
    FrameQuat(String),
    /// Angular velocity of a body.
    FrameAngVel(String),
}

impl SensorKind {
    /// Number of values the sensor produces.
    pub fn dim(&self) -> usize {
        match self {
            SensorKind::JointPos(_) | SensorKind::JointVel(_) | SensorKind::ActuatorForce(_) => 1,
            SensorKind::FramePos(_) | SensorKind::FrameLinVel(_) | SensorKind::FrameAngVel(_) => 3,
            SensorKind::FrameQuat(_) => 4,
        }
    }
}

/// A named sensor.
#[derive(Debug, Clone, PartialEq)]
pub struct Sensor {
    /// Sensor name.
    pub name: String,
    /// Measured quantity.
    pub kind: SensorKind,
}

/// Ordered sensors; readings are concatenated in insertion order.
#[derive(Debug, Clone, Default)]
pub struct SensorSet {
    sensors: Vec<Sensor>,
}

impl SensorSet {
    /// Empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a sensor.
    pub fn push(&mut self, name: impl Into<String>, kind: SensorKind) {
        self.sensors.push(Sensor {
            name: name.into(),
            kind,
        });
    }

    /// Joint sensors for each DoF, in DoF order.
    ///
    /// Each DoF gets [`JOINT_SENSORS_PER_DOF`] readings: `jointpos`,
    /// `jointvel` and the force of its position, velocity and torque
    /// actuators.
    pub fn joints(world: &PhysicsWorld, joints: &[String]) -> Result<Self, PhysicsError> {
        let mut set = Self::new();
        for joint in joints {
            let hinge = world.hinge(joint)?;
            set.push(format!("jointpos_{joint}"), SensorKind::JointPos(hinge));
            set.push(format!("jointvel_{joint}"), SensorKind::JointVel(hinge));
            for mode in ControlMode::ALL {
                let actuator = world.actuator(joint, *mode)?;
                set.push(
                    format!("actuatorfrc_{}_{joint}", mode.as_str()),
                    SensorKind::ActuatorForce(actuator),
                );
            }
        }
        Ok(set)
    }

    /// Position, linear velocity, orientation and angular velocity of a body.
    pub fn body(world: &PhysicsWorld, body: &str) -> Result<Self, PhysicsError> {
        world.body_handle(body)?;
        let mut set = Self::new();
        set.push(format!("framepos_{body}"), SensorKind::FramePos(body.to_string()));
        set.push(format!("framelinvel_{body}"), SensorKind::FrameLinVel(body.to_string()));
        set.push(format!("framequat_{body}"), SensorKind::FrameQuat(body.to_string()));
        set.push(format!("frameangvel_{body}"), SensorKind::FrameAngVel(body.to_string()));
        Ok(set)
    }

    /// Sensors in order.
    pub fn sensors(&self) -> &[Sensor] {
        &self.sensors
    }

    /// Number of sensors.
    pub fn len(&self) -> usize {
        self.sensors.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }

    /// Total number of values produced by [`SensorSet::read`].
    pub fn dim(&self) -> usize {
        self.sensors.iter().map(|s| s.kind.dim()).sum()
    }

    /// Read every sensor.
    pub fn read(&self, world: &PhysicsWorld) -> Result<Vec<f64>, PhysicsError> {
        let mut data = Vec::with_capacity(self.dim());
        for sensor in &self.sensors {
            match &sensor.kind {
                SensorKind::JointPos(h) => data.push(world.joint_position(*h)),
                SensorKind::JointVel(h) => data.push(world.joint_velocity(*h)),
                SensorKind::ActuatorForce(a) => data.push(world.actuator_force(*a)),
                SensorKind::FramePos(body) => {
                    let p = world.body_state(body)?.position.translation.vector;
                    data.extend(p.iter().map(|&v| f64::from(v)));
                }
                SensorKind::FrameLinVel(body) => {
                    let v = world.body_state(body)?.linvel;
                    data.extend(v.iter().map(|&v| f64::from(v)));
                }
                SensorKind::FrameQuat(body) => {
                    let q = world.body_state(body)?.position.rotation;
                    data.extend([q.w, q.i, q.j, q.k].map(f64::from));
                }
                SensorKind::FrameAngVel(body) => {
                    let w = world.body_state(body)?.angvel;
                    data.extend(w.iter().map(|&v| f64::from(v)));
                }
            }
        }
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::tests::leg_model;
    use approx::assert_relative_eq;
    use nalgebra::Isometry3;

    fn world() -> PhysicsWorld {
        let mut world = PhysicsWorld::new();
        world
            .add_model(&leg_model(), Isometry3::translation(1.0, 2.0, 3.0))
            .unwrap();
        world
    }

    #[test]
    fn test_joint_sensor_layout() {
        let world = world();
        let joints = vec!["joint_Tibia".to_string(), "joint_Coxa".to_string()];
        let set = SensorSet::joints(&world, &joints).unwrap();
        assert_eq!(set.len(), 2 * JOINT_SENSORS_PER_DOF);
        assert_eq!(set.dim(), 10);
        let names: Vec<_> = set.sensors().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names[0], "jointpos_joint_Tibia");
        assert_eq!(names[4], "actuatorfrc_torque_joint_Tibia");
        assert_eq!(names[5], "jointpos_joint_Coxa");
    }

    #[test]
    fn test_missing_joint_sensor() {
        let world = world();
        let err = SensorSet::joints(&world, &["joint_Nope".to_string()]).unwrap_err();
        assert!(matches!(err, PhysicsError::MissingJoint(_)));
    }

    #[test]
    fn test_body_sensors_read_root_state() {
        let world = world();
        let set = SensorSet::body(&world, "Thorax").unwrap();
        assert_eq!(set.dim(), BODY_SENSOR_DIM);
        let data = set.read(&world).unwrap();
        assert_relative_eq!(data[0], 1.0);
        assert_relative_eq!(data[1], 2.0);
        assert_relative_eq!(data[2], 3.0);
        assert_eq!(&data[3..6], &[0.0, 0.0, 0.0]);
        assert_eq!(&data[6..10], &[1.0, 0.0, 0.0, 0.0]);
        assert!(SensorSet::body(&world, "Abdomen").is_err());
    }
}
