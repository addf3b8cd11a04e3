//! Intermediate representation for the flygym simulation.
//!
//! This crate defines the declarative description of the NeuroMechFly body
//! (segments, hinge joints, collision/visual geometry and actuators), the
//! per-joint pose files used to initialize a simulation, and the naming
//! conventions shared by the physics layer.
//!
//! The IR holds no simulation state. Binding it to a physics engine is
//! handled by `flygym-physics`.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;

pub mod data;
pub mod dofs;

pub use dofs::{actuator_name, all_leg_dofs, LEGS, LEG_DOFS};

/// 3D vector with f64 components (model length units).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    /// X component.
    pub x: f64,
    /// Y component.
    pub y: f64,
    /// Z component.
    pub z: f64,
}

impl Vec3 {
    /// Create a new Vec3.
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// The zero vector.
    pub fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }
}

/// Primitive shape of a geom, expressed in the owning body's frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GeomShape {
    /// Capsule between two segment end points.
    Capsule {
        /// First end point.
        from: Vec3,
        /// Second end point.
        to: Vec3,
        /// Capsule radius.
        radius: f64,
    },
    /// Sphere.
    Sphere {
        /// Sphere center.
        center: Vec3,
        /// Sphere radius.
        radius: f64,
    },
    /// Axis-aligned box.
    Box {
        /// Box center.
        center: Vec3,
        /// Half extents along each axis.
        half_extents: Vec3,
    },
}

/// What a geom takes part in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GeomClass {
    /// Collides with the terrain and receives the configured friction.
    Collision,
    /// Rendered and weighed, but never in contact.
    Visual,
}

/// A geom attached to a body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeomDef {
    /// Unique geom name.
    pub name: String,
    /// Geometry.
    pub shape: GeomShape,
    /// Collision or visual.
    pub class: GeomClass,
    /// Base color as `[r, g, b]` in 0.0..1.0.
    pub color: [f64; 3],
    /// Density override; falls back to [`ModelDescription::density`].
    #[serde(default)]
    pub density: Option<f64>,
}

/// A hinge joint connecting a body to its parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HingeDef {
    /// Unique joint name (e.g. `joint_LFCoxa`).
    pub name: String,
    /// Rotation axis in the parent frame of the zero pose.
    pub axis: Vec3,
    /// Optional joint range in degrees.
    #[serde(default)]
    pub range: Option<(f64, f64)>,
    /// Passive stiffness pulling the joint back to zero.
    #[serde(default)]
    pub stiffness: f64,
    /// Passive damping.
    #[serde(default)]
    pub damping: f64,
}

/// A body segment of the articulated model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyDef {
    /// Unique body name (e.g. `LFTibia`).
    pub name: String,
    /// Parent body; `None` for the free-floating root.
    #[serde(default)]
    pub parent: Option<String>,
    /// Origin of this body in the parent frame, in the zero pose.
    pub pos: Vec3,
    /// Leg this body belongs to (`LF`, `RH`, ...), if any.
    #[serde(default)]
    pub leg: Option<String>,
    /// Anatomical segment name without the leg prefix (`Tarsus3`, ...).
    #[serde(default)]
    pub segment: Option<String>,
    /// Hinges between the parent and this body, applied in order.
    ///
    /// An empty list welds the body to its parent.
    #[serde(default)]
    pub joints: Vec<HingeDef>,
    /// Geometry carried by this body.
    #[serde(default)]
    pub geoms: Vec<GeomDef>,
}

/// Actuator type and gains.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ActuatorKind {
    /// PD servo towards a target angle.
    Position {
        /// Proportional gain.
        kp: f64,
        /// Derivative gain.
        kv: f64,
    },
    /// Servo towards a target angular velocity.
    Velocity {
        /// Velocity gain.
        kv: f64,
    },
    /// Direct torque with a gear ratio.
    Motor {
        /// Control-to-torque ratio.
        gear: f64,
    },
}

/// An actuator driving a hinge joint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActuatorDef {
    /// Actuator name, by convention `actuator_{control}_{joint}`.
    pub name: String,
    /// Name of the driven joint.
    pub joint: String,
    /// Actuator type.
    pub kind: ActuatorKind,
    /// Optional clamp on the produced force.
    #[serde(default)]
    pub force_range: Option<(f64, f64)>,
}

/// Errors found while validating a [`ModelDescription`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    /// The description has no root or more than one.
    #[error("model must have exactly one root body, found {0}")]
    RootCount(usize),
    /// A body references a parent declared later or not at all.
    #[error("body {body} references unknown or later-declared parent {parent}")]
    UnknownParent {
        /// Body name.
        body: String,
        /// Parent name.
        parent: String,
    },
    /// The same name is used twice.
    #[error("duplicate {kind} name: {name}")]
    Duplicate {
        /// Body, joint, geom or actuator.
        kind: &'static str,
        /// Offending name.
        name: String,
    },
    /// An actuator targets a joint that does not exist.
    #[error("actuator {actuator} drives unknown joint {joint}")]
    UnknownJoint {
        /// Actuator name.
        actuator: String,
        /// Joint name.
        joint: String,
    },
}

/// The articulated-body description: the `neuromechfly.json` asset format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescription {
    /// Format version string.
    pub version: String,
    /// Model name.
    pub name: String,
    /// Default geom density.
    pub density: f64,
    /// Radius of the light spheres inserted between stacked hinges.
    pub link_radius: f64,
    /// Bodies, parents before children.
    pub bodies: Vec<BodyDef>,
    /// Actuators.
    pub actuators: Vec<ActuatorDef>,
}

impl ModelDescription {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Check structural invariants the physics layer relies on.
    pub fn validate(&self) -> Result<(), ModelError> {
        let roots = self.bodies.iter().filter(|b| b.parent.is_none()).count();
        if roots != 1 {
            return Err(ModelError::RootCount(roots));
        }

        let mut bodies = HashSet::new();
        let mut joints = HashSet::new();
        let mut geoms = HashSet::new();
        for body in &self.bodies {
            if let Some(parent) = &body.parent {
                if !bodies.contains(parent.as_str()) {
                    return Err(ModelError::UnknownParent {
                        body: body.name.clone(),
                        parent: parent.clone(),
                    });
                }
            }
            if !bodies.insert(body.name.as_str()) {
                return Err(duplicate("body", &body.name));
            }
            for joint in &body.joints {
                if !joints.insert(joint.name.as_str()) {
                    return Err(duplicate("joint", &joint.name));
                }
            }
            for geom in &body.geoms {
                if !geoms.insert(geom.name.as_str()) {
                    return Err(duplicate("geom", &geom.name));
                }
            }
        }

        let mut actuators = HashSet::new();
        for actuator in &self.actuators {
            if !actuators.insert(actuator.name.as_str()) {
                return Err(duplicate("actuator", &actuator.name));
            }
            if !joints.contains(actuator.joint.as_str()) {
                return Err(ModelError::UnknownJoint {
                    actuator: actuator.name.clone(),
                    joint: actuator.joint.clone(),
                });
            }
        }
        Ok(())
    }

    /// The free-floating root body.
    pub fn root(&self) -> Option<&BodyDef> {
        self.bodies.iter().find(|b| b.parent.is_none())
    }

    /// Look up a body by name.
    pub fn body(&self, name: &str) -> Option<&BodyDef> {
        self.bodies.iter().find(|b| b.name == name)
    }

    /// All hinge joints with the body they move, in declaration order.
    pub fn joints(&self) -> impl Iterator<Item = (&BodyDef, &HingeDef)> {
        self.bodies
            .iter()
            .flat_map(|b| b.joints.iter().map(move |j| (b, j)))
    }

    /// Actuators driving `joint`.
    pub fn actuators_for<'a>(&'a self, joint: &'a str) -> impl Iterator<Item = &'a ActuatorDef> {
        self.actuators.iter().filter(move |a| a.joint == joint)
    }
}

fn duplicate(kind: &'static str, name: &str) -> ModelError {
    ModelError::Duplicate {
        kind,
        name: name.to_string(),
    }
}

/// A named initial pose: the pose file format.
///
/// Angles are in degrees, keyed by joint name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PoseFile {
    /// Joint name → rest angle in degrees.
    pub joints: BTreeMap<String, f64>,
}

impl PoseFile {
    /// Deserialize from TOML string.
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Serialize to TOML string.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_segment_model() -> ModelDescription {
        ModelDescription {
            version: "0.1".to_string(),
            name: "test".to_string(),
            density: 1e-6,
            link_radius: 10.0,
            bodies: vec![
                BodyDef {
                    name: "Thorax".to_string(),
                    parent: None,
                    pos: Vec3::zero(),
                    leg: None,
                    segment: Some("Thorax".to_string()),
                    joints: vec![],
                    geoms: vec![GeomDef {
                        name: "Thorax_collision".to_string(),
                        shape: GeomShape::Sphere {
                            center: Vec3::zero(),
                            radius: 100.0,
                        },
                        class: GeomClass::Collision,
                        color: [0.6, 0.4, 0.2],
                        density: None,
                    }],
                },
                BodyDef {
                    name: "LFCoxa".to_string(),
                    parent: Some("Thorax".to_string()),
                    pos: Vec3::new(0.0, 100.0, 0.0),
                    leg: Some("LF".to_string()),
                    segment: Some("Coxa".to_string()),
                    joints: vec![HingeDef {
                        name: "joint_LFCoxa".to_string(),
                        axis: Vec3::new(0.0, 1.0, 0.0),
                        range: None,
                        stiffness: 0.0,
                        damping: 0.0,
                    }],
                    geoms: vec![],
                },
            ],
            actuators: vec![ActuatorDef {
                name: "actuator_position_joint_LFCoxa".to_string(),
                joint: "joint_LFCoxa".to_string(),
                kind: ActuatorKind::Position { kp: 10.0, kv: 1.0 },
                force_range: None,
            }],
        }
    }

    #[test]
    fn roundtrip_model() {
        let model = two_segment_model();
        let json = model.to_json().expect("serialize");
        let restored = ModelDescription::from_json(&json).expect("deserialize");
        assert_eq!(model, restored);
        assert!(json.contains(r#""type": "Sphere""#));
    }

    #[test]
    fn validate_accepts_well_formed_model() {
        let model = two_segment_model();
        assert_eq!(model.validate(), Ok(()));
        assert_eq!(model.root().map(|b| b.name.as_str()), Some("Thorax"));
        assert_eq!(model.joints().count(), 1);
        assert_eq!(model.actuators_for("joint_LFCoxa").count(), 1);
    }

    #[test]
    fn validate_rejects_parent_declared_later() {
        let mut model = two_segment_model();
        model.bodies.swap(0, 1);
        assert!(matches!(
            model.validate(),
            Err(ModelError::UnknownParent { .. })
        ));
    }

    #[test]
    fn validate_rejects_actuator_on_unknown_joint() {
        let mut model = two_segment_model();
        model.actuators[0].joint = "joint_nope".to_string();
        assert!(matches!(
            model.validate(),
            Err(ModelError::UnknownJoint { .. })
        ));
    }

    #[test]
    fn validate_rejects_duplicate_joint() {
        let mut model = two_segment_model();
        let joint = model.bodies[1].joints[0].clone();
        model.bodies[1].joints.push(joint);
        assert_eq!(
            model.validate(),
            Err(ModelError::Duplicate {
                kind: "joint",
                name: "joint_LFCoxa".to_string()
            })
        );
    }

    #[test]
    fn pose_file_from_toml() {
        let pose = PoseFile::from_toml(
            r#"
            [joints]
            joint_LFCoxa = 15.0
            joint_LFTibia = -40
            "#,
        )
        .expect("parse");
        assert_eq!(pose.joints.len(), 2);
        assert_eq!(pose.joints["joint_LFCoxa"], 15.0);
        assert_eq!(pose.joints["joint_LFTibia"], -40.0);
    }
}
