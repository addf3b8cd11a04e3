//! Error types for configuration and simulation.

use thiserror::Error;

/// Errors in the configuration surface, raised at construction.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Unknown name for an enumerated option (terrain, control, ...).
    #[error("unknown {kind} '{name}' (expected one of: {expected})")]
    UnknownVariant {
        /// Which enumeration.
        kind: &'static str,
        /// The rejected name.
        name: String,
        /// Accepted names, comma separated.
        expected: &'static str,
    },

    /// Override for an option that the variant does not have.
    #[error("unknown {bundle} option '{option}'")]
    UnknownOption {
        /// Configuration bundle (`render`, `terrain`, `physics`).
        bundle: String,
        /// The rejected key.
        option: String,
    },

    /// Option present but with an unusable value.
    #[error("invalid {bundle} option: {reason}")]
    InvalidOption {
        /// Configuration bundle.
        bundle: String,
        /// What is wrong.
        reason: String,
    },

    /// Malformed environment file.
    #[error("failed to parse environment file: {0}")]
    Parse(String),
}

/// Errors that can occur while assembling or running the simulation.
#[derive(Error, Debug)]
pub enum PhysicsError {
    /// Configuration error.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Body description could not be read.
    #[error("failed to parse body description: {0}")]
    ModelParse(#[from] serde_json::Error),

    /// Body description is structurally invalid.
    #[error("invalid body description: {0}")]
    InvalidModel(#[from] flygym_ir::ModelError),

    /// Pose file could not be read.
    #[error("failed to parse pose file: {0}")]
    PoseParse(#[from] toml::de::Error),

    /// Missing body.
    #[error("Body not found: {0}")]
    MissingBody(String),

    /// Missing joint.
    #[error("Joint not found: {0}")]
    MissingJoint(String),

    /// Hinge axis of zero length.
    #[error("joint {0} has a degenerate axis")]
    DegenerateAxis(String),

    /// No actuator for a DoF and control mode.
    #[error("no {control} actuator for joint {joint} (expected {expected})")]
    MissingActuator {
        /// Joint name.
        joint: String,
        /// Control mode name.
        control: &'static str,
        /// Conventional actuator name that was looked for.
        expected: String,
    },

    /// Declared feature that is not implemented.
    #[error("not implemented: {0}")]
    Unimplemented(&'static str),

    /// Action does not match the action space.
    #[error("action has {got} joint values, expected {expected}")]
    ActionShape {
        /// Number of actuated DoFs.
        expected: usize,
        /// Number supplied.
        got: usize,
    },

    /// Operation on a closed environment.
    #[error("environment is closed")]
    Closed,

    /// Filesystem error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Video encoding error.
    #[error("failed to encode video: {0}")]
    Video(gif::EncodingError),
}

impl From<gif::EncodingError> for PhysicsError {
    fn from(err: gif::EncodingError) -> Self {
        match err {
            gif::EncodingError::Io(err) => PhysicsError::Io(err),
            other => PhysicsError::Video(other),
        }
    }
}
