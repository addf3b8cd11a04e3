#![warn(missing_docs)]

//! NeuroMechFly physics environment on Rapier3d.
//!
//! This crate assembles the NeuroMechFly body model with a terrain, actuators
//! and sensors, and exposes it through a gym-like interface for control and
//! reinforcement learning.
//!
//! # Features
//!
//! - Flat, gapped and randomized block terrains
//! - Joint position, velocity and torque control on any subset of leg DoFs
//! - Joint and thorax observations
//! - Frame recording to animated GIF
//!
//! # Example
//!
//! ```ignore
//! use flygym_physics::{Action, EnvOptions, FlyEnv, RenderConfig};
//!
//! let options = EnvOptions {
//!     render: RenderConfig::Headless,
//!     ..EnvOptions::default()
//! };
//! let mut env = FlyEnv::new(options)?;
//! let (obs, _) = env.reset()?;
//!
//! let action = Action::new(obs.joints.row(0).iter().copied().collect());
//! for _ in 0..1000 {
//!     env.step(&action)?;
//!     env.render()?;
//! }
//! env.close()?;
//! ```

mod assembler;
mod colliders;
mod config;
mod error;
mod gym;
mod joints;
mod pose;
mod render;
mod sensors;
mod terrain;
mod video;
mod world;

pub use assembler::{bundled_model, Scene};
pub use config::{
    BallTerrainConfig, BlocksTerrainConfig, ControlMode, EnvOptions, FlatTerrainConfig,
    GappedTerrainConfig, InitPose, PhysicsConfig, RecordingOptions, RenderConfig, RenderMode,
    TerrainConfig, TerrainKind,
};
pub use error::{ConfigError, PhysicsError};
pub use gym::{
    Action, ActionSpace, BoxSpace, EnvState, FlyEnv, Info, Observation, ObservationSpace,
    ROLL_SIGN_CONVENTION, TORQUE_SCALE,
};
pub use pose::{Pose, PoseLibrary};
pub use render::{Camera, RenderGate, Renderer};
pub use sensors::{Sensor, SensorKind, SensorSet, BODY_SENSOR_DIM, JOINT_SENSORS_PER_DOF};
pub use terrain::{
    spawn_pose, terrain_for, BallTerrain, BlocksTerrain, FlatTerrain, GappedTerrain, Terrain,
    FLOOR_THICKNESS,
};
pub use video::{frame_delay, write_gif};
pub use world::{ActuatorHandle, BodyState, HingeHandle, PhysicsWorld, StateWrite};
