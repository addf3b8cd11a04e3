//! Gym-style interface to the fly simulation.

use std::collections::HashMap;
use std::f64::consts::PI;
use std::path::{Path, PathBuf};

use flygym_ir::ModelDescription;
use image::RgbImage;
use nalgebra::{DMatrix, Matrix4x3, Point3, Quaternion, UnitQuaternion};
use serde::{Deserialize, Serialize};

use crate::assembler::Scene;
use crate::config::{ControlMode, EnvOptions, RenderConfig, RenderMode};
use crate::error::PhysicsError;
use crate::pose::PoseLibrary;
use crate::render::{RenderGate, Renderer};
use crate::sensors::{BODY_SENSOR_DIM, JOINT_SENSORS_PER_DOF};
use crate::video::write_gif;

/// Scale from summed actuator forces to reported joint torque.
pub const TORQUE_SCALE: f64 = 1e-9;

/// Sign applied to the reported roll angle.
// TODO: confirm against recorded fly kinematics whether the flip is needed.
pub const ROLL_SIGN_CONVENTION: f64 = -1.0;

/// Frame rate of videos saved outside the `saved` render mode.
const FALLBACK_FPS: u32 = 60;

/// One control value per actuated DoF, in DoF order.
///
/// Radians for position control, radians per second for velocity control,
/// torque otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Control values.
    pub joints: Vec<f64>,
}

impl Action {
    /// Action from control values.
    pub fn new(joints: Vec<f64>) -> Self {
        Self { joints }
    }

    /// All-zero action for `n` DoFs.
    pub fn zeros(n: usize) -> Self {
        Self::new(vec![0.0; n])
    }
}

/// Observation of the fly.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// Rows: joint angle, joint velocity, joint torque; one column per DoF.
    pub joints: DMatrix<f64>,
    /// Rows: position, linear velocity, Euler angles (x-y-z), angular
    /// velocity of the thorax.
    pub fly: Matrix4x3<f64>,
}

impl Observation {
    /// Observation from raw sensor data.
    ///
    /// `joint_data` holds five values per DoF (position, velocity, then the
    /// three actuator forces). `body_data` holds position, linear velocity,
    /// quaternion `[w, x, y, z]` and angular velocity, [`BODY_SENSOR_DIM`]
    /// values in all. Shorter body data panics.
    pub fn from_sensor_data(joint_data: &[f64], body_data: &[f64]) -> Self {
        let n = joint_data.len() / JOINT_SENSORS_PER_DOF;
        let mut joints = DMatrix::zeros(3, n);
        for i in 0..n {
            let base = i * JOINT_SENSORS_PER_DOF;
            joints[(0, i)] = joint_data[base];
            joints[(1, i)] = joint_data[base + 1];
            joints[(2, i)] = joint_data[base + 2..base + 5].iter().sum::<f64>() * TORQUE_SCALE;
        }

        debug_assert_eq!(body_data.len(), BODY_SENSOR_DIM);
        let quat = UnitQuaternion::from_quaternion(Quaternion::new(
            body_data[6],
            body_data[7],
            body_data[8],
            body_data[9],
        ));
        let (roll, pitch, yaw) = quat.euler_angles();
        let fly = Matrix4x3::new(
            body_data[0],
            body_data[1],
            body_data[2],
            body_data[3],
            body_data[4],
            body_data[5],
            ROLL_SIGN_CONVENTION * roll,
            pitch,
            yaw,
            body_data[10],
            body_data[11],
            body_data[12],
        );
        Self { joints, fly }
    }
}

/// Auxiliary step information. Empty.
pub type Info = HashMap<String, f64>;

/// Bounds and shape of an observation or action field.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxSpace {
    /// Lower bound of every element.
    pub low: f64,
    /// Upper bound of every element.
    pub high: f64,
    /// Rows and columns.
    pub shape: (usize, usize),
}

impl BoxSpace {
    /// Whether `values` fit the bounds.
    pub fn contains(&self, values: &[f64]) -> bool {
        values.len() == self.shape.0 * self.shape.1
            && values.iter().all(|v| (self.low..=self.high).contains(v))
    }
}

/// Action space.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionSpace {
    /// Joint controls, shape `(n, 1)`.
    pub joints: BoxSpace,
}

/// Observation space.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationSpace {
    /// Joint states, shape `(3, n)`.
    pub joints: BoxSpace,
    /// Thorax state, shape `(4, 3)`.
    pub fly: BoxSpace,
}

/// Lifecycle state of a [`FlyEnv`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvState {
    /// Assembled, not yet reset.
    Uninitialized,
    /// Reset at least once and not closed.
    Ready,
    /// Closed; only `reset` and `close` are accepted.
    Closed,
}

/// The NeuroMechFly environment.
pub struct FlyEnv {
    options: EnvOptions,
    scene: Scene,
    renderer: Option<Renderer>,
    gate: RenderGate,
    frames: Vec<RgbImage>,
    curr_time: f64,
    state: EnvState,
}

impl FlyEnv {
    /// Create an environment with the bundled model and poses.
    pub fn new(options: EnvOptions) -> Result<Self, PhysicsError> {
        let scene = Scene::assemble(&options)?;
        Self::from_scene(options, scene)
    }

    /// Create an environment from a custom model and pose library.
    pub fn with_model(
        options: EnvOptions,
        model: &ModelDescription,
        poses: &PoseLibrary,
    ) -> Result<Self, PhysicsError> {
        let scene = Scene::assemble_with(model, poses, &options)?;
        Self::from_scene(options, scene)
    }

    fn from_scene(options: EnvOptions, scene: Scene) -> Result<Self, PhysicsError> {
        if let Some(dir) = &options.output_dir {
            std::fs::create_dir_all(dir)?;
        }
        let renderer = options.render.recording().cloned().map(Renderer::new);
        let gate = RenderGate::new(
            options
                .render
                .recording()
                .map(|o| o.render_interval())
                .unwrap_or(0.0),
        );
        log::info!(
            "created environment: {} DoFs, {} control, {} rendering",
            scene.actuated_joints().len(),
            options.control,
            options.render.mode()
        );
        Ok(Self {
            options,
            scene,
            renderer,
            gate,
            frames: Vec::new(),
            curr_time: 0.0,
            state: EnvState::Uninitialized,
        })
    }

    /// Return to the initial state.
    pub fn reset(&mut self) -> Result<(Observation, Info), PhysicsError> {
        self.scene.reset()?;
        self.curr_time = 0.0;
        self.frames.clear();
        self.gate.reset();
        self.state = EnvState::Ready;
        Ok((self.observe()?, Info::new()))
    }

    /// Apply `action` and advance one timestep.
    ///
    /// Values are not checked against the action space bounds.
    pub fn step(&mut self, action: &Action) -> Result<(Observation, Info), PhysicsError> {
        if self.state == EnvState::Closed {
            return Err(PhysicsError::Closed);
        }
        self.scene.apply_controls(&action.joints)?;
        self.scene.step();
        self.curr_time += self.options.timestep;
        Ok((self.observe()?, Info::new()))
    }

    /// Current observation.
    pub fn observe(&self) -> Result<Observation, PhysicsError> {
        Ok(Observation::from_sensor_data(
            &self.scene.joint_data()?,
            &self.scene.body_data()?,
        ))
    }

    /// Record a frame if one is due.
    pub fn render(&mut self) -> Result<(), PhysicsError> {
        if self.state == EnvState::Closed {
            return Err(PhysicsError::Closed);
        }
        let Some(renderer) = &self.renderer else {
            return Ok(());
        };
        if !self.gate.ready(self.curr_time) {
            return Ok(());
        }
        if self.options.render.mode() == RenderMode::Viewer {
            return Err(PhysicsError::Unimplemented("viewer rendering"));
        }

        let root = self.scene.world().body_state(self.scene.root())?;
        let target = Point3::from(root.position.translation.vector);
        self.frames.push(renderer.render(self.scene.world(), target));
        self.gate.mark(self.curr_time);
        Ok(())
    }

    /// Write the frames recorded since the last reset to `path` as a GIF.
    pub fn save_video(&self, path: impl AsRef<Path>) -> Result<(), PhysicsError> {
        let path = path.as_ref();
        if self.options.render.mode() != RenderMode::Saved {
            log::warn!(
                "render mode is not \"saved\"; no frames were recorded for {}",
                path.display()
            );
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let (size, fps) = match self.options.render.recording() {
            Some(o) => (o.window_size, o.fps),
            None => ([640, 480], FALLBACK_FPS),
        };
        log::info!("saving {} frames to {}", self.frames.len(), path.display());
        write_gif(path, &self.frames, size, fps)
    }

    /// Save the recording to the output directory, if any, and release
    /// frames. Closing twice is a no-op.
    pub fn close(&mut self) -> Result<(), PhysicsError> {
        if self.state == EnvState::Closed {
            return Ok(());
        }
        let mode = self.options.render.mode();
        if let (RenderMode::Saved, Some(dir)) = (mode, &self.options.output_dir) {
            self.save_video(dir.join("video.gif"))?;
        }
        self.frames.clear();
        self.state = EnvState::Closed;
        Ok(())
    }

    /// Bounds of the action.
    pub fn action_space(&self) -> ActionSpace {
        let bound = match self.options.control {
            ControlMode::Position => PI,
            ControlMode::Velocity | ControlMode::Torque => f64::INFINITY,
        };
        ActionSpace {
            joints: BoxSpace {
                low: -bound,
                high: bound,
                shape: (self.scene.actuated_joints().len(), 1),
            },
        }
    }

    /// Bounds of the observation.
    pub fn observation_space(&self) -> ObservationSpace {
        ObservationSpace {
            joints: BoxSpace {
                low: f64::NEG_INFINITY,
                high: f64::INFINITY,
                shape: (3, self.scene.actuated_joints().len()),
            },
            fly: BoxSpace {
                low: f64::NEG_INFINITY,
                high: f64::INFINITY,
                shape: (4, 3),
            },
        }
    }

    /// Simulated time since the last reset.
    pub fn curr_time(&self) -> f64 {
        self.curr_time
    }

    /// Integration timestep.
    pub fn timestep(&self) -> f64 {
        self.options.timestep
    }

    /// Actuated DoFs in action order.
    pub fn actuated_joints(&self) -> &[String] {
        self.scene.actuated_joints()
    }

    /// Frames recorded since the last reset.
    pub fn frames(&self) -> &[RgbImage] {
        &self.frames
    }

    /// Render configuration.
    pub fn render_config(&self) -> &RenderConfig {
        &self.options.render
    }

    /// Render mode.
    pub fn render_mode(&self) -> RenderMode {
        self.options.render.mode()
    }

    /// Lifecycle state.
    pub fn state(&self) -> EnvState {
        self.state
    }

    /// Output directory for `close`.
    pub fn output_dir(&self) -> Option<&PathBuf> {
        self.options.output_dir.as_ref()
    }

    /// The assembled scene.
    pub fn scene(&self) -> &Scene {
        &self.scene
    }
}
