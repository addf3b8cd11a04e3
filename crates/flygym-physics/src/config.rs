//! Configuration bundles for rendering, terrain and physics.
//!
//! Every bundle has a typed default per variant. User overrides arrive as a
//! TOML table and are merged against that default set: a key the variant
//! does not define is rejected, a value of the wrong type is rejected, and
//! the defaults themselves are rebuilt for every construction.

use std::path::PathBuf;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

macro_rules! variant_names {
    (
        $ty:ident, $kind:literal, $expected:literal,
        { $($variant:ident => $name:literal),+ $(,)? }
    ) => {
        impl $ty {
            /// Every variant, in declaration order.
            pub const ALL: &'static [$ty] = &[$($ty::$variant),+];

            /// Name used in configuration files.
            pub fn as_str(self) -> &'static str {
                match self {
                    $($ty::$variant => $name),+
                }
            }
        }

        impl FromStr for $ty {
            type Err = ConfigError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($name => Ok($ty::$variant),)+
                    _ => Err(ConfigError::UnknownVariant {
                        kind: $kind,
                        name: s.to_string(),
                        expected: $expected,
                    }),
                }
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

/// How frames are produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderMode {
    /// No rendering at all.
    Headless,
    /// Live display (declared, not implemented).
    Viewer,
    /// Frames are recorded in memory and written as a video.
    Saved,
}

variant_names!(RenderMode, "render mode", "headless, viewer, saved", {
    Headless => "headless",
    Viewer => "viewer",
    Saved => "saved",
});

/// Joint controller type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlMode {
    /// Target joint angle (radians).
    Position,
    /// Target joint angular velocity.
    Velocity,
    /// Joint torque.
    Torque,
}

variant_names!(ControlMode, "control mode", "position, velocity, torque", {
    Position => "position",
    Velocity => "velocity",
    Torque => "torque",
});

/// Terrain variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TerrainKind {
    /// Bounded flat floor.
    Flat,
    /// Strips of floor separated by gaps.
    Gapped,
    /// Checkerboard of blocks of random height.
    Blocks,
    /// Spherical treadmill.
    Ball,
}

variant_names!(TerrainKind, "terrain", "flat, gapped, blocks, ball", {
    Flat => "flat",
    Gapped => "gapped",
    Blocks => "blocks",
    Ball => "ball",
});

/// Named initial pose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InitPose {
    /// Resting stance.
    Default,
    /// Legs stretched out.
    Stretch,
}

variant_names!(InitPose, "init pose", "default, stretch", {
    Default => "default",
    Stretch => "stretch",
});

/// Merge `overrides` into the serialized form of `defaults`.
fn merge_overrides<T>(bundle: &str, defaults: &T, overrides: &toml::Table) -> Result<T, ConfigError>
where
    T: Serialize + DeserializeOwned,
{
    let invalid = |reason: String| ConfigError::InvalidOption {
        bundle: bundle.to_string(),
        reason,
    };

    let mut table = match toml::Value::try_from(defaults) {
        Ok(toml::Value::Table(table)) => table,
        Ok(other) => return Err(invalid(format!("defaults are a {}", other.type_str()))),
        Err(e) => return Err(invalid(e.to_string())),
    };

    for (key, value) in overrides {
        match table.get_mut(key) {
            Some(slot) => *slot = value.clone(),
            None => {
                return Err(ConfigError::UnknownOption {
                    bundle: bundle.to_string(),
                    option: key.clone(),
                })
            }
        }
    }

    toml::Value::Table(table)
        .try_into()
        .map_err(|e: toml::de::Error| invalid(e.to_string()))
}

fn ensure(bundle: &str, ok: bool, reason: impl FnOnce() -> String) -> Result<(), ConfigError> {
    if ok {
        Ok(())
    } else {
        Err(ConfigError::InvalidOption {
            bundle: bundle.to_string(),
            reason: reason(),
        })
    }
}

fn ensure_range(bundle: &str, name: &str, range: [f64; 2]) -> Result<(), ConfigError> {
    ensure(bundle, range[0] < range[1], || {
        format!("{name} must be increasing, got {range:?}")
    })
}

// =============================================================================
// Rendering
// =============================================================================

/// Options of the frame-producing render modes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingOptions {
    /// Frame width and height in pixels.
    pub window_size: [u32; 2],
    /// Simulated seconds per second of video.
    pub playspeed: f64,
    /// Video frame rate.
    pub fps: u32,
    /// Camera distance from the tracked body.
    pub camera_distance: f64,
    /// Camera elevation in degrees (negative looks down).
    pub camera_elevation: f64,
    /// Camera azimuth in degrees around the vertical axis.
    pub camera_azimuth: f64,
    /// Vertical field of view in degrees.
    pub fovy: f64,
}

impl Default for RecordingOptions {
    fn default() -> Self {
        Self {
            window_size: [640, 480],
            playspeed: 1.0,
            fps: 60,
            camera_distance: 6000.0,
            camera_elevation: -20.0,
            camera_azimuth: 90.0,
            fovy: 45.0,
        }
    }
}

impl RecordingOptions {
    /// Simulated time between two recorded frames.
    pub fn render_interval(&self) -> f64 {
        self.playspeed / f64::from(self.fps)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let [w, h] = self.window_size;
        let max = u32::from(u16::MAX);
        ensure("render", w > 0 && h > 0 && w <= max && h <= max, || {
            format!("window_size must be within 1..={max}, got {w}x{h}")
        })?;
        ensure("render", self.fps > 0, || "fps must be positive".to_string())?;
        ensure("render", self.playspeed > 0.0, || {
            format!("playspeed must be positive, got {}", self.playspeed)
        })?;
        ensure("render", self.fovy > 0.0 && self.fovy < 180.0, || {
            format!("fovy must be within (0, 180), got {}", self.fovy)
        })
    }
}

/// Render configuration, one variant per [`RenderMode`].
#[derive(Debug, Clone, PartialEq)]
pub enum RenderConfig {
    /// No options.
    Headless,
    /// Live display options.
    Viewer(RecordingOptions),
    /// Recording options.
    Saved(RecordingOptions),
}

impl RenderConfig {
    /// Defaults for a render mode.
    pub fn default_for(mode: RenderMode) -> Self {
        match mode {
            RenderMode::Headless => RenderConfig::Headless,
            RenderMode::Viewer => RenderConfig::Viewer(RecordingOptions::default()),
            RenderMode::Saved => RenderConfig::Saved(RecordingOptions::default()),
        }
    }

    /// Defaults for `mode` merged with `overrides`.
    pub fn with_overrides(mode: RenderMode, overrides: &toml::Table) -> Result<Self, ConfigError> {
        let config = match Self::default_for(mode) {
            RenderConfig::Headless => {
                if let Some(key) = overrides.keys().next() {
                    return Err(ConfigError::UnknownOption {
                        bundle: "render".to_string(),
                        option: key.clone(),
                    });
                }
                RenderConfig::Headless
            }
            RenderConfig::Viewer(d) => {
                RenderConfig::Viewer(merge_overrides("render", &d, overrides)?)
            }
            RenderConfig::Saved(d) => {
                RenderConfig::Saved(merge_overrides("render", &d, overrides)?)
            }
        };
        config.validate()?;
        Ok(config)
    }

    /// The render mode of this configuration.
    pub fn mode(&self) -> RenderMode {
        match self {
            RenderConfig::Headless => RenderMode::Headless,
            RenderConfig::Viewer(_) => RenderMode::Viewer,
            RenderConfig::Saved(_) => RenderMode::Saved,
        }
    }

    /// Frame options, if the mode produces frames.
    pub fn recording(&self) -> Option<&RecordingOptions> {
        match self {
            RenderConfig::Headless => None,
            RenderConfig::Viewer(o) | RenderConfig::Saved(o) => Some(o),
        }
    }

    /// Check value constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.recording() {
            Some(options) => options.validate(),
            None => Ok(()),
        }
    }
}

// =============================================================================
// Terrain
// =============================================================================

/// Default sliding, torsional and rolling friction.
pub const DEFAULT_FRICTION: [f64; 3] = [1.0, 0.005, 0.0001];

/// Default spawn orientation: axis-angle, slight pitch about y.
pub const DEFAULT_FLY_ORIENT: [f64; 4] = [0.0, 1.0, 0.0, 0.1];

/// Flat floor options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatTerrainConfig {
    /// Floor extent along x and y.
    pub size: [f64; 2],
    /// Sliding, torsional and rolling friction.
    pub friction: [f64; 3],
    /// Spawn position of the fly.
    pub fly_pos: [f64; 3],
    /// Spawn orientation as `[ax, ay, az, angle]`.
    pub fly_orient: [f64; 4],
}

impl Default for FlatTerrainConfig {
    fn default() -> Self {
        Self {
            size: [50_000.0, 50_000.0],
            friction: DEFAULT_FRICTION,
            fly_pos: [0.0, 0.0, 300.0],
            fly_orient: DEFAULT_FLY_ORIENT,
        }
    }
}

/// Gapped floor options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GappedTerrainConfig {
    /// Extent along x.
    pub x_range: [f64; 2],
    /// Extent along y.
    pub y_range: [f64; 2],
    /// Sliding, torsional and rolling friction.
    pub friction: [f64; 3],
    /// Gap width along x.
    pub gap_width: f64,
    /// Block width along x.
    pub block_width: f64,
    /// Depth of the gaps.
    pub gap_depth: f64,
    /// Spawn position of the fly.
    pub fly_pos: [f64; 3],
    /// Spawn orientation as `[ax, ay, az, angle]`.
    pub fly_orient: [f64; 4],
}

impl Default for GappedTerrainConfig {
    fn default() -> Self {
        Self {
            x_range: [-10_000.0, 10_000.0],
            y_range: [-10_000.0, 10_000.0],
            friction: DEFAULT_FRICTION,
            gap_width: 200.0,
            block_width: 1000.0,
            gap_depth: 2000.0,
            fly_pos: [0.0, 0.0, 600.0],
            fly_orient: DEFAULT_FLY_ORIENT,
        }
    }
}

/// Extruding blocks options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlocksTerrainConfig {
    /// Extent along x.
    pub x_range: [f64; 2],
    /// Extent along y.
    pub y_range: [f64; 2],
    /// Sliding, torsional and rolling friction.
    pub friction: [f64; 3],
    /// Edge length of a grid cell.
    pub block_size: f64,
    /// Block heights are drawn uniformly from this range.
    pub height_range: [f64; 2],
    /// Seed of the height generator.
    pub rand_seed: u64,
    /// Spawn position of the fly.
    pub fly_pos: [f64; 3],
    /// Spawn orientation as `[ax, ay, az, angle]`.
    pub fly_orient: [f64; 4],
}

impl Default for BlocksTerrainConfig {
    fn default() -> Self {
        Self {
            x_range: [-10_000.0, 10_000.0],
            y_range: [-10_000.0, 10_000.0],
            friction: DEFAULT_FRICTION,
            block_size: 1000.0,
            height_range: [300.0, 300.0],
            rand_seed: 0,
            fly_pos: [0.0, 0.0, 600.0],
            fly_orient: DEFAULT_FLY_ORIENT,
        }
    }
}

/// Spherical treadmill options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BallTerrainConfig {
    /// Ball radius.
    pub radius: f64,
    /// Spawn position of the fly.
    pub fly_pos: [f64; 3],
    /// Spawn orientation as `[ax, ay, az, angle]`.
    pub fly_orient: [f64; 4],
}

impl Default for BallTerrainConfig {
    fn default() -> Self {
        Self {
            radius: 5390.0,
            fly_pos: [0.0, 0.0, 5690.0],
            fly_orient: DEFAULT_FLY_ORIENT,
        }
    }
}

/// Terrain configuration, one variant per [`TerrainKind`].
#[derive(Debug, Clone, PartialEq)]
pub enum TerrainConfig {
    /// Flat floor.
    Flat(FlatTerrainConfig),
    /// Gapped floor.
    Gapped(GappedTerrainConfig),
    /// Extruding blocks.
    Blocks(BlocksTerrainConfig),
    /// Spherical treadmill.
    Ball(BallTerrainConfig),
}

impl Default for TerrainConfig {
    fn default() -> Self {
        TerrainConfig::Flat(FlatTerrainConfig::default())
    }
}

impl TerrainConfig {
    /// Defaults for a terrain variant.
    pub fn default_for(kind: TerrainKind) -> Self {
        match kind {
            TerrainKind::Flat => TerrainConfig::Flat(Default::default()),
            TerrainKind::Gapped => TerrainConfig::Gapped(Default::default()),
            TerrainKind::Blocks => TerrainConfig::Blocks(Default::default()),
            TerrainKind::Ball => TerrainConfig::Ball(Default::default()),
        }
    }

    /// Defaults for `kind` merged with `overrides`.
    pub fn with_overrides(kind: TerrainKind, overrides: &toml::Table) -> Result<Self, ConfigError> {
        let config = match Self::default_for(kind) {
            TerrainConfig::Flat(d) => {
                TerrainConfig::Flat(merge_overrides("terrain", &d, overrides)?)
            }
            TerrainConfig::Gapped(d) => {
                TerrainConfig::Gapped(merge_overrides("terrain", &d, overrides)?)
            }
            TerrainConfig::Blocks(d) => {
                TerrainConfig::Blocks(merge_overrides("terrain", &d, overrides)?)
            }
            TerrainConfig::Ball(d) => {
                TerrainConfig::Ball(merge_overrides("terrain", &d, overrides)?)
            }
        };
        config.validate()?;
        Ok(config)
    }

    /// The terrain variant.
    pub fn kind(&self) -> TerrainKind {
        match self {
            TerrainConfig::Flat(_) => TerrainKind::Flat,
            TerrainConfig::Gapped(_) => TerrainKind::Gapped,
            TerrainConfig::Blocks(_) => TerrainKind::Blocks,
            TerrainConfig::Ball(_) => TerrainKind::Ball,
        }
    }

    /// Check value constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        const B: &str = "terrain";
        match self {
            TerrainConfig::Flat(c) => ensure(B, c.size[0] > 0.0 && c.size[1] > 0.0, || {
                format!("size must be positive, got {:?}", c.size)
            }),
            TerrainConfig::Gapped(c) => {
                ensure_range(B, "x_range", c.x_range)?;
                ensure_range(B, "y_range", c.y_range)?;
                ensure(B, c.block_width > 0.0 && c.gap_width >= 0.0 && c.gap_depth > 0.0, || {
                    "block_width and gap_depth must be positive, gap_width non-negative".to_string()
                })
            }
            TerrainConfig::Blocks(c) => {
                ensure_range(B, "x_range", c.x_range)?;
                ensure_range(B, "y_range", c.y_range)?;
                ensure(B, c.block_size > 0.0, || "block_size must be positive".to_string())?;
                ensure(B, c.height_range[0] <= c.height_range[1], || {
                    format!("height_range must not decrease, got {:?}", c.height_range)
                })
            }
            TerrainConfig::Ball(c) => {
                ensure(B, c.radius > 0.0, || "radius must be positive".to_string())
            }
        }
    }
}

// =============================================================================
// Physics
// =============================================================================

/// Physics overrides applied after the fly is merged into the terrain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhysicsConfig {
    /// Passive stiffness of every actuated joint.
    pub joint_stiffness: f64,
    /// Sliding, torsional and rolling friction of the fly's collision geoms.
    pub friction: [f64; 3],
    /// Gravity vector.
    pub gravity: [f64; 3],
    /// Body segments whose joints are made compliant.
    pub compliant_segments: Vec<String>,
    /// Position gain of compliant joints' position actuators.
    pub compliant_kp: f64,
    /// Passive stiffness of compliant joints.
    pub compliant_stiffness: f64,
    /// Passive damping of compliant joints.
    pub compliant_damping: f64,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            joint_stiffness: 2500.0,
            friction: DEFAULT_FRICTION,
            gravity: [0.0, 0.0, -9.81e5],
            compliant_segments: ["Tarsus2", "Tarsus3", "Tarsus4", "Tarsus5"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            compliant_kp: 5.0,
            compliant_stiffness: 0.0,
            compliant_damping: 100.0,
        }
    }
}

impl PhysicsConfig {
    /// Defaults merged with `overrides`.
    pub fn with_overrides(overrides: &toml::Table) -> Result<Self, ConfigError> {
        merge_overrides("physics", &Self::default(), overrides)
    }

    /// Whether joints of `segment` get the compliance treatment.
    pub fn is_compliant(&self, segment: &str) -> bool {
        self.compliant_segments.iter().any(|s| s == segment)
    }
}

// =============================================================================
// Environment options
// =============================================================================

/// Everything needed to construct an environment.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvOptions {
    /// Rendering.
    pub render: RenderConfig,
    /// Actuated joints; fixes the order of actions and joint observations.
    pub actuated_joints: Vec<String>,
    /// Integration timestep in seconds.
    pub timestep: f64,
    /// Where `close` writes the recorded video.
    pub output_dir: Option<PathBuf>,
    /// Terrain.
    pub terrain: TerrainConfig,
    /// Physics overrides.
    pub physics: PhysicsConfig,
    /// Joint controller type.
    pub control: ControlMode,
    /// Initial pose.
    pub init_pose: InitPose,
}

impl Default for EnvOptions {
    fn default() -> Self {
        Self {
            render: RenderConfig::default_for(RenderMode::Saved),
            actuated_joints: flygym_ir::all_leg_dofs(),
            timestep: 1e-4,
            output_dir: None,
            terrain: TerrainConfig::default(),
            physics: PhysicsConfig::default(),
            control: ControlMode::Position,
            init_pose: InitPose::Default,
        }
    }
}

/// On-disk environment file; every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct EnvFile {
    render_mode: Option<String>,
    #[serde(default)]
    render_config: toml::Table,
    actuated_joints: Option<Vec<String>>,
    timestep: Option<f64>,
    output_dir: Option<PathBuf>,
    terrain: Option<String>,
    #[serde(default)]
    terrain_config: toml::Table,
    #[serde(default)]
    physics_config: toml::Table,
    control: Option<String>,
    init_pose: Option<String>,
}

impl EnvOptions {
    /// Build options from the variant names and override tables.
    pub fn from_names(
        render_mode: &str,
        render_config: &toml::Table,
        terrain: &str,
        terrain_config: &toml::Table,
        physics_config: &toml::Table,
        control: &str,
        init_pose: &str,
    ) -> Result<Self, ConfigError> {
        let render = RenderConfig::with_overrides(render_mode.parse()?, render_config)?;
        let terrain = TerrainConfig::with_overrides(terrain.parse()?, terrain_config)?;
        let physics = PhysicsConfig::with_overrides(physics_config)?;
        Ok(Self {
            render,
            terrain,
            physics,
            control: control.parse()?,
            init_pose: init_pose.parse()?,
            ..Self::default()
        })
    }

    /// Parse an environment TOML file.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let file: EnvFile = toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;

        let mut options = Self::from_names(
            file.render_mode.as_deref().unwrap_or("saved"),
            &file.render_config,
            file.terrain.as_deref().unwrap_or("flat"),
            &file.terrain_config,
            &file.physics_config,
            file.control.as_deref().unwrap_or("position"),
            file.init_pose.as_deref().unwrap_or("default"),
        )?;
        if let Some(joints) = file.actuated_joints {
            options.actuated_joints = joints;
        }
        if let Some(timestep) = file.timestep {
            options.timestep = timestep;
        }
        options.output_dir = file.output_dir;
        options.validate()?;
        Ok(options)
    }

    /// Check cross-bundle constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure("env", self.timestep > 0.0 && self.timestep.is_finite(), || {
            format!("timestep must be positive, got {}", self.timestep)
        })?;
        self.render.validate()?;
        self.terrain.validate()
    }
}
