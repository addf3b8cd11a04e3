//! Locations of the bundled model and pose assets.

use std::path::{Path, PathBuf};

/// Directory holding the bundled assets.
pub fn assets_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("assets")
}

/// Path of the NeuroMechFly body description.
pub fn model_path() -> PathBuf {
    assets_dir().join("neuromechfly.json")
}

/// Directory of the bundled pose files, one `{name}.toml` per pose.
pub fn poses_dir() -> PathBuf {
    assets_dir().join("poses")
}
