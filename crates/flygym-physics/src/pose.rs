//! Named initial poses.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use flygym_ir::PoseFile;

use crate::config::InitPose;
use crate::error::PhysicsError;

/// Rest angle per joint, in radians.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pose {
    angles: BTreeMap<String, f64>,
}

impl Pose {
    /// Pose from a pose file, converting degrees to radians.
    pub fn from_file(file: &PoseFile) -> Self {
        Self {
            angles: file
                .joints
                .iter()
                .map(|(joint, deg)| (joint.clone(), deg.to_radians()))
                .collect(),
        }
    }

    /// Rest angle of a joint.
    pub fn get(&self, joint: &str) -> Option<f64> {
        self.angles.get(joint).copied()
    }

    /// Joint angles in joint-name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.angles.iter().map(|(j, a)| (j.as_str(), *a))
    }

    /// Number of joints.
    pub fn len(&self) -> usize {
        self.angles.len()
    }

    /// Whether the pose sets no joint.
    pub fn is_empty(&self) -> bool {
        self.angles.is_empty()
    }

    /// Restrict to `joints`.
    ///
    /// Joints missing from the pose are left out rather than reported.
    pub fn filtered(&self, joints: &[String]) -> Self {
        Self {
            angles: joints
                .iter()
                .filter_map(|j| self.angles.get(j).map(|a| (j.clone(), *a)))
                .collect(),
        }
    }
}

/// Loads pose files by name from a directory.
#[derive(Debug, Clone)]
pub struct PoseLibrary {
    dir: PathBuf,
}

impl Default for PoseLibrary {
    fn default() -> Self {
        Self::bundled()
    }
}

impl PoseLibrary {
    /// Library of the poses shipped with `flygym-ir`.
    pub fn bundled() -> Self {
        Self::new(flygym_ir::data::poses_dir())
    }

    /// Library over `dir`, holding one `{name}.toml` per pose.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory of the pose files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Load a pose.
    pub fn load(&self, pose: InitPose) -> Result<Pose, PhysicsError> {
        let path = self.dir.join(format!("{}.toml", pose.as_str()));
        let text = std::fs::read_to_string(&path)?;
        let file = PoseFile::from_toml(&text)?;
        log::debug!("loaded pose {} ({} joints) from {}", pose, file.joints.len(), path.display());
        Ok(Pose::from_file(&file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_bundled_poses_in_radians() {
        let library = PoseLibrary::bundled();
        let pose = library.load(InitPose::Default).unwrap();
        assert_relative_eq!(pose.get("joint_LFCoxa").unwrap(), 20f64.to_radians());
        let stretch = library.load(InitPose::Stretch).unwrap();
        assert_relative_eq!(stretch.get("joint_LFCoxa").unwrap(), 30f64.to_radians());
    }

    #[test]
    fn test_filter_to_actuated_joints() {
        let pose = PoseLibrary::bundled().load(InitPose::Default).unwrap();
        let joints = vec![
            "joint_LFCoxa".to_string(),
            "joint_LFTibia".to_string(),
            "joint_Antenna".to_string(),
        ];
        let filtered = pose.filtered(&joints);
        assert_eq!(filtered.len(), 2);
        assert!(filtered.get("joint_Antenna").is_none());
        assert!(filtered.get("joint_RHCoxa").is_none());
    }

    #[test]
    fn test_custom_library() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("stretch.toml"),
            "[joints]\njoint_LFTibia = -90.0\n",
        )
        .unwrap();
        let library = PoseLibrary::new(dir.path());
        let pose = library.load(InitPose::Stretch).unwrap();
        assert_relative_eq!(pose.get("joint_LFTibia").unwrap(), -std::f64::consts::FRAC_PI_2);
        assert!(matches!(library.load(InitPose::Default), Err(PhysicsError::Io(_))));
    }

    #[test]
    fn test_malformed_pose_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("default.toml"), "joints = 3\n").unwrap();
        let result = PoseLibrary::new(dir.path()).load(InitPose::Default);
        assert!(matches!(result, Err(PhysicsError::PoseParse(_))));
    }
}
