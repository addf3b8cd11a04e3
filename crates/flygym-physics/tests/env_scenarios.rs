//! End-to-end scenarios on the bundled NeuroMechFly model.

use approx::assert_relative_eq;
use flygym_physics::{
    Action, ConfigError, ControlMode, EnvOptions, EnvState, FlyEnv, PhysicsError,
    RecordingOptions, RenderConfig, TerrainConfig, TerrainKind,
};

fn front_leg() -> Vec<String> {
    ["joint_LFCoxa", "joint_LFFemur", "joint_LFTibia"]
        .iter()
        .map(|j| j.to_string())
        .collect()
}

fn headless(terrain: TerrainKind) -> EnvOptions {
    EnvOptions {
        render: RenderConfig::Headless,
        actuated_joints: front_leg(),
        terrain: TerrainConfig::default_for(terrain),
        ..EnvOptions::default()
    }
}

fn tiny_recording() -> RecordingOptions {
    RecordingOptions {
        window_size: [8, 6],
        ..RecordingOptions::default()
    }
}

#[test]
fn terrains_assemble() {
    for kind in [TerrainKind::Flat, TerrainKind::Gapped, TerrainKind::Blocks] {
        let mut env = FlyEnv::new(headless(kind)).unwrap();
        let (obs, _) = env.reset().unwrap();
        assert_eq!(obs.joints.shape(), (3, 3), "terrain {kind}");
        env.step(&Action::zeros(3)).unwrap();
    }
}

#[test]
fn ball_terrain_is_unimplemented() {
    let result = FlyEnv::new(headless(TerrainKind::Ball));
    assert!(matches!(result, Err(PhysicsError::Unimplemented(_))));
}

#[test]
fn flat_position_control_scenario() {
    let mut env = FlyEnv::new(headless(TerrainKind::Flat)).unwrap();
    let (obs, info) = env.reset().unwrap();
    assert!(info.is_empty());
    assert_eq!(obs.joints.shape(), (3, 3));
    assert_eq!(obs.fly.shape(), (4, 3));
    // spawned at the flat terrain's default position
    assert_relative_eq!(obs.fly[(0, 2)], 300.0, epsilon = 1e-3);

    let hold = Action::new(obs.joints.row(0).iter().copied().collect());
    for _ in 0..10 {
        let (obs, _) = env.step(&hold).unwrap();
        assert!(obs.joints.iter().all(|v| v.is_finite()));
        assert!(obs.fly.iter().all(|v| v.is_finite()));
    }
    assert_relative_eq!(env.curr_time(), 10.0 * env.timestep(), epsilon = 1e-12);
}

#[test]
fn reset_is_repeatable() {
    let mut env = FlyEnv::new(headless(TerrainKind::Flat)).unwrap();
    let (first, _) = env.reset().unwrap();

    for i in 0..50 {
        let phase = i as f64 * 0.1;
        env.step(&Action::new(vec![phase.sin(), 0.3, -0.5])).unwrap();
    }
    assert_ne!(env.observe().unwrap(), first);

    let (second, _) = env.reset().unwrap();
    assert_eq!(second, first);
    assert_eq!(env.curr_time(), 0.0);
}

#[test]
fn action_columns_follow_dof_order() {
    let mut options = headless(TerrainKind::Flat);
    options.physics.gravity = [0.0, 0.0, 0.0];
    options.physics.joint_stiffness = 0.0;
    let mut env = FlyEnv::new(options).unwrap();

    for bumped in 0..3 {
        let (obs, _) = env.reset().unwrap();
        let start: Vec<f64> = obs.joints.row(0).iter().copied().collect();
        let mut target = start.clone();
        target[bumped] += 0.3;

        let action = Action::new(target);
        let mut last = obs;
        for _ in 0..500 {
            last = env.step(&action).unwrap().0;
        }

        let moved = (0..3)
            .map(|i| (last.joints[(0, i)] - start[i]).abs())
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _)| i);
        assert_eq!(moved, Some(bumped));
    }
}

#[test]
fn torque_control_reports_scaled_torque() {
    let mut options = headless(TerrainKind::Flat);
    options.control = ControlMode::Torque;
    let mut env = FlyEnv::new(options).unwrap();
    env.reset().unwrap();
    let (obs, _) = env.step(&Action::new(vec![0.0, 2e9, 0.0])).unwrap();
    assert_relative_eq!(obs.joints[(2, 1)], 2.0, epsilon = 1e-9);
    assert_relative_eq!(obs.joints[(2, 0)], 0.0);
}

#[test]
fn action_width_is_checked() {
    let mut env = FlyEnv::new(headless(TerrainKind::Flat)).unwrap();
    env.reset().unwrap();
    assert!(matches!(
        env.step(&Action::zeros(42)),
        Err(PhysicsError::ActionShape { expected: 3, got: 42 })
    ));
}

#[test]
fn unknown_names_are_rejected() {
    let empty = toml::Table::new();
    let cases = [
        ("hologram", "flat", "position", "default"),
        ("headless", "lava", "position", "default"),
        ("headless", "flat", "impedance", "default"),
        ("headless", "flat", "position", "crouch"),
    ];
    for (render, terrain, control, pose) in cases {
        let result =
            EnvOptions::from_names(render, &empty, terrain, &empty, &empty, control, pose);
        assert!(
            matches!(result, Err(ConfigError::UnknownVariant { .. })),
            "{render}/{terrain}/{control}/{pose}"
        );
    }

    let bad: toml::Table = "wind = 3.0".parse().unwrap();
    let result =
        EnvOptions::from_names("headless", &empty, "flat", &bad, &empty, "position", "default");
    assert!(matches!(result, Err(ConfigError::UnknownOption { .. })));
}

#[test]
fn unknown_joint_is_fatal() {
    let mut options = headless(TerrainKind::Flat);
    options.actuated_joints = vec!["joint_LFWing".to_string()];
    assert!(matches!(
        FlyEnv::new(options),
        Err(PhysicsError::MissingJoint(_))
    ));
}

#[test]
fn viewer_rendering_is_unimplemented() {
    let mut options = headless(TerrainKind::Flat);
    options.render = RenderConfig::Viewer(tiny_recording());
    let mut env = FlyEnv::new(options).unwrap();
    env.reset().unwrap();
    assert!(matches!(env.render(), Err(PhysicsError::Unimplemented(_))));
}

#[test]
fn saved_rendering_follows_frame_rate() {
    let mut options = headless(TerrainKind::Flat);
    options.render = RenderConfig::Saved(tiny_recording());
    let mut env = FlyEnv::new(options).unwrap();
    let (obs, _) = env.reset().unwrap();
    let hold = Action::new(obs.joints.row(0).iter().copied().collect());

    // 0.1 s of simulated time at 60 fps
    for _ in 0..1000 {
        env.step(&hold).unwrap();
        env.render().unwrap();
    }
    let frames = env.frames().len();
    assert!((5..=7).contains(&frames), "got {frames} frames");
    assert!(env.frames().iter().all(|f| f.dimensions() == (8, 6)));
}

#[test]
fn close_saves_video_to_output_dir() {
    let out = tempfile::tempdir().unwrap();
    let output_dir = out.path().join("trial");
    let mut options = headless(TerrainKind::Flat);
    options.render = RenderConfig::Saved(tiny_recording());
    options.output_dir = Some(output_dir.clone());

    let mut env = FlyEnv::new(options).unwrap();
    env.reset().unwrap();
    for _ in 0..200 {
        env.step(&Action::zeros(3)).unwrap();
        env.render().unwrap();
    }
    assert!(!env.frames().is_empty());

    env.close().unwrap();
    assert_eq!(env.state(), EnvState::Closed);
    assert!(output_dir.join("video.gif").is_file());

    env.close().unwrap();
    assert!(matches!(env.step(&Action::zeros(3)), Err(PhysicsError::Closed)));
}

#[test]
fn environment_file_round_trip() {
    let text = r#"
        render_mode = "headless"
        actuated_joints = ["joint_RHTibia", "joint_RHTarsus1"]
        timestep = 2e-4
        terrain = "blocks"
        control = "velocity"
        init_pose = "stretch"

        [terrain_config]
        rand_seed = 7
        height_range = [200.0, 400.0]
    "#;
    let options = EnvOptions::from_toml_str(text).unwrap();
    let mut env = FlyEnv::new(options).unwrap();
    assert_eq!(env.actuated_joints().len(), 2);
    assert_eq!(env.timestep(), 2e-4);
    assert!(env.action_space().joints.high.is_infinite());

    env.reset().unwrap();
    env.step(&Action::zeros(2)).unwrap();
    assert_relative_eq!(env.curr_time(), 2e-4);
}
