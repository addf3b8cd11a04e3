//! flygym CLI - NeuroMechFly rollouts from the terminal
//!
//! Runs the environment from a TOML environment file, lists the actuatable
//! DoFs and prints information about the bundled body model.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use flygym_physics::{Action, EnvOptions, FlyEnv, Observation};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "flygym")]
#[command(about = "NeuroMechFly physics environment", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a rollout with a fixed policy
    Run {
        /// Environment file (defaults are used when omitted)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Number of steps to simulate
        #[arg(short, long, default_value_t = 1000)]
        steps: usize,
        /// Output directory for the recorded video
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Policy producing the actions
        #[arg(short, long, value_enum, default_value_t = Policy::Hold)]
        action: Policy,
    },
    /// List the actuatable DoFs in default order
    Dofs,
    /// Display information about the bundled body model
    Info,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Policy {
    /// All controls zero
    Zero,
    /// Hold the initial joint angles
    Hold,
    /// Oscillate around the initial joint angles
    Sine,
}

/// Frequency and amplitude of the `sine` policy.
const SINE_HZ: f64 = 10.0;
const SINE_AMPLITUDE: f64 = 0.3;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            steps,
            output,
            action,
        } => {
            run(config.as_deref(), steps, output, action)?;
        }
        Commands::Dofs => {
            for (i, dof) in flygym_ir::all_leg_dofs().iter().enumerate() {
                println!("{:2}  {}", i, dof);
            }
        }
        Commands::Info => {
            show_info()?;
        }
    }

    Ok(())
}

fn load_options(config: Option<&Path>) -> Result<EnvOptions> {
    let Some(path) = config else {
        return Ok(EnvOptions::default());
    };
    log::debug!("loading environment file {}", path.display());
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    EnvOptions::from_toml_str(&text)
        .with_context(|| format!("invalid environment file {}", path.display()))
}

fn run(config: Option<&Path>, steps: usize, output: Option<PathBuf>, policy: Policy) -> Result<()> {
    let mut options = load_options(config)?;
    if output.is_some() {
        options.output_dir = output;
    }

    let mut env = FlyEnv::new(options).context("failed to create environment")?;
    let (obs, _) = env.reset()?;
    let initial: Vec<f64> = obs.joints.row(0).iter().copied().collect();

    let mut last = obs;
    for _ in 0..steps {
        let action = policy_action(policy, &initial, env.curr_time());
        last = env.step(&action)?.0;
        env.render()?;
    }

    print_summary(&env, &last);
    let frames = env.frames().len();
    env.close()?;
    if let Some(dir) = env.output_dir() {
        if frames > 0 {
            println!("Saved {} frames to {}", frames, dir.join("video.gif").display());
        }
    }
    Ok(())
}

fn policy_action(policy: Policy, initial: &[f64], time: f64) -> Action {
    match policy {
        Policy::Zero => Action::zeros(initial.len()),
        Policy::Hold => Action::new(initial.to_vec()),
        Policy::Sine => {
            let offset = SINE_AMPLITUDE * (std::f64::consts::TAU * SINE_HZ * time).sin();
            Action::new(initial.iter().map(|q| q + offset).collect())
        }
    }
}

fn print_summary(env: &FlyEnv, obs: &Observation) {
    println!("Simulated {:.4} s ({} DoFs)", env.curr_time(), env.actuated_joints().len());
    println!(
        "  Thorax position: ({:.1}, {:.1}, {:.1})",
        obs.fly[(0, 0)],
        obs.fly[(0, 1)],
        obs.fly[(0, 2)]
    );
    println!(
        "  Thorax orientation: ({:.3}, {:.3}, {:.3})",
        obs.fly[(2, 0)],
        obs.fly[(2, 1)],
        obs.fly[(2, 2)]
    );
    for (i, joint) in env.actuated_joints().iter().enumerate() {
        println!(
            "  {:<20} angle {:>8.3}  velocity {:>9.3}  torque {:>9.3e}",
            joint,
            obs.joints[(0, i)],
            obs.joints[(1, i)],
            obs.joints[(2, i)]
        );
    }
}

fn show_info() -> Result<()> {
    let model = flygym_physics::bundled_model().context("failed to load body model")?;

    println!("Body model: {}", model.name);
    println!("  Version: {}", model.version);
    println!("  Bodies: {}", model.bodies.len());
    println!("  Joints: {}", model.joints().count());
    println!("  Actuators: {}", model.actuators.len());
    if let Some(root) = model.root() {
        println!("  Root: {}", root.name);
    }

    println!("\nDefaults:");
    let options = EnvOptions::default();
    println!("  Render mode: {}", options.render.mode());
    println!("  Terrain: {}", options.terrain.kind());
    println!("  Control: {}", options.control);
    println!("  Timestep: {}", options.timestep);
    println!("  Actuated DoFs: {}", options.actuated_joints.len());

    Ok(())
}
