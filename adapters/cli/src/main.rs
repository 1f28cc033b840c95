#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter for inspecting configurations and driving the mob
//! limiter against a simulated world.

mod simulation;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use mob_limiter_activity_log::ActivityLog;
use mob_limiter_config::ConfigStore;
use mob_limiter_core::{ActivityCategory, ActivityRecord, ActivitySink, Feature, PolicyConfig};
use tracing_subscriber::EnvFilter;

use crate::simulation::Settings;

#[derive(Parser, Debug)]
#[command(
    name = "mob-limiter",
    version,
    about = "Hostile mob population limiter"
)]
struct Cli {
    /// Emit debug diagnostics regardless of `RUST_LOG`.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand, Debug)]
enum CliCommand {
    /// Load a configuration file and print the resulting snapshot.
    CheckConfig {
        /// Path to the TOML configuration.
        path: PathBuf,
    },
    /// Switch a feature on or off and persist the change.
    Toggle {
        /// Path to the TOML configuration.
        path: PathBuf,
        /// Feature name: global-limit, mob-limits, low-health-delay,
        /// death-cleanup or logging.
        feature: Feature,
        /// New state of the feature.
        state: Switch,
        /// Directory receiving an activity record of the change.
        #[arg(long)]
        log_dir: Option<PathBuf>,
    },
    /// Run the policies against a randomised world.
    Simulate {
        /// Path to the TOML configuration, created with defaults if missing.
        #[arg(long)]
        config: PathBuf,
        /// Seed for every random decision.
        #[arg(long, default_value_t = 0)]
        seed: u64,
        /// Number of simulated ticks.
        #[arg(long, default_value_t = 200)]
        ticks: u64,
        /// Re-read the configuration every N ticks.
        #[arg(long)]
        reload_every: Option<u64>,
        /// Directory receiving the activity log.
        #[arg(long)]
        log_dir: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Switch {
    On,
    Off,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        CliCommand::CheckConfig { path } => check_config(path),
        CliCommand::Toggle {
            path,
            feature,
            state,
            log_dir,
        } => toggle(path, feature, state == Switch::On, log_dir),
        CliCommand::Simulate {
            config,
            seed,
            ticks,
            reload_every,
            log_dir,
        } => {
            let report = simulation::run(&Settings {
                config,
                seed,
                ticks,
                reload_every,
                log_dir,
            })?;
            println!("{report}");
            Ok(())
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn check_config(path: PathBuf) -> Result<()> {
    let (config, warnings) = mob_limiter_config::load(&path)
        .with_context(|| format!("failed to load configuration from {}", path.display()))?;

    for warning in &warnings {
        println!("warning: {warning}");
    }
    print!("{}", describe(&config));
    Ok(())
}

fn toggle(path: PathBuf, feature: Feature, enabled: bool, log_dir: Option<PathBuf>) -> Result<()> {
    let (mut store, _) = ConfigStore::open(&path)
        .with_context(|| format!("failed to open configuration at {}", path.display()))?;
    store
        .toggle(feature, enabled)
        .with_context(|| format!("failed to persist {feature} toggle"))?;

    let state = if enabled { "enabled" } else { "disabled" };
    if let Some(dir) = log_dir {
        let mut log = ActivityLog::create(&dir, store.snapshot().logging_enabled)
            .context("failed to create activity log")?;
        log.record(ActivityRecord::new(
            ActivityCategory::Toggle,
            format!("Feature {feature} {state}"),
        ));
    }
    println!("{feature} {state}");
    Ok(())
}

fn describe(config: &PolicyConfig) -> String {
    let mut lines = Vec::new();
    for feature in Feature::ALL {
        let state = if config.is_enabled(feature) { "on" } else { "off" };
        lines.push(format!("{feature}: {state}"));
    }
    lines.push(format!("global-hostile-limit: {}", config.global_ceiling));
    for (kind, ceiling) in &config.category_ceilings {
        lines.push(format!("mob-limits.{kind}: {ceiling}"));
    }
    lines.push(format!("low-health-threshold: {}", config.vitality_threshold));
    lines.push(format!("spawn-delay-radius: {}", config.throttle_radius));
    lines.push(format!("spawn-delay-chance: {}", config.throttle_chance));
    lines.push(format!("death-mob-cleanup-radius: {}", config.cleanup_radius));
    lines.push(format!("death-mob-threshold: {}", config.cleanup_threshold));
    lines.push(format!("death-mob-kill-percentage: {}", config.cleanup_fraction));

    let mut out = lines.join("\n");
    out.push('\n');
    out
}
