//! Command-line argument parsing for the Strata engine.

use std::path::PathBuf;

use clap::Parser;

use crate::Config;
use crate::config::StoreBackend;

/// Strata command-line arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug)]
#[command(name = "strata", about = "Headless streaming voxel world")]
pub struct CliArgs {
    /// View distance in chunks.
    #[arg(long)]
    pub view_distance: Option<u32>,

    /// Worker threads (0 = automatic).
    #[arg(long)]
    pub workers: Option<u32>,

    /// Seed for a newly created world.
    #[arg(long, allow_negative_numbers = true)]
    pub seed: Option<i32>,

    /// Save directory for chunk data.
    #[arg(long)]
    pub save_dir: Option<PathBuf>,

    /// Keep the world in memory only.
    #[arg(long)]
    pub in_memory: bool,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Ticks to run before shutting down.
    #[arg(long)]
    pub ticks: Option<u64>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(vd) = args.view_distance {
            self.world.view_distance = vd;
        }
        if let Some(workers) = args.workers {
            self.scheduler.workers = workers;
        }
        if let Some(seed) = args.seed {
            self.world.seed = seed;
        }
        if let Some(ref dir) = args.save_dir {
            self.persistence.save_dir = Some(dir.clone());
        }
        if args.in_memory {
            self.persistence.backend = StoreBackend::Memory;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
        if let Some(ticks) = args.ticks {
            self.debug.ticks = ticks;
        }
    }
}
