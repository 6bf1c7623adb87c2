//! The binary entry point: streams a demo world along a scripted path.

use std::sync::Arc;

use clap::Parser;
use strata_app::{AppError, CameraPath, DemoTerrain, PlatformDirs, RunSummary, run};
use strata_config::{CliArgs, Config, StoreBackend};
use strata_mesh::UniformLight;
use strata_world::{ChunkState, ChunkStore, FileStore, MemoryStore, World, WorldMeta};

fn main() {
    if let Err(e) = start() {
        eprintln!("strata: {e}");
        std::process::exit(1);
    }
}

fn start() -> Result<(), AppError> {
    let args = CliArgs::parse();
    let dirs = PlatformDirs::resolve_and_create()?;
    let config_dir = args.config.clone().unwrap_or_else(|| dirs.config_dir.clone());
    let mut config = Config::load_or_create(&config_dir)?;
    config.apply_cli_overrides(&args);

    strata_log::init_logging(Some(&dirs.log_dir), cfg!(debug_assertions), Some(&config));

    let store: Arc<dyn ChunkStore> = match config.persistence.backend {
        StoreBackend::Memory => Arc::new(MemoryStore::new()),
        StoreBackend::Disk => Arc::new(FileStore::open(config.save_dir(&dirs.data_dir))?),
    };
    let settings = config.world_settings();
    // A saved world keeps the seed it was created with.
    let seed = WorldMeta::load_or(store.as_ref(), settings.seed).seed;
    let terrain = Arc::new(DemoTerrain::new(seed)?);

    let mut world = World::new(settings, terrain, Arc::new(UniformLight::default()), store)?;
    let summary = run(
        &mut world,
        &CameraPath::default(),
        config.debug.ticks,
        config.debug.report_interval,
    );
    world.shutdown();

    print_summary(seed, &summary);
    Ok(())
}

fn print_summary(seed: i32, summary: &RunSummary) {
    let stats = &summary.stats;
    println!("Strata world (seed {seed})");
    println!("  ticks:     {}", summary.ticks);
    println!("  started:   {}", summary.chunks_started);
    println!("  unloaded:  {}", summary.chunks_unloaded);
    println!("  dug out:   {}", summary.blocks_removed);
    println!("  loaded:    {} ({} created)", stats.chunks, stats.created_chunks);
    println!("  triangles: {}", stats.visible_triangles);
    println!(
        "  jobs:      {} done, {} failed, {} queued",
        stats.scheduler.completed, stats.scheduler.failed, stats.scheduler.queued
    );
    for state in ChunkState::ALL {
        let count = stats.states.get(&state).copied().unwrap_or(0);
        if count > 0 {
            println!("    {state:?}: {count}");
        }
    }
}
