//! Configuration structs with sensible defaults and RON persistence.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use strata_voxel::CHUNK_SIZE;
use strata_world::{BudgetSettings, DEFAULT_FRAME, WorldSettings};

use crate::error::ConfigError;

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// World shape and streaming.
    pub world: WorldConfig,
    /// Worker pool settings.
    pub scheduler: SchedulerConfig,
    /// Per-tick time budget.
    pub budget: BudgetConfig,
    /// Where chunks are saved.
    pub persistence: PersistenceConfig,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

/// World configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorldConfig {
    /// Chunks kept loaded in each horizontal direction.
    pub view_distance: u32,
    /// Outer rings that are kept but not streamed in.
    pub view_gap: u32,
    /// World height in blocks. Rounded up to whole chunks.
    pub world_height: u32,
    /// Largest distance in blocks a structure reaches from its anchor.
    pub structure_radius: u32,
    /// Extra slots per axis in the chunk index beyond the view.
    pub index_padding: u32,
    /// Seed for a new world. Existing worlds keep the seed they were
    /// created with.
    pub seed: i32,
}

/// Worker pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Worker threads (0 = one less than the number of cores).
    pub workers: u32,
    /// Queued jobs re-scored per tick.
    pub reprioritize_batch: u32,
    /// No new chunk jobs are queued while this many are waiting.
    pub max_queued_jobs: u32,
}

/// Per-tick budget. Deadlines are fractions of the frame: a step only
/// starts while less than that share of the frame has gone by.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BudgetConfig {
    /// Frame length in milliseconds.
    pub frame_ms: f64,
    pub start_work: f32,
    pub new_chunk: f32,
    pub flush: f32,
    pub finish_mesh: f32,
    pub generate_mesh: f32,
    pub mark_surrounding: f32,
    pub generate_blocks: f32,
    /// Processing-list entries re-scored per tick.
    pub processing_reprioritize_batch: u32,
}

/// Which chunk store backs the world.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum StoreBackend {
    /// Nothing survives the process.
    Memory,
    /// One file per chunk in the save directory.
    Disk,
}

/// Persistence configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PersistenceConfig {
    pub backend: StoreBackend,
    /// Save directory (defaults to `world` under the data directory).
    pub save_dir: Option<PathBuf>,
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
    /// Also write JSON logs to the log directory.
    pub log_to_file: bool,
    /// Ticks the headless driver runs before shutting down.
    pub ticks: u64,
    /// Print statistics every this many ticks (0 = only at the end).
    pub report_interval: u64,
}

// --- Default implementations ---

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            view_distance: 7,
            view_gap: 2,
            world_height: 128,
            structure_radius: 10,
            index_padding: 8,
            seed: 0,
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            workers: 0,
            reprioritize_batch: 400,
            max_queued_jobs: 2000,
        }
    }
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            frame_ms: DEFAULT_FRAME.as_micros() as f64 / 1000.0,
            start_work: 0.8,
            new_chunk: 0.8,
            flush: 0.8,
            finish_mesh: 0.4,
            generate_mesh: 0.5,
            mark_surrounding: 0.5,
            generate_blocks: 0.5,
            processing_reprioritize_batch: 400,
        }
    }
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Disk,
            save_dir: None,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_to_file: true,
            ticks: 600,
            report_interval: 120,
        }
    }
}

// --- Engine settings ---

impl Config {
    /// Engine settings described by this config.
    pub fn world_settings(&self) -> WorldSettings {
        let defaults = WorldSettings::default();
        let micros = (self.budget.frame_ms * 1000.0).round();
        let frame = if micros.is_finite() && micros >= 1.0 {
            Duration::from_micros(micros as u64)
        } else {
            DEFAULT_FRAME
        };
        let workers = match self.scheduler.workers {
            0 => defaults.scheduler.workers,
            n => n as usize,
        };
        WorldSettings {
            view_distance: self.world.view_distance as i32,
            view_gap: self.world.view_gap.min(self.world.view_distance) as i32,
            height_chunks: self.world.world_height.div_ceil(CHUNK_SIZE as u32).max(1) as i32,
            index_padding: self.world.index_padding as i32,
            structure_radius: self.world.structure_radius as i32,
            scheduler: strata_jobs::SchedulerConfig {
                workers,
                reprioritize_batch: self.scheduler.reprioritize_batch as usize,
                ..defaults.scheduler
            },
            max_queued_jobs: self.scheduler.max_queued_jobs as usize,
            processing_reprioritize_batch: self.budget.processing_reprioritize_batch as usize,
            budget: BudgetSettings {
                frame,
                start_work: self.budget.start_work,
                new_chunk: self.budget.new_chunk,
                flush: self.budget.flush,
                finish_mesh: self.budget.finish_mesh,
                generate_mesh: self.budget.generate_mesh,
                mark_surrounding: self.budget.mark_surrounding,
                generate_blocks: self.budget.generate_blocks,
            },
            seed: self.world.seed,
        }
    }

    /// Directory chunks are saved to, given the platform data directory.
    pub fn save_dir(&self, data_dir: &Path) -> PathBuf {
        self.persistence
            .save_dir
            .clone()
            .unwrap_or_else(|| data_dir.join("world"))
    }
}

// --- Load / Save / Reload ---

/// File name inside the config directory.
pub const CONFIG_FILE: &str = "config.ron";

impl Config {
    /// Reads `config.ron` from `config_dir`, writing the defaults there first
    /// if the file does not exist yet.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let path = config_dir.join(CONFIG_FILE);
        if !path.exists() {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("Created default config at {}", path.display());
            return Ok(config);
        }
        let config = Self::read(&path)?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        let path = config_dir.join(CONFIG_FILE);
        let write_error = |source| ConfigError::Write {
            path: path.clone(),
            source,
        };
        std::fs::create_dir_all(config_dir).map_err(write_error)?;

        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .enumerate_arrays(false);
        let serialized = ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::Serialize)?;
        std::fs::write(&path, serialized).map_err(write_error)
    }

    /// Re-reads the file. `Some` only when it differs from `self`.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let fresh = Self::read(&config_dir.join(CONFIG_FILE))?;
        if fresh == *self {
            return Ok(None);
        }
        log::info!("Config reloaded with changes");
        Ok(Some(fresh))
    }

    fn read(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        ron::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}
