//! Headless driver for a Strata world: platform directories, demo terrain
//! and a scripted camera that streams chunks in and out.

pub mod driver;
pub mod platform;
pub mod terrain;

use strata_config::ConfigError;
use strata_world::{StoreError, WorldError};

pub use driver::{CameraPath, RunSummary, run};
pub use platform::PlatformDirs;
pub use terrain::DemoTerrain;

/// Everything that can stop the app before its tick loop starts.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// The OS did not provide a configuration directory.
    #[error("could not determine OS configuration directory")]
    NoConfigDir,
    #[error("platform I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    World(#[from] WorldError),
}
