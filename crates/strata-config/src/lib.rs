//! Configuration for the Strata engine.
//!
//! Settings persist to disk as a RON file and can be overridden from the
//! command line. Unknown fields are ignored and missing ones take their
//! defaults, so config files survive upgrades in both directions.

mod cli;
mod config;
mod error;

pub use cli::CliArgs;
pub use config::{
    BudgetConfig, CONFIG_FILE, Config, DebugConfig, PersistenceConfig, SchedulerConfig,
    StoreBackend, WorldConfig,
};
pub use error::ConfigError;
