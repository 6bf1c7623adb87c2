use std::path::PathBuf;

use strata_jobs::JobError;
use thiserror::Error;

/// Errors from the chunk stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading or writing a stored entry failed.
    #[error("store I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The background store thread could not be started.
    #[error("failed to spawn store thread: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Errors surfaced by the world while it starts up or shuts down.
///
/// Nothing on the per-tick path returns these; contention and rejected
/// edits are logged and skipped instead.
#[derive(Debug, Error)]
pub enum WorldError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Jobs(#[from] JobError),
    /// A structure's block list does not fill its bounding box.
    #[error("structure needs {expected} blocks, got {actual}")]
    StructureSize { expected: usize, actual: usize },
}
