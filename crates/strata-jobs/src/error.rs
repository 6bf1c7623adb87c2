use thiserror::Error;

/// Errors produced by the scheduler or reported by a job body.
#[derive(Debug, Error)]
pub enum JobError {
    /// A worker thread could not be spawned.
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),
    /// The job ran but could not complete its work.
    #[error("job failed: {0}")]
    Failed(String),
}
