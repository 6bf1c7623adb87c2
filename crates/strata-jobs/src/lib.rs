//! Priority-ordered worker pool for CPU-bound chunk work.
//!
//! Jobs are queued with a base priority and a world position; the effective
//! priority rises as the position gets closer to the current viewpoint. A
//! fixed set of named worker threads pops the most urgent job, runs it through
//! a [`JobExecutor`], and logs failures without dying.

mod error;
mod priority;
mod queue;
mod scheduler;

pub use error::JobError;
pub use priority::{BasePriority, effective_priority};
pub use queue::PriorityQueue;
pub use scheduler::{Job, JobExecutor, Scheduler, SchedulerConfig, SchedulerStats};
