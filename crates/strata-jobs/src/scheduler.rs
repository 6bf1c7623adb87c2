//! Fixed worker pool draining a shared priority queue.
//!
//! The queue, the per-worker "current job" slots and the shutdown flag all sit
//! behind one mutex so that cancellation sees a consistent picture: a job is
//! either queued, running on exactly one worker, or gone.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use glam::Vec3;

use crate::error::JobError;
use crate::priority::BasePriority;
use crate::queue::PriorityQueue;

/// A unit of work the scheduler can queue.
pub trait Job: Send + 'static {
    /// Identifies what the job works on. Cancellation and the "try" variant
    /// of scheduling match on it.
    type Context: Clone + PartialEq + fmt::Debug + Send + 'static;

    fn context(&self) -> Self::Context;

    /// Short static name used in log lines.
    fn label(&self) -> &'static str;
}

/// Runs jobs on worker threads.
pub trait JobExecutor<J>: Send + Sync + 'static {
    fn execute(&self, job: J) -> Result<(), JobError>;
}

impl<J, F> JobExecutor<J> for F
where
    F: Fn(J) -> Result<(), JobError> + Send + Sync + 'static,
{
    fn execute(&self, job: J) -> Result<(), JobError> {
        self(job)
    }
}

/// Worker pool settings.
#[derive(Clone, Debug)]
pub struct SchedulerConfig {
    /// Number of worker threads. Zero is treated as one.
    pub workers: usize,
    /// Queued jobs revisited per [`Scheduler::reprioritize`] call.
    pub reprioritize_batch: usize,
    /// Prefix for worker thread names.
    pub thread_name: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            workers: num_cpus::get().saturating_sub(1).max(1),
            reprioritize_batch: 400,
            thread_name: "strata-worker".to_string(),
        }
    }
}

/// Counters describing scheduler activity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub queued: usize,
    pub running: usize,
    pub completed: u64,
    pub failed: u64,
}

struct State<J: Job> {
    queue: PriorityQueue<J>,
    running: Vec<Option<J::Context>>,
    shutdown: bool,
}

struct Shared<J: Job> {
    state: Mutex<State<J>>,
    work_available: Condvar,
    executor: Box<dyn JobExecutor<J>>,
    worker_count: usize,
    completed: AtomicU64,
    failed: AtomicU64,
}

impl<J: Job> Shared<J> {
    fn lock(&self) -> MutexGuard<'_, State<J>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Priority scheduler backed by a pool of named worker threads.
///
/// Dropping the scheduler shuts it down and joins the workers.
pub struct Scheduler<J: Job> {
    shared: Arc<Shared<J>>,
    workers: Vec<JoinHandle<()>>,
    reprioritize_batch: usize,
}

impl<J: Job> Scheduler<J> {
    /// Spawns the worker pool.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::Spawn`] if a worker thread cannot be created. Any
    /// workers already started are stopped before returning.
    pub fn new(config: SchedulerConfig, executor: impl JobExecutor<J>) -> Result<Self, JobError> {
        let worker_count = config.workers.max(1);
        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                queue: PriorityQueue::new(),
                running: vec![None; worker_count],
                shutdown: false,
            }),
            work_available: Condvar::new(),
            executor: Box::new(executor),
            worker_count,
            completed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        });

        let mut scheduler = Self {
            shared,
            workers: Vec::with_capacity(worker_count),
            reprioritize_batch: config.reprioritize_batch.max(1),
        };
        for index in 0..worker_count {
            let shared = Arc::clone(&scheduler.shared);
            let handle = thread::Builder::new()
                .name(format!("{}-{index}", config.thread_name))
                .spawn(move || worker_loop(index, shared))
                .map_err(JobError::Spawn)?;
            scheduler.workers.push(handle);
        }
        tracing::debug!(workers = worker_count, "scheduler started");
        Ok(scheduler)
    }

    /// Queues `job` and returns `true`. Jobs submitted after shutdown are
    /// dropped and `false` is returned.
    pub fn schedule(&self, job: J, base: BasePriority, position: Vec3) -> bool {
        let mut state = self.shared.lock();
        self.enqueue(&mut state, job, base, position)
    }

    /// Like [`Scheduler::schedule`], but refuses the job when another job for
    /// the same context is queued or running.
    pub fn try_schedule(&self, job: J, base: BasePriority, position: Vec3) -> bool {
        let mut state = self.shared.lock();
        let context = job.context();
        let running = state.running.iter().flatten().any(|c| *c == context);
        if running || state.queue.any(|queued| queued.context() == context) {
            return false;
        }
        self.enqueue(&mut state, job, base, position)
    }

    fn enqueue(&self, state: &mut State<J>, job: J, base: BasePriority, position: Vec3) -> bool {
        if state.shutdown {
            tracing::debug!(job = job.label(), "dropping job submitted after shutdown");
            return false;
        }
        state.queue.push(job, base, position);
        if state.queue.len() <= self.shared.worker_count {
            self.shared.work_available.notify_one();
        }
        true
    }

    /// Removes every queued job for `context`. Returns whether any were
    /// removed. A job that has already started is unaffected.
    pub fn cancel(&self, context: &J::Context) -> bool {
        let removed = self.shared.lock().queue.remove_where(|job| job.context() == *context);
        if removed > 0 {
            tracing::trace!(?context, removed, "cancelled queued jobs");
        }
        removed > 0
    }

    /// Whether a job for `context` is currently executing.
    pub fn is_running(&self, context: &J::Context) -> bool {
        self.shared.lock().running.iter().flatten().any(|c| c == context)
    }

    /// Whether a job for `context` is queued or executing.
    pub fn is_pending(&self, context: &J::Context) -> bool {
        let state = self.shared.lock();
        state.running.iter().flatten().any(|c| c == context)
            || state.queue.any(|job| job.context() == *context)
    }

    /// Moves the point priorities are measured from. Already queued jobs are
    /// re-scored gradually by [`Scheduler::reprioritize`].
    pub fn set_viewpoint(&self, viewpoint: Vec3) {
        self.shared.lock().queue.set_viewpoint(viewpoint);
    }

    /// Re-scores the next batch of queued jobs against the current viewpoint.
    /// Returns how many were visited.
    pub fn reprioritize(&self) -> usize {
        self.shared.lock().queue.reprioritize(self.reprioritize_batch)
    }

    pub fn queue_len(&self) -> usize {
        self.shared.lock().queue.len()
    }

    pub fn worker_count(&self) -> usize {
        self.shared.worker_count
    }

    pub fn stats(&self) -> SchedulerStats {
        let state = self.shared.lock();
        SchedulerStats {
            queued: state.queue.len(),
            running: state.running.iter().flatten().count(),
            completed: self.shared.completed.load(Ordering::Relaxed),
            failed: self.shared.failed.load(Ordering::Relaxed),
        }
    }

    /// Stops the workers after their current job and joins them. Queued jobs
    /// that never started are discarded.
    pub fn shutdown(&mut self) {
        {
            let mut state = self.shared.lock();
            if state.shutdown && self.workers.is_empty() {
                return;
            }
            state.shutdown = true;
            let dropped = state.queue.remove_where(|_| true);
            if dropped > 0 {
                tracing::debug!(dropped, "discarding queued jobs on shutdown");
            }
        }
        self.shared.work_available.notify_all();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                tracing::error!("worker thread panicked outside a job");
            }
        }
    }
}

impl<J: Job> Drop for Scheduler<J> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop<J: Job>(index: usize, shared: Arc<Shared<J>>) {
    loop {
        let job = {
            let mut state = shared.lock();
            loop {
                if state.shutdown {
                    return;
                }
                if let Some(job) = state.queue.pop() {
                    state.running[index] = Some(job.context());
                    break job;
                }
                state = shared
                    .work_available
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner);
            }
        };

        let label = job.label();
        let context = job.context();
        match panic::catch_unwind(AssertUnwindSafe(|| shared.executor.execute(job))) {
            Ok(Ok(())) => {
                shared.completed.fetch_add(1, Ordering::Relaxed);
            }
            Ok(Err(err)) => {
                shared.failed.fetch_add(1, Ordering::Relaxed);
                tracing::error!(job = label, ?context, error = %err, "job failed");
            }
            Err(payload) => {
                shared.failed.fetch_add(1, Ordering::Relaxed);
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                tracing::error!(job = label, ?context, %message, "job panicked");
            }
        }

        shared.lock().running[index] = None;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;
    use std::time::{Duration, Instant};

    use super::*;

    #[derive(Debug)]
    enum TestJob {
        /// Blocks its worker until the paired sender fires.
        Gate(u32, Mutex<mpsc::Receiver<()>>),
        Record(u32),
        Fail(u32),
        Panic(u32),
    }

    impl Job for TestJob {
        type Context = u32;

        fn context(&self) -> u32 {
            match self {
                TestJob::Gate(id, _) | TestJob::Record(id) | TestJob::Fail(id) | TestJob::Panic(id) => {
                    *id
                }
            }
        }

        fn label(&self) -> &'static str {
            "test"
        }
    }

    fn recording_scheduler(workers: usize) -> (Scheduler<TestJob>, Arc<Mutex<Vec<u32>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        let config = SchedulerConfig {
            workers,
            reprioritize_batch: 400,
            thread_name: "test-worker".to_string(),
        };
        let scheduler = Scheduler::new(config, move |job: TestJob| {
            match job {
                TestJob::Gate(_, rx) => {
                    let _ = rx.lock().unwrap().recv_timeout(Duration::from_secs(5));
                }
                TestJob::Record(id) => sink.lock().unwrap().push(id),
                TestJob::Fail(id) => return Err(JobError::Failed(format!("job {id}"))),
                TestJob::Panic(_) => panic!("boom"),
            }
            Ok(())
        })
        .expect("spawn workers");
        (scheduler, log)
    }

    fn wait_until(mut condition: impl FnMut() -> bool) {
        let start = Instant::now();
        while !condition() {
            assert!(start.elapsed() < Duration::from_secs(5), "timed out");
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    fn gate(scheduler: &Scheduler<TestJob>, id: u32) -> mpsc::Sender<()> {
        let (tx, rx) = mpsc::channel();
        scheduler.schedule(TestJob::Gate(id, Mutex::new(rx)), BasePriority::High, Vec3::ZERO);
        wait_until(|| scheduler.is_running(&id));
        tx
    }

    #[test]
    fn test_runs_nearest_first() {
        let (scheduler, log) = recording_scheduler(1);
        let release = gate(&scheduler, 0);

        scheduler.schedule(TestJob::Record(10), BasePriority::Low, Vec3::new(10.0, 0.0, 0.0));
        scheduler.schedule(TestJob::Record(1), BasePriority::Low, Vec3::new(0.0, 1.0, 0.0));
        scheduler.schedule(TestJob::Record(5), BasePriority::Low, Vec3::new(0.0, 0.0, 5.0));
        release.send(()).unwrap();

        wait_until(|| log.lock().unwrap().len() == 3);
        assert_eq!(*log.lock().unwrap(), vec![1, 5, 10]);
    }

    #[test]
    fn test_cancel_before_start() {
        let (scheduler, log) = recording_scheduler(1);
        let release = gate(&scheduler, 0);

        scheduler.schedule(TestJob::Record(7), BasePriority::Low, Vec3::ZERO);
        scheduler.schedule(TestJob::Record(8), BasePriority::Low, Vec3::ZERO);
        assert!(scheduler.cancel(&7));
        assert!(!scheduler.cancel(&7));
        release.send(()).unwrap();

        wait_until(|| log.lock().unwrap().len() == 1);
        wait_until(|| scheduler.stats().running == 0);
        assert_eq!(*log.lock().unwrap(), vec![8]);
    }

    #[test]
    fn test_cancel_running_job_not_found() {
        let (scheduler, _log) = recording_scheduler(1);
        let release = gate(&scheduler, 3);
        assert!(!scheduler.cancel(&3));
        assert!(scheduler.is_running(&3));
        release.send(()).unwrap();
        wait_until(|| !scheduler.is_pending(&3));
    }

    #[test]
    fn test_try_schedule_rejects_bound_context() {
        let (scheduler, log) = recording_scheduler(1);
        let release = gate(&scheduler, 4);

        assert!(!scheduler.try_schedule(TestJob::Record(4), BasePriority::Low, Vec3::ZERO));
        assert!(scheduler.try_schedule(TestJob::Record(9), BasePriority::Low, Vec3::ZERO));
        assert!(!scheduler.try_schedule(TestJob::Record(9), BasePriority::Low, Vec3::ZERO));
        release.send(()).unwrap();

        wait_until(|| log.lock().unwrap().len() == 1);
        assert_eq!(*log.lock().unwrap(), vec![9]);
    }

    #[test]
    fn test_failures_do_not_kill_workers() {
        let (scheduler, log) = recording_scheduler(2);
        scheduler.schedule(TestJob::Fail(1), BasePriority::Low, Vec3::ZERO);
        scheduler.schedule(TestJob::Panic(2), BasePriority::Low, Vec3::ZERO);
        wait_until(|| scheduler.stats().failed == 2);

        scheduler.schedule(TestJob::Record(3), BasePriority::Low, Vec3::ZERO);
        wait_until(|| log.lock().unwrap().len() == 1);
        wait_until(|| scheduler.stats().completed == 1);
        let stats = scheduler.stats();
        assert_eq!(stats.failed, 2);
        assert_eq!(stats.queued, 0);
    }

    #[test]
    fn test_many_jobs_all_run() {
        let (scheduler, log) = recording_scheduler(4);
        for id in 0..200 {
            scheduler.schedule(TestJob::Record(id), BasePriority::Medium, Vec3::splat(id as f32));
        }
        wait_until(|| log.lock().unwrap().len() == 200);
        let mut seen = log.lock().unwrap().clone();
        seen.sort_unstable();
        assert_eq!(seen, (0..200).collect::<Vec<_>>());
    }

    #[test]
    fn test_shutdown_discards_queue_and_rejects_new_jobs() {
        let (mut scheduler, log) = recording_scheduler(1);
        let release = gate(&scheduler, 0);
        scheduler.schedule(TestJob::Record(1), BasePriority::Low, Vec3::ZERO);

        let releaser = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            let _ = release.send(());
        });
        scheduler.shutdown();
        releaser.join().unwrap();

        assert!(!scheduler.schedule(TestJob::Record(2), BasePriority::Low, Vec3::ZERO));
        assert!(log.lock().unwrap().is_empty());
        assert_eq!(scheduler.stats().completed, 1);
    }

    #[test]
    fn test_viewpoint_and_reprioritize() {
        let (scheduler, log) = recording_scheduler(1);
        let release = gate(&scheduler, 0);

        for id in 1..=3 {
            scheduler.schedule(TestJob::Record(id), BasePriority::Low, Vec3::new(id as f32 * 10.0, 0.0, 0.0));
        }
        scheduler.set_viewpoint(Vec3::new(30.0, 0.0, 0.0));
        assert_eq!(scheduler.reprioritize(), 3);
        release.send(()).unwrap();

        wait_until(|| log.lock().unwrap().len() == 3);
        assert_eq!(*log.lock().unwrap(), vec![3, 2, 1]);
    }
}
