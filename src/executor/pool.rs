use super::completion::Completion;
use super::task::{Disposition, Task, TaskFn};
use super::worker::{Shared, Worker, WorkerId};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::telemetry::MetricsSnapshot;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// A fixed set of worker threads pulling from one shared FIFO queue.
///
/// A pool built with zero threads never executes anything in the
/// background: submitted tasks accumulate until [`flush`](Self::flush) runs
/// them on the calling thread.
pub struct ThreadPool {
    shared: Arc<Shared>,
    workers: Mutex<Vec<WorkerHandle>>,
    num_threads: usize,
    released: AtomicBool,
}

struct WorkerHandle {
    id: WorkerId,
    thread: Option<JoinHandle<()>>,
}

impl ThreadPool {
    /// Create a pool with exactly `thread_count` workers.
    ///
    /// More than [`MAX_THREADS`](crate::config::MAX_THREADS) workers fails with
    /// [`Error::ResourceExhausted`], as does a failed thread spawn.
    pub fn new(thread_count: usize) -> Result<Self> {
        let config = Config::builder().num_threads(thread_count).build()?;
        Self::with_config(&config)
    }

    /// Create a pool with `threads_per_core * max(1, cores + core_count_adjustment)`
    /// workers.
    ///
    /// The resolved count is capped at [`MAX_THREADS`](crate::config::MAX_THREADS);
    /// anything above fails with [`Error::ResourceExhausted`].
    pub fn per_core(threads_per_core: usize, core_count_adjustment: isize) -> Result<Self> {
        let config = Config::builder()
            .threads_per_core(threads_per_core, core_count_adjustment)
            .build()?;
        Self::with_config(&config)
    }

    pub fn with_config(config: &Config) -> Result<Self> {
        config.validate()?;

        let num_threads = config.worker_threads();
        let shared = Arc::new(Shared::new(num_threads, config.panic_strategy));

        let mut handles = Vec::with_capacity(num_threads);

        for id in 0..num_threads {
            let worker = Worker::new(id, shared.clone());
            let name = format!("{}-{}", config.thread_name_prefix, id);

            let mut builder = thread::Builder::new().name(name);

            if let Some(stack_size) = config.stack_size {
                builder = builder.stack_size(stack_size);
            }

            match builder.spawn(move || worker.run()) {
                Ok(thread) => handles.push(WorkerHandle {
                    id,
                    thread: Some(thread),
                }),
                Err(e) => {
                    tracing::error!(worker = id, error = %e, "failed to spawn worker");
                    // never hand back a half-built pool
                    shared.signal.raise_quit();
                    join_workers(&mut handles);
                    return Err(Error::resource_exhausted(format!(
                        "spawning worker {} of {} failed: {}",
                        id, num_threads, e
                    )));
                }
            }
        }

        tracing::debug!(
            num_threads,
            deferred = num_threads == 0,
            mode = ?config.threads,
            "thread pool created"
        );

        Ok(Self {
            shared,
            workers: Mutex::new(handles),
            num_threads,
            released: AtomicBool::new(false),
        })
    }

    /// Submit `numtimes` invocations of `callback`, numbered `0..numtimes`.
    ///
    /// With `block` set, returns only once every invocation has reached
    /// [`Disposition::Done`] (or was discarded by a purge). A zero-worker pool
    /// never blocks here; its tasks wait for [`flush`](Self::flush).
    ///
    /// `Ok(())` only means the tasks were accepted.
    pub fn run_task<F>(&self, callback: F, numtimes: usize, block: bool) -> Result<()>
    where
        F: Fn(usize) -> Disposition + Send + Sync + 'static,
    {
        let completion = self.enqueue(Arc::new(callback), numtimes, block)?;

        if let Some(completion) = completion {
            if self.num_threads == 0 {
                tracing::warn!(
                    numtimes,
                    "blocking submission on a zero-worker pool; tasks wait for flush"
                );
            } else {
                completion.wait();
            }
        }

        Ok(())
    }

    /// Submit a single task and return a handle to wait on.
    pub fn submit<F>(&self, callback: F) -> Result<Completion>
    where
        F: Fn(usize) -> Disposition + Send + Sync + 'static,
    {
        self.submit_batch(callback, 1)
    }

    /// Submit `numtimes` invocations without blocking and return the batch handle.
    pub fn submit_batch<F>(&self, callback: F, numtimes: usize) -> Result<Completion>
    where
        F: Fn(usize) -> Disposition + Send + Sync + 'static,
    {
        self.enqueue(Arc::new(callback), numtimes, true)?
            .ok_or_else(|| Error::invalid_state("tracked submission lost its completion"))
    }

    /// Fire-and-forget a one-shot closure.
    pub fn execute<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let slot = Mutex::new(Some(f));
        let callback = move |_: usize| {
            if let Some(f) = slot.lock().take() {
                f();
            }
            Disposition::Done
        };
        self.enqueue(Arc::new(callback), 1, false)?;
        Ok(())
    }

    fn enqueue(&self, callback: TaskFn, numtimes: usize, tracked: bool) -> Result<Option<Completion>> {
        let completion = tracked.then(Completion::new);

        // count every member before any of them can run
        let tasks = (0..numtimes).map(|i| Task::new(callback.clone(), i, completion.clone()));

        // the released flag is read under the queue lock, so a concurrent
        // `release` either rejects the batch or clears it after it lands
        let accepted = self.shared.queue.push_batch(
            || !self.is_released(),
            tasks,
            |_| {
                if let Some(completion) = &completion {
                    completion.add(1);
                }
            },
        );
        if !accepted {
            return Err(Error::released());
        }

        self.shared.metrics.record_submitted(numtimes);
        self.shared.signal.raise_run();

        Ok(completion)
    }

    /// Wait until the queue is empty, or until `timeout` elapses (`None` waits
    /// forever). Returns whether the queue emptied.
    ///
    /// Tasks already taken by a worker may still be running when this returns.
    /// On a zero-worker pool this flushes instead.
    pub fn wait_for_all_tasks(&self, timeout: Option<Duration>) -> Result<bool> {
        self.ensure_live()?;

        if self.num_threads == 0 {
            self.flush()?;
            return Ok(true);
        }

        Ok(self.shared.queue.wait_until_empty(timeout))
    }

    /// Discard every task that has not started yet and return how many were
    /// dropped. Their batches count them as discarded, so blocking submitters
    /// are released.
    pub fn purge_all_pending_tasks(&self) -> Result<usize> {
        self.ensure_live()?;
        Ok(self.discard_pending())
    }

    fn discard_pending(&self) -> usize {
        let discarded = self.shared.queue.clear();
        for task in &discarded {
            task.discard();
        }

        let count = discarded.len();
        if count > 0 {
            self.shared.metrics.record_purged(count);
            tracing::debug!(count, "purged pending tasks");
        }
        count
    }

    /// Run every queued task on the calling thread, in order, until the queue
    /// is empty. Requeued tasks are picked up again within the same call.
    pub fn flush(&self) -> Result<()> {
        self.ensure_live()?;

        let mut executed = 0usize;
        while let Some(task) = self.shared.queue.try_pop() {
            self.shared.dispatch(task);
            executed += 1;
        }

        tracing::debug!(executed, "flush complete");
        Ok(())
    }

    pub fn num_threads(&self) -> usize {
        self.num_threads
    }

    /// Number of tasks waiting in the queue.
    pub fn pending_tasks(&self) -> usize {
        self.shared.queue.len()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.shared.metrics.snapshot()
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    /// Purge pending work, stop every worker and join it.
    ///
    /// Every later call on this pool fails with [`Error::InvalidState`].
    pub fn release(&self) -> Result<()> {
        if self.released.swap(true, Ordering::AcqRel) {
            return Err(Error::released());
        }

        self.discard_pending();
        self.shared.signal.raise_quit();
        join_workers(&mut self.workers.lock());

        // anything that slipped in while workers were stopping
        self.discard_pending();

        tracing::debug!(num_threads = self.num_threads, "thread pool released");
        Ok(())
    }

    fn ensure_live(&self) -> Result<()> {
        if self.is_released() {
            return Err(Error::released());
        }
        Ok(())
    }
}

fn join_workers(handles: &mut [WorkerHandle]) {
    for worker in handles.iter_mut() {
        if let Some(thread) = worker.thread.take() {
            if thread.join().is_err() {
                tracing::error!(worker = worker.id, "worker thread panicked");
            }
        }
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        if !self.is_released() {
            let _ = self.release();
        }
    }
}

impl std::fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadPool")
            .field("num_threads", &self.num_threads)
            .field("pending_tasks", &self.pending_tasks())
            .field("released", &self.is_released())
            .finish()
    }
}
