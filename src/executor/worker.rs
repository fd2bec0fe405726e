// worker thread stuff
use super::queue::TaskQueue;
use super::signal::{Wake, WakeSignal};
use super::task::{Disposition, Task};
use super::unwind::PanicStrategy;
use crate::telemetry::Metrics;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

pub(crate) type WorkerId = usize;

/// Where a worker is in its wake/sleep cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WorkerState {
    Parked,
    Draining,
    Terminated,
}

/// State shared between the pool handle and its workers.
#[derive(Debug)]
pub(crate) struct Shared {
    pub queue: TaskQueue,
    pub signal: WakeSignal,
    pub metrics: Metrics,
    pub panic_strategy: PanicStrategy,
}

impl Shared {
    pub fn new(worker_count: usize, panic_strategy: PanicStrategy) -> Self {
        Self {
            queue: TaskQueue::new(),
            signal: WakeSignal::new(worker_count),
            metrics: Metrics::new(),
            panic_strategy,
        }
    }

    /// Run a dequeued task until it returns something other than `Rerun`, then
    /// either settle its completion or push it back onto the queue.
    ///
    /// Used by workers and by `flush` on the caller's thread.
    pub fn dispatch(&self, task: Task) -> Disposition {
        let disposition = loop {
            let start = Instant::now();
            let result = self.panic_strategy.invoke(&task);
            self.metrics.record_invocation(start.elapsed());

            match result {
                Some(Disposition::Rerun) => self.metrics.record_rerun(),
                Some(disposition) => break disposition,
                None => {
                    // a panicked task is finished as far as waiters are concerned
                    self.metrics.record_panic();
                    break Disposition::Done;
                }
            }
        };

        tracing::trace!(sequence = task.sequence, ?disposition, "task dispatched");

        match disposition {
            Disposition::Requeue => {
                self.metrics.record_requeue();
                self.queue.push(task);
                self.signal.raise_run();
            }
            Disposition::Done | Disposition::Rerun => {
                self.metrics.record_completed();
                task.finish();
            }
        }

        disposition
    }
}

pub(crate) struct Worker {
    pub id: WorkerId,
    shared: Arc<Shared>,
    state: WorkerState,
}

impl Worker {
    pub fn new(id: WorkerId, shared: Arc<Shared>) -> Self {
        Self {
            id,
            shared,
            state: WorkerState::Parked,
        }
    }

    // main loop
    pub fn run(mut self) {
        tracing::debug!(worker = self.id, "worker started");

        loop {
            self.state = match self.state {
                WorkerState::Parked => match self.shared.signal.wait() {
                    Wake::Run => WorkerState::Draining,
                    Wake::Quit => WorkerState::Terminated,
                },
                WorkerState::Draining => {
                    let executed = self.drain();
                    tracing::trace!(worker = self.id, executed, "worker parked");
                    WorkerState::Parked
                }
                WorkerState::Terminated => break,
            };
        }

        tracing::debug!(worker = self.id, "worker stopped");
    }

    /// Execute at most the tasks that were queued when the worker woke, then
    /// give the CPU back. Anything queued later raised its own run signal.
    fn drain(&self) -> usize {
        let mut budget = self.shared.queue.len();
        let mut executed = 0;

        while budget > 0 {
            let Some(task) = self.shared.queue.try_pop() else {
                break;
            };
            self.shared.dispatch(task);
            executed += 1;
            budget -= 1;
            thread::yield_now();
        }

        executed
    }
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("id", &self.id)
            .field("state", &self.state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::completion::Completion;
    use crate::executor::task::TaskFn;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn shared(worker_count: usize) -> Arc<Shared> {
        Arc::new(Shared::new(worker_count, PanicStrategy::Isolate))
    }

    fn tracked(callback: TaskFn) -> (Task, Completion) {
        let completion = Completion::new();
        completion.add(1);
        (Task::new(callback, 0, Some(completion.clone())), completion)
    }

    #[test]
    fn test_rerun_stays_off_the_queue() {
        let shared = shared(0);
        let calls = Arc::new(AtomicUsize::new(0));
        let seen_in_queue = Arc::new(AtomicUsize::new(0));

        let observer = shared.clone();
        let (calls_c, seen_c) = (calls.clone(), seen_in_queue.clone());
        let (task, completion) = tracked(Arc::new(move |_: usize| {
            seen_c.fetch_add(observer.queue.len(), Ordering::SeqCst);
            if calls_c.fetch_add(1, Ordering::SeqCst) < 4 {
                Disposition::Rerun
            } else {
                Disposition::Done
            }
        }));

        assert_eq!(shared.dispatch(task), Disposition::Done);
        assert_eq!(calls.load(Ordering::SeqCst), 5);
        assert_eq!(seen_in_queue.load(Ordering::SeqCst), 0);
        assert!(completion.is_complete());

        let snapshot = shared.metrics.snapshot();
        assert_eq!(snapshot.reruns, 4);
        assert_eq!(snapshot.invocations, 5);
    }

    #[test]
    fn test_requeue_goes_to_tail() {
        let shared = shared(0);
        let calls = Arc::new(AtomicUsize::new(0));

        let calls_c = calls.clone();
        let (task, completion) = tracked(Arc::new(move |_: usize| {
            if calls_c.fetch_add(1, Ordering::SeqCst) < 3 {
                Disposition::Requeue
            } else {
                Disposition::Done
            }
        }));

        let mut dequeues = 0;
        shared.queue.push(task);
        while let Some(task) = shared.queue.try_pop() {
            dequeues += 1;
            let disposition = shared.dispatch(task);
            if disposition == Disposition::Requeue {
                assert_eq!(shared.queue.len(), 1);
                assert_eq!(completion.pending(), 1);
            }
        }

        assert_eq!(dequeues, 4);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert!(completion.is_complete());
        assert_eq!(shared.metrics.snapshot().requeues, 3);
    }

    #[test]
    fn test_panicking_task_settles_completion() {
        let shared = shared(0);
        let (task, completion) = tracked(Arc::new(|_: usize| -> Disposition { panic!("boom") }));

        assert_eq!(shared.dispatch(task), Disposition::Done);
        assert!(completion.is_complete());
        assert_eq!(shared.metrics.snapshot().tasks_panicked, 1);
    }

    #[test]
    fn test_worker_drains_and_terminates() {
        let shared = shared(1);
        let counter = Arc::new(AtomicUsize::new(0));
        let completion = Completion::new();

        let counter_c = counter.clone();
        let callback: TaskFn = Arc::new(move |_| {
            counter_c.fetch_add(1, Ordering::SeqCst);
            Disposition::Done
        });
        completion.add(10);
        for i in 0..10 {
            shared
                .queue
                .push(Task::new(callback.clone(), i, Some(completion.clone())));
        }

        let worker = Worker::new(0, shared.clone());
        let handle = thread::spawn(move || worker.run());

        shared.signal.raise_run();
        completion.wait();
        assert_eq!(counter.load(Ordering::SeqCst), 10);

        shared.signal.raise_quit();
        handle.join().unwrap();
    }
}
