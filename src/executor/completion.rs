//! Batch completion tracking.
//!
//! Every `run_task` call gets one [`Completion`]. It is incremented once per
//! member task before that task is enqueued and decremented exactly once when
//! the task reaches [`Disposition::Done`](super::Disposition::Done) or is
//! discarded by a purge. Waiters spin briefly and then block on a condition
//! variable until the count reaches zero.

use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Polls a waiter makes before parking on the condvar.
const SPIN_ROUNDS: u32 = 6;

#[derive(Debug)]
struct Inner {
    pending: AtomicUsize,
    discarded: AtomicUsize,
    lock: Mutex<()>,
    cvar: Condvar,
}

/// Handle to the outstanding tasks of one submission.
#[derive(Debug, Clone)]
pub struct Completion {
    inner: Arc<Inner>,
}

impl Completion {
    pub(crate) fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                pending: AtomicUsize::new(0),
                discarded: AtomicUsize::new(0),
                lock: Mutex::new(()),
                cvar: Condvar::new(),
            }),
        }
    }

    pub(crate) fn add(&self, count: usize) {
        self.inner.pending.fetch_add(count, Ordering::AcqRel);
    }

    pub(crate) fn complete_one(&self) {
        let prev = self.inner.pending.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(prev > 0, "completion settled more times than tasks submitted");
        if prev == 1 {
            let _guard = self.inner.lock.lock();
            self.inner.cvar.notify_all();
        }
    }

    pub(crate) fn discard_one(&self) {
        self.inner.discarded.fetch_add(1, Ordering::Relaxed);
        self.complete_one();
    }

    /// Number of member tasks that have not reached a terminal disposition.
    pub fn pending(&self) -> usize {
        self.inner.pending.load(Ordering::Acquire)
    }

    /// Number of member tasks that were purged before they ran.
    pub fn discarded(&self) -> usize {
        self.inner.discarded.load(Ordering::Relaxed)
    }

    pub fn is_complete(&self) -> bool {
        self.pending() == 0
    }

    // Short batches usually finish before a waiter would have parked.
    fn spin_until_complete(&self) -> bool {
        for round in 0..SPIN_ROUNDS {
            if self.is_complete() {
                return true;
            }
            if round < SPIN_ROUNDS / 2 {
                for _ in 0..(1u32 << round) {
                    std::hint::spin_loop();
                }
            } else {
                thread::yield_now();
            }
        }
        self.is_complete()
    }

    /// Block until every member task is done or discarded.
    pub fn wait(&self) {
        if self.spin_until_complete() {
            return;
        }

        let mut guard = self.inner.lock.lock();
        while !self.is_complete() {
            self.inner.cvar.wait(&mut guard);
        }
    }

    /// Like [`wait`](Self::wait) but gives up after `timeout`.
    ///
    /// Returns `true` if the batch completed in time.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        if self.spin_until_complete() {
            return true;
        }

        let mut guard = self.inner.lock.lock();
        while !self.is_complete() {
            if self.inner.cvar.wait_until(&mut guard, deadline).timed_out() {
                return self.is_complete();
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_completion_is_complete() {
        let completion = Completion::new();
        assert!(completion.is_complete());
        completion.wait();
        assert!(completion.wait_timeout(Duration::from_millis(1)));
    }

    #[test]
    fn test_wait_wakes_on_last_member() {
        let completion = Completion::new();
        completion.add(3);

        let worker = completion.clone();
        let handle = thread::spawn(move || {
            for _ in 0..3 {
                thread::sleep(Duration::from_millis(5));
                worker.complete_one();
            }
        });

        completion.wait();
        assert_eq!(completion.pending(), 0);
        handle.join().unwrap();
    }

    #[test]
    fn test_wait_timeout_expires() {
        let completion = Completion::new();
        completion.add(1);

        assert!(!completion.wait_timeout(Duration::from_millis(20)));
        assert_eq!(completion.pending(), 1);

        completion.complete_one();
        assert!(completion.wait_timeout(Duration::from_millis(20)));
    }

    #[test]
    fn test_discard_counts() {
        let completion = Completion::new();
        completion.add(4);
        completion.complete_one();
        completion.discard_one();
        completion.discard_one();

        assert_eq!(completion.pending(), 1);
        assert_eq!(completion.discarded(), 2);
    }
}
