//! Keel - a fixed worker-pool task scheduler
//!
//! Callers hand tasks to a fixed set of background workers that pull from a
//! single FIFO queue. A task callback returns a [`Disposition`] telling the
//! scheduler whether it is done, wants to run again right away, or should go
//! back to the end of the queue.
//!
//! # Quick Start
//!
//! ```no_run
//! use keel_pool::prelude::*;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! let pool = ThreadPool::new(4).unwrap();
//! let hits = Arc::new(AtomicUsize::new(0));
//!
//! let counter = hits.clone();
//! pool.run_task(
//!     move |_task_number| {
//!         counter.fetch_add(1, Ordering::Relaxed);
//!         Disposition::Done
//!     },
//!     1000,
//!     true,
//! )
//! .unwrap();
//!
//! assert_eq!(hits.load(Ordering::Relaxed), 1000);
//! pool.release().unwrap();
//! ```
//!
//! # Features
//!
//! - **Blocking batches**: `run_task(.., block = true)` returns once every
//!   member task is done
//! - **Rerun / Requeue**: chunked progress without queue round-trips, or
//!   cooperative yielding back to the queue tail
//! - **Deferred mode**: a zero-worker pool only runs tasks on `flush`
//! - **Purge**: drop everything not yet started, releasing blocked submitters
//! - **Panic isolation**: a panicking task counts as done and never kills its
//!   worker

#![warn(missing_debug_implementations)]

pub mod config;
pub mod error;
pub mod executor;
pub mod prelude;
pub mod telemetry;

// Re-export key types at crate root
pub use config::{Config, ConfigBuilder, ThreadCount};
pub use error::{Error, Result};
pub use executor::{Completion, Disposition, PanicStrategy, ThreadPool};

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn test_deferred_pool_flush() {
        let pool = ThreadPool::new(0).unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));

        for i in 0..10 {
            let log = log.clone();
            pool.run_task(
                move |_| {
                    log.lock().push(i);
                    Disposition::Done
                },
                1,
                false,
            )
            .unwrap();
        }

        assert!(log.lock().is_empty());
        assert_eq!(pool.pending_tasks(), 10);

        pool.flush().unwrap();
        assert_eq!(*log.lock(), (0..10).collect::<Vec<_>>());
        assert_eq!(pool.pending_tasks(), 0);
    }

    #[test]
    fn test_requeue_during_flush() {
        let pool = ThreadPool::new(0).unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));

        let log_c = log.clone();
        let completion = pool
            .submit_batch(
                move |n| {
                    let mut log = log_c.lock();
                    let first_visit = !log.contains(&n);
                    log.push(n);
                    if n == 0 && first_visit {
                        Disposition::Requeue
                    } else {
                        Disposition::Done
                    }
                },
                3,
            )
            .unwrap();

        pool.flush().unwrap();
        assert_eq!(*log.lock(), vec![0, 1, 2, 0]);
        assert!(completion.is_complete());
    }
}
