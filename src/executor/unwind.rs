//! Keeping a panicking task from taking its worker down.

use super::task::{Disposition, Task};
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// What the pool does when a task callback panics.
///
/// Under every strategy except `Abort` the task counts as done, so its batch
/// still completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanicStrategy {
    Abort,
    /// Drop the panic without logging it.
    Isolate,
    LogAndContinue,
}

impl Default for PanicStrategy {
    fn default() -> Self {
        PanicStrategy::LogAndContinue
    }
}

impl PanicStrategy {
    /// Invoke `task` once. `None` means the callback panicked.
    pub(crate) fn invoke(self, task: &Task) -> Option<Disposition> {
        let payload = match catch_unwind(AssertUnwindSafe(|| task.invoke())) {
            Ok(disposition) => return Some(disposition),
            Err(payload) => payload,
        };

        match self {
            PanicStrategy::Abort => {
                tracing::error!(
                    sequence = task.sequence,
                    panic = %panic_message(&*payload),
                    "task panicked, aborting"
                );
                std::process::abort();
            }
            PanicStrategy::Isolate => {}
            PanicStrategy::LogAndContinue => {
                tracing::error!(
                    sequence = task.sequence,
                    panic = %panic_message(&*payload),
                    "task panicked"
                );
            }
        }

        None
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "non-string panic payload"
    }
}
