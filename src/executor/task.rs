//! Task representation and dispositions.

use super::completion::Completion;
use std::sync::Arc;

/// What a task callback asks the scheduler to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Disposition {
    /// The task is finished; its completion is settled.
    Done,
    /// Invoke the callback again immediately on the same thread.
    Rerun,
    /// Put the task back at the tail of the queue.
    Requeue,
}

/// Shared task callback. Receives the task's sequence number.
pub type TaskFn = Arc<dyn Fn(usize) -> Disposition + Send + Sync + 'static>;

/// Internal task representation
#[derive(Clone)]
pub(crate) struct Task {
    pub(crate) callback: TaskFn,
    pub(crate) sequence: usize,
    pub(crate) completion: Option<Completion>,
}

impl Task {
    pub fn new(callback: TaskFn, sequence: usize, completion: Option<Completion>) -> Self {
        Task {
            callback,
            sequence,
            completion,
        }
    }

    /// Invoke the callback once.
    pub fn invoke(&self) -> Disposition {
        (self.callback)(self.sequence)
    }

    /// Settle the attached completion, if any.
    pub fn finish(&self) {
        if let Some(completion) = &self.completion {
            completion.complete_one();
        }
    }

    /// Settle the attached completion for a task that will never run.
    pub fn discard(&self) {
        if let Some(completion) = &self.completion {
            completion.discard_one();
        }
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("sequence", &self.sequence)
            .field("tracked", &self.completion.is_some())
            .finish()
    }
}
