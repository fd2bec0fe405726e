use super::task::Task;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Lock-protected FIFO of pending tasks shared by every worker.
pub(crate) struct TaskQueue {
    tasks: Mutex<VecDeque<Task>>,
    drained: Condvar,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self {
            tasks: Mutex::new(VecDeque::new()),
            drained: Condvar::new(),
        }
    }

    pub fn push(&self, task: Task) {
        self.tasks.lock().push_back(task);
    }

    /// Append a whole batch under a single lock acquisition, running `before_each`
    /// on every task before it becomes visible to workers.
    ///
    /// `accept` is checked while the lock is held; if it returns `false` nothing
    /// is pushed and `false` is returned.
    pub fn push_batch<A, I, F>(&self, accept: A, tasks: I, mut before_each: F) -> bool
    where
        A: FnOnce() -> bool,
        I: IntoIterator<Item = Task>,
        F: FnMut(&Task),
    {
        let mut queue = self.tasks.lock();
        if !accept() {
            return false;
        }
        for task in tasks {
            before_each(&task);
            queue.push_back(task);
        }
        true
    }

    pub fn try_pop(&self) -> Option<Task> {
        let mut queue = self.tasks.lock();
        let task = queue.pop_front();
        if task.is_some() && queue.is_empty() {
            self.drained.notify_all();
        }
        task
    }

    /// Remove every queued task and hand them back to the caller.
    pub fn clear(&self) -> Vec<Task> {
        let mut queue = self.tasks.lock();
        let discarded: Vec<Task> = queue.drain(..).collect();
        self.drained.notify_all();
        discarded
    }

    pub fn len(&self) -> usize {
        self.tasks.lock().len()
    }

    /// Block until the queue is empty. `None` waits forever.
    ///
    /// Returns whether the queue was empty when the wait ended.
    pub fn wait_until_empty(&self, timeout: Option<Duration>) -> bool {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut queue = self.tasks.lock();

        while !queue.is_empty() {
            match deadline {
                Some(deadline) => {
                    if self.drained.wait_until(&mut queue, deadline).timed_out() {
                        return queue.is_empty();
                    }
                }
                None => self.drained.wait(&mut queue),
            }
        }
        true
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskQueue").field("len", &self.len()).finish()
    }
}
