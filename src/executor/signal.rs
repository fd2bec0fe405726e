//! Run / quit wake-up signal shared by every worker.
//!
//! Raising `run` grants up to `worker_count` permits so that every parked
//! worker can wake and pull from the shared queue. `quit` is latched and takes
//! precedence over pending run permits.

use parking_lot::{Condvar, Mutex};

/// What a parked worker was woken for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Wake {
    Run,
    Quit,
}

#[derive(Debug, Default)]
struct SignalState {
    run_permits: usize,
    quit: bool,
}

#[derive(Debug)]
pub(crate) struct WakeSignal {
    state: Mutex<SignalState>,
    cvar: Condvar,
    max_permits: usize,
}

impl WakeSignal {
    pub fn new(worker_count: usize) -> Self {
        Self {
            state: Mutex::new(SignalState::default()),
            cvar: Condvar::new(),
            max_permits: worker_count,
        }
    }

    /// Wake up to `worker_count` parked workers.
    pub fn raise_run(&self) {
        if self.max_permits == 0 {
            return;
        }
        let mut state = self.state.lock();
        state.run_permits = self.max_permits;
        self.cvar.notify_all();
    }

    /// Tell every worker to terminate.
    pub fn raise_quit(&self) {
        let mut state = self.state.lock();
        state.quit = true;
        self.cvar.notify_all();
    }

    /// Park until a run permit or quit is available.
    pub fn wait(&self) -> Wake {
        let mut state = self.state.lock();
        loop {
            if state.quit {
                return Wake::Quit;
            }
            if state.run_permits > 0 {
                state.run_permits -= 1;
                return Wake::Run;
            }
            self.cvar.wait(&mut state);
        }
    }

    #[cfg(test)]
    fn permits(&self) -> usize {
        self.state.lock().run_permits
    }
}
