//! Task execution infrastructure.
//!
//! The shared FIFO queue, the run/quit wake signal, the worker loop that
//! interprets task dispositions, batch completion tracking and the
//! [`ThreadPool`] that owns them.

pub mod completion;
pub mod pool;
pub(crate) mod queue;
pub(crate) mod signal;
pub(crate) mod task;
pub(crate) mod unwind;
pub(crate) mod worker;

pub use completion::Completion;
pub use pool::ThreadPool;
pub use task::Disposition;
pub use unwind::PanicStrategy;
