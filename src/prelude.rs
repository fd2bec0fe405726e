pub use crate::config::{Config, ConfigBuilder, ThreadCount};
pub use crate::error::{Error, Result};
pub use crate::executor::{Completion, Disposition, PanicStrategy, ThreadPool};
pub use crate::telemetry::MetricsSnapshot;
