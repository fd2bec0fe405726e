use crate::error::{Error, Result};
use crate::executor::PanicStrategy;

/// Upper bound on the number of workers a single pool may own.
pub const MAX_THREADS: usize = 1024;

/// How many worker threads a pool should spawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadCount {
    /// Exactly this many workers. Zero selects the deferred, queue-only mode.
    Fixed(usize),

    /// `threads_per_core * max(1, cores + core_count_adjustment)`.
    PerCore {
        threads_per_core: usize,
        core_count_adjustment: isize,
    },
}

impl ThreadCount {
    /// Resolve against an explicit core count.
    pub fn resolve(&self, detected_cores: usize) -> usize {
        match *self {
            ThreadCount::Fixed(n) => n,
            ThreadCount::PerCore {
                threads_per_core,
                core_count_adjustment,
            } => {
                let cores = (detected_cores as isize).saturating_add(core_count_adjustment);
                threads_per_core.saturating_mul(cores.max(1) as usize)
            }
        }
    }
}

impl Default for ThreadCount {
    fn default() -> Self {
        ThreadCount::PerCore {
            threads_per_core: 1,
            core_count_adjustment: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub threads: ThreadCount,
    pub thread_name_prefix: String,
    pub stack_size: Option<usize>,
    pub panic_strategy: PanicStrategy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            threads: ThreadCount::default(),
            thread_name_prefix: "keel-worker".to_string(),
            stack_size: Some(2 * 1024 * 1024),
            panic_strategy: PanicStrategy::default(),
        }
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    pub fn validate(&self) -> Result<()> {
        let n = self.worker_threads();
        if n > MAX_THREADS {
            return Err(Error::resource_exhausted(format!(
                "resolved thread count {} too large (max {})",
                n, MAX_THREADS
            )));
        }

        if self.thread_name_prefix.is_empty() {
            return Err(Error::config("thread_name_prefix must not be empty"));
        }

        if self.stack_size == Some(0) {
            return Err(Error::config("stack_size must be > 0"));
        }

        Ok(())
    }

    /// Number of workers this configuration spawns on the current machine.
    pub fn worker_threads(&self) -> usize {
        self.threads.resolve(num_cpus::get())
    }
}

impl From<ThreadCount> for Config {
    fn from(threads: ThreadCount) -> Self {
        Config {
            threads,
            ..Config::default()
        }
    }
}

#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn num_threads(mut self, n: usize) -> Self {
        self.config.threads = ThreadCount::Fixed(n);
        self
    }

    pub fn threads_per_core(mut self, threads_per_core: usize, core_count_adjustment: isize) -> Self {
        self.config.threads = ThreadCount::PerCore {
            threads_per_core,
            core_count_adjustment,
        };
        self
    }

    pub fn thread_name_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.config.thread_name_prefix = prefix.into();
        self
    }

    pub fn stack_size(mut self, size: usize) -> Self {
        self.config.stack_size = Some(size);
        self
    }

    pub fn panic_strategy(mut self, strategy: PanicStrategy) -> Self {
        self.config.panic_strategy = strategy;
        self
    }

    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_per_core_resolution() {
        let per_core = ThreadCount::PerCore {
            threads_per_core: 2,
            core_count_adjustment: 0,
        };
        assert_eq!(per_core.resolve(8), 16);

        let adjusted = ThreadCount::PerCore {
            threads_per_core: 1,
            core_count_adjustment: -6,
        };
        assert_eq!(adjusted.resolve(8), 2);

        assert_eq!(ThreadCount::Fixed(5).resolve(8), 5);
    }

    #[test]
    fn test_core_count_floor() {
        let starved = ThreadCount::PerCore {
            threads_per_core: 3,
            core_count_adjustment: -100,
        };
        assert_eq!(starved.resolve(8), 3);

        let zero_per_core = ThreadCount::PerCore {
            threads_per_core: 0,
            core_count_adjustment: 4,
        };
        assert_eq!(zero_per_core.resolve(8), 0);
    }

    #[test]
    fn test_builder_validation() {
        assert!(Config::builder().num_threads(0).build().is_ok());
        assert!(Config::builder().num_threads(4).build().is_ok());

        let err = Config::builder().num_threads(MAX_THREADS + 1).build();
        assert!(matches!(err, Err(Error::ResourceExhausted(_))));

        let err = Config::builder().thread_name_prefix("").build();
        assert!(matches!(err, Err(Error::Config(_))));

        let err = Config::builder().stack_size(0).build();
        assert!(matches!(err, Err(Error::Config(_))));
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.worker_threads(), num_cpus::get());
        assert_eq!(config.thread_name_prefix, "keel-worker");
        assert_eq!(config.panic_strategy, PanicStrategy::LogAndContinue);
    }
}
