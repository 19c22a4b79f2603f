//! Worker configuration

use std::time::Duration;

/// Worker configuration
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerConfig {
    /// Poll interval when no tasks available
    pub poll_interval: Duration,

    /// Age after which a processing task is presumed orphaned
    pub stale_after: Duration,

    /// Upper bound on a single handler run; unlimited when `None`
    pub task_timeout: Option<Duration>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            stale_after: Duration::from_secs(120), // 2 minutes
            task_timeout: None,
        }
    }
}

impl WorkerConfig {
    /// Create a new config builder
    pub fn builder() -> WorkerConfigBuilder {
        WorkerConfigBuilder::default()
    }
}

/// Builder for WorkerConfig
#[derive(Default)]
pub struct WorkerConfigBuilder {
    config: WorkerConfig,
}

impl WorkerConfigBuilder {
    /// Set poll interval
    pub fn poll_interval(mut self, duration: Duration) -> Self {
        self.config.poll_interval = duration;
        self
    }

    /// Set poll interval in seconds
    pub fn poll_interval_secs(mut self, secs: u64) -> Self {
        self.config.poll_interval = Duration::from_secs(secs);
        self
    }

    /// Set the stale-task threshold
    pub fn stale_after(mut self, duration: Duration) -> Self {
        self.config.stale_after = duration;
        self
    }

    /// Set the stale-task threshold in seconds
    pub fn stale_after_secs(mut self, secs: u64) -> Self {
        self.config.stale_after = Duration::from_secs(secs);
        self
    }

    /// Set task timeout
    pub fn task_timeout(mut self, duration: Option<Duration>) -> Self {
        self.config.task_timeout = duration;
        self
    }

    /// Build the config
    pub fn build(self) -> WorkerConfig {
        self.config
    }
}
