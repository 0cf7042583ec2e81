use std::time::Duration;

/// Holds the configuration of a federation engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FederationConfig {
    /// The number of workers that evaluate join tasks.
    pub join_worker_threads: usize,
    /// The number of workers that evaluate union tasks, i.e., requests to individual sources.
    pub union_worker_threads: usize,
    /// How long a join waits for its scheduled tasks once the left input has been consumed.
    pub join_completion_timeout: Duration,
    /// The number of results that are buffered between union tasks and their consumer.
    pub union_channel_capacity: usize,
    /// Whether the optimized plan of every query is logged.
    pub debug_query_plan: bool,
}

impl FederationConfig {
    /// Creates a new [FederationConfig] with default values.
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_join_worker_threads(mut self, threads: usize) -> Self {
        self.join_worker_threads = threads;
        self
    }

    #[must_use]
    pub fn with_union_worker_threads(mut self, threads: usize) -> Self {
        self.union_worker_threads = threads;
        self
    }

    #[must_use]
    pub fn with_join_completion_timeout(mut self, timeout: Duration) -> Self {
        self.join_completion_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_union_channel_capacity(mut self, capacity: usize) -> Self {
        self.union_channel_capacity = capacity;
        self
    }

    /// Enables logging of the optimized query plans.
    #[must_use]
    pub fn with_debug_query_plan(mut self, enabled: bool) -> Self {
        self.debug_query_plan = enabled;
        self
    }
}

impl Default for FederationConfig {
    fn default() -> Self {
        Self {
            join_worker_threads: 20,
            union_worker_threads: 20,
            join_completion_timeout: Duration::from_secs(30),
            union_channel_capacity: 64,
            debug_query_plan: false,
        }
    }
}
