use crate::config::FederationConfig;
use crate::query_manager::QueryManager;
use crate::scheduler::ControlledWorkerScheduler;
use rdf_federation_common::{FederationResult, SourceRegistry};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// The shared state of a federation engine.
///
/// The context owns the sources, the join and union schedulers, and the [QueryManager]. Every
/// operator receives the context explicitly.
#[derive(Debug)]
pub struct FederationContext {
    config: FederationConfig,
    sources: SourceRegistry,
    join_scheduler: Arc<ControlledWorkerScheduler>,
    union_scheduler: Arc<ControlledWorkerScheduler>,
    query_manager: QueryManager,
    next_join_id: AtomicU64,
}

impl FederationContext {
    /// Creates a new [FederationContext] and starts the schedulers on the current tokio runtime.
    ///
    /// # Errors
    ///
    /// If the schedulers cannot be started, e.g., because there is no current tokio runtime.
    pub fn try_new(config: FederationConfig, sources: SourceRegistry) -> FederationResult<Self> {
        let join_scheduler = Arc::new(ControlledWorkerScheduler::try_new(
            "join",
            config.join_worker_threads,
        )?);
        let union_scheduler = Arc::new(ControlledWorkerScheduler::try_new(
            "union",
            config.union_worker_threads,
        )?);
        let query_manager =
            QueryManager::new(Arc::clone(&join_scheduler), Arc::clone(&union_scheduler));

        Ok(Self {
            config,
            sources,
            join_scheduler,
            union_scheduler,
            query_manager,
            next_join_id: AtomicU64::new(1),
        })
    }

    pub fn config(&self) -> &FederationConfig {
        &self.config
    }

    pub fn sources(&self) -> &SourceRegistry {
        &self.sources
    }

    pub fn join_scheduler(&self) -> &Arc<ControlledWorkerScheduler> {
        &self.join_scheduler
    }

    pub fn union_scheduler(&self) -> &Arc<ControlledWorkerScheduler> {
        &self.union_scheduler
    }

    pub fn query_manager(&self) -> &QueryManager {
        &self.query_manager
    }

    /// Returns a new id for a join operator.
    pub fn next_join_id(&self) -> u64 {
        self.next_join_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Aborts all running queries and stops the schedulers.
    pub fn shutdown(&self) {
        for query in self.query_manager.snapshot() {
            self.query_manager.abort(&query);
        }
        self.join_scheduler.shutdown();
        self.union_scheduler.shutdown();
    }
}
