//! The entry point of the crate is the [`Federation`] struct.
//!
//! Usage example:
//! ```
//! use rdf_federation::model::*;
//! use rdf_federation::common::SourceRegistry;
//! use rdf_federation::execution::FederationConfig;
//! use rdf_federation::logical::StaticSourceSelector;
//! use rdf_federation::{Federation, MemorySource, QueryResults};
//! use std::sync::Arc;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let ex = NamedNode::new("http://example.com")?;
//! let source = MemorySource::default().with_triple(Triple::new(ex.clone(), ex.clone(), ex.clone()));
//!
//! let mut sources = SourceRegistry::new();
//! let source = sources.register("memory", SourceCapability::Lookup, Arc::new(source));
//! let selector = StaticSourceSelector::new(vec![source]);
//! let federation = Federation::new(FederationConfig::new(), sources, Arc::new(selector))?;
//!
//! if let QueryResults::Solutions(solutions) = federation.query("SELECT ?s WHERE { ?s ?p ?o }").await? {
//!     let solutions = solutions.try_collect_to_vec().await?;
//!     assert_eq!(solutions[0].get(&Variable::new("s")?), Some(&ex.into()));
//! }
//! # Result::<_, Box<dyn std::error::Error>>::Ok(())
//! # }).unwrap();
//! ```

use crate::results::{QueryResults, QuerySolutionStream, QueryTripleStream, RunningQuery};
use futures::StreamExt;
use rdf_federation_common::{FederationError, FederationResult, QueryId, QueryInfo, SourceRegistry};
use rdf_federation_execution::{FederationConfig, FederationContext, FederationEvaluator};
use rdf_federation_logical::join::{JoinOrderPolicy, StatementGroupOptimizer};
use rdf_federation_logical::{FedNode, FedPlanBuilder, SourceSelector};
use rdf_federation_model::{BindingSet, Query, QueryKind};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// A query that has been parsed and assigned a [QueryId], but not yet evaluated.
#[derive(Debug, Clone)]
pub struct PreparedQuery {
    info: Arc<QueryInfo>,
    query: Query,
}

impl PreparedQuery {
    pub fn id(&self) -> QueryId {
        self.info.id()
    }

    pub fn kind(&self) -> QueryKind {
        self.info.kind()
    }

    /// The [QueryInfo] that is used to track and abort the query.
    pub fn info(&self) -> &Arc<QueryInfo> {
        &self.info
    }

    /// The parsed query, including the injected prefix declarations.
    pub fn query(&self) -> &Query {
        &self.query
    }
}

/// A federation of SPARQL data sources.
///
/// Queries are translated into a federated plan, optimized, and evaluated concurrently against the
/// registered sources. Each running query can be aborted with [Self::abort].
pub struct Federation {
    context: Arc<FederationContext>,
    planner: FedPlanBuilder,
    optimizer: StatementGroupOptimizer,
}

impl Federation {
    /// Creates a new [Federation] over `sources`. The `selector` determines the candidate sources
    /// of every triple pattern.
    ///
    /// # Errors
    ///
    /// If the configuration is invalid or if there is no current tokio runtime.
    pub fn new(
        config: FederationConfig,
        sources: SourceRegistry,
        selector: Arc<dyn SourceSelector>,
    ) -> FederationResult<Self> {
        let context = FederationContext::try_new(config, sources)?;
        Ok(Self {
            context: Arc::new(context),
            planner: FedPlanBuilder::new(selector),
            optimizer: StatementGroupOptimizer::default(),
        })
    }

    /// Replaces the join order policy of the optimizer.
    #[must_use]
    pub fn with_join_order(mut self, join_order: Arc<dyn JoinOrderPolicy>) -> Self {
        self.optimizer = StatementGroupOptimizer::new(join_order);
        self
    }

    pub fn context(&self) -> &Arc<FederationContext> {
        &self.context
    }

    /// Adds a prefix declaration that is injected into all subsequent queries. Passing [None]
    /// removes the declaration.
    pub fn add_prefix_declaration(&self, prefix: impl Into<String>, namespace: Option<&str>) {
        self.context
            .query_manager()
            .add_prefix_declaration(prefix, namespace);
    }

    /// Parses `query` after injecting the registered prefix declarations.
    ///
    /// # Errors
    ///
    /// If the query cannot be parsed.
    pub fn prepare_query(&self, query: &str) -> FederationResult<PreparedQuery> {
        let manager = self.context.query_manager();
        let text = manager.rewrite_prefixes(query);
        let query = Query::parse(&text, None)?;
        let info = manager.create_query_info(text, QueryKind::from(&query));
        Ok(PreparedQuery { info, query })
    }

    /// Evaluates a prepared query.
    ///
    /// The query is registered as running until its results have been consumed or dropped.
    ///
    /// # Errors
    ///
    /// If the query cannot be planned, e.g., because it uses unsupported operators. Errors that
    /// happen during the evaluation are reported by the result stream.
    #[instrument(skip_all, fields(query = %prepared.id()))]
    pub async fn evaluate(&self, prepared: PreparedQuery) -> FederationResult<QueryResults> {
        let PreparedQuery { info, query } = prepared;
        if matches!(query, Query::Describe { .. }) {
            return FederationError::not_implemented("DESCRIBE queries");
        }

        let manager = self.context.query_manager();
        manager.register(Arc::clone(&info));
        let running = RunningQuery::new(Arc::clone(&self.context), Arc::clone(&info));

        let plan = Arc::new(self.plan(&query)?);
        if self.context.config().debug_query_plan {
            info!("Optimized plan of query {}:\n{plan}", info.id());
        }
        debug!("Evaluating {} query {}.", info.kind(), info.id());

        let evaluator = FederationEvaluator::new(Arc::clone(&self.context), Arc::clone(&info));
        let results = evaluator.evaluate(&plan, BindingSet::new());
        let variables: Arc<[_]> = plan.variables().into();

        Ok(match query {
            Query::Ask { .. } => {
                let mut results = results;
                let found = results.next().await.transpose()?.is_some();
                drop(results);
                drop(running);
                QueryResults::Boolean(found)
            }
            Query::Construct { template, .. } => QueryResults::Graph(QueryTripleStream::new(
                template,
                QuerySolutionStream::new(variables, results, running),
            )),
            _ => QueryResults::Solutions(QuerySolutionStream::new(variables, results, running)),
        })
    }

    /// Prepares and evaluates `query`.
    ///
    /// # Errors
    ///
    /// See [Self::prepare_query] and [Self::evaluate].
    pub async fn query(&self, query: &str) -> FederationResult<QueryResults> {
        let prepared = self.prepare_query(query)?;
        self.evaluate(prepared).await
    }

    /// Returns the optimized plan of `query` without evaluating it.
    ///
    /// # Errors
    ///
    /// If the query cannot be parsed or planned.
    pub fn query_plan(&self, query: &str) -> FederationResult<String> {
        let text = self.context.query_manager().rewrite_prefixes(query);
        let query = Query::parse(&text, None)?;
        Ok(self.plan(&query)?.to_string())
    }

    /// Aborts `query` if it is running.
    pub fn abort(&self, query: &QueryInfo) {
        self.context.query_manager().abort(query);
    }

    /// Returns the running queries ordered by id.
    pub fn running_queries(&self) -> Vec<Arc<QueryInfo>> {
        self.context.query_manager().snapshot()
    }

    /// Aborts all running queries and stops the workers of the federation.
    pub fn shutdown(&self) {
        self.context.shutdown();
    }

    fn plan(&self, query: &Query) -> FederationResult<FedNode> {
        let plan = self.planner.build_query(query)?;
        self.optimizer.optimize(plan)
    }
}
