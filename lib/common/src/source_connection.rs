use crate::{BindingSetStream, FederationResult};
use async_trait::async_trait;
use rdf_federation_model::{BindingSet, Expression, StatementPattern};
use std::fmt::Debug;

/// The connection to a single data source of the federation.
///
/// Implementations are responsible for transport concerns like connection pooling or retries. The
/// federation engine never retries a failed call.
///
/// Every returned binding set must be compatible with the `bindings` that have been passed in.
/// The engine merges them with `bindings` and drops incompatible ones.
#[async_trait]
pub trait SourceConnection: Debug + Send + Sync {
    /// Evaluates a templated SELECT query that has been built for `bindings`.
    ///
    /// `filter` is only set if it has not been included in the query text.
    async fn run_templated_query(
        &self,
        query: &str,
        bindings: &BindingSet,
        filter: Option<&Expression>,
    ) -> FederationResult<BindingSetStream>;

    /// Looks up all matches of `pattern`.
    ///
    /// The bound positions of `bindings` have already been substituted into `pattern`. If the
    /// pattern carries a filter, the connection must apply it.
    async fn lookup_pattern(
        &self,
        pattern: &StatementPattern,
        bindings: &BindingSet,
    ) -> FederationResult<BindingSetStream>;

    /// Returns whether the source contains at least one match of `pattern`.
    async fn has_match(
        &self,
        pattern: &StatementPattern,
        bindings: &BindingSet,
    ) -> FederationResult<bool>;
}
