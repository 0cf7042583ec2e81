use crate::QueryId;
use rdf_federation_model::{SourceId, SparqlSyntaxError};
use std::convert::Infallible;
use std::error::Error;
use std::time::Duration;

/// The result type used throughout the federation engine.
pub type FederationResult<T> = Result<T, FederationError>;

/// An error raised while planning or evaluating a federated query.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum FederationError {
    /// The query text could not be parsed.
    #[error(transparent)]
    Syntax(#[from] SparqlSyntaxError),
    /// A source failed while answering a lookup, a check or a templated query.
    #[error("The source {source_id} failed: {cause}")]
    Source {
        source_id: SourceId,
        #[source]
        cause: Box<dyn Error + Send + Sync + 'static>,
    },
    /// A plan references a source that is not part of the federation.
    #[error("The source {0} is not registered in the federation")]
    UnknownSource(SourceId),
    /// No valid templated query could be built for a pattern.
    #[error("Could not build a templated query: {0}")]
    TemplatedQuery(String),
    /// A join did not receive all task reports in time.
    #[error("Join #{join_id} did not complete within {timeout:?} ({pending} tasks pending)")]
    JoinTimeout {
        join_id: u64,
        pending: usize,
        timeout: Duration,
    },
    /// The query has been aborted while it was evaluated.
    #[error("Query {0} has been aborted")]
    QueryAborted(QueryId),
    /// The scheduler no longer accepts or executes tasks.
    #[error("The scheduler {0} has been shut down")]
    SchedulerShutdown(String),
    /// The engine has been set up incorrectly.
    #[error("Invalid federation configuration: {0}")]
    Configuration(String),
    #[error("A feature has not yet been implemented: {0}")]
    NotImplemented(String),
    #[error("An internal error that likely indicates towards a bug in the federation engine: {0}")]
    Internal(String),
}

impl FederationError {
    /// Wraps an error raised by the connection of `source_id`.
    pub fn source_failure(
        source_id: SourceId,
        cause: impl Into<Box<dyn Error + Send + Sync + 'static>>,
    ) -> Self {
        Self::Source {
            source_id,
            cause: cause.into(),
        }
    }

    pub fn internal<T>(cause: impl Into<String>) -> FederationResult<T> {
        Err(FederationError::Internal(cause.into()))
    }

    pub fn not_implemented<T>(feature: impl Into<String>) -> FederationResult<T> {
        Err(FederationError::NotImplemented(feature.into()))
    }
}

impl From<Infallible> for FederationError {
    #[inline]
    fn from(error: Infallible) -> Self {
        match error {}
    }
}
