use futures::{Stream, StreamExt};
use rdf_federation_common::{BindingSetStream, FederationResult, QueryInfo};
use rdf_federation_execution::FederationContext;
use rdf_federation_model::{BindingSet, Variable};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};

/// A stream over the solutions of a SELECT query.
///
/// The query is removed from the running queries once the stream has been consumed or dropped.
pub struct QuerySolutionStream {
    /// The projected variables of the query.
    variables: Arc<[Variable]>,
    /// Wrapped in an Option for termination handling.
    inner: Option<BindingSetStream>,
    running: RunningQuery,
}

impl QuerySolutionStream {
    pub(crate) fn new(
        variables: Arc<[Variable]>,
        inner: BindingSetStream,
        running: RunningQuery,
    ) -> Self {
        Self {
            variables,
            inner: Some(inner),
            running,
        }
    }

    /// The variables used in the solutions.
    #[inline]
    pub fn variables(&self) -> &[Variable] {
        self.variables.as_ref()
    }

    /// The query that produces these solutions.
    pub fn query(&self) -> &Arc<QueryInfo> {
        self.running.query()
    }

    /// Consumes the stream and collects all solutions.
    ///
    /// # Errors
    ///
    /// Returns the first error of the stream.
    pub async fn try_collect_to_vec(mut self) -> FederationResult<Vec<BindingSet>> {
        let mut result = Vec::new();
        while let Some(solution) = self.next().await {
            result.push(solution?);
        }
        Ok(result)
    }
}

impl Stream for QuerySolutionStream {
    type Item = FederationResult<BindingSet>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let Some(inner) = self.inner.as_mut() else {
            return Poll::Ready(None);
        };

        let next = ready!(inner.poll_next_unpin(cx));
        if next.is_none() {
            self.inner = None;
            self.running.finish();
        }
        Poll::Ready(next)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match &self.inner {
            Some(inner) => inner.size_hint(),
            None => (0, Some(0)),
        }
    }
}

/// Removes a query from the running queries when it is dropped.
pub(crate) struct RunningQuery {
    context: Arc<FederationContext>,
    query: Arc<QueryInfo>,
}

impl RunningQuery {
    pub(crate) fn new(context: Arc<FederationContext>, query: Arc<QueryInfo>) -> Self {
        Self { context, query }
    }

    pub(crate) fn query(&self) -> &Arc<QueryInfo> {
        &self.query
    }

    fn finish(&self) {
        self.context.query_manager().finish(&self.query);
    }
}

impl Drop for RunningQuery {
    fn drop(&mut self) {
        self.finish();
    }
}
