use crate::scheduler::Task;
use crate::FederationContext;
use async_trait::async_trait;
use futures::channel::mpsc;
use futures::{future, stream, SinkExt, StreamExt, TryStreamExt};
use rdf_federation_common::{
    empty_stream, BindingSetStream, FederationError, FederationResult, QueryInfo, SourceEndpoint,
};
use rdf_federation_model::{BindingSet, StatementPattern};
use std::sync::Arc;
use tracing::debug;

/// A request against a single source.
#[derive(Clone, Debug)]
pub enum SourceRequest {
    /// A structural lookup of the bound pattern. The connection applies the pattern's filter.
    Lookup(StatementPattern),
    /// A templated query that already includes all filters.
    Prepared(Arc<str>),
}

/// A request together with the source that answers it.
#[derive(Clone, Debug)]
pub struct SourceCall {
    endpoint: SourceEndpoint,
    request: SourceRequest,
    bindings: BindingSet,
}

impl SourceCall {
    pub fn new(endpoint: SourceEndpoint, request: SourceRequest, bindings: BindingSet) -> Self {
        Self {
            endpoint,
            request,
            bindings,
        }
    }

    /// Sends the request to the source and returns its (unmerged) results.
    async fn open(&self) -> FederationResult<BindingSetStream> {
        let connection = self.endpoint.connection();
        match &self.request {
            SourceRequest::Lookup(pattern) => {
                connection.lookup_pattern(pattern, &self.bindings).await
            }
            SourceRequest::Prepared(query) => {
                connection
                    .run_templated_query(query, &self.bindings, None)
                    .await
            }
        }
    }
}

/// Evaluates several source calls for the same input bindings and merges their results.
///
/// A single call is evaluated lazily within the consuming task. Multiple calls are executed
/// concurrently by the union scheduler of the [FederationContext] and their results are pipelined
/// through a bounded channel. The union does not remove duplicates.
pub struct WorkerUnion {
    context: Arc<FederationContext>,
    query: Arc<QueryInfo>,
    bindings: BindingSet,
    calls: Vec<SourceCall>,
}

impl WorkerUnion {
    /// Creates a new [WorkerUnion] that merges all results with `bindings`.
    pub fn new(context: Arc<FederationContext>, query: Arc<QueryInfo>, bindings: BindingSet) -> Self {
        Self {
            context,
            query,
            bindings,
            calls: Vec::new(),
        }
    }

    pub fn add_call(&mut self, call: SourceCall) {
        self.calls.push(call);
    }

    /// Returns the merged results of all calls.
    pub fn into_stream(self) -> BindingSetStream {
        let Self {
            context,
            query,
            bindings,
            mut calls,
        } = self;

        let results = match calls.len() {
            0 => return empty_stream(),
            1 => {
                let call = calls.remove(0);
                stream::once(async move { call.open().await })
                    .try_flatten()
                    .boxed()
            }
            _ => {
                let (sender, receiver) = mpsc::channel(context.config().union_channel_capacity);
                stream::once(future::lazy(move |_| {
                    debug!(
                        "Scheduling {} union tasks for query {}.",
                        calls.len(),
                        query.id()
                    );
                    let mut producer = context.union_scheduler().producer(Arc::clone(&query));
                    for call in calls {
                        producer.schedule(Box::new(UnionTask {
                            query: Arc::clone(&query),
                            call,
                            output: sender.clone(),
                        }));
                    }
                    producer.inform_finish();
                    receiver
                }))
                .flatten()
                .boxed()
            }
        };

        merge_with(stop_after_error(results), bindings)
    }
}

/// Merges every result with `bindings`. Incompatible results are dropped.
pub(crate) fn merge_with(results: BindingSetStream, bindings: BindingSet) -> BindingSetStream {
    results
        .try_filter_map(move |result| future::ready(Ok(bindings.merge(&result))))
        .boxed()
}

/// Ends `results` after the first error.
pub(crate) fn stop_after_error(results: BindingSetStream) -> BindingSetStream {
    results
        .scan(false, |failed, item| {
            if *failed {
                return future::ready(None);
            }
            *failed = item.is_err();
            future::ready(Some(item))
        })
        .boxed()
}

/// Forwards the results of a single source call to the consumer of a [WorkerUnion].
struct UnionTask {
    query: Arc<QueryInfo>,
    call: SourceCall,
    output: mpsc::Sender<FederationResult<BindingSet>>,
}

#[async_trait]
impl Task for UnionTask {
    fn query(&self) -> &Arc<QueryInfo> {
        &self.query
    }

    async fn run(self: Box<Self>) {
        let UnionTask {
            query,
            call,
            mut output,
        } = *self;
        if output.is_closed() {
            return;
        }

        let mut results = match call.open().await {
            Ok(results) => results,
            Err(error) => {
                output.send(Err(error)).await.ok();
                return;
            }
        };

        while let Some(item) = results.next().await {
            if query.is_aborted() {
                output
                    .try_send(Err(FederationError::QueryAborted(query.id())))
                    .ok();
                return;
            }
            let failed = item.is_err();
            if output.send(item).await.is_err() || failed {
                return;
            }
        }
    }

    fn cancel(self: Box<Self>) {
        let UnionTask {
            query, mut output, ..
        } = *self;
        output
            .try_send(Err(FederationError::QueryAborted(query.id())))
            .ok();
    }
}
