use crate::query_string::select_query;
use crate::union::{merge_with, stop_after_error, SourceCall, SourceRequest, WorkerUnion};
use crate::FederationContext;
use futures::{future, stream, StreamExt, TryStreamExt};
use rdf_federation_common::{
    error_stream, single_stream, BindingSetStream, FederationError, FederationResult, QueryInfo,
    SourceConnection, SourceEndpoint,
};
use rdf_federation_logical::{ExclusiveGroup, StatementNode};
use rdf_federation_model::{BindingSet, SourceRef, StatementPattern};
use std::slice;
use std::sync::Arc;
use tracing::trace;

/// Evaluates a statement for `bindings` against all of its candidate sources.
///
/// If all positions of the statement are bound, the sources are probed one after another and the
/// input bindings are returned once if any source contains a match.
pub(crate) fn evaluate_statement(
    context: &Arc<FederationContext>,
    query: &Arc<QueryInfo>,
    node: &StatementNode,
    bindings: BindingSet,
) -> BindingSetStream {
    let endpoints = match resolve_endpoints(context, node.sources()) {
        Ok(endpoints) => endpoints,
        Err(error) => return error_stream(error),
    };
    let statement = node.statement().clone();

    if statement.is_check_pattern(&bindings) {
        return probe_sources(endpoints, statement, bindings);
    }

    let mut union = WorkerUnion::new(Arc::clone(context), Arc::clone(query), bindings.clone());
    let mut prepared_query: Option<Arc<str>> = None;
    for (source, endpoint) in node.sources().iter().zip(endpoints) {
        let request = if source.uses_prepared_query() {
            let query = match &prepared_query {
                Some(query) => Arc::clone(query),
                None => match select_query(slice::from_ref(&statement), &bindings) {
                    Ok(query) => Arc::clone(prepared_query.insert(query.into())),
                    Err(error) => return error_stream(error),
                },
            };
            SourceRequest::Prepared(query)
        } else {
            SourceRequest::Lookup(statement.bind(&bindings))
        };
        union.add_call(SourceCall::new(endpoint, request, bindings.clone()));
    }
    union.into_stream()
}

/// Evaluates an exclusive group for `bindings` against its owner.
///
/// Sources that prefer templated queries receive a single query covering all statements. For
/// other sources, the statements are evaluated in a nested loop of lookups.
pub(crate) fn evaluate_group(
    context: &Arc<FederationContext>,
    query: &Arc<QueryInfo>,
    group: &ExclusiveGroup,
    bindings: BindingSet,
) -> BindingSetStream {
    let endpoint = match context.sources().endpoint(group.owner().id()) {
        Ok(endpoint) => endpoint.clone(),
        Err(error) => return error_stream(error),
    };
    let statements = group.statements().to_vec();

    if statements.iter().all(|s| s.is_check_pattern(&bindings)) {
        return probe_group(endpoint, statements, bindings);
    }

    if group.owner().uses_prepared_query() {
        let query_text = match select_query(&statements, &bindings) {
            Ok(query_text) => query_text,
            Err(error) => return error_stream(error),
        };
        let mut union = WorkerUnion::new(Arc::clone(context), Arc::clone(query), bindings.clone());
        union.add_call(SourceCall::new(
            endpoint,
            SourceRequest::Prepared(query_text.into()),
            bindings,
        ));
        return union.into_stream();
    }

    let mut results = single_stream(bindings);
    for statement in statements {
        let connection = Arc::clone(endpoint.connection());
        results = results
            .map_ok(move |bindings| lookup(Arc::clone(&connection), statement.clone(), bindings))
            .try_flatten()
            .boxed();
    }
    stop_after_error(results)
}

fn resolve_endpoints(
    context: &FederationContext,
    sources: &[SourceRef],
) -> FederationResult<Vec<SourceEndpoint>> {
    sources
        .iter()
        .map(|source| context.sources().endpoint(source.id()).cloned())
        .collect()
}

/// Returns `bindings` once if any of the `endpoints` has a match for `statement`. The endpoints are
/// probed in order and probing stops at the first match.
fn probe_sources(
    endpoints: Vec<SourceEndpoint>,
    statement: StatementPattern,
    bindings: BindingSet,
) -> BindingSetStream {
    stream::once(async move {
        for endpoint in endpoints {
            trace!("Probing {} for {statement}.", endpoint.id());
            if endpoint.connection().has_match(&statement, &bindings).await? {
                return Ok(Some(bindings));
            }
        }
        Ok::<_, FederationError>(None)
    })
    .try_filter_map(future::ok)
    .boxed()
}

/// Returns `bindings` once if `endpoint` has a match for every statement.
fn probe_group(
    endpoint: SourceEndpoint,
    statements: Vec<StatementPattern>,
    bindings: BindingSet,
) -> BindingSetStream {
    stream::once(async move {
        for statement in &statements {
            if !endpoint.connection().has_match(statement, &bindings).await? {
                return Ok(None);
            }
        }
        Ok::<_, FederationError>(Some(bindings))
    })
    .try_filter_map(future::ok)
    .boxed()
}

/// Looks up a single statement of an exclusive group for the current `bindings`.
fn lookup(
    connection: Arc<dyn SourceConnection>,
    statement: StatementPattern,
    bindings: BindingSet,
) -> BindingSetStream {
    if statement.is_check_pattern(&bindings) {
        return stream::once(async move {
            let found = connection.has_match(&statement, &bindings).await?;
            Ok::<_, FederationError>(found.then_some(bindings))
        })
        .try_filter_map(future::ok)
        .boxed();
    }

    let bound = statement.bind(&bindings);
    let input = bindings.clone();
    let results = stream::once(async move { connection.lookup_pattern(&bound, &input).await })
        .try_flatten()
        .boxed();
    merge_with(results, bindings)
}
