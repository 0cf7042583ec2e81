use crate::filter::filter_stream;
use crate::join::ControlledWorkerJoin;
use crate::statement::{evaluate_group, evaluate_statement};
use crate::union::{merge_with, stop_after_error};
use crate::FederationContext;
use futures::{future, stream, StreamExt, TryStreamExt};
use rdf_federation_common::{
    empty_stream, error_stream, single_stream, BindingSetStream, FederationError, QueryInfo,
};
use rdf_federation_logical::FedNode;
use rdf_federation_model::BindingSet;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::trace;

/// Evaluates federated query plans of a single query.
///
/// Evaluation is lazy: the returned streams only contact sources while they are polled. Every
/// result of [FederationEvaluator::evaluate] extends the input bindings.
#[derive(Clone)]
pub struct FederationEvaluator {
    context: Arc<FederationContext>,
    query: Arc<QueryInfo>,
    within_join_task: bool,
}

impl FederationEvaluator {
    /// Creates a new [FederationEvaluator] for `query`.
    pub fn new(context: Arc<FederationContext>, query: Arc<QueryInfo>) -> Self {
        Self {
            context,
            query,
            within_join_task: false,
        }
    }

    /// Returns an evaluator for the right side of a join that runs on a join worker.
    ///
    /// Joins evaluated by this evaluator do not schedule join tasks. Instead, they are evaluated
    /// as nested loops within the calling task, so a join task never waits for other join tasks.
    pub(crate) fn for_join_task(&self) -> Self {
        Self {
            within_join_task: true,
            ..self.clone()
        }
    }

    pub fn context(&self) -> &Arc<FederationContext> {
        &self.context
    }

    pub fn query(&self) -> &Arc<QueryInfo> {
        &self.query
    }

    /// Evaluates `node` for the given input `bindings`.
    pub fn evaluate(&self, node: &Arc<FedNode>, bindings: BindingSet) -> BindingSetStream {
        if self.query.is_aborted() {
            return error_stream(FederationError::QueryAborted(self.query.id()));
        }

        match node.as_ref() {
            FedNode::Empty => empty_stream(),
            FedNode::True => single_stream(bindings),
            FedNode::Statement(statement) => {
                evaluate_statement(&self.context, &self.query, statement, bindings)
            }
            FedNode::ExclusiveGroup(group) => {
                evaluate_group(&self.context, &self.query, group, bindings)
            }
            FedNode::Join(args) => self.evaluate_join(args, bindings),
            FedNode::Union(args) => {
                let branches = args
                    .iter()
                    .map(|arg| self.evaluate(arg, bindings.clone()))
                    .collect::<Vec<_>>();
                stop_after_error(stream::select_all(branches).boxed())
            }
            FedNode::Project { .. } | FedNode::Distinct(_) | FedNode::Slice { .. }
                if !bindings.is_empty() =>
            {
                // Sub-selects see none of the outer bindings.
                merge_with(self.evaluate(node, BindingSet::new()), bindings)
            }
            FedNode::Project { inner, variables } => {
                let variables = variables.clone();
                self.evaluate(inner, bindings)
                    .map_ok(move |solution| solution.project(&variables))
                    .boxed()
            }
            FedNode::Distinct(inner) => {
                let mut seen = HashSet::new();
                self.evaluate(inner, bindings)
                    .try_filter(move |solution| future::ready(seen.insert(solution.clone())))
                    .boxed()
            }
            FedNode::Slice {
                inner,
                start,
                length,
            } => {
                let results = self.evaluate(inner, bindings).skip(*start);
                match length {
                    Some(length) => results.take(*length).boxed(),
                    None => results.boxed(),
                }
            }
            FedNode::Filter { inner, expression } => {
                filter_stream(self.evaluate(inner, bindings), expression.clone())
            }
            FedNode::Service { name, .. } => error_stream(FederationError::NotImplemented(
                format!("Evaluation of SERVICE {name}"),
            )),
        }
    }

    /// Evaluates an n-ary join as a left-deep chain of [ControlledWorkerJoin]s.
    ///
    /// Within a join task, the chain is evaluated as nested loops instead.
    fn evaluate_join(&self, args: &[Arc<FedNode>], bindings: BindingSet) -> BindingSetStream {
        let Some((first, rest)) = args.split_first() else {
            return single_stream(bindings);
        };

        let left = self.evaluate(first, bindings);
        if self.within_join_task {
            trace!(
                "Evaluating nested join of query {} within its join task.",
                self.query.id()
            );
            return rest.iter().fold(left, |left, right| {
                let evaluator = self.clone();
                let right = Arc::clone(right);
                let results = left
                    .map_ok(move |bindings| evaluator.evaluate(&right, bindings))
                    .try_flatten()
                    .boxed();
                stop_after_error(results)
            });
        }

        rest.iter().fold(left, |left, right| {
            ControlledWorkerJoin::new(self.clone(), left, Arc::clone(right)).into_stream()
        })
    }
}
