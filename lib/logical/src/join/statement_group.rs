use crate::join::{CardinalityJoinOrder, JoinOrderPolicy};
use crate::node::{ExclusiveGroup, FedNode, StatementNode};
use rdf_federation_common::FederationResult;
use std::sync::Arc;
use tracing::debug;

/// Rewrites the joins of a federated query plan.
///
/// For every n-ary join, the optimizer
/// - collapses the join into [FedNode::Empty] if any argument is empty,
/// - merges sibling statements that are exclusive to the same source into an [ExclusiveGroup],
/// - removes [FedNode::True] arguments,
/// - and orders the remaining arguments with the configured [JoinOrderPolicy].
///
/// The optimizer works bottom-up and does not descend into `SERVICE` patterns.
#[derive(Clone, Debug)]
pub struct StatementGroupOptimizer {
    join_order: Arc<dyn JoinOrderPolicy>,
}

impl StatementGroupOptimizer {
    /// Creates a new [StatementGroupOptimizer] with a custom join order.
    pub fn new(join_order: Arc<dyn JoinOrderPolicy>) -> Self {
        Self { join_order }
    }

    /// Optimizes `node` and all of its children.
    pub fn optimize(&self, node: FedNode) -> FederationResult<FedNode> {
        Ok(match node {
            FedNode::Join(args) => {
                let args = args
                    .into_iter()
                    .map(|arg| self.optimize_child(arg))
                    .collect::<FederationResult<Vec<_>>>()?;
                self.optimize_join(args)?
            }
            FedNode::Union(args) => FedNode::Union(
                args.into_iter()
                    .map(|arg| self.optimize_child(arg))
                    .collect::<FederationResult<Vec<_>>>()?,
            ),
            FedNode::Filter { inner, expression } => FedNode::Filter {
                inner: self.optimize_child(inner)?,
                expression,
            },
            FedNode::Project { inner, variables } => FedNode::Project {
                inner: self.optimize_child(inner)?,
                variables,
            },
            FedNode::Distinct(inner) => FedNode::Distinct(self.optimize_child(inner)?),
            FedNode::Slice {
                inner,
                start,
                length,
            } => FedNode::Slice {
                inner: self.optimize_child(inner)?,
                start,
                length,
            },
            FedNode::Empty
            | FedNode::True
            | FedNode::Statement(_)
            | FedNode::ExclusiveGroup(_)
            | FedNode::Service { .. } => node,
        })
    }

    fn optimize_child(&self, node: Arc<FedNode>) -> FederationResult<Arc<FedNode>> {
        let node = Arc::unwrap_or_clone(node);
        Ok(Arc::new(self.optimize(node)?))
    }

    fn optimize_join(&self, args: Vec<Arc<FedNode>>) -> FederationResult<FedNode> {
        let mut remaining = args;
        let mut result: Vec<Arc<FedNode>> = Vec::with_capacity(remaining.len());

        while !remaining.is_empty() {
            let current = remaining.remove(0);

            if let Some(statement) = current.as_exclusive_statement() {
                let Some(owner) = statement.owner() else {
                    result.push(current);
                    continue;
                };

                let mut members: Vec<StatementNode> = vec![statement.clone()];
                let mut idx = 0;
                while idx < remaining.len() {
                    let same_owner = remaining[idx]
                        .as_exclusive_statement()
                        .and_then(StatementNode::owner)
                        .is_some_and(|other| other.same_source(owner));
                    if same_owner {
                        let matched = remaining.remove(idx);
                        if let Some(matched) = matched.as_exclusive_statement() {
                            members.push(matched.clone());
                        }
                    } else {
                        idx += 1;
                    }
                }

                if members.len() == 1 {
                    result.push(current);
                } else {
                    debug!(
                        "Grouping {} statements exclusive to {owner}.",
                        members.len()
                    );
                    let group = ExclusiveGroup::try_new(members)?;
                    result.push(Arc::new(FedNode::ExclusiveGroup(group)));
                }
                continue;
            }

            match current.as_ref() {
                FedNode::Empty => {
                    debug!("Join contains an empty argument. Replacing the join with Empty.");
                    return Ok(FedNode::Empty);
                }
                FedNode::True => debug!("Removing trivially satisfied argument from join."),
                _ => result.push(current),
            }
        }

        Ok(match result.len() {
            0 => FedNode::True,
            1 => Arc::unwrap_or_clone(result.remove(0)),
            _ => FedNode::Join(self.join_order.order(result)),
        })
    }
}

impl Default for StatementGroupOptimizer {
    fn default() -> Self {
        Self::new(Arc::new(CardinalityJoinOrder::new()))
    }
}
