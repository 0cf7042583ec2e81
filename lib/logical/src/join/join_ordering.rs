use crate::node::FedNode;
use rdf_federation_model::{NamedNodePattern, StatementPattern, TermPattern, Variable};
use std::fmt::Debug;
use std::sync::Arc;

/// Decides the evaluation order of the arguments of an n-ary join.
///
/// The first argument is evaluated first and its results drive the bound evaluation of the
/// remaining arguments. Implementations must return a permutation of `args`.
pub trait JoinOrderPolicy: Debug + Send + Sync {
    fn order(&self, args: Vec<Arc<FedNode>>) -> Vec<Arc<FedNode>>;
}

/// Orders join arguments greedily by their estimated cost.
///
/// The cheapest argument is evaluated first. Afterward, the cheapest argument that shares a
/// variable with the already ordered arguments is picked. If there is no such argument, the
/// cheapest remaining argument is chosen. Ties keep the input order.
///
/// "Cost" is an abstract metric that does not use any statistics. It is based on the number of
/// bound positions in a pattern and the number of sources that must be contacted.
#[derive(Clone, Copy, Debug, Default)]
pub struct CardinalityJoinOrder;

impl CardinalityJoinOrder {
    /// Creates a new [CardinalityJoinOrder].
    pub fn new() -> Self {
        Self
    }
}

impl JoinOrderPolicy for CardinalityJoinOrder {
    fn order(&self, args: Vec<Arc<FedNode>>) -> Vec<Arc<FedNode>> {
        let mut to_order = args
            .into_iter()
            .map(|arg| {
                let cost = estimate_cost(&arg);
                let variables = arg.variables();
                (arg, cost, variables)
            })
            .collect::<Vec<_>>();

        let mut result = Vec::with_capacity(to_order.len());
        let mut used_vars: Vec<Variable> = Vec::new();
        while !to_order.is_empty() {
            let connected = to_order
                .iter()
                .enumerate()
                .filter(|(_, (_, _, vars))| vars.iter().any(|v| used_vars.contains(v)))
                .min_by_key(|(_, (_, cost, _))| *cost)
                .map(|(idx, _)| idx);
            let idx = connected.unwrap_or_else(|| {
                to_order
                    .iter()
                    .enumerate()
                    .min_by_key(|(_, (_, cost, _))| *cost)
                    .map_or(0, |(idx, _)| idx)
            });

            let (arg, _, vars) = to_order.remove(idx);
            for var in vars {
                if !used_vars.contains(&var) {
                    used_vars.push(var);
                }
            }
            result.push(arg);
        }
        result
    }
}

/// Estimates the cost of evaluating a plan node.
fn estimate_cost(node: &FedNode) -> usize {
    match node {
        FedNode::Empty => 0,
        FedNode::True => 1,
        FedNode::Statement(statement) => {
            estimate_pattern_cardinality(statement.statement())
                .saturating_mul(statement.sources().len().max(1))
        }
        // Exclusive groups are answered by one sub-query and are therefore preferred.
        FedNode::ExclusiveGroup(group) => group
            .statements()
            .iter()
            .map(estimate_pattern_cardinality)
            .min()
            .unwrap_or(1)
            / 1_000,
        FedNode::Join(args) => estimate_join_cost(args),
        FedNode::Union(args) => args
            .iter()
            .map(|arg| estimate_cost(arg))
            .fold(0, usize::saturating_add),
        FedNode::Filter { inner, .. }
        | FedNode::Project { inner, .. }
        | FedNode::Distinct(inner)
        | FedNode::Slice { inner, .. } => estimate_cost(inner),
        FedNode::Service { .. } => usize::MAX,
    }
}

/// Estimates the cost of a join by multiplying the costs of its arguments. Each shared variable
/// reduces the estimate.
fn estimate_join_cost(args: &[Arc<FedNode>]) -> usize {
    let mut seen: Vec<Variable> = Vec::new();
    let mut cost: usize = 1;
    for arg in args {
        let vars = arg.variables();
        let shared = vars.iter().filter(|v| seen.contains(v)).count();
        let shared = u32::try_from(shared).unwrap_or(u32::MAX);
        cost = cost
            .saturating_mul(estimate_cost(arg))
            .saturating_div(1_000_usize.saturating_pow(shared))
            .max(1);
        seen.extend(vars);
    }
    cost
}

/// Estimates the cardinality of a single triple pattern from its bound positions.
fn estimate_pattern_cardinality(statement: &StatementPattern) -> usize {
    let pattern = statement.pattern();
    let subject_bound = is_bound(&pattern.subject);
    let predicate_bound = matches!(&pattern.predicate, NamedNodePattern::NamedNode(_));
    let object_bound = is_bound(&pattern.object);

    match (subject_bound, predicate_bound, object_bound) {
        (true, true, true) => 1,
        (true, true, false) => 10,
        (true, false, true) => 2,
        (false, true, true) => 10_000,
        (true, false, false) => 100,
        (false, false, false) => 1_000_000_000,
        (false, true, false) => 1_000_000,
        (false, false, true) => 100_000,
    }
}

fn is_bound(term: &TermPattern) -> bool {
    matches!(term, TermPattern::NamedNode(_) | TermPattern::Literal(_))
}
