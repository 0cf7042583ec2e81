use crate::node::{FedNode, StatementNode};
use crate::source_selection::SourceSelector;
use rdf_federation_common::{FederationError, FederationResult};
use rdf_federation_model::{
    Expression, GraphPattern, Query, StatementPattern, TermPattern, TriplePattern, Variable,
};
use std::sync::Arc;
use tracing::debug;

/// Converts SPARQL algebra into an (unoptimized) federated query plan.
///
/// Every triple pattern is annotated with the candidate sources returned by the
/// [SourceSelector]:
/// - no candidate source yields [FedNode::Empty],
/// - a pattern known to be satisfied yields [FedNode::True],
/// - otherwise a [FedNode::Statement] is created.
///
/// Filters are pushed into the statements that bind all variables of a filter conjunct.
pub struct FedPlanBuilder {
    selector: Arc<dyn SourceSelector>,
}

impl FedPlanBuilder {
    /// Creates a new [FedPlanBuilder].
    pub fn new(selector: Arc<dyn SourceSelector>) -> Self {
        Self { selector }
    }

    /// Builds the plan for the graph pattern of `query`.
    pub fn build_query(&self, query: &Query) -> FederationResult<FedNode> {
        match query {
            Query::Select { pattern, .. }
            | Query::Construct { pattern, .. }
            | Query::Describe { pattern, .. }
            | Query::Ask { pattern, .. } => self.build(pattern),
        }
    }

    /// Builds the plan for `pattern`.
    ///
    /// # Errors
    ///
    /// If the pattern contains algebra that cannot be evaluated in a federation or the source
    /// selection fails.
    pub fn build(&self, pattern: &GraphPattern) -> FederationResult<FedNode> {
        match pattern {
            GraphPattern::Bgp { patterns } => self.build_bgp(patterns),
            GraphPattern::Join { left, right } => {
                let mut args = Vec::new();
                flatten_into(&mut args, self.build(left)?, is_join);
                flatten_into(&mut args, self.build(right)?, is_join);
                Ok(FedNode::Join(args))
            }
            GraphPattern::Union { left, right } => {
                let mut args = Vec::new();
                flatten_into(&mut args, self.build(left)?, is_union);
                flatten_into(&mut args, self.build(right)?, is_union);
                Ok(FedNode::Union(args))
            }
            GraphPattern::Filter { expr, inner } => {
                let inner = self.build(inner)?;
                Ok(push_down_filter(inner, expr))
            }
            GraphPattern::Project { inner, variables } => Ok(FedNode::Project {
                inner: Arc::new(self.build(inner)?),
                variables: variables.clone(),
            }),
            GraphPattern::Distinct { inner } | GraphPattern::Reduced { inner } => {
                Ok(FedNode::Distinct(Arc::new(self.build(inner)?)))
            }
            GraphPattern::Slice {
                inner,
                start,
                length,
            } => Ok(FedNode::Slice {
                inner: Arc::new(self.build(inner)?),
                start: *start,
                length: *length,
            }),
            GraphPattern::Service {
                name,
                inner,
                silent,
            } => Ok(FedNode::Service {
                name: name.clone(),
                pattern: inner.as_ref().clone(),
                silent: *silent,
            }),
            other => FederationError::not_implemented(format!(
                "Federated evaluation of the graph pattern {other}"
            )),
        }
    }

    fn build_bgp(&self, patterns: &[TriplePattern]) -> FederationResult<FedNode> {
        let mut args = patterns
            .iter()
            .map(|p| self.build_statement(p))
            .collect::<FederationResult<Vec<_>>>()?;
        match args.len() {
            0 => Ok(FedNode::True),
            1 => Ok(args.remove(0)),
            _ => Ok(FedNode::join(args)),
        }
    }

    fn build_statement(&self, pattern: &TriplePattern) -> FederationResult<FedNode> {
        let pattern = blank_nodes_to_variables(pattern);
        let selection = self.selector.select(&pattern)?;

        if selection.sources.is_empty() {
            debug!("Pattern {pattern} has no candidate source.");
            return Ok(FedNode::Empty);
        }
        if selection.satisfied {
            return Ok(FedNode::True);
        }

        Ok(FedNode::Statement(StatementNode::new(
            StatementPattern::new(pattern),
            selection.sources,
        )))
    }
}

fn is_join(node: &FedNode) -> bool {
    matches!(node, FedNode::Join(_))
}

fn is_union(node: &FedNode) -> bool {
    matches!(node, FedNode::Union(_))
}

/// Adds `node` to `args`. If `node` is of the same n-ary kind, its arguments are added instead.
fn flatten_into(args: &mut Vec<Arc<FedNode>>, node: FedNode, same_kind: fn(&FedNode) -> bool) {
    if same_kind(&node) {
        if let FedNode::Join(inner) | FedNode::Union(inner) = node {
            args.extend(inner);
        }
    } else {
        args.push(Arc::new(node));
    }
}

/// Blank nodes in a query pattern behave like variables that cannot be projected.
fn blank_nodes_to_variables(pattern: &TriplePattern) -> TriplePattern {
    let convert = |term: &TermPattern| match term {
        TermPattern::BlankNode(bnode) => {
            TermPattern::Variable(Variable::new_unchecked(format!("_{}", bnode.as_str())))
        }
        _ => term.clone(),
    };
    TriplePattern {
        subject: convert(&pattern.subject),
        predicate: pattern.predicate.clone(),
        object: convert(&pattern.object),
    }
}

/// Pushes the conjuncts of `expr` into the statements of `inner`. Conjuncts that cannot be pushed
/// down remain as a filter on top of `inner`.
fn push_down_filter(inner: FedNode, expr: &Expression) -> FedNode {
    let mut conjuncts = Vec::new();
    split_conjunction(expr, &mut conjuncts);

    let mut node = inner;
    let mut residual: Option<Expression> = None;
    for conjunct in conjuncts {
        let pushed = expression_variables(conjunct)
            .filter(|variables| !variables.is_empty())
            .and_then(|variables| push_into_statements(&node, conjunct, &variables));
        match pushed {
            Some(new_node) => node = new_node,
            None => {
                residual = Some(match residual {
                    None => conjunct.clone(),
                    Some(r) => Expression::And(Box::new(r), Box::new(conjunct.clone())),
                })
            }
        }
    }

    match residual {
        None => node,
        Some(expression) => FedNode::Filter {
            inner: Arc::new(node),
            expression,
        },
    }
}

/// Returns a new plan in which `conjunct` has been added to every statement that binds all
/// `variables`, or [None] if there is no such statement.
fn push_into_statements(
    node: &FedNode,
    conjunct: &Expression,
    variables: &[Variable],
) -> Option<FedNode> {
    let covers = |statement: &StatementNode| {
        let bound = statement.statement().variables();
        variables.iter().all(|v| bound.contains(v))
    };
    let push = |statement: &StatementNode| {
        FedNode::Statement(StatementNode::new(
            statement.statement().clone().with_filter(conjunct.clone()),
            statement.sources().to_vec(),
        ))
    };

    match node {
        FedNode::Statement(statement) if covers(statement) => Some(push(statement)),
        FedNode::Join(args) => {
            let mut pushed = false;
            let new_args = args
                .iter()
                .map(|arg| match arg.as_ref() {
                    FedNode::Statement(statement) if covers(statement) => {
                        pushed = true;
                        Arc::new(push(statement))
                    }
                    _ => Arc::clone(arg),
                })
                .collect();
            pushed.then_some(FedNode::Join(new_args))
        }
        _ => None,
    }
}

fn split_conjunction<'a>(expr: &'a Expression, result: &mut Vec<&'a Expression>) {
    if let Expression::And(lhs, rhs) = expr {
        split_conjunction(lhs, result);
        split_conjunction(rhs, result);
    } else {
        result.push(expr);
    }
}

/// Collects the variables of `expr`. Returns [None] for expressions whose variables cannot be
/// determined statically, like `EXISTS`.
fn expression_variables(expr: &Expression) -> Option<Vec<Variable>> {
    fn collect(expr: &Expression, result: &mut Vec<Variable>) -> Option<()> {
        match expr {
            Expression::NamedNode(_) | Expression::Literal(_) => {}
            Expression::Variable(variable) | Expression::Bound(variable) => {
                if !result.contains(variable) {
                    result.push(variable.clone());
                }
            }
            Expression::Or(lhs, rhs)
            | Expression::And(lhs, rhs)
            | Expression::Equal(lhs, rhs)
            | Expression::SameTerm(lhs, rhs)
            | Expression::Greater(lhs, rhs)
            | Expression::GreaterOrEqual(lhs, rhs)
            | Expression::Less(lhs, rhs)
            | Expression::LessOrEqual(lhs, rhs)
            | Expression::Add(lhs, rhs)
            | Expression::Subtract(lhs, rhs)
            | Expression::Multiply(lhs, rhs)
            | Expression::Divide(lhs, rhs) => {
                collect(lhs, result)?;
                collect(rhs, result)?;
            }
            Expression::UnaryPlus(inner)
            | Expression::UnaryMinus(inner)
            | Expression::Not(inner) => collect(inner, result)?,
            Expression::In(lhs, list) => {
                collect(lhs, result)?;
                for e in list {
                    collect(e, result)?;
                }
            }
            Expression::If(test, if_true, if_false) => {
                collect(test, result)?;
                collect(if_true, result)?;
                collect(if_false, result)?;
            }
            Expression::Coalesce(args) | Expression::FunctionCall(_, args) => {
                for e in args {
                    collect(e, result)?;
                }
            }
            Expression::Exists(_) => return None,
        }
        Some(())
    }

    let mut result = Vec::new();
    collect(expr, &mut result)?;
    Some(result)
}
