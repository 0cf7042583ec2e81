//! Local evaluation of filter expressions over binding sets.
//!
//! Filters are evaluated with three-valued logic: an evaluation error, e.g., comparing an unbound
//! variable, yields [None], which a filter treats as `false`. Supported are `=`, `!=`,
//! `sameTerm`, `&&`, `||`, `!`, `bound` and boolean literals. `=` compares RDF terms.

use futures::{future, StreamExt, TryStreamExt};
use rdf_federation_common::{BindingSetStream, FederationError, FederationResult};
use rdf_federation_model::vocab::xsd;
use rdf_federation_model::{BindingSet, Expression, Term};

/// Keeps the results of `results` for which `expression` evaluates to `true`.
///
/// An unsupported expression fails the stream with [FederationError::NotImplemented].
pub fn filter_stream(results: BindingSetStream, expression: Expression) -> BindingSetStream {
    results
        .try_filter_map(move |solution| {
            future::ready(
                evaluate_filter(&expression, &solution)
                    .map(|value| (value == Some(true)).then_some(solution)),
            )
        })
        .boxed()
}

/// Evaluates the effective boolean value of `expression` for `bindings`.
pub fn evaluate_filter(
    expression: &Expression,
    bindings: &BindingSet,
) -> FederationResult<Option<bool>> {
    Ok(match expression {
        Expression::And(lhs, rhs) => {
            match (evaluate_filter(lhs, bindings)?, evaluate_filter(rhs, bindings)?) {
                (Some(false), _) | (_, Some(false)) => Some(false),
                (Some(true), Some(true)) => Some(true),
                _ => None,
            }
        }
        Expression::Or(lhs, rhs) => {
            match (evaluate_filter(lhs, bindings)?, evaluate_filter(rhs, bindings)?) {
                (Some(true), _) | (_, Some(true)) => Some(true),
                (Some(false), Some(false)) => Some(false),
                _ => None,
            }
        }
        Expression::Not(inner) => evaluate_filter(inner, bindings)?.map(|value| !value),
        Expression::Bound(variable) => Some(bindings.contains(variable)),
        Expression::Equal(lhs, rhs) | Expression::SameTerm(lhs, rhs) => {
            match (evaluate_term(lhs, bindings)?, evaluate_term(rhs, bindings)?) {
                (Some(lhs), Some(rhs)) => Some(lhs == rhs),
                _ => None,
            }
        }
        Expression::Literal(literal) if literal.datatype() == xsd::BOOLEAN => {
            Some(matches!(literal.value(), "true" | "1"))
        }
        other => return FederationError::not_implemented(format!("Local evaluation of {other}")),
    })
}

fn evaluate_term(expression: &Expression, bindings: &BindingSet) -> FederationResult<Option<Term>> {
    Ok(match expression {
        Expression::NamedNode(node) => Some(node.clone().into()),
        Expression::Literal(literal) => Some(literal.clone().into()),
        Expression::Variable(variable) => bindings.get(variable).cloned(),
        other => {
            return FederationError::not_implemented(format!(
                "Local evaluation of the operand {other}"
            ))
        }
    })
}
