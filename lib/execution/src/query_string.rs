use rdf_federation_common::{FederationError, FederationResult};
use rdf_federation_model::{
    BindingSet, Expression, GraphPattern, GroundTerm, Query, StatementPattern, Term, Variable,
};

/// Builds the templated SELECT query that evaluates `statements` for `bindings`.
///
/// The bound variables are substituted into the patterns and only the remaining free variables are
/// projected. Filters of the statements are included in the query. If a filter references a
/// variable that has been substituted, the binding is re-introduced with a `VALUES` clause.
///
/// # Errors
///
/// If no free variable remains. Such patterns must be evaluated as a check instead.
pub fn select_query(
    statements: &[StatementPattern],
    bindings: &BindingSet,
) -> FederationResult<String> {
    let bound = statements
        .iter()
        .map(|statement| statement.bind(bindings))
        .collect::<Vec<_>>();

    let mut projection: Vec<Variable> = Vec::new();
    for variable in bound.iter().flat_map(StatementPattern::variables) {
        if !projection.contains(&variable) {
            projection.push(variable);
        }
    }
    if projection.is_empty() {
        return Err(FederationError::TemplatedQuery(format!(
            "All variables of {} are bound by {bindings}",
            display_statements(statements)
        )));
    }

    let filter = bound
        .iter()
        .filter_map(StatementPattern::filter)
        .cloned()
        .reduce(|lhs, rhs| Expression::And(Box::new(lhs), Box::new(rhs)));

    let mut pattern = GraphPattern::Bgp {
        patterns: bound.iter().map(|s| s.pattern().clone()).collect(),
    };
    if let Some(filter) = filter {
        if let Some(values) = values_for_filter(&filter, &projection, bindings) {
            pattern = GraphPattern::Join {
                left: Box::new(values),
                right: Box::new(pattern),
            };
        }
        pattern = GraphPattern::Filter {
            expr: filter,
            inner: Box::new(pattern),
        };
    }

    let query = Query::Select {
        dataset: None,
        pattern: GraphPattern::Project {
            inner: Box::new(pattern),
            variables: projection,
        },
        base_iri: None,
    };
    Ok(query.to_string())
}

/// Creates a `VALUES` clause for the filter variables that are bound but no longer part of the
/// patterns.
fn values_for_filter(
    filter: &Expression,
    free_variables: &[Variable],
    bindings: &BindingSet,
) -> Option<GraphPattern> {
    let mut variables = Vec::new();
    let mut row = Vec::new();
    collect_filter_variables(filter, &mut |variable| {
        if free_variables.contains(variable) || variables.contains(variable) {
            return;
        }
        let term = match bindings.get(variable) {
            Some(Term::NamedNode(node)) => GroundTerm::NamedNode(node.clone()),
            Some(Term::Literal(literal)) => GroundTerm::Literal(literal.clone()),
            _ => return,
        };
        variables.push(variable.clone());
        row.push(Some(term));
    });

    (!variables.is_empty()).then(|| GraphPattern::Values {
        variables,
        bindings: vec![row],
    })
}

fn collect_filter_variables(expr: &Expression, callback: &mut impl FnMut(&Variable)) {
    match expr {
        Expression::NamedNode(_) | Expression::Literal(_) | Expression::Exists(_) => {}
        Expression::Variable(variable) | Expression::Bound(variable) => callback(variable),
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
            collect_filter_variables(lhs, callback);
            collect_filter_variables(rhs, callback);
        }
        Expression::UnaryPlus(inner) | Expression::UnaryMinus(inner) | Expression::Not(inner) => {
            collect_filter_variables(inner, callback);
        }
        Expression::In(lhs, list) => {
            collect_filter_variables(lhs, callback);
            for e in list {
                collect_filter_variables(e, callback);
            }
        }
        Expression::If(test, if_true, if_false) => {
            collect_filter_variables(test, callback);
            collect_filter_variables(if_true, callback);
            collect_filter_variables(if_false, callback);
        }
        Expression::Coalesce(args) | Expression::FunctionCall(_, args) => {
            for e in args {
                collect_filter_variables(e, callback);
            }
        }
    }
}

fn display_statements(statements: &[StatementPattern]) -> String {
    statements
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
