use crate::BindingSet;
use oxrdf::{Term, Variable};
use spargebra::algebra::Expression;
use spargebra::term::{NamedNodePattern, TermPattern, TriplePattern};
use std::fmt;
use std::fmt::{Display, Formatter};

/// A triple pattern together with the filter that has been pushed down into it.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct StatementPattern {
    pattern: TriplePattern,
    filter: Option<Expression>,
}

impl StatementPattern {
    /// Creates a new [StatementPattern] without a filter.
    pub fn new(pattern: TriplePattern) -> Self {
        Self {
            pattern,
            filter: None,
        }
    }

    /// Adds `expr` to the filter of this pattern. An existing filter is combined with a
    /// conjunction.
    #[must_use]
    pub fn with_filter(self, expr: Expression) -> Self {
        let filter = match self.filter {
            None => expr,
            Some(existing) => Expression::And(Box::new(existing), Box::new(expr)),
        };
        Self {
            pattern: self.pattern,
            filter: Some(filter),
        }
    }

    pub fn pattern(&self) -> &TriplePattern {
        &self.pattern
    }

    pub fn filter(&self) -> Option<&Expression> {
        self.filter.as_ref()
    }

    /// Returns the variables of the pattern in subject, predicate, object order without
    /// duplicates.
    pub fn variables(&self) -> Vec<Variable> {
        let mut result: Vec<Variable> = Vec::with_capacity(3);
        let candidates = [
            term_variable(&self.pattern.subject),
            match &self.pattern.predicate {
                NamedNodePattern::Variable(v) => Some(v),
                NamedNodePattern::NamedNode(_) => None,
            },
            term_variable(&self.pattern.object),
        ];
        for variable in candidates.into_iter().flatten() {
            if !result.contains(variable) {
                result.push(variable.clone());
            }
        }
        result
    }

    /// Returns the variables of the pattern that are not bound by `bindings`.
    pub fn free_variables(&self, bindings: &BindingSet) -> Vec<Variable> {
        self.bind(bindings).variables()
    }

    /// Returns `true` if every position of the pattern is fixed once `bindings` is applied.
    pub fn is_check_pattern(&self, bindings: &BindingSet) -> bool {
        self.free_variables(bindings).is_empty()
    }

    /// Substitutes variables bound by `bindings` with their terms.
    ///
    /// Variables bound to blank nodes stay variables, as blank node labels are scoped to the
    /// source they originate from. Their results are reconciled when merging with `bindings`.
    #[must_use]
    pub fn bind(&self, bindings: &BindingSet) -> StatementPattern {
        if bindings.is_empty() {
            return self.clone();
        }

        let predicate = match &self.pattern.predicate {
            NamedNodePattern::Variable(variable) => match bindings.get(variable) {
                Some(Term::NamedNode(node)) => NamedNodePattern::NamedNode(node.clone()),
                _ => self.pattern.predicate.clone(),
            },
            NamedNodePattern::NamedNode(_) => self.pattern.predicate.clone(),
        };

        StatementPattern {
            pattern: TriplePattern {
                subject: bind_term(&self.pattern.subject, bindings),
                predicate,
                object: bind_term(&self.pattern.object, bindings),
            },
            filter: self.filter.clone(),
        }
    }
}

impl From<TriplePattern> for StatementPattern {
    fn from(pattern: TriplePattern) -> Self {
        Self::new(pattern)
    }
}

impl Display for StatementPattern {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.pattern)?;
        if let Some(filter) = &self.filter {
            write!(f, " FILTER {filter}")?;
        }
        Ok(())
    }
}

fn term_variable(term: &TermPattern) -> Option<&Variable> {
    match term {
        TermPattern::Variable(variable) => Some(variable),
        _ => None,
    }
}

fn bind_term(term: &TermPattern, bindings: &BindingSet) -> TermPattern {
    if let TermPattern::Variable(variable) = term {
        match bindings.get(variable) {
            Some(Term::NamedNode(node)) => return node.clone().into(),
            Some(Term::Literal(literal)) => return literal.clone().into(),
            _ => {}
        }
    }
    term.clone()
}
