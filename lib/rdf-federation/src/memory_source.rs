//! An in-memory data source.

use async_trait::async_trait;
use futures::{stream, StreamExt};
use rdf_federation_common::{BindingSetStream, FederationError, FederationResult, SourceConnection};
use rdf_federation_execution::filter::evaluate_filter;
use rdf_federation_model::{
    BindingSet, Expression, Graph, NamedNodePattern, StatementPattern, Term, TermPattern, Triple,
    TriplePattern, TripleRef, Variable,
};
use tracing::trace;

/// A source that answers lookups from an in-memory [Graph].
///
/// The source should be registered with [`SourceCapability::Lookup`](rdf_federation_model::SourceCapability::Lookup)
/// as it does not evaluate templated queries. Filters of looked-up patterns are evaluated locally
/// with [evaluate_filter].
#[derive(Debug, Default, Clone)]
pub struct MemorySource {
    graph: Graph,
}

impl MemorySource {
    /// Creates a new [MemorySource] that contains the triples of `graph`.
    pub fn new(graph: Graph) -> Self {
        Self { graph }
    }

    #[must_use]
    pub fn with_triple(mut self, triple: Triple) -> Self {
        self.graph.insert(&triple);
        self
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Returns the solutions of `pattern` that satisfy its filter.
    fn evaluate(
        &self,
        pattern: &StatementPattern,
        bindings: &BindingSet,
    ) -> FederationResult<Vec<BindingSet>> {
        let bound = pattern.bind(bindings);
        let mut result = Vec::new();
        for solution in self.matches(bound.pattern()) {
            if let Some(filter) = bound.filter() {
                let Some(merged) = bindings.merge(&solution) else {
                    continue;
                };
                if evaluate_filter(filter, &merged)? != Some(true) {
                    continue;
                }
            }
            result.push(solution);
        }
        trace!("{bound} has {} matches.", result.len());
        Ok(result)
    }

    fn matches(&self, pattern: &TriplePattern) -> Vec<BindingSet> {
        let candidates: Box<dyn Iterator<Item = TripleRef<'_>>> = match &pattern.subject {
            TermPattern::NamedNode(subject) => {
                Box::new(self.graph.triples_for_subject(subject.as_ref()))
            }
            _ => Box::new(self.graph.iter()),
        };
        candidates
            .filter_map(|triple| match_triple(pattern, triple))
            .collect()
    }
}

impl From<Graph> for MemorySource {
    fn from(graph: Graph) -> Self {
        Self::new(graph)
    }
}

#[async_trait]
impl SourceConnection for MemorySource {
    async fn run_templated_query(
        &self,
        _query: &str,
        _bindings: &BindingSet,
        _filter: Option<&Expression>,
    ) -> FederationResult<BindingSetStream> {
        FederationError::not_implemented("Templated queries against a MemorySource")
    }

    async fn lookup_pattern(
        &self,
        pattern: &StatementPattern,
        bindings: &BindingSet,
    ) -> FederationResult<BindingSetStream> {
        let solutions = self.evaluate(pattern, bindings)?;
        Ok(stream::iter(solutions.into_iter().map(Ok)).boxed())
    }

    async fn has_match(
        &self,
        pattern: &StatementPattern,
        bindings: &BindingSet,
    ) -> FederationResult<bool> {
        Ok(!self.evaluate(pattern, bindings)?.is_empty())
    }
}

fn match_triple(pattern: &TriplePattern, triple: TripleRef<'_>) -> Option<BindingSet> {
    let solution = match_term(
        &pattern.subject,
        triple.subject.into_owned().into(),
        BindingSet::new(),
    )?;
    let solution = match &pattern.predicate {
        NamedNodePattern::NamedNode(predicate) => {
            (predicate.as_ref() == triple.predicate).then_some(solution)?
        }
        NamedNodePattern::Variable(variable) => {
            bind(variable, triple.predicate.into_owned().into(), solution)?
        }
    };
    match_term(&pattern.object, triple.object.into_owned(), solution)
}

fn match_term(pattern: &TermPattern, term: Term, solution: BindingSet) -> Option<BindingSet> {
    match pattern {
        TermPattern::NamedNode(node) => matches!(&term, Term::NamedNode(n) if n == node)
            .then_some(solution),
        TermPattern::Literal(literal) => {
            matches!(&term, Term::Literal(l) if l == literal).then_some(solution)
        }
        TermPattern::Variable(variable) => bind(variable, term, solution),
        // Anonymous
        TermPattern::BlankNode(_) => Some(solution),
        #[allow(unreachable_patterns)]
        _ => None,
    }
}

fn bind(variable: &Variable, term: Term, solution: BindingSet) -> Option<BindingSet> {
    match solution.get(variable) {
        Some(existing) => (existing == &term).then_some(solution),
        None => Some(solution.with(variable.clone(), term)),
    }
}
