use rdf_federation_common::FederationResult;
use rdf_federation_model::{NamedNode, NamedNodePattern, SourceRef, TriplePattern};
use std::collections::HashMap;

/// The outcome of source selection for a single triple pattern.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SourceSelection {
    /// The sources that may contribute matches. No sources means that the pattern cannot produce
    /// any results.
    pub sources: Vec<SourceRef>,
    /// Whether the pattern is known to be satisfied regardless of the bindings. This is the case
    /// for fully bound patterns that at least one source has confirmed.
    pub satisfied: bool,
}

impl SourceSelection {
    /// Creates a [SourceSelection] with the given candidate `sources`.
    pub fn new(sources: Vec<SourceRef>) -> Self {
        Self {
            sources,
            satisfied: false,
        }
    }

    /// Creates a [SourceSelection] for a pattern that is known to be satisfied.
    pub fn satisfied(sources: Vec<SourceRef>) -> Self {
        Self {
            sources,
            satisfied: true,
        }
    }
}

/// Determines the candidate sources of triple patterns.
///
/// Source selection usually involves capability discovery or ASK requests against the sources.
/// This is outside the scope of the planner, which only consumes the result.
pub trait SourceSelector: Send + Sync {
    fn select(&self, pattern: &TriplePattern) -> FederationResult<SourceSelection>;
}

impl<F> SourceSelector for F
where
    F: Fn(&TriplePattern) -> SourceSelection + Send + Sync,
{
    fn select(&self, pattern: &TriplePattern) -> FederationResult<SourceSelection> {
        Ok(self(pattern))
    }
}

/// A [SourceSelector] that assigns candidate sources based on the predicate of a pattern.
///
/// Patterns with a variable predicate, or a predicate without explicit assignment, are assigned
/// to the fallback sources.
#[derive(Clone, Debug, Default)]
pub struct StaticSourceSelector {
    by_predicate: HashMap<NamedNode, Vec<SourceRef>>,
    fallback: Vec<SourceRef>,
}

impl StaticSourceSelector {
    pub fn new(fallback: Vec<SourceRef>) -> Self {
        Self {
            by_predicate: HashMap::new(),
            fallback,
        }
    }

    /// Assigns `sources` to all patterns with `predicate`.
    #[must_use]
    pub fn with_predicate(mut self, predicate: NamedNode, sources: Vec<SourceRef>) -> Self {
        self.by_predicate.insert(predicate, sources);
        self
    }
}

impl SourceSelector for StaticSourceSelector {
    fn select(&self, pattern: &TriplePattern) -> FederationResult<SourceSelection> {
        let sources = match &pattern.predicate {
            NamedNodePattern::NamedNode(predicate) => self
                .by_predicate
                .get(predicate)
                .unwrap_or(&self.fallback)
                .clone(),
            NamedNodePattern::Variable(_) => self.fallback.clone(),
        };
        Ok(SourceSelection::new(sources))
    }
}
