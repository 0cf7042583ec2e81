use async_trait::async_trait;
use futures::{stream, StreamExt};
use rdf_federation_common::{
    BindingSetStream, FederationError, FederationResult, SourceConnection, SourceRegistry,
};
use rdf_federation_execution::{FederationConfig, FederationContext, FederationEvaluator};
use rdf_federation_logical::{FedNode, StatementNode};
use rdf_federation_model::{
    BindingSet, Expression, NamedNode, NamedNodePattern, QueryKind, SourceCapability, SourceRef,
    StatementPattern, Term, TermPattern, TriplePattern, Variable,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const EX: &str = "http://ex.org/";

pub fn iri(local: &str) -> NamedNode {
    NamedNode::new_unchecked(format!("{EX}{local}"))
}

pub fn var(name: &str) -> Variable {
    Variable::new_unchecked(name)
}

pub fn pattern(subject: TermPattern, predicate: &str, object: TermPattern) -> StatementPattern {
    StatementPattern::new(TriplePattern {
        subject,
        predicate: iri(predicate).into(),
        object,
    })
}

pub fn statement(pattern: StatementPattern, sources: &[SourceRef]) -> FedNode {
    FedNode::Statement(StatementNode::new(pattern, sources.to_vec()))
}

/// A call that has been received by a [MockSource].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    Lookup(String),
    HasMatch(String),
    Templated {
        query: String,
        filter: Option<Expression>,
    },
}

/// A source that answers lookups from a list of triples and records every call.
#[derive(Debug, Default)]
pub struct MockSource {
    triples: Vec<(NamedNode, NamedNode, Term)>,
    templated_results: Vec<BindingSet>,
    failing: bool,
    delay: Option<Duration>,
    calls: Mutex<Vec<Call>>,
}

impl MockSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_triple(mut self, subject: &str, predicate: &str, object: impl Into<Term>) -> Self {
        self.triples.push((iri(subject), iri(predicate), object.into()));
        self
    }

    pub fn with_templated_result(mut self, result: BindingSet) -> Self {
        self.templated_results.push(result);
        self
    }

    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    async fn record(&self, call: Call) -> FederationResult<()> {
        self.calls.lock().unwrap().push(call);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing {
            return Err(FederationError::source_failure(
                "mock".into(),
                "The source is not available",
            ));
        }
        Ok(())
    }

    fn matches(&self, pattern: &StatementPattern) -> Vec<BindingSet> {
        let pattern = pattern.pattern();
        self.triples
            .iter()
            .filter_map(|(subject, predicate, object)| {
                let bindings = BindingSet::new();
                let bindings = match_term(&pattern.subject, subject.clone().into(), bindings)?;
                let bindings = match &pattern.predicate {
                    NamedNodePattern::NamedNode(node) => (node == predicate).then_some(bindings)?,
                    NamedNodePattern::Variable(variable) => {
                        bind(variable, predicate.clone().into(), bindings)?
                    }
                };
                match_term(&pattern.object, object.clone(), bindings)
            })
            .collect()
    }
}

fn match_term(pattern: &TermPattern, term: Term, bindings: BindingSet) -> Option<BindingSet> {
    match pattern {
        TermPattern::NamedNode(node) => (Term::from(node.clone()) == term).then_some(bindings),
        TermPattern::Literal(literal) => (Term::from(literal.clone()) == term).then_some(bindings),
        TermPattern::Variable(variable) => bind(variable, term, bindings),
        _ => None,
    }
}

fn bind(variable: &Variable, term: Term, bindings: BindingSet) -> Option<BindingSet> {
    match bindings.get(variable) {
        Some(existing) => (existing == &term).then_some(bindings),
        None => Some(bindings.with(variable.clone(), term)),
    }
}

#[async_trait]
impl SourceConnection for MockSource {
    async fn run_templated_query(
        &self,
        query: &str,
        _bindings: &BindingSet,
        filter: Option<&Expression>,
    ) -> FederationResult<BindingSetStream> {
        self.record(Call::Templated {
            query: query.to_owned(),
            filter: filter.cloned(),
        })
        .await?;
        Ok(stream::iter(self.templated_results.clone().into_iter().map(Ok)).boxed())
    }

    async fn lookup_pattern(
        &self,
        pattern: &StatementPattern,
        _bindings: &BindingSet,
    ) -> FederationResult<BindingSetStream> {
        self.record(Call::Lookup(pattern.to_string())).await?;
        Ok(stream::iter(self.matches(pattern).into_iter().map(Ok)).boxed())
    }

    async fn has_match(
        &self,
        pattern: &StatementPattern,
        _bindings: &BindingSet,
    ) -> FederationResult<bool> {
        self.record(Call::HasMatch(pattern.to_string())).await?;
        Ok(!self.matches(pattern).is_empty())
    }
}

/// A federation over mock sources.
pub struct TestFederation {
    pub context: Arc<FederationContext>,
    pub sources: Vec<(SourceRef, Arc<MockSource>)>,
}

impl TestFederation {
    pub fn new(config: FederationConfig, sources: Vec<(&str, SourceCapability, MockSource)>) -> Self {
        let mut registry = SourceRegistry::new();
        let sources = sources
            .into_iter()
            .map(|(id, capability, source)| {
                let source = Arc::new(source);
                let source_ref = registry.register(id, capability, Arc::clone(&source) as _);
                (source_ref, source)
            })
            .collect();
        let context = FederationContext::try_new(config, registry).unwrap();
        Self {
            context: Arc::new(context),
            sources,
        }
    }

    pub fn source_ref(&self, idx: usize) -> SourceRef {
        self.sources[idx].0.clone()
    }

    pub fn source(&self, idx: usize) -> &MockSource {
        &self.sources[idx].1
    }

    /// Creates an evaluator for a new, registered query.
    pub fn evaluator(&self) -> FederationEvaluator {
        let manager = self.context.query_manager();
        let query = manager.create_query_info("SELECT * WHERE { ?s ?p ?o }", QueryKind::Select);
        manager.register(Arc::clone(&query));
        FederationEvaluator::new(Arc::clone(&self.context), query)
    }

    /// Evaluates `node` with empty input bindings and collects all results.
    pub async fn evaluate(&self, node: FedNode) -> Vec<FederationResult<BindingSet>> {
        self.evaluator()
            .evaluate(&Arc::new(node), BindingSet::new())
            .collect()
            .await
    }
}
