use crate::results::QuerySolutionStream;
use futures::{Stream, StreamExt};
use rdf_federation_common::FederationResult;
use rdf_federation_model::{BindingSet, BlankNode, Graph, Term, TermPattern, Triple, TriplePattern};
use std::collections::{HashMap, HashSet};
use std::pin::Pin;
use std::task::{ready, Context, Poll};

/// A stream over the triples of a CONSTRUCT query.
///
/// Every solution instantiates the template once. Triples with unbound or invalid positions are
/// skipped, and triples without blank nodes are only emitted once.
pub struct QueryTripleStream {
    template: Vec<TriplePattern>,
    inner: QuerySolutionStream,

    buffered_results: Vec<Triple>,
    already_emitted_results: HashSet<Triple>,
    bnodes: HashMap<BlankNode, BlankNode>,
}

impl QueryTripleStream {
    pub(crate) fn new(template: Vec<TriplePattern>, inner: QuerySolutionStream) -> Self {
        Self {
            template,
            inner,
            buffered_results: vec![],
            already_emitted_results: HashSet::new(),
            bnodes: HashMap::new(),
        }
    }

    pub async fn collect_as_graph(&mut self) -> FederationResult<Graph> {
        let mut graph = Graph::new();
        while let Some(triple) = self.next().await {
            let triple = triple?;
            graph.insert(triple.as_ref());
        }
        Ok(graph)
    }

    fn instantiate(&mut self, solution: &BindingSet) {
        for template in &self.template {
            let subject = template_value(&template.subject, solution, &mut self.bnodes)
                .and_then(|t| t.try_into().ok());
            let predicate = template_value(
                &TermPattern::from(template.predicate.clone()),
                solution,
                &mut self.bnodes,
            )
            .and_then(|t| t.try_into().ok());
            let object = template_value(&template.object, solution, &mut self.bnodes);

            if let (Some(subject), Some(predicate), Some(object)) = (subject, predicate, object) {
                let triple = Triple {
                    subject,
                    predicate,
                    object,
                };
                // Blank nodes are fresh for every solution.
                let new_triple = triple.subject.is_blank_node()
                    || triple.object.is_blank_node()
                    || self.already_emitted_results.insert(triple.clone());
                if new_triple {
                    self.buffered_results.push(triple);
                }
            }
        }
        self.bnodes.clear();
        // Keep the template order when popping.
        self.buffered_results.reverse();
    }
}

fn template_value(
    selector: &TermPattern,
    solution: &BindingSet,
    bnodes: &mut HashMap<BlankNode, BlankNode>,
) -> Option<Term> {
    match selector {
        TermPattern::NamedNode(node) => Some(Term::NamedNode(node.clone())),
        TermPattern::BlankNode(bnode) => Some(Term::BlankNode(
            bnodes.entry(bnode.clone()).or_default().clone(),
        )),
        TermPattern::Literal(literal) => Some(Term::Literal(literal.clone())),
        TermPattern::Variable(variable) => solution.get(variable).cloned(),
        #[allow(unreachable_patterns)]
        _ => None,
    }
}

impl Stream for QueryTripleStream {
    type Item = FederationResult<Triple>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            if let Some(triple) = self.buffered_results.pop() {
                return Poll::Ready(Some(Ok(triple)));
            }

            match ready!(self.inner.poll_next_unpin(cx)) {
                None => return Poll::Ready(None),
                Some(Err(error)) => return Poll::Ready(Some(Err(error))),
                Some(Ok(solution)) => self.instantiate(&solution),
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let (_, max) = self.inner.size_hint();
        let buffered = self.buffered_results.len();
        (
            buffered,
            max.and_then(|v| v.checked_mul(self.template.len()))
                .and_then(|v| v.checked_add(buffered)),
        )
    }
}
