use rdf_federation_common::FederationResult;
use rdf_federation_model::Graph;

mod solutions;
mod triples;

pub(crate) use solutions::RunningQuery;
pub use solutions::QuerySolutionStream;
pub use triples::QueryTripleStream;

/// Results of a [SPARQL query](https://www.w3.org/TR/sparql11-query/).
pub enum QueryResults {
    /// Results of a [SELECT](https://www.w3.org/TR/sparql11-query/#select) query.
    Solutions(QuerySolutionStream),
    /// Result of an [ASK](https://www.w3.org/TR/sparql11-query/#ask) query.
    Boolean(bool),
    /// Results of a [CONSTRUCT](https://www.w3.org/TR/sparql11-query/#construct) query.
    Graph(QueryTripleStream),
}

impl QueryResults {
    /// Returns the solutions if these are the results of a SELECT query.
    pub fn into_solutions(self) -> Option<QuerySolutionStream> {
        match self {
            QueryResults::Solutions(solutions) => Some(solutions),
            _ => None,
        }
    }

    /// Returns the boolean if this is the result of an ASK query.
    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            QueryResults::Boolean(value) => Some(*value),
            _ => None,
        }
    }

    /// Collects the triples of CONSTRUCT results into a [Graph].
    ///
    /// Returns [None] if these are not the results of a CONSTRUCT query.
    pub async fn collect_graph(self) -> Option<FederationResult<Graph>> {
        match self {
            QueryResults::Graph(mut triples) => Some(triples.collect_as_graph().await),
            _ => None,
        }
    }
}
