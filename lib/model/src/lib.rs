mod binding_set;
mod query_kind;
mod source;
mod statement;

pub use binding_set::BindingSet;
pub use query_kind::QueryKind;
pub use source::{SourceCapability, SourceId, SourceRef};
pub use statement::StatementPattern;

// Re-export some oxrdf types.
pub use oxrdf::vocab;
pub use oxrdf::{
    BlankNode, Graph, Literal, LiteralRef, NamedNode, NamedNodeRef, Subject, Term, TermRef,
    Triple, TripleRef, Variable, VariableRef,
};

// Re-export the spargebra algebra that is consumed by the planner.
pub use spargebra::algebra::{Expression, GraphPattern};
pub use spargebra::term::{GroundTerm, NamedNodePattern, TermPattern, TriplePattern};
pub use spargebra::{Query, SparqlSyntaxError};
