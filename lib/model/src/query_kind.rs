use spargebra::Query;
use std::fmt;
use std::fmt::{Display, Formatter};

/// The kind of SPARQL query form.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum QueryKind {
    Select,
    Ask,
    Construct,
    Describe,
}

impl From<&Query> for QueryKind {
    fn from(query: &Query) -> Self {
        match query {
            Query::Select { .. } => QueryKind::Select,
            Query::Ask { .. } => QueryKind::Ask,
            Query::Construct { .. } => QueryKind::Construct,
            Query::Describe { .. } => QueryKind::Describe,
        }
    }
}

impl Display for QueryKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            QueryKind::Select => write!(f, "SELECT"),
            QueryKind::Ask => write!(f, "ASK"),
            QueryKind::Construct => write!(f, "CONSTRUCT"),
            QueryKind::Describe => write!(f, "DESCRIBE"),
        }
    }
}
