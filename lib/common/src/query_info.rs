use rdf_federation_model::QueryKind;
use std::fmt;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::SystemTime;

/// The identity of a query within a federation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QueryId(u64);

impl QueryId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl Display for QueryId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Information about a single query evaluation.
///
/// A [QueryInfo] is shared (via `Arc`) by every operator and task created while evaluating the
/// query. The cancellation flag is the only mutable part. Once a query has been aborted, it stays
/// aborted.
#[derive(Debug)]
pub struct QueryInfo {
    id: QueryId,
    query: String,
    kind: QueryKind,
    created: SystemTime,
    aborted: AtomicBool,
}

impl QueryInfo {
    /// Creates a new [QueryInfo].
    pub fn new(id: QueryId, query: impl Into<String>, kind: QueryKind) -> Self {
        Self {
            id,
            query: query.into(),
            kind,
            created: SystemTime::now(),
            aborted: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> QueryId {
        self.id
    }

    /// The query text after prefix rewriting.
    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn kind(&self) -> QueryKind {
        self.kind
    }

    pub fn created(&self) -> SystemTime {
        self.created
    }

    /// Returns `true` if the query has been aborted.
    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::Acquire)
    }

    /// Marks the query as aborted. Returns `false` if it was already aborted.
    pub fn mark_aborted(&self) -> bool {
        !self.aborted.swap(true, Ordering::AcqRel)
    }
}

impl PartialEq for QueryInfo {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for QueryInfo {}
