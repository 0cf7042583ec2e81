use std::fmt;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Identifies a data source of the federation.
///
/// Two source references denote the same source iff their identifiers are equal.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SourceId(Arc<str>);

impl SourceId {
    /// Creates a new [SourceId].
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SourceId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for SourceId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl Display for SourceId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Describes how a source is queried most efficiently.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SourceCapability {
    /// Issuing one templated query per pattern is cheaper than a structural lookup. This is
    /// usually the case for remote SPARQL endpoints.
    Prepared,
    /// Direct pattern lookups are cheaper. This is usually the case for local stores.
    #[default]
    Lookup,
}

/// A candidate source of a triple pattern together with its capability.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SourceRef {
    id: SourceId,
    capability: SourceCapability,
}

impl SourceRef {
    /// Creates a new [SourceRef].
    pub fn new(id: impl Into<SourceId>, capability: SourceCapability) -> Self {
        Self {
            id: id.into(),
            capability,
        }
    }

    pub fn id(&self) -> &SourceId {
        &self.id
    }

    pub fn capability(&self) -> SourceCapability {
        self.capability
    }

    /// Returns `true` if templated queries should be sent to this source.
    pub fn uses_prepared_query(&self) -> bool {
        self.capability == SourceCapability::Prepared
    }

    /// Returns `true` if both references point to the same source.
    pub fn same_source(&self, other: &SourceRef) -> bool {
        self.id == other.id
    }
}

impl Display for SourceRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.id, f)
    }
}
