use crate::{FederationError, FederationResult, SourceConnection};
use rdf_federation_model::{SourceCapability, SourceId, SourceRef};
use std::collections::HashMap;
use std::sync::Arc;

/// A registered data source.
#[derive(Clone, Debug)]
pub struct SourceEndpoint {
    id: SourceId,
    capability: SourceCapability,
    connection: Arc<dyn SourceConnection>,
}

impl SourceEndpoint {
    pub fn id(&self) -> &SourceId {
        &self.id
    }

    pub fn capability(&self) -> SourceCapability {
        self.capability
    }

    pub fn connection(&self) -> &Arc<dyn SourceConnection> {
        &self.connection
    }

    /// Returns the [SourceRef] that the source selection attaches to patterns.
    pub fn source_ref(&self) -> SourceRef {
        SourceRef::new(self.id.clone(), self.capability)
    }
}

/// Holds the connections of all sources that are part of the federation.
#[derive(Clone, Debug, Default)]
pub struct SourceRegistry {
    endpoints: HashMap<SourceId, SourceEndpoint>,
}

impl SourceRegistry {
    /// Creates an empty [SourceRegistry].
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a source. An existing source with the same id is replaced.
    pub fn register(
        &mut self,
        id: impl Into<SourceId>,
        capability: SourceCapability,
        connection: Arc<dyn SourceConnection>,
    ) -> SourceRef {
        let id = id.into();
        let endpoint = SourceEndpoint {
            id: id.clone(),
            capability,
            connection,
        };
        let source_ref = endpoint.source_ref();
        self.endpoints.insert(id, endpoint);
        source_ref
    }

    /// Builder-style variant of [Self::register].
    #[must_use]
    pub fn with_source(
        mut self,
        id: impl Into<SourceId>,
        capability: SourceCapability,
        connection: Arc<dyn SourceConnection>,
    ) -> Self {
        self.register(id, capability, connection);
        self
    }

    /// Returns the endpoint of `id`.
    ///
    /// # Errors
    ///
    /// If no source with `id` is registered.
    pub fn endpoint(&self, id: &SourceId) -> FederationResult<&SourceEndpoint> {
        self.endpoints
            .get(id)
            .ok_or_else(|| FederationError::UnknownSource(id.clone()))
    }

    /// Returns the connection of `id`.
    pub fn connection(&self, id: &SourceId) -> FederationResult<Arc<dyn SourceConnection>> {
        self.endpoint(id).map(|e| Arc::clone(&e.connection))
    }

    /// Returns references to all registered sources, ordered by id.
    pub fn sources(&self) -> Vec<SourceRef> {
        let mut sources = self
            .endpoints
            .values()
            .map(SourceEndpoint::source_ref)
            .collect::<Vec<_>>();
        sources.sort_by(|a, b| a.id().cmp(b.id()));
        sources
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}
