pub mod error;
mod query_info;
mod source_connection;
mod source_registry;
mod stream;

pub use error::{FederationError, FederationResult};
pub use query_info::{QueryId, QueryInfo};
pub use source_connection::SourceConnection;
pub use source_registry::{SourceEndpoint, SourceRegistry};
pub use stream::{empty_stream, error_stream, single_stream, BindingSetStream};
