use crate::{FederationError, FederationResult};
use futures::stream::BoxStream;
use futures::{stream, StreamExt};
use rdf_federation_model::BindingSet;

/// A stream of binding sets produced by an operator or a source.
///
/// Errors are reported in-band. Operators stop producing items after the first error.
pub type BindingSetStream = BoxStream<'static, FederationResult<BindingSet>>;

/// A stream without any binding set.
pub fn empty_stream() -> BindingSetStream {
    stream::empty().boxed()
}

/// A stream that yields exactly `bindings`.
pub fn single_stream(bindings: BindingSet) -> BindingSetStream {
    stream::once(async move { Ok(bindings) }).boxed()
}

/// A stream that yields `error` and ends.
pub fn error_stream(error: FederationError) -> BindingSetStream {
    stream::once(async move { Err(error) }).boxed()
}
