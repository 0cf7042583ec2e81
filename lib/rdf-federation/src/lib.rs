#![doc = include_str!("../README.md")]
#![doc(test(attr(deny(warnings))))]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

mod federation;
pub mod memory_source;
pub mod results;

pub use federation::{Federation, PreparedQuery};
pub use memory_source::MemorySource;
pub use results::{QueryResults, QuerySolutionStream, QueryTripleStream};

pub mod model {
    pub use rdf_federation_model::*;
}

pub mod common {
    pub use rdf_federation_common::*;
}

pub mod logical {
    pub use rdf_federation_logical::*;
}

pub mod execution {
    pub use rdf_federation_execution::*;
}
