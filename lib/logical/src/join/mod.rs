mod join_ordering;
mod statement_group;

pub use join_ordering::*;
pub use statement_group::*;
