mod fed_plan_builder;
pub mod join;
mod node;
mod source_selection;

pub use fed_plan_builder::FedPlanBuilder;
pub use node::{ExclusiveGroup, FedNode, StatementNode};
pub use source_selection::{SourceSelection, SourceSelector, StaticSourceSelector};
