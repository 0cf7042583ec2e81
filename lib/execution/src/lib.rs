//! This crate defines the execution engine of the federation.
//!
//! # Federation Context
//!
//! The [`FederationContext`] holds the state that is shared by all queries: the registered
//! sources, the join and union schedulers, and the [`QueryManager`] that tracks running queries.
//!
//! # Evaluating Plans
//!
//! Optimized plans are evaluated by a [`FederationEvaluator`]:
//!
//! ```text
//! FedNode -> FederationEvaluator -> Stream of Binding Sets
//! ```
//!
//! Statements are evaluated with a [`WorkerUnion`](union::WorkerUnion) over their candidate
//! sources, while joins are evaluated with a [`ControlledWorkerJoin`](join::ControlledWorkerJoin)
//! that evaluates the right side concurrently for each left binding. All fan-out goes through the
//! bounded [`ControlledWorkerScheduler`](scheduler::ControlledWorkerScheduler)s of the context.

mod config;
mod context;
mod evaluator;
pub mod filter;
pub mod join;
pub mod query_manager;
pub mod query_string;
pub mod scheduler;
mod statement;
pub mod union;

pub use config::FederationConfig;
pub use context::FederationContext;
pub use evaluator::FederationEvaluator;
pub use query_manager::QueryManager;
