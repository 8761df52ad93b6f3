//! Producers Core
//!
//! This crate provides an in-process task-graph engine: typed computations
//! ("producers") wired into a directed acyclic graph, where each producer's
//! output feeds the inputs of the producers registered with its handle.
//! It implements:
//!
//! - A result model passed between producers (values, chained errors,
//!   outputs and read-only input views)
//! - A per-node execution state machine with a fan-in barrier
//! - Type-safe wiring of producer functions to their dependencies
//! - Execution of the minimal subgraph needed for a requested result, with
//!   independent branches running concurrently
//!
//! Failures stay local: a producer that returns an error or panics records
//! an error as its output, which downstream producers see as a failed input
//! and the caller sees as a failed result. Sibling branches are unaffected.
//!
//! # Architecture
//!
//! - `result`: `Value`, `Error`, `Output`, `Input`
//! - `graph`: nodes, handles, wiring and the `ProducerGraph` scheduler
//!
//! # Example
//!
//! ```rust
//! use producers_core::{Error, Input, Output, ProducerGraph};
//!
//! fn left() -> Output<i32> {
//!     Output::value(7)
//! }
//!
//! fn right() -> Output<i32> {
//!     Output::value(10)
//! }
//!
//! fn sum(left: Input<i32>, right: Input<i32>) -> Output<i32> {
//!     match (left.try_get(), right.try_get()) {
//!         (Ok(l), Ok(r)) => Output::value(l + r),
//!         (Err(cause), _) | (_, Err(cause)) => Output::error(Error::caused_by("no sum", cause)),
//!     }
//! }
//!
//! let mut graph = ProducerGraph::new();
//! let l = graph.add_named_producer("left", left, ()).unwrap();
//! let r = graph.add_named_producer("right", right, ()).unwrap();
//! let s = graph.add_named_producer("sum", sum, (l, r)).unwrap();
//!
//! let mut result = graph.execute(s).unwrap();
//! assert_eq!(result.wait(), Ok(&17));
//! ```
//!
//! # Logging
//!
//! Node transitions are reported through `tracing` events. The crate never
//! installs a subscriber.

pub mod graph;
pub mod result;

pub use graph::{
    Dependencies, ExecutionError, GraphError, GraphOptions, Handle, NodeId, NodeSnapshot,
    NodeState, ProducerGraph, ResultHandle, PRODUCER_PANIC_MESSAGE, SPAWN_FAILURE_MESSAGE,
};
pub use result::{Error, Input, Output, Value};
