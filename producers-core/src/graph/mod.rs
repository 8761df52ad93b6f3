//! Producer Graph
//!
//! This module implements the DAG of producers and its execution.
//!
//! # Overview
//!
//! - Nodes wrap one producer each, with a fixed set of dependencies
//!   (nodes that must finish first) and reverse dependencies (nodes to
//!   notify on completion).
//! - Edges are declared through typed [`Handle`]s when a producer is
//!   registered; if B is registered with A's handle, B depends on A and A
//!   notifies B.
//! - Executing a handle starts the minimal set of nodes needed for its
//!   result. Independent branches run concurrently, one thread per
//!   launched producer.
//!
//! # Design Decisions
//!
//! 1. The graph exclusively owns the nodes. Handles are plain ids with a
//!    type marker and carry no ownership.
//!
//! 2. Nodes of different output types share one untyped core (identity,
//!    topology and state) and are stored behind a small scheduling
//!    interface, so the graph can hold them in one collection.
//!
//! 3. Completion propagates node to node without a central scheduler
//!    thread. The finishing node's thread notifies each dependent itself
//!    and launches the ones that became ready before it exits.

mod error;
mod handle;
mod node;
mod options;
mod scheduler;
mod wiring;

pub use error::{ExecutionError, GraphError};
pub use handle::{Handle, ResultHandle};
pub use node::{NodeId, NodeSnapshot, NodeState, PRODUCER_PANIC_MESSAGE, SPAWN_FAILURE_MESSAGE};
pub use options::GraphOptions;
pub use scheduler::ProducerGraph;
pub use wiring::{Binding, Dependencies};
