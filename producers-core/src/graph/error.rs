//! Errors surfaced by the graph API.

use thiserror::Error;

use super::NodeId;
use crate::result;

/// Misuse of the graph builder or scheduler that the caller can recover
/// from.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum GraphError {
    /// The handle was created by a different graph.
    #[error("handle for node {node} belongs to another graph")]
    ForeignHandle {
        /// Node id carried by the handle.
        node: NodeId,
    },

    /// No node with this id is registered.
    #[error("no node {node} in this graph")]
    UnknownNode {
        /// Node id carried by the handle.
        node: NodeId,
    },

    /// The handle's output type does not match the node's.
    #[error("handle type does not match the output type of node {node}")]
    HandleType {
        /// Node id carried by the handle.
        node: NodeId,
    },

    /// The one-shot result of this node was already handed out.
    #[error("result of node `{name}` was already taken by an earlier execute")]
    ResultAlreadyTaken {
        /// Name of the node.
        name: String,
    },
}

/// What a waiter on a [`ResultHandle`](super::ResultHandle) observes when
/// the node did not produce a value.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ExecutionError {
    /// The node's output is an error. Explicit producer errors and panics
    /// converted at the node boundary both end up here.
    #[error("producer `{node}` failed")]
    Failed {
        /// Name of the node.
        node: String,
        /// The error stored as the node's output.
        #[source]
        error: result::Error,
    },

    /// The node's result channel was dropped without being resolved.
    #[error("producer `{node}` was abandoned before resolving its result")]
    Abandoned {
        /// Name of the node.
        node: String,
    },
}

impl ExecutionError {
    /// The producer error behind a [`Failed`](Self::Failed) outcome.
    pub fn producer_error(&self) -> Option<&result::Error> {
        match self {
            Self::Failed { error, .. } => Some(error),
            Self::Abandoned { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn failed_exposes_producer_error_as_source() {
        let err = ExecutionError::Failed {
            node: "sum".into(),
            error: result::Error::new("overflow"),
        };
        assert_eq!(err.to_string(), "producer `sum` failed");
        assert!(err
            .source()
            .expect("source is the producer error")
            .to_string()
            .contains("overflow"));
        assert_eq!(err.producer_error().map(result::Error::message), Some("overflow"));
    }
}
