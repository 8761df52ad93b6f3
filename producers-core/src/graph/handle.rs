//! Handles
//!
//! [`Handle`] is the caller's opaque, typed reference to a node: a graph id,
//! a node id and a marker for the output type. It owns nothing; the graph
//! owns the node.
//!
//! [`ResultHandle`] is the read end of a node's one-shot result channel,
//! returned by [`ProducerGraph::execute`](super::ProducerGraph::execute).

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::Arc;

use tokio::sync::oneshot::{self, error::TryRecvError};

use super::node::Schedule;
use super::{ExecutionError, NodeId};
use crate::result::Output;

/// Identifier of a graph, used to reject handles from other graphs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct GraphId(u64);

impl GraphId {
    /// Generate a new unique graph ID.
    pub(crate) fn new() -> Self {
        use std::sync::atomic::{AtomicU64, Ordering};

        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Typed reference to a node whose producer yields `T`.
pub struct Handle<T> {
    graph: GraphId,
    node: NodeId,
    _output: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    pub(crate) fn new(graph: GraphId, node: NodeId) -> Self {
        Self {
            graph,
            node,
            _output: PhantomData,
        }
    }

    /// The id of the node this handle points to.
    pub fn node_id(&self) -> NodeId {
        self.node
    }

    pub(crate) fn graph_id(&self) -> GraphId {
        self.graph
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.graph == other.graph && self.node == other.node
    }
}

impl<T> Eq for Handle<T> {}

impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.graph.hash(state);
        self.node.hash(state);
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("node", &self.node)
            .field("output", &std::any::type_name::<T>())
            .finish()
    }
}

/// The one-shot result of a node.
///
/// Resolves exactly once, with the node's output. A value is returned as
/// `Ok`; an error output (returned by the producer or converted from a
/// panic) is returned as [`ExecutionError::Failed`].
pub struct ResultHandle<T> {
    name: String,

    /// Dropped once the channel resolved or was found closed; it must not
    /// be polled again after that.
    receiver: Option<oneshot::Receiver<Arc<Output<T>>>>,
    resolved: Option<Arc<Output<T>>>,

    /// The executed node. Its dependencies are held strongly, so the whole
    /// required subgraph outlives the graph that built it until this
    /// handle is dropped.
    node: Arc<dyn Schedule>,
}

impl<T> ResultHandle<T> {
    pub(crate) fn new(
        name: String,
        receiver: oneshot::Receiver<Arc<Output<T>>>,
        node: Arc<dyn Schedule>,
    ) -> Self {
        Self {
            name,
            receiver: Some(receiver),
            resolved: None,
            node,
        }
    }

    /// Name of the node this result belongs to.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Block until the node has finished and return its outcome.
    ///
    /// Must not be called from within an asynchronous runtime.
    pub fn wait(&mut self) -> Result<&T, ExecutionError> {
        if let Some(receiver) = self.receiver.take() {
            self.resolved = receiver.blocking_recv().ok();
        }
        self.outcome()
    }

    /// Return the outcome if the node has already finished, without
    /// blocking.
    pub fn try_wait(&mut self) -> Option<Result<&T, ExecutionError>> {
        if let Some(receiver) = self.receiver.as_mut() {
            match receiver.try_recv() {
                Ok(output) => self.resolved = Some(output),
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Closed) => {}
            }
            self.receiver = None;
        }
        Some(self.outcome())
    }

    /// Block until the node has finished and return its full output.
    pub fn into_output(mut self) -> Result<Arc<Output<T>>, ExecutionError> {
        if let Some(receiver) = self.receiver.take() {
            self.resolved = receiver.blocking_recv().ok();
        }
        self.resolved.take().ok_or_else(|| self.abandoned())
    }

    fn outcome(&self) -> Result<&T, ExecutionError> {
        match self.resolved.as_deref() {
            Some(Output::Value(value)) => Ok(value.get()),
            Some(Output::Error(error)) => Err(ExecutionError::Failed {
                node: self.name.clone(),
                error: error.clone(),
            }),
            None => Err(self.abandoned()),
        }
    }

    fn abandoned(&self) -> ExecutionError {
        ExecutionError::Abandoned {
            node: self.name.clone(),
        }
    }
}

impl<T> fmt::Debug for ResultHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultHandle")
            .field("name", &self.name)
            .field("node", &self.node.core().id())
            .field("resolved", &self.resolved.is_some())
            .finish()
    }
}
