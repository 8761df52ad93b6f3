//! Producer Graph
//!
//! [`ProducerGraph`] owns every node, wires typed producers together and
//! launches the part of the graph needed for a requested result.
//!
//! # Algorithm
//!
//! Executing a node:
//!
//! 1. Collect the node's transitive dependency closure (the node itself and
//!    everything it depends on, directly or not, each once).
//! 2. Ask every node in the closure to start. Nodes whose dependencies have
//!    all finished launch their producer on a new thread; the rest ignore
//!    the request.
//! 3. Return the node's one-shot result handle. Nothing blocks.
//!
//! From there the graph drives itself: each finishing node reports to its
//! dependents, and the dependent receiving its last report starts.
//!
//! The builder trusts the caller to wire an acyclic graph. Since a handle
//! only exists once its node is registered, the API cannot express a cycle.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::debug;

use super::handle::GraphId;
use super::node::{Node, NodeCore, Schedule};
use super::wiring::{Binding, Dependencies};
use super::{GraphError, GraphOptions, Handle, NodeId, NodeSnapshot, NodeState, ResultHandle};
use crate::result::Output;

/// Prefix of the generated name of producers registered without one.
const DEFAULT_NODE_NAME_PREFIX: &str = "unnamed";

fn default_node_name(id: NodeId) -> String {
    format!("{DEFAULT_NODE_NAME_PREFIX}-{id}")
}

/// A node as stored by the graph: once behind the scheduling interface and
/// once as `Any`, for typed lookups through a [`Handle`].
struct Slot {
    node: Arc<dyn Schedule>,
    typed: Arc<dyn Any + Send + Sync>,
}

/// A set of registered producers with their inputs and outputs wired to
/// each other.
///
/// # Example
///
/// ```rust
/// use producers_core::{Input, Output, ProducerGraph};
///
/// fn two() -> Output<i32> {
///     Output::value(2)
/// }
///
/// fn square(n: Input<i32>) -> Output<i32> {
///     Output::value(n.get() * n.get())
/// }
///
/// let mut graph = ProducerGraph::new();
/// let n = graph.add_producer(two, ()).unwrap();
/// let squared = graph.add_named_producer("square", square, n).unwrap();
///
/// let mut result = graph.execute(squared).unwrap();
/// assert_eq!(result.wait(), Ok(&4));
/// ```
pub struct ProducerGraph {
    id: GraphId,
    options: Arc<GraphOptions>,
    next_id: u64,
    nodes: IndexMap<NodeId, Slot>,
}

impl ProducerGraph {
    /// Create an empty graph with default options.
    pub fn new() -> Self {
        Self::with_options(GraphOptions::default())
    }

    /// Create an empty graph with the given options.
    pub fn with_options(options: GraphOptions) -> Self {
        Self {
            id: GraphId::new(),
            options: Arc::new(options),
            next_id: 0,
            nodes: IndexMap::new(),
        }
    }

    /// The options producer threads are launched with.
    pub fn options(&self) -> &GraphOptions {
        &self.options
    }

    /// Register an unnamed producer. See
    /// [`add_named_producer`](Self::add_named_producer).
    pub fn add_producer<F, T, D>(&mut self, producer: F, deps: D) -> Result<Handle<T>, GraphError>
    where
        D: Dependencies<F, T>,
        T: Send + Sync + 'static,
    {
        self.add_named_producer(String::new(), producer, deps)
    }

    /// Register a producer fed by `deps`.
    ///
    /// `deps` is `()` for a root, a single handle, or a tuple of handles;
    /// `producer` takes one [`Input`](crate::Input) per handle, in the same
    /// order. An empty name is replaced by `"unnamed-<id>"`.
    ///
    /// # Errors
    ///
    /// If one of the handles belongs to another graph.
    pub fn add_named_producer<F, T, D>(
        &mut self,
        name: impl Into<String>,
        producer: F,
        deps: D,
    ) -> Result<Handle<T>, GraphError>
    where
        D: Dependencies<F, T>,
        T: Send + Sync + 'static,
    {
        let Binding { deps, producer } = deps.bind(self, producer)?;

        let id = NodeId::new(self.next_id);
        self.next_id += 1;
        let mut name = name.into();
        if name.is_empty() {
            name = default_node_name(id);
        }

        debug!(node = %name, id = %id, deps = deps.len(), "registering producer");
        let node = Arc::new(Node::new(
            NodeCore::new(id, name, deps),
            Arc::clone(&self.options),
            producer,
        ));
        node.attach();

        self.nodes.insert(
            id,
            Slot {
                node: Arc::clone(&node) as Arc<dyn Schedule>,
                typed: node as Arc<dyn Any + Send + Sync>,
            },
        );
        Ok(Handle::new(self.id, id))
    }

    /// Start every node needed to produce `handle`'s result and return the
    /// read end of its result channel. Does not block.
    ///
    /// Each node runs at most once over the lifetime of the graph, so a
    /// node's result can only be requested once.
    ///
    /// # Errors
    ///
    /// If the handle belongs to another graph, or its result was already
    /// taken by an earlier call.
    pub fn execute<T>(&self, handle: Handle<T>) -> Result<ResultHandle<T>, GraphError>
    where
        T: Send + Sync + 'static,
    {
        let node = self.resolve(handle)?;
        let name = node.core().name().to_owned();
        let receiver = node
            .take_result()
            .ok_or_else(|| GraphError::ResultAlreadyTaken { name: name.clone() })?;

        let root: Arc<dyn Schedule> = node;
        let required = root.transitive_deps();
        debug!(node = %name, required = required.len(), "executing");
        for (_, node) in required {
            node.start();
        }

        Ok(ResultHandle::new(name, receiver, root))
    }

    /// The recorded output of a node, if it has already run.
    ///
    /// Unlike [`execute`](Self::execute) this neither starts anything nor
    /// consumes the node's result channel.
    ///
    /// # Errors
    ///
    /// If the handle belongs to another graph.
    pub fn peek<T>(&self, handle: Handle<T>) -> Result<Option<Arc<Output<T>>>, GraphError>
    where
        T: Send + Sync + 'static,
    {
        Ok(self.resolve(handle)?.output().cloned())
    }

    /// Name of the node behind `handle`.
    ///
    /// # Errors
    ///
    /// If the handle belongs to another graph.
    pub fn node_name<T>(&self, handle: Handle<T>) -> Result<&str, GraphError> {
        Ok(self.slot(handle)?.node.core().name())
    }

    /// Current state of the node behind `handle`.
    ///
    /// # Errors
    ///
    /// If the handle belongs to another graph.
    pub fn state<T>(&self, handle: Handle<T>) -> Result<NodeState, GraphError> {
        Ok(self.slot(handle)?.node.core().state())
    }

    /// Ids of the node behind `handle` and of everything it transitively
    /// depends on, in depth-first order starting with the node itself.
    ///
    /// # Errors
    ///
    /// If the handle belongs to another graph.
    pub fn transitive_dependencies<T>(&self, handle: Handle<T>) -> Result<Vec<NodeId>, GraphError> {
        let slot = self.slot(handle)?;
        Ok(slot.node.transitive_deps().into_keys().collect())
    }

    /// Point-in-time view of every node, in registration order.
    pub fn snapshot(&self) -> Vec<NodeSnapshot> {
        self.nodes
            .values()
            .map(|slot| slot.node.core().snapshot())
            .collect()
    }

    /// Number of registered producers.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether no producer is registered.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Look up the typed node behind a handle.
    pub(crate) fn resolve<T>(&self, handle: Handle<T>) -> Result<Arc<Node<T>>, GraphError>
    where
        T: Send + Sync + 'static,
    {
        let slot = self.slot(handle)?;
        Arc::clone(&slot.typed)
            .downcast::<Node<T>>()
            .map_err(|_| GraphError::HandleType {
                node: handle.node_id(),
            })
    }

    fn slot<T>(&self, handle: Handle<T>) -> Result<&Slot, GraphError> {
        let node = handle.node_id();
        if handle.graph_id() != self.id {
            return Err(GraphError::ForeignHandle { node });
        }
        self.nodes
            .get(&node)
            .ok_or(GraphError::UnknownNode { node })
    }
}

impl Default for ProducerGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ProducerGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProducerGraph")
            .field("nodes", &self.nodes.values().map(|slot| slot.node.core()).collect::<Vec<_>>())
            .field("options", &self.options)
            .finish()
    }
}
