//! Graph Nodes
//!
//! A node wraps one producer together with its place in the DAG and its
//! execution state.
//!
//! # State Machine
//!
//! ```text
//!   Blocked --(all dependencies finished)--> Running --(producer done)--> Finished
//! ```
//!
//! A node only ever advances. The Blocked -> Running transition is guarded
//! by the state lock so that, however many callers race to start a node,
//! its producer runs at most once.
//!
//! # Completion Cascade
//!
//! There is no central scheduler loop. When a producer finishes, the thread
//! it ran on records the output, resolves the node's result channel, marks
//! the node finished and then reports to every dependent. The dependent
//! that receives its last missing report starts itself, which launches its
//! producer on a fresh thread.
//!
//! # Locks
//!
//! Each node guards its state and its finished-dependency set behind two
//! separate locks, held only for the check-and-mutate itself and never
//! across a producer call. A third lock on the dependent list is only
//! taken when the node finishes or when a new dependent is registered.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, OnceLock, Weak};

use indexmap::{IndexMap, IndexSet};
use parking_lot::Mutex;
use serde::Serialize;
use smallvec::SmallVec;
use tokio::sync::oneshot;
use tracing::{debug, error, trace, warn};

use super::GraphOptions;
use crate::result::{Error, Input, Output};

/// Message of the error recorded when a producer panics.
pub const PRODUCER_PANIC_MESSAGE: &str = "Exception while running producer";

/// Message of the error recorded when a producer thread cannot be spawned.
pub const SPAWN_FAILURE_MESSAGE: &str = "failed to spawn producer thread";

/// Identifier of a node, unique within its graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct NodeId(u64);

impl NodeId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Execution state of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeState {
    /// Waiting for dependencies, or never asked to run.
    Blocked,

    /// The producer has been launched and has not returned yet.
    Running,

    /// The output is recorded. Terminal.
    Finished,
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Blocked => "blocked",
            Self::Running => "running",
            Self::Finished => "finished",
        })
    }
}

/// Point-in-time view of a node, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeSnapshot {
    pub id: NodeId,
    pub name: String,
    pub state: NodeState,
    pub dependencies: Vec<NodeId>,
    pub finished_dependencies: Vec<NodeId>,
}

/// Capability interface over nodes of any output type.
///
/// The graph stores heterogeneous nodes behind this trait; everything that
/// does not need the output type lives on [`NodeCore`].
pub(crate) trait Schedule: Send + Sync {
    /// The untyped identity and state of this node.
    fn core(&self) -> &NodeCore;

    /// Launch the producer if every dependency has finished and nobody
    /// launched it before. Never blocks on the producer.
    fn start(self: Arc<Self>);

    /// Inform this node that one of its dependencies finished, starting it
    /// if that was the last one.
    fn report_finished(self: Arc<Self>, dependency: NodeId) {
        if self.core().record_finished(dependency) {
            self.start();
        }
    }
}

impl dyn Schedule {
    /// This node and every node reachable through dependency edges, each
    /// exactly once, in depth-first order.
    pub(crate) fn transitive_deps(self: &Arc<Self>) -> IndexMap<NodeId, Arc<dyn Schedule>> {
        let mut visited: IndexMap<NodeId, Arc<dyn Schedule>> = IndexMap::new();
        let mut stack = vec![Arc::clone(self)];

        while let Some(node) = stack.pop() {
            let id = node.core().id();
            if visited.contains_key(&id) {
                continue;
            }
            stack.extend(node.core().deps.values().rev().cloned());
            visited.insert(id, node);
        }

        visited
    }
}

/// Identity, topology and execution state shared by every node.
pub(crate) struct NodeCore {
    id: NodeId,
    name: String,

    /// Nodes that must finish before this one runs. Fixed at construction.
    deps: IndexMap<NodeId, Arc<dyn Schedule>>,

    /// Nodes to notify when this one finishes.
    rdeps: Mutex<SmallVec<[Weak<dyn Schedule>; 4]>>,

    state: Mutex<NodeState>,

    /// Dependencies that reported completion. Only grows.
    finished_deps: Mutex<IndexSet<NodeId>>,
}

impl NodeCore {
    pub(crate) fn new(id: NodeId, name: String, deps: IndexMap<NodeId, Arc<dyn Schedule>>) -> Self {
        Self {
            id,
            name,
            deps,
            rdeps: Mutex::new(SmallVec::new()),
            state: Mutex::new(NodeState::Blocked),
            finished_deps: Mutex::new(IndexSet::new()),
        }
    }

    pub(crate) fn id(&self) -> NodeId {
        self.id
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn state(&self) -> NodeState {
        *self.state.lock()
    }

    pub(crate) fn dependency_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.deps.keys().copied()
    }

    /// True iff every declared dependency has reported completion.
    pub(crate) fn can_run(&self) -> bool {
        self.finished_deps.lock().len() == self.deps.len()
    }

    /// Blocked -> Running. Returns whether this call made the transition.
    pub(crate) fn try_start(&self) -> bool {
        let mut state = self.state.lock();
        if *state == NodeState::Blocked {
            *state = NodeState::Running;
            true
        } else {
            false
        }
    }

    /// Record a finished dependency and return whether the node can now run.
    ///
    /// # Panics
    ///
    /// If `dependency` is not a dependency of this node or was already
    /// recorded.
    pub(crate) fn record_finished(&self, dependency: NodeId) -> bool {
        assert!(
            self.deps.contains_key(&dependency),
            "node `{}` got a finish report from {dependency}, which is not one of its dependencies",
            self.name
        );

        let mut finished = self.finished_deps.lock();
        let inserted = finished.insert(dependency);
        assert!(
            inserted,
            "node `{}` got a second finish report from {dependency}",
            self.name
        );
        trace!(
            node = %self.name,
            dependency = %dependency,
            deps = self.deps.len(),
            finished_deps = finished.len(),
            "dependency finished"
        );
        finished.len() == self.deps.len()
    }

    /// Register a dependent to notify on completion.
    ///
    /// Returns true instead of registering when this node has already
    /// finished; the caller must then treat the dependency as reported.
    pub(crate) fn add_dependent(&self, dependent: Weak<dyn Schedule>) -> bool {
        let mut rdeps = self.rdeps.lock();
        if self.state() == NodeState::Finished {
            return true;
        }
        rdeps.push(dependent);
        false
    }

    /// Running -> Finished. Returns the live dependents to notify.
    ///
    /// The dependent list stays locked across the transition so a dependent
    /// registered concurrently is either in the returned list or sees this
    /// node as finished, never both.
    ///
    /// # Panics
    ///
    /// If the node is not running.
    fn finish(&self) -> SmallVec<[Arc<dyn Schedule>; 4]> {
        let rdeps = self.rdeps.lock();
        {
            let mut state = self.state.lock();
            assert_eq!(
                *state,
                NodeState::Running,
                "node `{}` finished while not running",
                self.name
            );
            *state = NodeState::Finished;
        }
        rdeps.iter().filter_map(Weak::upgrade).collect()
    }

    pub(crate) fn snapshot(&self) -> NodeSnapshot {
        NodeSnapshot {
            id: self.id,
            name: self.name.clone(),
            state: self.state(),
            dependencies: self.dependency_ids().collect(),
            finished_dependencies: self.finished_deps.lock().iter().copied().collect(),
        }
    }
}

impl fmt::Debug for NodeCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeCore")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("state", &self.state())
            .field("deps", &self.deps.len())
            .field("finished_deps", &self.finished_deps.lock().len())
            .finish()
    }
}

/// A producer with all of its inputs already bound.
pub(crate) type BoundProducer<T> = Box<dyn FnOnce() -> Output<T> + Send>;

/// A node whose producer yields `T`.
pub(crate) struct Node<T> {
    core: NodeCore,
    options: Arc<GraphOptions>,

    /// Taken exactly once, by the thread that runs it.
    producer: Mutex<Option<BoundProducer<T>>>,

    /// Empty until the producer has run.
    output: OnceLock<Arc<Output<T>>>,

    result_tx: Mutex<Option<oneshot::Sender<Arc<Output<T>>>>>,
    result_rx: Mutex<Option<oneshot::Receiver<Arc<Output<T>>>>>,
}

impl<T> Node<T>
where
    T: Send + Sync + 'static,
{
    pub(crate) fn new(core: NodeCore, options: Arc<GraphOptions>, producer: BoundProducer<T>) -> Self {
        let (tx, rx) = oneshot::channel();
        Self {
            core,
            options,
            producer: Mutex::new(Some(producer)),
            output: OnceLock::new(),
            result_tx: Mutex::new(Some(tx)),
            result_rx: Mutex::new(Some(rx)),
        }
    }

    /// Register this node as a dependent of each of its dependencies.
    ///
    /// Must be called once, right after the node is placed in its `Arc`.
    pub(crate) fn attach(self: &Arc<Self>) {
        let this: Arc<dyn Schedule> = Arc::clone(self) as Arc<dyn Schedule>;
        let weak = Arc::downgrade(&this);
        for (&id, dep) in &self.core.deps {
            if dep.core().add_dependent(Weak::clone(&weak)) {
                self.core.record_finished(id);
            }
        }
    }

    /// The recorded output, once the producer has run.
    pub(crate) fn output(&self) -> Option<&Arc<Output<T>>> {
        self.output.get()
    }

    /// A view of the output for a dependent's producer.
    ///
    /// # Panics
    ///
    /// If the node has not finished. Dependents only read inputs after all
    /// of their dependencies reported completion.
    pub(crate) fn input(&self) -> Input<T> {
        match self.output.get() {
            Some(output) => output.as_input(),
            None => panic!("input read from node `{}` before it finished", self.core.name),
        }
    }

    /// Hand out the read end of the result channel. Only the first call
    /// gets it.
    pub(crate) fn take_result(&self) -> Option<oneshot::Receiver<Arc<Output<T>>>> {
        self.result_rx.lock().take()
    }

    fn run_producer(&self) {
        debug!(
            node = %self.core.name,
            id = %self.core.id,
            state = %self.core.state(),
            "running producer"
        );

        let producer = self.producer.lock().take();
        let Some(producer) = producer else {
            panic!("producer of node `{}` ran twice", self.core.name);
        };

        let output = match panic::catch_unwind(AssertUnwindSafe(producer)) {
            Ok(output) => output,
            Err(payload) => {
                warn!(node = %self.core.name, "producer panicked, recording an error");
                Output::error(panic_error(payload.as_ref()))
            }
        };

        self.complete(output);
    }

    /// Record the output, resolve the result channel, finish and notify.
    fn complete(&self, output: Output<T>) {
        let output = Arc::new(output);
        let failed = output.is_error();
        if self.output.set(Arc::clone(&output)).is_err() {
            panic!("output of node `{}` recorded twice", self.core.name);
        }

        let Some(tx) = self.result_tx.lock().take() else {
            panic!("result of node `{}` resolved twice", self.core.name);
        };
        if tx.send(output).is_err() {
            trace!(node = %self.core.name, "result receiver dropped");
        }

        let dependents = self.core.finish();
        debug!(
            node = %self.core.name,
            id = %self.core.id,
            state = %self.core.state(),
            failed,
            dependents = dependents.len(),
            "producer finished"
        );

        for dependent in dependents {
            dependent.report_finished(self.core.id);
        }
    }
}

impl<T> Schedule for Node<T>
where
    T: Send + Sync + 'static,
{
    fn core(&self) -> &NodeCore {
        &self.core
    }

    fn start(self: Arc<Self>) {
        if !self.core.can_run() {
            trace!(node = %self.core.name, "can't run yet, ignoring start");
            return;
        }
        if !self.core.try_start() {
            trace!(node = %self.core.name, "already started, ignoring start");
            return;
        }

        debug!(
            node = %self.core.name,
            id = %self.core.id,
            state = %self.core.state(),
            deps = self.core.deps.len(),
            finished_deps = self.core.finished_deps.lock().len(),
            "launching producer"
        );
        let node = Arc::clone(&self);
        if let Err(err) = self.options.spawn(&self.core.name, move || node.run_producer()) {
            error!(node = %self.core.name, error = %err, "could not spawn producer thread");
            let cause = Error::new(err.to_string());
            self.complete(Output::error(Error::caused_by(SPAWN_FAILURE_MESSAGE, &cause)));
        }
    }
}

/// Convert a panic payload into the error recorded as the node's output.
fn panic_error(payload: &(dyn Any + Send)) -> Error {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|message| (*message).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned());

    match detail {
        Some(detail) => Error::caused_by(PRODUCER_PANIC_MESSAGE, &Error::new(detail)),
        None => Error::new(PRODUCER_PANIC_MESSAGE),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn node<T: Send + Sync + 'static>(
        id: u64,
        deps: &[&Arc<dyn Schedule>],
        producer: impl FnOnce() -> Output<T> + Send + 'static,
    ) -> Arc<Node<T>> {
        let deps = deps
            .iter()
            .map(|dep| (dep.core().id(), Arc::clone(*dep)))
            .collect();
        let core = NodeCore::new(NodeId::new(id), format!("n{id}"), deps);
        let node = Arc::new(Node::new(
            core,
            Arc::new(GraphOptions::default()),
            Box::new(producer),
        ));
        node.attach();
        node
    }

    fn erased<T: Send + Sync + 'static>(node: &Arc<Node<T>>) -> Arc<dyn Schedule> {
        Arc::clone(node) as Arc<dyn Schedule>
    }

    #[test]
    fn try_start_succeeds_once() {
        let root = node(0, &[], || Output::value(1));
        assert!(root.core().try_start());
        assert!(!root.core().try_start());
        assert_eq!(root.core().state(), NodeState::Running);
    }

    #[test]
    fn can_run_waits_for_every_dependency() {
        let a = erased(&node(0, &[], || Output::value(1)));
        let b = erased(&node(1, &[], || Output::value(2)));
        let c = node(2, &[&a, &b], || Output::value(3));

        assert!(!c.core().can_run());
        assert!(!c.core().record_finished(a.core().id()));
        assert!(!c.core().can_run());
        assert!(c.core().record_finished(b.core().id()));
        assert!(c.core().can_run());
    }

    #[test]
    fn start_without_finished_dependencies_is_a_no_op() {
        let a = erased(&node(0, &[], || Output::value(1)));
        let b = node(1, &[&a], || Output::value(2));

        Arc::clone(&b).start();
        assert_eq!(b.core().state(), NodeState::Blocked);
        assert!(b.output().is_none());
    }

    #[test]
    #[should_panic(expected = "not one of its dependencies")]
    fn report_from_non_dependency_panics() {
        let a = node(0, &[], || Output::value(1));
        let b = node(1, &[], || Output::value(2));
        b.core().record_finished(a.core().id());
    }

    #[test]
    #[should_panic(expected = "second finish report")]
    fn duplicate_report_panics() {
        let a = erased(&node(0, &[], || Output::value(1)));
        let b = node(1, &[&a], || Output::value(2));
        b.core().record_finished(a.core().id());
        b.core().record_finished(a.core().id());
    }

    #[test]
    fn transitive_deps_visits_diamond_once() {
        // a depends on b and c, which both depend on d.
        let d = erased(&node(0, &[], || Output::value(0)));
        let b = erased(&node(1, &[&d], || Output::value(1)));
        let c = erased(&node(2, &[&d], || Output::value(2)));
        let a = erased(&node(3, &[&b, &c], || Output::value(3)));

        let closure = a.transitive_deps();
        let ids: Vec<u64> = closure.keys().map(NodeId::raw).collect();

        assert_eq!(closure.len(), 4);
        assert_eq!(ids[0], 3);
        assert!(ids.contains(&0));
        assert!(ids.contains(&1));
        assert!(ids.contains(&2));

        // Leaves only see themselves.
        assert_eq!(d.transitive_deps().len(), 1);
    }

    #[test]
    fn finishing_root_cascades_to_dependent() {
        let runs = Arc::new(AtomicUsize::new(0));
        let a = node(0, &[], || Output::value(20));
        let a_dyn = erased(&a);
        let upstream = Arc::clone(&a);
        let counter = Arc::clone(&runs);
        let b = node(1, &[&a_dyn], move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Output::value(*upstream.input().get() + 1)
        });
        let rx = b.take_result().expect("first take");

        // Only the root is started; the dependent starts from the cascade.
        a_dyn.start();

        let output = rx.blocking_recv().expect("dependent resolves");
        assert_eq!(*output.get(), 21);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(b.core().state(), NodeState::Finished);
        assert!(b.take_result().is_none());
    }

    #[test]
    fn panicking_producer_records_error() {
        let a = node::<i32>(0, &[], || panic!("kaboom"));
        let rx = a.take_result().expect("first take");
        erased(&a).start();

        let output = rx.blocking_recv().expect("resolved");
        let error = output.error_ref().expect("panic is recorded as an error");
        assert_eq!(error.message(), PRODUCER_PANIC_MESSAGE);
        assert_eq!(error.cause().map(Error::message), Some("kaboom"));
    }

    #[test]
    fn dependent_registered_after_finish_sees_dependency_done() {
        let a = node(0, &[], || Output::value(1));
        let rx = a.take_result().expect("first take");
        erased(&a).start();
        rx.blocking_recv().expect("resolved");

        // Wait until the root also left the Running state.
        while a.core().state() != NodeState::Finished {
            std::thread::yield_now();
        }

        let b = node(1, &[&erased(&a)], || Output::value(2));
        assert!(b.core().can_run());
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn launch_event_carries_state_and_progress() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        let root = node(0, &[], || Output::value(1));
        let rx = root.take_result().expect("first take");
        // Roots launch on the calling thread, inside the scoped subscriber.
        tracing::subscriber::with_default(subscriber, || erased(&root).start());
        rx.blocking_recv().expect("resolved");

        let logs = String::from_utf8(captured.0.lock().clone()).expect("utf-8 logs");
        let launch = logs
            .lines()
            .find(|line| line.contains("launching producer"))
            .expect("launch event logged");
        for field in ["node=n0", "id=0", "state=running", "deps=0", "finished_deps=0"] {
            assert!(launch.contains(field), "missing {field} in {launch:?}");
        }
    }

    #[test]
    fn snapshot_reports_state_and_progress() {
        let a = erased(&node(0, &[], || Output::value(1)));
        let b = node(1, &[&a], || Output::value(2));
        b.core().record_finished(a.core().id());

        let snapshot = b.core().snapshot();
        assert_eq!(snapshot.name, "n1");
        assert_eq!(snapshot.state, NodeState::Blocked);
        assert_eq!(snapshot.dependencies, vec![NodeId::new(0)]);
        assert_eq!(snapshot.finished_dependencies, vec![NodeId::new(0)]);
        assert_eq!(NodeState::Running.to_string(), "running");
    }
}
