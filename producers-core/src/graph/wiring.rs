//! Dependency Wiring
//!
//! Binds a producer function taking one [`Input`] per dependency into a
//! zero-argument closure the node can run once its dependencies finished.
//!
//! # How Binding Works
//!
//! The dependency list is a tuple of typed [`Handle`]s. For each position,
//! the handle is resolved to its node when the producer is registered, and
//! the bound closure reads that node's recorded output as an `Input` when
//! it is finally invoked, in declared order. Every step is statically typed
//! to the dependency's output type, so a producer expecting `Input<i32>`
//! can only be wired to a `Handle<i32>`.
//!
//! Supported shapes:
//!
//! - `()` for a root producer, `FnOnce() -> Output<T>`
//! - a single `Handle<A>`, `FnOnce(Input<A>) -> Output<T>`
//! - tuples of up to eight handles, `FnOnce(Input<A>, Input<B>, ...) -> Output<T>`
//!
//! More inputs can be grouped into a struct produced by an intermediate
//! producer.

use std::sync::Arc;

use indexmap::IndexMap;

use super::node::{BoundProducer, Schedule};
use super::{GraphError, Handle, NodeId, ProducerGraph};
use crate::result::{Input, Output};

/// The dependency set of a producer, plus the producer with its inputs
/// bound.
pub struct Binding<T> {
    pub(crate) deps: IndexMap<NodeId, Arc<dyn Schedule>>,
    pub(crate) producer: BoundProducer<T>,
}

/// A list of dependency handles that can feed a producer `F` yielding `T`.
///
/// Implemented for `()`, for a single [`Handle`] and for tuples of up to
/// eight handles. A handle listed twice is a single dependency feeding two
/// inputs.
pub trait Dependencies<F, T>: Sized {
    /// Resolve every handle in `graph` and bind `producer` to the
    /// dependency outputs.
    ///
    /// # Errors
    ///
    /// If a handle does not belong to `graph`.
    fn bind(self, graph: &ProducerGraph, producer: F) -> Result<Binding<T>, GraphError>;
}

impl<F, T> Dependencies<F, T> for ()
where
    F: FnOnce() -> Output<T> + Send + 'static,
    T: Send + Sync + 'static,
{
    fn bind(self, _graph: &ProducerGraph, producer: F) -> Result<Binding<T>, GraphError> {
        Ok(Binding {
            deps: IndexMap::new(),
            producer: Box::new(producer),
        })
    }
}

impl<F, T, A> Dependencies<F, T> for Handle<A>
where
    F: FnOnce(Input<A>) -> Output<T> + Send + 'static,
    T: Send + Sync + 'static,
    A: Send + Sync + 'static,
{
    fn bind(self, graph: &ProducerGraph, producer: F) -> Result<Binding<T>, GraphError> {
        (self,).bind(graph, producer)
    }
}

macro_rules! impl_dependencies {
    ($(($handle:ident, $node:ident, $input:ident)),+) => {
        impl<F, T, $($input),+> Dependencies<F, T> for ($(Handle<$input>,)+)
        where
            F: FnOnce($(Input<$input>),+) -> Output<T> + Send + 'static,
            T: Send + Sync + 'static,
            $($input: Send + Sync + 'static,)+
        {
            fn bind(self, graph: &ProducerGraph, producer: F) -> Result<Binding<T>, GraphError> {
                let ($($handle,)+) = self;
                $(let $node = graph.resolve($handle)?;)+

                let mut deps: IndexMap<NodeId, Arc<dyn Schedule>> = IndexMap::new();
                $(deps.insert($handle.node_id(), Arc::clone(&$node) as Arc<dyn Schedule>);)+

                Ok(Binding {
                    deps,
                    producer: Box::new(move || producer($($node.input()),+)),
                })
            }
        }
    };
}

impl_dependencies!((a, node_a, A));
impl_dependencies!((a, node_a, A), (b, node_b, B));
impl_dependencies!((a, node_a, A), (b, node_b, B), (c, node_c, C));
impl_dependencies!((a, node_a, A), (b, node_b, B), (c, node_c, C), (d, node_d, D));
impl_dependencies!(
    (a, node_a, A),
    (b, node_b, B),
    (c, node_c, C),
    (d, node_d, D),
    (e, node_e, E)
);
impl_dependencies!(
    (a, node_a, A),
    (b, node_b, B),
    (c, node_c, C),
    (d, node_d, D),
    (e, node_e, E),
    (f, node_f, G)
);
impl_dependencies!(
    (a, node_a, A),
    (b, node_b, B),
    (c, node_c, C),
    (d, node_d, D),
    (e, node_e, E),
    (f, node_f, G),
    (g, node_g, H)
);
impl_dependencies!(
    (a, node_a, A),
    (b, node_b, B),
    (c, node_c, C),
    (d, node_d, D),
    (e, node_e, E),
    (f, node_f, G),
    (g, node_g, H),
    (h, node_h, I)
);

#[cfg(test)]
mod tests {
    use super::*;

    fn one() -> Output<i32> {
        Output::value(1)
    }

    fn add(left: Input<i32>, right: Input<i32>) -> Output<i32> {
        Output::value(left.get() + right.get())
    }

    #[test]
    fn root_binding_has_no_dependencies() {
        let graph = ProducerGraph::new();
        let binding = ().bind(&graph, one).expect("roots always bind");
        assert!(binding.deps.is_empty());
        assert_eq!(*(binding.producer)().get(), 1);
    }

    #[test]
    fn tuple_binding_records_each_dependency() {
        let mut graph = ProducerGraph::new();
        let left = graph.add_producer(one, ()).expect("root");
        let right = graph.add_producer(one, ()).expect("root");

        let binding = (left, right).bind(&graph, add).expect("same graph");
        let ids: Vec<_> = binding.deps.keys().copied().collect();
        assert_eq!(ids, vec![left.node_id(), right.node_id()]);
    }

    #[test]
    fn repeated_handle_is_one_dependency() {
        let mut graph = ProducerGraph::new();
        let number = graph.add_producer(one, ()).expect("root");

        let binding = (number, number).bind(&graph, add).expect("same graph");
        assert_eq!(binding.deps.len(), 1);
    }

    #[test]
    fn foreign_handle_is_rejected() {
        let mut other = ProducerGraph::new();
        let foreign = other.add_producer(one, ()).expect("root");
        let graph = ProducerGraph::new();

        let result = foreign.bind(&graph, |input: Input<i32>| -> Output<i32> {
            Output::value(*input.get())
        });
        assert!(matches!(result, Err(GraphError::ForeignHandle { .. })));
    }
}
