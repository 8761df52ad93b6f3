//! Graph configuration.

use std::io;
use std::thread;

use serde::Deserialize;

/// Configuration for a [`ProducerGraph`](super::ProducerGraph).
///
/// Every launched producer runs on its own OS thread; these options shape
/// those threads. The defaults are what [`ProducerGraph::new`] uses.
///
/// [`ProducerGraph::new`]: super::ProducerGraph::new
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GraphOptions {
    /// Producer threads are named `"<prefix>-<node name>"`.
    pub thread_name_prefix: String,

    /// Stack size of producer threads, in bytes. `None` keeps the platform
    /// default.
    ///
    /// The producer and the completion notification of its dependents both
    /// run on this stack.
    pub stack_size: Option<usize>,
}

impl GraphOptions {
    /// Set the thread name prefix.
    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// Set the producer thread stack size.
    pub fn with_stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = Some(bytes);
        self
    }

    pub(crate) fn spawn<F>(&self, node_name: &str, run: F) -> io::Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let mut builder =
            thread::Builder::new().name(format!("{}-{}", self.thread_name_prefix, node_name));
        if let Some(bytes) = self.stack_size {
            builder = builder.stack_size(bytes);
        }
        // Detached: completion is observed through the node's result channel.
        builder.spawn(run).map(drop)
    }
}

impl Default for GraphOptions {
    fn default() -> Self {
        Self {
            thread_name_prefix: String::from("producer"),
            stack_size: None,
        }
    }
}
