//! Shared access to the current dependency graph.
//!
//! One writer (the watch session) builds a complete new graph and swaps it
//! in; readers load a snapshot `Arc` that stays valid and unchanged for as
//! long as they hold it. No reader can observe a graph mid-rebuild.

use arc_swap::ArcSwap;
use std::sync::Arc;

use super::DependencyGraph;

#[derive(Clone)]
pub struct GraphHandle(Arc<ArcSwap<DependencyGraph>>);

impl GraphHandle {
    pub fn new(graph: DependencyGraph) -> Self {
        Self(Arc::new(ArcSwap::from_pointee(graph)))
    }

    /// Consistent snapshot of the current graph.
    #[inline]
    pub fn load(&self) -> Arc<DependencyGraph> {
        self.0.load_full()
    }

    /// Replace the graph wholesale, returning the previous one.
    pub fn swap(&self, graph: DependencyGraph) -> Arc<DependencyGraph> {
        self.0.swap(Arc::new(graph))
    }
}

impl Default for GraphHandle {
    fn default() -> Self {
        Self::new(DependencyGraph::default())
    }
}
