//! Dependency graph management and build ordering
//!
//! This module provides the resolved dependency graph, the topological sorter
//! that turns it into build batches, and a scheduler that drives builds
//! through the sorter's online mode.

pub mod graph;
pub mod scheduler;
pub mod sorter;

pub use graph::{
    DependencyGraph, DependencyStats, Edge, Node, NodeKey, SerializedEdge, SerializedGraph,
    SerializedNode, ROOT,
};
pub use scheduler::{BuildReport, BuildScheduler};
pub use sorter::{StaticBatches, TopologicalSorter};
