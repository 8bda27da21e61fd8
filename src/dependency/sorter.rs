//! Topological ordering of graph nodes into build batches
//!
//! The sorter copies the prerequisite edges of every node at [`TopologicalSorter::add`]
//! time, so it works on a snapshot and never observes later graph mutation.
//! Take the snapshot only after the graph is complete.
//!
//! Two modes share the same precedence relation (a dependency must be built
//! before its dependents):
//! - static: [`TopologicalSorter::static_batches`] yields maximal batches lazily
//! - online: [`TopologicalSorter::get_available`] / [`TopologicalSorter::done`]
//!   recompute readiness incrementally as builds finish

use std::collections::{BTreeSet, HashMap};

use petgraph::algo::tarjan_scc;
use petgraph::graph::DiGraph;
use tracing::{debug, trace};

use crate::dependency::graph::{DependencyGraph, Node, NodeKey};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Waiting,
    Released,
    Done,
}

#[derive(Debug, Clone)]
struct SortNode {
    key: NodeKey,
    prerequisites: BTreeSet<usize>,
    dependents: BTreeSet<usize>,
    pending: usize,
    state: State,
}

/// Build-order sorter over a snapshot of dependency edges
#[derive(Debug, Clone, Default)]
pub struct TopologicalSorter {
    nodes: Vec<SortNode>,
    index: HashMap<NodeKey, usize>,
    prepared: bool,
    done_count: usize,
}

impl TopologicalSorter {
    /// Create an empty sorter
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot every package node of `graph`
    pub fn from_graph(graph: &DependencyGraph) -> Result<Self> {
        let mut sorter = Self::new();
        for node in graph.get_all_nodes() {
            sorter.add(&node)?;
        }
        Ok(sorter)
    }

    fn intern(&mut self, key: &NodeKey) -> usize {
        if let Some(&idx) = self.index.get(key) {
            return idx;
        }
        let idx = self.nodes.len();
        self.nodes.push(SortNode {
            key: key.clone(),
            prerequisites: BTreeSet::new(),
            dependents: BTreeSet::new(),
            pending: 0,
            state: State::Waiting,
        });
        self.index.insert(key.clone(), idx);
        idx
    }

    /// Register a node and its direct dependencies as prerequisites
    ///
    /// Dependencies are registered as nodes too. The root is not buildable and
    /// is ignored.
    pub fn add(&mut self, node: &Node) -> Result<()> {
        if self.prepared {
            return Err(Error::scheduling(
                "cannot add nodes after sorting has started",
            ));
        }
        let Some(key) = node.key.as_ref() else {
            return Ok(());
        };

        let idx = self.intern(key);
        for dep in node.dependency_keys() {
            let dep_idx = self.intern(&dep);
            if self.nodes[idx].prerequisites.insert(dep_idx) {
                self.nodes[dep_idx].dependents.insert(idx);
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Fail with the members of every cycle, if any
    fn check_acyclic(&self) -> Result<()> {
        let mut pending: Vec<usize> = self.nodes.iter().map(|n| n.prerequisites.len()).collect();
        let mut stack: Vec<usize> = (0..self.nodes.len()).filter(|&i| pending[i] == 0).collect();
        let mut visited = 0;

        while let Some(idx) = stack.pop() {
            visited += 1;
            for &dep in &self.nodes[idx].dependents {
                pending[dep] -= 1;
                if pending[dep] == 0 {
                    stack.push(dep);
                }
            }
        }

        if visited == self.nodes.len() {
            return Ok(());
        }

        Err(Error::cycle(self.cycle_members()))
    }

    /// Keys of nodes that sit on a cycle (non-trivial SCCs and self loops)
    fn cycle_members(&self) -> Vec<String> {
        let mut graph = DiGraph::<usize, ()>::with_capacity(self.nodes.len(), 0);
        let indices: Vec<_> = (0..self.nodes.len()).map(|i| graph.add_node(i)).collect();
        for (i, node) in self.nodes.iter().enumerate() {
            for &dep in &node.prerequisites {
                graph.add_edge(indices[dep], indices[i], ());
            }
        }

        tarjan_scc(&graph)
            .into_iter()
            .filter(|scc| {
                scc.len() > 1 || {
                    let i = graph[scc[0]];
                    self.nodes[i].prerequisites.contains(&i)
                }
            })
            .flatten()
            .map(|n| self.nodes[graph[n]].key.to_string())
            .collect()
    }

    /// Consume the sorter and produce batches lazily
    ///
    /// Every node appears in exactly one batch; a dependency's batch always
    /// precedes its dependents' batches; each batch holds every node whose
    /// prerequisites are covered by earlier batches. Keys inside a batch are
    /// sorted only for reproducible output.
    pub fn static_batches(self) -> Result<StaticBatches> {
        self.check_acyclic()?;
        let pending: Vec<usize> = self.nodes.iter().map(|n| n.prerequisites.len()).collect();
        let current: Vec<usize> = (0..self.nodes.len()).filter(|&i| pending[i] == 0).collect();
        debug!(nodes = self.nodes.len(), "computing static batches");
        Ok(StaticBatches {
            nodes: self.nodes,
            pending,
            current,
        })
    }

    /// Validate the snapshot and enter online mode; safe to call repeatedly
    pub fn prepare(&mut self) -> Result<()> {
        if self.prepared {
            return Ok(());
        }
        self.check_acyclic()?;
        for node in &mut self.nodes {
            node.pending = node.prerequisites.len();
        }
        self.prepared = true;
        Ok(())
    }

    /// Nodes whose prerequisites are all done and that have not been released
    pub fn ready(&self) -> Vec<NodeKey> {
        let mut keys: Vec<NodeKey> = self
            .nodes
            .iter()
            .filter(|n| n.state == State::Waiting && self.unfinished_prerequisites(n) == 0)
            .map(|n| n.key.clone())
            .collect();
        keys.sort();
        keys
    }

    fn unfinished_prerequisites(&self, node: &SortNode) -> usize {
        if self.prepared {
            node.pending
        } else {
            node.prerequisites
                .iter()
                .filter(|&&p| self.nodes[p].state != State::Done)
                .count()
        }
    }

    /// Release every ready node to the caller; each node is released once
    pub fn get_available(&mut self) -> Result<Vec<NodeKey>> {
        self.prepare()?;
        let mut released = Vec::new();
        for node in &mut self.nodes {
            if node.state == State::Waiting && node.pending == 0 {
                node.state = State::Released;
                released.push(node.key.clone());
            }
        }
        released.sort();
        trace!(count = released.len(), "released ready nodes");
        Ok(released)
    }

    /// Mark a released node as built, unblocking its dependents
    ///
    /// Returns `Ok(false)` if the node was already marked done.
    pub fn mark_done(&mut self, key: &NodeKey) -> Result<bool> {
        let idx = *self
            .index
            .get(key)
            .ok_or_else(|| Error::not_found(key.to_string()))?;

        match self.nodes[idx].state {
            State::Done => return Ok(false),
            State::Waiting => {
                return Err(Error::scheduling(format!(
                    "'{}' was marked done before it was released",
                    key
                )))
            }
            State::Released => {}
        }

        self.nodes[idx].state = State::Done;
        self.done_count += 1;
        let dependents: Vec<usize> = self.nodes[idx].dependents.iter().copied().collect();
        for dep in dependents {
            self.nodes[dep].pending -= 1;
        }
        Ok(true)
    }

    /// True while some node is ready or released but not yet done
    pub fn is_active(&self) -> bool {
        self.nodes.iter().any(|n| match n.state {
            State::Released => true,
            State::Waiting => self.prepared && n.pending == 0,
            State::Done => false,
        })
    }

    /// True once every node has been marked done
    pub fn is_finished(&self) -> bool {
        self.done_count == self.nodes.len()
    }

    /// Nodes not yet marked done, sorted
    pub fn unfinished(&self) -> Vec<NodeKey> {
        let mut keys: Vec<NodeKey> = self
            .nodes
            .iter()
            .filter(|n| n.state != State::Done)
            .map(|n| n.key.clone())
            .collect();
        keys.sort();
        keys
    }
}

/// Finite, non-restartable iterator of build batches
///
/// Built from the sorter's own snapshot; it holds no reference to the graph.
#[derive(Debug)]
pub struct StaticBatches {
    nodes: Vec<SortNode>,
    pending: Vec<usize>,
    current: Vec<usize>,
}

impl Iterator for StaticBatches {
    type Item = Vec<NodeKey>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current.is_empty() {
            return None;
        }

        let batch = std::mem::take(&mut self.current);
        let mut next = Vec::new();
        for &idx in &batch {
            for &dep in &self.nodes[idx].dependents {
                self.pending[dep] -= 1;
                if self.pending[dep] == 0 {
                    next.push(dep);
                }
            }
        }
        self.current = next;

        let mut keys: Vec<NodeKey> = batch.into_iter().map(|i| self.nodes[i].key.clone()).collect();
        keys.sort();
        Some(keys)
    }
}
