//! Dependency graph data structures and persistence
//!
//! Nodes are identified by (canonical name, resolved version). A virtual root
//! node anchors every top-level requirement. Edges point from a parent (the
//! dependent) to a child (the dependency) and record the requirement that
//! selected the child plus why it was needed.
//!
//! The graph is safe to share between resolver threads: every mutation takes
//! the write lock, so creating a node and attaching its edge is atomic and two
//! workers resolving the same package version end up on the same node.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::requirements::{canonicalize_name, Requirement, RequirementType};
use crate::version::Version;

const ROOT_INDEX: usize = 0;

/// Serialized key of the root node
pub const ROOT: &str = "";

/// Identity of a resolved package: canonical name plus version
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKey {
    name: String,
    version: Version,
}

impl NodeKey {
    /// Create a key; the name is canonicalized
    pub fn new(name: &str, version: Version) -> Self {
        Self {
            name: canonicalize_name(name),
            version,
        }
    }

    /// Parse a serialized key of the form `name==version`
    pub fn parse(s: &str) -> Result<Self> {
        let (name, version) = s
            .split_once("==")
            .ok_or_else(|| Error::parse(s, "node key must look like 'name==version'"))?;
        if name.trim().is_empty() {
            return Err(Error::parse(s, "node key has an empty package name"));
        }
        Ok(Self::new(name, Version::parse(version)?))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &Version {
        &self.version
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}=={}", self.name, self.version)
    }
}

/// An edge snapshot: `parent` needs `child` because of `req`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    /// `None` for edges leaving the root
    pub parent: Option<NodeKey>,
    pub child: NodeKey,
    pub req_type: RequirementType,
    pub req: Requirement,
}

/// A node snapshot with its outgoing and incoming edges
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    /// `None` for the virtual root
    pub key: Option<NodeKey>,
    /// Where the chosen artifact can be fetched from
    pub download_url: String,
    /// Whether the chosen artifact is a prebuilt binary
    pub pre_built: bool,
    /// Edges to the packages this node depends on
    pub children: Vec<Edge>,
    /// Edges from the packages depending on this node
    pub parents: Vec<Edge>,
}

impl Node {
    pub fn is_root(&self) -> bool {
        self.key.is_none()
    }

    /// Keys of direct dependencies, first occurrence order, no duplicates
    pub fn dependency_keys(&self) -> Vec<NodeKey> {
        let mut seen = HashSet::new();
        self.children
            .iter()
            .filter(|edge| seen.insert(&edge.child))
            .map(|edge| edge.child.clone())
            .collect()
    }

    /// Serialized key (`""` for the root)
    pub fn key_string(&self) -> String {
        self.key.as_ref().map_or_else(String::new, NodeKey::to_string)
    }
}

#[derive(Debug, Clone)]
struct NodeEntry {
    key: Option<NodeKey>,
    download_url: String,
    pre_built: bool,
    children: Vec<usize>,
    parents: Vec<usize>,
}

impl NodeEntry {
    fn root() -> Self {
        Self {
            key: None,
            download_url: String::new(),
            pre_built: false,
            children: Vec::new(),
            parents: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
struct EdgeEntry {
    parent: usize,
    child: usize,
    req_type: RequirementType,
    req: Requirement,
}

#[derive(Debug, Clone)]
struct GraphInner {
    nodes: Vec<NodeEntry>,
    index: HashMap<NodeKey, usize>,
    edges: Vec<EdgeEntry>,
    edge_ids: HashSet<(usize, usize, RequirementType, String)>,
}

impl GraphInner {
    fn new() -> Self {
        Self {
            nodes: vec![NodeEntry::root()],
            index: HashMap::new(),
            edges: Vec::new(),
            edge_ids: HashSet::new(),
        }
    }

    fn parent_index(&self, parent: Option<&NodeKey>) -> Result<usize> {
        match parent {
            None => Ok(ROOT_INDEX),
            Some(key) => self
                .index
                .get(key)
                .copied()
                .ok_or_else(|| Error::not_found(key.to_string())),
        }
    }

    /// Compare-and-insert: returns the existing node for `key` or creates it
    fn get_or_insert_node(&mut self, key: NodeKey, download_url: &str, pre_built: bool) -> usize {
        if let Some(&idx) = self.index.get(&key) {
            return idx;
        }
        let idx = self.nodes.len();
        trace!(node = %key, "creating node");
        self.nodes.push(NodeEntry {
            key: Some(key.clone()),
            download_url: download_url.to_string(),
            pre_built,
            children: Vec::new(),
            parents: Vec::new(),
        });
        self.index.insert(key, idx);
        idx
    }

    /// Insert an edge unless an identical one exists; returns true if added
    fn insert_edge(
        &mut self,
        parent: usize,
        child: usize,
        req_type: RequirementType,
        req: &Requirement,
    ) -> bool {
        if !self
            .edge_ids
            .insert((parent, child, req_type, req.to_string()))
        {
            return false;
        }
        let edge_idx = self.edges.len();
        self.edges.push(EdgeEntry {
            parent,
            child,
            req_type,
            req: req.clone(),
        });
        self.nodes[parent].children.push(edge_idx);
        self.nodes[child].parents.push(edge_idx);
        true
    }

    fn edge_snapshot(&self, edge_idx: usize) -> Edge {
        let edge = &self.edges[edge_idx];
        Edge {
            parent: self.nodes[edge.parent].key.clone(),
            // Only the root has no key and the root is never a child.
            child: self.nodes[edge.child]
                .key
                .clone()
                .unwrap_or_else(|| unreachable!("root node used as edge child")),
            req_type: edge.req_type,
            req: edge.req.clone(),
        }
    }

    fn node_snapshot(&self, idx: usize) -> Node {
        let entry = &self.nodes[idx];
        Node {
            key: entry.key.clone(),
            download_url: entry.download_url.clone(),
            pre_built: entry.pre_built,
            children: entry.children.iter().map(|&e| self.edge_snapshot(e)).collect(),
            parents: entry.parents.iter().map(|&e| self.edge_snapshot(e)).collect(),
        }
    }
}

/// Persisted form of one edge, listed under its child node
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SerializedEdge {
    /// `null` for edges from the root
    pub parent_key: Option<String>,
    pub kind: RequirementType,
    pub requirement_text: String,
    pub resolved_version: String,
}

/// Persisted form of one node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializedNode {
    /// `null` for the root
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub download_url: String,
    #[serde(default)]
    pub pre_built: bool,
    #[serde(default)]
    pub edges: Vec<SerializedEdge>,
}

/// Persisted graph: canonical node key to node, sorted for stable diffs
pub type SerializedGraph = BTreeMap<String, SerializedNode>;

/// Statistics about a dependency graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyStats {
    /// Number of package nodes (root excluded)
    pub unique_count: usize,

    /// Number of edges
    pub edge_count: usize,

    /// Number of requirements supplied at top level
    pub top_level_count: usize,

    /// Number of nodes needed by more than one distinct parent
    pub shared_count: usize,
}

/// Dependency graph shared by resolver workers for one bootstrap session
#[derive(Debug)]
pub struct DependencyGraph {
    inner: RwLock<GraphInner>,
}

impl DependencyGraph {
    /// Create a new graph holding only the root node
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(GraphInner::new()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, GraphInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, GraphInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record that `parent` (or the root) needs `req`, resolved to `req_version`
    ///
    /// Creates the child node on first sight of (name, version) and reuses it
    /// afterwards. An edge identical in parent, kind and requirement text is
    /// stored once. Returns a snapshot of the child node.
    pub fn add_dependency(
        &self,
        parent: Option<&NodeKey>,
        req_type: RequirementType,
        req: &Requirement,
        req_version: &Version,
        download_url: &str,
        pre_built: bool,
    ) -> Result<Node> {
        let mut inner = self.write();
        let parent_idx = inner.parent_index(parent)?;
        let key = NodeKey::new(req.canonical_name(), req_version.clone());
        let child_idx = inner.get_or_insert_node(key, download_url, pre_built);
        let added = inner.insert_edge(parent_idx, child_idx, req_type, req);

        debug!(
            parent = %parent.map_or_else(|| ROOT.to_string(), NodeKey::to_string),
            req = %req,
            version = %req_version,
            kind = %req_type,
            added,
            "add dependency"
        );

        Ok(inner.node_snapshot(child_idx))
    }

    /// Number of package nodes, root excluded
    pub fn len(&self) -> usize {
        self.read().nodes.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn edge_count(&self) -> usize {
        self.read().edges.len()
    }

    /// All nodes including the root, in insertion order
    pub fn get_all_nodes(&self) -> Vec<Node> {
        let inner = self.read();
        (0..inner.nodes.len()).map(|i| inner.node_snapshot(i)).collect()
    }

    pub fn get_root_node(&self) -> Node {
        self.read().node_snapshot(ROOT_INDEX)
    }

    /// Get a node by key
    pub fn get_node(&self, key: &NodeKey) -> Option<Node> {
        let inner = self.read();
        inner.index.get(key).map(|&idx| inner.node_snapshot(idx))
    }

    /// All resolved versions of a package, lowest version first
    pub fn get_nodes_by_name(&self, name: &str) -> Vec<Node> {
        let canonical = canonicalize_name(name);
        let inner = self.read();
        let mut nodes: Vec<Node> = inner
            .index
            .iter()
            .filter(|(key, _)| key.name == canonical)
            .map(|(_, &idx)| inner.node_snapshot(idx))
            .collect();
        nodes.sort_by(|a, b| a.key.cmp(&b.key));
        nodes
    }

    /// Outgoing edges of `parent` restricted to `kinds` (all kinds when empty)
    pub fn get_dependency_edges(
        &self,
        parent: Option<&NodeKey>,
        kinds: &[RequirementType],
    ) -> Result<Vec<Edge>> {
        let inner = self.read();
        let idx = inner.parent_index(parent)?;
        Ok(inner.nodes[idx]
            .children
            .iter()
            .filter(|&&e| kinds.is_empty() || kinds.contains(&inner.edges[e].req_type))
            .map(|&e| inner.edge_snapshot(e))
            .collect())
    }

    /// Nodes reachable from the root through top-level and install edges only
    pub fn get_install_dependencies(&self) -> Vec<Node> {
        let inner = self.read();
        let mut visited = HashSet::from([ROOT_INDEX]);
        let mut queue = VecDeque::from([ROOT_INDEX]);
        let mut result = Vec::new();

        while let Some(idx) = queue.pop_front() {
            if idx != ROOT_INDEX {
                result.push(inner.node_snapshot(idx));
            }
            for &e in &inner.nodes[idx].children {
                let edge = &inner.edges[e];
                if edge.req_type.is_install() && visited.insert(edge.child) {
                    queue.push_back(edge.child);
                }
            }
        }

        result
    }

    /// Get statistics about the dependency graph
    pub fn stats(&self) -> DependencyStats {
        let inner = self.read();
        let shared_count = inner.nodes[1..]
            .iter()
            .filter(|node| {
                let parents: HashSet<usize> =
                    node.parents.iter().map(|&e| inner.edges[e].parent).collect();
                parents.len() > 1
            })
            .count();

        DependencyStats {
            unique_count: inner.nodes.len() - 1,
            edge_count: inner.edges.len(),
            top_level_count: inner.nodes[ROOT_INDEX].children.len(),
            shared_count,
        }
    }

    /// Serialize to the canonical persisted form
    pub fn to_dict(&self) -> SerializedGraph {
        let inner = self.read();
        let key_of = |idx: usize| inner.nodes[idx].key.as_ref().map(NodeKey::to_string);

        inner
            .nodes
            .iter()
            .map(|node| {
                let mut edges: Vec<SerializedEdge> = node
                    .parents
                    .iter()
                    .map(|&e| {
                        let edge = &inner.edges[e];
                        SerializedEdge {
                            parent_key: key_of(edge.parent),
                            kind: edge.req_type,
                            requirement_text: edge.req.to_string(),
                            resolved_version: node
                                .key
                                .as_ref()
                                .map(|k| k.version.to_string())
                                .unwrap_or_default(),
                        }
                    })
                    .collect();
                edges.sort();

                let serialized = SerializedNode {
                    version: node.key.as_ref().map(|k| k.version.to_string()),
                    download_url: node.download_url.clone(),
                    pre_built: node.pre_built,
                    edges,
                };
                (key_of_node(node), serialized)
            })
            .collect()
    }

    /// Rebuild a graph from its persisted form
    pub fn from_dict(data: &SerializedGraph) -> Result<Self> {
        let mut inner = GraphInner::new();

        // Create every node first so edges may reference parents in any order.
        let mut entries = Vec::with_capacity(data.len());
        for (key_text, node) in data {
            if key_text == ROOT {
                if node.version.is_some() {
                    return Err(Error::parse(key_text.as_str(), "root node cannot have a version"));
                }
                inner.nodes[ROOT_INDEX].download_url = node.download_url.clone();
                continue;
            }

            let key = NodeKey::parse(key_text)?;
            let version_text = node
                .version
                .as_deref()
                .ok_or_else(|| Error::parse(key_text.as_str(), "node is missing its version"))?;
            if Version::parse(version_text)? != key.version {
                return Err(Error::parse(
                    key_text.as_str(),
                    format!("node version '{}' disagrees with its key", version_text),
                ));
            }
            let idx = inner.get_or_insert_node(key.clone(), &node.download_url, node.pre_built);
            entries.push((idx, key, node));
        }

        for (child_idx, key, node) in entries {
            for edge in &node.edges {
                let parent = edge.parent_key.as_deref().map(NodeKey::parse).transpose()?;
                let parent_idx = inner.parent_index(parent.as_ref())?;
                if Version::parse(&edge.resolved_version)? != key.version {
                    return Err(Error::parse(
                        edge.requirement_text.as_str(),
                        format!(
                            "edge resolved_version '{}' disagrees with node '{}'",
                            edge.resolved_version, key
                        ),
                    ));
                }
                let req = Requirement::parse(&edge.requirement_text)?;
                if req.canonical_name() != key.name() {
                    return Err(Error::parse(
                        edge.requirement_text.as_str(),
                        format!("edge requirement does not name node '{}'", key),
                    ));
                }
                inner.insert_edge(parent_idx, child_idx, edge.kind, &req);
            }
        }

        Ok(Self {
            inner: RwLock::new(inner),
        })
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.to_dict())?)
    }

    /// Parse a graph from JSON text
    pub fn from_json(text: &str) -> Result<Self> {
        let data: SerializedGraph = serde_json::from_str(text)?;
        Self::from_dict(&data)
    }

    /// Write the graph as pretty JSON
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let mut json = self.to_json()?;
        json.push('\n');
        fs::write(path, json).map_err(|e| Error::io(path, e))
    }

    /// Load a graph written by [`DependencyGraph::write_to_file`]
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::from_json(&text)
    }
}

fn key_of_node(node: &NodeEntry) -> String {
    node.key.as_ref().map_or_else(String::new, NodeKey::to_string)
}

impl Default for DependencyGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for DependencyGraph {
    fn clone(&self) -> Self {
        Self {
            inner: RwLock::new(self.read().clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(s: &str) -> Requirement {
        Requirement::parse(s).unwrap()
    }

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    fn key(s: &str) -> NodeKey {
        NodeKey::parse(s).unwrap()
    }

    fn add_top(graph: &DependencyGraph, r: &str, version: &str) -> Node {
        graph
            .add_dependency(None, RequirementType::TopLevel, &req(r), &v(version), "", false)
            .unwrap()
    }

    #[test]
    fn test_graph_add_dependencies() {
        let graph = DependencyGraph::new();
        for i in 0..50 {
            add_top(&graph, &format!("pkg{i}>=1.0"), "1.0.0");
        }
        assert_eq!(graph.len(), 50);
        assert_eq!(graph.get_all_nodes().len(), 51);
        assert!(graph.get_all_nodes()[0].is_root());
        assert_eq!(graph.get_root_node().children.len(), 50);
    }

    #[test]
    fn test_identical_edge_is_deduplicated() {
        let graph = DependencyGraph::new();
        add_top(&graph, "a>=1.0", "1.0");
        add_top(&graph, "a>=1.0", "1.0");
        assert_eq!(graph.len(), 1);
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn test_same_version_different_requirement_reuses_node() {
        let graph = DependencyGraph::new();
        add_top(&graph, "a>=1.0", "1.5");
        let node = add_top(&graph, "A<2", "1.5.0");
        assert_eq!(graph.len(), 1);
        assert_eq!(graph.edge_count(), 2);
        assert_eq!(node.parents.len(), 2);
        assert_eq!(node.key, Some(key("a==1.5")));
    }

    #[test]
    fn test_different_kind_keeps_both_edges() {
        let graph = DependencyGraph::new();
        let a = add_top(&graph, "a", "1.0").key.unwrap();
        for kind in [RequirementType::Install, RequirementType::Build] {
            graph
                .add_dependency(Some(&a), kind, &req("b>=2"), &v("2.1"), "", false)
                .unwrap();
        }
        let edges = graph.get_dependency_edges(Some(&a), &[]).unwrap();
        assert_eq!(edges.len(), 2);
        let build = graph
            .get_dependency_edges(Some(&a), &[RequirementType::Build])
            .unwrap();
        assert_eq!(build.len(), 1);
        assert_eq!(build[0].child, key("b==2.1"));
    }

    #[test]
    fn test_missing_parent_is_not_found() {
        let graph = DependencyGraph::new();
        let ghost = key("ghost==1.0");
        let result = graph.add_dependency(
            Some(&ghost),
            RequirementType::Install,
            &req("b"),
            &v("1.0"),
            "",
            false,
        );
        assert!(matches!(result, Err(Error::NotFound { .. })));
        assert!(matches!(
            graph.get_dependency_edges(Some(&ghost), &[]),
            Err(Error::NotFound { .. })
        ));
        assert!(graph.is_empty());
    }

    #[test]
    fn test_install_dependencies_skip_build_edges() {
        let graph = DependencyGraph::new();
        let a = add_top(&graph, "a", "1.0").key.unwrap();
        graph
            .add_dependency(Some(&a), RequirementType::Install, &req("b"), &v("1.0"), "", false)
            .unwrap();
        graph
            .add_dependency(Some(&a), RequirementType::Build, &req("setuptools"), &v("70.0"), "", false)
            .unwrap();

        let names: Vec<String> = graph
            .get_install_dependencies()
            .iter()
            .map(|n| n.key_string())
            .collect();
        assert_eq!(names, vec!["a==1.0", "b==1.0"]);
    }

    #[test]
    fn test_nodes_by_name_sorted() {
        let graph = DependencyGraph::new();
        add_top(&graph, "six==1.16", "1.16");
        add_top(&graph, "Six<1.16", "1.15");
        let nodes = graph.get_nodes_by_name("SIX");
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].key_string(), "six==1.15");
    }

    #[test]
    fn test_round_trip_is_lossless() {
        let graph = DependencyGraph::new();
        let a = graph
            .add_dependency(None, RequirementType::TopLevel, &req("a>=1"), &v("1.0"), "https://x/a-1.0.tar.gz", false)
            .unwrap()
            .key
            .unwrap();
        graph
            .add_dependency(Some(&a), RequirementType::Build, &req("b[x]<3; python_version >= \"3.8\""), &v("2.0"), "https://x/b.whl", true)
            .unwrap();
        graph
            .add_dependency(Some(&a), RequirementType::Host, &req("b"), &v("2.0"), "", false)
            .unwrap();

        let dict = graph.to_dict();
        let restored = DependencyGraph::from_dict(&dict).unwrap();
        assert_eq!(restored.to_dict(), dict);
        assert_eq!(restored.len(), 2);
        assert_eq!(restored.edge_count(), 3);

        let b = restored.get_node(&key("b==2.0")).unwrap();
        assert!(b.pre_built);
        assert_eq!(b.download_url, "https://x/b.whl");
    }

    #[test]
    fn test_serialized_form_is_sorted() {
        let graph = DependencyGraph::new();
        add_top(&graph, "zeta", "1.0");
        add_top(&graph, "alpha", "1.0");
        let keys: Vec<String> = graph.to_dict().keys().cloned().collect();
        assert_eq!(keys, vec!["", "alpha==1.0", "zeta==1.0"]);

        let json = graph.to_json().unwrap();
        assert!(json.find("alpha==1.0").unwrap() < json.find("zeta==1.0").unwrap());
    }

    #[test]
    fn test_from_dict_rejects_bad_data() {
        let mut dict = SerializedGraph::new();
        dict.insert(
            "a==1.0".into(),
            SerializedNode {
                version: Some("1.0".into()),
                download_url: String::new(),
                pre_built: false,
                edges: vec![SerializedEdge {
                    parent_key: Some("missing==1.0".into()),
                    kind: RequirementType::Install,
                    requirement_text: "a".into(),
                    resolved_version: "1.0".into(),
                }],
            },
        );
        assert!(matches!(
            DependencyGraph::from_dict(&dict),
            Err(Error::NotFound { .. })
        ));

        let node = dict.get_mut("a==1.0").unwrap();
        node.edges[0].parent_key = None;
        node.edges[0].resolved_version = "2.0".into();
        assert!(matches!(
            DependencyGraph::from_dict(&dict),
            Err(Error::Parse { .. })
        ));

        let node = dict.get_mut("a==1.0").unwrap();
        node.edges[0].resolved_version = "1.0".into();
        node.edges[0].requirement_text = "b>=1".into();
        assert!(matches!(
            DependencyGraph::from_dict(&dict),
            Err(Error::Parse { .. })
        ));

        // spelling differences still name the same package
        let node = dict.get_mut("a==1.0").unwrap();
        node.edges[0].requirement_text = "A>=1".into();
        assert!(DependencyGraph::from_dict(&dict).is_ok());

        let mut dict = SerializedGraph::new();
        dict.insert(
            "a==1.0".into(),
            SerializedNode {
                version: Some("1.1".into()),
                download_url: String::new(),
                pre_built: false,
                edges: vec![],
            },
        );
        assert!(matches!(
            DependencyGraph::from_dict(&dict),
            Err(Error::Parse { .. })
        ));
    }

    #[test]
    fn test_concurrent_insertion_creates_one_node() {
        use rayon::prelude::*;

        let graph = DependencyGraph::new();
        (0..64).into_par_iter().for_each(|i| {
            let r = req(&format!("shared>={}", i % 4));
            graph
                .add_dependency(None, RequirementType::TopLevel, &r, &v("9.0"), "", false)
                .unwrap();
        });
        assert_eq!(graph.len(), 1);
        assert_eq!(graph.edge_count(), 4);
    }

    #[test]
    fn test_stats() {
        let graph = DependencyGraph::new();
        let a = add_top(&graph, "a", "1.0").key.unwrap();
        let b = add_top(&graph, "b", "1.0").key.unwrap();
        for parent in [&a, &b] {
            graph
                .add_dependency(Some(parent), RequirementType::Install, &req("c"), &v("1.0"), "", false)
                .unwrap();
        }
        let stats = graph.stats();
        assert_eq!(stats.unique_count, 3);
        assert_eq!(stats.edge_count, 4);
        assert_eq!(stats.top_level_count, 2);
        assert_eq!(stats.shared_count, 1);
    }

    #[test]
    fn test_file_round_trip() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("graph.json");
        let graph = DependencyGraph::new();
        add_top(&graph, "packaging>=24.0", "24.2");
        graph.write_to_file(&path).unwrap();

        let loaded = DependencyGraph::from_file(&path).unwrap();
        assert_eq!(loaded.to_dict(), graph.to_dict());
    }
}
