//! Code relationship graph construction and traversal using petgraph.
//!
//! The graph tracks relationships between symbols: imports, calls, extends,
//! implements, references, and containment. Nodes are either `internal`
//! (resolved to a symbol defined in this project) or `external` (a module or
//! name the project imports but doesn't define). Every edge carries a
//! resolution `Confidence` so callers can weight an `exact` import edge
//! differently from a `heuristic` name-matched reference.
//!
//! Used for:
//! - Relationship-proximity boosting in search
//! - `get_code_relationships` MCP tool
//! - Impact analysis ("what breaks if I change this?")
//! - Circular dependency detection

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::RwLock;

use petgraph::algo::is_cyclic_directed;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction as PetDirection;

use crate::error::{CodeSeekerError, CodeSeekerResult};
use crate::types::{Confidence, RelationshipKind};

/// Identifies a graph node: a symbol defined in this project, or an external
/// module/name the project merely refers to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeKey {
    /// A symbol defined in this project, by its database id.
    Internal(i64),
    /// An unresolved reference to something outside the project, named
    /// `<module>/<name>`.
    External(String),
}

impl NodeKey {
    /// Build an external node key from a module path and a name within it.
    #[must_use]
    pub fn external(module: &str, name: &str) -> Self {
        Self::External(format!("{module}/{name}"))
    }
}

/// Traversal/query direction relative to a start node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphDirection {
    /// Edges starting at the node (what it depends on).
    Outgoing,
    /// Edges ending at the node (what depends on it).
    Incoming,
    /// Both directions, treating the graph as undirected.
    Both,
}

/// Metadata attached to a node beyond its key.
#[derive(Debug, Clone, Default)]
pub struct NodeAttrs {
    /// Display name.
    pub name: String,
    /// File the symbol is defined in, for internal nodes.
    pub file_path: Option<PathBuf>,
}

/// An edge returned from a neighbor/traversal query.
#[derive(Debug, Clone)]
pub struct Edge {
    /// The node at the other end of the edge.
    pub other: NodeKey,
    /// What kind of relationship this is.
    pub kind: RelationshipKind,
    /// How confidently the edge was resolved.
    pub confidence: Confidence,
}

/// Hard ceiling on nodes visited by a single traversal, regardless of
/// requested depth. Protects against pathological fan-out graphs turning a
/// single query into an unbounded scan.
pub const DEFAULT_VISIT_CAP: usize = 5000;

struct GraphInner {
    graph: DiGraph<NodeKey, (RelationshipKind, Confidence)>,
    node_index: HashMap<NodeKey, NodeIndex>,
    attrs: HashMap<NodeKey, NodeAttrs>,
    file_symbols: HashMap<i64, Vec<i64>>,
}

/// Thread-safe code relationship graph.
pub struct CodeGraph {
    inner: RwLock<GraphInner>,
}

impl CodeGraph {
    /// Create a new empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(GraphInner {
                graph: DiGraph::new(),
                node_index: HashMap::new(),
                attrs: HashMap::new(),
                file_symbols: HashMap::new(),
            }),
        }
    }

    fn lock_write(&self) -> CodeSeekerResult<std::sync::RwLockWriteGuard<'_, GraphInner>> {
        self.inner
            .write()
            .map_err(|e| CodeSeekerError::Internal(format!("graph lock poisoned: {e}")))
    }

    fn lock_read(&self) -> CodeSeekerResult<std::sync::RwLockReadGuard<'_, GraphInner>> {
        self.inner
            .read()
            .map_err(|e| CodeSeekerError::Internal(format!("graph lock poisoned: {e}")))
    }

    /// Insert or update a node, tracking which file an internal symbol
    /// belongs to so `delete_symbols_by_file` can find it later.
    pub fn upsert_node(&self, key: NodeKey, attrs: NodeAttrs, file_id: Option<i64>) -> CodeSeekerResult<()> {
        let mut inner = self.lock_write()?;
        ensure_node(&mut inner, key.clone());
        if let (NodeKey::Internal(symbol_id), Some(file_id)) = (&key, file_id) {
            let symbols = inner.file_symbols.entry(file_id).or_default();
            if !symbols.contains(symbol_id) {
                symbols.push(*symbol_id);
            }
        }
        inner.attrs.insert(key, attrs);
        Ok(())
    }

    /// Insert or update a batch of nodes.
    pub fn upsert_nodes(&self, nodes: impl IntoIterator<Item = (NodeKey, NodeAttrs, Option<i64>)>) -> CodeSeekerResult<()> {
        for (key, attrs, file_id) in nodes {
            self.upsert_node(key, attrs, file_id)?;
        }
        Ok(())
    }

    /// Insert a relationship edge between two nodes, creating either
    /// endpoint if it doesn't exist yet.
    pub fn upsert_edge(
        &self,
        source: NodeKey,
        target: NodeKey,
        kind: RelationshipKind,
        confidence: Confidence,
    ) -> CodeSeekerResult<()> {
        let mut inner = self.lock_write()?;
        let source_idx = ensure_node(&mut inner, source);
        let target_idx = ensure_node(&mut inner, target);
        inner.graph.add_edge(source_idx, target_idx, (kind, confidence));
        Ok(())
    }

    /// Insert a batch of edges.
    pub fn upsert_edges(
        &self,
        edges: impl IntoIterator<Item = (NodeKey, NodeKey, RelationshipKind, Confidence)>,
    ) -> CodeSeekerResult<()> {
        for (source, target, kind, confidence) in edges {
            self.upsert_edge(source, target, kind, confidence)?;
        }
        Ok(())
    }

    /// Remove every internal symbol (and its edges) that belongs to the
    /// given file. Called during the remove phase of an index pass.
    pub fn delete_symbols_by_file(&self, file_id: i64) -> CodeSeekerResult<()> {
        let mut inner = self.lock_write()?;
        let Some(symbol_ids) = inner.file_symbols.remove(&file_id) else {
            return Ok(());
        };

        for symbol_id in symbol_ids {
            let key = NodeKey::Internal(symbol_id);
            if let Some(idx) = inner.node_index.remove(&key) {
                inner.graph.remove_node(idx);
                // Removing a node shifts petgraph's internal indices; rebuild
                // the key->index map to stay consistent.
                rebuild_index(&mut inner);
            }
            inner.attrs.remove(&key);
        }
        Ok(())
    }

    /// Display attrs for a node, if it has been registered.
    pub fn node_attrs(&self, key: &NodeKey) -> CodeSeekerResult<Option<NodeAttrs>> {
        let inner = self.lock_read()?;
        Ok(inner.attrs.get(key).cloned())
    }

    /// Direct neighbors of a node in the given direction, optionally
    /// filtered to a single relationship kind.
    pub fn neighbors(
        &self,
        key: &NodeKey,
        kind_filter: Option<RelationshipKind>,
        direction: GraphDirection,
    ) -> CodeSeekerResult<Vec<Edge>> {
        let inner = self.lock_read()?;
        let Some(&idx) = inner.node_index.get(key) else {
            return Ok(Vec::new());
        };

        let mut edges = Vec::new();
        let directions: &[PetDirection] = match direction {
            GraphDirection::Outgoing => &[PetDirection::Outgoing],
            GraphDirection::Incoming => &[PetDirection::Incoming],
            GraphDirection::Both => &[PetDirection::Outgoing, PetDirection::Incoming],
        };

        for &dir in directions {
            for edge_ref in inner.graph.edges_directed(idx, dir) {
                let (kind, confidence) = *edge_ref.weight();
                if kind_filter.is_some_and(|f| f != kind) {
                    continue;
                }
                let other_idx = if dir == PetDirection::Outgoing {
                    edge_ref.target()
                } else {
                    edge_ref.source()
                };
                edges.push(Edge {
                    other: inner.graph[other_idx].clone(),
                    kind,
                    confidence,
                });
            }
        }
        Ok(edges)
    }

    /// Breadth-first traversal from `start` up to `depth` hops, bounded by
    /// `DEFAULT_VISIT_CAP` total nodes visited. Detects cycles implicitly by
    /// never revisiting a node.
    pub fn traverse(
        &self,
        start: &NodeKey,
        depth: usize,
        kind_filter: Option<RelationshipKind>,
        direction: GraphDirection,
    ) -> CodeSeekerResult<Vec<NodeKey>> {
        let inner = self.lock_read()?;
        let Some(&start_idx) = inner.node_index.get(start) else {
            return Ok(Vec::new());
        };

        let directions: &[PetDirection] = match direction {
            GraphDirection::Outgoing => &[PetDirection::Outgoing],
            GraphDirection::Incoming => &[PetDirection::Incoming],
            GraphDirection::Both => &[PetDirection::Outgoing, PetDirection::Incoming],
        };

        let mut visited: HashMap<NodeIndex, usize> = HashMap::new();
        visited.insert(start_idx, 0);
        let mut queue = VecDeque::new();
        queue.push_back(start_idx);
        let mut result = Vec::new();

        while let Some(current) = queue.pop_front() {
            let current_depth = visited[&current];
            if current_depth >= depth {
                continue;
            }
            if result.len() >= DEFAULT_VISIT_CAP {
                break;
            }

            for &dir in directions {
                for edge_ref in inner.graph.edges_directed(current, dir) {
                    let (kind, _confidence) = *edge_ref.weight();
                    if kind_filter.is_some_and(|f| f != kind) {
                        continue;
                    }
                    let neighbor = if dir == PetDirection::Outgoing {
                        edge_ref.target()
                    } else {
                        edge_ref.source()
                    };
                    if visited.contains_key(&neighbor) {
                        continue;
                    }
                    visited.insert(neighbor, current_depth + 1);
                    result.push(inner.graph[neighbor].clone());
                    queue.push_back(neighbor);
                    if result.len() >= DEFAULT_VISIT_CAP {
                        break;
                    }
                }
            }
        }

        Ok(result)
    }

    /// Whether the graph contains any directed cycle.
    #[must_use]
    pub fn has_cycles(&self) -> bool {
        self.inner
            .read()
            .map(|inner| is_cyclic_directed(&inner.graph))
            .unwrap_or(false)
    }

    /// Strongly connected components with more than one node.
    pub fn find_cycles(&self) -> CodeSeekerResult<Vec<Vec<NodeKey>>> {
        let inner = self.lock_read()?;
        let sccs = petgraph::algo::tarjan_scc(&inner.graph);
        let cycles = sccs
            .into_iter()
            .filter(|scc| scc.len() > 1)
            .map(|scc| scc.into_iter().map(|n| inner.graph[n].clone()).collect())
            .collect();
        Ok(cycles)
    }

    /// Shortest undirected hop distance between two nodes, or `None` if
    /// they're not connected.
    pub fn distance(&self, from: &NodeKey, to: &NodeKey) -> CodeSeekerResult<Option<usize>> {
        let inner = self.lock_read()?;
        let (Some(&from_idx), Some(&to_idx)) = (inner.node_index.get(from), inner.node_index.get(to)) else {
            return Ok(None);
        };

        let mut visited = HashMap::new();
        let mut queue = VecDeque::new();
        visited.insert(from_idx, 0usize);
        queue.push_back(from_idx);

        while let Some(current) = queue.pop_front() {
            let dist = visited[&current];
            if current == to_idx {
                return Ok(Some(dist));
            }
            for dir in [PetDirection::Outgoing, PetDirection::Incoming] {
                for neighbor in inner.graph.neighbors_directed(current, dir) {
                    if !visited.contains_key(&neighbor) {
                        visited.insert(neighbor, dist + 1);
                        queue.push_back(neighbor);
                    }
                }
            }
        }
        Ok(None)
    }

    /// Total node count.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.inner.read().map(|i| i.graph.node_count()).unwrap_or(0)
    }

    /// Total edge count.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.inner.read().map(|i| i.graph.edge_count()).unwrap_or(0)
    }

    /// Drop every node and edge.
    pub fn clear(&self) {
        if let Ok(mut inner) = self.inner.write() {
            inner.graph.clear();
            inner.node_index.clear();
            inner.attrs.clear();
            inner.file_symbols.clear();
        }
    }
}

impl Default for CodeGraph {
    fn default() -> Self {
        Self::new()
    }
}

fn ensure_node(inner: &mut GraphInner, key: NodeKey) -> NodeIndex {
    if let Some(&idx) = inner.node_index.get(&key) {
        return idx;
    }
    let idx = inner.graph.add_node(key.clone());
    inner.node_index.insert(key, idx);
    idx
}

/// Rebuild the key->index map after a node removal, since petgraph's
/// `remove_node` swaps the last node into the removed slot.
fn rebuild_index(inner: &mut GraphInner) {
    inner.node_index.clear();
    for idx in inner.graph.node_indices() {
        inner.node_index.insert(inner.graph[idx].clone(), idx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn internal(id: i64) -> NodeKey {
        NodeKey::Internal(id)
    }

    #[test]
    fn neighbors_follows_outgoing_edges() {
        let graph = CodeGraph::new();
        graph
            .upsert_edge(internal(1), internal(2), RelationshipKind::Calls, Confidence::Exact)
            .unwrap();

        let out = graph.neighbors(&internal(1), None, GraphDirection::Outgoing).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].other, internal(2));
    }

    #[test]
    fn neighbors_of_unknown_node_is_empty() {
        let graph = CodeGraph::new();
        let out = graph.neighbors(&internal(999), None, GraphDirection::Outgoing).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn traverse_respects_depth() {
        let graph = CodeGraph::new();
        graph.upsert_edge(internal(1), internal(2), RelationshipKind::Calls, Confidence::Exact).unwrap();
        graph.upsert_edge(internal(2), internal(3), RelationshipKind::Calls, Confidence::Exact).unwrap();
        graph.upsert_edge(internal(3), internal(4), RelationshipKind::Calls, Confidence::Exact).unwrap();

        let reached = graph.traverse(&internal(1), 2, None, GraphDirection::Outgoing).unwrap();
        assert!(reached.contains(&internal(2)));
        assert!(reached.contains(&internal(3)));
        assert!(!reached.contains(&internal(4)));
    }

    #[test]
    fn traverse_filters_by_kind() {
        let graph = CodeGraph::new();
        graph.upsert_edge(internal(1), internal(2), RelationshipKind::Calls, Confidence::Exact).unwrap();
        graph.upsert_edge(internal(1), internal(3), RelationshipKind::Imports, Confidence::Exact).unwrap();

        let reached = graph
            .traverse(&internal(1), 1, Some(RelationshipKind::Calls), GraphDirection::Outgoing)
            .unwrap();
        assert_eq!(reached, vec![internal(2)]);
    }

    #[test]
    fn delete_symbols_by_file_removes_node_and_edges() {
        let graph = CodeGraph::new();
        graph.upsert_node(internal(1), NodeAttrs::default(), Some(10)).unwrap();
        graph.upsert_edge(internal(1), internal(2), RelationshipKind::Calls, Confidence::Exact).unwrap();

        graph.delete_symbols_by_file(10).unwrap();
        let out = graph.neighbors(&internal(1), None, GraphDirection::Outgoing).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn cycle_detection_finds_a_three_node_cycle() {
        let graph = CodeGraph::new();
        graph.upsert_edge(internal(1), internal(2), RelationshipKind::Imports, Confidence::Exact).unwrap();
        graph.upsert_edge(internal(2), internal(3), RelationshipKind::Imports, Confidence::Exact).unwrap();
        graph.upsert_edge(internal(3), internal(1), RelationshipKind::Imports, Confidence::Exact).unwrap();

        assert!(graph.has_cycles());
        let cycles = graph.find_cycles().unwrap();
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].len(), 3);
    }

    #[test]
    fn distance_between_connected_nodes() {
        let graph = CodeGraph::new();
        graph.upsert_edge(internal(1), internal(2), RelationshipKind::Calls, Confidence::Exact).unwrap();
        graph.upsert_edge(internal(2), internal(3), RelationshipKind::Calls, Confidence::Exact).unwrap();

        assert_eq!(graph.distance(&internal(1), &internal(3)).unwrap(), Some(2));
        assert_eq!(graph.distance(&internal(1), &internal(99)).unwrap(), None);
    }

    #[test]
    fn external_nodes_are_distinct_from_internal_with_the_same_numeric_text() {
        let graph = CodeGraph::new();
        graph
            .upsert_edge(
                internal(1),
                NodeKey::external("os.path", "join"),
                RelationshipKind::Imports,
                Confidence::Heuristic,
            )
            .unwrap();
        let out = graph.neighbors(&internal(1), None, GraphDirection::Outgoing).unwrap();
        assert_eq!(out[0].other, NodeKey::external("os.path", "join"));
        assert_eq!(out[0].confidence, Confidence::Heuristic);
    }
}
