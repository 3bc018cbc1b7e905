//! Immutable adjacency for one snapshot and the builder that assembles it.

use std::collections::hash_map::Entry;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::{GraphError, Result, ValidationError};
use crate::model::NodeIdx;

/// Immutable directed graph of one snapshot.
///
/// Nodes live in an arena addressed by [`NodeIdx`]; the graph owns the only
/// mapping between external string ids and indices.
#[derive(Debug, Clone)]
pub struct SnapshotGraph {
    label: String,
    ids: Vec<String>,
    weights: Vec<f64>,
    index: FxHashMap<String, NodeIdx>,
    outgoing: Vec<Vec<NodeIdx>>,
    incoming: Vec<Vec<NodeIdx>>,
    edges: Vec<(NodeIdx, NodeIdx)>,
}

impl SnapshotGraph {
    /// Snapshot label this graph was built from.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.ids.len()
    }

    /// Number of distinct directed edges.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Index for an external id.
    pub fn index_of(&self, id: &str) -> Option<NodeIdx> {
        self.index.get(id).copied()
    }

    /// Index for an external id, or [`GraphError::NotFound`].
    pub fn resolve(&self, id: &str) -> Result<NodeIdx> {
        self.index_of(id)
            .ok_or_else(|| GraphError::node_not_found(format!("{id} (snapshot {})", self.label)))
    }

    /// External id of `node`.
    pub fn id(&self, node: NodeIdx) -> &str {
        &self.ids[node.index()]
    }

    /// Own weight of `node`.
    pub fn weight(&self, node: NodeIdx) -> f64 {
        self.weights[node.index()]
    }

    /// Direct successors in edge ingestion order.
    pub fn successors(&self, node: NodeIdx) -> &[NodeIdx] {
        &self.outgoing[node.index()]
    }

    /// Direct predecessors in edge ingestion order.
    pub fn predecessors(&self, node: NodeIdx) -> &[NodeIdx] {
        &self.incoming[node.index()]
    }

    /// All node indices in ingestion order.
    pub fn nodes(&self) -> impl ExactSizeIterator<Item = NodeIdx> + '_ {
        (0..self.ids.len() as u32).map(NodeIdx)
    }

    /// All edges in ingestion order.
    pub fn edges(&self) -> &[(NodeIdx, NodeIdx)] {
        &self.edges
    }

    /// Nodes without incoming edges, in ingestion order.
    ///
    /// When every node has a predecessor (the graph is cyclic) the first
    /// ingested node is returned alone, so callers always get a default root.
    pub fn root_candidates(&self) -> Vec<NodeIdx> {
        let roots: Vec<NodeIdx> = self
            .nodes()
            .filter(|&node| self.incoming[node.index()].is_empty())
            .collect();
        if roots.is_empty() && !self.ids.is_empty() {
            return vec![NodeIdx(0)];
        }
        roots
    }
}

/// Accumulates one snapshot's vertices and edges.
#[derive(Debug)]
pub(crate) struct SnapshotGraphBuilder {
    graph: SnapshotGraph,
    seen_edges: FxHashSet<(NodeIdx, NodeIdx)>,
    duplicate_edges: usize,
}

impl SnapshotGraphBuilder {
    pub(crate) fn new(label: String) -> Self {
        Self {
            graph: SnapshotGraph {
                label,
                ids: Vec::new(),
                weights: Vec::new(),
                index: FxHashMap::default(),
                outgoing: Vec::new(),
                incoming: Vec::new(),
                edges: Vec::new(),
            },
            seen_edges: FxHashSet::default(),
            duplicate_edges: 0,
        }
    }

    pub(crate) fn add_vertex(
        &mut self,
        vertex_id: String,
        weight: f64,
    ) -> std::result::Result<NodeIdx, ValidationError> {
        let next = NodeIdx(self.graph.ids.len() as u32);
        match self.graph.index.entry(vertex_id) {
            Entry::Occupied(entry) => Err(ValidationError::DuplicateVertex {
                vertex_id: entry.key().clone(),
                snapshot: self.graph.label.clone(),
            }),
            Entry::Vacant(entry) => {
                self.graph.ids.push(entry.key().clone());
                entry.insert(next);
                self.graph.weights.push(weight);
                self.graph.outgoing.push(Vec::new());
                self.graph.incoming.push(Vec::new());
                Ok(next)
            }
        }
    }

    /// Adds `from -> to`. Repeated edges collapse into one.
    pub(crate) fn add_edge(
        &mut self,
        from_id: &str,
        to_id: &str,
    ) -> std::result::Result<(), ValidationError> {
        let dangling = |missing: &str| ValidationError::DanglingEndpoint {
            from_id: from_id.to_string(),
            to_id: to_id.to_string(),
            snapshot: self.graph.label.clone(),
            missing: missing.to_string(),
        };
        let from = self.graph.index_of(from_id).ok_or_else(|| dangling(from_id))?;
        let to = self.graph.index_of(to_id).ok_or_else(|| dangling(to_id))?;

        if !self.seen_edges.insert((from, to)) {
            self.duplicate_edges += 1;
            return Ok(());
        }
        self.graph.outgoing[from.index()].push(to);
        self.graph.incoming[to.index()].push(from);
        self.graph.edges.push((from, to));
        Ok(())
    }

    pub(crate) fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub(crate) fn duplicate_edges(&self) -> usize {
        self.duplicate_edges
    }

    pub(crate) fn finish(self) -> SnapshotGraph {
        self.graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> SnapshotGraph {
        let mut builder = SnapshotGraphBuilder::new("s".into());
        for id in ["A", "B", "C"] {
            builder.add_vertex(id.into(), 1.0).unwrap();
        }
        builder.add_edge("A", "B").unwrap();
        builder.add_edge("B", "C").unwrap();
        builder.add_edge("A", "B").unwrap();
        assert_eq!(builder.duplicate_edges(), 1);
        builder.finish()
    }

    #[test]
    fn ids_round_trip_through_indices() {
        let graph = chain();
        for node in graph.nodes() {
            assert_eq!(graph.index_of(graph.id(node)), Some(node));
        }
        assert_eq!(graph.edge_count(), 2);
        assert!(graph.resolve("Z").unwrap_err().is_not_found());
    }

    #[test]
    fn cyclic_graph_falls_back_to_first_node() {
        let mut builder = SnapshotGraphBuilder::new("s".into());
        builder.add_vertex("X".into(), 1.0).unwrap();
        builder.add_vertex("Y".into(), 1.0).unwrap();
        builder.add_edge("X", "Y").unwrap();
        builder.add_edge("Y", "X").unwrap();
        let graph = builder.finish();
        assert_eq!(graph.root_candidates(), vec![NodeIdx(0)]);
        assert_eq!(chain().root_candidates(), vec![NodeIdx(0)]);
    }

    #[test]
    fn dangling_and_duplicate_inputs_are_rejected() {
        let mut builder = SnapshotGraphBuilder::new("s".into());
        builder.add_vertex("A".into(), 1.0).unwrap();
        assert!(matches!(
            builder.add_vertex("A".into(), 2.0),
            Err(ValidationError::DuplicateVertex { .. })
        ));
        assert!(matches!(
            builder.add_edge("A", "B"),
            Err(ValidationError::DanglingEndpoint { missing, .. }) if missing == "B"
        ));
    }
}
