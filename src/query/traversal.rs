//! Bounded breadth-first extraction of the subgraph reachable from a start vertex.

use std::collections::VecDeque;

use rustc_hash::FxHashMap;
use serde::Serialize;
use tracing::trace;

use crate::error::Result;
use crate::model::NodeIdx;
use crate::store::SnapshotGraph;

/// Depth-bounded view of a [`SnapshotGraph`] reachable from one root.
///
/// Nodes are addressed by their local position (breadth-first order, root at
/// 0). The view borrows the graph and is never mutated after extraction.
#[derive(Debug, Clone)]
pub struct Subgraph<'g> {
    graph: &'g SnapshotGraph,
    nodes: Vec<NodeIdx>,
    depths: Vec<usize>,
    position: FxHashMap<NodeIdx, usize>,
    successors: Vec<Vec<usize>>,
    edges: Vec<(usize, usize)>,
    depth_reached: usize,
}

impl<'g> Subgraph<'g> {
    /// Graph the view was taken from.
    pub fn graph(&self) -> &'g SnapshotGraph {
        self.graph
    }

    /// Root node (local position 0).
    pub fn root(&self) -> NodeIdx {
        self.nodes[0]
    }

    /// Number of nodes in the view.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always false: a view contains at least its root.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Graph indices in breadth-first order.
    pub fn nodes(&self) -> &[NodeIdx] {
        &self.nodes
    }

    /// Graph index at local position `local`.
    pub fn node(&self, local: usize) -> NodeIdx {
        self.nodes[local]
    }

    /// Local position of a graph index, if it is part of the view.
    pub fn local_of(&self, node: NodeIdx) -> Option<usize> {
        self.position.get(&node).copied()
    }

    /// True when the external id is part of the view.
    pub fn contains_id(&self, id: &str) -> bool {
        self.graph
            .index_of(id)
            .is_some_and(|node| self.position.contains_key(&node))
    }

    /// Breadth-first depth of `local` from the root.
    pub fn depth(&self, local: usize) -> usize {
        self.depths[local]
    }

    /// External id at `local`.
    pub fn id(&self, local: usize) -> &'g str {
        self.graph.id(self.nodes[local])
    }

    /// Own weight at `local`.
    pub fn weight(&self, local: usize) -> f64 {
        self.graph.weight(self.nodes[local])
    }

    /// Local successors of `local` within the view.
    pub fn successors(&self, local: usize) -> &[usize] {
        &self.successors[local]
    }

    /// Edges as local `(source, target)` pairs.
    pub fn edges(&self) -> &[(usize, usize)] {
        &self.edges
    }

    /// Number of edges in the view.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Deepest level actually reached: `min(max_depth, eccentricity of root)`.
    pub fn depth_reached(&self) -> usize {
        self.depth_reached
    }
}

/// Size of everything reachable from a root, independent of any depth bound.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReachSummary {
    /// Root the traversal started from.
    pub root_node: String,
    /// Reachable nodes including the root.
    pub total_nodes: usize,
    /// Edges among reachable nodes.
    pub total_edges: usize,
    /// Eccentricity of the root.
    pub max_depth: usize,
}

/// Breadth-first, depth-bounded reachability.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubgraphExtractor;

impl SubgraphExtractor {
    /// Extracts the view reachable from `root_id` within `max_depth` hops.
    ///
    /// A node is enqueued the first time it is reached, so cycles terminate.
    /// Children are explored only while `depth < max_depth`; `max_depth == 0`
    /// yields the root alone with no edges.
    ///
    /// # Errors
    /// [`GraphError::NotFound`](crate::GraphError::NotFound) when `root_id` is
    /// not a node of `graph`.
    pub fn extract<'g>(
        graph: &'g SnapshotGraph,
        root_id: &str,
        max_depth: usize,
    ) -> Result<Subgraph<'g>> {
        let root = graph.resolve(root_id)?;
        Ok(Self::bfs(graph, root, Some(max_depth)))
    }

    /// Extracts everything reachable from `root_id` without a depth bound.
    pub fn extract_reachable<'g>(graph: &'g SnapshotGraph, root_id: &str) -> Result<Subgraph<'g>> {
        let root = graph.resolve(root_id)?;
        Ok(Self::bfs(graph, root, None))
    }

    /// Node/edge totals and eccentricity of the full reachable set.
    pub fn full_reachable_metrics(graph: &SnapshotGraph, root_id: &str) -> Result<ReachSummary> {
        let reach = Self::extract_reachable(graph, root_id)?;
        Ok(ReachSummary {
            root_node: root_id.to_string(),
            total_nodes: reach.len(),
            total_edges: reach.edge_count(),
            max_depth: reach.depth_reached(),
        })
    }

    fn bfs(graph: &SnapshotGraph, root: NodeIdx, max_depth: Option<usize>) -> Subgraph<'_> {
        let expands = |depth: usize| max_depth.map_or(true, |bound| depth < bound);

        let mut nodes = vec![root];
        let mut depths = vec![0];
        let mut position = FxHashMap::default();
        position.insert(root, 0usize);
        let mut queue = VecDeque::from([0usize]);
        let mut depth_reached = 0;

        while let Some(local) = queue.pop_front() {
            let depth = depths[local];
            if !expands(depth) {
                continue;
            }
            for &next in graph.successors(nodes[local]) {
                if position.contains_key(&next) {
                    continue;
                }
                let next_local = nodes.len();
                position.insert(next, next_local);
                nodes.push(next);
                depths.push(depth + 1);
                depth_reached = depth_reached.max(depth + 1);
                queue.push_back(next_local);
            }
        }

        let mut successors = vec![Vec::new(); nodes.len()];
        let mut edges = Vec::new();
        for (local, &node) in nodes.iter().enumerate() {
            if !expands(depths[local]) {
                continue;
            }
            for next in graph.successors(node) {
                if let Some(&target) = position.get(next) {
                    successors[local].push(target);
                    edges.push((local, target));
                }
            }
        }

        trace!(
            snapshot = graph.label(),
            root = graph.id(root),
            nodes = nodes.len(),
            edges = edges.len(),
            depth_reached,
            "extracted subgraph"
        );

        Subgraph {
            graph,
            nodes,
            depths,
            position,
            successors,
            edges,
            depth_reached,
        }
    }
}
