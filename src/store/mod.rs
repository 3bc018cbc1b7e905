//! Per-snapshot graph construction and lookup.

mod graph;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};

pub use graph::SnapshotGraph;
use graph::SnapshotGraphBuilder;

use crate::cache::Invalidate;
use crate::error::{GraphError, Result, ValidationError};
use crate::model::{normalize_snapshot, EdgeRecord, RawEdge, RawVertex, VertexRecord};

/// Counts from one successful ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub struct IngestSummary {
    /// Snapshots built.
    pub snapshots: usize,
    /// Vertices across all snapshots.
    pub vertices: usize,
    /// Distinct edges across all snapshots.
    pub edges: usize,
    /// Store generation after the swap; increments on every ingest.
    pub generation: u64,
}

/// Owns one [`SnapshotGraph`] per snapshot label.
///
/// Graphs are immutable once built and handed out as `Arc`s. Re-ingestion
/// replaces every snapshot at once and notifies registered caches.
#[derive(Default)]
pub struct SnapshotGraphStore {
    snapshots: BTreeMap<String, Arc<SnapshotGraph>>,
    allow_negative_weights: bool,
    listeners: Vec<Arc<dyn Invalidate>>,
    generation: u64,
}

impl fmt::Debug for SnapshotGraphStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnapshotGraphStore")
            .field("snapshots", &self.snapshots.keys().collect::<Vec<_>>())
            .field("listeners", &self.listeners.len())
            .field("generation", &self.generation)
            .finish()
    }
}

impl SnapshotGraphStore {
    /// Empty store rejecting negative weights.
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept or reject negative vertex weights on ingestion.
    pub fn with_negative_weights(mut self, allow: bool) -> Self {
        self.allow_negative_weights = allow;
        self
    }

    /// Registers a cache that must be flushed whenever the data is replaced.
    pub fn register(&mut self, listener: Arc<dyn Invalidate>) {
        self.listeners.push(listener);
    }

    /// Number of completed ingestions.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Validates the records and replaces every snapshot.
    ///
    /// All-or-nothing: on error the previous snapshots stay in place and no
    /// cache is touched.
    pub fn ingest(
        &mut self,
        vertices: Vec<VertexRecord>,
        edges: Vec<EdgeRecord>,
    ) -> Result<IngestSummary> {
        let mut builders: BTreeMap<String, SnapshotGraphBuilder> = BTreeMap::new();

        for (index, vertex) in vertices.into_iter().enumerate() {
            if vertex.vertex_id.trim().is_empty() {
                return Err(missing("vertex", index, "vertex").into());
            }
            let snapshot = normalize_snapshot(&vertex.snapshot);
            if snapshot.is_empty() {
                return Err(missing("vertex", index, "snapshot").into());
            }
            self.check_weight(&vertex, &snapshot)?;
            builders
                .entry(snapshot)
                .or_insert_with_key(|label| SnapshotGraphBuilder::new(label.clone()))
                .add_vertex(vertex.vertex_id, vertex.weight)?;
        }

        let vertex_total: usize = builders.values().map(|b| b.node_count()).sum();

        for (index, edge) in edges.into_iter().enumerate() {
            if edge.from_id.trim().is_empty() {
                return Err(missing("edge", index, "vertex_from").into());
            }
            if edge.to_id.trim().is_empty() {
                return Err(missing("edge", index, "vertex_to").into());
            }
            let snapshot = normalize_snapshot(&edge.snapshot);
            if snapshot.is_empty() {
                return Err(missing("edge", index, "snapshot").into());
            }
            let builder = builders.get_mut(&snapshot).ok_or_else(|| {
                ValidationError::DanglingEndpoint {
                    from_id: edge.from_id.clone(),
                    to_id: edge.to_id.clone(),
                    snapshot: snapshot.clone(),
                    missing: edge.from_id.clone(),
                }
            })?;
            builder.add_edge(&edge.from_id, &edge.to_id)?;
        }

        let mut snapshots = BTreeMap::new();
        let mut edge_total = 0;
        for (label, builder) in builders {
            if builder.duplicate_edges() > 0 {
                debug!(
                    snapshot = %label,
                    duplicates = builder.duplicate_edges(),
                    "collapsed repeated edges"
                );
            }
            let graph = builder.finish();
            edge_total += graph.edge_count();
            snapshots.insert(label, Arc::new(graph));
        }

        self.snapshots = snapshots;
        self.generation += 1;
        for listener in &self.listeners {
            listener.invalidate_all();
        }

        let summary = IngestSummary {
            snapshots: self.snapshots.len(),
            vertices: vertex_total,
            edges: edge_total,
            generation: self.generation,
        };
        info!(
            snapshots = summary.snapshots,
            vertices = summary.vertices,
            edges = summary.edges,
            generation = summary.generation,
            "ingested snapshot graphs"
        );
        Ok(summary)
    }

    /// Converts loosely typed rows, then [`ingest`](Self::ingest)s them.
    pub fn ingest_raw(
        &mut self,
        vertices: Vec<RawVertex>,
        edges: Vec<RawEdge>,
    ) -> Result<IngestSummary> {
        let vertices = vertices
            .into_iter()
            .enumerate()
            .map(|(index, raw)| raw.into_record(index))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let edges = edges
            .into_iter()
            .enumerate()
            .map(|(index, raw)| raw.into_record(index))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        self.ingest(vertices, edges)
    }

    /// Snapshot labels in ascending (chronological for dates) order.
    pub fn snapshots(&self) -> impl Iterator<Item = &str> + Clone + '_ {
        self.snapshots.keys().map(String::as_str)
    }

    /// Graph for `snapshot`; the label is normalized before lookup.
    pub fn graph_for(&self, snapshot: &str) -> Result<Arc<SnapshotGraph>> {
        let label = normalize_snapshot(snapshot);
        self.snapshots
            .get(&label)
            .cloned()
            .ok_or_else(|| GraphError::snapshot_not_found(snapshot))
    }

    /// Ids of nodes with no incoming edge, falling back to the first ingested
    /// node when there are none.
    pub fn root_candidates(&self, snapshot: &str) -> Result<Vec<String>> {
        let graph = self.graph_for(snapshot)?;
        Ok(graph
            .root_candidates()
            .into_iter()
            .map(|node| graph.id(node).to_string())
            .collect())
    }

    fn check_weight(&self, vertex: &VertexRecord, snapshot: &str) -> Result<()> {
        if !vertex.weight.is_finite() {
            return Err(ValidationError::NonFiniteWeight {
                vertex_id: vertex.vertex_id.clone(),
                snapshot: snapshot.to_string(),
            }
            .into());
        }
        if vertex.weight < 0.0 && !self.allow_negative_weights {
            return Err(ValidationError::NegativeWeight {
                vertex_id: vertex.vertex_id.clone(),
                snapshot: snapshot.to_string(),
                weight: vertex.weight,
            }
            .into());
        }
        Ok(())
    }
}

fn missing(record: &'static str, index: usize, field: &'static str) -> ValidationError {
    ValidationError::MissingField {
        record,
        index,
        field,
    }
}
