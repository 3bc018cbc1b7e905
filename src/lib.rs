//! Snapshot-scoped weighted digraph engine.
//!
//! Vertex and edge records tagged with a snapshot label are ingested into a
//! [`SnapshotGraphStore`]. Per-snapshot graphs answer bounded-depth subgraph
//! extraction, recursive subgraph weights and node/network centrality
//! metrics. [`GraphProcessor`] ties these together behind a single-flight
//! [`ResultCache`] that is flushed whenever new data is ingested.

#![warn(missing_docs)]

pub mod cache;
pub mod config;
pub mod error;
pub mod ingest;
pub mod model;
pub mod processor;
pub mod query;
pub mod store;

pub use cache::{CacheEntry, CacheKey, CacheStats, EntryOrigin, Invalidate, ResultCache};
pub use config::EngineConfig;
pub use error::{ComputationWarning, GraphError, Result, ValidationError};
pub use model::{normalize_snapshot, EdgeRecord, RawEdge, RawVertex, VertexRecord};
pub use processor::{
    GraphMetrics, GraphProcessor, ProcessorStats, SubgraphReport, SubgraphRequest, WeightSummary,
};
pub use query::{MetricsEngine, Subgraph, SubgraphExtractor, WeightAggregator};
pub use store::{IngestSummary, SnapshotGraph, SnapshotGraphStore};
