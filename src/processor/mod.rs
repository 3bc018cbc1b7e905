//! Request-level façade over the store, the analysis passes and the cache.

mod stats;

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info};

pub use stats::ProcessorStats;

use crate::cache::{CacheEntry, CacheKey, ResultCache};
use crate::config::EngineConfig;
use crate::error::{ComputationWarning, GraphError, Result};
use crate::ingest;
use crate::model::{EdgeRecord, RawEdge, RawVertex, VertexRecord};
use crate::query::analytics::{MetricsEngine, NetworkMetrics, NodeMetrics};
use crate::query::traversal::{ReachSummary, SubgraphExtractor};
use crate::query::weights::WeightAggregator;
use crate::store::{IngestSummary, SnapshotGraph, SnapshotGraphStore};

/// Node entry of a subgraph response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeView {
    /// External id.
    pub id: String,
    /// Own weight.
    pub weight: f64,
    /// Weight including descendants within the subgraph.
    pub subgraph_weight: f64,
}

/// Edge entry of a subgraph response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EdgeView {
    /// Source id.
    pub source: String,
    /// Target id.
    pub target: String,
}

/// `metrics` section of a subgraph response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubgraphMetrics {
    /// Nodes in the subgraph.
    pub total_nodes: usize,
    /// Edges in the subgraph.
    pub total_edges: usize,
    /// Depth actually reached, never more than requested.
    pub max_depth: usize,
    /// Root id.
    pub root_node: String,
    /// Per-node statistics in breadth-first order.
    pub node_metrics: Vec<NodeMetrics>,
    /// Whole-subgraph aggregates.
    pub network_metrics: NetworkMetrics,
    /// Eigenvector values are the last iterate of a non-converged iteration.
    pub eigenvector_approximate: bool,
}

/// Full answer to one `(snapshot, root, max_depth)` request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubgraphReport {
    /// Normalized snapshot label.
    pub snapshot: String,
    /// Depth bound that was requested.
    pub requested_depth: usize,
    /// Subgraph nodes.
    pub nodes: Vec<NodeView>,
    /// Subgraph edges.
    pub edges: Vec<EdgeView>,
    /// Root id.
    pub root_id: String,
    /// Metrics over the subgraph.
    pub metrics: SubgraphMetrics,
    /// Non-fatal conditions met while computing.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<ComputationWarning>,
}

/// Answer to the graph-metrics query: default root and reachable size.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphMetrics {
    /// Reachability totals from the root.
    #[serde(flatten)]
    pub reach: ReachSummary,
    /// Root's subgraph weight over everything it reaches.
    pub total_weight: f64,
}

/// A node's own weight and its weight including every descendant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WeightSummary {
    /// Own weight.
    pub node_weight: f64,
    /// Own weight plus descendants over the whole snapshot.
    pub subgraph_weight: f64,
}

/// Parameters of a subgraph request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubgraphRequest {
    /// Snapshot label (normalized on lookup).
    pub snapshot: String,
    /// Root id; the first root candidate when absent.
    pub root_id: Option<String>,
    /// Depth bound; the configured default when absent.
    pub max_depth: Option<usize>,
}

impl SubgraphRequest {
    /// Request with default root and depth.
    pub fn new(snapshot: impl Into<String>) -> Self {
        Self {
            snapshot: snapshot.into(),
            root_id: None,
            max_depth: None,
        }
    }

    /// Sets the root.
    pub fn root(mut self, root_id: impl Into<String>) -> Self {
        self.root_id = Some(root_id.into());
        self
    }

    /// Sets the depth bound.
    pub fn depth(mut self, max_depth: usize) -> Self {
        self.max_depth = Some(max_depth);
        self
    }

    /// Removes the depth bound: the whole reachable set is analyzed.
    pub fn unbounded(self) -> Self {
        self.depth(usize::MAX)
    }
}

/// Orchestrates ingestion, extraction, aggregation, metrics and caching.
///
/// Requests hold a read lock on the store for their whole computation;
/// ingestion takes the write lock, so it waits for in-flight requests and
/// swaps data and flushes the cache while no request is running.
pub struct GraphProcessor {
    config: EngineConfig,
    engine: MetricsEngine,
    store: RwLock<SnapshotGraphStore>,
    cache: Arc<ResultCache<SubgraphReport>>,
    pool: Option<rayon::ThreadPool>,
    requests: AtomicU64,
}

impl std::fmt::Debug for GraphProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphProcessor")
            .field("config", &self.config)
            .field("store", &*self.store.read())
            .field("cache", &self.cache)
            .finish()
    }
}

impl Default for GraphProcessor {
    fn default() -> Self {
        Self::assemble(EngineConfig::default(), None)
    }
}

impl GraphProcessor {
    /// Processor with the given configuration.
    ///
    /// # Errors
    /// [`GraphError::Config`] for invalid settings or when the worker pool
    /// cannot be created.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let pool = match config.worker_threads {
            Some(threads) => Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .thread_name(|i| format!("tempograph-worker-{i}"))
                    .build()
                    .map_err(|err| GraphError::Config(err.to_string()))?,
            ),
            None => None,
        };
        Ok(Self::assemble(config, pool))
    }

    fn assemble(config: EngineConfig, pool: Option<rayon::ThreadPool>) -> Self {
        let cache: Arc<ResultCache<SubgraphReport>> = Arc::new(ResultCache::new());
        let mut store =
            SnapshotGraphStore::new().with_negative_weights(config.allow_negative_weights);
        store.register(cache.clone());
        Self {
            engine: MetricsEngine::from_config(&config),
            config,
            store: RwLock::new(store),
            cache,
            pool,
            requests: AtomicU64::new(0),
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Replaces all data. Waits for running requests, then flushes the cache.
    pub fn ingest(
        &self,
        vertices: Vec<VertexRecord>,
        edges: Vec<EdgeRecord>,
    ) -> Result<IngestSummary> {
        self.store.write().ingest(vertices, edges)
    }

    /// [`ingest`](Self::ingest) for loosely typed rows.
    pub fn ingest_raw(
        &self,
        vertices: Vec<RawVertex>,
        edges: Vec<RawEdge>,
    ) -> Result<IngestSummary> {
        self.store.write().ingest_raw(vertices, edges)
    }

    /// Reads the vertex and edge CSV files and ingests them.
    pub fn load_csv(&self, vertices: &Path, edges: &Path) -> Result<IngestSummary> {
        let raw_vertices = ingest::csv::read_vertices(vertices)?;
        let raw_edges = ingest::csv::read_edges(edges)?;
        info!(
            vertices = %vertices.display(),
            edges = %edges.display(),
            "loaded CSV records"
        );
        self.ingest_raw(raw_vertices, raw_edges)
    }

    /// Snapshot labels in ascending order.
    pub fn snapshots(&self) -> Vec<String> {
        self.store.read().snapshots().map(str::to_string).collect()
    }

    /// Root candidates of a snapshot.
    pub fn root_candidates(&self, snapshot: &str) -> Result<Vec<String>> {
        self.store.read().root_candidates(snapshot)
    }

    /// Default root and reachable totals of a snapshot.
    pub fn graph_metrics(&self, snapshot: &str, root_id: Option<&str>) -> Result<GraphMetrics> {
        self.requests.fetch_add(1, Ordering::Relaxed);
        let graph = self.store.read().graph_for(snapshot)?;
        let root = resolve_root(&graph, root_id)?;
        let reach = SubgraphExtractor::full_reachable_metrics(&graph, &root)?;
        let total_weight = WeightAggregator::subgraph_weight(&*graph, &root)?;
        Ok(GraphMetrics {
            reach,
            total_weight,
        })
    }

    /// Own and descendant-inclusive weight of one node over the whole snapshot.
    pub fn node_weight(&self, snapshot: &str, node_id: &str) -> Result<WeightSummary> {
        self.requests.fetch_add(1, Ordering::Relaxed);
        let graph = self.store.read().graph_for(snapshot)?;
        let node = graph.resolve(node_id)?;
        Ok(WeightSummary {
            node_weight: graph.weight(node),
            subgraph_weight: WeightAggregator::subgraph_weight(&*graph, node_id)?,
        })
    }

    /// Extracts, aggregates and measures the requested subgraph, memoized per
    /// `(snapshot, root, max_depth)`.
    pub fn subgraph(&self, request: &SubgraphRequest) -> Result<CacheEntry<SubgraphReport>> {
        self.requests.fetch_add(1, Ordering::Relaxed);
        let store = self.store.read();
        let graph = store.graph_for(&request.snapshot)?;
        let root = resolve_root(&graph, request.root_id.as_deref())?;
        graph.resolve(&root)?;
        let max_depth = request.max_depth.unwrap_or(self.config.default_max_depth);
        let key = CacheKey::new(graph.label(), root, max_depth);

        let entry = self
            .cache
            .get_or_compute(&key, || self.build_report(&graph, &key))?;
        debug!(key = %entry.key, origin = ?entry.origin, "served subgraph request");
        drop(store);
        Ok(entry)
    }

    /// Serves independent requests in parallel. Results keep request order.
    pub fn subgraph_batch(
        &self,
        requests: &[SubgraphRequest],
    ) -> Vec<Result<CacheEntry<SubgraphReport>>> {
        let run = || -> Vec<Result<CacheEntry<SubgraphReport>>> {
            requests
                .par_iter()
                .map(|request| self.subgraph(request))
                .collect()
        };
        match &self.pool {
            Some(pool) => pool.install(run),
            None => run(),
        }
    }

    /// Drops every memoized result.
    pub fn invalidate_cache(&self) {
        let _barrier = self.store.write();
        self.cache.clear();
    }

    /// Request and cache counters.
    pub fn stats(&self) -> ProcessorStats {
        ProcessorStats {
            requests: self.requests.load(Ordering::Relaxed),
            cache: self.cache.stats(),
            cached_entries: self.cache.len(),
        }
    }

    fn build_report(&self, graph: &SnapshotGraph, key: &CacheKey) -> Result<SubgraphReport> {
        let subgraph = SubgraphExtractor::extract(graph, &key.root_id, key.max_depth)?;
        let report = self.engine.compute(&subgraph);

        let nodes = report
            .node_metrics
            .iter()
            .map(|m| NodeView {
                id: m.node_id.clone(),
                weight: m.weight,
                subgraph_weight: m.subgraph_weight,
            })
            .collect();
        let edges = subgraph
            .edges()
            .iter()
            .map(|&(source, target)| EdgeView {
                source: subgraph.id(source).to_string(),
                target: subgraph.id(target).to_string(),
            })
            .collect();

        Ok(SubgraphReport {
            snapshot: key.snapshot.clone(),
            requested_depth: key.max_depth,
            nodes,
            edges,
            root_id: key.root_id.clone(),
            metrics: SubgraphMetrics {
                total_nodes: subgraph.len(),
                total_edges: subgraph.edge_count(),
                max_depth: subgraph.depth_reached(),
                root_node: key.root_id.clone(),
                node_metrics: report.node_metrics,
                network_metrics: report.network,
                eigenvector_approximate: report.eigenvector_approximate,
            },
            warnings: report.warnings,
        })
    }
}

fn resolve_root(graph: &SnapshotGraph, requested: Option<&str>) -> Result<String> {
    match requested {
        Some(root) => Ok(root.to_string()),
        None => graph
            .root_candidates()
            .first()
            .map(|&node| graph.id(node).to_string())
            .ok_or_else(|| GraphError::node_not_found(format!("<root of {}>", graph.label()))),
    }
}
