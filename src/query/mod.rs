//! Read-only passes over a snapshot graph.
//!
//! [`traversal`] extracts depth-bounded subgraphs, [`weights`] aggregates
//! subgraph weights and [`analytics`] computes centrality and network
//! metrics over an extracted subgraph.

pub mod analytics;
pub mod traversal;
pub mod weights;

pub use analytics::{MetricsEngine, MetricsReport, NetworkMetrics, NodeMetrics};
pub use traversal::{ReachSummary, Subgraph, SubgraphExtractor};
pub use weights::{SubgraphWeights, WeightAggregator, WeightScope};
