//! Structural metrics computed over an extracted subgraph.

use std::collections::VecDeque;

use serde::Serialize;
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::error::ComputationWarning;
use crate::query::traversal::Subgraph;
use crate::query::weights::WeightAggregator;

/// Structural statistics of one node within a subgraph.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeMetrics {
    /// External id.
    #[serde(rename = "Node")]
    pub node_id: String,
    /// Own weight.
    #[serde(rename = "Weight")]
    pub weight: f64,
    /// Own weight plus descendants within the subgraph.
    #[serde(rename = "Subgraph_Weight")]
    pub subgraph_weight: f64,
    /// In-degree plus out-degree.
    #[serde(rename = "Degree")]
    pub degree: usize,
    /// Normalized directed betweenness.
    #[serde(rename = "Betweenness")]
    pub betweenness: f64,
    /// `(reachable - 1) / Σ distance` over nodes reachable from this one.
    #[serde(rename = "Closeness")]
    pub closeness: f64,
    /// Principal eigenvector component of the undirected projection.
    #[serde(rename = "Eigenvector")]
    pub eigenvector: f64,
    /// Local clustering coefficient of the undirected projection.
    #[serde(rename = "ClusteringCoeff")]
    pub clustering_coefficient: f64,
}

/// Whole-subgraph aggregates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetworkMetrics {
    /// Mean of in+out degree.
    pub average_degree: f64,
    /// `E / (N (N - 1))`, 0 for fewer than two nodes.
    pub density: f64,
    /// Mean local clustering coefficient.
    pub average_clustering: f64,
    /// Mean shortest path length over ordered pairs; only defined for
    /// strongly connected subgraphs with at least two nodes.
    pub average_shortest_path: Option<f64>,
}

/// Output of [`MetricsEngine::compute`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsReport {
    /// One entry per subgraph node, in breadth-first order from the root.
    pub node_metrics: Vec<NodeMetrics>,
    /// Aggregates over the subgraph.
    pub network: NetworkMetrics,
    /// True when eigenvector iteration hit its cap before converging.
    pub eigenvector_approximate: bool,
    /// Non-fatal conditions met while computing.
    pub warnings: Vec<ComputationWarning>,
}

/// In/out/total degree per local node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DegreeDistribution {
    /// Edges ending at the node.
    pub in_degree: Vec<usize>,
    /// Edges leaving the node.
    pub out_degree: Vec<usize>,
    /// Sum of both.
    pub total_degree: Vec<usize>,
}

impl DegreeDistribution {
    /// Degree counts over the subgraph's edge set.
    pub fn of(subgraph: &Subgraph<'_>) -> Self {
        let n = subgraph.len();
        let mut in_degree = vec![0; n];
        let mut out_degree = vec![0; n];
        for &(source, target) in subgraph.edges() {
            out_degree[source] += 1;
            in_degree[target] += 1;
        }
        let total_degree = in_degree
            .iter()
            .zip(&out_degree)
            .map(|(i, o)| i + o)
            .collect();
        Self {
            in_degree,
            out_degree,
            total_degree,
        }
    }
}

/// Centrality and clustering over an extracted subgraph.
///
/// All metrics come out of one [`compute`](Self::compute) call so adjacency
/// lists and breadth-first searches are shared.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricsEngine {
    tolerance: f64,
    max_iterations: usize,
}

impl Default for MetricsEngine {
    fn default() -> Self {
        Self {
            tolerance: 1e-6,
            max_iterations: 100,
        }
    }
}

impl MetricsEngine {
    /// Engine with explicit eigenvector convergence settings.
    pub fn new(tolerance: f64, max_iterations: usize) -> Self {
        Self {
            tolerance,
            max_iterations,
        }
    }

    /// Engine configured from [`EngineConfig`].
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.eigenvector_tolerance, config.eigenvector_max_iterations)
    }

    /// Computes every metric for every node of `subgraph`.
    pub fn compute(&self, subgraph: &Subgraph<'_>) -> MetricsReport {
        let n = subgraph.len();
        let weights = WeightAggregator::subgraph_weights(subgraph);
        let mut warnings = weights.warnings().to_vec();

        let degrees = DegreeDistribution::of(subgraph);
        let undirected = undirected_neighbors(subgraph);
        let paths = shortest_paths(subgraph);
        let clustering: Vec<f64> = (0..n).map(|v| local_clustering(&undirected, v)).collect();
        let eigen = power_iteration(&undirected, self.tolerance, self.max_iterations);
        if !eigen.converged {
            warn!(
                root = subgraph.id(0),
                iterations = eigen.iterations,
                delta = eigen.delta,
                "eigenvector iteration did not converge; returning last iterate"
            );
            warnings.push(ComputationWarning::EigenvectorNotConverged {
                iterations: eigen.iterations,
                delta: eigen.delta,
            });
        } else {
            debug!(iterations = eigen.iterations, "eigenvector converged");
        }

        let node_metrics = (0..n)
            .map(|v| NodeMetrics {
                node_id: subgraph.id(v).to_string(),
                weight: subgraph.weight(v),
                subgraph_weight: weights.get(v),
                degree: degrees.total_degree[v],
                betweenness: paths.betweenness[v],
                closeness: paths.closeness[v],
                eigenvector: eigen.vector[v],
                clustering_coefficient: clustering[v],
            })
            .collect();

        let network = NetworkMetrics {
            average_degree: mean(degrees.total_degree.iter().map(|&d| d as f64), n),
            density: if n > 1 {
                subgraph.edge_count() as f64 / (n * (n - 1)) as f64
            } else {
                0.0
            },
            average_clustering: mean(clustering.iter().copied(), n),
            average_shortest_path: paths.average_path_length,
        };

        MetricsReport {
            node_metrics,
            network,
            eigenvector_approximate: !eigen.converged,
            warnings,
        }
    }
}

fn mean(values: impl Iterator<Item = f64>, n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    values.sum::<f64>() / n as f64
}

/// Sorted, deduplicated neighbor lists of the undirected projection, without
/// self-loops.
fn undirected_neighbors(subgraph: &Subgraph<'_>) -> Vec<Vec<usize>> {
    let mut neighbors = vec![Vec::new(); subgraph.len()];
    for &(source, target) in subgraph.edges() {
        if source != target {
            neighbors[source].push(target);
            neighbors[target].push(source);
        }
    }
    for list in &mut neighbors {
        list.sort_unstable();
        list.dedup();
    }
    neighbors
}

fn local_clustering(neighbors: &[Vec<usize>], v: usize) -> f64 {
    let around = &neighbors[v];
    let k = around.len();
    if k < 2 {
        return 0.0;
    }
    let mut links = 0usize;
    for (i, &a) in around.iter().enumerate() {
        for &b in &around[i + 1..] {
            if neighbors[a].binary_search(&b).is_ok() {
                links += 1;
            }
        }
    }
    links as f64 / (k * (k - 1) / 2) as f64
}

struct PathStats {
    betweenness: Vec<f64>,
    closeness: Vec<f64>,
    average_path_length: Option<f64>,
}

/// One unweighted BFS per source yields both closeness and Brandes
/// dependency accumulation for betweenness.
fn shortest_paths(subgraph: &Subgraph<'_>) -> PathStats {
    let n = subgraph.len();
    let mut betweenness = vec![0.0; n];
    let mut closeness = vec![0.0; n];
    let mut strongly_connected = true;
    let mut total_distance = 0usize;

    let mut order = Vec::with_capacity(n);
    let mut predecessors: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut sigma = vec![0.0f64; n];
    let mut distance: Vec<Option<usize>> = vec![None; n];
    let mut delta = vec![0.0f64; n];
    let mut queue = VecDeque::with_capacity(n);

    for source in 0..n {
        order.clear();
        for list in &mut predecessors {
            list.clear();
        }
        sigma.fill(0.0);
        distance.fill(None);
        delta.fill(0.0);

        sigma[source] = 1.0;
        distance[source] = Some(0);
        queue.push_back(source);

        let mut reached = 0usize;
        let mut distance_sum = 0usize;
        while let Some(v) = queue.pop_front() {
            order.push(v);
            let dv = distance[v].unwrap_or(0);
            reached += 1;
            distance_sum += dv;
            for &w in subgraph.successors(v) {
                if distance[w].is_none() {
                    distance[w] = Some(dv + 1);
                    queue.push_back(w);
                }
                if distance[w] == Some(dv + 1) {
                    sigma[w] += sigma[v];
                    predecessors[w].push(v);
                }
            }
        }

        closeness[source] = if distance_sum > 0 {
            (reached - 1) as f64 / distance_sum as f64
        } else {
            0.0
        };
        strongly_connected &= reached == n;
        total_distance += distance_sum;

        while let Some(w) = order.pop() {
            for &v in &predecessors[w] {
                delta[v] += sigma[v] / sigma[w] * (1.0 + delta[w]);
            }
            if w != source {
                betweenness[w] += delta[w];
            }
        }
    }

    if n > 2 {
        let scale = 1.0 / ((n - 1) * (n - 2)) as f64;
        for value in &mut betweenness {
            *value *= scale;
        }
    }

    let average_path_length = (strongly_connected && n >= 2)
        .then(|| total_distance as f64 / (n * (n - 1)) as f64);

    PathStats {
        betweenness,
        closeness,
        average_path_length,
    }
}

struct Eigenvector {
    vector: Vec<f64>,
    converged: bool,
    iterations: usize,
    delta: f64,
}

/// Power iteration on `A + I` of the undirected projection. The shift keeps
/// the principal eigenvector of `A` and avoids oscillation on bipartite
/// graphs such as trees.
fn power_iteration(neighbors: &[Vec<usize>], tolerance: f64, max_iterations: usize) -> Eigenvector {
    let n = neighbors.len();
    if n == 0 {
        return Eigenvector {
            vector: Vec::new(),
            converged: true,
            iterations: 0,
            delta: 0.0,
        };
    }

    let mut current = vec![1.0 / (n as f64).sqrt(); n];
    let mut next = vec![0.0; n];
    let mut delta = f64::INFINITY;
    let mut iterations = 0;

    while iterations < max_iterations {
        iterations += 1;
        for v in 0..n {
            next[v] = current[v] + neighbors[v].iter().map(|&u| current[u]).sum::<f64>();
        }
        let norm = next.iter().map(|x| x * x).sum::<f64>().sqrt();
        if norm > 0.0 {
            for x in &mut next {
                *x /= norm;
            }
        }
        delta = current
            .iter()
            .zip(&next)
            .map(|(a, b)| (a - b) * (a - b))
            .sum::<f64>()
            .sqrt();
        std::mem::swap(&mut current, &mut next);
        if delta < tolerance {
            return Eigenvector {
                vector: current,
                converged: true,
                iterations,
                delta,
            };
        }
    }

    Eigenvector {
        vector: current,
        converged: false,
        iterations,
        delta,
    }
}
