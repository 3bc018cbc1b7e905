use std::collections::HashSet;
use std::sync::Arc;

use proptest::prelude::*;
use tempograph::{
    EdgeRecord, GraphProcessor, SnapshotGraph, SnapshotGraphStore, SubgraphExtractor,
    SubgraphRequest, VertexRecord, WeightAggregator,
};

#[derive(Debug, Clone)]
struct GraphSpec {
    weights: Vec<f64>,
    edges: Vec<(usize, usize)>,
}

fn arb_graph() -> impl Strategy<Value = GraphSpec> {
    arb_graph_weighted(0.0)
}

fn arb_graph_weighted(min_weight: f64) -> impl Strategy<Value = GraphSpec> {
    (1usize..=10).prop_flat_map(move |n| {
        (
            prop::collection::vec(min_weight..100.0, n),
            prop::collection::vec((0..n, 0..n), 0..=n * 2),
        )
            .prop_map(|(weights, edges)| GraphSpec { weights, edges })
    })
}

fn records(spec: &GraphSpec) -> (Vec<VertexRecord>, Vec<EdgeRecord>) {
    let vertices = spec
        .weights
        .iter()
        .enumerate()
        .map(|(i, &w)| VertexRecord::new(format!("v{i}"), w, "s"))
        .collect();
    let edges = spec
        .edges
        .iter()
        .map(|&(a, b)| EdgeRecord::new(format!("v{a}"), format!("v{b}"), "s"))
        .collect();
    (vertices, edges)
}

fn build(spec: &GraphSpec) -> Arc<SnapshotGraph> {
    let (vertices, edges) = records(spec);
    let mut store = SnapshotGraphStore::new();
    store.ingest(vertices, edges).unwrap();
    store.graph_for("s").unwrap()
}

proptest! {
    #[test]
    fn prop_subgraph_weight_at_least_own_weight(spec in arb_graph()) {
        let graph = build(&spec);
        let all = WeightAggregator::subgraph_weights(&*graph);
        for (i, &own) in spec.weights.iter().enumerate() {
            let total = all.weight_of(&format!("v{i}")).unwrap();
            prop_assert!(total >= own, "v{} total {} < own {}", i, total, own);
        }
    }

    #[test]
    fn prop_positive_successors_add_weight(spec in arb_graph_weighted(0.5)) {
        let graph = build(&spec);
        let all = WeightAggregator::subgraph_weights(&*graph);
        for (i, &own) in spec.weights.iter().enumerate() {
            let total = all.weight_of(&format!("v{i}")).unwrap();
            let reaches_other = spec.edges.iter().any(|&(a, b)| a == i && b != i);
            if reaches_other {
                prop_assert!(total > own, "v{} total {} not above own {}", i, total, own);
            } else {
                prop_assert_eq!(total, own);
            }
        }
    }

    #[test]
    fn prop_batch_matches_single(spec in arb_graph()) {
        let graph = build(&spec);
        let all = WeightAggregator::subgraph_weights(&*graph);
        for (id, weight) in all.iter() {
            let single = WeightAggregator::subgraph_weight(&*graph, id).unwrap();
            prop_assert!((weight - single).abs() <= 1e-9 * single.abs().max(1.0));
        }
    }

    #[test]
    fn prop_deeper_extraction_is_superset(spec in arb_graph(), depth in 0usize..6) {
        let graph = build(&spec);
        let shallow = SubgraphExtractor::extract(&graph, "v0", depth).unwrap();
        let deep = SubgraphExtractor::extract(&graph, "v0", depth + 1).unwrap();
        let shallow_ids: HashSet<&str> = (0..shallow.len()).map(|i| shallow.id(i)).collect();
        let deep_ids: HashSet<&str> = (0..deep.len()).map(|i| deep.id(i)).collect();
        prop_assert!(shallow_ids.is_subset(&deep_ids));
        prop_assert!(shallow.depth_reached() <= depth);
        prop_assert!(shallow.edge_count() <= deep.edge_count());
        for local in 0..shallow.len() {
            prop_assert!(shallow.depth(local) <= depth);
        }
    }

    #[test]
    fn prop_requests_are_idempotent(spec in arb_graph(), depth in 0usize..5) {
        let processor = GraphProcessor::default();
        let (vertices, edges) = records(&spec);
        processor.ingest(vertices, edges).unwrap();
        let request = SubgraphRequest::new("s").root("v0").depth(depth);
        let first = processor.subgraph(&request).unwrap();
        processor.invalidate_cache();
        let second = processor.subgraph(&request).unwrap();
        prop_assert_eq!(&*first.value, &*second.value);
    }

    #[test]
    fn prop_metrics_are_bounded(spec in arb_graph()) {
        let processor = GraphProcessor::default();
        let (vertices, edges) = records(&spec);
        processor.ingest(vertices, edges).unwrap();
        let entry = processor
            .subgraph(&SubgraphRequest::new("s").root("v0").unbounded())
            .unwrap();
        let network = &entry.value.metrics.network_metrics;
        prop_assert!((0.0..=1.0).contains(&network.density));
        for m in &entry.value.metrics.node_metrics {
            prop_assert!((0.0..=1.0).contains(&m.clustering_coefficient));
            prop_assert!((0.0..=1.0 + 1e-9).contains(&m.betweenness));
            prop_assert!((0.0..=1.0).contains(&m.closeness));
            prop_assert!(m.eigenvector.is_finite());
        }
    }
}
