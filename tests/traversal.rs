#![allow(clippy::needless_range_loop)]

use std::collections::HashSet;
use std::sync::Arc;

use tempograph::{EdgeRecord, Result, SnapshotGraph, SnapshotGraphStore, SubgraphExtractor, VertexRecord};

const SNAPSHOT: &str = "2024-01-01";

fn build(vertices: &[&str], edges: &[(&str, &str)]) -> Arc<SnapshotGraph> {
    let mut store = SnapshotGraphStore::new();
    store
        .ingest(
            vertices
                .iter()
                .map(|id| VertexRecord::new(*id, 1.0, SNAPSHOT))
                .collect(),
            edges
                .iter()
                .map(|(a, b)| EdgeRecord::new(*a, *b, SNAPSHOT))
                .collect(),
        )
        .unwrap();
    store.graph_for(SNAPSHOT).unwrap()
}

fn setup_chain_graph(length: usize) -> (Arc<SnapshotGraph>, Vec<String>) {
    let ids: Vec<String> = (0..length).map(|i| format!("n{i}")).collect();
    let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
    let edges: Vec<(&str, &str)> = refs.windows(2).map(|w| (w[0], w[1])).collect();
    (build(&refs, &edges), ids)
}

fn ids_of(sub: &tempograph::Subgraph<'_>) -> HashSet<String> {
    (0..sub.len()).map(|i| sub.id(i).to_string()).collect()
}

#[test]
fn depth_zero_is_root_only() -> Result<()> {
    let (graph, ids) = setup_chain_graph(4);
    let sub = SubgraphExtractor::extract(&graph, &ids[0], 0)?;
    assert_eq!(sub.len(), 1);
    assert_eq!(sub.edge_count(), 0);
    assert_eq!(sub.depth_reached(), 0);
    assert_eq!(sub.id(0), "n0");
    Ok(())
}

#[test]
fn chain_is_cut_at_max_depth() -> Result<()> {
    let (graph, ids) = setup_chain_graph(10);
    let sub = SubgraphExtractor::extract(&graph, &ids[0], 3)?;
    assert_eq!(sub.len(), 4);
    assert_eq!(sub.edge_count(), 3);
    assert_eq!(sub.depth_reached(), 3);
    for local in 0..sub.len() {
        assert_eq!(sub.depth(local), local);
    }
    Ok(())
}

#[test]
fn depth_reached_stops_at_eccentricity() -> Result<()> {
    let (graph, ids) = setup_chain_graph(3);
    let sub = SubgraphExtractor::extract(&graph, &ids[0], 50)?;
    assert_eq!(sub.len(), 3);
    assert_eq!(sub.depth_reached(), 2);
    Ok(())
}

#[test]
fn diamond_keeps_both_paths_and_visits_once() -> Result<()> {
    let graph = build(
        &["A", "B", "C", "D"],
        &[("A", "B"), ("A", "C"), ("B", "D"), ("C", "D")],
    );
    let sub = SubgraphExtractor::extract(&graph, "A", 2)?;
    assert_eq!(sub.len(), 4);
    assert_eq!(sub.edge_count(), 4);
    assert_eq!(sub.depth(sub.local_of(graph.index_of("D").unwrap()).unwrap()), 2);
    Ok(())
}

#[test]
fn edges_out_of_frontier_are_excluded() -> Result<()> {
    // B and C are at depth 1; the cross edge B -> C leaves an expanded node
    // only when depth 1 is expanded.
    let graph = build(&["A", "B", "C"], &[("A", "B"), ("A", "C"), ("B", "C")]);
    let shallow = SubgraphExtractor::extract(&graph, "A", 1)?;
    assert_eq!(shallow.len(), 3);
    assert_eq!(shallow.edge_count(), 2);

    let deeper = SubgraphExtractor::extract(&graph, "A", 2)?;
    assert_eq!(deeper.edge_count(), 3);
    Ok(())
}

#[test]
fn cycles_terminate_and_keep_back_edges() -> Result<()> {
    let graph = build(&["A", "B", "C"], &[("A", "B"), ("B", "C"), ("C", "A")]);
    let sub = SubgraphExtractor::extract(&graph, "A", 10)?;
    assert_eq!(sub.len(), 3);
    assert_eq!(sub.edge_count(), 3);
    assert_eq!(sub.depth_reached(), 2);
    Ok(())
}

#[test]
fn unreachable_nodes_are_not_included() -> Result<()> {
    let graph = build(&["A", "B", "Z"], &[("A", "B"), ("Z", "A")]);
    let sub = SubgraphExtractor::extract(&graph, "A", 5)?;
    assert_eq!(ids_of(&sub), HashSet::from(["A".to_string(), "B".to_string()]));
    assert!(!sub.contains_id("Z"));
    Ok(())
}

#[test]
fn unknown_root_is_not_found() {
    let (graph, _) = setup_chain_graph(2);
    let err = SubgraphExtractor::extract(&graph, "nope", 2).unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn full_reachable_metrics_ignore_depth() -> Result<()> {
    let (graph, ids) = setup_chain_graph(6);
    let summary = SubgraphExtractor::full_reachable_metrics(&graph, &ids[1])?;
    assert_eq!(summary.root_node, "n1");
    assert_eq!(summary.total_nodes, 5);
    assert_eq!(summary.total_edges, 4);
    assert_eq!(summary.max_depth, 4);
    Ok(())
}
