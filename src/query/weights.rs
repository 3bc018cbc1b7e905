//! Subgraph weights: a vertex's own weight plus the path sums of everything it reaches.

use std::collections::HashMap;

use rustc_hash::FxHashSet;
use tracing::warn;

use crate::error::{ComputationWarning, GraphError, Result};
use crate::model::NodeIdx;
use crate::query::traversal::Subgraph;
use crate::store::SnapshotGraph;

/// A set of weighted nodes with directed child lists, addressed by dense
/// position. Implemented by full snapshot graphs and extracted subgraphs.
pub trait WeightScope {
    /// Number of nodes in scope.
    fn node_count(&self) -> usize;
    /// Own weight of `node`.
    fn own_weight(&self, node: usize) -> f64;
    /// Number of direct children of `node` within scope.
    fn child_count(&self, node: usize) -> usize;
    /// The `nth` child of `node`.
    fn child(&self, node: usize, nth: usize) -> usize;
    /// External id of `node`.
    fn node_id(&self, node: usize) -> &str;
    /// Position of an external id, if in scope.
    fn locate(&self, id: &str) -> Option<usize>;
}

impl WeightScope for SnapshotGraph {
    fn node_count(&self) -> usize {
        SnapshotGraph::node_count(self)
    }

    fn own_weight(&self, node: usize) -> f64 {
        self.weight(NodeIdx(node as u32))
    }

    fn child_count(&self, node: usize) -> usize {
        self.successors(NodeIdx(node as u32)).len()
    }

    fn child(&self, node: usize, nth: usize) -> usize {
        self.successors(NodeIdx(node as u32))[nth].index()
    }

    fn node_id(&self, node: usize) -> &str {
        self.id(NodeIdx(node as u32))
    }

    fn locate(&self, id: &str) -> Option<usize> {
        self.index_of(id).map(NodeIdx::index)
    }
}

impl WeightScope for Subgraph<'_> {
    fn node_count(&self) -> usize {
        self.len()
    }

    fn own_weight(&self, node: usize) -> f64 {
        self.weight(node)
    }

    fn child_count(&self, node: usize) -> usize {
        self.successors(node).len()
    }

    fn child(&self, node: usize, nth: usize) -> usize {
        self.successors(node)[nth]
    }

    fn node_id(&self, node: usize) -> &str {
        self.id(node)
    }

    fn locate(&self, id: &str) -> Option<usize> {
        self.graph().index_of(id).and_then(|node| self.local_of(node))
    }
}

/// Subgraph weight of every node in a scope.
#[derive(Debug, Clone, PartialEq)]
pub struct SubgraphWeights {
    ids: Vec<String>,
    weights: Vec<f64>,
    warnings: Vec<ComputationWarning>,
}

impl SubgraphWeights {
    /// Weight at scope position `node`.
    pub fn get(&self, node: usize) -> f64 {
        self.weights[node]
    }

    /// Weight of an external id.
    pub fn weight_of(&self, id: &str) -> Option<f64> {
        self.ids
            .iter()
            .position(|candidate| candidate == id)
            .map(|node| self.weights[node])
    }

    /// Weights in scope order.
    pub fn as_slice(&self) -> &[f64] {
        &self.weights
    }

    /// `(id, subgraph weight)` pairs in scope order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.ids
            .iter()
            .map(String::as_str)
            .zip(self.weights.iter().copied())
    }

    /// Mapping from external id to subgraph weight.
    pub fn to_map(&self) -> HashMap<String, f64> {
        self.iter().map(|(id, w)| (id.to_string(), w)).collect()
    }

    /// Cycle warnings raised while aggregating.
    pub fn warnings(&self) -> &[ComputationWarning] {
        &self.warnings
    }
}

/// Computes `own_weight(n) + Σ subgraph_weight(child)` over a scope.
///
/// Cycles: a child already on the current path contributes zero and a
/// [`ComputationWarning::CycleDetected`] is logged. Traversal uses an explicit
/// stack, so deep chains do not exhaust the thread stack.
#[derive(Debug, Clone, Copy, Default)]
pub struct WeightAggregator;

impl WeightAggregator {
    /// Subgraph weight of a single node.
    ///
    /// # Errors
    /// [`GraphError::NotFound`] when `node_id` is not in scope.
    pub fn subgraph_weight<S: WeightScope + ?Sized>(scope: &S, node_id: &str) -> Result<f64> {
        let start = scope
            .locate(node_id)
            .ok_or_else(|| GraphError::node_not_found(node_id))?;
        let mut walker = Walker::new(scope);
        Ok(walker.weigh(start))
    }

    /// Subgraph weights of every node in one pass.
    ///
    /// Acyclic parts are resolved bottom-up in reverse topological order;
    /// nodes that reach a cycle fall back to the path-guarded walk.
    pub fn subgraph_weights<S: WeightScope + ?Sized>(scope: &S) -> SubgraphWeights {
        let n = scope.node_count();
        let mut walker = Walker::new(scope);

        let mut parents: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut pending: Vec<usize> = Vec::with_capacity(n);
        for node in 0..n {
            let children = scope.child_count(node);
            pending.push(children);
            for nth in 0..children {
                parents[scope.child(node, nth)].push(node);
            }
        }

        let mut ready: Vec<usize> = (0..n).filter(|&node| pending[node] == 0).collect();
        while let Some(node) = ready.pop() {
            let mut acc = 0.0;
            for nth in 0..scope.child_count(node) {
                acc += walker.memo[scope.child(node, nth)].unwrap_or(0.0);
            }
            walker.memo[node] = Some(scope.own_weight(node) + acc);
            for &parent in &parents[node] {
                pending[parent] -= 1;
                if pending[parent] == 0 {
                    ready.push(parent);
                }
            }
        }

        let weights = (0..n).map(|node| walker.weigh(node)).collect();
        SubgraphWeights {
            ids: (0..n).map(|node| scope.node_id(node).to_string()).collect(),
            weights,
            warnings: walker.warnings,
        }
    }
}

struct Frame {
    node: usize,
    next: usize,
    acc: f64,
}

/// Path-guarded depth-first summation.
///
/// A node's value depends on the current path only through nodes of its own
/// strongly connected component. Entered from another component (or as the
/// start), it is path independent, so `memo` holds exactly those values and
/// they are reused only across component boundaries.
struct Walker<'s, S: ?Sized> {
    scope: &'s S,
    component: Vec<usize>,
    memo: Vec<Option<f64>>,
    on_path: Vec<bool>,
    cyclic: FxHashSet<usize>,
    warnings: Vec<ComputationWarning>,
}

impl<'s, S: WeightScope + ?Sized> Walker<'s, S> {
    fn new(scope: &'s S) -> Self {
        let n = scope.node_count();
        Self {
            scope,
            component: components(scope),
            memo: vec![None; n],
            on_path: vec![false; n],
            cyclic: FxHashSet::default(),
            warnings: Vec::new(),
        }
    }

    fn weigh(&mut self, start: usize) -> f64 {
        if let Some(done) = self.memo[start] {
            return done;
        }

        let mut stack = vec![Frame {
            node: start,
            next: 0,
            acc: 0.0,
        }];
        self.on_path[start] = true;
        let mut result = 0.0;

        while let Some(frame) = stack.last_mut() {
            if frame.next < self.scope.child_count(frame.node) {
                let child = self.scope.child(frame.node, frame.next);
                frame.next += 1;
                let crosses = self.component[child] != self.component[frame.node];
                if self.on_path[child] {
                    self.note_cycle(child);
                } else if let Some(done) = self.memo[child].filter(|_| crosses) {
                    frame.acc += done;
                } else {
                    self.on_path[child] = true;
                    stack.push(Frame {
                        node: child,
                        next: 0,
                        acc: 0.0,
                    });
                }
                continue;
            }

            let Some(finished) = stack.pop() else { break };
            self.on_path[finished.node] = false;
            let value = self.scope.own_weight(finished.node) + finished.acc;
            match stack.last_mut() {
                Some(parent) => {
                    if self.component[parent.node] != self.component[finished.node] {
                        self.memo[finished.node] = Some(value);
                    }
                    parent.acc += value;
                }
                None => {
                    self.memo[finished.node] = Some(value);
                    result = value;
                }
            }
        }
        result
    }

    fn note_cycle(&mut self, node: usize) {
        if self.cyclic.insert(node) {
            let id = self.scope.node_id(node).to_string();
            warn!(node = %id, "cycle during weight aggregation; revisit contributes zero");
            self.warnings
                .push(ComputationWarning::CycleDetected { node: id });
        }
    }
}

/// Strongly connected component id of every node (iterative Tarjan).
fn components<S: WeightScope + ?Sized>(scope: &S) -> Vec<usize> {
    const UNVISITED: usize = usize::MAX;
    let n = scope.node_count();
    let mut index = vec![UNVISITED; n];
    let mut low = vec![0; n];
    let mut on_stack = vec![false; n];
    let mut component = vec![UNVISITED; n];
    let mut stack = Vec::new();
    let mut work: Vec<(usize, usize)> = Vec::new();
    let mut next_index = 0;
    let mut next_component = 0;

    for root in 0..n {
        if index[root] != UNVISITED {
            continue;
        }
        index[root] = next_index;
        low[root] = next_index;
        next_index += 1;
        stack.push(root);
        on_stack[root] = true;
        work.push((root, 0));

        while let Some(top) = work.last_mut() {
            let node = top.0;
            if top.1 < scope.child_count(node) {
                let child = scope.child(node, top.1);
                top.1 += 1;
                if index[child] == UNVISITED {
                    index[child] = next_index;
                    low[child] = next_index;
                    next_index += 1;
                    stack.push(child);
                    on_stack[child] = true;
                    work.push((child, 0));
                } else if on_stack[child] {
                    low[node] = low[node].min(index[child]);
                }
                continue;
            }

            work.pop();
            if let Some(&(parent, _)) = work.last() {
                low[parent] = low[parent].min(low[node]);
            }
            if low[node] == index[node] {
                while let Some(member) = stack.pop() {
                    on_stack[member] = false;
                    component[member] = next_component;
                    if member == node {
                        break;
                    }
                }
                next_component += 1;
            }
        }
    }
    component
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EdgeRecord, VertexRecord};
    use crate::store::SnapshotGraphStore;
    use std::sync::Arc;

    fn graph(vertices: &[(&str, f64)], edges: &[(&str, &str)]) -> Arc<SnapshotGraph> {
        let mut store = SnapshotGraphStore::new();
        store
            .ingest(
                vertices
                    .iter()
                    .map(|(id, w)| VertexRecord::new(*id, *w, "s"))
                    .collect(),
                edges
                    .iter()
                    .map(|(a, b)| EdgeRecord::new(*a, *b, "s"))
                    .collect(),
            )
            .unwrap();
        store.graph_for("s").unwrap()
    }

    #[test]
    fn chain_sums_descendants() {
        let g = graph(
            &[("A", 10.0), ("B", 5.0), ("C", 3.0)],
            &[("A", "B"), ("B", "C")],
        );
        assert_eq!(WeightAggregator::subgraph_weight(&*g, "A").unwrap(), 18.0);
        assert_eq!(WeightAggregator::subgraph_weight(&*g, "B").unwrap(), 8.0);
        assert_eq!(WeightAggregator::subgraph_weight(&*g, "C").unwrap(), 3.0);
        let all = WeightAggregator::subgraph_weights(&*g);
        assert_eq!(all.as_slice(), &[18.0, 8.0, 3.0]);
        assert!(all.warnings().is_empty());
    }

    #[test]
    fn cycle_contributes_zero_on_revisit() {
        let g = graph(
            &[("A", 1.0), ("B", 2.0), ("C", 4.0)],
            &[("A", "B"), ("B", "C"), ("C", "A")],
        );
        // A -> B -> C -> (A on path: 0)
        assert_eq!(WeightAggregator::subgraph_weight(&*g, "A").unwrap(), 7.0);
        let all = WeightAggregator::subgraph_weights(&*g);
        assert_eq!(all.as_slice(), &[7.0, 7.0, 7.0]);
        let cycled: Vec<_> = all
            .warnings()
            .iter()
            .map(|w| match w {
                ComputationWarning::CycleDetected { node } => node.as_str(),
                other => panic!("unexpected warning {other:?}"),
            })
            .collect();
        assert_eq!(cycled, ["A", "B", "C"]);
    }

    #[test]
    fn self_loop_is_guarded() {
        let g = graph(&[("A", 2.0), ("B", 3.0)], &[("A", "A"), ("A", "B")]);
        let all = WeightAggregator::subgraph_weights(&*g);
        assert_eq!(all.weight_of("A"), Some(5.0));
        assert_eq!(all.weight_of("B"), Some(3.0));
        assert_eq!(all.warnings().len(), 1);
    }

    #[test]
    fn deep_chain_does_not_overflow() {
        let n = 200_000;
        let ids: Vec<String> = (0..n).map(|i| format!("n{i}")).collect();
        let vertices: Vec<(&str, f64)> = ids.iter().map(|id| (id.as_str(), 1.0)).collect();
        let edges: Vec<(&str, &str)> = ids
            .windows(2)
            .map(|pair| (pair[0].as_str(), pair[1].as_str()))
            .collect();
        let g = graph(&vertices, &edges);
        assert_eq!(
            WeightAggregator::subgraph_weight(&*g, "n0").unwrap(),
            n as f64
        );
    }

    /// Two nodes per level with all four edges between consecutive levels,
    /// ending in a sink. Path count doubles per level.
    struct Ladder {
        levels: usize,
        sink_loop: bool,
        child_calls: std::cell::Cell<usize>,
        budget: usize,
    }

    impl Ladder {
        fn new(levels: usize, sink_loop: bool) -> Self {
            Self {
                levels,
                sink_loop,
                child_calls: std::cell::Cell::new(0),
                budget: 100 * levels,
            }
        }

        fn sink(&self) -> usize {
            2 * self.levels
        }

        fn children(&self, node: usize) -> Vec<usize> {
            if node == self.sink() {
                return if self.sink_loop { vec![node] } else { Vec::new() };
            }
            let level = node / 2;
            if level + 1 == self.levels {
                vec![self.sink()]
            } else {
                vec![2 * (level + 1), 2 * (level + 1) + 1]
            }
        }
    }

    impl WeightScope for Ladder {
        fn node_count(&self) -> usize {
            2 * self.levels + 1
        }

        fn own_weight(&self, _node: usize) -> f64 {
            1.0
        }

        fn child_count(&self, node: usize) -> usize {
            self.children(node).len()
        }

        fn child(&self, node: usize, nth: usize) -> usize {
            let calls = self.child_calls.get() + 1;
            assert!(calls <= self.budget, "edge visits exceeded {}", self.budget);
            self.child_calls.set(calls);
            self.children(node)[nth]
        }

        fn node_id(&self, node: usize) -> &str {
            if node == self.sink() {
                "sink"
            } else {
                "rung"
            }
        }

        fn locate(&self, id: &str) -> Option<usize> {
            (id == "top").then_some(0)
        }
    }

    #[test]
    fn self_loop_below_a_ladder_stays_linear() {
        let ladder = Ladder::new(40, true);
        let weight = WeightAggregator::subgraph_weight(&ladder, "top").unwrap();
        // rung at depth k above the sink weighs 3 * 2^k - 1
        assert_eq!(weight, 3.0 * 2f64.powi(39) - 1.0);

        let plain = WeightAggregator::subgraph_weight(&Ladder::new(40, false), "top").unwrap();
        assert_eq!(weight, plain);

        let all = WeightAggregator::subgraph_weights(&Ladder::new(40, true));
        assert_eq!(all.get(0), weight);
        assert_eq!(all.warnings().len(), 1);
    }

    #[test]
    fn members_of_one_cycle_are_weighed_from_their_own_entry() {
        // A -> B -> C -> B: C entered via B sees B on the path,
        // C as a start walks C -> B -> (C on path).
        let g = graph(
            &[("A", 1.0), ("B", 2.0), ("C", 4.0)],
            &[("A", "B"), ("B", "C"), ("C", "B")],
        );
        assert_eq!(WeightAggregator::subgraph_weight(&*g, "A").unwrap(), 7.0);
        let all = WeightAggregator::subgraph_weights(&*g);
        assert_eq!(all.as_slice(), &[7.0, 6.0, 6.0]);
        for (id, weight) in all.iter() {
            assert_eq!(WeightAggregator::subgraph_weight(&*g, id).unwrap(), weight);
        }
    }

    #[test]
    fn unknown_node_is_not_found() {
        let g = graph(&[("A", 1.0)], &[]);
        assert!(WeightAggregator::subgraph_weight(&*g, "B")
            .unwrap_err()
            .is_not_found());
    }
}
