//! Partitioning order: which edges to apportion, and when.
//!
//! The tree is rooted at the target. An edge may only be apportioned once its
//! origin has received everything flowing into it from further away, so edges
//! are visited by decreasing depth of their origin: leaves first, target last.
//! Siblings never interact within a pass, so ties are broken by edge index to
//! keep runs reproducible.
//!
//! The topology is resolved once per analysis; [`PartitionOrder::pass`] then
//! yields the ordered edge list for a single time step and pass.

use std::collections::VecDeque;

use petgraph::graph::NodeIndex;

use super::FlowGraph;
use crate::apportion::Sign;
use crate::compartment::CompartmentId;
use crate::error::TopologyError;

/// The two apportionment passes run for every time step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pass {
    /// Positive axial currents into the positive pool.
    Outward,
    /// Negative axial currents into the negative pool.
    Inward,
}

impl Pass {
    pub const ALL: [Pass; 2] = [Pass::Outward, Pass::Inward];

    /// Sign of the pool this pass writes to.
    pub fn sign(self) -> Sign {
        match self {
            Pass::Outward => Sign::Positive,
            Pass::Inward => Sign::Negative,
        }
    }
}

/// An edge of the tree rooted at the target, pointing toward the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeEdge {
    /// Index of the edge in the [`FlowGraph`] (axial table row order).
    pub edge: usize,
    pub origin: CompartmentId,
    pub destination: CompartmentId,
    /// Hop distance of `origin` from the target.
    pub depth: usize,
}

/// Edges of the tree component containing the target, leaves first.
#[derive(Debug, Clone)]
pub struct PartitionOrder {
    target: CompartmentId,
    edges: Vec<TreeEdge>,
    detached: usize,
}

impl PartitionOrder {
    /// Root the graph at `target` and sort its edges for apportionment.
    ///
    /// Every edge connected to the target must point toward it; edges in
    /// other components are counted in [`Self::detached`] and skipped.
    pub fn resolve(graph: &FlowGraph, target: CompartmentId) -> Result<Self, TopologyError> {
        let g = graph.graph();
        let mut depth: Vec<Option<usize>> = vec![None; g.node_count()];
        let mut queue = VecDeque::new();
        depth[target.index()] = Some(0);
        queue.push_back(NodeIndex::new(target.index()));

        while let Some(node) = queue.pop_front() {
            let d = depth[node.index()].unwrap_or(0);
            for next in g.neighbors_undirected(node) {
                if depth[next.index()].is_none() {
                    depth[next.index()] = Some(d + 1);
                    queue.push_back(next);
                }
            }
        }

        let mut edges = Vec::with_capacity(graph.edge_count());
        let mut detached = 0;
        for (idx, origin, destination, _) in graph.edges() {
            match (depth[origin.index()], depth[destination.index()]) {
                (Some(o), Some(d)) if o > d => edges.push(TreeEdge {
                    edge: idx.index(),
                    origin,
                    destination,
                    depth: o,
                }),
                (Some(_), Some(_)) => {
                    let names = graph.compartments();
                    return Err(TopologyError::EdgeAwayFromTarget {
                        origin: names.name(origin).to_string(),
                        destination: names.name(destination).to_string(),
                        target: names.name(target).to_string(),
                    });
                }
                _ => detached += 1,
            }
        }
        edges.sort_by(|a, b| b.depth.cmp(&a.depth).then(a.edge.cmp(&b.edge)));

        Ok(Self {
            target,
            edges,
            detached,
        })
    }

    pub fn target(&self) -> CompartmentId {
        self.target
    }

    /// All tree edges, leaves first.
    pub fn edges(&self) -> &[TreeEdge] {
        &self.edges
    }

    /// Number of edges not connected to the target.
    pub fn detached(&self) -> usize {
        self.detached
    }

    /// Ordered edges for one pass at one time step, paired with their current.
    ///
    /// `currents[e]` is the axial current of graph edge `e` at the step.
    /// Edges whose current does not match the pass sign are left out.
    pub fn pass<'a>(
        &'a self,
        pass: Pass,
        currents: &'a [f64],
    ) -> impl Iterator<Item = (&'a TreeEdge, f64)> + 'a {
        let sign = pass.sign();
        self.edges.iter().filter_map(move |e| {
            let current = currents[e.edge];
            sign.admits(current).then_some((e, current))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compartment::CompartmentIndex;
    use crate::table::AxialTable;

    fn tree() -> (FlowGraph, CompartmentIndex) {
        //        soma
        //       /    \
        //   dend1    axon
        //     |
        //   dend2
        let mut axial = AxialTable::new(1);
        axial.insert("axon", "soma", vec![-1.0]).unwrap();
        axial.insert("dend1", "soma", vec![2.0]).unwrap();
        axial.insert("dend2", "dend1", vec![3.0]).unwrap();
        let index = CompartmentIndex::from_names(["soma", "dend1", "dend2", "axon", "lonely"]);
        let graph = FlowGraph::at_step(&axial, &index, 0).unwrap();
        (graph, index)
    }

    #[test]
    fn children_come_before_parents() {
        let (graph, index) = tree();
        let order = PartitionOrder::resolve(&graph, index.get("soma").unwrap()).unwrap();
        let names: Vec<_> = order
            .edges()
            .iter()
            .map(|e| (index.name(e.origin), index.name(e.destination)))
            .collect();
        assert_eq!(names[0], ("dend2", "dend1"));
        assert_eq!(names.len(), 3);
        let pos = |pair| names.iter().position(|n| *n == pair).unwrap();
        assert!(pos(("dend2", "dend1")) < pos(("dend1", "soma")));
        assert_eq!(order.detached(), 0);
    }

    #[test]
    fn passes_filter_by_sign() {
        let (graph, index) = tree();
        let order = PartitionOrder::resolve(&graph, index.get("soma").unwrap()).unwrap();
        // edge indices follow table order: axon→soma, dend1→soma, dend2→dend1
        let currents = [-1.0, 2.0, 3.0];
        let outward: Vec<_> = order.pass(Pass::Outward, &currents).map(|(e, c)| (e.edge, c)).collect();
        assert_eq!(outward, vec![(2, 3.0), (1, 2.0)]);
        let inward: Vec<_> = order.pass(Pass::Inward, &currents).map(|(e, c)| (e.edge, c)).collect();
        assert_eq!(inward, vec![(0, -1.0)]);

        let zeros = [0.0; 3];
        assert_eq!(order.pass(Pass::Outward, &zeros).count(), 0);
        assert_eq!(order.pass(Pass::Inward, &zeros).count(), 0);
    }

    #[test]
    fn edge_pointing_away_from_target_is_rejected() {
        let (graph, index) = tree();
        let err = PartitionOrder::resolve(&graph, index.get("dend1").unwrap()).unwrap_err();
        assert!(matches!(err, TopologyError::EdgeAwayFromTarget { .. }));
    }

    #[test]
    fn other_components_are_detached() {
        let mut axial = AxialTable::new(1);
        axial.insert("b", "a", vec![1.0]).unwrap();
        axial.insert("d", "c", vec![1.0]).unwrap();
        let index = CompartmentIndex::from_names(["a", "b", "c", "d"]);
        let graph = FlowGraph::at_step(&axial, &index, 0).unwrap();
        let order = PartitionOrder::resolve(&graph, index.get("a").unwrap()).unwrap();
        assert_eq!(order.edges().len(), 1);
        assert_eq!(order.detached(), 1);
    }
}
