//! Tree/graph builder: the compartment tree as a petgraph digraph.
//!
//! Nodes are [`CompartmentId`]s added in index order, so `NodeIndex::index()`
//! equals `CompartmentId::index()`. Edges keep the axial table's orientation
//! and carry the signed current of one time step. Edge indices follow the
//! axial table's row order.
//!
//! Compartments without any edge are allowed (they simply stay isolated);
//! a cycle is a structural defect and is rejected.

pub mod order;

use petgraph::algo::astar;
use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex, UnGraph};
use petgraph::unionfind::UnionFind;
use petgraph::visit::EdgeRef;

use crate::compartment::{CompartmentId, CompartmentIndex};
use crate::error::{CurrentscapeResult, TableError, TopologyError};
use crate::table::AxialTable;

/// Directed compartment graph with the axial currents of one time step.
#[derive(Debug, Clone)]
pub struct FlowGraph {
    graph: DiGraph<CompartmentId, f64>,
    compartments: CompartmentIndex,
}

impl FlowGraph {
    /// Build the graph for `step` of `axial`.
    ///
    /// Every edge endpoint must be present in `compartments`.
    pub fn at_step(
        axial: &AxialTable,
        compartments: &CompartmentIndex,
        step: usize,
    ) -> CurrentscapeResult<Self> {
        if !axial.is_empty() && step >= axial.n_steps() {
            return Err(TableError::StepOutOfRange {
                step,
                n_steps: axial.n_steps(),
            }
            .into());
        }

        let mut graph = DiGraph::with_capacity(compartments.len(), axial.len());
        for (id, _) in compartments.iter() {
            graph.add_node(id);
        }

        let mut components = UnionFind::<usize>::new(compartments.len());
        for (origin, destination, values) in axial.edges() {
            let lookup = |name: &str| {
                compartments
                    .get(name)
                    .ok_or_else(|| TopologyError::UnknownCompartment {
                        origin: origin.to_string(),
                        destination: destination.to_string(),
                        compartment: name.to_string(),
                    })
            };
            let o = lookup(origin)?;
            let d = lookup(destination)?;
            if !components.union(o.index(), d.index()) {
                return Err(TopologyError::Cycle {
                    origin: origin.to_string(),
                    destination: destination.to_string(),
                }
                .into());
            }
            graph.add_edge(
                NodeIndex::new(o.index()),
                NodeIndex::new(d.index()),
                values[step],
            );
        }

        Ok(Self {
            graph,
            compartments: compartments.clone(),
        })
    }

    /// The underlying petgraph digraph.
    pub fn graph(&self) -> &DiGraph<CompartmentId, f64> {
        &self.graph
    }

    pub fn compartments(&self) -> &CompartmentIndex {
        &self.compartments
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Signed current on the directed edge `origin → destination`, if present.
    pub fn current(&self, origin: CompartmentId, destination: CompartmentId) -> Option<f64> {
        self.graph
            .find_edge(NodeIndex::new(origin.index()), NodeIndex::new(destination.index()))
            .map(|e| self.graph[e])
    }

    /// Endpoints of every edge, in edge-index order.
    pub fn edges(&self) -> impl Iterator<Item = (EdgeIndex, CompartmentId, CompartmentId, f64)> + '_ {
        self.graph.edge_references().map(|e| {
            (
                e.id(),
                self.graph[e.source()],
                self.graph[e.target()],
                *e.weight(),
            )
        })
    }

    /// Compartments on the path `from → to`, ignoring edge direction.
    ///
    /// Returns `None` when the two lie in different trees.
    pub fn shortest_path(&self, from: CompartmentId, to: CompartmentId) -> Option<Vec<CompartmentId>> {
        let undirected: UnGraph<CompartmentId, f64> = self.graph.clone().into_edge_type();
        let goal = NodeIndex::new(to.index());
        astar(
            &undirected,
            NodeIndex::new(from.index()),
            |n| n == goal,
            |_| 1usize,
            |_| 0usize,
        )
        .map(|(_, path)| path.into_iter().map(|n| undirected[n]).collect())
    }
}
