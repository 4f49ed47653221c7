//! Engine facade: top-level API for current partitioning.
//!
//! [`Engine::prepare`] runs the once-per-analysis work (rerooting, regrouping,
//! topology and order resolution) and returns an [`Analysis`]. The analysis
//! holds only read-only state, so [`Analysis::partition`] can fan time steps
//! out over the rayon pool: every step builds its own pools from the seeds and
//! touches nothing else.

use rayon::prelude::*;
use serde::Serialize;

use crate::apportion::{Outcome, PoolSeed, Sign, apportion};
use crate::classify::Partitioning;
use crate::compartment::{CompartmentId, CompartmentIndex};
use crate::error::{CurrentscapeResult, TableError, TopologyError};
use crate::reroot::{SectionBoundary, reroot};
use crate::table::{AxialTable, SourceTable};
use crate::topology::FlowGraph;
use crate::topology::order::{Pass, PartitionOrder};
use crate::window::StepSelection;

/// Configuration for the partitioning engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Compartment (or section) at which currents are decomposed.
    pub target: String,
    /// Anatomical root of the input tables. `None` infers it from the axial table.
    pub root: Option<String>,
    /// Process time steps on the rayon pool.
    pub parallel: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            target: "soma".into(),
            root: None,
            parallel: true,
        }
    }
}

/// Counters for one partitioning run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PartitionStats {
    /// Edges whose current was split into a pool.
    pub applied: usize,
    /// Edges skipped because their sign did not match the pass (or was zero).
    pub sign_mismatch: usize,
    /// Edges skipped because the origin's pool was empty.
    pub empty_origin: usize,
}

impl PartitionStats {
    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Applied => self.applied += 1,
            Outcome::SignMismatch => self.sign_mismatch += 1,
            Outcome::EmptyOrigin => self.empty_origin += 1,
        }
    }

    fn merge(mut self, other: PartitionStats) -> Self {
        self.applied += other.applied;
        self.sign_mismatch += other.sign_mismatch;
        self.empty_origin += other.empty_origin;
        self
    }
}

/// Decomposition of the target's membrane current over the requested steps.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartitionResult {
    pub target: String,
    /// Source-labels, sorted. Rows of `positive` and `negative` follow this order.
    pub labels: Vec<String>,
    /// Time-step indices, in request order. Columns follow this order.
    pub steps: Vec<usize>,
    /// `positive[label][i]`: outward current attributed to `label` at `steps[i]`.
    pub positive: Vec<Vec<f64>>,
    /// `negative[label][i]`: inward current attributed to `label` at `steps[i]`.
    pub negative: Vec<Vec<f64>>,
    pub stats: PartitionStats,
}

impl PartitionResult {
    /// All rows of one pool.
    pub fn pool(&self, sign: Sign) -> &[Vec<f64>] {
        match sign {
            Sign::Positive => &self.positive,
            Sign::Negative => &self.negative,
        }
    }

    /// The row of one label.
    pub fn row(&self, sign: Sign, label: &str) -> Option<&[f64]> {
        let i = self.labels.iter().position(|l| l == label)?;
        Some(&self.pool(sign)[i])
    }

    /// Sum over labels at each step.
    pub fn totals(&self, sign: Sign) -> Vec<f64> {
        let mut totals = vec![0.0; self.steps.len()];
        for row in self.pool(sign) {
            for (t, v) in totals.iter_mut().zip(row) {
                *t += v;
            }
        }
        totals
    }

    /// Each label's share of the step total; 0 where the total is 0.
    pub fn normalized(&self, sign: Sign) -> Vec<Vec<f64>> {
        let totals = self.totals(sign);
        self.pool(sign)
            .iter()
            .map(|row| {
                row.iter()
                    .zip(&totals)
                    .map(|(v, t)| if *t == 0.0 { 0.0 } else { v / t })
                    .collect()
            })
            .collect()
    }
}

/// The partitioning engine.
#[derive(Debug, Clone)]
pub struct Engine {
    config: EngineConfig,
    strategy: Partitioning,
}

impl Engine {
    /// Create an engine with a fixed labelling strategy.
    pub fn new(config: EngineConfig, strategy: Partitioning) -> CurrentscapeResult<Self> {
        if config.target.trim().is_empty() {
            return Err(TopologyError::TargetNotFound {
                target: config.target.clone(),
            }
            .into());
        }
        Ok(Self { config, strategy })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn strategy(&self) -> &Partitioning {
        &self.strategy
    }

    /// Reroot, regroup and resolve the traversal order.
    pub fn prepare(&self, sources: &SourceTable, axial: &AxialTable) -> CurrentscapeResult<Analysis> {
        if sources.is_empty() {
            return Err(TableError::Empty {
                what: "membrane current table".into(),
            }
            .into());
        }
        if sources.n_steps() == 0 {
            return Err(TableError::Empty {
                what: "time-step range".into(),
            }
            .into());
        }
        if !axial.is_empty() && axial.n_steps() != sources.n_steps() {
            return Err(TableError::StepCountMismatch {
                membrane: sources.n_steps(),
                axial: axial.n_steps(),
            }
            .into());
        }

        let target = self.config.target.as_str();
        let root = match &self.config.root {
            Some(root) => root.clone(),
            None if axial.is_empty() => target.to_string(),
            None => axial.infer_root()?,
        };
        let rerooted = reroot(sources, axial, target, &root)?;

        let positive = self.strategy.regroup_signed(&rerooted.sources, Sign::Positive)?;
        let negative = self.strategy.regroup_signed(&rerooted.sources, Sign::Negative)?;
        let labels: Vec<String> = positive.labels().into_iter().map(str::to_string).collect();

        let compartments = CompartmentIndex::from_names(rerooted.sources.compartments());
        let target_id = compartments
            .get(target)
            .ok_or_else(|| TopologyError::TargetNotFound {
                target: target.to_string(),
            })?;
        let graph = FlowGraph::at_step(&rerooted.axial, &compartments, 0)?;
        let order = PartitionOrder::resolve(&graph, target_id)?;
        if order.detached() > 0 {
            tracing::debug!(
                detached = order.detached(),
                "edges not connected to the target are ignored"
            );
        }

        // Edge-major, in graph edge order (the axial table's row order).
        let edge_currents: Vec<Vec<f64>> = rerooted
            .axial
            .edges()
            .map(|(_, _, values)| values.to_vec())
            .collect();

        let seeds = [
            PoolSeed::build(&positive, Sign::Positive, &compartments, &labels),
            PoolSeed::build(&negative, Sign::Negative, &compartments, &labels),
        ];

        tracing::info!(
            compartment = target,
            root = %root,
            rerooted = rerooted.boundary.is_some(),
            strategy = %self.strategy.kind(),
            compartments = compartments.len(),
            edges = order.edges().len(),
            labels = labels.len(),
            steps = sources.n_steps(),
            "analysis prepared"
        );

        Ok(Analysis {
            target: target.to_string(),
            target_id,
            compartments,
            labels,
            order,
            edge_currents,
            seeds,
            n_steps: sources.n_steps(),
            parallel: self.config.parallel,
            boundary: rerooted.boundary,
            reversed: rerooted.reversed,
        })
    }

    /// Prepare and partition in one call.
    pub fn run(
        &self,
        sources: &SourceTable,
        axial: &AxialTable,
        steps: &StepSelection,
    ) -> CurrentscapeResult<PartitionResult> {
        self.prepare(sources, axial)?.partition(steps)
    }
}

/// Pools of the target at one step.
#[derive(Debug, Clone)]
struct StepPartition {
    positive: Vec<f64>,
    negative: Vec<f64>,
    stats: PartitionStats,
}

/// A prepared analysis: rerooted topology, traversal order and pool seeds.
#[derive(Debug, Clone)]
pub struct Analysis {
    target: String,
    target_id: CompartmentId,
    compartments: CompartmentIndex,
    labels: Vec<String>,
    order: PartitionOrder,
    edge_currents: Vec<Vec<f64>>,
    seeds: [PoolSeed; 2],
    n_steps: usize,
    parallel: bool,
    boundary: Option<SectionBoundary>,
    reversed: Vec<(String, String)>,
}

impl Analysis {
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn n_steps(&self) -> usize {
        self.n_steps
    }

    pub fn compartments(&self) -> &CompartmentIndex {
        &self.compartments
    }

    pub fn order(&self) -> &PartitionOrder {
        &self.order
    }

    /// Boundary of the merged target section, if rerooting ran.
    pub fn boundary(&self) -> Option<&SectionBoundary> {
        self.boundary.as_ref()
    }

    /// Edges reversed while rerooting.
    pub fn reversed(&self) -> &[(String, String)] {
        &self.reversed
    }

    /// Override the parallel flag from the engine config.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Partition the selected steps.
    pub fn partition(&self, steps: &StepSelection) -> CurrentscapeResult<PartitionResult> {
        let steps = steps.resolve(self.n_steps)?;
        tracing::info!(steps = steps.len(), parallel = self.parallel, "partitioning");

        let per_step: Vec<StepPartition> = if self.parallel {
            steps.par_iter().map(|&s| self.partition_step(s)).collect()
        } else {
            steps.iter().map(|&s| self.partition_step(s)).collect()
        };

        let width = self.labels.len();
        let mut positive = vec![Vec::with_capacity(steps.len()); width];
        let mut negative = vec![Vec::with_capacity(steps.len()); width];
        let mut stats = PartitionStats::default();
        for step in &per_step {
            for l in 0..width {
                positive[l].push(step.positive[l]);
                negative[l].push(step.negative[l]);
            }
            stats = stats.merge(step.stats);
        }
        tracing::debug!(
            applied = stats.applied,
            sign_mismatch = stats.sign_mismatch,
            empty_origin = stats.empty_origin,
            "partitioning complete"
        );

        Ok(PartitionResult {
            target: self.target.clone(),
            labels: self.labels.clone(),
            steps,
            positive,
            negative,
            stats,
        })
    }

    /// Both passes for one step. `step` has been range-checked by the caller.
    fn partition_step(&self, step: usize) -> StepPartition {
        let currents: Vec<f64> = self.edge_currents.iter().map(|v| v[step]).collect();
        let ((positive, pos_stats), (negative, neg_stats)) = if self.parallel {
            rayon::join(
                || self.run_pass(step, Pass::Outward, &currents),
                || self.run_pass(step, Pass::Inward, &currents),
            )
        } else {
            (
                self.run_pass(step, Pass::Outward, &currents),
                self.run_pass(step, Pass::Inward, &currents),
            )
        };
        StepPartition {
            positive,
            negative,
            stats: pos_stats.merge(neg_stats),
        }
    }

    fn run_pass(&self, step: usize, pass: Pass, currents: &[f64]) -> (Vec<f64>, PartitionStats) {
        let seed = match pass.sign() {
            Sign::Positive => &self.seeds[0],
            Sign::Negative => &self.seeds[1],
        };
        let mut pool = seed.column(step);
        let mut stats = PartitionStats::default();
        let mut visited = 0;
        for (edge, current) in self.order.pass(pass, currents) {
            visited += 1;
            stats.record(apportion(&mut pool, edge.origin, edge.destination, current));
        }
        stats.sign_mismatch += self.order.edges().len() - visited;
        (pool.row(self.target_id).to_vec(), stats)
    }
}
