//! Signed pools and the apportionment step.
//!
//! A [`Pool`] holds, for a single time step and a single sign, one value per
//! (compartment, source-label). It starts as the clipped membrane currents and
//! receives apportioned axial current as the traversal moves toward the target.
//!
//! Each time step owns its own pools: [`PoolSeed::column`] copies the column
//! out of the shared seed, so time steps can be processed on different threads
//! without locking. Within one pool, edges must be applied in the order
//! produced by [`crate::topology::order::PartitionOrder`].

use serde::{Deserialize, Serialize};

use crate::compartment::{CompartmentId, CompartmentIndex};
use crate::table::SourceTable;

/// Which half of the membrane currents a pool carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sign {
    /// Outward currents, entries ≥ 0.
    Positive,
    /// Inward currents, entries ≤ 0.
    Negative,
}

impl Sign {
    /// Clip a value into this sign's half-line.
    pub fn clip(self, value: f64) -> f64 {
        match self {
            Sign::Positive => value.max(0.0),
            Sign::Negative => value.min(0.0),
        }
    }

    /// Whether an axial current of this value may be apportioned into a pool
    /// of this sign. Zero never qualifies.
    pub fn admits(self, current: f64) -> bool {
        match self {
            Sign::Positive => current > 0.0,
            Sign::Negative => current < 0.0,
        }
    }

    /// Short name used in file names and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Sign::Positive => "pos",
            Sign::Negative => "neg",
        }
    }
}

impl std::fmt::Display for Sign {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Sign::Positive => write!(f, "positive"),
            Sign::Negative => write!(f, "negative"),
        }
    }
}

/// What happened when an edge was offered to a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The current was split across the origin's sources.
    Applied,
    /// The current's sign does not match the pool.
    SignMismatch,
    /// The origin's pool row sums to zero at this step.
    EmptyOrigin,
}

/// One signed pool for a single time step.
#[derive(Debug, Clone, PartialEq)]
pub struct Pool {
    sign: Sign,
    width: usize,
    values: Vec<f64>,
}

impl Pool {
    /// A pool of zeros for `n_compartments` rows of `width` labels.
    pub fn zeros(sign: Sign, n_compartments: usize, width: usize) -> Self {
        Self {
            sign,
            width,
            values: vec![0.0; n_compartments * width],
        }
    }

    pub fn sign(&self) -> Sign {
        self.sign
    }

    /// Number of source-labels per compartment.
    pub fn width(&self) -> usize {
        self.width
    }

    /// The label values of one compartment.
    pub fn row(&self, compartment: CompartmentId) -> &[f64] {
        let start = compartment.index() * self.width;
        &self.values[start..start + self.width]
    }

    pub fn row_mut(&mut self, compartment: CompartmentId) -> &mut [f64] {
        let start = compartment.index() * self.width;
        &mut self.values[start..start + self.width]
    }

    /// Sum of a compartment's row.
    pub fn total(&self, compartment: CompartmentId) -> f64 {
        self.row(compartment).iter().sum()
    }

    /// Borrow the origin row shared and the destination row mutably.
    fn split_rows(
        &mut self,
        origin: CompartmentId,
        destination: CompartmentId,
    ) -> (&[f64], &mut [f64]) {
        let w = self.width;
        let (o, d) = (origin.index(), destination.index());
        if o < d {
            let (head, tail) = self.values.split_at_mut(d * w);
            (&head[o * w..(o + 1) * w], &mut tail[..w])
        } else {
            let (head, tail) = self.values.split_at_mut(o * w);
            (&tail[..w], &mut head[d * w..(d + 1) * w])
        }
    }
}

/// Apportion `current` flowing from `origin` to `destination` into `pool`.
///
/// Each label's share at the origin is its value divided by the origin's row
/// total; `share × current` is added to the destination's entry for that label.
/// Nothing happens when the sign of `current` does not match the pool or when
/// the origin's total is zero.
pub fn apportion(
    pool: &mut Pool,
    origin: CompartmentId,
    destination: CompartmentId,
    current: f64,
) -> Outcome {
    debug_assert_ne!(origin, destination, "axial edges never loop");
    if !pool.sign.admits(current) {
        return Outcome::SignMismatch;
    }
    let total = pool.total(origin);
    if total == 0.0 {
        return Outcome::EmptyOrigin;
    }
    let (src, dst) = pool.split_rows(origin, destination);
    for (acc, &value) in dst.iter_mut().zip(src) {
        *acc += value / total * current;
    }
    Outcome::Applied
}

/// Clipped membrane currents laid out for fast per-step pool construction.
///
/// Rows are (compartment, label) pairs in id × label order; every row stores
/// all time steps contiguously.
#[derive(Debug, Clone)]
pub struct PoolSeed {
    sign: Sign,
    n_compartments: usize,
    width: usize,
    n_steps: usize,
    values: Vec<f64>,
}

impl PoolSeed {
    /// Lay out `table` over the given compartments and sorted labels, clipping
    /// each entry to `sign`. Missing (compartment, label) pairs are zero.
    pub fn build(
        table: &SourceTable,
        sign: Sign,
        compartments: &CompartmentIndex,
        labels: &[String],
    ) -> Self {
        let width = labels.len();
        let n_steps = table.n_steps();
        let mut values = vec![0.0; compartments.len() * width * n_steps];
        for (compartment, label, row) in table.rows() {
            let (Some(c), Ok(l)) = (
                compartments.get(compartment),
                labels.binary_search_by(|l| l.as_str().cmp(label)),
            ) else {
                continue;
            };
            let start = (c.index() * width + l) * n_steps;
            for (slot, &v) in values[start..start + n_steps].iter_mut().zip(row) {
                *slot = sign.clip(v);
            }
        }
        Self {
            sign,
            n_compartments: compartments.len(),
            width,
            n_steps,
            values,
        }
    }

    pub fn sign(&self) -> Sign {
        self.sign
    }

    pub fn n_steps(&self) -> usize {
        self.n_steps
    }

    /// The pool for one time step. `step` must be below [`Self::n_steps`].
    pub fn column(&self, step: usize) -> Pool {
        let values = self
            .values
            .chunks_exact(self.n_steps.max(1))
            .map(|row| row.get(step).copied().unwrap_or(0.0))
            .collect();
        Pool {
            sign: self.sign,
            width: self.width,
            values,
        }
    }

    /// Number of compartments covered.
    pub fn n_compartments(&self) -> usize {
        self.n_compartments
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(i: usize) -> CompartmentId {
        CompartmentId::from_index(i)
    }

    fn pool_with(sign: Sign, rows: &[&[f64]]) -> Pool {
        let width = rows[0].len();
        let mut pool = Pool::zeros(sign, rows.len(), width);
        for (i, row) in rows.iter().enumerate() {
            pool.row_mut(id(i)).copy_from_slice(row);
        }
        pool
    }

    #[test]
    fn splits_in_proportion_to_origin_shares() {
        // dend2 carries 7 + 3 of outward current; 10 flows into dend1.
        let mut pool = pool_with(Sign::Positive, &[&[0.0, 0.0], &[7.0, 3.0]]);
        let outcome = apportion(&mut pool, id(1), id(0), 10.0);
        assert_eq!(outcome, Outcome::Applied);
        assert_eq!(pool.row(id(0)), &[7.0, 3.0]);
        // The origin is left untouched.
        assert_eq!(pool.row(id(1)), &[7.0, 3.0]);
    }

    #[test]
    fn shares_sum_to_the_apportioned_current() {
        let mut pool = pool_with(Sign::Positive, &[&[1.0, 2.0, 3.0], &[0.5, 0.0, 0.25]]);
        let before = pool.total(id(1));
        apportion(&mut pool, id(0), id(1), 4.5);
        assert!((pool.total(id(1)) - before - 4.5).abs() < 1e-12);
    }

    #[test]
    fn works_in_both_index_orders() {
        let mut pool = pool_with(Sign::Positive, &[&[1.0, 1.0], &[0.0, 0.0], &[2.0, 0.0]]);
        apportion(&mut pool, id(0), id(2), 2.0);
        assert_eq!(pool.row(id(2)), &[3.0, 1.0]);
        apportion(&mut pool, id(2), id(1), 4.0);
        assert_eq!(pool.row(id(1)), &[3.0, 1.0]);
    }

    #[test]
    fn sign_mismatch_is_a_no_op() {
        let mut pool = pool_with(Sign::Positive, &[&[1.0], &[0.0]]);
        assert_eq!(apportion(&mut pool, id(0), id(1), -1.0), Outcome::SignMismatch);
        assert_eq!(apportion(&mut pool, id(0), id(1), 0.0), Outcome::SignMismatch);
        assert_eq!(pool.row(id(1)), &[0.0]);

        let mut neg = pool_with(Sign::Negative, &[&[-1.0], &[0.0]]);
        assert_eq!(apportion(&mut neg, id(0), id(1), 1.0), Outcome::SignMismatch);
    }

    #[test]
    fn empty_origin_is_a_no_op() {
        let mut pool = pool_with(Sign::Negative, &[&[0.0, 0.0], &[-1.0, 0.0]]);
        assert_eq!(apportion(&mut pool, id(0), id(1), -5.0), Outcome::EmptyOrigin);
        assert_eq!(pool.row(id(1)), &[-1.0, 0.0]);
    }

    #[test]
    fn negative_pool_stays_non_positive() {
        let mut pool = pool_with(Sign::Negative, &[&[-2.0, -6.0], &[0.0, -1.0]]);
        apportion(&mut pool, id(0), id(1), -4.0);
        assert_eq!(pool.row(id(1)), &[-1.0, -4.0]);
        assert!(pool.row(id(1)).iter().all(|&v| v <= 0.0));
    }

    #[test]
    fn seed_columns_are_clipped_and_dense() {
        let mut table = SourceTable::new(2);
        table.insert("soma", "kdr", vec![1.0, -1.0]).unwrap();
        table.insert("dend", "nax", vec![-2.0, 3.0]).unwrap();
        let compartments = CompartmentIndex::from_names(["soma", "dend"]);
        let labels = vec!["kdr".to_string(), "nax".to_string()];

        let seed = PoolSeed::build(&table, Sign::Positive, &compartments, &labels);
        let p0 = seed.column(0);
        assert_eq!(p0.row(id(0)), &[1.0, 0.0]);
        assert_eq!(p0.row(id(1)), &[0.0, 0.0]);
        let p1 = seed.column(1);
        assert_eq!(p1.row(id(1)), &[0.0, 3.0]);

        let neg = PoolSeed::build(&table, Sign::Negative, &compartments, &labels).column(0);
        assert_eq!(neg.row(id(1)), &[0.0, -2.0]);
    }
}
