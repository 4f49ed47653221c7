//! Time-indexed current tables.
//!
//! - [`SourceTable`]: membrane currents keyed by (compartment, source-label).
//!   The label is a mechanism name, or a combined `{region}_{class}` label
//!   after classification.
//! - [`AxialTable`]: axial currents keyed by (origin, destination). A positive
//!   value means current flows from origin toward destination in the table's
//!   native orientation.
//!
//! Both tables hold one value per time step and keep their rows sorted by key,
//! so iteration order (and therefore every downstream result) is deterministic.

use std::collections::BTreeMap;

use crate::apportion::Sign;
use crate::error::{TableError, TopologyError};

/// Membrane currents per (compartment, source-label) and time step.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SourceTable {
    n_steps: usize,
    rows: BTreeMap<(String, String), Vec<f64>>,
}

impl SourceTable {
    /// Create an empty table covering `n_steps` time steps.
    pub fn new(n_steps: usize) -> Self {
        Self {
            n_steps,
            rows: BTreeMap::new(),
        }
    }

    /// Number of time-step columns.
    pub fn n_steps(&self) -> usize {
        self.n_steps
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Insert a new row. Fails on a duplicate key or a wrong number of values.
    pub fn insert(
        &mut self,
        compartment: impl Into<String>,
        label: impl Into<String>,
        values: Vec<f64>,
    ) -> Result<(), TableError> {
        let key = (compartment.into(), label.into());
        check_len(&key, self.n_steps, values.len())?;
        if self.rows.contains_key(&key) {
            return Err(TableError::DuplicateRow {
                first: key.0,
                second: key.1,
            });
        }
        self.rows.insert(key, values);
        Ok(())
    }

    /// Add `values` element-wise into the row, creating it if absent.
    pub fn accumulate(
        &mut self,
        compartment: &str,
        label: &str,
        values: &[f64],
    ) -> Result<(), TableError> {
        let key = (compartment.to_string(), label.to_string());
        check_len(&key, self.n_steps, values.len())?;
        let row = self
            .rows
            .entry(key)
            .or_insert_with(|| vec![0.0; values.len()]);
        for (acc, v) in row.iter_mut().zip(values) {
            *acc += v;
        }
        Ok(())
    }

    /// Values of one row.
    pub fn get(&self, compartment: &str, label: &str) -> Option<&[f64]> {
        self.rows
            .get(&(compartment.to_string(), label.to_string()))
            .map(Vec::as_slice)
    }

    /// Iterate `(compartment, label, values)` in key order.
    pub fn rows(&self) -> impl Iterator<Item = (&str, &str, &[f64])> {
        self.rows
            .iter()
            .map(|((c, l), v)| (c.as_str(), l.as_str(), v.as_slice()))
    }

    /// Distinct compartments, sorted.
    pub fn compartments(&self) -> Vec<&str> {
        let mut out: Vec<&str> = self.rows.keys().map(|(c, _)| c.as_str()).collect();
        out.dedup();
        out
    }

    /// Distinct source-labels, sorted.
    pub fn labels(&self) -> Vec<&str> {
        let mut out: Vec<&str> = self.rows.keys().map(|(_, l)| l.as_str()).collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    /// Whether any row belongs to `compartment`.
    pub fn contains_compartment(&self, compartment: &str) -> bool {
        self.rows
            .range((compartment.to_string(), String::new())..)
            .next()
            .is_some_and(|((c, _), _)| c == compartment)
    }

    /// Sum over all labels of `compartment` at `step`.
    pub fn compartment_total(&self, compartment: &str, step: usize) -> f64 {
        self.rows
            .range((compartment.to_string(), String::new())..)
            .take_while(|((c, _), _)| c == compartment)
            .map(|(_, v)| v.get(step).copied().unwrap_or(0.0))
            .sum()
    }

    /// Copy of the table with entries of the opposite sign clipped to zero.
    pub fn clipped(&self, sign: Sign) -> SourceTable {
        let rows = self
            .rows
            .iter()
            .map(|(k, v)| (k.clone(), v.iter().map(|&x| sign.clip(x)).collect()))
            .collect();
        SourceTable {
            n_steps: self.n_steps,
            rows,
        }
    }
}

/// Axial currents per directed edge (origin, destination) and time step.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AxialTable {
    n_steps: usize,
    edges: BTreeMap<(String, String), Vec<f64>>,
}

impl AxialTable {
    /// Create an empty table covering `n_steps` time steps.
    pub fn new(n_steps: usize) -> Self {
        Self {
            n_steps,
            edges: BTreeMap::new(),
        }
    }

    pub fn n_steps(&self) -> usize {
        self.n_steps
    }

    /// Number of edges.
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Insert an edge. Fails on duplicates, self-loops and wrong lengths.
    pub fn insert(
        &mut self,
        origin: impl Into<String>,
        destination: impl Into<String>,
        values: Vec<f64>,
    ) -> Result<(), TableError> {
        let key = (origin.into(), destination.into());
        if key.0 == key.1 {
            return Err(TableError::SelfLoop { compartment: key.0 });
        }
        check_len(&key, self.n_steps, values.len())?;
        if self.edges.contains_key(&key) {
            return Err(TableError::DuplicateRow {
                first: key.0,
                second: key.1,
            });
        }
        self.edges.insert(key, values);
        Ok(())
    }

    /// Remove an edge, returning its values.
    pub fn remove(&mut self, origin: &str, destination: &str) -> Option<Vec<f64>> {
        self.edges
            .remove(&(origin.to_string(), destination.to_string()))
    }

    /// Values of one edge.
    pub fn get(&self, origin: &str, destination: &str) -> Option<&[f64]> {
        self.edges
            .get(&(origin.to_string(), destination.to_string()))
            .map(Vec::as_slice)
    }

    pub fn contains(&self, origin: &str, destination: &str) -> bool {
        self.get(origin, destination).is_some()
    }

    /// Iterate `(origin, destination, values)` in key order.
    pub fn edges(&self) -> impl Iterator<Item = (&str, &str, &[f64])> {
        self.edges
            .iter()
            .map(|((o, d), v)| (o.as_str(), d.as_str(), v.as_slice()))
    }

    /// Distinct compartments referenced by any edge, sorted.
    pub fn compartments(&self) -> Vec<&str> {
        let mut out: Vec<&str> = self
            .edges
            .keys()
            .flat_map(|(o, d)| [o.as_str(), d.as_str()])
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    /// Sum of absolute axial currents at `step`.
    pub fn magnitude(&self, step: usize) -> f64 {
        self.edges
            .values()
            .map(|v| v.get(step).copied().unwrap_or(0.0).abs())
            .sum()
    }

    /// The anatomical root: the only compartment without an outgoing edge.
    ///
    /// Edges of a freshly simulated table point from child to parent, so the
    /// root is the one node that never appears as an origin.
    pub fn infer_root(&self) -> Result<String, TopologyError> {
        if self.edges.is_empty() {
            return Err(TopologyError::AmbiguousRoot {
                message: "the axial table has no edges".into(),
            });
        }
        let origins: std::collections::BTreeSet<&str> =
            self.edges.keys().map(|(o, _)| o.as_str()).collect();
        let candidates: Vec<&str> = self
            .compartments()
            .into_iter()
            .filter(|c| !origins.contains(c))
            .collect();
        match candidates.as_slice() {
            [root] => Ok((*root).to_string()),
            [] => Err(TopologyError::AmbiguousRoot {
                message: "every compartment has an outgoing edge".into(),
            }),
            many => Err(TopologyError::AmbiguousRoot {
                message: format!("several candidates: {}", many.join(", ")),
            }),
        }
    }
}

fn check_len(key: &(String, String), expected: usize, actual: usize) -> Result<(), TableError> {
    if expected != actual {
        return Err(TableError::LengthMismatch {
            first: key.0.clone(),
            second: key.1.clone(),
            expected,
            actual,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sources() -> SourceTable {
        let mut t = SourceTable::new(2);
        t.insert("soma", "kdr", vec![1.0, -2.0]).unwrap();
        t.insert("soma", "nax", vec![-3.0, 4.0]).unwrap();
        t.insert("dend1(0.5)", "AMPA", vec![0.5, 0.0]).unwrap();
        t
    }

    #[test]
    fn duplicate_and_length_are_rejected() {
        let mut t = sources();
        assert!(matches!(
            t.insert("soma", "kdr", vec![0.0, 0.0]),
            Err(TableError::DuplicateRow { .. })
        ));
        assert!(matches!(
            t.insert("soma", "kap", vec![0.0]),
            Err(TableError::LengthMismatch { expected: 2, actual: 1, .. })
        ));
    }

    #[test]
    fn compartments_and_labels_are_sorted() {
        let t = sources();
        assert_eq!(t.compartments(), vec!["dend1(0.5)", "soma"]);
        assert_eq!(t.labels(), vec!["AMPA", "kdr", "nax"]);
        assert!(t.contains_compartment("soma"));
        assert!(!t.contains_compartment("som"));
    }

    #[test]
    fn compartment_total_sums_labels() {
        let t = sources();
        assert_eq!(t.compartment_total("soma", 0), -2.0);
        assert_eq!(t.compartment_total("soma", 1), 2.0);
        assert_eq!(t.compartment_total("axon", 0), 0.0);
    }

    #[test]
    fn clipping_separates_signs() {
        let t = sources();
        let pos = t.clipped(Sign::Positive);
        let neg = t.clipped(Sign::Negative);
        assert_eq!(pos.get("soma", "kdr").unwrap(), &[1.0, 0.0]);
        assert_eq!(neg.get("soma", "kdr").unwrap(), &[0.0, -2.0]);
        assert_eq!(pos.get("soma", "nax").unwrap(), &[0.0, 4.0]);
        assert_eq!(neg.get("soma", "nax").unwrap(), &[-3.0, 0.0]);
    }

    #[test]
    fn accumulate_adds_into_existing_rows() {
        let mut t = sources();
        t.accumulate("soma", "kdr", &[1.0, 1.0]).unwrap();
        t.accumulate("axon", "kdr", &[2.0, 3.0]).unwrap();
        assert_eq!(t.get("soma", "kdr").unwrap(), &[2.0, -1.0]);
        assert_eq!(t.get("axon", "kdr").unwrap(), &[2.0, 3.0]);
    }

    #[test]
    fn axial_rejects_self_loops() {
        let mut t = AxialTable::new(1);
        assert!(matches!(
            t.insert("soma", "soma", vec![1.0]),
            Err(TableError::SelfLoop { .. })
        ));
    }

    #[test]
    fn root_is_the_node_without_outgoing_edges() {
        let mut t = AxialTable::new(1);
        t.insert("dend2", "dend1", vec![1.0]).unwrap();
        t.insert("dend1", "soma", vec![1.0]).unwrap();
        t.insert("axon", "soma", vec![-1.0]).unwrap();
        assert_eq!(t.infer_root().unwrap(), "soma");

        t.insert("apic", "trunk", vec![0.0]).unwrap();
        assert!(matches!(
            t.infer_root(),
            Err(TopologyError::AmbiguousRoot { .. })
        ));
    }

    #[test]
    fn magnitude_ignores_direction() {
        let mut t = AxialTable::new(1);
        t.insert("a", "b", vec![-2.0]).unwrap();
        t.insert("b", "c", vec![3.0]).unwrap();
        assert_eq!(t.magnitude(0), 5.0);
    }
}
