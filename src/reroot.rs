//! Rerooting: make an arbitrary compartment the root of the current tables.
//!
//! Two steps, run once per analysis before any apportionment:
//!
//! 1. **Merge**: the segments `section(x)` of the target section collapse into
//!    one compartment named `section`. Membrane rows are summed per label,
//!    axial edges internal to the section are dropped, and edges crossing the
//!    section boundary are relabelled to the merged name.
//! 2. **Reverse**: every edge on the path between the merged target and the
//!    anatomical root swaps origin and destination and has its values negated,
//!    so all edges point toward the new root. Edges off that path are untouched.
//!
//! Rerooting to the anatomical root itself borrows the tables unchanged. When
//! the anatomical root is one of the target's own segments the merge alone
//! makes the target the root, and no edge is reversed.

use std::borrow::Cow;

use crate::compartment::{CompartmentIndex, is_segment_of};
use crate::error::{CurrentscapeResult, TableError, TopologyError};
use crate::table::{AxialTable, SourceTable};
use crate::topology::FlowGraph;

/// Members of a merged section found on its boundary.
///
/// Boundary members are identified by connectivity: a member that is the
/// origin of a crossing edge attaches toward the root side (proximal), a member
/// that is the destination of a crossing edge receives a child branch (distal).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SectionBoundary {
    pub section: String,
    /// Every segment name merged into the section.
    pub members: Vec<String>,
    pub proximal: Vec<String>,
    pub distal: Vec<String>,
}

/// Tables restructured around a new root.
#[derive(Debug, Clone)]
pub struct Rerooted<'a> {
    pub sources: Cow<'a, SourceTable>,
    pub axial: Cow<'a, AxialTable>,
    /// `None` when the target already was the root.
    pub boundary: Option<SectionBoundary>,
    /// Edges reversed, in their original orientation, ordered from the target.
    pub reversed: Vec<(String, String)>,
}

/// Sum the membrane rows of the segments of `section` into one compartment.
pub fn merge_section_sources(table: &SourceTable, section: &str) -> Result<SourceTable, TableError> {
    let mut out = SourceTable::new(table.n_steps());
    for (compartment, label, values) in table.rows() {
        if compartment == section || is_segment_of(compartment, section) {
            out.accumulate(section, label, values)?;
        } else {
            out.insert(compartment, label, values.to_vec())?;
        }
    }
    Ok(out)
}

/// Collapse the segments of `section` in the axial table.
pub fn merge_section_axial(
    table: &AxialTable,
    section: &str,
) -> CurrentscapeResult<(AxialTable, SectionBoundary)> {
    let inside = |name: &str| name == section || is_segment_of(name, section);

    let mut boundary = SectionBoundary {
        section: section.to_string(),
        members: table
            .compartments()
            .into_iter()
            .filter(|c| is_segment_of(c, section))
            .map(str::to_string)
            .collect(),
        ..Default::default()
    };

    let mut out = AxialTable::new(table.n_steps());
    for (origin, destination, values) in table.edges() {
        let key = match (inside(origin), inside(destination)) {
            (true, true) => continue,
            (true, false) => {
                if origin != section {
                    boundary.proximal.push(origin.to_string());
                }
                (section, destination)
            }
            (false, true) => {
                if destination != section {
                    boundary.distal.push(destination.to_string());
                }
                (origin, section)
            }
            (false, false) => (origin, destination),
        };
        out.insert(key.0, key.1, values.to_vec()).map_err(|e| match e {
            TableError::DuplicateRow { first, second } => TopologyError::MergeCollision {
                section: section.to_string(),
                origin: first,
                destination: second,
            }
            .into(),
            other => crate::error::CurrentscapeError::from(other),
        })?;
    }

    boundary.proximal.sort();
    boundary.proximal.dedup();
    boundary.distal.sort();
    boundary.distal.dedup();
    Ok((out, boundary))
}

/// Reverse every edge on the path `from → to` that points toward `to`.
///
/// Returns the new table and the reversed edges in their original orientation.
pub fn reverse_path(
    table: AxialTable,
    from: &str,
    to: &str,
) -> CurrentscapeResult<(AxialTable, Vec<(String, String)>)> {
    let disconnected = || TopologyError::Disconnected {
        from: from.to_string(),
        to: to.to_string(),
    };
    if from == to {
        return Ok((table, Vec::new()));
    }

    let index = CompartmentIndex::from_names(table.compartments());
    let (Some(start), Some(goal)) = (index.get(from), index.get(to)) else {
        return Err(disconnected().into());
    };
    let graph = FlowGraph::at_step(&table, &index, 0)?;
    let path = graph.shortest_path(start, goal).ok_or_else(disconnected)?;

    let mut out = table;
    let mut reversed = Vec::with_capacity(path.len().saturating_sub(1));
    for pair in path.windows(2) {
        let (a, b) = (index.name(pair[0]), index.name(pair[1]));
        if let Some(values) = out.remove(a, b) {
            let negated = values.iter().map(|v| -v).collect();
            out.insert(b, a, negated)?;
            reversed.push((a.to_string(), b.to_string()));
        } else {
            tracing::debug!(origin = b, destination = a, "path edge already points to the new root");
        }
    }
    Ok((out, reversed))
}

/// Merge the target section and reverse the path to the anatomical root.
pub fn reroot<'a>(
    sources: &'a SourceTable,
    axial: &'a AxialTable,
    target: &str,
    root: &str,
) -> CurrentscapeResult<Rerooted<'a>> {
    if target == root {
        if !sources.contains_compartment(target) {
            return Err(TopologyError::TargetNotFound {
                target: target.to_string(),
            }
            .into());
        }
        return Ok(Rerooted {
            sources: Cow::Borrowed(sources),
            axial: Cow::Borrowed(axial),
            boundary: None,
            reversed: Vec::new(),
        });
    }

    let merged_sources = merge_section_sources(sources, target)?;
    if !merged_sources.contains_compartment(target) {
        return Err(TopologyError::TargetNotFound {
            target: target.to_string(),
        }
        .into());
    }
    let (merged_axial, boundary) = merge_section_axial(axial, target)?;
    tracing::debug!(
        section = target,
        members = boundary.members.len(),
        proximal = ?boundary.proximal,
        distal = ?boundary.distal,
        "merged target section"
    );

    // A root inside the target section was merged away with it.
    let root = if is_segment_of(root, target) { target } else { root };
    let (axial, reversed) = reverse_path(merged_axial, target, root)?;
    tracing::debug!(
        new_root = target,
        old_root = root,
        reversed = reversed.len(),
        "reversed path between target and anatomical root"
    );

    Ok(Rerooted {
        sources: Cow::Owned(merged_sources),
        axial: Cow::Owned(axial),
        boundary: Some(boundary),
        reversed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    // soma ← dend5(0) ← dend5(0.5) ← dend5(1) ← dend6(0.5)
    //   ↖ axon(0.5)
    fn tables() -> (SourceTable, AxialTable) {
        let mut s = SourceTable::new(2);
        s.insert("soma", "kdr", vec![1.0, 0.0]).unwrap();
        s.insert("axon(0.5)", "nax", vec![-1.0, 2.0]).unwrap();
        s.insert("dend5(0)", "kdr", vec![1.0, 1.0]).unwrap();
        s.insert("dend5(0.5)", "kdr", vec![2.0, -1.0]).unwrap();
        s.insert("dend5(0.5)", "AMPA", vec![0.5, 0.5]).unwrap();
        s.insert("dend5(1)", "AMPA", vec![1.5, 0.0]).unwrap();
        s.insert("dend6(0.5)", "kdr", vec![4.0, 4.0]).unwrap();

        let mut a = AxialTable::new(2);
        a.insert("dend5(0)", "soma", vec![3.0, -1.0]).unwrap();
        a.insert("dend5(0.5)", "dend5(0)", vec![2.0, -2.0]).unwrap();
        a.insert("dend5(1)", "dend5(0.5)", vec![1.0, -3.0]).unwrap();
        a.insert("dend6(0.5)", "dend5(1)", vec![4.0, 4.0]).unwrap();
        a.insert("axon(0.5)", "soma", vec![-0.5, 0.25]).unwrap();
        (s, a)
    }

    #[test]
    fn merge_sums_section_rows_by_label() {
        let (s, _) = tables();
        let merged = merge_section_sources(&s, "dend5").unwrap();
        assert_eq!(merged.get("dend5", "kdr").unwrap(), &[3.0, 0.0]);
        assert_eq!(merged.get("dend5", "AMPA").unwrap(), &[2.0, 0.5]);
        assert!(!merged.contains_compartment("dend5(0.5)"));
        assert_eq!(merged.get("dend6(0.5)", "kdr").unwrap(), &[4.0, 4.0]);
    }

    #[test]
    fn merge_drops_internal_edges_and_relabels_boundary() {
        let (_, a) = tables();
        let (merged, boundary) = merge_section_axial(&a, "dend5").unwrap();
        assert_eq!(merged.len(), 3);
        assert_eq!(merged.get("dend5", "soma").unwrap(), &[3.0, -1.0]);
        assert_eq!(merged.get("dend6(0.5)", "dend5").unwrap(), &[4.0, 4.0]);
        assert_eq!(boundary.proximal, vec!["dend5(0)"]);
        assert_eq!(boundary.distal, vec!["dend5(1)"]);
        assert_eq!(boundary.members.len(), 3);
    }

    #[test]
    fn reverse_negates_the_path_only() {
        let (s, a) = tables();
        let r = reroot(&s, &a, "dend5", "soma").unwrap();
        assert_eq!(r.reversed, vec![("dend5".to_string(), "soma".to_string())]);
        assert_eq!(r.axial.get("soma", "dend5").unwrap(), &[-3.0, 1.0]);
        assert!(!r.axial.contains("dend5", "soma"));
        // Off-path edges keep their orientation and sign.
        assert_eq!(r.axial.get("axon(0.5)", "soma").unwrap(), &[-0.5, 0.25]);
        assert_eq!(r.axial.get("dend6(0.5)", "dend5").unwrap(), &[4.0, 4.0]);
    }

    #[test]
    fn reversal_preserves_current_magnitude() {
        let (s, a) = tables();
        let (merged, _) = merge_section_axial(&a, "dend6").unwrap();
        let r = reroot(&s, &a, "dend6", "soma").unwrap();
        assert_eq!(r.reversed.len(), 4);
        for step in 0..2 {
            assert_eq!(merged.magnitude(step), r.axial.magnitude(step));
        }
        // Every edge of the rerooted table now points toward dend6.
        assert_eq!(r.axial.infer_root().unwrap(), "dend6");
    }

    #[test]
    fn rerooting_to_the_root_is_identity() {
        let (s, a) = tables();
        let r = reroot(&s, &a, "soma", "soma").unwrap();
        assert!(matches!(r.sources, Cow::Borrowed(_)));
        assert!(matches!(r.axial, Cow::Borrowed(_)));
        assert_eq!(*r.sources, s);
        assert_eq!(*r.axial, a);
        assert!(r.boundary.is_none());
        assert!(r.reversed.is_empty());
    }

    #[test]
    fn unknown_target_is_reported() {
        let (s, a) = tables();
        let err = reroot(&s, &a, "dend9", "soma").unwrap_err();
        assert!(matches!(
            err,
            crate::error::CurrentscapeError::Topology(TopologyError::TargetNotFound { .. })
        ));
    }

    #[test]
    fn boundary_collision_is_reported() {
        let mut a = AxialTable::new(1);
        a.insert("sec(0)", "soma", vec![1.0]).unwrap();
        a.insert("sec(1)", "soma", vec![1.0]).unwrap();
        assert!(merge_section_axial(&a, "sec").is_err());
    }

    #[test]
    fn root_inside_the_target_section_needs_no_reversal() {
        // soma(0.1) -> soma(0.5) <- soma(0.9), dend(0.5) -> soma(0.5)
        let mut s = SourceTable::new(1);
        s.insert("soma(0.1)", "kdr", vec![1.0]).unwrap();
        s.insert("soma(0.5)", "kdr", vec![-2.0]).unwrap();
        s.insert("soma(0.9)", "kdr", vec![1.0]).unwrap();
        s.insert("dend(0.5)", "AMPA", vec![4.0]).unwrap();
        let mut a = AxialTable::new(1);
        a.insert("soma(0.1)", "soma(0.5)", vec![1.0]).unwrap();
        a.insert("soma(0.9)", "soma(0.5)", vec![1.0]).unwrap();
        a.insert("dend(0.5)", "soma(0.5)", vec![4.0]).unwrap();
        assert_eq!(a.infer_root().unwrap(), "soma(0.5)");

        let r = reroot(&s, &a, "soma", "soma(0.5)").unwrap();
        assert!(r.reversed.is_empty());
        assert_eq!(r.axial.len(), 1);
        assert_eq!(r.axial.get("dend(0.5)", "soma").unwrap(), &[4.0]);
        assert_eq!(r.sources.get("soma", "kdr").unwrap(), &[0.0]);
        assert_eq!(r.boundary.as_ref().unwrap().members.len(), 3);
        assert_eq!(r.axial.infer_root().unwrap(), "soma");
    }
}
