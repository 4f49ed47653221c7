//! Anatomical regions.
//!
//! A region is a named list of section base-names. Lists are supplied as one
//! `<region>.txt` file per region, members separated by whitespace or newlines.
//! Regions are checked in their configured order and the first list that
//! contains a segment's base-name wins.

use std::collections::HashSet;
use std::path::Path;

use super::mechanism::UNKNOWN;
use crate::compartment::base_name;
use crate::error::ConfigError;

/// Region lists in the order they are checked.
pub const DEFAULT_REGION_ORDER: [&str; 5] = ["distal", "oblique_trunk", "axon", "basal", "soma"];

/// Ordered region membership lists.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegionMap {
    regions: Vec<(String, HashSet<String>)>,
}

impl RegionMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a region with its member base-names.
    pub fn with_region<I, S>(mut self, name: &str, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push(name, members);
        self
    }

    pub fn push<I, S>(&mut self, name: &str, members: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.regions
            .push((name.to_string(), members.into_iter().map(Into::into).collect()));
    }

    /// Read `<dir>/<name>.txt` for every name in `order`.
    pub fn from_dir<S: AsRef<str>>(dir: &Path, order: &[S]) -> Result<Self, ConfigError> {
        let mut map = Self::new();
        for name in order {
            let name = name.as_ref();
            let path = dir.join(format!("{name}.txt"));
            let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::RegionList {
                path: path.display().to_string(),
                source: e,
            })?;
            map.push(name, content.split_whitespace());
        }
        tracing::debug!(
            dir = %dir.display(),
            regions = map.len(),
            "region lists loaded"
        );
        Ok(map)
    }

    /// Region of a segment, by its base-name, or [`UNKNOWN`].
    pub fn region_of(&self, segment: &str) -> &str {
        let base = base_name(segment);
        self.regions
            .iter()
            .find(|(_, members)| members.contains(base))
            .map(|(name, _)| name.as_str())
            .unwrap_or(UNKNOWN)
    }

    /// Region names in lookup order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.regions.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}
