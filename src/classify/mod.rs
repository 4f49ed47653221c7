//! Source-label strategies.
//!
//! Currents can be reported per raw mechanism ([`Partitioning::ByType`]) or per
//! combined `{region}_{class}` label ([`Partitioning::ByRegion`]). The strategy
//! is chosen once when the engine is built.
//!
//! Regrouping sums rows sharing a combined label within each compartment, so
//! the per-compartment total at every time step is unchanged. It is applied to
//! the positive and negative halves separately, after clipping.

pub mod mechanism;
pub mod region;

use std::borrow::Cow;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::apportion::Sign;
use crate::error::{ConfigError, TableError};
use crate::table::SourceTable;

pub use mechanism::{MechanismClasses, UNKNOWN};
pub use region::{DEFAULT_REGION_ORDER, RegionMap};

/// Strategy name as written in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartitionBy {
    #[default]
    Type,
    Region,
}

impl FromStr for PartitionBy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "type" => Ok(PartitionBy::Type),
            "region" => Ok(PartitionBy::Region),
            other => Err(ConfigError::UnknownStrategy {
                name: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for PartitionBy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PartitionBy::Type => write!(f, "type"),
            PartitionBy::Region => write!(f, "region"),
        }
    }
}

/// How membrane-current rows are labelled for the decomposition.
#[derive(Debug, Clone, Default)]
pub enum Partitioning {
    /// Keep each mechanism as its own label.
    #[default]
    ByType,
    /// Combine rows into `{region}_{class}` labels.
    ByRegion {
        regions: RegionMap,
        mechanisms: MechanismClasses,
    },
}

impl Partitioning {
    pub fn by_region(regions: RegionMap, mechanisms: MechanismClasses) -> Self {
        Partitioning::ByRegion {
            regions,
            mechanisms,
        }
    }

    pub fn kind(&self) -> PartitionBy {
        match self {
            Partitioning::ByType => PartitionBy::Type,
            Partitioning::ByRegion { .. } => PartitionBy::Region,
        }
    }

    /// Label of a (compartment, mechanism) row under this strategy.
    pub fn label(&self, compartment: &str, mechanism: &str) -> String {
        match self {
            Partitioning::ByType => mechanism.to_string(),
            Partitioning::ByRegion {
                regions,
                mechanisms,
            } => format!(
                "{}_{}",
                regions.region_of(compartment),
                mechanisms.class_of(mechanism)
            ),
        }
    }

    /// Relabel and re-aggregate a table. `ByType` borrows the input.
    pub fn regroup<'a>(&self, table: &'a SourceTable) -> Result<Cow<'a, SourceTable>, TableError> {
        self.regroup_with(table, |v| v)
    }

    /// Regroup the `sign` half of a table: values of the opposite sign count as
    /// zero before rows are summed.
    ///
    /// `ByType` returns the table unclipped, since no rows are summed and pool
    /// construction clips each entry on its own.
    pub fn regroup_signed<'a>(
        &self,
        table: &'a SourceTable,
        sign: Sign,
    ) -> Result<Cow<'a, SourceTable>, TableError> {
        self.regroup_with(table, |v| sign.clip(v))
    }

    fn regroup_with<'a>(
        &self,
        table: &'a SourceTable,
        clip: impl Fn(f64) -> f64,
    ) -> Result<Cow<'a, SourceTable>, TableError> {
        let Partitioning::ByRegion {
            regions,
            mechanisms,
        } = self
        else {
            return Ok(Cow::Borrowed(table));
        };

        let mut out = SourceTable::new(table.n_steps());
        let mut unknown_region = 0usize;
        let mut unknown_mechanism = 0usize;
        let mut clipped = Vec::with_capacity(table.n_steps());
        for (compartment, mechanism, values) in table.rows() {
            let region = regions.region_of(compartment);
            let class = mechanisms.class_of(mechanism);
            if region == UNKNOWN {
                unknown_region += 1;
            }
            if class == UNKNOWN {
                unknown_mechanism += 1;
            }
            clipped.clear();
            clipped.extend(values.iter().map(|&v| clip(v)));
            out.accumulate(compartment, &format!("{region}_{class}"), &clipped)?;
        }

        if unknown_region > 0 || unknown_mechanism > 0 {
            tracing::warn!(
                unknown_region,
                unknown_mechanism,
                "rows bucketed as Unknown during region classification"
            );
        }
        tracing::debug!(rows_in = table.len(), rows_out = out.len(), "regrouped by region");
        Ok(Cow::Owned(out))
    }
}
