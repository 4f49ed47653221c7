//! Mechanism → class table.
//!
//! Maps each current-generating mechanism the simulator can record to a broad
//! class (`intrinsic` channel or `synaptic` receptor). The built-in table is
//! version 1; a TOML file with the same shape can replace it so new mechanisms
//! do not require a rebuild.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Label used for anything absent from a lookup table.
pub const UNKNOWN: &str = "Unknown";

/// Serialized form of the table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct MechanismFile {
    version: u32,
    classes: BTreeMap<String, Vec<String>>,
}

/// Versioned mechanism classification.
#[derive(Debug, Clone, PartialEq)]
pub struct MechanismClasses {
    version: u32,
    classes: BTreeMap<String, Vec<String>>,
    lookup: HashMap<String, String>,
}

impl MechanismClasses {
    /// Build a table from `class → mechanisms` lists.
    ///
    /// A mechanism listed under several classes belongs to the first class in
    /// name order.
    pub fn new(version: u32, classes: BTreeMap<String, Vec<String>>) -> Self {
        let mut lookup = HashMap::new();
        for (class, mechanisms) in &classes {
            for mechanism in mechanisms {
                lookup
                    .entry(mechanism.clone())
                    .or_insert_with(|| class.clone());
            }
        }
        Self {
            version,
            classes,
            lookup,
        }
    }

    /// The table shipped with the crate.
    pub fn builtin() -> Self {
        let intrinsic = [
            "capacitive", "car", "kad", "kap", "kdr", "kslow", "nad", "nax", "passive",
        ];
        let synaptic = ["AMPA", "GABA", "GABA_B", "NMDA"];
        let mut classes = BTreeMap::new();
        classes.insert(
            "intrinsic".to_string(),
            intrinsic.iter().map(|s| s.to_string()).collect(),
        );
        classes.insert(
            "synaptic".to_string(),
            synaptic.iter().map(|s| s.to_string()).collect(),
        );
        Self::new(1, classes)
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// Class of a mechanism, or [`UNKNOWN`].
    pub fn class_of(&self, mechanism: &str) -> &str {
        self.lookup
            .get(mechanism)
            .map(String::as_str)
            .unwrap_or(UNKNOWN)
    }

    /// Whether the mechanism has an entry.
    pub fn knows(&self, mechanism: &str) -> bool {
        self.lookup.contains_key(mechanism)
    }

    /// Parse a table from TOML text.
    pub fn from_toml(content: &str, origin: &str) -> Result<Self, ConfigError> {
        let file: MechanismFile = toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: origin.to_string(),
            message: e.to_string(),
        })?;
        Ok(Self::new(file.version, file.classes))
    }

    /// Render the table as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        let file = MechanismFile {
            version: self.version,
            classes: self.classes.clone(),
        };
        toml::to_string_pretty(&file).map_err(|e| ConfigError::Serialize {
            what: "mechanism table".into(),
            message: e.to_string(),
        })
    }

    /// Load a table from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_toml(&content, &path.display().to_string())
    }
}

impl Default for MechanismClasses {
    fn default() -> Self {
        Self::builtin()
    }
}
