//! Analysis configuration persisted as TOML.
//!
//! Every field has a default, so an empty file is a valid configuration that
//! partitions the soma by mechanism type over the full time range.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::classify::{DEFAULT_REGION_ORDER, MechanismClasses, PartitionBy, Partitioning, RegionMap};
use crate::engine::EngineConfig;
use crate::error::{ConfigError, CurrentscapeResult};
use crate::window::StepSelection;

/// Configuration of one partitioning analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Compartment or section at which currents are decomposed.
    #[serde(default = "default_target")]
    pub target: String,
    /// Anatomical root; inferred from the axial table when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<String>,
    #[serde(default)]
    pub partition_by: PartitionBy,
    /// Directory holding one `<region>.txt` member list per region.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regions_dir: Option<PathBuf>,
    /// Region lists in lookup order; the first match wins.
    #[serde(default = "default_region_order")]
    pub region_order: Vec<String>,
    /// Mechanism table overriding the built-in one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mechanisms: Option<PathBuf>,
    #[serde(default = "default_parallel")]
    pub parallel: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window: Option<WindowConfig>,
}

/// Time window restricting the partitioned steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowConfig {
    pub tmin: f64,
    pub tmax: f64,
    /// Uniform time step of the simulation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dt: Option<f64>,
    /// File with one time value per step. Takes precedence over `dt`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_axis: Option<PathBuf>,
}

fn default_target() -> String {
    "soma".into()
}
fn default_region_order() -> Vec<String> {
    DEFAULT_REGION_ORDER.iter().map(|s| s.to_string()).collect()
}
fn default_parallel() -> bool {
    true
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            target: default_target(),
            root: None,
            partition_by: PartitionBy::default(),
            regions_dir: None,
            region_order: default_region_order(),
            mechanisms: None,
            parallel: default_parallel(),
            window: None,
        }
    }
}

impl AnalysisConfig {
    /// Load from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Save to a TOML file.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize {
            what: format!("config for {}", path.display()),
            message: e.to_string(),
        })?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
        std::fs::write(path, content).map_err(|e| ConfigError::Write {
            path: path.display().to_string(),
            source: e,
        })
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            target: self.target.clone(),
            root: self.root.clone(),
            parallel: self.parallel,
        }
    }

    /// Build the labelling strategy, loading region lists and mechanism table.
    pub fn partitioning(&self) -> Result<Partitioning, ConfigError> {
        match self.partition_by {
            PartitionBy::Type => Ok(Partitioning::ByType),
            PartitionBy::Region => {
                let dir = self
                    .regions_dir
                    .as_deref()
                    .ok_or(ConfigError::MissingRegionSource)?;
                let regions = RegionMap::from_dir(dir, &self.region_order)?;
                let mechanisms = match &self.mechanisms {
                    Some(path) => MechanismClasses::load(path)?,
                    None => MechanismClasses::builtin(),
                };
                tracing::debug!(
                    regions = regions.len(),
                    mechanism_table = mechanisms.version(),
                    "region strategy configured"
                );
                Ok(Partitioning::by_region(regions, mechanisms))
            }
        }
    }

    /// Apply command-line window settings field by field.
    ///
    /// Bounds replace the file's bounds; `dt` and `time_axis` only replace the
    /// file's values when given. Without bounds and without a `[window]` table
    /// there is nothing to attach `dt` or `time_axis` to, so they are ignored.
    pub fn override_window(
        &mut self,
        bounds: Option<(f64, f64)>,
        dt: Option<f64>,
        time_axis: Option<PathBuf>,
    ) {
        let window = match (self.window.take(), bounds) {
            (Some(mut window), bounds) => {
                if let Some((tmin, tmax)) = bounds {
                    window.tmin = tmin;
                    window.tmax = tmax;
                }
                window
            }
            (None, Some((tmin, tmax))) => WindowConfig {
                tmin,
                tmax,
                dt: None,
                time_axis: None,
            },
            (None, None) => return,
        };
        self.window = Some(WindowConfig {
            dt: dt.or(window.dt),
            time_axis: time_axis.or(window.time_axis),
            ..window
        });
    }

    /// Steps selected by the configured window, for a table of `n_steps` columns.
    pub fn step_selection(&self, n_steps: usize) -> CurrentscapeResult<StepSelection> {
        let Some(window) = &self.window else {
            return Ok(StepSelection::All);
        };
        if let Some(path) = &window.time_axis {
            let axis = crate::csv::read_time_axis(path)?;
            return Ok(StepSelection::Window {
                axis,
                tmin: window.tmin,
                tmax: window.tmax,
            });
        }
        match window.dt {
            Some(dt) if dt > 0.0 => Ok(StepSelection::uniform_window(
                dt,
                n_steps,
                window.tmin,
                window.tmax,
            )),
            Some(dt) => Err(ConfigError::InvalidWindow {
                message: format!("dt must be positive, got {dt}"),
            }
            .into()),
            None => Err(ConfigError::InvalidWindow {
                message: "a window needs either `dt` or `time_axis`".into(),
            }
            .into()),
        }
    }
}
