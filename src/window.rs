//! Which time steps to partition.

use crate::error::{ConfigError, CurrentscapeResult, TableError};

/// A set of time-step indices, resolved against a table's column count.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum StepSelection {
    /// Every column of the table.
    #[default]
    All,
    /// Explicit column indices, in the order they should be reported.
    Indices(Vec<usize>),
    /// Steps whose time lies strictly between `tmin` and `tmax`.
    Window { axis: Vec<f64>, tmin: f64, tmax: f64 },
}

impl StepSelection {
    /// Window over a uniform time axis `t_i = i * dt` of `n_steps` points.
    pub fn uniform_window(dt: f64, n_steps: usize, tmin: f64, tmax: f64) -> Self {
        StepSelection::Window {
            axis: (0..n_steps).map(|i| i as f64 * dt).collect(),
            tmin,
            tmax,
        }
    }

    /// Resolve to concrete indices below `n_steps`.
    pub fn resolve(&self, n_steps: usize) -> CurrentscapeResult<Vec<usize>> {
        let steps = match self {
            StepSelection::All => (0..n_steps).collect(),
            StepSelection::Indices(steps) => steps.clone(),
            StepSelection::Window { axis, tmin, tmax } => {
                if !(tmin < tmax) {
                    return Err(ConfigError::InvalidWindow {
                        message: format!("tmin ({tmin}) must be smaller than tmax ({tmax})"),
                    }
                    .into());
                }
                axis.iter()
                    .enumerate()
                    .filter(|&(_, &t)| t > *tmin && t < *tmax)
                    .map(|(i, _)| i)
                    .collect()
            }
        };
        if let Some(&step) = steps.iter().find(|&&s| s >= n_steps) {
            return Err(TableError::StepOutOfRange { step, n_steps }.into());
        }
        Ok(steps)
    }
}
