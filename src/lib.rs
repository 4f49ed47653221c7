// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # currentscape
//!
//! Current partitioning for multi-compartment neuron simulations: decompose
//! the membrane current of one target compartment into the contributions of
//! every ionic and synaptic source in the cell, following the axial currents
//! through the dendritic tree.
//!
//! ## Architecture
//!
//! - **Tables** (`table`, `csv`): membrane currents per (compartment, source-label)
//!   and axial currents per directed edge, one value per time step
//! - **Rerooting** (`reroot`): merge the target section and reverse the path to
//!   the anatomical root so every edge points toward the target
//! - **Classification** (`classify`): per-mechanism labels or combined
//!   `{region}_{class}` labels
//! - **Topology** (`topology`): petgraph compartment tree and the leaves-first
//!   traversal order
//! - **Apportionment** (`apportion`): signed per-step pools and the proportional split
//! - **Engine** (`engine`): prepare once, then partition time steps on the rayon pool
//!
//! ## Library usage
//!
//! ```no_run
//! use std::path::Path;
//!
//! use currentscape::classify::Partitioning;
//! use currentscape::csv::{CsvConfig, read_axial_table, read_source_table};
//! use currentscape::engine::{Engine, EngineConfig};
//! use currentscape::window::StepSelection;
//!
//! let csv = CsvConfig::default();
//! let membrane = read_source_table(Path::new("im.csv"), &csv).unwrap();
//! let axial = read_axial_table(Path::new("iax.csv"), &csv).unwrap();
//!
//! let engine = Engine::new(EngineConfig::default(), Partitioning::ByType).unwrap();
//! let result = engine.run(&membrane, &axial, &StepSelection::All).unwrap();
//! for (label, row) in result.labels.iter().zip(&result.positive) {
//!     println!("{label}: {row:?}");
//! }
//! ```

pub mod apportion;
pub mod classify;
pub mod compartment;
pub mod config;
pub mod csv;
pub mod engine;
pub mod error;
pub mod reroot;
pub mod table;
pub mod topology;
pub mod window;
