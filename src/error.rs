//! Rich diagnostic error types for the currentscape engine.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes, help text, and source chains so users know exactly what
//! went wrong and how to fix it.
//!
//! Zero-sum pools and sign mismatches during apportionment are not errors; they
//! are counted in [`crate::engine::PartitionStats`].

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for the currentscape engine.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain (error codes, help text, source spans) through to the user.
#[derive(Debug, Error, Diagnostic)]
pub enum CurrentscapeError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Table(#[from] TableError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Topology(#[from] TopologyError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
}

/// Convenience alias used throughout the crate.
pub type CurrentscapeResult<T> = std::result::Result<T, CurrentscapeError>;

// ---------------------------------------------------------------------------
// Table errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum TableError {
    #[error("failed to read table {path}: {source}")]
    #[diagnostic(
        code(currentscape::table::io),
        help("Check that the file exists and is readable.")
    )]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed header in {origin}: {message}")]
    #[diagnostic(
        code(currentscape::table::header),
        help(
            "The first line must name the two key columns followed by the \
             integer time-step indices 0, 1, 2, ... in order."
        )
    )]
    Header { origin: String, message: String },

    #[error("malformed row at {origin}:{line}: {message}")]
    #[diagnostic(
        code(currentscape::table::row),
        help(
            "Every data row needs two key fields followed by one numeric value \
             per time-step column."
        )
    )]
    Row {
        origin: String,
        line: usize,
        message: String,
    },

    #[error("row ({first}, {second}) has {actual} values, expected {expected}")]
    #[diagnostic(
        code(currentscape::table::length_mismatch),
        help("All rows of a table must cover the same time steps.")
    )]
    LengthMismatch {
        first: String,
        second: String,
        expected: usize,
        actual: usize,
    },

    #[error("duplicate row key ({first}, {second})")]
    #[diagnostic(
        code(currentscape::table::duplicate),
        help(
            "Each (compartment, source-label) and each (origin, destination) pair \
             may appear only once per table."
        )
    )]
    DuplicateRow { first: String, second: String },

    #[error("axial edge connects {compartment} to itself")]
    #[diagnostic(
        code(currentscape::table::self_loop),
        help("Axial currents flow between two distinct adjacent compartments.")
    )]
    SelfLoop { compartment: String },

    #[error("time step {step} is out of range (table has {n_steps} steps)")]
    #[diagnostic(
        code(currentscape::table::step_out_of_range),
        help("Requested time steps must be smaller than the number of table columns.")
    )]
    StepOutOfRange { step: usize, n_steps: usize },

    #[error("membrane table has {membrane} time steps but axial table has {axial}")]
    #[diagnostic(
        code(currentscape::table::step_count),
        help("Both tables must come from the same simulation run and cover the same steps.")
    )]
    StepCountMismatch { membrane: usize, axial: usize },

    #[error("{what} is empty")]
    #[diagnostic(
        code(currentscape::table::empty),
        help("The membrane table needs at least one row and one time step.")
    )]
    Empty { what: String },

    #[error("failed to write {path}: {source}")]
    #[diagnostic(
        code(currentscape::table::write),
        help("Ensure the output directory exists and is writable.")
    )]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

// ---------------------------------------------------------------------------
// Topology errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum TopologyError {
    #[error("axial edge ({origin}, {destination}) references unknown compartment {compartment}")]
    #[diagnostic(
        code(currentscape::topology::unknown_compartment),
        help(
            "Every compartment named by the axial table must have at least one row \
             in the membrane current table. Regenerate both tables from the same simulation."
        )
    )]
    UnknownCompartment {
        origin: String,
        destination: String,
        compartment: String,
    },

    #[error("axial edges form a cycle through ({origin}, {destination})")]
    #[diagnostic(
        code(currentscape::topology::cycle),
        help(
            "Neuronal morphologies are trees: exactly one path may connect any two \
             compartments. Look for duplicated or reversed edges in the axial table."
        )
    )]
    Cycle { origin: String, destination: String },

    #[error("target compartment {target} not found")]
    #[diagnostic(
        code(currentscape::topology::target_not_found),
        help(
            "The target must be a compartment of the membrane table, or a section \
             name whose segments are written as \"{target}(x)\"."
        )
    )]
    TargetNotFound { target: String },

    #[error("no axial path connects {from} and {to}")]
    #[diagnostic(
        code(currentscape::topology::disconnected),
        help("The target and the anatomical root must lie in the same tree.")
    )]
    Disconnected { from: String, to: String },

    #[error("cannot infer the anatomical root: {message}")]
    #[diagnostic(
        code(currentscape::topology::root),
        help(
            "Axial edges normally point toward the root, so exactly one compartment \
             has no outgoing edge. Pass the root explicitly with `--root`."
        )
    )]
    AmbiguousRoot { message: String },

    #[error("edge ({origin}, {destination}) points away from target {target}")]
    #[diagnostic(
        code(currentscape::topology::misoriented),
        help(
            "After rerooting every axial edge must point toward the target. \
             Check that the configured root matches the table's native orientation."
        )
    )]
    EdgeAwayFromTarget {
        origin: String,
        destination: String,
        target: String,
    },

    #[error("merging section {section} collapses two edges onto ({origin}, {destination})")]
    #[diagnostic(
        code(currentscape::topology::merge_collision),
        help(
            "Two boundary edges of the merged section connect to the same outside \
             compartment, which would create a cycle."
        )
    )]
    MergeCollision {
        section: String,
        origin: String,
        destination: String,
    },
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("region partitioning requested without a region-list source")]
    #[diagnostic(
        code(currentscape::config::missing_regions),
        help(
            "Set `regions_dir` in the config file or pass `--regions-dir` pointing \
             at a directory with one <region>.txt member list per region."
        )
    )]
    MissingRegionSource,

    #[error("failed to read region list {path}")]
    #[diagnostic(
        code(currentscape::config::region_list),
        help("Each configured region needs a readable <region>.txt file in the regions directory.")
    )]
    RegionList {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("unknown partitioning strategy \"{name}\"")]
    #[diagnostic(
        code(currentscape::config::strategy),
        help("Valid strategies are \"type\" and \"region\".")
    )]
    UnknownStrategy { name: String },

    #[error("invalid time window: {message}")]
    #[diagnostic(
        code(currentscape::config::window),
        help("Provide tmin < tmax and either `dt` or a time axis file.")
    )]
    InvalidWindow { message: String },

    #[error("failed to read config: {path}")]
    #[diagnostic(
        code(currentscape::config::read),
        help("Ensure the config file exists and is valid TOML.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {message}")]
    #[diagnostic(
        code(currentscape::config::parse),
        help("Check the TOML syntax and field names in the config file.")
    )]
    Parse { path: String, message: String },

    #[error("failed to serialize {what}: {message}")]
    #[diagnostic(
        code(currentscape::config::serialize),
        help("Every value must be representable in TOML; check for NaN or nested arrays of tables.")
    )]
    Serialize { what: String, message: String },

    #[error("failed to write config: {path}")]
    #[diagnostic(
        code(currentscape::config::write),
        help("Ensure you have write permissions to the target directory.")
    )]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
