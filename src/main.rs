//! currentscape CLI: partition membrane currents of a simulated neuron.

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use serde::Serialize;

use currentscape::apportion::Sign;
use currentscape::classify::{MechanismClasses, PartitionBy};
use currentscape::config::AnalysisConfig;
use currentscape::csv::{
    CsvConfig, read_axial_table, read_source_table, write_axial_table, write_partition_files,
    write_source_table,
};
use currentscape::engine::Engine;
use currentscape::reroot::reroot;
use currentscape::table::{AxialTable, SourceTable};

#[derive(Parser)]
#[command(
    name = "currentscape",
    version,
    about = "Partition neuronal membrane currents into their sources"
)]
struct Cli {
    /// Analysis config file (TOML). Command-line flags override its values.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Inputs {
    /// Membrane current table (`segment,itype,0,1,...`).
    #[arg(long, default_value = "im.csv")]
    membrane: PathBuf,

    /// Axial current table (`ref,par,0,1,...`).
    #[arg(long, default_value = "iax.csv")]
    axial: PathBuf,

    /// Column delimiter of input and output tables (one ASCII character).
    #[arg(long, default_value = ",", value_parser = parse_delimiter)]
    delimiter: u8,
}

fn parse_delimiter(s: &str) -> std::result::Result<u8, String> {
    match s.as_bytes() {
        [b] if b.is_ascii() => Ok(*b),
        _ => Err(format!("\"{s}\" is not a single ASCII character")),
    }
}

impl Inputs {
    fn csv(&self) -> CsvConfig {
        CsvConfig::default().delimiter(self.delimiter)
    }

    fn load(&self) -> Result<(SourceTable, AxialTable)> {
        let csv = self.csv();
        let membrane = read_source_table(&self.membrane, &csv)?;
        let axial = read_axial_table(&self.axial, &csv)?;
        Ok((membrane, axial))
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Decompose the target's membrane current and write part_pos.csv / part_neg.csv.
    Partition {
        #[command(flatten)]
        inputs: Inputs,

        /// Compartment or section to decompose (default: soma).
        #[arg(long)]
        target: Option<String>,

        /// Anatomical root of the tables (default: inferred).
        #[arg(long)]
        root: Option<String>,

        /// Labelling strategy: "type" or "region".
        #[arg(long)]
        partition_by: Option<PartitionBy>,

        /// Directory with one <region>.txt member list per region.
        #[arg(long)]
        regions_dir: Option<PathBuf>,

        /// Mechanism table (TOML) replacing the built-in one.
        #[arg(long)]
        mechanisms: Option<PathBuf>,

        /// Start of the time window (exclusive).
        #[arg(long, requires = "tmax")]
        tmin: Option<f64>,

        /// End of the time window (exclusive).
        #[arg(long, requires = "tmin")]
        tmax: Option<f64>,

        /// Uniform simulation time step, for the window.
        #[arg(long)]
        dt: Option<f64>,

        /// File with one time value per step, for the window.
        #[arg(long)]
        time_axis: Option<PathBuf>,

        /// Process time steps on a single thread.
        #[arg(long)]
        serial: bool,

        /// Decimal places in the result files (default: shortest exact).
        #[arg(long)]
        precision: Option<usize>,

        /// Directory for the result files.
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,
    },

    /// Merge a section, reroot the tables there and write them back.
    Reroot {
        #[command(flatten)]
        inputs: Inputs,

        /// Section that becomes the new root.
        #[arg(long)]
        target: String,

        /// Anatomical root of the tables (default: inferred).
        #[arg(long)]
        root: Option<String>,

        /// Directory for the rerooted im.csv and iax.csv.
        #[arg(long)]
        output_dir: PathBuf,
    },

    /// Summarize the input tables.
    Inspect {
        #[command(flatten)]
        inputs: Inputs,

        /// Print the summary as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Print the mechanism classification table as TOML.
    Mechanisms,
}

/// Summary printed by `inspect`.
#[derive(Serialize)]
struct TableSummary {
    steps: usize,
    compartments: usize,
    rows: usize,
    edges: usize,
    root: Option<String>,
    root_error: Option<String>,
    labels: Vec<String>,
    unclassified: Vec<String>,
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AnalysisConfig::load(path)?,
        None => AnalysisConfig::default(),
    };

    match cli.command {
        Commands::Partition {
            inputs,
            target,
            root,
            partition_by,
            regions_dir,
            mechanisms,
            tmin,
            tmax,
            dt,
            time_axis,
            serial,
            precision,
            output_dir,
        } => {
            if let Some(target) = target {
                config.target = target;
            }
            if root.is_some() {
                config.root = root;
            }
            if let Some(partition_by) = partition_by {
                config.partition_by = partition_by;
            }
            if regions_dir.is_some() {
                config.regions_dir = regions_dir;
            }
            if mechanisms.is_some() {
                config.mechanisms = mechanisms;
            }
            if serial {
                config.parallel = false;
            }
            config.override_window(tmin.zip(tmax), dt, time_axis);

            // Strategy first: a bad region setup fails before any table is read.
            let strategy = config.partitioning()?;
            let (membrane, axial) = inputs.load()?;
            let engine = Engine::new(config.engine_config(), strategy)?;
            let analysis = engine.prepare(&membrane, &axial)?;
            let steps = config.step_selection(analysis.n_steps())?;
            let result = analysis.partition(&steps)?;

            let mut csv = inputs.csv();
            if let Some(p) = precision {
                csv = csv.precision(p);
            }
            let written = write_partition_files(&result, &output_dir, &csv)?;

            println!(
                "Partitioned {} over {} steps ({} labels, {} apportionments)",
                result.target,
                result.steps.len(),
                result.labels.len(),
                result.stats.applied
            );
            let pos = result.pool(Sign::Positive);
            let neg = result.pool(Sign::Negative);
            for (i, label) in result.labels.iter().enumerate() {
                let out: f64 = pos[i].iter().sum();
                let inw: f64 = neg[i].iter().sum();
                println!("  {label:<24} outward {out:>14.6}  inward {inw:>14.6}");
            }
            for path in written {
                println!("Wrote {}", path.display());
            }
        }

        Commands::Reroot {
            inputs,
            target,
            root,
            output_dir,
        } => {
            let (membrane, axial) = inputs.load()?;
            let root = match root.or(config.root) {
                Some(root) => root,
                None => axial.infer_root()?,
            };
            let rerooted = reroot(&membrane, &axial, &target, &root)?;

            let csv = inputs.csv();
            let im = output_dir.join("im.csv");
            let iax = output_dir.join("iax.csv");
            write_source_table(&rerooted.sources, &im, &csv)?;
            write_axial_table(&rerooted.axial, &iax, &csv)?;

            println!("Rerooted at {target} (anatomical root {root})");
            if let Some(boundary) = &rerooted.boundary {
                println!("  merged segments: {}", boundary.members.len());
                println!("  proximal:        {}", boundary.proximal.join(", "));
                println!("  distal:          {}", boundary.distal.join(", "));
            }
            println!("  reversed edges:  {}", rerooted.reversed.len());
            println!("Wrote {} and {}", im.display(), iax.display());
        }

        Commands::Inspect { inputs, json } => {
            let (membrane, axial) = inputs.load()?;
            let mechanisms = load_mechanisms(config.mechanisms.as_deref())?;
            let summary = summarize(&membrane, &axial, &mechanisms);

            if json {
                let json = serde_json::to_string_pretty(&summary).into_diagnostic()?;
                println!("{json}");
            } else {
                println!("Membrane table: {}", inputs.membrane.display());
                println!("  steps:        {}", summary.steps);
                println!("  compartments: {}", summary.compartments);
                println!("  rows:         {}", summary.rows);
                println!("  labels:       {}", summary.labels.join(", "));
                if !summary.unclassified.is_empty() {
                    println!("  unclassified: {}", summary.unclassified.join(", "));
                }
                println!("Axial table: {}", inputs.axial.display());
                println!("  edges:        {}", summary.edges);
                match (&summary.root, &summary.root_error) {
                    (Some(root), _) => println!("  root:         {root}"),
                    (None, Some(err)) => println!("  root:         unknown ({err})"),
                    (None, None) => {}
                }
            }
        }

        Commands::Mechanisms => {
            let mechanisms = load_mechanisms(config.mechanisms.as_deref())?;
            print!("{}", mechanisms.to_toml()?);
        }
    }

    Ok(())
}

fn load_mechanisms(path: Option<&Path>) -> Result<MechanismClasses> {
    Ok(match path {
        Some(path) => MechanismClasses::load(path)?,
        None => MechanismClasses::builtin(),
    })
}

fn summarize(membrane: &SourceTable, axial: &AxialTable, mechanisms: &MechanismClasses) -> TableSummary {
    let labels: Vec<String> = membrane.labels().into_iter().map(str::to_string).collect();
    let unclassified = labels
        .iter()
        .filter(|l| !mechanisms.knows(l))
        .cloned()
        .collect();
    let (root, root_error) = match axial.infer_root() {
        Ok(root) => (Some(root), None),
        Err(e) => (None, Some(e.to_string())),
    };
    TableSummary {
        steps: membrane.n_steps(),
        compartments: membrane.compartments().len(),
        rows: membrane.len(),
        edges: axial.len(),
        root,
        root_error,
        labels,
        unclassified,
    }
}
