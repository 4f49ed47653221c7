//! Multi-index CSV layout for current tables and partition results.
//!
//! Input tables have two key columns followed by one column per time step,
//! headed by the integers `0, 1, ..., N-1`:
//!
//! ```text
//! segment,itype,0,1,2
//! soma,kdr,0.1,0.2,0.0
//! dend1(0.5),AMPA,-0.3,0.0,0.0
//! ```
//!
//! Axial tables use `ref,par` as key columns. Blank lines and lines starting
//! with `#` are skipped, and quoted fields follow the usual CSV rules.
//!
//! A partition result is written as one file per sign, headed `itype` followed
//! by the selected step indices, one row per source-label.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use crate::apportion::Sign;
use crate::engine::PartitionResult;
use crate::error::TableError;
use crate::table::{AxialTable, SourceTable};

/// File names of the two result files, by sign.
pub fn partition_file_name(sign: Sign) -> String {
    format!("part_{}.csv", sign.as_str())
}

/// Delimiter and number formatting for reading and writing tables.
#[derive(Debug, Clone, PartialEq)]
pub struct CsvConfig {
    /// Column delimiter (default: `b','`).
    pub delimiter: u8,
    /// Fixed number of decimals; `None` writes the shortest exact representation.
    pub precision: Option<usize>,
}

impl Default for CsvConfig {
    fn default() -> Self {
        Self {
            delimiter: b',',
            precision: None,
        }
    }
}

impl CsvConfig {
    pub fn delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn precision(mut self, precision: usize) -> Self {
        self.precision = Some(precision);
        self
    }

    fn format_value(&self, value: f64) -> String {
        match self.precision {
            Some(p) => format!("{value:.p$}"),
            None => format!("{value}"),
        }
    }

    fn reader<R: Read>(&self, input: R) -> csv::Reader<R> {
        csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .comment(Some(b'#'))
            .has_headers(true)
            .flexible(false)
            .trim(csv::Trim::All)
            .from_reader(input)
    }

    fn writer<W: Write>(&self, output: W) -> csv::Writer<W> {
        csv::WriterBuilder::new()
            .delimiter(self.delimiter)
            .from_writer(output)
    }
}

// =============================================================================
// Reading
// =============================================================================

struct Record {
    line: usize,
    first: String,
    second: String,
    values: Vec<f64>,
}

/// Parse a membrane-current table.
pub fn parse_source_table(
    content: &str,
    origin: &str,
    config: &CsvConfig,
) -> Result<SourceTable, TableError> {
    source_table_from(content.as_bytes(), origin, config)
}

/// Parse an axial-current table.
pub fn parse_axial_table(
    content: &str,
    origin: &str,
    config: &CsvConfig,
) -> Result<AxialTable, TableError> {
    axial_table_from(content.as_bytes(), origin, config)
}

pub fn read_source_table(path: &Path, config: &CsvConfig) -> Result<SourceTable, TableError> {
    let table = source_table_from(open(path)?, &path.display().to_string(), config)?;
    tracing::debug!(
        path = %path.display(),
        rows = table.len(),
        steps = table.n_steps(),
        "membrane table loaded"
    );
    Ok(table)
}

pub fn read_axial_table(path: &Path, config: &CsvConfig) -> Result<AxialTable, TableError> {
    let table = axial_table_from(open(path)?, &path.display().to_string(), config)?;
    tracing::debug!(
        path = %path.display(),
        edges = table.len(),
        steps = table.n_steps(),
        "axial table loaded"
    );
    Ok(table)
}

fn source_table_from<R: Read>(
    input: R,
    origin: &str,
    config: &CsvConfig,
) -> Result<SourceTable, TableError> {
    let (n_steps, records) = parse_records(input, origin, config)?;
    let mut table = SourceTable::new(n_steps);
    for r in records {
        table.insert(r.first, r.second, r.values)?;
    }
    Ok(table)
}

fn axial_table_from<R: Read>(
    input: R,
    origin: &str,
    config: &CsvConfig,
) -> Result<AxialTable, TableError> {
    let (n_steps, records) = parse_records(input, origin, config)?;
    let mut table = AxialTable::new(n_steps);
    for r in records {
        let line = r.line;
        table
            .insert(r.first, r.second, r.values)
            .map_err(|e| match e {
                TableError::SelfLoop { compartment } => TableError::Row {
                    origin: origin.to_string(),
                    line,
                    message: format!("edge connects {compartment} to itself"),
                },
                other => other,
            })?;
    }
    Ok(table)
}

/// Parse a time axis: floats separated by whitespace or commas.
pub fn parse_time_axis(content: &str, origin: &str) -> Result<Vec<f64>, TableError> {
    let mut axis = Vec::new();
    for (i, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.starts_with('#') {
            continue;
        }
        for token in line.split(|c: char| c == ',' || c.is_whitespace()) {
            if token.is_empty() {
                continue;
            }
            let t = token.parse::<f64>().map_err(|_| TableError::Row {
                origin: origin.to_string(),
                line: i + 1,
                message: format!("\"{token}\" is not a time value"),
            })?;
            axis.push(t);
        }
    }
    Ok(axis)
}

pub fn read_time_axis(path: &Path) -> Result<Vec<f64>, TableError> {
    let content = std::fs::read_to_string(path).map_err(|e| TableError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    parse_time_axis(&content, &path.display().to_string())
}

fn open(path: &Path) -> Result<std::io::BufReader<std::fs::File>, TableError> {
    let file = std::fs::File::open(path).map_err(|e| TableError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(std::io::BufReader::new(file))
}

/// Map a reader error to the line it occurred on.
fn record_error(origin: &str, err: csv::Error) -> TableError {
    let line = err
        .position()
        .map(|p| p.line() as usize)
        .unwrap_or_default();
    let message = match err.kind() {
        csv::ErrorKind::UnequalLengths {
            expected_len, len, ..
        } => format!("expected {expected_len} fields, found {len}"),
        _ => err.to_string(),
    };
    match err.into_kind() {
        csv::ErrorKind::Io(source) => TableError::Io {
            path: origin.to_string(),
            source,
        },
        _ => TableError::Row {
            origin: origin.to_string(),
            line,
            message,
        },
    }
}

fn parse_records<R: Read>(
    input: R,
    origin: &str,
    config: &CsvConfig,
) -> Result<(usize, Vec<Record>), TableError> {
    let header_err = |message: String| TableError::Header {
        origin: origin.to_string(),
        message,
    };

    let mut reader = config.reader(input);
    let header = reader
        .headers()
        .map_err(|e| record_error(origin, e))?
        .clone();
    if header.is_empty() {
        return Err(header_err("no header line".into()));
    }
    if header.len() < 3 {
        return Err(header_err(format!(
            "expected two key columns and at least one time step, found {} columns",
            header.len()
        )));
    }
    for (expected, name) in header.iter().skip(2).enumerate() {
        if name.parse::<usize>().ok() != Some(expected) {
            return Err(header_err(format!(
                "time-step column {} is named \"{name}\", expected \"{expected}\"",
                expected + 2
            )));
        }
    }
    let n_steps = header.len() - 2;

    let mut records = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| record_error(origin, e))?;
        let line = record
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or_default();
        let row_err = |message: String| TableError::Row {
            origin: origin.to_string(),
            line,
            message,
        };

        let first = record.get(0).unwrap_or_default();
        let second = record.get(1).unwrap_or_default();
        if first.is_empty() || second.is_empty() {
            return Err(row_err("empty key field".into()));
        }
        let values = record
            .iter()
            .skip(2)
            .map(|f| {
                f.parse::<f64>()
                    .map_err(|_| row_err(format!("\"{f}\" is not a number")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        records.push(Record {
            line,
            first: first.to_string(),
            second: second.to_string(),
            values,
        });
    }
    Ok((n_steps, records))
}

// =============================================================================
// Writing
// =============================================================================

fn create(path: &Path) -> Result<std::io::BufWriter<std::fs::File>, TableError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| TableError::Write {
            path: parent.display().to_string(),
            source: e,
        })?;
    }
    let file = std::fs::File::create(path).map_err(|e| TableError::Write {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(std::io::BufWriter::new(file))
}

fn write_rows<'a, I>(
    path: &Path,
    config: &CsvConfig,
    keys: &[&str],
    steps: &[usize],
    rows: I,
) -> Result<(), TableError>
where
    I: IntoIterator<Item = (Vec<&'a str>, &'a [f64])>,
{
    let write_err = |e: csv::Error| TableError::Write {
        path: path.display().to_string(),
        source: e.into(),
    };
    let mut out = config.writer(create(path)?);

    let header = keys
        .iter()
        .map(|k| k.to_string())
        .chain(steps.iter().map(usize::to_string));
    out.write_record(header).map_err(write_err)?;

    for (key, values) in rows {
        let fields = key
            .into_iter()
            .map(str::to_string)
            .chain(values.iter().map(|&v| config.format_value(v)));
        out.write_record(fields).map_err(write_err)?;
    }
    out.flush().map_err(|e| TableError::Write {
        path: path.display().to_string(),
        source: e,
    })
}

pub fn write_source_table(table: &SourceTable, path: &Path, config: &CsvConfig) -> Result<(), TableError> {
    let steps: Vec<usize> = (0..table.n_steps()).collect();
    write_rows(
        path,
        config,
        &["segment", "itype"],
        &steps,
        table.rows().map(|(c, l, v)| (vec![c, l], v)),
    )
}

pub fn write_axial_table(table: &AxialTable, path: &Path, config: &CsvConfig) -> Result<(), TableError> {
    let steps: Vec<usize> = (0..table.n_steps()).collect();
    write_rows(
        path,
        config,
        &["ref", "par"],
        &steps,
        table.edges().map(|(o, d, v)| (vec![o, d], v)),
    )
}

/// Write one pool of a partition result.
pub fn write_partition(
    result: &PartitionResult,
    sign: Sign,
    path: &Path,
    config: &CsvConfig,
) -> Result<(), TableError> {
    write_rows(
        path,
        config,
        &["itype"],
        &result.steps,
        result
            .labels
            .iter()
            .zip(result.pool(sign))
            .map(|(label, row)| (vec![label.as_str()], row.as_slice())),
    )
}

/// Write `part_pos.csv` and `part_neg.csv` into `dir`.
pub fn write_partition_files(
    result: &PartitionResult,
    dir: &Path,
    config: &CsvConfig,
) -> Result<Vec<PathBuf>, TableError> {
    let mut written = Vec::with_capacity(2);
    for sign in [Sign::Positive, Sign::Negative] {
        let path = dir.join(partition_file_name(sign));
        write_partition(result, sign, &path, config)?;
        tracing::info!(path = %path.display(), labels = result.labels.len(), "wrote {sign} partition");
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::PartitionStats;

    const MEMBRANE: &str = "\
# exported from the simulator
segment,itype,0,1,2
soma,kdr,0.5,-1.0,0.0

\"dend1(0.5)\",AMPA,-0.25,0,1e-3
";

    #[test]
    fn parses_membrane_table_with_comments_and_quotes() {
        let t = parse_source_table(MEMBRANE, "im.csv", &CsvConfig::default()).unwrap();
        assert_eq!(t.n_steps(), 3);
        assert_eq!(t.get("soma", "kdr").unwrap(), &[0.5, -1.0, 0.0]);
        assert_eq!(t.get("dend1(0.5)", "AMPA").unwrap(), &[-0.25, 0.0, 0.001]);
    }

    #[test]
    fn step_columns_must_be_contiguous() {
        let err = parse_source_table("segment,itype,0,2\nsoma,kdr,1,2\n", "im.csv", &CsvConfig::default())
            .unwrap_err();
        assert!(matches!(err, TableError::Header { .. }));

        let err = parse_source_table("segment,itype\n", "im.csv", &CsvConfig::default()).unwrap_err();
        assert!(matches!(err, TableError::Header { .. }));

        let err = parse_source_table("", "im.csv", &CsvConfig::default()).unwrap_err();
        assert!(matches!(err, TableError::Header { .. }));
    }

    #[test]
    fn bad_rows_report_their_line() {
        let content = "segment,itype,0,1\nsoma,kdr,1,2\nsoma,nax,1,oops\n";
        match parse_source_table(content, "im.csv", &CsvConfig::default()).unwrap_err() {
            TableError::Row { line, .. } => assert_eq!(line, 3),
            other => panic!("unexpected error: {other}"),
        }
        let short = "segment,itype,0,1\nsoma,kdr,1\n";
        assert!(matches!(
            parse_source_table(short, "im.csv", &CsvConfig::default()),
            Err(TableError::Row { line: 2, .. })
        ));
    }

    #[test]
    fn axial_self_loop_is_a_row_error() {
        let content = "ref,par,0\nsoma,soma,1.0\n";
        assert!(matches!(
            parse_axial_table(content, "iax.csv", &CsvConfig::default()),
            Err(TableError::Row { line: 2, .. })
        ));
    }

    #[test]
    fn semicolon_delimited_tables() {
        let config = CsvConfig::default().delimiter(b';');
        let t = parse_axial_table("ref;par;0;1\ndend;soma;1.5;-2\n", "iax.csv", &config).unwrap();
        assert_eq!(t.get("dend", "soma").unwrap(), &[1.5, -2.0]);
    }

    #[test]
    fn written_tables_read_back() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = CsvConfig::default();
        let t = parse_source_table(MEMBRANE, "im.csv", &config).unwrap();
        let path = tmp.path().join("out").join("im.csv");
        write_source_table(&t, &path, &config).unwrap();
        assert_eq!(read_source_table(&path, &config).unwrap(), t);

        let mut a = AxialTable::new(2);
        a.insert("a,b", "soma", vec![0.1, -0.2]).unwrap();
        let path = tmp.path().join("iax.csv");
        write_axial_table(&a, &path, &config).unwrap();
        assert_eq!(read_axial_table(&path, &config).unwrap(), a);
    }

    #[test]
    fn names_with_quotes_and_newlines_survive_a_rewrite() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = CsvConfig::default();
        let mut t = SourceTable::new(1);
        t.insert("odd\nname", "kdr", vec![1.0]).unwrap();
        t.insert("say \"hi\"", "nax", vec![-2.5]).unwrap();

        let path = tmp.path().join("im.csv");
        write_source_table(&t, &path, &config).unwrap();
        let back = read_source_table(&path, &config).unwrap();
        assert_eq!(back, t);
        assert_eq!(back.get("odd\nname", "kdr").unwrap(), &[1.0]);
    }

    #[test]
    fn partition_files_have_one_row_per_label() {
        let tmp = tempfile::TempDir::new().unwrap();
        let result = PartitionResult {
            target: "soma".into(),
            labels: vec!["AMPA".into(), "kdr".into()],
            steps: vec![3, 4],
            positive: vec![vec![0.0, 1.5], vec![2.0, 0.0]],
            negative: vec![vec![-1.0, 0.0], vec![0.0, 0.0]],
            stats: PartitionStats::default(),
        };
        let config = CsvConfig::default().precision(2);
        let written = write_partition_files(&result, tmp.path(), &config).unwrap();
        assert_eq!(written.len(), 2);

        let pos = std::fs::read_to_string(tmp.path().join("part_pos.csv")).unwrap();
        assert_eq!(pos, "itype,3,4\nAMPA,0.00,1.50\nkdr,2.00,0.00\n");
        let neg = std::fs::read_to_string(tmp.path().join("part_neg.csv")).unwrap();
        assert!(neg.starts_with("itype,3,4\nAMPA,-1.00,0.00\n"));
    }

    #[test]
    fn time_axis_accepts_commas_and_whitespace() {
        let axis = parse_time_axis("0.0, 0.025\n0.05 0.075\n# end\n", "taxis.txt").unwrap();
        assert_eq!(axis, vec![0.0, 0.025, 0.05, 0.075]);
        assert!(parse_time_axis("0.0 abc", "taxis.txt").is_err());
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        assert!(matches!(
            read_source_table(&tmp.path().join("nope.csv"), &CsvConfig::default()),
            Err(TableError::Io { .. })
        ));
    }
}
