//! End-to-end integration tests for the currentscape pipeline.
//!
//! These tests start from current tables on disk, run the configured
//! analysis, and check the partition files written back out.

use std::path::Path;

use currentscape::apportion::Sign;
use currentscape::classify::PartitionBy;
use currentscape::config::{AnalysisConfig, WindowConfig};
use currentscape::csv::{CsvConfig, read_axial_table, read_source_table, write_partition_files};
use currentscape::engine::{Engine, PartitionResult};
use tempfile::TempDir;

fn write(dir: &Path, name: &str, content: &str) {
    std::fs::write(dir.join(name), content).unwrap();
}

/// Load `im.csv` and `iax.csv` from `dir` and run `config` over them.
fn run(dir: &Path, config: &AnalysisConfig, csv: &CsvConfig) -> PartitionResult {
    let membrane = read_source_table(&dir.join("im.csv"), csv).unwrap();
    let axial = read_axial_table(&dir.join("iax.csv"), csv).unwrap();
    let engine = Engine::new(config.engine_config(), config.partitioning().unwrap()).unwrap();
    let analysis = engine.prepare(&membrane, &axial).unwrap();
    let steps = config.step_selection(analysis.n_steps()).unwrap();
    analysis.partition(&steps).unwrap()
}

#[test]
fn dendritic_sources_reach_the_soma_through_files() {
    let tmp = TempDir::new().unwrap();
    write(
        tmp.path(),
        "im.csv",
        "segment,itype,0\n\
         soma,mech1,0\n\
         soma,mech2,0\n\
         dend1,mech1,0\n\
         dend2,mech1,7\n\
         dend2,mech2,3\n",
    );
    write(
        tmp.path(),
        "iax.csv",
        "ref,par,0\n\
         dend2,dend1,10\n\
         dend1,soma,10\n",
    );

    let csv = CsvConfig::default().precision(3);
    let result = run(tmp.path(), &AnalysisConfig::default(), &csv);
    assert_eq!(result.target, "soma");
    assert_eq!(result.stats.applied, 2);

    let out = tmp.path().join("out");
    let written = write_partition_files(&result, &out, &csv).unwrap();
    assert_eq!(written, vec![out.join("part_pos.csv"), out.join("part_neg.csv")]);

    let pos = std::fs::read_to_string(out.join("part_pos.csv")).unwrap();
    assert_eq!(pos, "itype,0\nmech1,7.000\nmech2,3.000\n");
    let neg = std::fs::read_to_string(out.join("part_neg.csv")).unwrap();
    assert!(neg.starts_with("itype,0\nmech1,"));
    assert_eq!(neg.lines().count(), 3);
}

#[test]
fn windowed_region_run_at_a_rerooted_section() {
    let tmp = TempDir::new().unwrap();
    // soma → dend(0) – dend(1) ← tip(0.5); current leaves the soma into dend.
    write(
        tmp.path(),
        "im.csv",
        "# four steps, dt = 0.5\n\
         segment,itype,0,1,2,3\n\
         soma,kdr,1,5,5,1\n\
         \"dend(0)\",kdr,0,0,0,0\n\
         \"dend(1)\",nax,0,0,0,0\n\
         \"tip(0.5)\",AMPA,2,2,2,2\n",
    );
    write(
        tmp.path(),
        "iax.csv",
        "ref,par,0,1,2,3\n\
         dend(0),soma,-1,-5,-5,-1\n\
         dend(1),dend(0),-1,-1,-1,-1\n\
         tip(0.5),dend(1),2,2,2,2\n",
    );

    let regions = tmp.path().join("regions");
    std::fs::create_dir(&regions).unwrap();
    write(&regions, "somatic.txt", "soma\n");
    write(&regions, "basal.txt", "dend\ntip\n");

    let config = AnalysisConfig {
        target: "dend".into(),
        partition_by: PartitionBy::Region,
        regions_dir: Some(regions),
        region_order: vec!["somatic".into(), "basal".into()],
        parallel: false,
        window: Some(WindowConfig {
            tmin: 0.25,
            tmax: 1.25,
            dt: Some(0.5),
            time_axis: None,
        }),
        ..Default::default()
    };
    let path = tmp.path().join("analysis.toml");
    config.save(&path).unwrap();
    let config = AnalysisConfig::load(&path).unwrap();

    let csv = CsvConfig::default().precision(1);
    let result = run(tmp.path(), &config, &csv);
    assert_eq!(result.target, "dend");
    assert_eq!(result.steps, vec![1, 2]);
    assert_eq!(
        result.labels,
        vec!["basal_intrinsic", "basal_synaptic", "somatic_intrinsic"]
    );
    for step in 0..2 {
        let somatic = result.row(Sign::Positive, "somatic_intrinsic").unwrap()[step];
        let synaptic = result.row(Sign::Positive, "basal_synaptic").unwrap()[step];
        assert!((somatic - 5.0).abs() < 1e-9);
        assert!((synaptic - 2.0).abs() < 1e-9);
    }

    write_partition_files(&result, tmp.path(), &csv).unwrap();
    let pos = std::fs::read_to_string(tmp.path().join("part_pos.csv")).unwrap();
    assert_eq!(
        pos,
        "itype,1,2\nbasal_intrinsic,0.0,0.0\nbasal_synaptic,2.0,2.0\nsomatic_intrinsic,5.0,5.0\n"
    );
}
