#![expect(
    clippy::expect_used,
    reason = "behaviour tests use expect for readable failures"
)]

//! Behavioural tests running the driver over a directory of unit files.

use std::cell::RefCell;
use std::fs;

use addrsync_core::{
    ChangeDocument, DriverConfig, EngineConfig, NoCorrection, ReconciliationDriver, RunSummary,
    UnitGroup, UnitId,
};
use addrsync_data::{DirectorySource, JsonChangeSink, UnitFile};
use camino::{Utf8Path, Utf8PathBuf};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use serde_json::json;
use tempfile::TempDir;

const LON: f64 = 10.742;
const LAT: f64 = 59.911;

struct DirectoryWorld {
    _dir: TempDir,
    input: Utf8PathBuf,
    output: Utf8PathBuf,
    engine: RefCell<EngineConfig>,
    summary: RefCell<Option<RunSummary>>,
}

impl DirectoryWorld {
    fn unit_path(&self, unit: &str, file: UnitFile) -> Utf8PathBuf {
        DirectorySource::new(self.input.clone()).path(&UnitId::from(unit), file)
    }

    fn summary(&self) -> RunSummary {
        self.summary
            .borrow()
            .clone()
            .expect("the driver must run first")
    }
}

#[fixture]
fn world() -> DirectoryWorld {
    let dir = TempDir::new().expect("tempdir");
    let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 tempdir");
    let input = root.join("units");
    fs::create_dir_all(input.as_std_path()).expect("create input dir");
    DirectoryWorld {
        _dir: dir,
        input,
        output: root.join("changes"),
        engine: RefCell::new(EngineConfig::default()),
        summary: RefCell::new(None),
    }
}

fn write_json(path: &Utf8Path, value: &serde_json::Value) {
    fs::write(path.as_std_path(), value.to_string()).expect("write unit file");
}

#[given("unit {unit} lists {count} registry addresses")]
fn unit_lists_addresses(world: &DirectoryWorld, unit: String, count: usize) {
    let rows: Vec<_> = (1..=count)
        .map(|number| {
            json!({
                "name": "Storgata",
                "number": number.to_string(),
                "postcode": "0155",
                "city": "Oslo",
                "lon": LON,
                "lat": LAT,
            })
        })
        .collect();
    write_json(
        &world.unit_path(&unit, UnitFile::Registry),
        &serde_json::Value::Array(rows),
    );
}

#[given("unit {unit} has a snapshot matching its registry")]
fn unit_has_matching_snapshot(world: &DirectoryWorld, unit: String) {
    write_json(
        &world.unit_path(&unit, UnitFile::Snapshot),
        &json!({
            "elements": [{
                "type": "node", "id": 77, "lat": LAT, "lon": LON, "version": 2,
                "tags": {
                    "addr:street": "Storgata",
                    "addr:housenumber": "1",
                    "addr:postcode": "0155",
                    "addr:city": "Oslo"
                }
            }]
        }),
    );
}

#[given("a change budget of {budget}")]
fn change_budget(world: &DirectoryWorld, budget: usize) {
    world.engine.borrow_mut().change_budget = budget;
}

#[when("the driver runs over unit {unit}")]
fn driver_runs(world: &DirectoryWorld, unit: String) {
    let source = DirectorySource::new(world.input.clone());
    let config = DriverConfig {
        engine: world.engine.borrow().clone(),
        ..DriverConfig::default()
    };
    let driver = ReconciliationDriver::new(
        source.clone(),
        source,
        JsonChangeSink::new(world.output.clone()),
        NoCorrection,
        config,
    )
    .expect("valid config");
    let summary = driver
        .run(&[UnitGroup::single(UnitId::from(unit.as_str()))])
        .expect("run succeeds");
    world.summary.replace(Some(summary));
}

#[then("{file} holds {count} changes")]
fn document_holds(world: &DirectoryWorld, file: String, count: usize) {
    let contents =
        fs::read_to_string(world.output.join(&file).as_std_path()).expect("document written");
    let document: ChangeDocument = serde_json::from_str(&contents).expect("document decodes");
    assert_eq!(document.change_count, count);
}

#[then("no manual upload is requested")]
fn no_manual_upload(world: &DirectoryWorld) {
    assert!(world.summary().manual_upload.is_empty());
}

#[then("{unit} is listed for manual upload")]
fn listed_for_manual_upload(world: &DirectoryWorld, unit: String) {
    assert_eq!(world.summary().manual_upload, vec![unit]);
}

#[then("no document is written for {unit}")]
fn nothing_written(world: &DirectoryWorld, unit: String) {
    for suffix in ["upload.json", "manual.json"] {
        let path = world.output.join(format!("{unit}.{suffix}"));
        assert!(!path.as_std_path().exists(), "unexpected {path}");
    }
}

#[then("the report for {unit} counts {count} direct matches")]
fn report_counts_direct(world: &DirectoryWorld, unit: String, count: usize) {
    let summary = world.summary();
    let report = summary
        .reports
        .iter()
        .find(|report| report.unit.as_str() == unit)
        .expect("report for unit");
    assert_eq!(report.direct, count);
    assert_eq!(report.counters.total, 0);
}

#[scenario(path = "tests/features/directory_run.feature", index = 0)]
fn unit_without_snapshot(world: DirectoryWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/directory_run.feature", index = 1)]
fn unit_in_sync(world: DirectoryWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/directory_run.feature", index = 2)]
fn oversized_unit(world: DirectoryWorld) {
    let _ = world;
}
