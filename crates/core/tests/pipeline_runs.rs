// crates/core/tests/pipeline_runs.rs
//
// Drives the pipeline end to end with an in-process toolchain fake, so the
// ordering, counting, and recording contracts are tested without spawning
// a single subprocess.

use std::fs;
use std::path::Path;
use std::sync::Mutex;

use bhive_core::config::{DataLayout, RunConfig};
use bhive_core::db::{RunDb, RunStatus};
use bhive_core::model::{MicroArch, ProcessedBlockRecord};
use bhive_core::pipeline::{run, RunError};
use bhive_core::toolchain::{BlockToolchain, Disassembly, ToolError, ToolResult};
use tempfile::tempdir;

/// Deterministic toolchain fake: output derives from the hex string, and an
/// optional set of hexes fails disassembly.
struct FakeToolchain {
    fail_hexes: Vec<String>,
    calls: Mutex<Vec<String>>,
}

impl FakeToolchain {
    fn new() -> Self {
        Self { fail_hexes: Vec::new(), calls: Mutex::new(Vec::new()) }
    }

    fn failing_on(hexes: &[&str]) -> Self {
        Self {
            fail_hexes: hexes.iter().map(|h| h.to_string()).collect(),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn seen_hexes(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl BlockToolchain for FakeToolchain {
    fn disassemble(&self, hex: &str) -> ToolResult<Disassembly> {
        self.calls.lock().unwrap().push(hex.to_string());
        if self.fail_hexes.iter().any(|h| h == hex) {
            return Err(ToolError::MalformedOutput {
                tool: "disassembler",
                reason: "injected failure".to_string(),
            });
        }
        Ok(Disassembly {
            intel: format!("intel {hex}"),
            xml: format!("<block hex=\"{hex}\"/>"),
        })
    }

    fn tokenize(&self, hex: &str) -> ToolResult<String> {
        Ok(format!("<TOK> {hex}"))
    }
}

/// Lay out a benchmark data tree with one hsw table and an optional
/// exclusion list, plus an output directory.
fn setup_layout(root: &Path, rows: &[&str], exclusions: &[&str]) -> DataLayout {
    let data_dir = root.join("benchmark");
    let output_dir = root.join("out");
    fs::create_dir_all(data_dir.join("throughput")).expect("create throughput dir");
    fs::create_dir_all(&output_dir).expect("create output dir");

    let mut table = String::from("block_id,throughput,hex\n");
    for row in rows {
        table.push_str(row);
        table.push('\n');
    }
    fs::write(data_dir.join("throughput").join("hsw.csv"), table).expect("write table");

    if !exclusions.is_empty() {
        fs::write(data_dir.join("unreliable.csv"), exclusions.join("\n"))
            .expect("write exclusions");
    }

    DataLayout::new(&data_dir, &output_dir)
}

fn read_artifact(path: &Path) -> Vec<ProcessedBlockRecord> {
    serde_json::from_slice(&fs::read(path).expect("read artifact")).expect("decode artifact")
}

#[test]
fn full_run_writes_ordered_artifact_and_records_success() {
    let tmp = tempdir().expect("temp dir");
    let layout = setup_layout(tmp.path(), &["b1,1.0,90", "b2,2.0,4883ec08", "b3,0.5,c3"], &[]);
    let toolchain = FakeToolchain::new();
    let config = RunConfig { arch: MicroArch::Haswell, limit: 0, workers: Some(2) };

    let report = run(&layout, &toolchain, &config).expect("run");

    assert_eq!(report.summary.blocks_read, 3);
    assert_eq!(report.summary.blocks_written, 3);
    assert_eq!(report.summary.tool_failures, 0);

    let path = report.dataset_path.expect("dataset path");
    assert_eq!(path, layout.dataset_path(MicroArch::Haswell));
    let records = read_artifact(&path);
    let ids: Vec<&str> = records.iter().map(|r| r.block_id.as_str()).collect();
    assert_eq!(ids, ["b1", "b2", "b3"], "artifact must preserve table order");
    assert_eq!(records[1].asm_intel, "intel 4883ec08");
    assert_eq!(records[1].asm_xml, "<block hex=\"4883ec08\"/>");
    assert_eq!(records[1].tokens, "<TOK> 4883ec08");

    let db = RunDb::open(&layout.run_db_path).expect("open run db");
    let runs = db.list_runs(None).expect("list runs");
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].status, RunStatus::Succeeded);
    assert_eq!(runs[0].blocks_written, 3);
    assert_eq!(runs[0].workers, Some(2));
    assert!(runs[0].table_sha256.is_some());
    assert_eq!(runs[0].dataset_path.as_deref(), Some(path.display().to_string().as_str()));
}

#[test]
fn worker_count_does_not_change_the_artifact() {
    let rows: Vec<String> = (0..32).map(|i| format!("b{i},1.5,{:02x}", i + 1)).collect();
    let row_refs: Vec<&str> = rows.iter().map(|s| s.as_str()).collect();

    let tmp_serial = tempdir().expect("temp dir");
    let layout_serial = setup_layout(tmp_serial.path(), &row_refs, &[]);
    let serial_config = RunConfig { arch: MicroArch::Haswell, limit: 0, workers: Some(1) };
    run(&layout_serial, &FakeToolchain::new(), &serial_config).expect("serial run");

    let tmp_parallel = tempdir().expect("temp dir");
    let layout_parallel = setup_layout(tmp_parallel.path(), &row_refs, &[]);
    let parallel_config = RunConfig { arch: MicroArch::Haswell, limit: 0, workers: Some(4) };
    run(&layout_parallel, &FakeToolchain::new(), &parallel_config).expect("parallel run");

    let serial = fs::read(layout_serial.dataset_path(MicroArch::Haswell)).expect("serial bytes");
    let parallel =
        fs::read(layout_parallel.dataset_path(MicroArch::Haswell)).expect("parallel bytes");
    assert_eq!(serial, parallel);
}

#[test]
fn tool_failures_skip_blocks_and_mark_the_run_partial() {
    let tmp = tempdir().expect("temp dir");
    let layout = setup_layout(tmp.path(), &["b1,1.0,90", "b2,1.0,feed", "b3,1.0,c3"], &[]);
    let toolchain = FakeToolchain::failing_on(&["feed"]);
    let config = RunConfig { arch: MicroArch::Haswell, limit: 0, workers: Some(1) };

    let report = run(&layout, &toolchain, &config).expect("run");
    assert_eq!(report.summary.tool_failures, 1);
    assert_eq!(report.summary.blocks_written, 2);

    let records = read_artifact(&report.dataset_path.expect("dataset path"));
    let ids: Vec<&str> = records.iter().map(|r| r.block_id.as_str()).collect();
    assert_eq!(ids, ["b1", "b3"], "the failing block is dropped, order is kept");

    let db = RunDb::open(&layout.run_db_path).expect("open run db");
    assert_eq!(db.list_runs(None).expect("list")[0].status, RunStatus::Partial);
}

#[test]
fn excluded_blocks_never_reach_the_toolchain() {
    let tmp = tempdir().expect("temp dir");
    let layout = setup_layout(tmp.path(), &["b1,1.0,90", "b2,1.0,feed", "b3,1.0,c3"], &["b2"]);
    let toolchain = FakeToolchain::new();
    let config = RunConfig { arch: MicroArch::Haswell, limit: 0, workers: Some(1) };

    let report = run(&layout, &toolchain, &config).expect("run");
    assert_eq!(report.summary.blocks_excluded, 1);
    assert_eq!(report.summary.blocks_read, 3);
    assert_eq!(report.summary.blocks_written, 2);

    let seen = toolchain.seen_hexes();
    assert!(!seen.contains(&"feed".to_string()), "excluded hex was processed: {seen:?}");
}

#[test]
fn summary_counts_satisfy_the_written_equation() {
    let tmp = tempdir().expect("temp dir");
    let layout = setup_layout(
        tmp.path(),
        &["b1,1.0,90", "b2,1.0,feed", "b3,notanumber,c3", "b1,9.0,90", "b4,1.0,abcd"],
        &["b4"],
    );
    let toolchain = FakeToolchain::failing_on(&["feed"]);
    let config = RunConfig { arch: MicroArch::Haswell, limit: 0, workers: None };

    let report = run(&layout, &toolchain, &config).expect("run");
    let summary = report.summary;
    assert_eq!(summary.rows_malformed, 1);
    assert_eq!(summary.duplicate_ids, 1);
    assert_eq!(summary.blocks_excluded, 1);
    assert_eq!(summary.blocks_read, 3);
    assert_eq!(summary.tool_failures, 1);
    assert_eq!(
        summary.blocks_written,
        summary.blocks_read - summary.blocks_excluded - summary.tool_failures
    );
    assert_eq!(summary.blocks_written, 1);
}

#[test]
fn run_with_no_surviving_blocks_skips_the_artifact() {
    let tmp = tempdir().expect("temp dir");
    let layout = setup_layout(tmp.path(), &["b1,1.0,90"], &["b1"]);
    let config = RunConfig { arch: MicroArch::Haswell, limit: 0, workers: Some(1) };

    let report = run(&layout, &FakeToolchain::new(), &config).expect("run");
    assert!(report.dataset_path.is_none());
    assert_eq!(report.summary.blocks_written, 0);
    assert!(!layout.dataset_path(MicroArch::Haswell).exists());

    // Still recorded: a run that found nothing to convert is not a failure.
    let db = RunDb::open(&layout.run_db_path).expect("open run db");
    let runs = db.list_runs(None).expect("list");
    assert_eq!(runs[0].status, RunStatus::Succeeded);
    assert_eq!(runs[0].dataset_path, None);
}

#[test]
fn limit_caps_processed_blocks() {
    let tmp = tempdir().expect("temp dir");
    let layout = setup_layout(tmp.path(), &["b1,1.0,90", "b2,1.0,c3", "b3,1.0,ab"], &[]);
    let config = RunConfig { arch: MicroArch::Haswell, limit: 2, workers: Some(1) };

    let report = run(&layout, &FakeToolchain::new(), &config).expect("run");
    assert_eq!(report.summary.blocks_written, 2);

    let records = read_artifact(&report.dataset_path.expect("dataset path"));
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].block_id, "b1");
    assert_eq!(records[1].block_id, "b2");

    let db = RunDb::open(&layout.run_db_path).expect("open run db");
    assert_eq!(db.list_runs(None).expect("list")[0].block_limit, 2);
}

#[test]
fn missing_table_fails_the_run_and_records_it() {
    let tmp = tempdir().expect("temp dir");
    let data_dir = tmp.path().join("benchmark");
    let output_dir = tmp.path().join("out");
    fs::create_dir_all(&data_dir).expect("create data dir");
    fs::create_dir_all(&output_dir).expect("create output dir");
    let layout = DataLayout::new(&data_dir, &output_dir);
    let config = RunConfig { arch: MicroArch::Skylake, limit: 0, workers: Some(1) };

    let err = run(&layout, &FakeToolchain::new(), &config).unwrap_err();
    assert!(matches!(err, RunError::Input(_)), "unexpected error: {err}");

    let db = RunDb::open(&layout.run_db_path).expect("open run db");
    let runs = db.list_runs(Some("skl")).expect("list");
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].status, RunStatus::Failed);
    assert_eq!(runs[0].blocks_written, 0);
    assert_eq!(runs[0].dataset_path, None);
}

#[test]
fn rerun_replaces_the_existing_artifact() {
    let tmp = tempdir().expect("temp dir");
    let layout = setup_layout(tmp.path(), &["b1,1.0,90"], &[]);
    let config = RunConfig { arch: MicroArch::Haswell, limit: 0, workers: Some(1) };

    run(&layout, &FakeToolchain::new(), &config).expect("first run");
    run(&layout, &FakeToolchain::new(), &config).expect("second run");

    let db = RunDb::open(&layout.run_db_path).expect("open run db");
    assert_eq!(db.list_runs(None).expect("list").len(), 2);
    assert_eq!(read_artifact(&layout.dataset_path(MicroArch::Haswell)).len(), 1);
}
