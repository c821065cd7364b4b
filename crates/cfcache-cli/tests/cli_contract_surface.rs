// SPDX-License-Identifier: Apache-2.0

use assert_cmd::Command;
use cfcache::{AngleBucket, CacheConfig, CommitRequest, KernelCache};
use cfcache_model::{Complex32, GridCoordinates, KernelPlane, Support};
use std::path::Path;
use tempfile::tempdir;

fn cfcache() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_cfcache"));
    for var in [
        "CFCACHE_DIR",
        "CFCACHE_PLANE_PREFIX",
        "CFCACHE_AGGREGATE_NAME",
        "CFCACHE_TOLERANCE_DEG",
        "CFCACHE_VERIFY_ON_OPEN",
        "RUST_LOG",
    ] {
        cmd.env_remove(var);
    }
    cmd.env("CFCACHE_LOG_LEVEL", "error");
    cmd
}

fn populate(root: &Path, angles_deg: &[f64]) {
    let mut cache = KernelCache::open(CacheConfig::with_root(root)).expect("open cache");
    for angle in angles_deg {
        let plane = |n: usize| {
            KernelPlane::new([n, n], vec![vec![Complex32::new(0.5, -0.25); n * n]]).expect("plane")
        };
        cache
            .commit(CommitRequest {
                planes: vec![plane(5), plane(7)],
                grid: GridCoordinates {
                    shape: [64, 64],
                    increment_rad: [1.0e-5, 1.0e-5],
                    reference_pixel: [32.0, 32.0],
                    reference_value_rad: [0.0, 0.0],
                    reference_frequency_hz: 1.4e9,
                },
                supports: vec![
                    Support::symmetric(2).expect("support"),
                    Support::symmetric(3).expect("support"),
                ],
                sampling: 4.0,
                angle_rad: angle.to_radians(),
                bucket: AngleBucket::New,
            })
            .expect("commit");
    }
    cache.finalize().expect("finalize");
}

fn stdout_json(output: &std::process::Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).expect("json stdout")
}

#[test]
fn help_lists_inspect_and_verify() {
    let output = cfcache().arg("--help").output().expect("run help");
    assert!(output.status.success());
    let text = String::from_utf8(output.stdout).expect("utf8 help");
    assert!(text.contains("inspect"));
    assert!(text.contains("verify"));
    assert!(text.contains("CFCACHE_LOG_LEVEL"));
}

#[test]
fn inspect_reports_entries_in_both_angle_forms() {
    let tmp = tempdir().expect("tmp");
    populate(tmp.path(), &[12.5, 47.0]);

    let output = cfcache()
        .args(["--json", "inspect", "--root"])
        .arg(tmp.path())
        .output()
        .expect("run inspect");
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let json = stdout_json(&output);
    assert_eq!(json["entry_count"], 2);
    assert_eq!(json["plane_count"], 2);
    assert_eq!(json["plane_files"], 4);
    assert_eq!(json["aggregate_present"], false);
    assert_eq!(json["entries"][1]["id"], 1);
    let angle = json["entries"][1]["angle_deg"].as_f64().expect("angle_deg");
    assert!((angle - 47.0).abs() < 1e-9);
    assert_eq!(json["entries"][0]["supports"], serde_json::json!([[2, 2], [3, 3]]));
}

#[test]
fn inspect_text_output_is_human_readable() {
    let tmp = tempdir().expect("tmp");
    populate(tmp.path(), &[12.5]);

    let output = cfcache()
        .args(["inspect", "--root"])
        .arg(tmp.path())
        .output()
        .expect("run inspect");
    assert!(output.status.success());
    let text = String::from_utf8(output.stdout).expect("utf8");
    assert!(text.contains("entries: 1"), "{text}");
    assert!(text.contains("12.5000 deg"), "{text}");
    assert!(text.contains("absent"), "{text}");
}

#[test]
fn verify_clean_root_succeeds() {
    let tmp = tempdir().expect("tmp");
    populate(tmp.path(), &[10.0, 20.0]);

    let output = cfcache()
        .args(["--json", "verify", "--root"])
        .arg(tmp.path())
        .output()
        .expect("run verify");
    assert_eq!(output.status.code(), Some(0));
    assert_eq!(stdout_json(&output)["status"], "clean");
}

#[test]
fn verify_missing_plane_exits_validation_without_repairing() {
    let tmp = tempdir().expect("tmp");
    populate(tmp.path(), &[10.0, 20.0, 30.0]);
    std::fs::remove_file(tmp.path().join("CF1_1")).expect("remove plane");
    let aux_before = std::fs::read(tmp.path().join("aux.dat")).expect("aux");

    let output = cfcache()
        .args(["--json", "verify", "--root"])
        .arg(tmp.path())
        .output()
        .expect("run verify");
    assert_eq!(output.status.code(), Some(3));
    let json = stdout_json(&output);
    assert_eq!(json["status"], "findings");
    assert_eq!(json["report"]["incomplete"], serde_json::json!([1]));
    assert_eq!(
        std::fs::read(tmp.path().join("aux.dat")).expect("aux"),
        aux_before
    );
}

#[test]
fn corrupt_index_exits_validation_with_machine_error() {
    let tmp = tempdir().expect("tmp");
    std::fs::write(tmp.path().join("aux.dat"), "not an index\n").expect("write aux");

    let output = cfcache()
        .args(["--json", "inspect", "--root"])
        .arg(tmp.path())
        .output()
        .expect("run inspect");
    assert_eq!(output.status.code(), Some(3));
    let err: serde_json::Value = serde_json::from_slice(
        output
            .stderr
            .split(|b| *b == b'\n')
            .rfind(|line| !line.is_empty())
            .expect("stderr line"),
    )
    .expect("machine error json");
    assert_eq!(err["code"], "corrupt_metadata");
    assert!(err["details"]["path"]
        .as_str()
        .expect("path detail")
        .ends_with("aux.dat"));
}

#[test]
fn missing_root_is_a_dependency_failure_and_is_not_created() {
    let tmp = tempdir().expect("tmp");
    let root = tmp.path().join("absent");

    let output = cfcache()
        .args(["inspect", "--root"])
        .arg(&root)
        .output()
        .expect("run inspect");
    assert_eq!(output.status.code(), Some(4));
    assert!(!root.exists());
    let text = String::from_utf8(output.stderr).expect("utf8");
    assert!(text.contains("storage_unavailable"), "{text}");
}

#[test]
fn unknown_flag_returns_usage_exit_code_with_machine_error() {
    let output = cfcache()
        .args(["--json", "--unknown-flag"])
        .output()
        .expect("run");
    assert_eq!(output.status.code(), Some(2));
    let err: serde_json::Value = serde_json::from_slice(&output.stderr).expect("machine error");
    assert_eq!(err["code"], "usage_error");
}
