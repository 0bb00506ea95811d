use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn marg_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("marg");
    path
}

const DUNE_A: &str = r#"
return {
    ["doc_props"] = {
        ["title"] = "Dune",
        ["authors"] = "Frank Herbert",
    },
    ["annotations"] = {
        [1] = {
            ["color"] = "yellow",
            ["text"] = "Fear is the mind-killer.",
            ["pos0"] = "a",
            ["pos1"] = "b",
            ["pageno"] = 42,
            ["chapter"] = "Ch1",
        },
    },
    ["partial_md5_checksum"] = "dune-sum-1",
}
"#;

// Same book, same highlight text, seen from a second device.
const DUNE_B: &str = r#"
return {
    ["doc_props"] = {
        ["title"] = "Dune",
    },
    ["annotations"] = {
        [1] = {
            ["color"] = "green",
            ["text"] = "Fear is the mind-killer.",
            ["pos0"] = "c",
            ["pos1"] = "d",
        },
    },
    ["partial_md5_checksum"] = "dune-sum-1",
}
"#;

const EARTHSEA: &str = r#"
return {
    ["doc_props"] = {
        ["title"] = "A Wizard of Earthsea",
        ["authors"] = "Ursula K. Le Guin",
    },
    ["annotations"] = {
        [1] = {
            ["color"] = "red",
            ["text"] = "To light a candle is to cast a shadow.",
            ["pos0"] = "x",
            ["pos1"] = "y",
        },
    },
    ["partial_md5_checksum"] = "earthsea-1",
}
"#;

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let readers = root.join("readers");
    fs::create_dir_all(readers.join("deviceA/Dune.sdr")).unwrap();
    fs::create_dir_all(readers.join("deviceB/Dune.sdr")).unwrap();
    fs::create_dir_all(readers.join("deviceB/Earthsea.sdr")).unwrap();
    fs::write(readers.join("deviceA/Dune.sdr/metadata.epub.lua"), DUNE_A).unwrap();
    fs::write(readers.join("deviceB/Dune.sdr/metadata.epub.lua"), DUNE_B).unwrap();
    fs::write(readers.join("deviceB/Earthsea.sdr/metadata.epub.lua"), EARTHSEA).unwrap();
    // A non-matching file that discovery must ignore.
    fs::write(readers.join("deviceA/notes.txt"), "not metadata").unwrap();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    let config_content = format!(
        r#"[db]
path = "{}/data/marginalia.sqlite"

[[sources]]
path = "{}/readers"
"#,
        root.display(),
        root.display()
    );
    let config_path = config_dir.join("marginalia.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_marg(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = marg_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run marg binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

#[test]
fn test_init_creates_database() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_marg(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_marg(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_marg(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_scan_imports_and_merges() {
    let (_tmp, config_path) = setup_test_env();

    run_marg(&config_path, &["init"]);
    let (stdout, stderr, success) = run_marg(&config_path, &["scan"]);
    assert!(success, "scan failed: stdout={}, stderr={}", stdout, stderr);

    // Three metadata files, two distinct books; the duplicate Dune highlight
    // from deviceB merges instead of creating a row.
    assert!(stdout.contains("files scanned: 3"), "stdout: {}", stdout);
    assert!(stdout.contains("new books: 2"), "stdout: {}", stdout);
    assert!(stdout.contains("new highlights: 2"), "stdout: {}", stdout);
    assert!(stdout.contains("ok"));
}

#[test]
fn test_rescan_is_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    run_marg(&config_path, &["init"]);
    run_marg(&config_path, &["scan"]);
    let (stdout, _, success) = run_marg(&config_path, &["scan"]);
    assert!(success);
    assert!(stdout.contains("new books: 0"), "stdout: {}", stdout);
    assert!(stdout.contains("new highlights: 0"), "stdout: {}", stdout);
}

#[test]
fn test_scan_json_summary() {
    let (_tmp, config_path) = setup_test_env();

    run_marg(&config_path, &["init"]);
    let (stdout, _, success) = run_marg(&config_path, &["scan", "--json"]);
    assert!(success);
    let summary: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(summary["files_scanned"], 3);
    assert_eq!(summary["new_books"], 2);
    assert_eq!(summary["new_highlights"], 2);
}

#[test]
fn test_scan_dry_run_writes_nothing() {
    let (_tmp, config_path) = setup_test_env();

    run_marg(&config_path, &["init"]);
    let (stdout, _, success) = run_marg(&config_path, &["scan", "--dry-run"]);
    assert!(success);
    assert!(stdout.contains("dry-run"));
    assert!(stdout.contains("total files: 3"), "stdout: {}", stdout);

    // Nothing was imported.
    let (stdout, _, _) = run_marg(&config_path, &["scan"]);
    assert!(stdout.contains("new books: 2"), "stdout: {}", stdout);
}

#[test]
fn test_import_single_file() {
    let (tmp, config_path) = setup_test_env();

    run_marg(&config_path, &["init"]);
    let file = tmp
        .path()
        .join("readers/deviceA/Dune.sdr/metadata.epub.lua");
    let (stdout, stderr, success) = run_marg(
        &config_path,
        &["import", file.to_str().unwrap(), "--device", "deviceA"],
    );
    assert!(success, "import failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("new highlights: 1"), "stdout: {}", stdout);

    // Importing the same file again creates nothing.
    let (stdout, _, _) = run_marg(
        &config_path,
        &["import", file.to_str().unwrap(), "--device", "deviceA"],
    );
    assert!(stdout.contains("new highlights: 0"), "stdout: {}", stdout);
}

#[test]
fn test_stats_after_scan() {
    let (_tmp, config_path) = setup_test_env();

    run_marg(&config_path, &["init"]);
    run_marg(&config_path, &["scan"]);
    let (stdout, _, success) = run_marg(&config_path, &["stats"]);
    assert!(success);
    assert!(stdout.contains("Books:        2"), "stdout: {}", stdout);
    assert!(stdout.contains("Highlights:   2"), "stdout: {}", stdout);
    assert!(stdout.contains("deviceA"), "stdout: {}", stdout);
    assert!(stdout.contains("deviceB"), "stdout: {}", stdout);
}

#[test]
fn test_sources_listing() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_marg(&config_path, &["sources"]);
    assert!(success);
    assert!(stdout.contains("readers"));
    assert!(stdout.contains("yes"));
}

#[test]
fn test_scan_missing_root_is_not_fatal() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    let config_path = root.join("marginalia.toml");
    fs::write(
        &config_path,
        format!(
            r#"[db]
path = "{}/data/marginalia.sqlite"

[[sources]]
path = "{}/does-not-exist"
"#,
            root.display(),
            root.display()
        ),
    )
    .unwrap();

    run_marg(&config_path, &["init"]);
    let (stdout, _, success) = run_marg(&config_path, &["scan"]);
    assert!(success, "scan over a missing root must not fail");
    assert!(stdout.contains("roots scanned: 0"), "stdout: {}", stdout);
}

#[test]
fn test_scan_single_path_with_device_override() {
    let (tmp, config_path) = setup_test_env();

    run_marg(&config_path, &["init"]);
    let readers = tmp.path().join("readers");
    let (stdout, _, success) = run_marg(
        &config_path,
        &[
            "scan",
            "--path",
            readers.to_str().unwrap(),
            "--device",
            "merged-label",
        ],
    );
    assert!(success);
    assert!(stdout.contains("files scanned: 3"), "stdout: {}", stdout);

    let (stdout, _, _) = run_marg(&config_path, &["stats"]);
    assert!(stdout.contains("merged-label"), "stdout: {}", stdout);
}
