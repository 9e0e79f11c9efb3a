use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};

use tempfile::TempDir;

fn notesync_cmd() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_notesync"));
    cmd.env_remove("RUST_LOG");
    cmd
}

fn run(dir: &Path, args: &[&str]) -> Output {
    notesync_cmd().current_dir(dir).args(args).output().unwrap()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn note_ids(dir: &Path) -> Vec<String> {
    let output = run(dir, &["list", "--json"]);
    assert!(output.status.success());
    let notes: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    notes
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["id"].as_str().unwrap().to_string())
        .collect()
}

#[test]
fn test_init_creates_vault_directory() {
    let tmp = TempDir::new().unwrap();

    let output = run(tmp.path(), &["init"]);

    assert!(output.status.success());
    assert!(tmp.path().join(".notesync/notes.json").exists());
    assert!(tmp.path().join(".notesync/config.yaml").exists());
    assert!(tmp.path().join(".notesync/note-assets").is_dir());
}

#[test]
fn test_init_twice_fails() {
    let tmp = TempDir::new().unwrap();
    run(tmp.path(), &["init"]);

    let output = run(tmp.path(), &["init"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Already initialized"));
}

#[test]
fn test_add_without_init_fails() {
    let tmp = TempDir::new().unwrap();

    let output = run(tmp.path(), &["add", "Orphan"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("notesync init"));
}

#[test]
fn test_webdav_init_requires_username() {
    let tmp = TempDir::new().unwrap();

    let output = run(
        tmp.path(),
        &["init", "--backend", "webdav", "--remote", "https://dav.example.com/"],
    );

    assert!(!output.status.success());
    assert!(!tmp.path().join(".notesync").exists());
}

#[test]
fn test_add_list_delete_workflow() {
    let tmp = TempDir::new().unwrap();
    run(tmp.path(), &["init"]);

    let mut child = notesync_cmd()
        .current_dir(tmp.path())
        .args(["add", "Groceries", "-l", "home", "--stdin", "--json"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .unwrap();
    child
        .stdin
        .take()
        .unwrap()
        .write_all(b"milk\neggs\n")
        .unwrap();
    let output = child.wait_with_output().unwrap();
    assert!(output.status.success());
    let note: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(note["title"], "Groceries");
    assert_eq!(note["labels"][0], "home");
    assert_eq!(note["content"]["content"].as_array().unwrap().len(), 2);

    let listed = stdout(&run(tmp.path(), &["list"]));
    assert!(listed.contains("Groceries"));
    assert!(listed.contains("labels: home"));

    let id = note["id"].as_str().unwrap();
    let output = run(tmp.path(), &["delete", &id[..8], "--force"]);
    assert!(output.status.success());
    assert!(note_ids(tmp.path()).is_empty());

    let raw = std::fs::read_to_string(tmp.path().join(".notesync/notes.json")).unwrap();
    assert!(raw.contains("deletedIds"));
}

#[test]
fn test_delete_requires_force_when_not_interactive() {
    let tmp = TempDir::new().unwrap();
    run(tmp.path(), &["init"]);
    run(tmp.path(), &["add", "Keep me"]);
    let id = note_ids(tmp.path()).remove(0);

    let output = notesync_cmd()
        .current_dir(tmp.path())
        .args(["delete", &id])
        .stdin(Stdio::null())
        .output()
        .unwrap();

    assert!(!output.status.success());
    assert_eq!(note_ids(tmp.path()), vec![id]);
}

#[test]
fn test_export_then_import_on_second_device() {
    let remote = TempDir::new().unwrap();
    let remote_path = remote.path().to_str().unwrap();
    let phone = TempDir::new().unwrap();
    let laptop = TempDir::new().unwrap();

    run(phone.path(), &["init", "--remote", remote_path]);
    run(laptop.path(), &["init", "--remote", remote_path]);
    run(phone.path(), &["add", "From phone"]);
    run(laptop.path(), &["add", "From laptop"]);

    let output = run(phone.path(), &["export", "--date", "2026-10-19"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert!(remote.path().join("Notes 2026-10-19/data.json").exists());

    let output = run(laptop.path(), &["import", "--date", "2026-10-20", "--json"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["date"], "2026-10-19");
    assert_eq!(report["notes"], 2);

    let listed = stdout(&run(laptop.path(), &["list"]));
    assert!(listed.contains("From phone"));
    assert!(listed.contains("From laptop"));
}

#[test]
fn test_import_with_no_snapshots_reports_nothing_to_import() {
    let remote = TempDir::new().unwrap();
    let tmp = TempDir::new().unwrap();
    run(tmp.path(), &["init", "--remote", remote.path().to_str().unwrap()]);

    let output = run(tmp.path(), &["import"]);

    assert!(output.status.success());
    assert!(stdout(&output).contains("Nothing to import"));
}

#[test]
fn test_snapshots_lists_newest_first_and_retention_applies() {
    let remote = TempDir::new().unwrap();
    let tmp = TempDir::new().unwrap();
    run(
        tmp.path(),
        &["init", "--remote", remote.path().to_str().unwrap(), "--retention", "2"],
    );

    for date in ["2026-10-01", "2026-10-02", "2026-10-03"] {
        let output = run(tmp.path(), &["export", "--date", date]);
        assert!(output.status.success());
    }

    let output = run(tmp.path(), &["snapshots", "--json"]);
    assert!(output.status.success());
    let names: Vec<String> = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(names, vec!["Notes 2026-10-03", "Notes 2026-10-02"]);
}
