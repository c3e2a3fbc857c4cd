use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn foldex_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("foldex");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let data_dir = root.join("data");
    fs::create_dir_all(&data_dir).unwrap();

    // Two uploaded folders, each one owner
    let uploads = root.join("uploads");
    fs::create_dir_all(uploads.join("devA/archive")).unwrap();
    fs::write(
        uploads.join("devA/notes.txt"),
        "Meeting notes for the quarterly review.\n\nDiscussed the rollout schedule and staffing.",
    )
    .unwrap();
    fs::write(
        uploads.join("devA/archive/contacts.csv"),
        "name,phone\nalice,5551234\nbob,5559876",
    )
    .unwrap();
    fs::write(
        uploads.join("devA/index.html"),
        "<html><head><title>Browsing History</title><style>p{color:red}</style></head>\
         <body><p>visited the vendor portal</p></body></html>",
    )
    .unwrap();
    fs::create_dir_all(uploads.join("devB")).unwrap();
    fs::write(
        uploads.join("devB/report.txt"),
        "Incident report: the backup server rebooted unexpectedly.",
    )
    .unwrap();

    let config_content = format!(
        r#"[db]
path = "{root}/data/foldex.sqlite"

[ledger]
path = "{root}/data/ledger.json"

[ingest]
uploads_root = "{root}/uploads"
default_scope = "cases"
"#,
        root = root.display()
    );

    let config_path = config_dir.join("foldex.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_foldex(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = foldex_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run foldex binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_foldex(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data/foldex.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_foldex(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_foldex(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_ingest_folder() {
    let (tmp, config_path) = setup_test_env();
    let folder = tmp.path().join("uploads/devA");

    run_foldex(&config_path, &["init"]);
    let (stdout, stderr, success) =
        run_foldex(&config_path, &["ingest", folder.to_str().unwrap()]);
    assert!(
        success,
        "ingest failed: stdout={}, stderr={}",
        stdout, stderr
    );
    assert!(stdout.contains("ingest devA"));
    assert!(stdout.contains("indexed: 3"));
    assert!(stdout.contains("index failures: 0"));
    assert!(stdout.contains("ok"));
}

#[test]
fn test_ingest_creates_ledger_file() {
    let (tmp, config_path) = setup_test_env();
    let folder = tmp.path().join("uploads/devA");

    run_foldex(&config_path, &["init"]);
    run_foldex(&config_path, &["ingest", folder.to_str().unwrap()]);

    let ledger_path = tmp.path().join("data/ledger.json");
    assert!(ledger_path.exists());
    let content = fs::read_to_string(&ledger_path).unwrap();
    assert!(content.contains("\"owner\": \"devA\""));
    assert!(content.contains("\"folderDisplayName\""));
    assert!(content.contains("\"completedAt\""));
}

#[test]
fn test_second_ingest_is_skipped_as_duplicate() {
    let (tmp, config_path) = setup_test_env();
    let folder = tmp.path().join("uploads/devA");

    run_foldex(&config_path, &["init"]);
    run_foldex(&config_path, &["ingest", folder.to_str().unwrap()]);

    let (stdout, _, success) = run_foldex(&config_path, &["ingest", folder.to_str().unwrap()]);
    assert!(success, "Duplicate ingest should exit cleanly");
    assert!(
        stdout.contains("skipped: duplicate (ledger)"),
        "Expected duplicate skip, got: {}",
        stdout
    );
}

#[test]
fn test_resized_file_makes_folder_new_again() {
    let (tmp, config_path) = setup_test_env();
    let folder = tmp.path().join("uploads/devA");
    let notes = folder.join("notes.txt");

    run_foldex(&config_path, &["init"]);
    run_foldex(&config_path, &["ingest", folder.to_str().unwrap()]);

    // Grow the file: the structural fingerprint changes.
    let original = fs::read_to_string(&notes).unwrap();
    fs::write(&notes, format!("{}\nAddendum.", original)).unwrap();

    let (stdout, _, success) = run_foldex(&config_path, &["ingest", folder.to_str().unwrap()]);
    assert!(success);
    assert!(
        stdout.contains("indexed: 3"),
        "Changed folder should re-ingest, got: {}",
        stdout
    );

    // Restoring the original byte length restores the fingerprint.
    fs::write(&notes, &original).unwrap();
    let (stdout, _, _) = run_foldex(&config_path, &["ingest", folder.to_str().unwrap()]);
    assert!(
        stdout.contains("skipped: duplicate"),
        "Reverted folder should be a duplicate again, got: {}",
        stdout
    );
}

#[test]
fn test_same_size_edit_is_invisible_to_the_fingerprint() {
    let (tmp, config_path) = setup_test_env();
    let folder = tmp.path().join("uploads/devB");
    let report = folder.join("report.txt");

    run_foldex(&config_path, &["init"]);
    run_foldex(&config_path, &["ingest", folder.to_str().unwrap()]);

    // Flip bytes without changing the length: structure is unchanged.
    let mut content = fs::read(&report).unwrap();
    content[0] = b'X';
    fs::write(&report, &content).unwrap();

    let (stdout, _, _) = run_foldex(&config_path, &["ingest", folder.to_str().unwrap()]);
    assert!(
        stdout.contains("skipped: duplicate"),
        "Same-size edit should still read as duplicate, got: {}",
        stdout
    );
}

#[test]
fn test_crawl_ingests_all_folders() {
    let (_tmp, config_path) = setup_test_env();

    run_foldex(&config_path, &["init"]);
    let (stdout, stderr, success) = run_foldex(&config_path, &["crawl"]);
    assert!(success, "crawl failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("devA: indexed 3 of 3 files"));
    assert!(stdout.contains("devB: indexed 1 of 1 files"));
    assert!(stdout.contains("folders: 2 ingested, 0 duplicate, 0 failed"));
    assert!(stdout.contains("ok"));
}

#[test]
fn test_second_crawl_skips_everything() {
    let (_tmp, config_path) = setup_test_env();

    run_foldex(&config_path, &["init"]);
    run_foldex(&config_path, &["crawl"]);

    let (stdout, _, success) = run_foldex(&config_path, &["crawl"]);
    assert!(success);
    assert!(stdout.contains("devA: duplicate (ledger)"));
    assert!(stdout.contains("devB: duplicate (ledger)"));
    assert!(stdout.contains("folders: 0 ingested, 2 duplicate, 0 failed"));
}

#[test]
fn test_crawl_reconciles_stale_ledger_after_owner_wipe() {
    let (_tmp, config_path) = setup_test_env();

    run_foldex(&config_path, &["init"]);
    run_foldex(&config_path, &["crawl"]);
    run_foldex(&config_path, &["rm-owner", "devA"]);

    // The ledger still claims devA is complete; the crawl verifies against
    // the index, drops the stale record, and re-ingests.
    let (stdout, _, success) = run_foldex(&config_path, &["crawl"]);
    assert!(success);
    assert!(
        stdout.contains("devA: indexed 3 of 3 files (stale record removed)"),
        "Expected stale-record re-ingest, got: {}",
        stdout
    );
    assert!(stdout.contains("devB: duplicate (ledger)"));
}

#[test]
fn test_search_finds_extracted_text() {
    let (_tmp, config_path) = setup_test_env();

    run_foldex(&config_path, &["init"]);
    run_foldex(&config_path, &["crawl"]);

    let (stdout, _, success) = run_foldex(&config_path, &["search", "quarterly review"]);
    assert!(success, "search failed");
    assert!(
        stdout.contains("notes.txt"),
        "Expected notes.txt in results, got: {}",
        stdout
    );
}

#[test]
fn test_search_html_is_tag_stripped() {
    let (_tmp, config_path) = setup_test_env();

    run_foldex(&config_path, &["init"]);
    run_foldex(&config_path, &["crawl"]);

    let (stdout, _, success) = run_foldex(&config_path, &["search", "vendor portal"]);
    assert!(success);
    assert!(
        stdout.contains("index.html"),
        "Expected index.html in results, got: {}",
        stdout
    );

    // Style rules must not be searchable text.
    let (stdout, _, _) = run_foldex(&config_path, &["search", "color"]);
    assert!(
        stdout.contains("No results"),
        "CSS inside <style> should be stripped, got: {}",
        stdout
    );
}

#[test]
fn test_search_phrase_requires_adjacency() {
    let (_tmp, config_path) = setup_test_env();

    run_foldex(&config_path, &["init"]);
    run_foldex(&config_path, &["crawl"]);

    // Both terms appear in notes.txt, but never adjacent.
    let (stdout, _, _) = run_foldex(&config_path, &["search", "rollout staffing"]);
    assert!(stdout.contains("notes.txt"));

    let (stdout, _, success) =
        run_foldex(&config_path, &["search", "rollout staffing", "--phrase"]);
    assert!(success);
    assert!(
        stdout.contains("No results"),
        "Non-adjacent phrase should not match, got: {}",
        stdout
    );

    let (stdout, _, _) = run_foldex(&config_path, &["search", "rollout schedule", "--phrase"]);
    assert!(stdout.contains("notes.txt"));
}

#[test]
fn test_search_deterministic() {
    let (_tmp, config_path) = setup_test_env();

    run_foldex(&config_path, &["init"]);
    run_foldex(&config_path, &["crawl"]);

    let (stdout1, _, _) = run_foldex(&config_path, &["search", "the"]);
    let (stdout2, _, _) = run_foldex(&config_path, &["search", "the"]);
    assert_eq!(
        stdout1, stdout2,
        "Search results should be deterministic across runs"
    );
}

#[test]
fn test_search_empty_query() {
    let (_tmp, config_path) = setup_test_env();

    run_foldex(&config_path, &["init"]);
    let (stdout, _, success) = run_foldex(&config_path, &["search", ""]);
    assert!(success, "Empty query should not panic");
    assert!(stdout.contains("No results"));
}

#[test]
fn test_search_no_results() {
    let (_tmp, config_path) = setup_test_env();

    run_foldex(&config_path, &["init"]);
    run_foldex(&config_path, &["crawl"]);

    let (stdout, _, success) = run_foldex(&config_path, &["search", "xyznonexistent"]);
    assert!(success);
    assert!(stdout.contains("No results"));
}

#[test]
fn test_search_respects_scope() {
    let (tmp, config_path) = setup_test_env();
    let folder = tmp.path().join("uploads/devA");

    run_foldex(&config_path, &["init"]);
    run_foldex(
        &config_path,
        &["ingest", folder.to_str().unwrap(), "--scope", "side-scope"],
    );

    let (stdout, _, _) = run_foldex(
        &config_path,
        &["search", "quarterly", "--scope", "side-scope"],
    );
    assert!(stdout.contains("notes.txt"));

    // The default scope holds nothing.
    let (stdout, _, _) = run_foldex(&config_path, &["search", "quarterly"]);
    assert!(
        stdout.contains("No results"),
        "Default scope should be empty, got: {}",
        stdout
    );
}

#[test]
fn test_owners_lists_counts() {
    let (_tmp, config_path) = setup_test_env();

    run_foldex(&config_path, &["init"]);
    run_foldex(&config_path, &["crawl"]);

    let (stdout, _, success) = run_foldex(&config_path, &["owners"]);
    assert!(success);
    assert!(stdout.contains("devA  3 document(s)"));
    assert!(stdout.contains("devB  1 document(s)"));
}

#[test]
fn test_rm_owner_deletes_documents() {
    let (_tmp, config_path) = setup_test_env();

    run_foldex(&config_path, &["init"]);
    run_foldex(&config_path, &["crawl"]);

    let (stdout, _, success) = run_foldex(&config_path, &["rm-owner", "devA"]);
    assert!(success);
    assert!(stdout.contains("Deleted 3 document(s)"));

    let (stdout, _, _) = run_foldex(&config_path, &["search", "quarterly"]);
    assert!(stdout.contains("No results"));

    // devB survives.
    let (stdout, _, _) = run_foldex(&config_path, &["search", "incident"]);
    assert!(stdout.contains("report.txt"));
}

#[test]
fn test_ledger_list_and_rm() {
    let (tmp, config_path) = setup_test_env();
    let folder = tmp.path().join("uploads/devA");

    run_foldex(&config_path, &["init"]);
    run_foldex(&config_path, &["ingest", folder.to_str().unwrap()]);

    let (stdout, _, success) = run_foldex(&config_path, &["ledger", "list"]);
    assert!(success);
    assert!(stdout.contains("devA"));
    assert!(stdout.contains("1 record(s)"));

    // Pull the full fingerprint off the listing line.
    let fingerprint = stdout
        .lines()
        .find(|l| l.contains("devA"))
        .and_then(|l| l.split_whitespace().last())
        .expect("ledger list should include the fingerprint")
        .to_string();
    assert_eq!(fingerprint.len(), 64, "expected a full hex digest");

    let (stdout, _, success) =
        run_foldex(&config_path, &["ledger", "rm", &fingerprint, "devA"]);
    assert!(success);
    assert!(stdout.contains("Removed ledger record"));

    // With the record gone (and documents still present), the index layer
    // still reports the folder as a duplicate.
    let (stdout, _, _) = run_foldex(&config_path, &["ingest", folder.to_str().unwrap()]);
    assert!(
        stdout.contains("skipped: duplicate (index)"),
        "Index should backstop a deleted ledger record, got: {}",
        stdout
    );
}

#[test]
fn test_ledger_rm_missing_record() {
    let (_tmp, config_path) = setup_test_env();

    run_foldex(&config_path, &["init"]);
    let digest = "0".repeat(64);
    let (stdout, _, success) = run_foldex(&config_path, &["ledger", "rm", &digest, "devZ"]);
    assert!(success);
    assert!(stdout.contains("No matching ledger record"));
}

#[test]
fn test_scope_lifecycle() {
    let (_tmp, config_path) = setup_test_env();

    run_foldex(&config_path, &["init"]);

    let (stdout, _, success) = run_foldex(&config_path, &["scope", "create", "archive-2024"]);
    assert!(success);
    assert!(stdout.contains("Created scope archive-2024"));

    let (stdout, _, _) = run_foldex(&config_path, &["scope", "list"]);
    assert!(stdout.contains("archive-2024"));

    let (stdout, _, success) = run_foldex(&config_path, &["scope", "delete", "archive-2024"]);
    assert!(success);
    assert!(stdout.contains("Deleted scope archive-2024"));

    let (stdout, _, _) = run_foldex(&config_path, &["scope", "list"]);
    assert!(!stdout.contains("archive-2024"));
}

#[test]
fn test_scope_delete_missing() {
    let (_tmp, config_path) = setup_test_env();

    run_foldex(&config_path, &["init"]);
    let (stdout, _, success) = run_foldex(&config_path, &["scope", "delete", "nope"]);
    assert!(success);
    assert!(stdout.contains("No such scope"));
}

#[test]
fn test_ingest_missing_folder_errors() {
    let (tmp, config_path) = setup_test_env();
    let missing = tmp.path().join("uploads/ghost");

    run_foldex(&config_path, &["init"]);
    let (_, stderr, success) = run_foldex(&config_path, &["ingest", missing.to_str().unwrap()]);
    assert!(!success, "Missing folder should fail");
    assert!(
        stderr.contains("not a directory"),
        "Should report missing directory, got: {}",
        stderr
    );
}

#[test]
fn test_unknown_progress_mode_errors() {
    let (tmp, config_path) = setup_test_env();
    let folder = tmp.path().join("uploads/devA");

    run_foldex(&config_path, &["init"]);
    let (_, stderr, success) = run_foldex(
        &config_path,
        &["ingest", folder.to_str().unwrap(), "--progress", "bogus"],
    );
    assert!(!success);
    assert!(stderr.contains("unknown progress mode"));
}

#[test]
fn test_json_progress_emits_events_on_stderr() {
    let (tmp, config_path) = setup_test_env();
    let folder = tmp.path().join("uploads/devB");

    run_foldex(&config_path, &["init"]);
    let (_, stderr, success) = run_foldex(
        &config_path,
        &["ingest", folder.to_str().unwrap(), "--progress", "json"],
    );
    assert!(success);
    assert!(
        stderr.contains("\"phase\":\"fingerprinting\""),
        "Expected fingerprinting event, got: {}",
        stderr
    );
    assert!(stderr.contains("\"phase\":\"indexing\""));
}
