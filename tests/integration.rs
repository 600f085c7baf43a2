use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn cidx_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("cidx");
    path
}

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let content = root.join("content").join("pages").join("mcpx");
    write(
        &content,
        "getting-started.md",
        "---\nslug: getting-started\ntitle: Getting Started\ndate: 2024-03-01\ncategories: [guides, intro]\n---\nInstall the server and run it.\n",
    );
    write(
        &content,
        "servers/filesystem.md",
        "---\nslug: filesystem\ntitle: Filesystem Server\nexcerpt: Read and write local files.\n---\nThe filesystem server exposes local files.\n",
    );
    write(&content, "index.md", "---\ntitle: Landing\n---\nNot indexed.\n");
    write(&content, "broken.md", "---\ntitle: [unclosed\n---\nBody\n");

    // Credential variables nobody sets, so sync never reaches the network.
    let config_content = format!(
        r#"[content]
root = "{root}/content/pages/mcpx"
base_namespace = "mcpx"

[index]
name = "test_mcpx_content"
app_id_env = "CIDX_IT_UNSET_APP_ID"
api_key_env = "CIDX_IT_UNSET_API_KEY"

[retry]
max_attempts = 1
delay_ms = 0

[report]
path = "{root}/.algolia/last-index.json"
"#,
        root = root.display()
    );

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    let config_path = config_dir.join("cidx.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_cidx(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = cidx_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env_remove("CIDX_IT_UNSET_APP_ID")
        .env_remove("CIDX_IT_UNSET_API_KEY")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run cidx binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

#[test]
fn test_records_lists_documents() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_cidx(&config_path, &["records"]);
    assert!(success, "records failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("mcpx_getting-started"));
    assert!(stdout.contains("mcpx_servers_filesystem"));
    assert!(stdout.contains("2 record(s), 1 skipped"));
    assert!(!stdout.contains("Landing"));
}

#[test]
fn test_records_json() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_cidx(&config_path, &["records", "--json"]);
    assert!(success, "records failed: stderr={}", stderr);

    let records: Vec<serde_json::Value> = serde_json::from_str(&stdout).unwrap();
    assert_eq!(records.len(), 2);
    let nested = records
        .iter()
        .find(|r| r["objectID"] == "mcpx_servers_filesystem")
        .unwrap();
    assert_eq!(nested["permalink"], "/mcpx/servers/filesystem");
    assert_eq!(nested["subdirectory"], "servers");
    assert_eq!(nested["excerpt"], "Read and write local files.");

    let top = records
        .iter()
        .find(|r| r["objectID"] == "mcpx_getting-started")
        .unwrap();
    assert_eq!(top["categories"], serde_json::json!(["guides", "intro"]));
    assert!(top["date"].is_i64());
    assert!(top.get("subdirectory").is_none());
}

#[test]
fn test_sync_without_credentials_writes_failure_report() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_cidx(&config_path, &["sync"]);
    assert!(success, "sync should not fail without --fail-on-error: {}", stderr);
    assert!(stdout.contains("failed:"));
    assert!(stdout.contains("CIDX_IT_UNSET_APP_ID"));

    let report_path = tmp.path().join(".algolia").join("last-index.json");
    let report: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(report_path).unwrap()).unwrap();
    assert_eq!(report["success"], false);
    assert!(report["error"].as_str().unwrap().contains("CIDX_IT_UNSET_API_KEY"));
    assert!(report.get("added").is_none());
}

#[test]
fn test_sync_fail_on_error_exits_nonzero() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success) = run_cidx(&config_path, &["sync", "--fail-on-error"]);
    assert!(!success);
}

#[test]
fn test_dry_run_requires_credentials() {
    let (tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_cidx(&config_path, &["sync", "--dry-run"]);
    assert!(!success);
    assert!(stderr.contains("CIDX_IT_UNSET_APP_ID"));
    // Dry runs never write a report.
    assert!(!tmp.path().join(".algolia").exists());
}

#[test]
fn test_report_before_and_after_sync() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_cidx(&config_path, &["report"]);
    assert!(success);
    assert!(stdout.contains("No report"));

    run_cidx(&config_path, &["sync"]);

    let (stdout, _, success) = run_cidx(&config_path, &["report"]);
    assert!(success);
    let report: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(report["success"], false);
    assert!(report["timestamp"].is_string());
}

#[test]
fn test_status_without_credentials() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_cidx(&config_path, &["status"]);
    assert!(success);
    assert!(stdout.contains("index test_mcpx_content"));
    assert!(stdout.contains("failed:"));
}

#[test]
fn test_missing_config_file_errors() {
    let tmp = TempDir::new().unwrap();
    let missing = tmp.path().join("nope.toml");

    let (_, stderr, success) = run_cidx(&missing, &["records"]);
    assert!(!success);
    assert!(stderr.contains("nope.toml"));
}

#[test]
fn test_invalid_config_errors() {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("cidx.toml");
    fs::write(&config_path, "[index]\npage_size = 0\n").unwrap();

    let (_, stderr, success) = run_cidx(&config_path, &["records"]);
    assert!(!success);
    assert!(stderr.contains("page_size"));
}

#[test]
fn test_missing_content_root_errors() {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("cidx.toml");
    fs::write(
        &config_path,
        format!("[content]\nroot = \"{}/absent\"\n", tmp.path().display()),
    )
    .unwrap();

    let (_, _, success) = run_cidx(&config_path, &["records"]);
    assert!(!success);
}
