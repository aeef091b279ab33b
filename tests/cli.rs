use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn sessions_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("sessions");
    path
}

/// Two projects, three sessions, embedding disabled.
fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let alpha = root.join("projects/-work-alpha");
    let beta = root.join("projects/-work-beta");
    fs::create_dir_all(&alpha).unwrap();
    fs::create_dir_all(&beta).unwrap();

    fs::write(
        alpha.join("a1.jsonl"),
        [
            r#"{"type":"summary","summary":"Fix JWT validation"}"#,
            r#"{"type":"user","message":{"content":"The token check fails"},"timestamp":"2026-01-05T10:00:00Z","cwd":"/work/alpha","gitBranch":"main"}"#,
            r#"{"type":"assistant","message":{"content":[{"type":"text","text":"Looking"},{"type":"tool_use","id":"t1","name":"Read","input":{"file_path":"/work/alpha/auth.rs"}}]}}"#,
            r#"{"type":"user","message":{"content":[{"type":"tool_result","tool_use_id":"t1","content":"fn verify() {}"}]},"timestamp":"2026-01-05T10:01:00Z"}"#,
        ]
        .join("\n"),
    )
    .unwrap();
    fs::write(
        alpha.join("a2.jsonl"),
        r#"{"type":"user","message":{"content":"Add dark mode"},"timestamp":"2026-01-07T09:00:00Z","cwd":"/work/alpha"}"#,
    )
    .unwrap();
    fs::write(
        beta.join("b1.jsonl"),
        r#"{"type":"user","message":{"content":"Tune the query planner"},"timestamp":"2026-01-06T12:00:00Z","cwd":"/work/beta"}"#,
    )
    .unwrap();

    let config_content = format!(
        r#"[sources]
projects_dir = "{root}/projects"

[index]
dir = "{root}/index"

[embedding]
provider = "disabled"
"#,
        root = root.display()
    );

    let config_path = root.join("sessions.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_sessions(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = sessions_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run sessions binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

fn json(stdout: &str) -> serde_json::Value {
    serde_json::from_str(stdout).unwrap_or_else(|e| panic!("bad JSON ({}): {}", e, stdout))
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_sessions(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));

    let (_, _, success) = run_sessions(&config_path, &["init"]);
    assert!(success, "second init failed (not idempotent)");
}

#[test]
fn test_sync_then_resync_skips_unchanged() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_sessions(&config_path, &["sync", "--progress", "off"]);
    assert!(success, "sync failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("found: 3"));
    assert!(stdout.contains("indexed: 3"));
    assert!(stdout.contains("ok"));

    let (stdout, _, success) = run_sessions(&config_path, &["sync", "--progress", "off"]);
    assert!(success);
    assert!(stdout.contains("indexed: 0"));
    assert!(stdout.contains("skipped (unchanged): 3"));

    // Appending to a log re-indexes just that session.
    let a2 = tmp.path().join("projects/-work-alpha/a2.jsonl");
    let mut content = fs::read_to_string(&a2).unwrap();
    content.push_str("\n{\"type\":\"summary\",\"summary\":\"Dark mode toggle\"}\n");
    fs::write(&a2, content).unwrap();

    let (stdout, _, success) = run_sessions(&config_path, &["sync", "--progress", "off"]);
    assert!(success);
    assert!(stdout.contains("indexed: 1"));
    assert!(stdout.contains("skipped (unchanged): 2"));
}

#[test]
fn test_list_meta_and_read() {
    let (_tmp, config_path) = setup_test_env();
    run_sessions(&config_path, &["sync", "--progress", "off"]);

    let (stdout, _, success) = run_sessions(&config_path, &["list", "--json"]);
    assert!(success);
    let ids: Vec<String> = json(&stdout)
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["session_id"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(ids, vec!["a2", "b1", "a1"]);

    let (stdout, _, success) =
        run_sessions(&config_path, &["list", "--project", "ALPHA", "--json"]);
    assert!(success);
    assert_eq!(json(&stdout).as_array().unwrap().len(), 2);

    let (stdout, _, success) = run_sessions(&config_path, &["meta", "a1", "--json"]);
    assert!(success);
    let meta = json(&stdout);
    assert_eq!(meta["project"], "alpha");
    assert_eq!(meta["git_branch"], "main");
    assert_eq!(meta["message_count"], 3);
    assert_eq!(meta["tools_used"]["Read"], 1);
    assert_eq!(meta["summaries"][0], "Fix JWT validation");
    assert_eq!(meta["start_time"], "2026-01-05T10:00:00.000Z");

    let (stdout, _, success) = run_sessions(
        &config_path,
        &["read", "a1", "--type", "tool_use", "--type", "tool_result", "--json"],
    );
    assert!(success);
    let turns = json(&stdout);
    assert_eq!(turns[0]["type"], "tool_use");
    assert_eq!(turns[0]["tool_name"], "Read");
    assert_eq!(turns[1]["type"], "tool_result");
    assert_eq!(turns[1]["content"], "fn verify() {}");
    assert_eq!(turns.as_array().unwrap().len(), 2);

    let (stdout, _, success) = run_sessions(&config_path, &["read", "a1", "--last", "1", "--json"]);
    assert!(success);
    assert_eq!(json(&stdout)[0]["type"], "tool_result");
}

#[test]
fn test_unknown_session() {
    let (_tmp, config_path) = setup_test_env();
    run_sessions(&config_path, &["sync", "--progress", "off"]);

    let (_, stderr, success) = run_sessions(&config_path, &["meta", "does-not-exist"]);
    assert!(!success);
    assert!(stderr.contains("session not found"));

    let (stdout, _, success) = run_sessions(&config_path, &["read", "does-not-exist", "--json"]);
    assert!(success);
    assert_eq!(json(&stdout), serde_json::json!([]));
}

#[test]
fn test_queries_before_any_sync() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_sessions(&config_path, &["list"]);
    assert!(success);
    assert!(stdout.contains("No sessions indexed."));

    let (stdout, _, success) = run_sessions(&config_path, &["search", "jwt", "--json"]);
    assert!(success);
    assert_eq!(json(&stdout), serde_json::json!([]));

    // Read paths never create the index.
    assert!(!tmp.path().join("index/sessions.db").exists());
}

#[test]
fn test_stats_reports_counts() {
    let (_tmp, config_path) = setup_test_env();
    run_sessions(&config_path, &["sync", "--progress", "off"]);

    let (stdout, _, success) = run_sessions(&config_path, &["stats", "--json"]);
    assert!(success);
    let stats = json(&stdout);
    assert_eq!(stats["sessions"], 3);
    assert_eq!(stats["embeddable"], 3);
    assert_eq!(stats["vectors"], 0);
    assert_eq!(stats["projects"][0]["project"], "alpha");
    assert_eq!(stats["projects"][0]["sessions"], 2);
}
