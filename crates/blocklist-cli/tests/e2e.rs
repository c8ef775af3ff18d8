//! End-to-end tests driving the `blk` binary against a temp database.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::path::Path;
use tempfile::TempDir;

fn blk_cmd(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("blk"));
    cmd.current_dir(dir);
    cmd.env("BLOCKLIST_LOG", "error");
    cmd.env("BLOCKLIST_FORMAT", "text");
    // Keep any real user config out of the run.
    cmd.env("HOME", dir);
    cmd.env("XDG_CONFIG_HOME", dir.join(".config"));
    cmd
}

fn blk_json(dir: &Path, args: &[&str]) -> Value {
    let output = blk_cmd(dir)
        .args(args)
        .arg("--json")
        .output()
        .expect("blk should not crash");
    assert!(
        output.status.success(),
        "blk {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("valid JSON")
}

fn ids(value: &Value) -> Vec<u64> {
    value
        .as_array()
        .expect("array")
        .iter()
        .map(|v| v.as_u64().expect("numeric id"))
        .collect()
}

// ---------------------------------------------------------------------------
// Mutations
// ---------------------------------------------------------------------------

#[test]
fn block_is_idempotent_across_invocations() {
    let dir = TempDir::new().expect("temp dir");

    let first = blk_json(dir.path(), &["block", "1", "2"]);
    assert_eq!(first["changed"], true);
    assert_eq!(first["blocking"], true);

    let second = blk_json(dir.path(), &["block", "1", "2"]);
    assert_eq!(second["changed"], false);

    assert!(dir.path().join("blocklist.db").exists());
}

#[test]
fn self_block_is_a_noop() {
    let dir = TempDir::new().expect("temp dir");
    let result = blk_json(dir.path(), &["block", "4", "4"]);
    assert_eq!(result["changed"], false);
    assert_eq!(result["blocking"], false);
}

#[test]
fn toggle_round_trip() {
    let dir = TempDir::new().expect("temp dir");
    let on = blk_json(dir.path(), &["toggle", "1", "2"]);
    assert_eq!(on["blocking"], true);
    assert_eq!(on["changed"], true);

    let off = blk_json(dir.path(), &["toggle", "1", "2"]);
    assert_eq!(off["blocking"], false);
    assert_eq!(off["changed"], true);

    blk_cmd(dir.path())
        .args(["unblock", "1", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("no change"));
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

#[test]
fn three_user_scenario() {
    let dir = TempDir::new().expect("temp dir");
    blk_json(dir.path(), &["block", "1", "2"]);
    blk_json(dir.path(), &["block", "3", "1"]);

    let check = blk_json(dir.path(), &["check", "2", "1"]);
    assert_eq!(check["is_blocked_by"], true);
    assert_eq!(check["is_blocking"], false);
    assert_eq!(check["has_block"], true);

    let summary = blk_json(dir.path(), &["summary", "1"]);
    assert_eq!(ids(&summary["blocking"]), vec![2]);
    assert_eq!(ids(&summary["blockers"]), vec![3]);

    let count = blk_json(dir.path(), &["count", "1"]);
    assert_eq!(count["blocking"], 1);
    assert_eq!(count["blockers"], 1);

    blk_cmd(dir.path())
        .args(["list", "1", "--direction", "blockers"])
        .assert()
        .success()
        .stdout("3\n");
}

#[test]
fn mutual_block_relations() {
    let dir = TempDir::new().expect("temp dir");
    blk_json(dir.path(), &["block", "1", "2"]);
    blk_json(dir.path(), &["block", "2", "1"]);

    let check = blk_json(dir.path(), &["check", "1", "2"]);
    assert_eq!(check["mutual"], true);

    let pair = blk_json(dir.path(), &["relations", "1", "2"]);
    let edges = pair["edges"].as_array().expect("edges");
    assert_eq!(edges.len(), 2);
    assert_eq!(edges[0]["blocker"], 1);
    assert_eq!(edges[1]["blocker"], 2);

    let all = blk_json(dir.path(), &["relations", "1"]);
    assert!(all["edges"][0]["created_at_us"].is_i64());
}

#[test]
fn paging_walks_every_edge_once() {
    let dir = TempDir::new().expect("temp dir");
    for target in 2..=8 {
        blk_json(dir.path(), &["block", "1", &target.to_string()]);
    }

    let mut seen = Vec::new();
    let mut after: Option<String> = None;
    loop {
        let mut args = vec!["list", "1", "--page-size", "3"];
        if let Some(token) = after.as_deref() {
            args.extend(["--after", token]);
        }
        let page = blk_json(dir.path(), &args);
        seen.extend(ids(&page["ids"]));
        match page["next"].as_str() {
            Some(token) => after = Some(token.to_string()),
            None => break,
        }
    }
    assert_eq!(seen, vec![2, 3, 4, 5, 6, 7, 8]);
}

#[test]
fn list_records_include_timestamps() {
    let dir = TempDir::new().expect("temp dir");
    blk_json(dir.path(), &["block", "1", "2"]);
    let listing = blk_json(dir.path(), &["list", "1", "--records"]);
    let record = &listing["records"][0];
    assert_eq!(record["blocker"], 1);
    assert_eq!(record["blocked"], 2);
    assert!(record["created_at_us"].as_i64().expect("timestamp") > 0);
}

// ---------------------------------------------------------------------------
// Cache
// ---------------------------------------------------------------------------

#[test]
fn cache_warm_show_clear() {
    let dir = TempDir::new().expect("temp dir");
    blk_json(dir.path(), &["block", "1", "2"]);
    blk_json(dir.path(), &["block", "1", "3"]);

    let warm = blk_json(dir.path(), &["cache", "warm", "1", "--ttl", "600"]);
    assert_eq!(ids(&warm["ids"]), vec![2, 3]);
    assert_eq!(warm["ttl_secs"], 600);

    let shown = blk_json(dir.path(), &["cache", "show", "1"]);
    assert_eq!(ids(&shown["ids"]), vec![2, 3]);

    // A mutation drops the entry.
    blk_json(dir.path(), &["unblock", "1", "3"]);
    let shown = blk_json(dir.path(), &["cache", "show", "1"]);
    assert!(ids(&shown["ids"]).is_empty());

    blk_json(dir.path(), &["cache", "warm", "1"]);
    blk_json(dir.path(), &["cache", "clear", "1"]);
    blk_cmd(dir.path())
        .args(["cache", "show", "1"])
        .assert()
        .success()
        .stdout("-\n");
}

#[test]
fn cache_blockers_slot_invalidated_by_counterpart_mutation() {
    let dir = TempDir::new().expect("temp dir");
    blk_json(dir.path(), &["cache", "warm", "2", "--direction", "blockers"]);
    blk_json(dir.path(), &["block", "1", "2"]);

    let check = blk_json(dir.path(), &["check", "2", "1"]);
    assert_eq!(check["is_blocked_by"], true);
}

#[test]
fn cache_purge_drops_expired_entries() {
    let dir = TempDir::new().expect("temp dir");
    blk_json(dir.path(), &["cache", "warm", "1", "--ttl", "0"]);
    let purge = blk_json(dir.path(), &["cache", "purge"]);
    assert_eq!(purge["purged"], 1);
}

// ---------------------------------------------------------------------------
// Config and errors
// ---------------------------------------------------------------------------

#[test]
fn invalid_identity_reports_code() {
    let dir = TempDir::new().expect("temp dir");
    blk_cmd(dir.path())
        .args(["block", "alice", "2"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("E2001"));

    let output = blk_cmd(dir.path())
        .args(["check", "0", "2", "--json"])
        .output()
        .expect("run");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("\"error_code\": \"E2001\""), "stderr: {stderr}");
}

#[test]
fn config_file_sets_db_path_and_ttl() {
    let dir = TempDir::new().expect("temp dir");
    std::fs::write(
        dir.path().join("blocklist.toml"),
        "[cache]\nttl_secs = 42\nnamespace = \"e2e\"\n\n[store]\npath = \"data/blocks.db\"\n",
    )
    .expect("write config");

    let warm = blk_json(dir.path(), &["cache", "warm", "9"]);
    assert_eq!(warm["ttl_secs"], 42);
    assert!(dir.path().join("data/blocks.db").exists());

    let info = blk_json(dir.path(), &["info"]);
    assert_eq!(info["cache_namespace"], "e2e");
    assert_eq!(info["cache_ttl_secs"], 42);
    assert_eq!(info["schema_version"], 2);
}

#[test]
fn db_flag_overrides_config() {
    let dir = TempDir::new().expect("temp dir");
    let db = dir.path().join("elsewhere.sqlite3");
    blk_cmd(dir.path())
        .args(["block", "1", "2", "--db"])
        .arg(&db)
        .assert()
        .success();
    assert!(db.exists());
    assert!(!dir.path().join("blocklist.db").exists());
}

#[test]
fn malformed_config_fails_with_parse_code() {
    let dir = TempDir::new().expect("temp dir");
    std::fs::write(dir.path().join("blocklist.toml"), "[cache\n").expect("write config");
    blk_cmd(dir.path())
        .args(["count", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("E1001"));
}
