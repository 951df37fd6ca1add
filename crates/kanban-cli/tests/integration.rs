#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::path::PathBuf;
use tempfile::TempDir;

const BODY: &str = "Users can log in with an email and a password.";

fn kanban(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("kanban").unwrap();
    cmd.current_dir(dir.path())
        .env("KANBAN_ROOT", dir.path())
        .env("KANBAN_ACTOR", "tester");
    cmd
}

fn init_project(dir: &TempDir) {
    kanban(dir).arg("init").assert().success();
}

fn json(dir: &TempDir, args: &[&str]) -> Value {
    let output = kanban(dir).arg("--json").args(args).output().unwrap();
    assert!(
        output.status.success(),
        "{args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).unwrap()
}

fn show(dir: &TempDir, id: &str) -> Value {
    json(dir, &["show", id])
}

fn create(dir: &TempDir, epic: &str, title: &str, extra: &[&str]) -> Value {
    let mut args = vec!["create", epic, title];
    args.extend_from_slice(extra);
    json(dir, &args)
}

fn move_to(dir: &TempDir, id: &str, status: &str) {
    kanban(dir)
        .args(["move", id, status, "--reason", "test setup"])
        .assert()
        .success();
}

fn task_file(dir: &TempDir, status: &str, id: &str) -> PathBuf {
    dir.path()
        .join("data/kanban/status")
        .join(status)
        .join(format!("{id}.md"))
}

/// Status column of `id` in manifest.tsv.
fn manifest_status(dir: &TempDir, id: &str) -> Option<String> {
    let text = std::fs::read_to_string(dir.path().join("data/kanban/manifest.tsv")).unwrap();
    text.lines()
        .skip(1)
        .map(|line| line.split('\t').collect::<Vec<_>>())
        .find(|cols| cols[0] == id)
        .map(|cols| cols[3].to_string())
}

// ---------------------------------------------------------------------------
// kanban init
// ---------------------------------------------------------------------------

#[test]
fn init_creates_layout() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);

    let base = dir.path().join("data/kanban");
    for status in ["stub", "backlog", "ready", "active", "qa", "regression", "done", "archived", "blocked"] {
        assert!(base.join("status").join(status).is_dir(), "missing {status}");
    }
    assert!(base.join("trash").is_dir());
    assert!(base.join("info/epics.toml").exists());
    assert!(base.join("info/nfrs.toml").exists());
    assert!(base.join("info/milestones.toml").exists());
    assert!(base.join("info/config.toml").exists());
}

#[test]
fn init_twice_requires_force() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    kanban(&dir)
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("already initialized"));
    kanban(&dir).args(["init", "--force"]).assert().success();
}

#[test]
fn commands_fail_before_init() {
    let dir = TempDir::new().unwrap();
    kanban(&dir)
        .arg("list")
        .assert()
        .failure()
        .stderr(predicate::str::contains("kanban init"));
}

// ---------------------------------------------------------------------------
// create / show / list
// ---------------------------------------------------------------------------

#[test]
fn create_assigns_sequential_ids() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);

    let first = create(&dir, "FEAT", "Login", &[]);
    let second = create(&dir, "feat", "Logout", &[]);
    assert_eq!(first["id"], "FEAT-01");
    assert_eq!(second["id"], "FEAT-02");
    assert_eq!(first["status"], "stub");
    assert!(task_file(&dir, "stub", "FEAT-02").exists());
}

#[test]
fn create_rejects_unknown_epic() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    kanban(&dir)
        .args(["create", "NOPE", "Something"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown epic"));
}

#[test]
fn create_with_body_uses_template() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    create(&dir, "FEAT", "Login", &["--body", BODY]);

    let task = show(&dir, "FEAT-01");
    let content = task["content"].as_str().unwrap();
    assert!(content.contains("## Description"));
    assert!(content.contains(BODY));
    assert!(content.contains("## Acceptance Criteria"));
}

#[test]
fn list_filters_by_status() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    create(&dir, "FEAT", "Login", &[]);
    create(&dir, "BUGS", "Crash on start", &[]);
    move_to(&dir, "BUGS-01", "active");

    let rows = json(&dir, &["list", "--status", "active"]);
    let ids: Vec<_> = rows.as_array().unwrap().iter().map(|r| r["id"].clone()).collect();
    assert_eq!(ids, vec![Value::from("BUGS-01")]);

    kanban(&dir)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("FEAT-01"))
        .stdout(predicate::str::contains("BUGS-01"));
}

// ---------------------------------------------------------------------------
// Workflow scenarios
// ---------------------------------------------------------------------------

#[test]
fn promote_empty_stub_is_blocked() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    create(&dir, "FEAT", "Login", &["--sp", "0"]);

    kanban(&dir)
        .args(["promote", "FEAT-01", "backlog"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("description"))
        .stderr(predicate::str::contains("story points"));
    assert!(task_file(&dir, "stub", "FEAT-01").exists());
}

#[test]
fn promote_ready_stub_moves_file_and_manifest() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    create(&dir, "FEAT", "Login", &[]);
    create(&dir, "FEAT", "Logout", &["--sp", "3", "--body", BODY]);

    kanban(&dir)
        .args(["promote", "FEAT-02"])
        .assert()
        .success()
        .stdout(predicate::str::contains("stub → backlog"));

    assert!(!task_file(&dir, "stub", "FEAT-02").exists());
    assert!(task_file(&dir, "backlog", "FEAT-02").exists());
    assert_eq!(manifest_status(&dir, "FEAT-02").as_deref(), Some("backlog"));
}

#[test]
fn demote_from_qa_lands_in_regression() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    create(&dir, "FEAT", "Login", &[]);
    move_to(&dir, "FEAT-01", "qa");

    kanban(&dir).args(["demote", "FEAT-01"]).assert().success();
    assert_eq!(show(&dir, "FEAT-01")["status"], "regression");
}

#[test]
fn demote_from_done_needs_reason() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    create(&dir, "FEAT", "Login", &[]);
    move_to(&dir, "FEAT-01", "done");

    kanban(&dir)
        .args(["demote", "FEAT-01"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("requires --reason"));

    kanban(&dir)
        .args(["demote", "FEAT-01", "--reason", "broke in prod"])
        .assert()
        .success();
    let task = show(&dir, "FEAT-01");
    assert_eq!(task["status"], "qa");
    assert_eq!(task["demotion_reason"], "broke in prod");
}

#[test]
fn qa_to_done_takes_commit() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    create(&dir, "FEAT", "Login", &[]);
    move_to(&dir, "FEAT-01", "qa");

    kanban(&dir)
        .args(["promote", "FEAT-01"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("commit hash"));
    kanban(&dir)
        .args(["promote", "FEAT-01", "--commit", "abc1234"])
        .assert()
        .success();

    let task = show(&dir, "FEAT-01");
    assert_eq!(task["status"], "done");
    assert_eq!(task["commit_hash"], "abc1234");
}

#[test]
fn active_to_qa_after_passing_verification() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    create(&dir, "FEAT", "Login", &[]);
    move_to(&dir, "FEAT-01", "active");
    kanban(&dir)
        .args([
            "link", "FEAT-01", "--code", "src/login.rs", "--test", "tests/login.rs", "--verify", "true",
        ])
        .assert()
        .success();

    kanban(&dir)
        .args(["promote", "FEAT-01"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Verification must pass"));

    kanban(&dir)
        .args(["verify", "FEAT-01", "--update"])
        .assert()
        .success()
        .stdout(predicate::str::contains("PASSED"));
    kanban(&dir).args(["promote", "FEAT-01"]).assert().success();
    assert_eq!(show(&dir, "FEAT-01")["status"], "qa");
}

#[test]
fn failing_verification_exits_non_zero() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    create(&dir, "FEAT", "Login", &[]);
    kanban(&dir)
        .args(["link", "FEAT-01", "--verify", "echo boom; exit 3"])
        .assert()
        .success();

    kanban(&dir)
        .args(["verify", "FEAT-01", "--update"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("boom"));
    let task = show(&dir, "FEAT-01");
    assert_eq!(task["verification"]["status"], "failed");
}

#[test]
fn resolve_duplicate_needs_target() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    create(&dir, "BUGS", "Crash on start", &[]);
    move_to(&dir, "BUGS-01", "qa");

    kanban(&dir)
        .args(["resolve", "BUGS-01", "--resolution", "duplicate", "--reason", "seen before"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--duplicate-of"));

    kanban(&dir)
        .args([
            "resolve", "BUGS-01", "--resolution", "duplicate", "--reason", "seen before",
            "--duplicate-of", "BUGS-00",
        ])
        .assert()
        .success();
    let task = show(&dir, "BUGS-01");
    assert_eq!(task["status"], "done");
    assert_eq!(task["resolution"], "duplicate");
    assert_eq!(task["duplicate_of"], "BUGS-00");
}

#[test]
fn resolve_rejects_feature_tasks() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    create(&dir, "FEAT", "Login", &[]);
    kanban(&dir)
        .args(["resolve", "FEAT-01", "--resolution", "fixed", "--reason", "done"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be resolved"));
}

#[test]
fn move_requires_reason_and_reports_each_id() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    create(&dir, "FEAT", "Login", &[]);
    create(&dir, "FEAT", "Logout", &[]);

    kanban(&dir)
        .args(["move", "FEAT-01", "ready"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("requires a reason"));

    kanban(&dir)
        .args(["move", "FEAT-01,FEAT-02", "FEAT-09", "ready", "--reason", "triage"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("FEAT-09"));
    assert_eq!(show(&dir, "FEAT-01")["status"], "ready");
    assert_eq!(show(&dir, "FEAT-02")["status"], "ready");
}

#[test]
fn block_then_unblock_returns_to_backlog() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    create(&dir, "FEAT", "Login", &[]);
    move_to(&dir, "FEAT-01", "active");

    kanban(&dir)
        .args(["block", "FEAT-01", "--reason", "waiting on API"])
        .assert()
        .success();
    let task = show(&dir, "FEAT-01");
    assert_eq!(task["status"], "blocked");
    assert_eq!(task["blocked_reason"], "waiting on API");

    kanban(&dir)
        .args(["promote", "FEAT-01"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("kanban unblock FEAT-01"));

    kanban(&dir)
        .args(["unblock", "FEAT-01", "--reason", "API shipped"])
        .assert()
        .success();
    let task = show(&dir, "FEAT-01");
    assert_eq!(task["status"], "backlog");
    assert!(task["blocked_reason"].is_null());
}

// ---------------------------------------------------------------------------
// Overrides
// ---------------------------------------------------------------------------

#[test]
fn override_is_logged_and_aggregated() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    create(&dir, "FEAT", "Login", &[]);

    kanban(&dir)
        .args(["promote", "FEAT-01", "--override", "--reason", "hotfix"])
        .assert()
        .success()
        .stdout(predicate::str::contains("(override)"));

    let log = std::fs::read_to_string(dir.path().join("data/kanban/info/override_log.txt")).unwrap();
    assert!(log.contains("FEAT-01 | stub→backlog | Reason: hotfix"));

    kanban(&dir)
        .args(["delete", "FEAT-01", "--reason", "obsolete"])
        .assert()
        .success();
    kanban(&dir)
        .arg("overrides")
        .assert()
        .success()
        .stdout(predicate::str::contains("hotfix"))
        .stdout(predicate::str::contains("(trashed)"));
}

// ---------------------------------------------------------------------------
// Archive and signoff
// ---------------------------------------------------------------------------

#[test]
fn archive_requires_signoff_flag() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    create(&dir, "FEAT", "Login", &[]);
    move_to(&dir, "FEAT-01", "done");

    kanban(&dir)
        .args(["archive", "FEAT-01", "--reason", "shipped"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--signoff"));

    kanban(&dir)
        .args(["archive", "FEAT-01", "--signoff", "--reason", "shipped"])
        .assert()
        .success();
    assert_eq!(show(&dir, "FEAT-01")["status"], "archived");

    let rows = json(&dir, &["list"]);
    assert!(rows.as_array().unwrap().is_empty());
    let rows = json(&dir, &["list", "--all"]);
    assert_eq!(rows.as_array().unwrap().len(), 1);
}

#[test]
fn signoff_mode_limits_archive_to_the_list() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    kanban(&dir)
        .args(["flag", "enable", "signoff-mode"])
        .assert()
        .success()
        .stdout(predicate::str::contains("signoff_mode enabled"));

    create(&dir, "FEAT", "Login", &[]);
    create(&dir, "FEAT", "Logout", &[]);
    move_to(&dir, "FEAT-01", "done");
    move_to(&dir, "FEAT-02", "done");
    kanban(&dir).args(["signoff", "add", "FEAT-01"]).assert().success();

    let report = json(&dir, &["archive", "--all-done", "--signoff", "--dry-run"]);
    assert_eq!(report["eligible"], serde_json::json!(["FEAT-01"]));
    assert_eq!(show(&dir, "FEAT-01")["status"], "done");

    kanban(&dir)
        .args(["archive", "--all-done", "--signoff", "--yes"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("FEAT-02"));
    assert_eq!(show(&dir, "FEAT-01")["status"], "archived");
    assert_eq!(show(&dir, "FEAT-02")["status"], "done");

    let list = json(&dir, &["signoff", "list"]);
    assert_eq!(list["tickets"], serde_json::json!([]));
}

#[test]
fn flags_are_listed_and_toggled() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);

    let flags = json(&dir, &["flag", "list"]);
    assert_eq!(flags["signoff_mode"], false);
    kanban(&dir)
        .args(["flag", "enable", "signoff_mode"])
        .assert()
        .success();
    assert_eq!(json(&dir, &["flag", "list"])["signoff_mode"], true);
    assert_eq!(json(&dir, &["signoff", "list"])["signoff_mode"], true);

    let again = json(&dir, &["flag", "enable", "signoff_mode"]);
    assert_eq!(again["changed"], false);
    kanban(&dir)
        .args(["flag", "disable", "signoff_mode"])
        .assert()
        .success()
        .stdout(predicate::str::contains("signoff_mode disabled"));
    kanban(&dir)
        .args(["flag", "enable", "turbo"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown flag"));
}

// ---------------------------------------------------------------------------
// Delete / recover / rename
// ---------------------------------------------------------------------------

#[test]
fn delete_and_recover_roundtrip() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    create(&dir, "FEAT", "Login", &[]);
    create(&dir, "FEAT", "Logout", &[]);
    let created = create(&dir, "FEAT", "Profile", &[]);
    let auto_id = created["auto_id"].as_u64().unwrap();
    move_to(&dir, "FEAT-03", "ready");

    kanban(&dir)
        .args(["delete", "FEAT-03"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("requires a reason"));
    kanban(&dir)
        .args(["delete", "FEAT-03", "--reason", "duplicate work"])
        .assert()
        .success();

    let trashed = dir
        .path()
        .join("data/kanban/trash")
        .join(format!("{auto_id}.FEAT-03.md"));
    assert!(trashed.exists());
    assert!(manifest_status(&dir, "FEAT-03").is_none());

    let entries = json(&dir, &["trash", "list"]);
    assert_eq!(entries[0]["id"], "FEAT-03");

    let recovered = json(
        &dir,
        &["recover", &auto_id.to_string(), "--reason", "still needed"],
    );
    assert_eq!(recovered["id"], "FEAT-03");
    assert!(!trashed.exists());
    let task = show(&dir, "FEAT-03");
    assert_eq!(task["status"], "ready");
    let last = task["history"].as_array().unwrap().last().unwrap().clone();
    assert_eq!(last["action"], "recover");
}

#[test]
fn recover_renumbers_on_collision() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    create(&dir, "FEAT", "Login", &[]);
    create(&dir, "FEAT", "Logout", &[]);
    let created = create(&dir, "FEAT", "Profile", &["--body", "Profile page for FEAT-03 users."]);
    let auto_id = created["auto_id"].as_u64().unwrap();

    kanban(&dir)
        .args(["delete", "FEAT-03", "--reason", "wrong scope"])
        .assert()
        .success();
    let replacement = create(&dir, "FEAT", "Settings", &[]);
    assert_eq!(replacement["id"], "FEAT-03");

    let recovered = json(&dir, &["recover", &auto_id.to_string(), "--reason", "scope fixed"]);
    assert_eq!(recovered["original_id"], "FEAT-03");
    assert_eq!(recovered["id"], "FEAT-04");

    let task = show(&dir, "FEAT-04");
    assert_eq!(task["title"], "Profile");
    assert!(task["content"].as_str().unwrap().contains("FEAT-04 users"));
    assert_eq!(show(&dir, "FEAT-03")["title"], "Settings");
}

#[test]
fn recover_unknown_auto_id_fails() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    kanban(&dir)
        .args(["recover", "42", "--reason", "why not"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no trash entry"));
}

#[test]
fn rename_moves_file_and_manifest_row() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    create(&dir, "FEAT", "Login", &[]);
    create(&dir, "FEAT", "Logout", &[]);

    kanban(&dir)
        .args(["rename", "FEAT-01", "FEAT-02"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));

    kanban(&dir)
        .args(["rename", "FEAT-01", "REF-05"])
        .assert()
        .success();
    assert!(!task_file(&dir, "stub", "FEAT-01").exists());
    assert!(task_file(&dir, "stub", "REF-05").exists());
    assert!(manifest_status(&dir, "FEAT-01").is_none());
    assert_eq!(manifest_status(&dir, "REF-05").as_deref(), Some("stub"));
}

#[test]
fn trash_empty_removes_entries() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    create(&dir, "FEAT", "Login", &[]);
    kanban(&dir)
        .args(["delete", "FEAT-01", "--reason", "gone"])
        .assert()
        .success();

    kanban(&dir)
        .args(["trash", "empty", "--yes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed 1"));
    kanban(&dir)
        .args(["trash", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Trash is empty"));
}

// ---------------------------------------------------------------------------
// Manifest
// ---------------------------------------------------------------------------

#[test]
fn missing_manifest_is_rebuilt() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    create(&dir, "FEAT", "Login", &[]);
    create(&dir, "FEAT", "Logout", &[]);
    std::fs::remove_file(dir.path().join("data/kanban/manifest.tsv")).unwrap();

    let rows = json(&dir, &["list"]);
    assert_eq!(rows.as_array().unwrap().len(), 2);
    assert!(dir.path().join("data/kanban/manifest.tsv").exists());

    let report = json(&dir, &["manifest", "rebuild"]);
    assert_eq!(report["rows"], 2);
}

#[test]
fn first_create_does_not_rebuild_manifest() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    kanban(&dir)
        .args(["create", "FEAT", "Login"])
        .assert()
        .success()
        .stderr(predicate::str::contains("rebuilding").not());
    assert_eq!(manifest_status(&dir, "FEAT-01").as_deref(), Some("stub"));

    kanban(&dir)
        .args(["delete", "FEAT-01", "--reason", "start over"])
        .assert()
        .success();
    kanban(&dir)
        .args(["create", "FEAT", "Logout"])
        .assert()
        .success()
        .stderr(predicate::str::contains("rebuilding").not());
    let rows = json(&dir, &["list"]);
    assert_eq!(rows.as_array().unwrap().len(), 1);
    assert_eq!(rows[0]["title"], "Logout");
}

// ---------------------------------------------------------------------------
// Edits and reports
// ---------------------------------------------------------------------------

#[test]
fn tag_assign_and_sprint() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    create(&dir, "FEAT", "Login", &[]);

    kanban(&dir)
        .args(["tag", "FEAT-01", "--add", "auth,ui"])
        .assert()
        .success();
    kanban(&dir)
        .args(["assign", "FEAT-01", "nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("milestone-1"));
    kanban(&dir)
        .args(["assign", "FEAT-01", "milestone-1"])
        .assert()
        .success();
    kanban(&dir).args(["sprint", "add", "FEAT-01"]).assert().success();

    let task = show(&dir, "FEAT-01");
    assert_eq!(task["tags"], serde_json::json!(["auth", "ui"]));
    assert_eq!(task["milestone"], "milestone-1");
    assert_eq!(task["in_sprint"], true);

    let sprint = json(&dir, &["sprint", "list"]);
    assert_eq!(sprint, serde_json::json!(["FEAT-01"]));
}

#[test]
fn issues_are_appended_to_the_body() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    create(&dir, "FEAT", "Login", &["--body", BODY]);

    kanban(&dir)
        .args(["issues", "add", "FEAT-01", "Flaky", "on", "CI"])
        .assert()
        .success();
    let issues = json(&dir, &["issues", "list", "FEAT-01"]);
    assert_eq!(issues[0]["description"], "Flaky on CI");
}

#[test]
fn history_records_every_transition() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    create(&dir, "FEAT", "Login", &["--sp", "2", "--body", BODY]);
    kanban(&dir).args(["promote", "FEAT-01"]).assert().success();

    let entries = json(&dir, &["history", "FEAT-01"]);
    let actions: Vec<_> = entries
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["entry"]["action"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(actions, vec!["create", "promote"]);
    assert_eq!(entries[1]["entry"]["actor"], "tester");
}

#[test]
fn search_matches_keywords_and_filters() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    create(&dir, "FEAT", "Login form", &["--tags", "auth"]);
    create(&dir, "FEAT", "Password reset", &["--body", "Mail a login link to the user."]);
    create(&dir, "BUGS", "Login crash", &[]);
    move_to(&dir, "BUGS-01", "active");

    let ids = |value: Value| -> Vec<String> {
        value["items"]
            .as_array()
            .unwrap()
            .iter()
            .map(|h| h["id"].as_str().unwrap().to_string())
            .collect()
    };
    assert_eq!(
        ids(json(&dir, &["search", "login"])),
        vec!["BUGS-01", "FEAT-01", "FEAT-02"]
    );
    assert_eq!(ids(json(&dir, &["search", "login", "--filter", "title"])), vec!["BUGS-01", "FEAT-01"]);
    assert_eq!(ids(json(&dir, &["search", "login", "auth"])), vec!["FEAT-01"]);
    assert_eq!(ids(json(&dir, &["search", "login", "--epic", "feat"])), vec!["FEAT-01", "FEAT-02"]);
    assert_eq!(
        ids(json(&dir, &["search", "login", "--status", "active,qa"])),
        vec!["BUGS-01"]
    );

    kanban(&dir)
        .args(["search", "login", "--filter", "colour"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("colour"));
    kanban(&dir)
        .args(["search", "nothing-like-this"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No tasks matched"));
}

#[test]
fn milestone_show_start_complete() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    create(&dir, "FEAT", "Login", &["--sp", "3", "--milestone", "milestone-2"]);
    create(&dir, "FEAT", "Logout", &["--sp", "2", "--milestone", "milestone-2"]);
    move_to(&dir, "FEAT-01", "done");

    let report = json(&dir, &["milestone", "show", "milestone-2"]);
    assert_eq!(report["status"], "planned");
    assert_eq!(report["stats"]["total_tasks"], 2);
    assert_eq!(report["stats"]["completed_tasks"], 1);
    assert_eq!(report["stats"]["story_points_remaining"], 2);

    kanban(&dir)
        .args(["milestone", "start", "milestone-2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("planned → active"));
    kanban(&dir)
        .args(["milestone", "complete", "milestone-2"])
        .assert()
        .success()
        .stderr(predicate::str::contains("FEAT-02"));
    assert_eq!(json(&dir, &["milestone", "show", "milestone-2"])["status"], "completed");
    kanban(&dir)
        .arg("milestones")
        .assert()
        .success()
        .stdout(predicate::str::contains("completed"));

    kanban(&dir)
        .args(["milestone", "start", "milestone-9"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown milestone"));
}

#[test]
fn stats_and_groom() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    create(&dir, "FEAT", "Login", &["--sp", "3"]);
    create(&dir, "BUGS", "Crash", &["--sp", "2"]);

    let stats = json(&dir, &["stats"]);
    assert_eq!(stats["total"]["tasks"], 2);
    assert_eq!(stats["total"]["story_points"], 5);
    assert_eq!(stats["by_epic"]["FEAT"]["story_points"], 3);

    let groom = json(&dir, &["groom", "--ratio", "10"]);
    assert_eq!(groom["audited"], 2);
    assert_eq!(groom["needs_detail"].as_array().unwrap().len(), 2);
}

#[test]
fn registries_are_listed() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    kanban(&dir)
        .arg("epics")
        .assert()
        .success()
        .stdout(predicate::str::contains("FEAT"))
        .stdout(predicate::str::contains("BUGS"));
    kanban(&dir)
        .arg("milestones")
        .assert()
        .success()
        .stdout(predicate::str::contains("milestone-1"));
    kanban(&dir)
        .arg("nfrs")
        .assert()
        .success()
        .stdout(predicate::str::contains("NFR-SEC-001"));
}
