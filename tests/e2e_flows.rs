mod common;

use common::{codes, TestEnv};
use predicates::str::contains;
use std::fs;
use std::process::Command as StdCommand;

const LEGACY: &str = "# Python Style Guide\n\nPrefer small, typed functions.\n\n```python\n# Good\ndef f(x: int) -> int:\n    return x\n```\n";

#[test]
fn migrate_dry_run_then_write_then_idempotent() {
    let env = TestEnv::new();
    let legacy = env.write("legacy/python/style-guide.md", LEGACY);

    let dry = env.run_json(&["migrate", "legacy", "--dry-run"]);
    let outcome = &dry["data"][0];
    assert_eq!(outcome["status"], "dry_run");
    assert_eq!(outcome["destination"], "legacy/python/style-guide.mdc");
    assert!(outcome["diff"].as_str().unwrap().contains("+description: Python Style Guide"));
    assert_eq!(outcome["metadata"]["tags"][0], "python");
    assert_eq!(fs::read_to_string(&legacy).unwrap(), LEGACY);

    let done = env.run_json(&["migrate", "legacy"]);
    assert_eq!(done["data"][0]["status"], "migrated");
    assert_eq!(done["data"][0]["removed_source"], true);
    assert!(!legacy.exists());
    let migrated = env.root.join("legacy/python/style-guide.mdc");
    let text = fs::read_to_string(&migrated).unwrap();
    assert!(text.starts_with("---\n"));
    assert!(text.ends_with(LEGACY));

    let valid = env.run_json(&["validate", "legacy/python/style-guide.mdc"]);
    assert_eq!(valid["data"]["summary"]["errors"], 0);

    let again = env.run_json(&["migrate", "legacy"]);
    assert_eq!(again["data"][0]["status"], "already_migrated");
    assert_eq!(fs::read_to_string(&migrated).unwrap(), text);
}

#[test]
fn migrate_keep_source_and_conflict() {
    let env = TestEnv::new();
    let legacy = env.write("legacy/01-notes.md", "# Notes\n\nGeneral notes.\n");

    let out = env.run_json(&["migrate", "legacy/01-notes.md", "--keep-source"]);
    assert_eq!(out["data"][0]["status"], "migrated");
    assert_eq!(out["data"][0]["removed_source"], false);
    assert!(legacy.exists());

    // rerunning the same command is a no-op
    let again = env.run_json(&["migrate", "legacy/01-notes.md", "--keep-source"]);
    assert_eq!(again["data"][0]["status"], "already_migrated");
    let again = env.run_json(&["migrate", "legacy", "--keep-source"]);
    assert_eq!(again["data"][0]["status"], "already_migrated");

    // once the kept source diverges, the existing .mdc is a conflict
    env.write("legacy/01-notes.md", "# Notes\n\nGeneral notes, revised.\n");
    let conflict = env.run_json_failing(&["migrate", "legacy/01-notes.md"]);
    assert_eq!(conflict["ok"], false);
    assert_eq!(conflict["data"][0]["status"], "conflict");

    let forced = env.run_json(&["migrate", "legacy/01-notes.md", "--force"]);
    assert_eq!(forced["data"][0]["status"], "migrated");
    assert!(!legacy.exists());
}

#[test]
fn format_check_then_write() {
    let env = TestEnv::new();
    let path = env.write("notes/01-a.md", "# A   \n\n\n\ntext\t\n```sh\nls   \n```");

    let check = env.run_json_failing(&["format", "notes", "--check"]);
    assert_eq!(check["data"][0]["changed"], true);
    assert_eq!(check["data"][0]["written"], false);
    assert!(fs::read_to_string(&path).unwrap().contains("\n\n\n"));

    env.cmd()
        .args(["format", "notes"])
        .assert()
        .success()
        .stdout(contains("formatted\tnotes/01-a.md"));
    let text = fs::read_to_string(&path).unwrap();
    assert!(!text.contains("\n\n\n"));
    assert!(text.ends_with("```\n"));
    // fenced code is left alone
    assert!(text.contains("ls   \n"));

    let clean = env.run_json(&["format", "notes", "--check"]);
    assert_eq!(clean["ok"], true);
    assert_eq!(clean["data"][0]["changed"], false);
}

#[test]
fn format_keeps_going_past_an_oversized_file() {
    let env = TestEnv::new();
    env.write(".rulegate.toml", "[limits]\nmax_file_bytes = 64\n");
    let a = env.write("fmt/01-a.md", "# A   \n");
    let big = env.write("fmt/02-big.md", &format!("# Big   \n\n{}\n", "x".repeat(200)));
    let c = env.write("fmt/03-c.md", "# C   \n");

    let out = env.run_json_failing(&["format", "fmt"]);
    assert_eq!(out["ok"], false);
    let outcomes = out["data"].as_array().unwrap();
    assert_eq!(outcomes.len(), 3);
    assert_eq!(outcomes[0]["written"], true);
    assert_eq!(outcomes[1]["path"], "fmt/02-big.md");
    assert_eq!(outcomes[1]["written"], false);
    assert_eq!(codes(&outcomes[1]["issues"]), vec!["FileTooLarge"]);
    assert_eq!(outcomes[2]["written"], true);

    assert_eq!(fs::read_to_string(&a).unwrap(), "# A\n");
    assert_eq!(fs::read_to_string(&c).unwrap(), "# C\n");
    assert!(fs::read_to_string(&big).unwrap().starts_with("# Big   \n"));
}

#[test]
fn format_without_engine_is_an_error() {
    let env = TestEnv::new();
    env.cmd()
        .args(["format", "full-rules", "--engine", "none"])
        .assert()
        .failure()
        .stderr(contains("needs an engine"));
}

#[test]
fn report_on_clean_changeset_passes() {
    let env = TestEnv::new();
    let out = env.run_json(&[
        "report",
        "--changed",
        "full-rules/python/01-python-style.mdc",
        ".concise-rules/python/01-python-style.mdc",
        "CHANGELOG.md",
    ]);
    let data = &out["data"];
    assert_eq!(out["ok"], true);
    assert_eq!(data["passed"], true);
    assert_eq!(data["score"], 100);
    assert_eq!(data["files"].as_array().unwrap().len(), 2);
    assert_eq!(data["pairs"].as_array().unwrap().len(), 1);
    assert_eq!(data["changeset"]["modified"].as_array().unwrap().len(), 3);
}

#[test]
fn report_fails_on_errors_and_warns_on_missing_changelog() {
    let env = TestEnv::new();
    env.write("rules/React.md", "# React\n\n```\nx\n```\n");
    let out = env.run_json_failing(&["report", "--changed", "rules/React.md"]);
    let data = &out["data"];
    assert_eq!(data["passed"], false);
    assert_eq!(data["error_count"], 2);
    assert_eq!(data["warning_count"], 2);

    let files = data["files"].as_array().unwrap();
    let paths: Vec<&str> = files.iter().map(|f| f["path"].as_str().unwrap()).collect();
    assert_eq!(paths, vec!["CHANGELOG.md", "rules/React.md"]);
    assert_eq!(codes(&files[0]["issues"]), vec!["ChangelogNotUpdated"]);
    assert!(files[1]["score"].as_u64().unwrap() < 100);
}

#[test]
fn report_markdown() {
    let env = TestEnv::new();
    env.cmd()
        .args([
            "report",
            "--markdown",
            "--changed",
            "full-rules/python/01-python-style.mdc",
            "CHANGELOG.md",
        ])
        .assert()
        .success()
        .stdout(contains("# Rule Quality Report"))
        .stdout(contains("PASSED"));
}

fn git(root: &std::path::Path, args: &[&str]) -> bool {
    StdCommand::new("git")
        .arg("-C")
        .arg(root)
        .args(["-c", "user.name=Test", "-c", "user.email=test@example.com"])
        .args(args)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

#[test]
fn report_reads_changes_from_git() {
    let env = TestEnv::new();
    if !git(&env.root, &["init", "-q"]) {
        eprintln!("git unavailable; skipping");
        return;
    }
    assert!(git(&env.root, &["add", "-A"]));
    assert!(git(&env.root, &["commit", "-q", "-m", "base"]));
    env.write(
        ".concise-rules/python/01-python-style.mdc",
        "---\ndescription: Python style rules\nglobs: ['**/*.py']\nalwaysApply: true\ntags: [python]\nversion: 1.0.0\n---\n# Python Style\n\nUse type hints.\n",
    );
    env.write("CHANGELOG.md", "# Changelog\n\n- tighten python rules\n");
    assert!(git(&env.root, &["commit", "-q", "-am", "edit"]));

    let out = env.run_json(&["report", "--base", "HEAD~1", "--head", "HEAD"]);
    let data = &out["data"];
    assert_eq!(data["base"], "HEAD~1");
    assert_eq!(
        data["changeset"]["modified"],
        serde_json::json!([".concise-rules/python/01-python-style.mdc", "CHANGELOG.md"])
    );
    // alwaysApply differs from the full track and the ratio leaves the band: both warnings
    let concise = data["files"]
        .as_array()
        .unwrap()
        .iter()
        .find(|f| f["path"] == ".concise-rules/python/01-python-style.mdc")
        .expect("concise file in report");
    let found = codes(&concise["issues"]);
    assert!(found.contains(&"MetadataDrift".to_string()));
    assert!(found.contains(&"ReductionOutOfBand".to_string()));
    assert_eq!(data["passed"], true);
}
