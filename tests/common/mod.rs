#![allow(dead_code)]

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const FRONTMATTER: &str = "---\ndescription: Python style rules\nglobs: ['**/*.py']\nalwaysApply: false\ntags: [python]\nversion: 1.0.0\n---\n";

pub const CONCISE_BODY: &str = "# Python Style\n\nUse type hints on every public function and keep modules small.\n\n```python\n# Good\ndef add(a: int, b: int) -> int:\n    return a + b\n```\n\n";

pub struct TestEnv {
    _tmp: TempDir,
    pub home: PathBuf,
    pub root: PathBuf,
}

impl TestEnv {
    pub fn new() -> Self {
        let tmp = TempDir::new().expect("create temp dir");
        let home = tmp.path().join("home");
        fs::create_dir_all(&home).expect("create isolated home");
        let root = tmp.path().join("repo");
        make_fixture_corpus(&root);
        Self {
            _tmp: tmp,
            home,
            root,
        }
    }

    pub fn cmd(&self) -> Command {
        let mut cmd = cargo_bin_cmd!("rulegate");
        cmd.env("HOME", &self.home)
            .env_remove("GITHUB_BASE_SHA")
            .env_remove("GITHUB_SHA")
            .env_remove("RULEGATE_LOG")
            .current_dir(&self.root);
        cmd
    }

    pub fn write(&self, rel: &str, content: &str) -> PathBuf {
        let path = self.root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dir");
        }
        fs::write(&path, content).expect("write fixture file");
        path
    }

    pub fn run_json(&self, args: &[&str]) -> Value {
        let out = self
            .cmd()
            .arg("--json")
            .args(args)
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        serde_json::from_slice(&out).expect("valid json output")
    }

    /// Same as `run_json` but the command is expected to exit 1.
    pub fn run_json_failing(&self, args: &[&str]) -> Value {
        let out = self
            .cmd()
            .arg("--json")
            .args(args)
            .assert()
            .code(1)
            .get_output()
            .stdout
            .clone();
        serde_json::from_slice(&out).expect("valid json output")
    }
}

/// Issue codes of a JSON issue array, in output order.
pub fn codes(issues: &Value) -> Vec<String> {
    issues
        .as_array()
        .expect("issue array")
        .iter()
        .map(|i| i["code"].as_str().expect("code string").to_string())
        .collect()
}

fn make_fixture_corpus(root: &Path) {
    let full = root.join("full-rules/python");
    let concise = root.join(".concise-rules/python");
    fs::create_dir_all(&full).expect("create full track");
    fs::create_dir_all(&concise).expect("create concise track");

    fs::write(
        full.join("01-python-style.mdc"),
        format!("{FRONTMATTER}{}", CONCISE_BODY.repeat(4)),
    )
    .expect("write full rule");
    fs::write(
        concise.join("01-python-style.mdc"),
        format!("{FRONTMATTER}{CONCISE_BODY}"),
    )
    .expect("write concise rule");
    fs::write(root.join("full-rules/README.md"), "# Full rules\n").expect("write readme");
    fs::write(root.join("CHANGELOG.md"), "# Changelog\n").expect("write changelog");
}
