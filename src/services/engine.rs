//! Narrow seam around markdown formatters/linters so the core rules never depend on one.

use crate::cli::EngineKind;
use crate::domain::errors::EngineError;
use crate::services::parser::fence_marker;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::Command;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineIssue {
    pub line: usize,
    pub rule: String,
    pub message: String,
}

pub trait MarkdownEngine: Sync {
    fn name(&self) -> &str;
    fn format(&self, text: &str) -> Result<String, EngineError>;
    fn lint(&self, text: &str) -> Result<Vec<EngineIssue>, EngineError>;
}

pub fn engine_for(kind: EngineKind) -> Result<Option<Box<dyn MarkdownEngine>>, EngineError> {
    Ok(match kind {
        EngineKind::None => None,
        EngineKind::Builtin => Some(Box::new(BuiltinEngine)),
        EngineKind::Markdownlint => Some(Box::new(MarkdownlintEngine::detect()?)),
    })
}

/// Whitespace hygiene only; fenced code is passed through untouched.
pub struct BuiltinEngine;

struct Line<'a> {
    text: &'a str,
    in_code: bool,
}

fn classify(text: &str) -> Vec<Line<'_>> {
    let mut out = Vec::new();
    let mut open: Option<String> = None;
    for line in text.lines() {
        match &open {
            Some(marker) => {
                let closes = line.trim() == marker.as_str();
                out.push(Line {
                    text: line,
                    in_code: !closes,
                });
                if closes {
                    open = None;
                }
            }
            None => {
                if let Some((marker, _)) = fence_marker(line) {
                    open = Some(marker.to_string());
                }
                out.push(Line {
                    text: line,
                    in_code: false,
                });
            }
        }
    }
    out
}

/// Two trailing spaces are a markdown hard break and stay.
fn trailing_ws_is_violation(line: &str) -> bool {
    let trimmed = line.trim_end();
    let trailing = &line[trimmed.len()..];
    !trailing.is_empty() && !(trailing == "  " && !trimmed.is_empty())
}

impl MarkdownEngine for BuiltinEngine {
    fn name(&self) -> &str {
        "builtin"
    }

    fn format(&self, text: &str) -> Result<String, EngineError> {
        let mut out: Vec<String> = Vec::new();
        let mut blank_run = 0;
        for line in classify(text) {
            if line.in_code {
                blank_run = 0;
                out.push(line.text.to_string());
                continue;
            }
            let fixed = if trailing_ws_is_violation(line.text) {
                line.text.trim_end().to_string()
            } else {
                line.text.to_string()
            };
            if fixed.is_empty() {
                blank_run += 1;
                if blank_run > 1 {
                    continue;
                }
            } else {
                blank_run = 0;
            }
            out.push(fixed);
        }
        while out.last().map(|l| l.is_empty()).unwrap_or(false) {
            out.pop();
        }
        if out.is_empty() {
            return Ok(String::new());
        }
        Ok(format!("{}\n", out.join("\n")))
    }

    fn lint(&self, text: &str) -> Result<Vec<EngineIssue>, EngineError> {
        let mut issues = Vec::new();
        let mut blank_run = 0;
        for (idx, line) in classify(text).iter().enumerate() {
            let n = idx + 1;
            if line.in_code {
                blank_run = 0;
                continue;
            }
            if trailing_ws_is_violation(line.text) {
                issues.push(EngineIssue {
                    line: n,
                    rule: "MD009".into(),
                    message: "trailing whitespace".into(),
                });
            }
            if line.text.contains('\t') {
                issues.push(EngineIssue {
                    line: n,
                    rule: "MD010".into(),
                    message: "hard tab".into(),
                });
            }
            if line.text.trim().is_empty() {
                blank_run += 1;
                if blank_run == 2 {
                    issues.push(EngineIssue {
                        line: n,
                        rule: "MD012".into(),
                        message: "multiple consecutive blank lines".into(),
                    });
                }
            } else {
                blank_run = 0;
            }
        }
        if !text.is_empty() && (!text.ends_with('\n') || text.ends_with("\n\n")) {
            issues.push(EngineIssue {
                line: text.lines().count().max(1),
                rule: "MD047".into(),
                message: "file should end with a single newline".into(),
            });
        }
        Ok(issues)
    }
}

/// `markdownlint` / `markdownlint-cli2`, run against a temp copy of the text.
pub struct MarkdownlintEngine {
    command: String,
    config: Option<PathBuf>,
}

const MARKDOWNLINT_COMMANDS: &[&str] = &["markdownlint", "markdownlint-cli2"];

impl MarkdownlintEngine {
    pub fn detect() -> Result<Self, EngineError> {
        for cmd in MARKDOWNLINT_COMMANDS {
            let found = Command::new(cmd)
                .arg("--version")
                .output()
                .map(|o| o.status.success())
                .unwrap_or(false);
            if found {
                tracing::debug!(command = cmd, "markdownlint engine detected");
                let config = Path::new(".markdownlint.json");
                return Ok(Self {
                    command: cmd.to_string(),
                    config: config.exists().then(|| config.to_path_buf()),
                });
            }
        }
        Err(EngineError::NotFound)
    }

    fn run(&self, path: &Path, fix: bool) -> Result<std::process::Output, EngineError> {
        let mut cmd = Command::new(&self.command);
        if fix {
            cmd.arg("--fix");
        }
        if let Some(cfg) = &self.config {
            cmd.arg("--config").arg(cfg);
        }
        Ok(cmd.arg(path).output()?)
    }

    fn temp_copy(text: &str) -> Result<tempfile::NamedTempFile, EngineError> {
        let file = tempfile::Builder::new()
            .prefix("rulegate-")
            .suffix(".md")
            .tempfile()?;
        std::fs::write(file.path(), text)?;
        Ok(file)
    }
}

/// `file:line[:col] MDxxx/alias description`
pub fn parse_markdownlint_output(output: &str) -> Vec<EngineIssue> {
    output
        .lines()
        .filter_map(|l| {
            let (location, rest) = l.split_once(' ')?;
            let mut parts = location.rsplitn(3, ':');
            let a = parts.next()?;
            let b = parts.next()?;
            let line = b.parse::<usize>().or_else(|_| a.parse::<usize>()).ok()?;
            let (rule, message) = rest.trim().split_once(' ')?;
            let rule = rule.split('/').next().unwrap_or(rule);
            Some(EngineIssue {
                line,
                rule: rule.to_string(),
                message: message.trim().to_string(),
            })
        })
        .collect()
}

impl MarkdownEngine for MarkdownlintEngine {
    fn name(&self) -> &str {
        &self.command
    }

    fn format(&self, text: &str) -> Result<String, EngineError> {
        let file = Self::temp_copy(text)?;
        // --fix exits non-zero when unfixable findings remain; the rewritten file is still valid
        self.run(file.path(), true)?;
        Ok(std::fs::read_to_string(file.path())?)
    }

    fn lint(&self, text: &str) -> Result<Vec<EngineIssue>, EngineError> {
        let file = Self::temp_copy(text)?;
        let out = self.run(file.path(), false)?;
        let combined = format!(
            "{}\n{}",
            String::from_utf8_lossy(&out.stdout),
            String::from_utf8_lossy(&out.stderr)
        );
        let issues = parse_markdownlint_output(&combined);
        if !out.status.success() && issues.is_empty() {
            return Err(EngineError::Execution {
                command: self.command.clone(),
                reason: combined.trim().to_string(),
            });
        }
        Ok(issues)
    }
}
