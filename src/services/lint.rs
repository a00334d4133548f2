use crate::config::{Config, CorpusConfig, LintConfig};
use crate::domain::document::{Block, RuleDocument};
use crate::domain::issues::{IssueCode, Location, ValidationIssue};
use crate::services::fsio::{display_path, track_of, Track};
use anyhow::Context;
use regex::Regex;
use std::collections::HashSet;
use std::path::Path;

struct Forbidden {
    name: String,
    regex: Regex,
    message: String,
}

/// Structural rules compiled once per run; `lint` is pure per document.
pub struct Linter {
    naming: Regex,
    governed_dirs: Vec<String>,
    corpus: CorpusConfig,
    allowed_languages: HashSet<String>,
    forbidden: Vec<Forbidden>,
    markers: Regex,
    lint: LintConfig,
}

impl Linter {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let naming = Regex::new(&config.naming.pattern)
            .with_context(|| format!("invalid naming.pattern `{}`", config.naming.pattern))?;
        let forbidden = config
            .lint
            .forbidden_patterns
            .iter()
            .map(|p| {
                Ok(Forbidden {
                    name: p.name.clone(),
                    regex: Regex::new(&p.regex)
                        .with_context(|| format!("invalid forbidden pattern `{}`", p.name))?,
                    message: p.message.clone(),
                })
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        let mut allowed_languages: HashSet<String> = config
            .lint
            .allowed_languages
            .iter()
            .map(|l| l.to_ascii_lowercase())
            .collect();
        allowed_languages.insert("none".into());

        Ok(Self {
            naming,
            governed_dirs: config.naming.governed_dirs.clone(),
            corpus: config.corpus.clone(),
            allowed_languages,
            forbidden,
            markers: Regex::new(r"(?i)((//|#|--|<!--)\s*(good|bad)\b|\*\*(good|bad)\b|✅|❌)")?,
            lint: config.lint.clone(),
        })
    }

    pub fn lint(&self, doc: &RuleDocument) -> Vec<ValidationIssue> {
        let path = display_path(&doc.path);
        let mut issues = Vec::new();
        issues.extend(self.check_file_name(&doc.path, &path));
        issues.extend(heading_issues(&doc.blocks, &path, self.lint.max_heading_level));
        issues.extend(self.check_code_blocks(&doc.blocks, &path));
        issues.extend(self.check_forbidden(&doc.raw_text, &path));
        if self.lint.content_checks {
            issues.extend(self.check_content(doc, &path));
        }
        issues
    }

    fn is_governed(&self, path: &Path) -> bool {
        let Some(parent) = path.parent() else {
            return false;
        };
        parent.components().any(|c| {
            let c = c.as_os_str().to_string_lossy();
            self.governed_dirs.iter().any(|d| d == c.as_ref())
        })
    }

    fn check_file_name(&self, fs_path: &Path, path: &str) -> Option<ValidationIssue> {
        if !self.is_governed(fs_path) {
            return None;
        }
        let name = fs_path.file_name()?.to_string_lossy();
        if self.corpus.exempt_files.iter().any(|x| x == name.as_ref()) {
            return None;
        }
        let under_skipped = fs_path.components().any(|c| {
            let c = c.as_os_str().to_string_lossy();
            self.corpus.skip_dirs.iter().any(|d| d == c.as_ref())
        });
        if under_skipped || self.naming.is_match(&name) {
            return None;
        }
        Some(ValidationIssue::error(
            IssueCode::FileNamingViolation,
            Location::file(path),
            format!(
                "file name `{name}` does not match `{}` (e.g. 01-topic-name.md)",
                self.naming.as_str()
            ),
        ))
    }

    fn check_code_blocks(&self, blocks: &[Block], path: &str) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        for b in blocks.iter().filter(|b| b.is_code()) {
            let at = Location::line(path, b.line_number);
            match b.language.as_deref() {
                None => issues.push(ValidationIssue::error(
                    IssueCode::MissingCodeLanguage,
                    at.clone(),
                    "code block has no language tag (use `none` for plain text)",
                )),
                Some(lang) if !self.allowed_languages.contains(&lang.to_ascii_lowercase()) => {
                    issues.push(ValidationIssue::error(
                        IssueCode::MissingCodeLanguage,
                        at.clone(),
                        format!("code block language `{lang}` is not in the allow-list"),
                    ))
                }
                Some(_) => {}
            }
            if b.unterminated {
                issues.push(ValidationIssue::warning(
                    IssueCode::UnterminatedCodeBlock,
                    at,
                    "code block is never closed; it runs to end of file",
                ));
            }
        }
        issues
    }

    fn check_forbidden(&self, raw: &str, path: &str) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        for (idx, line) in raw.lines().enumerate() {
            for f in &self.forbidden {
                if f.regex.is_match(line) {
                    issues.push(ValidationIssue::error(
                        IssueCode::ForbiddenPattern,
                        Location::line(path, idx + 1),
                        format!("{}: {}", f.name, f.message),
                    ));
                }
            }
        }
        issues
    }

    fn check_content(&self, doc: &RuleDocument, path: &str) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        match track_of(&doc.path, &self.corpus) {
            Track::Full => {
                let examples = doc.code_blocks().count();
                if examples == 0 {
                    issues.push(ValidationIssue::warning(
                        IssueCode::MissingCodeExample,
                        Location::file(path),
                        "full-track document has no code examples",
                    ));
                } else if !self.markers.is_match(doc.body()) {
                    issues.push(ValidationIssue::warning(
                        IssueCode::MissingGoodBadMarkers,
                        Location::file(path),
                        "code examples carry no Good/Bad markers",
                    ));
                }
            }
            Track::Concise => {
                let lines = doc.raw_text.lines().count();
                if lines > self.lint.max_concise_lines {
                    issues.push(ValidationIssue::warning(
                        IssueCode::ConciseTooLong,
                        Location::file(path),
                        format!(
                            "concise document is {lines} lines (max {})",
                            self.lint.max_concise_lines
                        ),
                    ));
                }
            }
            Track::Other => {}
        }
        issues
    }
}

/// Heading hierarchy: first heading is H1, no level jumps deeper by more than one,
/// and nothing past `max_level`.
pub fn heading_issues(blocks: &[Block], path: &str, max_level: u8) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    let mut previous: Option<u8> = None;
    for b in blocks.iter().filter(|b| b.is_heading()) {
        let Some(level) = b.level else { continue };
        let at = Location::line(path, b.line_number);
        let allowed = previous.map(|p| p + 1).unwrap_or(1);
        if level > allowed {
            let msg = match previous {
                Some(p) => format!("heading jumps from H{p} to H{level}"),
                None => format!("first heading is H{level}; documents start at H1"),
            };
            issues.push(ValidationIssue::error(IssueCode::HeadingSkip, at.clone(), msg));
        }
        if level > max_level {
            issues.push(ValidationIssue::warning(
                IssueCode::ExcessiveNesting,
                at,
                format!("H{level} is deeper than the H{max_level} limit"),
            ));
        }
        previous = Some(level);
    }
    issues
}
