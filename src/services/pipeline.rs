use crate::config::Config;
use crate::domain::issues::{sort_issues, IssueCode, Location, ValidationIssue};
use crate::services::engine::MarkdownEngine;
use crate::services::fsio::{read_issue, FileSource};
use crate::services::lint::Linter;
use crate::services::parser::parse_document;
use crate::services::schema::validate_document;
use crate::services::tokens::Tokenize;
use rayon::prelude::*;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy)]
pub struct Stages {
    pub schema: bool,
    pub lint: bool,
}

#[derive(Debug, Clone)]
pub struct CheckedFile {
    pub path: String,
    pub issues: Vec<ValidationIssue>,
    pub tokens: Option<usize>,
}

/// Per-file pipeline: bounded read, parse, schema, lint, engine lint, token count.
pub struct FileChecker<'a> {
    config: &'a Config,
    linter: Linter,
    source: &'a dyn FileSource,
    engine: Option<&'a dyn MarkdownEngine>,
    counter: Option<&'a dyn Tokenize>,
}

impl<'a> FileChecker<'a> {
    pub fn new(config: &'a Config, source: &'a dyn FileSource) -> anyhow::Result<Self> {
        Ok(Self {
            config,
            linter: Linter::new(config)?,
            source,
            engine: None,
            counter: None,
        })
    }

    pub fn with_engine(mut self, engine: Option<&'a dyn MarkdownEngine>) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_counter(mut self, counter: &'a dyn Tokenize) -> Self {
        self.counter = Some(counter);
        self
    }

    /// `shown` is the path as reported (and as seen by path-based rules).
    pub fn check(&self, fs_path: &Path, shown: &str, stages: Stages) -> CheckedFile {
        let raw = match self.source.read_text(fs_path) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(path = %shown, error = %e, "file skipped");
                return CheckedFile {
                    path: shown.to_string(),
                    issues: vec![read_issue(&e, shown)],
                    tokens: None,
                };
            }
        };
        let doc = parse_document(Path::new(shown), &raw);
        let mut issues = Vec::new();
        if stages.schema {
            issues.extend(validate_document(&doc, &self.config.schema));
        } else if let Some(err) = &doc.parse_error {
            issues.push(ValidationIssue::error(
                IssueCode::FrontmatterSyntax,
                Location::line(shown, 1),
                err.to_string(),
            ));
        }
        if stages.lint {
            issues.extend(self.linter.lint(&doc));
        }
        if let Some(engine) = self.engine {
            match engine.lint(&raw) {
                Ok(found) => issues.extend(found.into_iter().map(|f| {
                    ValidationIssue::warning(
                        IssueCode::StyleViolation,
                        Location::line(shown, f.line),
                        format!("{} {}", f.rule, f.message),
                    )
                })),
                Err(e) => {
                    tracing::warn!(path = %shown, error = %e, "engine lint failed");
                    issues.push(ValidationIssue::warning(
                        IssueCode::EngineFailed,
                        Location::file(shown),
                        format!("{} engine did not run: {e}", engine.name()),
                    ));
                }
            }
        }
        let tokens = self
            .counter
            .map(|c| doc.token_count_with(|body| c.count(body)));
        sort_issues(&mut issues);
        tracing::debug!(path = %shown, issues = issues.len(), "checked");
        CheckedFile {
            path: shown.to_string(),
            issues,
            tokens,
        }
    }
}

/// Map `f` over `items` on a pool of `workers` threads (0 = one per core); output keeps input order.
pub fn run_bounded<T, R, F>(items: &[T], workers: usize, f: F) -> anyhow::Result<Vec<R>>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> R + Sync + Send,
{
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()
        .map_err(|e| anyhow::anyhow!("worker pool: {e}"))?;
    Ok(pool.install(|| items.par_iter().map(&f).collect()))
}

/// Check many files in parallel; results sorted by path.
pub fn check_all(
    checker: &FileChecker<'_>,
    files: &[(PathBuf, String)],
    stages: Stages,
    workers: usize,
) -> anyhow::Result<Vec<CheckedFile>> {
    let mut out = run_bounded(files, workers, |(fs_path, shown)| {
        checker.check(fs_path, shown, stages)
    })?;
    out.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(out)
}
