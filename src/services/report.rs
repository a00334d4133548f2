use crate::config::{Config, ReportConfig};
use crate::domain::issues::{count_severities, sort_issues, Severity, ValidationIssue};
use crate::domain::issues::{IssueCode, Location};
use crate::domain::models::{CategoryCount, Changeset, DocumentPair, FileReport, ValidationReport};
use crate::services::changeset::ChangeProvider;
use crate::services::fsio::{is_rule_path, track_of, FileSource, Track};
use crate::services::pipeline::{check_all, CheckedFile, FileChecker, Stages};
use crate::services::sync::check_trees;
use crate::services::tokens::Tokenize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// `100 - error_weight*errors - warning_weight*warnings`, clamped to [0, 100].
pub fn file_score(errors: usize, warnings: usize, cfg: &ReportConfig) -> u32 {
    let penalty = (errors as u64)
        .saturating_mul(cfg.error_weight as u64)
        .saturating_add((warnings as u64).saturating_mul(cfg.warning_weight as u64));
    100u64.saturating_sub(penalty) as u32
}

#[derive(Debug, Clone, Default)]
pub struct ReportInput {
    pub base: Option<String>,
    pub head: Option<String>,
    pub changeset: Changeset,
    pub checked: Vec<CheckedFile>,
    /// Findings not tied to a per-file pass (sync, changelog).
    pub extra: Vec<ValidationIssue>,
    pub pairs: Vec<DocumentPair>,
}

/// Pure fold of per-file results into the report. Input order does not matter.
pub fn build_report(input: ReportInput, cfg: &ReportConfig) -> ValidationReport {
    let mut by_path: BTreeMap<String, (Vec<ValidationIssue>, Option<usize>)> = BTreeMap::new();
    for c in input.checked {
        let entry = by_path.entry(c.path).or_default();
        entry.0.extend(c.issues);
        entry.1 = c.tokens.or(entry.1);
    }
    for issue in input.extra {
        by_path
            .entry(issue.location.path.clone())
            .or_default()
            .0
            .push(issue);
    }

    let mut categories: BTreeMap<_, CategoryCount> = BTreeMap::new();
    let mut files = Vec::new();
    for (path, (mut issues, tokens)) in by_path {
        sort_issues(&mut issues);
        issues.dedup();
        for i in &issues {
            let c = categories.entry(i.category).or_default();
            match i.severity {
                Severity::Error => c.errors += 1,
                Severity::Warning => c.warnings += 1,
            }
        }
        let (errors, warnings) = count_severities(&issues);
        files.push(FileReport {
            path,
            score: file_score(errors, warnings, cfg),
            errors,
            warnings,
            tokens,
            issues,
        });
    }

    let error_count: usize = files.iter().map(|f| f.errors).sum();
    let warning_count: usize = files.iter().map(|f| f.warnings).sum();
    let score = if files.is_empty() {
        100
    } else {
        (files.iter().map(|f| f.score as u64).sum::<u64>() / files.len() as u64) as u32
    };
    let mut pairs = input.pairs;
    pairs.sort_by(|a, b| a.full_path.cmp(&b.full_path));

    ValidationReport {
        base: input.base,
        head: input.head,
        changeset: input.changeset,
        files,
        pairs,
        categories,
        error_count,
        warning_count,
        score,
        passed: error_count <= cfg.max_errors && score >= cfg.min_score,
    }
}

fn changelog_issue(changeset: &Changeset, config: &Config) -> Option<ValidationIssue> {
    let rules_changed = changeset
        .all()
        .any(|p| is_rule_path(Path::new(p), &config.corpus));
    if !config.report.require_changelog || !rules_changed {
        return None;
    }
    let changelog = config.report.changelog_files.first()?;
    let touched = changeset.all().any(|p| {
        config.report.changelog_files.iter().any(|c| {
            p == c || Path::new(p).file_name().map(|n| n == c.as_str()).unwrap_or(false)
        })
    });
    (!touched).then(|| {
        ValidationIssue::warning(
            IssueCode::ChangelogNotUpdated,
            Location::file(changelog.clone()),
            "rule files changed but no changelog entry was added",
        )
    })
}

/// Full report run: changeset -> per-file checks (parallel) -> sync for touched pairs -> fold.
pub fn run_report(
    root: &Path,
    base: &str,
    head: &str,
    provider: &dyn ChangeProvider,
    config: &Config,
    source: &dyn FileSource,
    counter: &dyn Tokenize,
) -> anyhow::Result<ValidationReport> {
    let changeset = provider.changed_paths(base, head)?;
    let rule_files: Vec<(PathBuf, String)> = changeset
        .present()
        .filter(|p| is_rule_path(Path::new(p), &config.corpus))
        .map(|p| (root.join(p), p.clone()))
        .filter(|(fs_path, _)| fs_path.is_file())
        .collect();
    tracing::info!(
        changed = changeset.all().count(),
        rule_files = rule_files.len(),
        "report scope"
    );

    let checker = FileChecker::new(config, source)?.with_counter(counter);
    let checked = check_all(
        &checker,
        &rule_files,
        Stages {
            schema: true,
            lint: true,
        },
        config.report.workers,
    )?;

    let mut extra = Vec::new();
    let mut pairs = Vec::new();
    let touched: BTreeSet<&str> = changeset.all().map(String::as_str).collect();
    let touches_tracks = touched
        .iter()
        .any(|p| track_of(Path::new(p), &config.corpus) != Track::Other);
    let full_root = root.join(&config.corpus.full_root);
    let concise_root = root.join(&config.corpus.concise_root);
    if touches_tracks && full_root.is_dir() && concise_root.is_dir() {
        let sync = check_trees(
            &full_root,
            &concise_root,
            &config.sync,
            &config.corpus,
            source,
            counter,
            Some(root),
        );
        let hit = |p: &str| touched.contains(p);
        extra.extend(sync.issues.into_iter().filter(|i| {
            hit(&i.location.path) || i.related.as_deref().map(hit).unwrap_or(false)
        }));
        pairs.extend(
            sync.pairs
                .into_iter()
                .filter(|p| hit(&p.full_path) || hit(&p.concise_path)),
        );
    }
    extra.extend(changelog_issue(&changeset, config));

    let report = build_report(
        ReportInput {
            base: Some(base.to_string()),
            head: Some(head.to_string()),
            changeset,
            checked,
            extra,
            pairs,
        },
        &config.report,
    );
    tracing::info!(
        errors = report.error_count,
        warnings = report.warning_count,
        score = report.score,
        passed = report.passed,
        "report finished"
    );
    Ok(report)
}

pub fn render_markdown(report: &ValidationReport) -> String {
    let mut out = String::from("# Rule Quality Report\n\n");
    let verdict = if report.passed { "✅ PASSED" } else { "❌ FAILED" };
    out.push_str(&format!("**{verdict}** · score {}/100\n\n", report.score));
    if let (Some(base), Some(head)) = (&report.base, &report.head) {
        out.push_str(&format!("Range: `{base}..{head}`\n\n"));
    }
    out.push_str(&format!(
        "- Changed: {} added, {} modified, {} deleted\n- Files checked: {}\n- Errors: {}\n- Warnings: {}\n\n",
        report.changeset.added.len(),
        report.changeset.modified.len(),
        report.changeset.deleted.len(),
        report.files.len(),
        report.error_count,
        report.warning_count
    ));

    if !report.categories.is_empty() {
        out.push_str("| Category | Errors | Warnings |\n|----------|-------:|---------:|\n");
        for (cat, c) in &report.categories {
            let name = serde_json::to_value(cat)
                .ok()
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default();
            out.push_str(&format!("| {name} | {} | {} |\n", c.errors, c.warnings));
        }
        out.push('\n');
    }

    if !report.pairs.is_empty() {
        out.push_str("## Token Reduction\n\n| File | Full | Concise | Reduction |\n|------|-----:|--------:|----------:|\n");
        for p in &report.pairs {
            out.push_str(&format!(
                "| {} | {} | {} | {:.1}% |\n",
                p.full_path,
                p.tokens_full,
                p.tokens_concise,
                p.reduction_ratio * 100.0
            ));
        }
        out.push('\n');
    }

    let with_issues: Vec<&FileReport> = report.files.iter().filter(|f| !f.issues.is_empty()).collect();
    if !with_issues.is_empty() {
        out.push_str("## Issues\n\n");
        for f in with_issues {
            out.push_str(&format!("### `{}` (score {})\n\n", f.path, f.score));
            for i in &f.issues {
                let line = i.location.line.map(|l| format!("L{l} ")).unwrap_or_default();
                let icon = if i.is_error() { "❌" } else { "⚠️" };
                out.push_str(&format!("- {icon} {line}`{}` {}\n", i.code, i.message));
            }
            out.push('\n');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::changeset::StaticChangeProvider;
    use crate::services::fsio::BoundedFs;
    use crate::services::tokens::tests::WordCounter;
    use std::fs;
    use tempfile::TempDir;

    fn checked(path: &str, issues: Vec<ValidationIssue>) -> CheckedFile {
        CheckedFile {
            path: path.into(),
            issues,
            tokens: None,
        }
    }

    fn err(path: &str, code: IssueCode) -> ValidationIssue {
        ValidationIssue::error(code, Location::file(path), "e")
    }

    fn warn(path: &str, code: IssueCode) -> ValidationIssue {
        ValidationIssue::warning(code, Location::file(path), "w")
    }

    #[test]
    fn score_weights_errors_over_warnings_and_clamps() {
        let cfg = ReportConfig::default();
        assert_eq!(file_score(0, 0, &cfg), 100);
        assert_eq!(file_score(1, 0, &cfg), 80);
        assert_eq!(file_score(0, 1, &cfg), 95);
        assert_eq!(file_score(9, 9, &cfg), 0);
    }

    #[test]
    fn report_is_independent_of_input_order() {
        let cfg = ReportConfig::default();
        let a = checked("b.md", vec![warn("b.md", IssueCode::UnknownTag)]);
        let b = checked("a.md", vec![err("a.md", IssueCode::HeadingSkip)]);
        let one = build_report(
            ReportInput {
                checked: vec![a.clone(), b.clone()],
                ..ReportInput::default()
            },
            &cfg,
        );
        let two = build_report(
            ReportInput {
                checked: vec![b, a],
                ..ReportInput::default()
            },
            &cfg,
        );
        assert_eq!(
            serde_json::to_string(&one).unwrap(),
            serde_json::to_string(&two).unwrap()
        );
        assert_eq!(one.files[0].path, "a.md");
        assert_eq!(one.score, (80 + 95) / 2);
        assert!(!one.passed);
    }

    #[test]
    fn warnings_never_block_and_thresholds_apply() {
        let input = || ReportInput {
            checked: vec![checked("a.md", vec![warn("a.md", IssueCode::ReductionOutOfBand)])],
            ..ReportInput::default()
        };
        let report = build_report(input(), &ReportConfig::default());
        assert!(report.passed);
        assert_eq!(report.warning_count, 1);
        assert_eq!(report.categories[&crate::domain::issues::Category::Sync].warnings, 1);

        let strict = ReportConfig {
            min_score: 99,
            ..ReportConfig::default()
        };
        assert!(!build_report(input(), &strict).passed);
    }

    #[test]
    fn missing_language_lowers_the_file_score() {
        let config = Config::default();
        let source = BoundedFs { max_bytes: 1 << 20 };
        let checker = FileChecker::new(&config, &source).unwrap();
        let tmp = TempDir::new().unwrap();
        let meta = "---\ndescription: d\nglobs: ['**/*.py']\nalwaysApply: false\n---\n# T\n\n";
        let tagged = tmp.path().join("01-tagged.mdc");
        let bare = tmp.path().join("01-bare.mdc");
        fs::write(&tagged, format!("{meta}```python\nx = 1\n```\n")).unwrap();
        fs::write(&bare, format!("{meta}```\nx = 1\n```\n")).unwrap();
        let stages = Stages {
            schema: true,
            lint: true,
        };

        let score_of = |p: &Path| {
            let c = checker.check(p, "01-x.mdc", stages);
            build_report(
                ReportInput {
                    checked: vec![c],
                    ..ReportInput::default()
                },
                &config.report,
            )
        };
        let good = score_of(&tagged);
        let bad = score_of(&bare);
        let missing = bad.files[0]
            .issues
            .iter()
            .filter(|i| i.code == IssueCode::MissingCodeLanguage)
            .count();
        assert_eq!(missing, 1);
        assert!(bad.score < good.score);
        assert!(bad.files[0].score < good.files[0].score);
    }

    fn words(n: usize) -> String {
        vec!["w"; n].join(" ")
    }

    fn corpus(concise_words: usize) -> TempDir {
        let tmp = TempDir::new().unwrap();
        let full = tmp.path().join("full-rules/lang");
        let concise = tmp.path().join(".concise-rules/lang");
        fs::create_dir_all(&full).unwrap();
        fs::create_dir_all(&concise).unwrap();
        fs::write(tmp.path().join("CHANGELOG.md"), "# Changelog\n").unwrap();
        let meta = "---\ndescription: Python\nglobs: ['**/*.py']\nalwaysApply: false\ntags: [python]\n---\n";
        fs::write(
            full.join("01-python.md"),
            format!("{meta}# Python\n\n```python\n# Good\nx = 1\n```\n\n{}\n", words(1000)),
        )
        .unwrap();
        fs::write(
            concise.join("01-python.md"),
            format!("{meta}# Python\n\n{}\n", words(concise_words)),
        )
        .unwrap();
        tmp
    }

    fn run(tmp: &TempDir, changed: &[&str]) -> ValidationReport {
        let provider = StaticChangeProvider {
            repo_root: tmp.path().to_path_buf(),
            paths: changed.iter().map(|s| s.to_string()).collect(),
        };
        run_report(
            tmp.path(),
            "HEAD~1",
            "HEAD",
            &provider,
            &Config::default(),
            &BoundedFs { max_bytes: 1 << 20 },
            &WordCounter::default(),
        )
        .unwrap()
    }

    #[test]
    fn in_band_pair_passes_clean() {
        let tmp = corpus(250);
        let report = run(&tmp, &["full-rules/lang/01-python.md", ".concise-rules/lang/01-python.md", "CHANGELOG.md"]);
        assert_eq!(report.pairs.len(), 1);
        assert!(report.pairs[0].in_band, "{:?}", report.pairs[0]);
        assert_eq!(report.error_count, 0);
        assert_eq!(report.warning_count, 0, "{:#?}", report.files);
        assert!(report.passed);
    }

    #[test]
    fn barely_reduced_pair_warns_but_passes() {
        let tmp = corpus(900);
        let report = run(&tmp, &[".concise-rules/lang/01-python.md", "CHANGELOG.md"]);
        assert_eq!(report.pairs.len(), 1);
        assert!(!report.pairs[0].in_band);
        assert_eq!(report.error_count, 0);
        assert!(report.warning_count >= 1);
        assert!(report.passed);
        let json = serde_json::to_value(&report).unwrap();
        assert!(json["warning_count"].as_u64().unwrap() >= 1);
    }

    #[test]
    fn rule_changes_without_changelog_warn() {
        let tmp = corpus(250);
        let report = run(&tmp, &["full-rules/lang/01-python.md"]);
        let changelog = report.files.iter().find(|f| f.path == "CHANGELOG.md").unwrap();
        assert_eq!(changelog.issues[0].code, IssueCode::ChangelogNotUpdated);
        assert!(report.passed);
        assert!(render_markdown(&report).contains("ChangelogNotUpdated"));
    }

    #[test]
    fn deleted_concise_counterpart_surfaces_as_orphan() {
        let tmp = corpus(250);
        fs::remove_file(tmp.path().join(".concise-rules/lang/01-python.md")).unwrap();
        let report = run(&tmp, &[".concise-rules/lang/01-python.md", "CHANGELOG.md"]);
        assert_eq!(report.changeset.deleted, vec![".concise-rules/lang/01-python.md"]);
        assert_eq!(report.error_count, 1);
        assert_eq!(report.files[0].path, "full-rules/lang/01-python.md");
        assert_eq!(report.files[0].issues[0].code, IssueCode::OrphanFullFile);
        assert!(!report.passed);
    }
}
