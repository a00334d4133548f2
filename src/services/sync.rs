use crate::config::{CorpusConfig, SyncConfig};
use crate::domain::document::{FrontMatter, RuleDocument};
use crate::domain::issues::{sort_issues, IssueCode, Location, ValidationIssue};
use crate::domain::models::{DocumentPair, SyncReport, SyncSummary};
use crate::services::fsio::{collect_rule_files, display_path, display_relative, read_issue, FileSource};
use crate::services::parser::parse_document;
use crate::services::tokens::{reduction, Tokenize};
use rayon::prelude::*;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Component, Path, PathBuf};

// absorbs float noise at the inclusive band edges (e.g. 1 - 0.2)
const BAND_EPSILON: f64 = 1e-9;

/// Concise counterpart of a full-track relative path: same path minus `drop_segments`.
pub fn expected_concise_path(rel: &Path, drop_segments: &[String]) -> PathBuf {
    let mut out = PathBuf::new();
    let comps: Vec<Component> = rel.components().collect();
    let last = comps.len().saturating_sub(1);
    for (i, c) in comps.iter().enumerate() {
        let keep = i == last
            || !drop_segments
                .iter()
                .any(|d| c.as_os_str() == d.as_str());
        if keep {
            out.push(c.as_os_str());
        }
    }
    out
}

fn field_value(meta: Option<&FrontMatter>, field: &str) -> Option<Value> {
    meta.and_then(|m| m.get(field)).cloned()
}

fn as_set(v: &Value) -> Option<BTreeSet<String>> {
    v.as_array().map(|xs| {
        xs.iter()
            .map(|x| x.as_str().map(str::to_string).unwrap_or_else(|| x.to_string()))
            .collect()
    })
}

/// Fields whose values differ between the two sides; lists compare as sets.
pub fn metadata_drift(
    full: Option<&FrontMatter>,
    concise: Option<&FrontMatter>,
    fields: &[String],
) -> Vec<String> {
    fields
        .iter()
        .filter(|f| {
            let a = field_value(full, f);
            let b = field_value(concise, f);
            match (&a, &b) {
                (Some(x), Some(y)) => match (as_set(x), as_set(y)) {
                    (Some(sx), Some(sy)) => sx != sy,
                    _ => x != y,
                },
                (None, None) => false,
                _ => true,
            }
        })
        .cloned()
        .collect()
}

/// Token ratio, band and drift for one joined pair.
pub fn check_pair(
    full: &RuleDocument,
    concise: &RuleDocument,
    full_display: &str,
    concise_display: &str,
    config: &SyncConfig,
    counter: &dyn Tokenize,
) -> (DocumentPair, Vec<ValidationIssue>) {
    let tokens_full = full.token_count_with(|b| counter.count(b));
    let tokens_concise = concise.token_count_with(|b| counter.count(b));
    let ratio = reduction(tokens_full, tokens_concise);
    let in_band = tokens_concise < tokens_full
        && ratio >= config.band_min - BAND_EPSILON
        && ratio <= config.band_max + BAND_EPSILON;
    let drift = metadata_drift(full.metadata.as_ref(), concise.metadata.as_ref(), &config.drift_fields);

    let at = || Location::file(concise_display);
    let mut issues = Vec::new();
    if tokens_concise >= tokens_full {
        issues.push(
            ValidationIssue::error(
                IssueCode::ConciseLargerThanFull,
                at(),
                format!("concise has {tokens_concise} tokens, full only {tokens_full}"),
            )
            .with_related(full_display),
        );
    } else if !in_band {
        issues.push(
            ValidationIssue::warning(
                IssueCode::ReductionOutOfBand,
                at(),
                format!(
                    "reduction {:.1}% is outside {:.0}%-{:.0}% ({tokens_full} -> {tokens_concise} tokens)",
                    ratio * 100.0,
                    config.band_min * 100.0,
                    config.band_max * 100.0
                ),
            )
            .with_related(full_display),
        );
    }
    if !drift.is_empty() {
        issues.push(
            ValidationIssue::warning(
                IssueCode::MetadataDrift,
                at(),
                format!("metadata differs from full track: {}", drift.join(", ")),
            )
            .with_related(full_display),
        );
    }

    let pair = DocumentPair {
        full_path: full_display.to_string(),
        concise_path: concise_display.to_string(),
        tokens_full,
        tokens_concise,
        reduction_ratio: ratio,
        in_band,
        drift,
    };
    (pair, issues)
}

type Loaded = BTreeMap<PathBuf, (PathBuf, Result<RuleDocument, ValidationIssue>)>;

fn load_tree(
    root: &Path,
    corpus: &CorpusConfig,
    source: &dyn FileSource,
    display_root: Option<&Path>,
) -> Loaded {
    let files = collect_rule_files(root, corpus);
    files
        .par_iter()
        .map(|path| {
            let rel = path.strip_prefix(root).unwrap_or(path).to_path_buf();
            let doc = source
                .read_text(path)
                .map(|raw| parse_document(path, &raw))
                .map_err(|e| read_issue(&e, &display_relative(path, display_root)));
            (rel, (path.clone(), doc))
        })
        .collect::<Vec<_>>()
        .into_iter()
        .collect()
}

/// Walk both trees, join full and concise documents one-to-one, and check every pair.
/// `display_root` strips a prefix from reported paths (report runs use repo-relative paths).
pub fn check_trees(
    full_root: &Path,
    concise_root: &Path,
    config: &SyncConfig,
    corpus: &CorpusConfig,
    source: &dyn FileSource,
    counter: &dyn Tokenize,
    display_root: Option<&Path>,
) -> SyncReport {
    let full = load_tree(full_root, corpus, source, display_root);
    let concise = load_tree(concise_root, corpus, source, display_root);
    let show = |p: &Path| display_relative(p, display_root);

    let mut issues = Vec::new();
    let mut joined = Vec::new();
    let mut claimed = BTreeSet::new();
    let mut orphan_full = 0;

    for (rel, (full_path, full_doc)) in &full {
        let expected = expected_concise_path(rel, &config.drop_segments);
        match concise.get(&expected) {
            Some((concise_path, concise_doc)) if !claimed.contains(&expected) => {
                claimed.insert(expected.clone());
                joined.push((full_path, full_doc, concise_path, concise_doc));
            }
            _ => {
                orphan_full += 1;
                issues.push(
                    ValidationIssue::error(
                        IssueCode::OrphanFullFile,
                        Location::file(show(full_path)),
                        format!("no concise counterpart at {}", display_path(&expected)),
                    )
                    .with_related(show(&concise_root.join(&expected))),
                );
            }
        }
    }

    let mut orphan_concise = 0;
    for (rel, (concise_path, _)) in &concise {
        if !claimed.contains(rel) {
            orphan_concise += 1;
            issues.push(
                ValidationIssue::error(
                    IssueCode::OrphanConciseFile,
                    Location::file(show(concise_path)),
                    "no full-track document maps to this file",
                )
                .with_related(show(&full_root.join(rel))),
            );
        }
    }

    let checked: Vec<(Option<DocumentPair>, Vec<ValidationIssue>)> = joined
        .par_iter()
        .map(|(full_path, full_doc, concise_path, concise_doc)| {
            let mut read_errors = Vec::new();
            for d in [full_doc, concise_doc] {
                if let Err(issue) = d {
                    read_errors.push(issue.clone());
                }
            }
            match (full_doc, concise_doc) {
                (Ok(f), Ok(c)) => {
                    let (pair, mut found) =
                        check_pair(f, c, &show(full_path), &show(concise_path), config, counter);
                    found.extend(read_errors);
                    (Some(pair), found)
                }
                _ => (None, read_errors),
            }
        })
        .collect();

    let mut pairs = Vec::new();
    for (pair, found) in checked {
        pairs.extend(pair);
        issues.extend(found);
    }
    // orphans that failed to load still need their read error reported
    for (rel, (_, doc)) in full.iter().chain(concise.iter()) {
        if let Err(issue) = doc {
            let paired = claimed.contains(rel)
                || claimed.contains(&expected_concise_path(rel, &config.drop_segments));
            if !paired && !issues.contains(issue) {
                issues.push(issue.clone());
            }
        }
    }
    pairs.sort_by(|a, b| a.full_path.cmp(&b.full_path));
    sort_issues(&mut issues);

    let total_full_tokens = pairs.iter().map(|p| p.tokens_full).sum();
    let total_concise_tokens = pairs.iter().map(|p| p.tokens_concise).sum();
    let summary = SyncSummary {
        total_pairs: pairs.len(),
        in_band_pairs: pairs.iter().filter(|p| p.in_band).count(),
        orphan_full,
        orphan_concise,
        total_full_tokens,
        total_concise_tokens,
        aggregate_reduction: reduction(total_full_tokens, total_concise_tokens),
        band_min: config.band_min,
        band_max: config.band_max,
    };
    tracing::info!(
        pairs = summary.total_pairs,
        in_band = summary.in_band_pairs,
        orphans = orphan_full + orphan_concise,
        "sync check finished"
    );

    SyncReport {
        full_root: show(full_root),
        concise_root: show(concise_root),
        pairs,
        issues,
        summary,
    }
}

pub fn render_markdown(report: &SyncReport) -> String {
    let s = &report.summary;
    let mut out = String::from("# Token Reduction Report\n\n");
    out.push_str(&format!(
        "- Pairs: {} ({} in band {:.0}%-{:.0}%)\n- Orphans: {} full, {} concise\n- Tokens: {} full -> {} concise ({:.1}% reduction)\n\n",
        s.total_pairs,
        s.in_band_pairs,
        s.band_min * 100.0,
        s.band_max * 100.0,
        s.orphan_full,
        s.orphan_concise,
        s.total_full_tokens,
        s.total_concise_tokens,
        s.aggregate_reduction * 100.0
    ));
    out.push_str("| File | Full | Concise | Reduction | Status |\n");
    out.push_str("|------|-----:|--------:|----------:|:------:|\n");
    for p in &report.pairs {
        out.push_str(&format!(
            "| {} | {} | {} | {:.1}% | {} |\n",
            p.full_path,
            p.tokens_full,
            p.tokens_concise,
            p.reduction_ratio * 100.0,
            if p.in_band { "✅" } else { "⚠️" }
        ));
    }
    if !report.issues.is_empty() {
        out.push_str("\n## Issues\n\n");
        for i in &report.issues {
            out.push_str(&format!("- **{}** `{}` {}: {}\n", i.severity, i.code, i.location, i.message));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::issues::Severity;
    use crate::services::fsio::BoundedFs;
    use crate::services::tokens::tests::WordCounter;
    use std::fs;
    use tempfile::TempDir;

    fn words(n: usize) -> String {
        vec!["w"; n].join(" ")
    }

    fn doc(path: &str, raw: &str) -> RuleDocument {
        parse_document(Path::new(path), raw)
    }

    fn pair_of(full_tokens: usize, concise_tokens: usize) -> (DocumentPair, Vec<ValidationIssue>) {
        let full = doc("full-rules/01-a.md", &words(full_tokens));
        let concise = doc(".concise-rules/01-a.md", &words(concise_tokens));
        check_pair(
            &full,
            &concise,
            "full-rules/01-a.md",
            ".concise-rules/01-a.md",
            &SyncConfig::default(),
            &WordCounter::default(),
        )
    }

    #[test]
    fn quarter_sized_concise_is_in_band() {
        let (pair, issues) = pair_of(1000, 250);
        assert_eq!(pair.reduction_ratio, 0.75);
        assert!(pair.in_band);
        assert!(issues.is_empty());
    }

    #[test]
    fn barely_reduced_concise_is_a_band_warning_only() {
        let (pair, issues) = pair_of(1000, 900);
        assert_eq!(pair.reduction_ratio, 1.0 - 900.0 / 1000.0);
        assert!(!pair.in_band);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].code, IssueCode::ReductionOutOfBand);
        assert_eq!(issues[0].severity, Severity::Warning);
    }

    #[test]
    fn band_edges_are_inclusive() {
        assert!(pair_of(100, 30).0.in_band);
        assert!(pair_of(100, 20).0.in_band);
        assert!(!pair_of(100, 19).0.in_band);
        assert!(!pair_of(100, 31).0.in_band);
    }

    #[test]
    fn concise_not_smaller_is_an_error_without_band_warning() {
        let (pair, issues) = pair_of(100, 120);
        assert!(pair.reduction_ratio < 0.0);
        let codes: Vec<IssueCode> = issues.iter().map(|i| i.code).collect();
        assert_eq!(codes, vec![IssueCode::ConciseLargerThanFull]);
        let (_, equal) = pair_of(50, 50);
        assert_eq!(equal[0].code, IssueCode::ConciseLargerThanFull);
    }

    #[test]
    fn drift_compares_lists_as_sets() {
        let a = doc("a", "---\ntags: [python, testing]\nglobs: ['**/*.py']\nalwaysApply: false\n---\nx\n");
        let b = doc("b", "---\ntags: [testing, python]\nglobs: ['**/*.py']\nalwaysApply: true\n---\nx\n");
        let fields = SyncConfig::default().drift_fields;
        assert_eq!(
            metadata_drift(a.metadata.as_ref(), b.metadata.as_ref(), &fields),
            vec!["alwaysApply".to_string()]
        );
        let bare = doc("c", "x\n");
        assert_eq!(
            metadata_drift(a.metadata.as_ref(), bare.metadata.as_ref(), &fields).len(),
            3
        );
    }

    #[test]
    fn drop_segments_flatten_the_concise_layout() {
        let rel = Path::new("rulesets/frameworks/01-react.md");
        assert_eq!(expected_concise_path(rel, &[]), rel);
        assert_eq!(
            expected_concise_path(rel, &["rulesets".to_string()]),
            Path::new("frameworks/01-react.md")
        );
    }

    #[test]
    fn trees_join_and_report_orphans() {
        let tmp = TempDir::new().unwrap();
        let full = tmp.path().join("full-rules");
        let concise = tmp.path().join(".concise-rules");
        fs::create_dir_all(full.join("lang")).unwrap();
        fs::create_dir_all(concise.join("lang")).unwrap();
        fs::write(full.join("lang/01-py.md"), words(1000)).unwrap();
        fs::write(concise.join("lang/01-py.md"), words(250)).unwrap();
        fs::write(full.join("lang/02-go.md"), words(10)).unwrap();
        fs::write(concise.join("lang/03-rs.md"), words(10)).unwrap();
        fs::write(concise.join("README.md"), words(10)).unwrap();

        let report = check_trees(
            &full,
            &concise,
            &SyncConfig::default(),
            &CorpusConfig::default(),
            &BoundedFs { max_bytes: 1 << 20 },
            &WordCounter::default(),
            Some(tmp.path()),
        );
        assert_eq!(report.summary.total_pairs, 1);
        assert_eq!(report.summary.in_band_pairs, 1);
        assert_eq!(report.pairs[0].full_path, "full-rules/lang/01-py.md");
        let codes: Vec<(IssueCode, &str)> = report
            .issues
            .iter()
            .map(|i| (i.code, i.location.path.as_str()))
            .collect();
        assert_eq!(
            codes,
            vec![
                (IssueCode::OrphanConciseFile, ".concise-rules/lang/03-rs.md"),
                (IssueCode::OrphanFullFile, "full-rules/lang/02-go.md"),
            ]
        );
        assert_eq!(
            report.issues[1].related.as_deref(),
            Some(".concise-rules/lang/02-go.md")
        );
        let md = render_markdown(&report);
        assert!(md.contains("| full-rules/lang/01-py.md | 1000 | 250 | 75.0% | ✅ |"));
    }
}
