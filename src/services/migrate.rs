use crate::config::{CategoryRule, MigrationPolicy, SchemaConfig};
use crate::domain::document::{BlockKind, Metadata};
use crate::domain::errors::MigrationError;
use crate::domain::issues::{IssueCode, Location, ValidationIssue};
use crate::domain::models::{MigrationOutcome, MigrationStatus};
use crate::services::fsio::{display_path, read_issue, FileSource};
use crate::services::parser::parse_document;
use similar::TextDiff;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

pub const MAX_DESCRIPTION_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq)]
pub struct MetadataDraft {
    pub metadata: Metadata,
    /// Policy rule that decided globs/alwaysApply, if any matched.
    pub category: Option<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MigrateOptions {
    pub dry_run: bool,
    pub force: bool,
    pub keep_source: bool,
}

fn split_tokens(s: &str) -> Vec<String> {
    let lower = s.to_lowercase();
    let mut out = vec![lower.clone()];
    out.extend(
        lower
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|t| !t.is_empty() && !t.chars().all(|c| c.is_ascii_digit()))
            .map(str::to_string),
    );
    out
}

/// File-name tokens first, then directories from the deepest up.
fn path_tokens(path: &Path) -> Vec<Vec<String>> {
    let mut groups = Vec::new();
    if let Some(stem) = path.file_stem() {
        groups.push(split_tokens(&stem.to_string_lossy()));
    }
    if let Some(parent) = path.parent() {
        let dirs: Vec<String> = parent
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        for d in dirs.iter().rev() {
            groups.push(split_tokens(d));
        }
    }
    groups
}

fn matching_rule<'a>(groups: &[Vec<String>], rules: &'a [CategoryRule]) -> Option<&'a CategoryRule> {
    groups.iter().find_map(|group| {
        rules
            .iter()
            .find(|r| r.tokens.iter().any(|t| group.contains(&t.to_lowercase())))
    })
}

fn humanize(stem: &str) -> String {
    let words: Vec<String> = stem
        .split(['-', '_', ' '])
        .filter(|w| !w.is_empty() && !w.chars().all(|c| c.is_ascii_digit()))
        .map(|w| {
            let mut cs = w.chars();
            match cs.next() {
                Some(first) => first.to_uppercase().chain(cs).collect(),
                None => String::new(),
            }
        })
        .collect();
    words.join(" ")
}

fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let cut: String = s.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", cut.trim_end())
}

fn infer_description(path: &Path, content: &str) -> String {
    let doc = parse_document(path, content);
    let from_blocks = doc
        .blocks
        .iter()
        .filter(|b| matches!(b.kind, BlockKind::Heading | BlockKind::Text))
        .filter_map(|b| b.content.lines().map(str::trim).find(|l| !l.is_empty()))
        .next()
        .map(str::to_string);
    let description = from_blocks.unwrap_or_else(|| {
        path.file_stem()
            .map(|s| humanize(&s.to_string_lossy()))
            .unwrap_or_default()
    });
    truncate_chars(&description, MAX_DESCRIPTION_CHARS)
}

/// Heuristic metadata for a legacy document. Pure: same inputs, same draft.
pub fn infer_metadata(
    path: &Path,
    content: &str,
    policy: &MigrationPolicy,
    schema: &SchemaConfig,
) -> MetadataDraft {
    let groups = path_tokens(path);
    let rule = matching_rule(&groups, &policy.rules);

    let mut tags: BTreeSet<String> = groups
        .iter()
        .flatten()
        .filter(|t| schema.known_tags.iter().any(|k| k.eq_ignore_ascii_case(t)))
        .cloned()
        .collect();
    if let Some(r) = rule {
        tags.extend(r.tags.iter().map(|t| t.to_lowercase()));
    }
    if tags.is_empty() {
        tags.insert("general".into());
    }

    let (globs, always_apply) = match rule {
        Some(r) if !r.globs.is_empty() => (r.globs.clone(), r.always_apply),
        Some(r) => (policy.default_globs.clone(), r.always_apply),
        None => (policy.default_globs.clone(), false),
    };

    MetadataDraft {
        metadata: Metadata {
            description: infer_description(path, content),
            globs,
            always_apply,
            tags: tags.into_iter().collect(),
            version: Some(policy.version.clone()),
            author: policy.author.clone(),
            priority: None,
        },
        category: rule.map(|r| r.name.clone()),
    }
}

pub fn render_migrated(metadata: &Metadata, content: &str) -> Result<String, MigrationError> {
    Ok(format!("{}\n{}", metadata.to_block()?, content.trim_start_matches('\n')))
}

pub fn destination_for(source: &Path) -> PathBuf {
    if source.extension().map(|e| e == "md").unwrap_or(false) {
        source.with_extension("mdc")
    } else {
        source.to_path_buf()
    }
}

fn outcome(source: &Path, destination: &Path, status: MigrationStatus) -> MigrationOutcome {
    MigrationOutcome {
        source: display_path(source),
        destination: display_path(destination),
        status,
        message: None,
        metadata: None,
        diff: None,
        removed_source: false,
        issues: Vec::new(),
    }
}

/// Migrate one file. Failures are reported in the outcome; the batch keeps going.
pub fn migrate_file(
    source: &Path,
    opts: &MigrateOptions,
    policy: &MigrationPolicy,
    schema: &SchemaConfig,
    fs: &dyn FileSource,
) -> MigrationOutcome {
    let destination = destination_for(source);
    match try_migrate(source, &destination, opts, policy, schema, fs) {
        Ok(out) => out,
        Err(e) => {
            tracing::warn!(source = %source.display(), error = %e, "migration skipped");
            let shown = display_path(source);
            let (status, issue) = match &e {
                MigrationError::Conflict(dest) => (
                    MigrationStatus::Conflict,
                    ValidationIssue::error(
                        IssueCode::MigrationConflict,
                        Location::file(shown),
                        e.to_string(),
                    )
                    .with_related(display_path(dest)),
                ),
                MigrationError::Read(read) => (MigrationStatus::Failed, read_issue(read, &shown)),
                MigrationError::MalformedMetadata(_) => (
                    MigrationStatus::Failed,
                    ValidationIssue::error(
                        IssueCode::FrontmatterSyntax,
                        Location::line(shown, 1),
                        e.to_string(),
                    ),
                ),
                MigrationError::Write { path, .. } => (
                    MigrationStatus::Failed,
                    ValidationIssue::error(IssueCode::FileUnwritable, Location::file(shown), e.to_string())
                        .with_related(display_path(path)),
                ),
                MigrationError::Render(_) => (
                    MigrationStatus::Failed,
                    ValidationIssue::error(IssueCode::MigrationFailed, Location::file(shown), e.to_string()),
                ),
            };
            MigrationOutcome {
                message: Some(e.to_string()),
                issues: vec![issue],
                ..outcome(source, &destination, status)
            }
        }
    }
}

/// True when `destination` already has a metadata block over `body`, e.g. left by `--keep-source`.
fn carries_body(destination: &Path, body: &str, fs: &dyn FileSource) -> bool {
    let Ok(existing) = fs.read_text(destination) else {
        return false;
    };
    let doc = parse_document(destination, &existing);
    doc.metadata.is_some() && doc.body().trim_start_matches('\n') == body.trim_start_matches('\n')
}

fn try_migrate(
    source: &Path,
    destination: &Path,
    opts: &MigrateOptions,
    policy: &MigrationPolicy,
    schema: &SchemaConfig,
    fs: &dyn FileSource,
) -> Result<MigrationOutcome, MigrationError> {
    let content = fs.read_text(source)?;
    let parsed = parse_document(source, &content);
    if parsed.parse_error.is_some() {
        return Err(MigrationError::MalformedMetadata(source.to_path_buf()));
    }
    if parsed.metadata.is_some() {
        return Ok(MigrationOutcome {
            message: Some("already migrated".into()),
            ..outcome(source, destination, MigrationStatus::AlreadyMigrated)
        });
    }

    if destination != source && destination.exists() && !opts.force {
        if carries_body(destination, parsed.body(), fs) {
            return Ok(MigrationOutcome {
                message: Some("already migrated (destination has this content)".into()),
                ..outcome(source, destination, MigrationStatus::AlreadyMigrated)
            });
        }
        return Err(MigrationError::Conflict(destination.to_path_buf()));
    }

    let draft = infer_metadata(source, &content, policy, schema);
    let rendered = render_migrated(&draft.metadata, &content)?;

    if opts.dry_run {
        let before = if destination != source && destination.exists() {
            fs.read_text(destination)?
        } else {
            content.clone()
        };
        let diff = TextDiff::from_lines(&before, &rendered)
            .unified_diff()
            .context_radius(3)
            .header(&display_path(source), &display_path(destination))
            .to_string();
        return Ok(MigrationOutcome {
            metadata: Some(draft.metadata),
            diff: Some(diff),
            ..outcome(source, destination, MigrationStatus::DryRun)
        });
    }

    std::fs::write(destination, &rendered).map_err(|e| MigrationError::Write {
        path: destination.to_path_buf(),
        source: e,
    })?;
    let mut removed_source = false;
    if destination != source && !opts.keep_source {
        std::fs::remove_file(source).map_err(|e| MigrationError::Write {
            path: source.to_path_buf(),
            source: e,
        })?;
        removed_source = true;
    }
    tracing::debug!(
        source = %source.display(),
        category = draft.category.as_deref().unwrap_or("default"),
        "migrated"
    );
    Ok(MigrationOutcome {
        metadata: Some(draft.metadata),
        removed_source,
        ..outcome(source, destination, MigrationStatus::Migrated)
    })
}
