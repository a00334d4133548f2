use crate::domain::document::Metadata;
use crate::domain::issues::{Category, ValidationIssue};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Serialize)]
pub struct JsonOut<T: Serialize> {
    pub ok: bool,
    pub data: T,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileTokens {
    pub path: String,
    pub total_tokens: usize,
    /// Body only, metadata block excluded.
    pub content_tokens: usize,
}

#[derive(Debug, Serialize)]
pub struct TokenAggregate {
    pub root: String,
    pub encoding: String,
    pub files: Vec<FileTokens>,
    pub total_tokens: usize,
    pub content_tokens: usize,
    pub issues: Vec<ValidationIssue>,
}

#[derive(Debug, Serialize)]
pub struct TokenComparison {
    pub encoding: String,
    pub path_a: String,
    pub path_b: String,
    /// Body tokens; the reduction is taken from these, as `sync` does.
    pub tokens_a: usize,
    pub tokens_b: usize,
    pub total_a: usize,
    pub total_b: usize,
    pub reduction: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentPair {
    pub full_path: String,
    pub concise_path: String,
    pub tokens_full: usize,
    pub tokens_concise: usize,
    pub reduction_ratio: f64,
    pub in_band: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub drift: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncSummary {
    pub total_pairs: usize,
    pub in_band_pairs: usize,
    pub orphan_full: usize,
    pub orphan_concise: usize,
    pub total_full_tokens: usize,
    pub total_concise_tokens: usize,
    pub aggregate_reduction: f64,
    pub band_min: f64,
    pub band_max: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub full_root: String,
    pub concise_root: String,
    pub pairs: Vec<DocumentPair>,
    pub issues: Vec<ValidationIssue>,
    pub summary: SyncSummary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationStatus {
    Migrated,
    AlreadyMigrated,
    DryRun,
    Conflict,
    Failed,
}

impl MigrationStatus {
    pub fn is_failure(self) -> bool {
        matches!(self, MigrationStatus::Conflict | MigrationStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MigrationStatus::Migrated => "migrated",
            MigrationStatus::AlreadyMigrated => "already_migrated",
            MigrationStatus::DryRun => "dry_run",
            MigrationStatus::Conflict => "conflict",
            MigrationStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for MigrationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Serialize)]
pub struct MigrationOutcome {
    pub source: String,
    pub destination: String,
    pub status: MigrationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<String>,
    pub removed_source: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<ValidationIssue>,
}

/// Per-file result of `lint`/`validate`.
#[derive(Debug, Serialize)]
pub struct FileCheck {
    pub path: String,
    pub valid: bool,
    pub errors: usize,
    pub warnings: usize,
    pub issues: Vec<ValidationIssue>,
}

#[derive(Debug, Serialize, Default)]
pub struct CheckSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
    pub warnings: usize,
}

#[derive(Debug, Serialize)]
pub struct CheckReport {
    pub files: Vec<FileCheck>,
    pub summary: CheckSummary,
}

#[derive(Debug, Serialize)]
pub struct FormatOutcome {
    pub path: String,
    pub changed: bool,
    pub written: bool,
    /// Set when the file could not be read, formatted or written; the batch still continues.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<ValidationIssue>,
}

impl FormatOutcome {
    pub fn failed(&self) -> bool {
        !self.issues.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Changeset {
    pub added: Vec<String>,
    pub modified: Vec<String>,
    pub deleted: Vec<String>,
}

impl Changeset {
    /// Added and modified paths; these still exist at `head`.
    pub fn present(&self) -> impl Iterator<Item = &String> {
        self.added.iter().chain(self.modified.iter())
    }

    pub fn all(&self) -> impl Iterator<Item = &String> {
        self.present().chain(self.deleted.iter())
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.deleted.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CategoryCount {
    pub errors: usize,
    pub warnings: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub path: String,
    pub score: u32,
    pub errors: usize,
    pub warnings: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens: Option<usize>,
    pub issues: Vec<ValidationIssue>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub head: Option<String>,
    pub changeset: Changeset,
    pub files: Vec<FileReport>,
    pub pairs: Vec<DocumentPair>,
    pub categories: BTreeMap<Category, CategoryCount>,
    pub error_count: usize,
    pub warning_count: usize,
    pub score: u32,
    pub passed: bool,
}
