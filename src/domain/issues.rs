use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => f.write_str("error"),
            Severity::Warning => f.write_str("warning"),
        }
    }
}

/// Report buckets. Every `IssueCode` belongs to exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Parse,
    Schema,
    Structure,
    Style,
    Io,
    Sync,
    Migration,
    Docs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum IssueCode {
    FrontmatterSyntax,
    UnterminatedCodeBlock,
    MissingMetadata,
    MissingField,
    InvalidFieldType,
    DescriptionTooLong,
    EmptyGlobs,
    InvalidGlob,
    InvalidVersion,
    PriorityOutOfRange,
    UnknownTag,
    UnknownMetadataKey,
    EmptyBody,
    FileNamingViolation,
    HeadingSkip,
    ExcessiveNesting,
    MissingCodeLanguage,
    ForbiddenPattern,
    MissingCodeExample,
    MissingGoodBadMarkers,
    ConciseTooLong,
    StyleViolation,
    EngineFailed,
    FileUnreadable,
    FileTooLarge,
    FileUnwritable,
    OrphanFullFile,
    OrphanConciseFile,
    ReductionOutOfBand,
    ConciseLargerThanFull,
    MetadataDrift,
    MigrationConflict,
    MigrationFailed,
    ChangelogNotUpdated,
}

impl IssueCode {
    pub fn category(self) -> Category {
        use IssueCode::*;
        match self {
            FrontmatterSyntax | UnterminatedCodeBlock => Category::Parse,
            MissingMetadata | MissingField | InvalidFieldType | DescriptionTooLong | EmptyGlobs
            | InvalidGlob | InvalidVersion | PriorityOutOfRange | UnknownTag
            | UnknownMetadataKey | EmptyBody => Category::Schema,
            FileNamingViolation | HeadingSkip | ExcessiveNesting | MissingCodeLanguage
            | ForbiddenPattern | MissingCodeExample | MissingGoodBadMarkers | ConciseTooLong => {
                Category::Structure
            }
            StyleViolation | EngineFailed => Category::Style,
            FileUnreadable | FileTooLarge | FileUnwritable => Category::Io,
            OrphanFullFile | OrphanConciseFile | ReductionOutOfBand | ConciseLargerThanFull
            | MetadataDrift => Category::Sync,
            MigrationConflict | MigrationFailed => Category::Migration,
            ChangelogNotUpdated => Category::Docs,
        }
    }
}

impl fmt::Display for IssueCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Location {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
}

impl Location {
    pub fn file(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            line: None,
        }
    }

    pub fn line(path: impl Into<String>, line: usize) -> Self {
        Self {
            path: path.into(),
            line: Some(line),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{}:{}", self.path, line),
            None => f.write_str(&self.path),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub severity: Severity,
    pub code: IssueCode,
    pub category: Category,
    pub message: String,
    pub location: Location,
    /// Counterpart file for pair-level findings (orphans, drift).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related: Option<String>,
}

impl ValidationIssue {
    pub fn new(
        severity: Severity,
        code: IssueCode,
        location: Location,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            code,
            category: code.category(),
            message: message.into(),
            location,
            related: None,
        }
    }

    pub fn error(code: IssueCode, location: Location, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, code, location, message)
    }

    pub fn warning(code: IssueCode, location: Location, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, code, location, message)
    }

    pub fn with_related(mut self, related: impl Into<String>) -> Self {
        self.related = Some(related.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Ordering used for every rendered issue list: line, then code, then message.
    pub fn sort_key(&self) -> (Option<usize>, IssueCode, &str) {
        (self.location.line, self.code, self.message.as_str())
    }
}

pub fn sort_issues(issues: &mut [ValidationIssue]) {
    issues.sort_by(|a, b| {
        a.location
            .path
            .cmp(&b.location.path)
            .then_with(|| a.sort_key().cmp(&b.sort_key()))
    });
}

pub fn count_severities(issues: &[ValidationIssue]) -> (usize, usize) {
    let errors = issues.iter().filter(|i| i.is_error()).count();
    (errors, issues.len() - errors)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_code_maps_to_a_category_and_serializes_by_name() {
        let issue = ValidationIssue::error(
            IssueCode::HeadingSkip,
            Location::line("rules/01-a.md", 7),
            "H1 -> H3",
        );
        assert_eq!(issue.category, Category::Structure);
        let v = serde_json::to_value(&issue).unwrap();
        assert_eq!(v["code"], "HeadingSkip");
        assert_eq!(v["severity"], "error");
        assert_eq!(v["category"], "structure");
        assert_eq!(v["location"]["line"], 7);
        assert!(v.get("related").is_none());
    }

    #[test]
    fn issues_sort_by_path_line_code_message() {
        let mut issues = vec![
            ValidationIssue::warning(IssueCode::UnknownTag, Location::file("b.md"), "z"),
            ValidationIssue::error(IssueCode::HeadingSkip, Location::line("a.md", 9), "x"),
            ValidationIssue::error(IssueCode::FileNamingViolation, Location::file("a.md"), "y"),
            ValidationIssue::error(IssueCode::FileNamingViolation, Location::line("a.md", 2), "y"),
        ];
        sort_issues(&mut issues);
        let order: Vec<String> = issues.iter().map(|i| i.location.to_string()).collect();
        assert_eq!(order, vec!["a.md", "a.md:2", "a.md:9", "b.md"]);
        assert_eq!(count_severities(&issues), (3, 1));
    }
}
