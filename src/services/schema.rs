use crate::config::SchemaConfig;
use crate::domain::document::{FrontMatter, RuleDocument, KNOWN_METADATA_KEYS};
use crate::domain::issues::{IssueCode, Location, ValidationIssue};
use crate::services::fsio::display_path;
use crate::services::parser::json_kind;
use globset::Glob;
use serde_json::Value;

/// Document-level checks: parse failures, legacy documents, empty bodies, then the mapping itself.
pub fn validate_document(doc: &RuleDocument, config: &SchemaConfig) -> Vec<ValidationIssue> {
    let path = display_path(&doc.path);
    let mut issues = Vec::new();

    if let Some(err) = &doc.parse_error {
        issues.push(ValidationIssue::error(
            IssueCode::FrontmatterSyntax,
            Location::line(path.clone(), 1),
            err.to_string(),
        ));
    }
    if doc.is_legacy() {
        issues.push(ValidationIssue::warning(
            IssueCode::MissingMetadata,
            Location::file(path.clone()),
            "no metadata block; run `rulegate migrate` to add one",
        ));
    }
    if doc.body().trim().is_empty() {
        issues.push(ValidationIssue::warning(
            IssueCode::EmptyBody,
            Location::file(path.clone()),
            "document has no content after the metadata block",
        ));
    }
    if let Some(meta) = &doc.metadata {
        issues.extend(validate_metadata(meta, config, &path));
    }
    issues
}

/// Pure schema check over a raw metadata mapping.
pub fn validate_metadata(meta: &FrontMatter, config: &SchemaConfig, path: &str) -> Vec<ValidationIssue> {
    let at = || Location::file(path);
    let mut issues = Vec::new();
    let wrong_type = |field: &str, expected: &str, got: &Value| {
        ValidationIssue::error(
            IssueCode::InvalidFieldType,
            at(),
            format!("`{field}` must be {expected}, found {}", json_kind(got)),
        )
    };

    for field in ["description", "globs", "alwaysApply"] {
        if !meta.contains_key(field) {
            issues.push(ValidationIssue::error(
                IssueCode::MissingField,
                at(),
                format!("required field `{field}` is missing"),
            ));
        }
    }

    if let Some(v) = meta.get("description") {
        match v.as_str() {
            Some(d) => {
                let chars = d.chars().count();
                if chars > config.max_description_chars {
                    issues.push(ValidationIssue::error(
                        IssueCode::DescriptionTooLong,
                        at(),
                        format!(
                            "description is {chars} characters (max {})",
                            config.max_description_chars
                        ),
                    ));
                }
            }
            None => issues.push(wrong_type("description", "a string", v)),
        }
    }

    let always_apply = match meta.get("alwaysApply") {
        Some(Value::Bool(b)) => Some(*b),
        Some(v) => {
            issues.push(wrong_type("alwaysApply", "a boolean", v));
            None
        }
        None => None,
    };

    if let Some(v) = meta.get("globs") {
        match string_list(v) {
            Some(globs) if globs.is_empty() => {
                let msg = "`globs` is empty";
                issues.push(if always_apply == Some(true) {
                    ValidationIssue::warning(
                        IssueCode::EmptyGlobs,
                        at(),
                        format!("{msg} (alwaysApply covers every file)"),
                    )
                } else {
                    ValidationIssue::error(
                        IssueCode::EmptyGlobs,
                        at(),
                        format!("{msg} and alwaysApply is not true"),
                    )
                });
            }
            Some(globs) => {
                for g in globs {
                    let compiled = if g.trim().is_empty() {
                        Err("empty pattern".to_string())
                    } else {
                        Glob::new(g).map(|_| ()).map_err(|e| e.to_string())
                    };
                    if let Err(e) = compiled {
                        issues.push(ValidationIssue::error(
                            IssueCode::InvalidGlob,
                            at(),
                            format!("glob `{g}` does not compile: {e}"),
                        ));
                    }
                }
            }
            None => issues.push(wrong_type("globs", "an array of strings", v)),
        }
    }

    if let Some(v) = meta.get("tags") {
        match string_list(v) {
            Some(tags) if !config.known_tags.is_empty() => {
                for t in tags {
                    let known = config.known_tags.iter().any(|k| k.eq_ignore_ascii_case(t));
                    if !known {
                        issues.push(ValidationIssue::warning(
                            IssueCode::UnknownTag,
                            at(),
                            format!("tag `{t}` is not in the configured vocabulary"),
                        ));
                    }
                }
            }
            Some(_) => {}
            None => issues.push(wrong_type("tags", "an array of strings", v)),
        }
    }

    if let Some(v) = meta.get("version") {
        let ok = v.as_str().map(is_semver).unwrap_or(false);
        if !ok {
            let shown = v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string());
            issues.push(ValidationIssue::error(
                IssueCode::InvalidVersion,
                at(),
                format!("version `{shown}` is not MAJOR.MINOR.PATCH"),
            ));
        }
    }

    if let Some(v) = meta.get("author") {
        if !v.is_string() {
            issues.push(wrong_type("author", "a string", v));
        }
    }

    if let Some(v) = meta.get("priority") {
        match v.as_i64() {
            Some(p) if !(1..=100).contains(&p) => issues.push(ValidationIssue::error(
                IssueCode::PriorityOutOfRange,
                at(),
                format!("priority {p} is outside 1..=100"),
            )),
            Some(_) => {}
            None => issues.push(wrong_type("priority", "an integer", v)),
        }
    }

    for key in meta.keys() {
        if !KNOWN_METADATA_KEYS.contains(&key.as_str()) {
            issues.push(ValidationIssue::warning(
                IssueCode::UnknownMetadataKey,
                at(),
                format!("unknown metadata key `{key}`"),
            ));
        }
    }

    issues
}

fn string_list(v: &Value) -> Option<Vec<&str>> {
    v.as_array()?.iter().map(Value::as_str).collect()
}

pub fn is_semver(s: &str) -> bool {
    let parts: Vec<&str> = s.split('.').collect();
    parts.len() == 3
        && parts
            .iter()
            .all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::issues::Severity;
    use crate::services::parser::parse_document;
    use serde_json::json;
    use std::path::Path;

    fn meta(v: Value) -> FrontMatter {
        v.as_object().unwrap().clone().into_iter().collect()
    }

    fn codes(issues: &[ValidationIssue]) -> Vec<(IssueCode, Severity)> {
        issues.iter().map(|i| (i.code, i.severity)).collect()
    }

    fn check(v: Value) -> Vec<ValidationIssue> {
        validate_metadata(&meta(v), &SchemaConfig::default(), "rules/01-x.mdc")
    }

    #[test]
    fn complete_metadata_is_clean() {
        let issues = check(json!({
            "description": "Python conventions",
            "globs": ["**/*.py"],
            "alwaysApply": false,
            "tags": ["python"],
            "version": "1.2.3",
            "author": "team",
            "priority": 80
        }));
        assert!(issues.is_empty(), "{issues:?}");
    }

    #[test]
    fn each_missing_required_field_is_one_error() {
        let issues = check(json!({"tags": ["python"]}));
        assert_eq!(
            codes(&issues),
            vec![(IssueCode::MissingField, Severity::Error); 3]
        );
    }

    #[test]
    fn empty_globs_severity_depends_on_always_apply() {
        let strict = check(json!({"description": "d", "globs": [], "alwaysApply": false}));
        assert_eq!(codes(&strict), vec![(IssueCode::EmptyGlobs, Severity::Error)]);
        let lenient = check(json!({"description": "d", "globs": [], "alwaysApply": true}));
        assert_eq!(codes(&lenient), vec![(IssueCode::EmptyGlobs, Severity::Warning)]);
    }

    #[test]
    fn type_range_and_format_errors() {
        let issues = check(json!({
            "description": "x".repeat(201),
            "globs": "**/*.py",
            "alwaysApply": "yes",
            "version": "1.0",
            "priority": 101
        }));
        let got: Vec<IssueCode> = issues.iter().map(|i| i.code).collect();
        assert_eq!(
            got,
            vec![
                IssueCode::DescriptionTooLong,
                IssueCode::InvalidFieldType,
                IssueCode::InvalidFieldType,
                IssueCode::InvalidVersion,
                IssueCode::PriorityOutOfRange,
            ]
        );
        assert!(issues.iter().all(|i| i.is_error()));
    }

    #[test]
    fn description_of_exactly_the_limit_passes() {
        let issues = check(json!({"description": "é".repeat(200), "globs": ["*"], "alwaysApply": true}));
        assert!(issues.is_empty());
    }

    #[test]
    fn broken_globs_unknown_tags_and_keys() {
        let issues = check(json!({
            "description": "d",
            "globs": ["src/[abc", "**/*.rs"],
            "alwaysApply": false,
            "tags": ["Rust", "quantum"],
            "owner": "me"
        }));
        assert_eq!(
            codes(&issues),
            vec![
                (IssueCode::InvalidGlob, Severity::Error),
                (IssueCode::UnknownTag, Severity::Warning),
                (IssueCode::UnknownMetadataKey, Severity::Warning),
            ]
        );
    }

    #[test]
    fn document_level_findings() {
        let cfg = SchemaConfig::default();
        let legacy = parse_document(Path::new("a.md"), "# Old style\n");
        assert_eq!(
            codes(&validate_document(&legacy, &cfg)),
            vec![(IssueCode::MissingMetadata, Severity::Warning)]
        );

        let broken = parse_document(Path::new("b.mdc"), "---\ndescription: [oops\n---\n# T\n");
        let issues = validate_document(&broken, &cfg);
        assert_eq!(codes(&issues), vec![(IssueCode::FrontmatterSyntax, Severity::Error)]);
        assert_eq!(issues[0].location.line, Some(1));

        let empty = parse_document(
            Path::new("c.mdc"),
            "---\ndescription: d\nglobs: ['*']\nalwaysApply: true\n---\n\n",
        );
        assert_eq!(
            codes(&validate_document(&empty, &cfg)),
            vec![(IssueCode::EmptyBody, Severity::Warning)]
        );
    }

    #[test]
    fn semver_shape() {
        assert!(is_semver("0.10.2"));
        assert!(!is_semver("1.0"));
        assert!(!is_semver("1.0.0-beta"));
        assert!(!is_semver("v1.0.0"));
    }
}
