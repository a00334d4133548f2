//! Explicit configuration value, passed down to every service.
//!
//! Loaded from TOML: `--config <path>`, else `./.rulegate.toml`, else defaults.
//! Every section is `#[serde(default)]`, so a config file only needs the keys it changes.

use crate::cli::{Encoding, DEFAULT_CONFIG_FILE};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub corpus: CorpusConfig,
    pub naming: NamingConfig,
    pub lint: LintConfig,
    pub schema: SchemaConfig,
    pub tokens: TokensConfig,
    pub sync: SyncConfig,
    pub migration: MigrationPolicy,
    pub report: ReportConfig,
    pub limits: LimitsConfig,
}

impl Config {
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        let path = match explicit {
            Some(p) => p.to_path_buf(),
            None => {
                let p = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !p.exists() {
                    tracing::debug!("no {DEFAULT_CONFIG_FILE}, using defaults");
                    return Ok(Self::default());
                }
                p
            }
        };
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("read config {}", path.display()))?;
        let config = Self::from_toml(&raw).with_context(|| format!("parse config {}", path.display()))?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(raw)?;
        if config.sync.band_min > config.sync.band_max {
            anyhow::bail!(
                "sync band is inverted: band_min {} > band_max {}",
                config.sync.band_min,
                config.sync.band_max
            );
        }
        Ok(config)
    }
}

/// Which files count as rule documents and where the two tracks live.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorpusConfig {
    pub extensions: Vec<String>,
    pub exempt_files: Vec<String>,
    pub skip_dirs: Vec<String>,
    pub full_root: String,
    pub concise_root: String,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["md".into(), "mdc".into()],
            exempt_files: vec!["README.md".into(), "CHANGELOG.md".into()],
            skip_dirs: vec!["docs".into(), ".git".into(), "node_modules".into()],
            full_root: "full-rules".into(),
            concise_root: ".concise-rules".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NamingConfig {
    pub pattern: String,
    pub governed_dirs: Vec<String>,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            pattern: r"^\d{2}-[a-z0-9]+(-[a-z0-9]+)*\.(md|mdc)$".into(),
            governed_dirs: vec![
                "rulesets".into(),
                "rules".into(),
                "coderules".into(),
                "full-rules".into(),
                ".concise-rules".into(),
            ],
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ForbiddenPattern {
    pub name: String,
    pub regex: String,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LintConfig {
    pub allowed_languages: Vec<String>,
    pub forbidden_patterns: Vec<ForbiddenPattern>,
    pub max_heading_level: u8,
    pub max_concise_lines: usize,
    pub content_checks: bool,
}

impl Default for LintConfig {
    fn default() -> Self {
        let languages = [
            "none", "text", "plaintext", "bash", "sh", "shell", "zsh", "powershell", "console",
            "python", "py", "javascript", "js", "jsx", "typescript", "ts", "tsx", "json", "jsonc",
            "yaml", "yml", "toml", "ini", "xml", "html", "css", "scss", "sql", "graphql", "rust",
            "go", "java", "kotlin", "swift", "c", "cpp", "csharp", "cs", "ruby", "php", "dart",
            "lua", "r", "scala", "elixir", "markdown", "md", "mdc", "diff", "dockerfile", "make",
            "makefile", "vue", "svelte", "prisma", "hcl", "terraform", "mermaid", "env",
        ];
        Self {
            allowed_languages: languages.iter().map(|s| s.to_string()).collect(),
            forbidden_patterns: vec![
                ForbiddenPattern {
                    name: "local-unix-path".into(),
                    regex: r"/(Users|home)/[A-Za-z0-9._-]+/".into(),
                    message: "machine-local home directory path".into(),
                },
                ForbiddenPattern {
                    name: "local-windows-path".into(),
                    regex: r"(?i)\b[a-z]:\\Users\\".into(),
                    message: "machine-local Windows user path".into(),
                },
                ForbiddenPattern {
                    name: "openai-key".into(),
                    regex: r"\bsk-[A-Za-z0-9]{20,}".into(),
                    message: "looks like an API secret key".into(),
                },
                ForbiddenPattern {
                    name: "aws-access-key".into(),
                    regex: r"\bAKIA[0-9A-Z]{16}\b".into(),
                    message: "looks like an AWS access key id".into(),
                },
                ForbiddenPattern {
                    name: "private-key".into(),
                    regex: r"-----BEGIN ([A-Z]+ )?PRIVATE KEY-----".into(),
                    message: "embedded private key".into(),
                },
            ],
            max_heading_level: 4,
            max_concise_lines: 150,
            content_checks: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SchemaConfig {
    /// Empty disables the unknown-tag check.
    pub known_tags: Vec<String>,
    pub max_description_chars: usize,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        let tags = [
            "general", "meta", "security", "testing", "performance", "documentation", "style",
            "architecture", "python", "javascript", "typescript", "react", "vue", "nextjs", "node",
            "rust", "go", "java", "database", "api", "devops", "docker", "git", "ci",
        ];
        Self {
            known_tags: tags.iter().map(|s| s.to_string()).collect(),
            max_description_chars: 200,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TokensConfig {
    pub encoding: Encoding,
    pub cache: bool,
}

impl Default for TokensConfig {
    fn default() -> Self {
        Self {
            encoding: Encoding::Cl100k,
            cache: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SyncConfig {
    pub band_min: f64,
    pub band_max: f64,
    pub drift_fields: Vec<String>,
    /// Path components dropped from a full-track path when deriving its concise counterpart.
    pub drop_segments: Vec<String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            band_min: 0.70,
            band_max: 0.80,
            drift_fields: vec!["tags".into(), "globs".into(), "alwaysApply".into()],
            drop_segments: Vec::new(),
        }
    }
}

/// One row of the ordered directory-category table.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CategoryRule {
    pub name: String,
    pub tokens: Vec<String>,
    #[serde(default)]
    pub always_apply: bool,
    #[serde(default)]
    pub globs: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl CategoryRule {
    fn new(name: &str, tokens: &[&str], always_apply: bool, globs: &[&str], tags: &[&str]) -> Self {
        let owned = |xs: &[&str]| xs.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        Self {
            name: name.to_string(),
            tokens: owned(tokens),
            always_apply,
            globs: owned(globs),
            tags: owned(tags),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MigrationPolicy {
    pub author: Option<String>,
    pub version: String,
    pub default_globs: Vec<String>,
    pub rules: Vec<CategoryRule>,
}

impl Default for MigrationPolicy {
    fn default() -> Self {
        Self {
            author: None,
            version: "1.0.0".into(),
            default_globs: vec!["**/*".into()],
            rules: vec![
                CategoryRule::new(
                    "python",
                    &["python", "py", "django", "fastapi", "flask"],
                    false,
                    &["**/*.py"],
                    &["python"],
                ),
                CategoryRule::new(
                    "react",
                    &["react", "nextjs", "next"],
                    false,
                    &["**/*.tsx", "**/*.jsx"],
                    &["react"],
                ),
                CategoryRule::new("vue", &["vue", "nuxt"], false, &["**/*.vue"], &["vue"]),
                CategoryRule::new(
                    "typescript",
                    &["typescript", "ts"],
                    false,
                    &["**/*.ts", "**/*.tsx"],
                    &["typescript"],
                ),
                CategoryRule::new(
                    "javascript",
                    &["javascript", "js", "node", "nodejs"],
                    false,
                    &["**/*.js", "**/*.jsx"],
                    &["javascript"],
                ),
                CategoryRule::new("rust", &["rust", "cargo"], false, &["**/*.rs"], &["rust"]),
                CategoryRule::new("go", &["go", "golang"], false, &["**/*.go"], &["go"]),
                CategoryRule::new(
                    "testing",
                    &["testing", "test", "tests"],
                    false,
                    &["**/*test*.py", "**/*test*.ts", "**/*test*.js"],
                    &["testing"],
                ),
                CategoryRule::new("security", &["security"], true, &["**/*"], &["security"]),
                CategoryRule::new(
                    "general",
                    &["general", "meta", "core", "common", "ide-layer"],
                    true,
                    &["**/*"],
                    &["general"],
                ),
            ],
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReportConfig {
    pub error_weight: u32,
    pub warning_weight: u32,
    pub max_errors: usize,
    pub min_score: u32,
    /// 0 means one worker per available core.
    pub workers: usize,
    pub changelog_files: Vec<String>,
    pub require_changelog: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            error_weight: 20,
            warning_weight: 5,
            max_errors: 0,
            min_score: 0,
            workers: 0,
            changelog_files: vec!["CHANGELOG.md".into()],
            require_changelog: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_file_bytes: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_file_bytes: 1024 * 1024,
        }
    }
}
