use crate::domain::errors::ParseError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::OnceLock;

/// Raw metadata mapping exactly as it appeared in the YAML block, unknown keys included.
pub type FrontMatter = BTreeMap<String, serde_json::Value>;

pub const KNOWN_METADATA_KEYS: &[&str] = &[
    "description",
    "globs",
    "alwaysApply",
    "tags",
    "version",
    "author",
    "priority",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    Heading,
    Code,
    Text,
    List,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Block {
    pub kind: BlockKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    pub content: String,
    pub line_number: usize,
    /// Code fence that was still open at end of file.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub unterminated: bool,
}

impl Block {
    pub fn is_heading(&self) -> bool {
        self.kind == BlockKind::Heading
    }

    pub fn is_code(&self) -> bool {
        self.kind == BlockKind::Code
    }
}

#[derive(Debug)]
pub struct RuleDocument {
    pub path: PathBuf,
    pub metadata: Option<FrontMatter>,
    pub parse_error: Option<ParseError>,
    pub blocks: Vec<Block>,
    pub raw_text: String,
    pub body_offset: usize,
    pub body_start_line: usize,
    token_count: OnceLock<usize>,
}

impl RuleDocument {
    pub fn new(
        path: PathBuf,
        raw_text: String,
        metadata: Option<FrontMatter>,
        parse_error: Option<ParseError>,
        body_offset: usize,
        body_start_line: usize,
        blocks: Vec<Block>,
    ) -> Self {
        Self {
            path,
            metadata,
            parse_error,
            blocks,
            raw_text,
            body_offset,
            body_start_line,
            token_count: OnceLock::new(),
        }
    }

    /// No metadata block at all (as opposed to a broken one).
    pub fn is_legacy(&self) -> bool {
        self.metadata.is_none() && self.parse_error.is_none()
    }

    pub fn body(&self) -> &str {
        self.raw_text.get(self.body_offset..).unwrap_or_default()
    }

    pub fn headings(&self) -> impl Iterator<Item = &Block> {
        self.blocks.iter().filter(|b| b.is_heading())
    }

    pub fn code_blocks(&self) -> impl Iterator<Item = &Block> {
        self.blocks.iter().filter(|b| b.is_code())
    }

    pub fn typed_metadata(&self) -> Option<Metadata> {
        self.metadata.as_ref().and_then(Metadata::from_frontmatter)
    }

    /// Body token count, computed on first use and memoized.
    pub fn token_count_with(&self, count: impl FnOnce(&str) -> usize) -> usize {
        *self.token_count.get_or_init(|| count(self.body()))
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub description: String,
    pub globs: Vec<String>,
    #[serde(rename = "alwaysApply")]
    pub always_apply: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,
}

impl Metadata {
    pub const DEFAULT_PRIORITY: i64 = 50;

    pub fn priority_or_default(&self) -> i64 {
        self.priority.unwrap_or(Self::DEFAULT_PRIORITY)
    }

    /// Typed view of a raw mapping; `None` when required fields are absent or mistyped.
    pub fn from_frontmatter(raw: &FrontMatter) -> Option<Self> {
        let object: serde_json::Map<String, serde_json::Value> =
            raw.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        serde_json::from_value(serde_json::Value::Object(object)).ok()
    }

    /// YAML body of the metadata block, without the `---` delimiters.
    pub fn to_frontmatter(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    pub fn to_block(&self) -> Result<String, serde_yaml::Error> {
        Ok(format!("---\n{}---\n", self.to_frontmatter()?))
    }
}
