//! Service layer containing business logic and side-effect helpers.
//!
//! ## Service map
//! - `parser.rs`: frontmatter split + block scan into a `RuleDocument`.
//! - `schema.rs`: metadata field/type/vocabulary checks.
//! - `lint.rs`: naming, heading, code-language, denylist and content rules.
//! - `tokens.rs`: BPE counting, content-hash cache, aggregates.
//! - `sync.rs`: full/concise pairing, reduction band, metadata drift.
//! - `migrate.rs`: metadata inference and `.md` -> `.mdc` rewrite.
//! - `engine.rs`: pluggable markdown formatter/linter.
//! - `changeset.rs`: changed paths from git or an explicit list.
//! - `pipeline.rs`: per-file check pipeline on a bounded pool.
//! - `report.rs`: scoring and report assembly.
//! - `fsio.rs`: bounded reads, corpus walking, path display.
//! - `output.rs`: JSON/text output helpers.
//!
//! ## Conventions
//! - Per-file problems are `ValidationIssue`s, never early returns.
//! - Side effects should be explicit and localized.
//! - Keep command handlers thin; delegate to services.

pub mod changeset;
pub mod engine;
pub mod fsio;
pub mod lint;
pub mod migrate;
pub mod output;
pub mod parser;
pub mod pipeline;
pub mod report;
pub mod schema;
pub mod sync;
pub mod tokens;
