//! Shared data model layer (structs/enums only).
//!
//! ## Purpose
//! - Keep document, issue and report types in one place.
//! - Avoid cyclic imports between the parser, checkers and the aggregator.
//! - Make JSON output schema changes explicit and reviewable.
//!
//! ## Files
//! - `document.rs`: parsed rule document, blocks, typed metadata.
//! - `issues.rs`: severities, issue codes, categories, locations.
//! - `models.rs`: token/sync/migration/report output structs.
//! - `errors.rs`: per-file error enums (parse, read, migration).
//!
//! ## Rule of thumb
//! Domain types should be data-only: no filesystem side effects.
//!
//! ## Compatibility note
//! Changes in these structs can affect `--json` outputs and integration contracts.
//! Keep schema-impacting changes explicit and synchronized with `docs/contracts/*`.

pub mod document;
pub mod errors;
pub mod issues;
pub mod models;
