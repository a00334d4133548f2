//! Command handler layer.
//!
//! Each handler matches its own `Commands` variant and returns `Ok(false)`
//! for anything else, so `main` can try them in turn.
//!
//! ## Files
//! - `checks.rs`: lint/validate/format over explicit paths.
//! - `corpus.rs`: tokens/sync/migrate over whole trees.
//! - `report.rs`: changeset-scoped quality report.
//!
//! ## Principles
//! - Parse/match CLI inputs here.
//! - Delegate business logic to `services/*`.
//! - Exit status is decided here and only here: 1 when an error-severity
//!   issue is present (report: when it does not pass).

pub mod checks;
pub mod corpus;
pub mod report;

pub use checks::{handle_check_commands, handle_format_command};
pub use corpus::{handle_migrate_command, handle_sync_command, handle_tokens_commands};
pub use report::handle_report_command;
