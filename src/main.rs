use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;
mod config;
mod domain;
mod services;

pub use cli::*;
pub use commands::*;
pub use config::Config;
pub use domain::issues::count_severities;
pub use domain::models::*;
pub use services::changeset::{ChangeProvider, GitChangeProvider, StaticChangeProvider};
pub use services::engine::{engine_for, MarkdownEngine};
pub use services::fsio::{display_path, expand_inputs, BoundedFs, FileSource};
pub use services::migrate::{migrate_file, MigrateOptions};
pub use services::output::{issue_row, print_json, print_one, print_out};
pub use services::pipeline::{check_all, CheckedFile, FileChecker, Stages};
pub use services::report::{render_markdown as render_report_markdown, run_report};
pub use services::sync::{check_trees, render_markdown as render_sync_markdown};
pub use services::tokens::{build_counter, compare, count_path, render_table};

fn init_tracing(verbose: bool) {
    let default = if verbose { "rulegate=debug" } else { "rulegate=warn" };
    let filter =
        EnvFilter::try_from_env("RULEGATE_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let config = Config::load(cli.config.as_deref())?;

    if handle_tokens_commands(&cli, &config)? {
        return Ok(());
    }
    if handle_check_commands(&cli, &config)? {
        return Ok(());
    }
    if handle_format_command(&cli, &config)? {
        return Ok(());
    }
    if handle_sync_command(&cli, &config)? {
        return Ok(());
    }
    if handle_migrate_command(&cli, &config)? {
        return Ok(());
    }
    handle_report_command(&cli, &config)?;
    Ok(())
}
