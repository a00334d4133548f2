use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_CONFIG_FILE: &str = ".rulegate.toml";

#[derive(Parser, Debug)]
#[command(
    name = "rulegate",
    version,
    about = "Validate, budget and sync AI assistant rule corpora"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Output machine-readable JSON")]
    pub json: bool,
    #[arg(
        long,
        global = true,
        help = "Config file (defaults to ./.rulegate.toml when present)"
    )]
    pub config: Option<PathBuf>,
    #[arg(short, long, global = true, help = "Debug logging on stderr")]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Exact token counts for files, directories or pairs.
    Tokens {
        #[command(subcommand)]
        command: TokenCommands,
    },
    /// Naming, heading, code-language and denylist checks.
    Lint {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        #[arg(long, help = "Also run schema validation")]
        check: bool,
        #[arg(long, value_enum, default_value_t = EngineKind::None)]
        engine: EngineKind,
    },
    /// Metadata schema validation.
    Validate {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Pair the full and concise trees and check reduction ratios.
    Sync {
        full_dir: PathBuf,
        concise_dir: PathBuf,
        #[arg(long, help = "Render the pair table as markdown")]
        markdown: bool,
    },
    /// Add a metadata block to legacy documents.
    Migrate {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        #[arg(long)]
        dry_run: bool,
        #[arg(long, help = "Overwrite an existing destination")]
        force: bool,
        #[arg(long, help = "Do not delete the .md source after writing .mdc")]
        keep_source: bool,
    },
    /// Aggregate every check over a changeset into one scored report.
    Report {
        #[arg(long, env = "GITHUB_BASE_SHA", default_value = "HEAD~1")]
        base: String,
        #[arg(long, env = "GITHUB_SHA", default_value = "HEAD")]
        head: String,
        #[arg(long, default_value = ".")]
        root: PathBuf,
        #[arg(long, num_args = 1.., help = "Explicit changed paths (skips git)")]
        changed: Vec<String>,
        #[arg(long, help = "Render the report as markdown")]
        markdown: bool,
    },
    /// Normalize markdown through the selected engine.
    Format {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        #[arg(long, help = "Only list files that would change")]
        check: bool,
        #[arg(long, value_enum, default_value_t = EngineKind::Builtin)]
        engine: EngineKind,
    },
}

#[derive(Subcommand, Debug)]
pub enum TokenCommands {
    Count {
        path: PathBuf,
        #[arg(long, help = "Render a markdown table")]
        table: bool,
        #[arg(long, value_enum)]
        encoding: Option<Encoding>,
        #[arg(long)]
        no_cache: bool,
    },
    Compare {
        a: PathBuf,
        b: PathBuf,
        #[arg(long, value_enum)]
        encoding: Option<Encoding>,
    },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    #[default]
    Cl100k,
    O200k,
    P50k,
}

impl Encoding {
    pub fn name(self) -> &'static str {
        match self {
            Encoding::Cl100k => "cl100k_base",
            Encoding::O200k => "o200k_base",
            Encoding::P50k => "p50k_base",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    None,
    Builtin,
    Markdownlint,
}
