use std::path::PathBuf;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("frontmatter syntax: {0}")]
    FrontmatterSyntax(String),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ReadError {
    #[error("cannot read {}: {reason}", path.display())]
    FileUnreadable { path: PathBuf, reason: String },
    #[error("{} is {size} bytes, over the {limit} byte limit", path.display())]
    FileTooLarge { path: PathBuf, size: u64, limit: u64 },
}

#[derive(thiserror::Error, Debug)]
pub enum MigrationError {
    #[error("destination already exists: {} (use --force to overwrite)", .0.display())]
    Conflict(PathBuf),
    #[error("metadata block in {} is malformed; fix it instead of migrating", .0.display())]
    MalformedMetadata(PathBuf),
    #[error(transparent)]
    Read(#[from] ReadError),
    #[error("write failed for {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot render metadata: {0}")]
    Render(#[from] serde_yaml::Error),
}

#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    #[error("no markdownlint command found (install markdownlint-cli or markdownlint-cli2)")]
    NotFound,
    #[error("{command} failed: {reason}")]
    Execution { command: String, reason: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
