use crate::config::CorpusConfig;
use crate::domain::errors::ReadError;
use crate::domain::issues::{IssueCode, Location, ValidationIssue};
use std::io::Read;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Read side of the filesystem as the checkers see it.
pub trait FileSource: Sync {
    fn read_text(&self, path: &Path) -> Result<String, ReadError>;
}

/// Disk reads capped at `max_bytes`; non-UTF-8 content counts as unreadable.
pub struct BoundedFs {
    pub max_bytes: u64,
}

impl FileSource for BoundedFs {
    fn read_text(&self, path: &Path) -> Result<String, ReadError> {
        let unreadable = |reason: String| ReadError::FileUnreadable {
            path: path.to_path_buf(),
            reason,
        };
        let file = std::fs::File::open(path).map_err(|e| unreadable(e.to_string()))?;
        let size = file.metadata().map_err(|e| unreadable(e.to_string()))?.len();
        if size > self.max_bytes {
            return Err(ReadError::FileTooLarge {
                path: path.to_path_buf(),
                size,
                limit: self.max_bytes,
            });
        }
        let mut bytes = Vec::with_capacity(size as usize);
        file.take(self.max_bytes + 1)
            .read_to_end(&mut bytes)
            .map_err(|e| unreadable(e.to_string()))?;
        if bytes.len() as u64 > self.max_bytes {
            return Err(ReadError::FileTooLarge {
                path: path.to_path_buf(),
                size: bytes.len() as u64,
                limit: self.max_bytes,
            });
        }
        String::from_utf8(bytes).map_err(|_| unreadable("not valid UTF-8".into()))
    }
}

pub fn read_issue(err: &ReadError, display: &str) -> ValidationIssue {
    let code = match err {
        ReadError::FileUnreadable { .. } => IssueCode::FileUnreadable,
        ReadError::FileTooLarge { .. } => IssueCode::FileTooLarge,
    };
    ValidationIssue::error(code, Location::file(display), err.to_string())
}

/// Forward-slash rendering used in every report location.
pub fn display_path(path: &Path) -> String {
    let s = path.to_string_lossy().replace('\\', "/");
    s.strip_prefix("./").map(str::to_string).unwrap_or(s)
}

pub fn display_relative(path: &Path, root: Option<&Path>) -> String {
    match root.and_then(|r| path.strip_prefix(r).ok()) {
        Some(rel) => display_path(rel),
        None => display_path(path),
    }
}

/// `.md`/`.mdc`, not an exempt file name, not under a skipped directory.
pub fn is_rule_path(path: &Path, corpus: &CorpusConfig) -> bool {
    let has_ext = path
        .extension()
        .map(|e| corpus.extensions.iter().any(|x| e == x.as_str()))
        .unwrap_or(false);
    if !has_ext {
        return false;
    }
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy())
        .unwrap_or_default();
    if corpus.exempt_files.iter().any(|x| x == name.as_ref()) {
        return false;
    }
    let Some(parent) = path.parent() else {
        return true;
    };
    !parent.components().any(|c| {
        let c = c.as_os_str().to_string_lossy();
        corpus.skip_dirs.iter().any(|d| d == c.as_ref())
    })
}

/// Rule files under `root` (or `root` itself when it is a file), sorted.
pub fn collect_rule_files(root: &Path, corpus: &CorpusConfig) -> Vec<PathBuf> {
    if root.is_file() {
        return vec![root.to_path_buf()];
    }
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| {
            e.depth() == 0
                || !e.file_type().is_dir()
                || !corpus
                    .skip_dirs
                    .iter()
                    .any(|d| e.file_name().to_string_lossy() == d.as_str())
        })
        .filter_map(|e| match e {
            Ok(e) => Some(e),
            Err(err) => {
                tracing::warn!(error = %err, "skipping unreadable directory entry");
                None
            }
        })
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| {
            p.strip_prefix(root)
                .map(|rel| is_rule_path(rel, corpus))
                .unwrap_or(false)
        })
        .collect();
    files.sort();
    files
}

/// Expand command-line paths: directories are walked, files are taken as given.
pub fn expand_inputs(inputs: &[PathBuf], corpus: &CorpusConfig) -> Vec<PathBuf> {
    let mut out = Vec::new();
    for input in inputs {
        if input.is_dir() {
            out.extend(collect_rule_files(input, corpus));
        } else {
            out.push(input.clone());
        }
    }
    out.sort();
    out.dedup();
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Track {
    Full,
    Concise,
    Other,
}

pub fn track_of(path: &Path, corpus: &CorpusConfig) -> Track {
    for c in path.components() {
        let c = c.as_os_str().to_string_lossy();
        if c == corpus.full_root.as_str() {
            return Track::Full;
        }
        if c == corpus.concise_root.as_str() {
            return Track::Concise;
        }
    }
    Track::Other
}
