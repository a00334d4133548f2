use crate::cli::Encoding;
use crate::config::{CorpusConfig, TokensConfig};
use crate::domain::errors::ReadError;
use crate::domain::models::{FileTokens, TokenAggregate, TokenComparison};
use crate::services::fsio::{collect_rule_files, display_path, read_issue, FileSource};
use crate::services::parser::parse_document;
use rayon::prelude::*;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tiktoken_rs::{cl100k_base, o200k_base, p50k_base, CoreBPE};

/// Anything that can turn text into a token count.
pub trait Tokenize: Sync {
    fn count(&self, text: &str) -> usize;
    fn encoding_name(&self) -> &str;
}

pub struct TokenCounter {
    bpe: CoreBPE,
    encoding: Encoding,
}

impl TokenCounter {
    pub fn new(encoding: Encoding) -> anyhow::Result<Self> {
        let bpe = match encoding {
            Encoding::Cl100k => cl100k_base(),
            Encoding::O200k => o200k_base(),
            Encoding::P50k => p50k_base(),
        }
        .map_err(|e| anyhow::anyhow!("failed to load {}: {e}", encoding.name()))?;
        Ok(Self { bpe, encoding })
    }
}

impl Tokenize for TokenCounter {
    fn count(&self, text: &str) -> usize {
        self.bpe.encode_ordinary(text).len()
    }

    fn encoding_name(&self) -> &str {
        self.encoding.name()
    }
}

pub fn cache_key(encoding: &str, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(encoding.as_bytes());
    hasher.update([0u8]);
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

pub fn default_cache_path() -> Option<PathBuf> {
    let home = std::env::var("HOME").ok()?;
    Some(
        PathBuf::from(home)
            .join(".cache")
            .join("rulegate")
            .join("token-counts.json"),
    )
}

/// Entries kept on disk beyond the ones used by the current run.
pub const MAX_CACHE_ENTRIES: usize = 10_000;

#[derive(Default)]
struct CacheState {
    entries: BTreeMap<String, usize>,
    used: BTreeSet<String>,
    dirty: bool,
}

impl CacheState {
    /// Keep every key this run touched, then stale keys up to `cap` in total.
    fn prune(&mut self, cap: usize) {
        if self.entries.len() <= cap {
            return;
        }
        let mut room = cap.saturating_sub(self.used.len());
        let used = &self.used;
        self.entries.retain(|key, _| {
            if used.contains(key) {
                return true;
            }
            if room > 0 {
                room -= 1;
                return true;
            }
            false
        });
    }
}

/// Content-hash memo in front of another counter, optionally persisted as JSON.
pub struct CachedCounter<T: Tokenize> {
    inner: T,
    path: Option<PathBuf>,
    max_entries: usize,
    state: Mutex<CacheState>,
}

impl<T: Tokenize> CachedCounter<T> {
    pub fn new(inner: T, path: Option<PathBuf>) -> Self {
        let entries = path
            .as_deref()
            .and_then(|p| std::fs::read_to_string(p).ok())
            .and_then(|raw| match serde_json::from_str(&raw) {
                Ok(entries) => Some(entries),
                Err(e) => {
                    tracing::warn!(error = %e, "ignoring corrupt token cache");
                    None
                }
            })
            .unwrap_or_default();
        Self {
            inner,
            path,
            max_entries: MAX_CACHE_ENTRIES,
            state: Mutex::new(CacheState {
                entries,
                ..CacheState::default()
            }),
        }
    }

    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    pub fn len(&self) -> usize {
        self.state.lock().map(|s| s.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write entries back, dropping stale ones over the cap; no-op without a path or without changes.
    pub fn persist(&self) -> anyhow::Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let mut state = self
            .state
            .lock()
            .map_err(|_| anyhow::anyhow!("token cache lock poisoned"))?;
        if !state.dirty && state.entries.len() <= self.max_entries {
            return Ok(());
        }
        state.prune(self.max_entries);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string(&state.entries)?)?;
        state.dirty = false;
        tracing::debug!(entries = state.entries.len(), path = %path.display(), "token cache saved");
        Ok(())
    }
}

impl<T: Tokenize> Tokenize for CachedCounter<T> {
    fn count(&self, text: &str) -> usize {
        let key = cache_key(self.inner.encoding_name(), text);
        if let Ok(mut state) = self.state.lock() {
            if let Some(n) = state.entries.get(&key).copied() {
                state.used.insert(key);
                return n;
            }
        }
        let n = self.inner.count(text);
        if let Ok(mut state) = self.state.lock() {
            state.entries.insert(key.clone(), n);
            state.used.insert(key);
            state.dirty = true;
        }
        n
    }

    fn encoding_name(&self) -> &str {
        self.inner.encoding_name()
    }
}

/// The counter every command uses: configured vocabulary unless overridden,
/// memoized in memory, persisted under `$HOME` only when caching is on.
pub fn build_counter(
    cfg: &TokensConfig,
    encoding: Option<Encoding>,
    no_cache: bool,
) -> anyhow::Result<CachedCounter<TokenCounter>> {
    let inner = TokenCounter::new(encoding.unwrap_or(cfg.encoding))?;
    let path = if cfg.cache && !no_cache {
        default_cache_path()
    } else {
        None
    };
    Ok(CachedCounter::new(inner, path))
}

/// `1 - concise/full`; zero when the full side has no tokens.
pub fn reduction(full: usize, concise: usize) -> f64 {
    if full == 0 {
        return 0.0;
    }
    1.0 - concise as f64 / full as f64
}

pub fn file_tokens(
    path: &Path,
    source: &dyn FileSource,
    counter: &dyn Tokenize,
) -> Result<FileTokens, ReadError> {
    let raw = source.read_text(path)?;
    let doc = parse_document(path, &raw);
    Ok(FileTokens {
        path: display_path(path),
        total_tokens: counter.count(&doc.raw_text),
        content_tokens: doc.token_count_with(|body| counter.count(body)),
    })
}

/// Single file or directory aggregate. Unreadable files become issues, not failures.
pub fn count_path(
    root: &Path,
    corpus: &CorpusConfig,
    source: &dyn FileSource,
    counter: &dyn Tokenize,
) -> TokenAggregate {
    let files = collect_rule_files(root, corpus);
    let results: Vec<Result<FileTokens, ReadError>> = files
        .par_iter()
        .map(|p| file_tokens(p, source, counter))
        .collect();

    let mut counted = Vec::new();
    let mut issues = Vec::new();
    for (path, r) in files.iter().zip(results) {
        match r {
            Ok(t) => counted.push(t),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping file");
                issues.push(read_issue(&e, &display_path(path)));
            }
        }
    }
    counted.sort_by(|a, b| a.path.cmp(&b.path));

    TokenAggregate {
        root: display_path(root),
        encoding: counter.encoding_name().to_string(),
        total_tokens: counted.iter().map(|f| f.total_tokens).sum(),
        content_tokens: counted.iter().map(|f| f.content_tokens).sum(),
        files: counted,
        issues,
    }
}

pub fn compare(
    a: &Path,
    b: &Path,
    source: &dyn FileSource,
    counter: &dyn Tokenize,
) -> Result<TokenComparison, ReadError> {
    let fa = file_tokens(a, source, counter)?;
    let fb = file_tokens(b, source, counter)?;
    Ok(TokenComparison {
        encoding: counter.encoding_name().to_string(),
        reduction: reduction(fa.content_tokens, fb.content_tokens),
        path_a: fa.path,
        path_b: fb.path,
        tokens_a: fa.content_tokens,
        tokens_b: fb.content_tokens,
        total_a: fa.total_tokens,
        total_b: fb.total_tokens,
    })
}

pub fn render_table(agg: &TokenAggregate) -> String {
    let mut out = String::from("| File | Total | Content |\n|------|------:|--------:|\n");
    for f in &agg.files {
        out.push_str(&format!(
            "| {} | {} | {} |\n",
            f.path, f.total_tokens, f.content_tokens
        ));
    }
    out.push_str(&format!(
        "| **Total** | **{}** | **{}** |\n",
        agg.total_tokens, agg.content_tokens
    ));
    out
}
