//! Rule document parser: YAML metadata block plus a flat block scan of the body.
//!
//! Parsing never fails. A broken metadata block is recorded on the document as a
//! `ParseError` and the body is still scanned, so one bad file cannot abort a batch.

use crate::domain::document::{Block, BlockKind, FrontMatter, RuleDocument};
use crate::domain::errors::ParseError;
use std::path::Path;

const DELIMITER: &str = "---";

struct FrontSplit {
    metadata: Option<FrontMatter>,
    error: Option<ParseError>,
    body_offset: usize,
    body_start_line: usize,
}

pub fn parse_document(path: &Path, raw: &str) -> RuleDocument {
    let text = raw.strip_prefix('\u{feff}').unwrap_or(raw);
    let split = split_frontmatter(text);
    let body = text.get(split.body_offset..).unwrap_or_default();
    let blocks = scan_blocks(body, split.body_start_line);
    if let Some(err) = &split.error {
        tracing::debug!(path = %path.display(), error = %err, "metadata block rejected");
    }
    RuleDocument::new(
        path.to_path_buf(),
        text.to_string(),
        split.metadata,
        split.error,
        split.body_offset,
        split.body_start_line,
        blocks,
    )
}

/// Lines with the byte offset just past their terminator.
fn lines_with_ends(text: &str) -> impl Iterator<Item = (&str, usize)> {
    let mut offset = 0;
    text.split_inclusive('\n').map(move |chunk| {
        offset += chunk.len();
        (chunk.trim_end_matches(['\n', '\r']), offset)
    })
}

fn split_frontmatter(text: &str) -> FrontSplit {
    let mut lines = lines_with_ends(text);
    let no_block = FrontSplit {
        metadata: None,
        error: None,
        body_offset: 0,
        body_start_line: 1,
    };
    let Some((first, first_end)) = lines.next() else {
        return no_block;
    };
    if first.trim_end() != DELIMITER {
        return no_block;
    }

    let mut yaml = String::new();
    for (idx, (line, end)) in lines.enumerate() {
        if line.trim_end() == DELIMITER {
            let (metadata, error) = match parse_yaml(&yaml) {
                Ok(map) => (Some(map), None),
                Err(e) => (None, Some(e)),
            };
            return FrontSplit {
                metadata,
                error,
                body_offset: end,
                // delimiter lines are 1 and idx + 2; the body starts after the closing one
                body_start_line: idx + 3,
            };
        }
        yaml.push_str(line);
        yaml.push('\n');
    }

    FrontSplit {
        metadata: None,
        error: Some(ParseError::FrontmatterSyntax(
            "metadata block has no closing `---` line".into(),
        )),
        body_offset: first_end,
        body_start_line: 2,
    }
}

fn parse_yaml(yaml: &str) -> Result<FrontMatter, ParseError> {
    let value: serde_json::Value = serde_yaml::from_str(yaml)
        .map_err(|e| ParseError::FrontmatterSyntax(e.to_string()))?;
    match value {
        serde_json::Value::Object(map) => Ok(map.into_iter().collect()),
        serde_json::Value::Null => Ok(FrontMatter::new()),
        other => Err(ParseError::FrontmatterSyntax(format!(
            "metadata block must be a key/value mapping, found {}",
            json_kind(&other)
        ))),
    }
}

pub fn json_kind(v: &serde_json::Value) -> &'static str {
    match v {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "mapping",
    }
}

/// Opening fence: three or more backticks or tildes. Returns the marker and the info string.
pub(crate) fn fence_marker(line: &str) -> Option<(&str, &str)> {
    let trimmed = line.trim_start();
    if line.len() - trimmed.len() > 3 {
        return None;
    }
    let ch = trimmed.chars().next().filter(|c| *c == '`' || *c == '~')?;
    let run = trimmed.chars().take_while(|c| *c == ch).count();
    if run < 3 {
        return None;
    }
    let (marker, info) = trimmed.split_at(run);
    if ch == '`' && info.contains('`') {
        return None;
    }
    Some((marker, info.trim()))
}

fn heading(line: &str) -> Option<(u8, &str)> {
    let hashes = line.chars().take_while(|c| *c == '#').count();
    if !(1..=6).contains(&hashes) {
        return None;
    }
    let rest = &line[hashes..];
    if !rest.is_empty() && !rest.starts_with([' ', '\t']) {
        return None;
    }
    let text = rest.trim().trim_end_matches('#').trim_end();
    Some((hashes as u8, text))
}

fn is_list_item(trimmed: &str) -> bool {
    if let Some(rest) = trimmed.strip_prefix(['-', '*', '+']) {
        return rest.is_empty() || rest.starts_with([' ', '\t']);
    }
    let digits = trimmed.chars().take_while(|c| c.is_ascii_digit()).count();
    digits > 0 && {
        let rest = &trimmed[digits..];
        rest.starts_with(". ") || rest.starts_with(") ") || rest == "." || rest == ")"
    }
}

struct OpenFence<'a> {
    marker: &'a str,
    language: Option<String>,
    line_number: usize,
    lines: Vec<&'a str>,
}

impl OpenFence<'_> {
    fn finish(self, unterminated: bool) -> Block {
        Block {
            kind: BlockKind::Code,
            level: None,
            language: self.language,
            content: self.lines.join("\n"),
            line_number: self.line_number,
            unterminated,
        }
    }
}

struct Run<'a> {
    kind: BlockKind,
    line_number: usize,
    lines: Vec<&'a str>,
}

fn flush(run: &mut Option<Run<'_>>, blocks: &mut Vec<Block>) {
    if let Some(r) = run.take() {
        blocks.push(Block {
            kind: r.kind,
            level: None,
            language: None,
            content: r.lines.join("\n"),
            line_number: r.line_number,
            unterminated: false,
        });
    }
}

/// Two-state scan (outside / inside a fence). `first_line` is the absolute line
/// number of the first body line, so block positions point into the original file.
pub fn scan_blocks(body: &str, first_line: usize) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut run: Option<Run> = None;
    let mut fence: Option<OpenFence> = None;

    for (idx, line) in body.lines().enumerate() {
        let line_number = first_line + idx;

        if let Some(open) = fence.as_mut() {
            if line.trim() == open.marker {
                if let Some(done) = fence.take() {
                    blocks.push(done.finish(false));
                }
            } else {
                open.lines.push(line);
            }
            continue;
        }

        if let Some((marker, info)) = fence_marker(line) {
            flush(&mut run, &mut blocks);
            fence = Some(OpenFence {
                marker,
                language: info.split_whitespace().next().map(str::to_string),
                line_number,
                lines: Vec::new(),
            });
            continue;
        }

        let trimmed = line.trim_start();
        if trimmed.is_empty() {
            flush(&mut run, &mut blocks);
            continue;
        }

        if let Some((level, text)) = heading(line) {
            flush(&mut run, &mut blocks);
            blocks.push(Block {
                kind: BlockKind::Heading,
                level: Some(level),
                language: None,
                content: text.to_string(),
                line_number,
                unterminated: false,
            });
            continue;
        }

        let item = is_list_item(trimmed);
        let indented = line.len() != trimmed.len();
        match run.as_mut() {
            Some(r) if r.kind == BlockKind::List && (item || indented) => r.lines.push(line),
            Some(r) if r.kind == BlockKind::Text && !item => r.lines.push(line),
            _ => {
                flush(&mut run, &mut blocks);
                run = Some(Run {
                    kind: if item { BlockKind::List } else { BlockKind::Text },
                    line_number,
                    lines: vec![line],
                });
            }
        }
    }

    flush(&mut run, &mut blocks);
    if let Some(open) = fence {
        blocks.push(open.finish(true));
    }
    blocks
}
