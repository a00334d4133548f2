use crate::domain::models::Changeset;
use std::path::{Path, PathBuf};

/// Source of the paths that changed between two revisions.
pub trait ChangeProvider {
    fn changed_paths(&self, base: &str, head: &str) -> anyhow::Result<Changeset>;
}

pub struct GitChangeProvider {
    pub repo_root: PathBuf,
}

impl ChangeProvider for GitChangeProvider {
    fn changed_paths(&self, base: &str, head: &str) -> anyhow::Result<Changeset> {
        let output = std::process::Command::new("git")
            .arg("-C")
            .arg(&self.repo_root)
            .args(["diff", "--name-status", "--no-renames"])
            .arg(format!("{base}..{head}"))
            .output()?;
        if !output.status.success() {
            anyhow::bail!(
                "git diff {base}..{head} failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        let changes = parse_name_status(&String::from_utf8_lossy(&output.stdout));
        tracing::debug!(
            added = changes.added.len(),
            modified = changes.modified.len(),
            deleted = changes.deleted.len(),
            "git changeset"
        );
        Ok(changes)
    }
}

/// Explicit path list (`--changed`); classified against the working tree.
pub struct StaticChangeProvider {
    pub repo_root: PathBuf,
    pub paths: Vec<String>,
}

impl ChangeProvider for StaticChangeProvider {
    fn changed_paths(&self, _base: &str, _head: &str) -> anyhow::Result<Changeset> {
        let mut changes = Changeset::default();
        for p in &self.paths {
            let p = p.trim_start_matches("./").to_string();
            if self.repo_root.join(Path::new(&p)).exists() {
                changes.modified.push(p);
            } else {
                changes.deleted.push(p);
            }
        }
        normalize(&mut changes);
        Ok(changes)
    }
}

fn normalize(c: &mut Changeset) {
    for list in [&mut c.added, &mut c.modified, &mut c.deleted] {
        list.sort();
        list.dedup();
    }
}

/// `git diff --name-status` lines: `<status>\t<path>[\t<path>]`.
pub fn parse_name_status(output: &str) -> Changeset {
    let mut changes = Changeset::default();
    for line in output.lines() {
        let mut fields = line.split('\t');
        let Some(status) = fields.next().and_then(|s| s.chars().next()) else {
            continue;
        };
        let paths: Vec<String> = fields.map(str::to_string).collect();
        match (status, paths.as_slice()) {
            ('R', [old, new]) => {
                changes.deleted.push(old.clone());
                changes.added.push(new.clone());
            }
            ('C', [_, new]) | ('A', [new]) => changes.added.push(new.clone()),
            ('D', [old]) => changes.deleted.push(old.clone()),
            (_, [path]) => changes.modified.push(path.clone()),
            _ => tracing::debug!(line, "unrecognized name-status line"),
        }
    }
    normalize(&mut changes);
    changes
}
