//! Region list persistence inside a flat key-value text file.
//!
//! The file may hold unrelated settings; only the line for the configured key
//! is ever rewritten. Everything else is preserved byte-for-byte, line endings
//! included.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::fs;
use tracing::{debug, info};

use super::{write_atomic, Result, StoreError};
use crate::region::{format_list, parse_list, RegionSet};

/// Set differences between the persisted regions and a candidate set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigComparison {
    pub previous: RegionSet,
    pub new: RegionSet,
    pub added: RegionSet,
    pub removed: RegionSet,
    pub unchanged: RegionSet,
}

impl ConfigComparison {
    /// Compute the comparison between two sets.
    pub fn between(previous: RegionSet, new: RegionSet) -> Self {
        Self {
            added: new.difference(&previous),
            removed: previous.difference(&new),
            unchanged: new.intersection(&previous),
            previous,
            new,
        }
    }

    pub fn has_changes(&self) -> bool {
        !self.added.is_empty() || !self.removed.is_empty()
    }
}

/// Owns the persisted region set.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
    key: String,
}

impl ConfigStore {
    /// Create a store for `key` inside the file at `path`.
    ///
    /// Nothing is read or created until the first operation.
    pub fn new(path: impl AsRef<Path>, key: impl Into<String>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            key: key.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Read the configured regions.
    ///
    /// Returns the empty set when the file or key is missing, or the file
    /// cannot be read.
    pub async fn read(&self) -> RegionSet {
        match fs::read_to_string(&self.path).await {
            Ok(contents) => self
                .find_value(&contents)
                .map(|value| parse_list(unquote(value)))
                .unwrap_or_default(),
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "No readable region configuration");
                RegionSet::new()
            }
        }
    }

    /// Persist the valid, deduplicated subset of `candidate`.
    ///
    /// Returns `Ok(false)` without touching the file when no candidate is
    /// valid. Write failures are returned to the caller.
    pub async fn update<I, S>(&self, candidate: I) -> Result<bool>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let regions = RegionSet::from_tokens(candidate);
        if regions.is_empty() {
            debug!(key = %self.key, "No valid regions in candidate, leaving configuration untouched");
            return Ok(false);
        }

        let existing = match fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
            Err(e) => return Err(StoreError::io(&self.path, e)),
        };

        let line = format!("{}={}", self.key, format_list(&regions));
        let updated = self.replace_or_append(&existing, &line);
        write_atomic(&self.path, updated.as_bytes()).await?;

        info!(
            path = %self.path.display(),
            regions = %format_list(&regions),
            "Updated region configuration"
        );
        Ok(true)
    }

    /// Compare the persisted regions with the valid subset of `candidate`.
    ///
    /// Does not write.
    pub async fn compare<I, S>(&self, candidate: I) -> ConfigComparison
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let previous = self.read().await;
        ConfigComparison::between(previous, RegionSet::from_tokens(candidate))
    }

    /// Value of the last line assigning our key, if any.
    fn find_value<'a>(&self, contents: &'a str) -> Option<&'a str> {
        contents
            .lines()
            .filter_map(|line| self.value_of(line))
            .last()
    }

    fn value_of<'a>(&self, line: &'a str) -> Option<&'a str> {
        let trimmed = line.trim_start();
        let trimmed = trimmed.strip_prefix("export ").unwrap_or(trimmed);
        let (name, value) = trimmed.split_once('=')?;
        (name.trim() == self.key).then(|| value.trim())
    }

    fn replace_or_append(&self, existing: &str, line: &str) -> String {
        let newline = if existing.contains("\r\n") { "\r\n" } else { "\n" };
        let mut out = String::with_capacity(existing.len() + line.len() + newline.len());
        let mut replaced = false;
        for current in existing.split_inclusive('\n') {
            let content = current.trim_end_matches(|c| c == '\r' || c == '\n');
            if self.value_of(content).is_some() {
                if !replaced {
                    let ending = &current[content.len()..];
                    out.push_str(line);
                    out.push_str(if ending.is_empty() { newline } else { ending });
                    replaced = true;
                }
                // Later duplicates of the key are dropped
                continue;
            }
            out.push_str(current);
        }
        if !replaced {
            if !out.is_empty() && !out.ends_with('\n') {
                out.push_str(newline);
            }
            out.push_str(line);
            out.push_str(newline);
        }
        out
    }
}

fn unquote(value: &str) -> &str {
    let stripped = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')));
    stripped.unwrap_or(value)
}
