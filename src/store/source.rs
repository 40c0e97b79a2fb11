use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::errors::{RefError, Result};

/// Read-only access to the persisted spec-data files.
///
/// Paths are `/`-separated and relative to the data root, e.g.
/// `anchors/anchors-fo.json`.
pub trait DataSource {
    /// Returns the file's contents, or `None` if it does not exist.
    fn fetch(&self, path: &str) -> Result<Option<String>>;

    /// Lists the file names (not paths) directly inside `dir`, sorted.
    fn list(&self, dir: &str) -> Result<Vec<String>>;

    /// Human-readable description for diagnostics.
    fn describe(&self) -> String;
}

/// Spec data stored in a directory on disk.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl DataSource for DirectorySource {
    fn fetch(&self, path: &str) -> Result<Option<String>> {
        let full = self.root.join(path);
        if !full.is_file() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(&full)?))
    }

    fn list(&self, dir: &str) -> Result<Vec<String>> {
        let base = self.root.join(dir);
        if !base.is_dir() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in WalkDir::new(&base).min_depth(1).max_depth(1) {
            let entry = match entry {
                Ok(e) => e,
                Err(_) => continue,
            };
            if entry.file_type().is_file() {
                names.push(entry.file_name().to_string_lossy().to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    fn describe(&self) -> String {
        self.root.display().to_string()
    }
}

/// In-memory spec data, keyed by path.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    files: BTreeMap<String, String>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: &str, contents: impl Into<String>) -> Self {
        self.insert(path, contents);
        self
    }

    pub fn insert(&mut self, path: &str, contents: impl Into<String>) {
        self.files.insert(path.to_string(), contents.into());
    }
}

impl DataSource for MemorySource {
    fn fetch(&self, path: &str) -> Result<Option<String>> {
        Ok(self.files.get(path).cloned())
    }

    fn list(&self, dir: &str) -> Result<Vec<String>> {
        let prefix = format!("{}/", dir.trim_end_matches('/'));
        Ok(self
            .files
            .keys()
            .filter_map(|k| k.strip_prefix(&prefix))
            .filter(|rest| !rest.contains('/'))
            .map(|rest| rest.to_string())
            .collect())
    }

    fn describe(&self) -> String {
        "<memory>".to_string()
    }
}

/// Derives the 2-character, filename-safe shard name for a key: its first
/// two lowercase ASCII letters or digits, padded with `_`.
pub fn group_from_key(key: &str) -> String {
    let mut group: String = key
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        .take(2)
        .collect();
    while group.len() < 2 {
        group.push('_');
    }
    group
}

/// Parses a JSON data file, mapping failures to a `Parse` error naming the
/// file.
pub(crate) fn parse_json<T: serde::de::DeserializeOwned>(path: &str, contents: &str) -> Result<T> {
    serde_json::from_str(contents).map_err(|e| RefError::Parse {
        message: e.to_string(),
        source_name: path.to_string(),
        line: Some(e.line()),
    })
}
