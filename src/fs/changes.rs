//! Staged, not yet committed modifications.
//!
//! A [`ChangeSet`] holds three collections keyed by cleaned relative paths:
//!
//! - modified files (path → content, last write wins)
//! - removed files
//! - removed directories (with a trailing `/`; `""` removes everything)
//!
//! A path is never both modified and removed. A path below a removed
//! directory is absent unless it is written again.

use std::collections::{BTreeSet, HashMap, HashSet};

use super::path::dir_prefix;

/// Counts of staged changes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ChangeStats {
    pub modified_files: usize,
    pub removed_files: usize,
    pub removed_dirs: usize,
}

impl ChangeStats {
    pub fn total(&self) -> usize {
        self.modified_files + self.removed_files + self.removed_dirs
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ChangeSet {
    modified_files: HashMap<String, Vec<u8>>,
    removed_files: HashSet<String>,
    removed_dirs: HashSet<String>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a change set from already validated collections, as read back
    /// from a diff bundle.
    pub(crate) fn from_parts(
        modified_files: HashMap<String, Vec<u8>>,
        removed_files: HashSet<String>,
        removed_dirs: HashSet<String>,
    ) -> Self {
        Self {
            modified_files,
            removed_files,
            removed_dirs,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.modified_files.is_empty() && self.removed_files.is_empty() && self.removed_dirs.is_empty()
    }

    pub fn stats(&self) -> ChangeStats {
        ChangeStats {
            modified_files: self.modified_files.len(),
            removed_files: self.removed_files.len(),
            removed_dirs: self.removed_dirs.len(),
        }
    }

    /// Staged content of `path`, if it was written.
    pub fn modified(&self, path: &str) -> Option<&[u8]> {
        self.modified_files.get(path).map(Vec::as_slice)
    }

    /// Modified files ordered by path.
    pub fn modified_files(&self) -> Vec<(&str, &[u8])> {
        let mut files: Vec<_> = self
            .modified_files
            .iter()
            .map(|(path, content)| (path.as_str(), content.as_slice()))
            .collect();
        files.sort_by(|a, b| a.0.cmp(b.0));
        files
    }

    pub fn sorted_modified_paths(&self) -> Vec<&str> {
        sorted(self.modified_files.keys())
    }

    pub fn sorted_removed_files(&self) -> Vec<&str> {
        sorted(self.removed_files.iter())
    }

    /// Removed directories ordered by path, each with a trailing `/`.
    pub fn sorted_removed_dirs(&self) -> Vec<&str> {
        sorted(self.removed_dirs.iter())
    }

    /// Returns true if `path` is removed explicitly or through a removed
    /// parent directory.
    ///
    /// Directories must be passed with a trailing `/`.
    pub fn is_removed(&self, path: &str) -> bool {
        self.removed_files.contains(path)
            || self.removed_dirs.iter().any(|dir| path.starts_with(dir.as_str()))
    }

    pub fn write(&mut self, path: &str, content: Vec<u8>) {
        self.removed_files.remove(path);
        self.modified_files.insert(path.to_string(), content);
    }

    pub fn remove_file(&mut self, path: &str) {
        self.modified_files.remove(path);
        self.removed_files.insert(path.to_string());
    }

    /// Stages recursive removal of the cleaned directory `dir`.
    pub fn remove_dir(&mut self, dir: &str) {
        let prefix = dir_prefix(dir);
        self.modified_files.retain(|path, _| !path.starts_with(&prefix));
        self.removed_files.retain(|path| !path.starts_with(&prefix));
        self.removed_dirs.insert(prefix);
    }

    pub fn clear(&mut self) {
        self.modified_files.clear();
        self.removed_files.clear();
        self.removed_dirs.clear();
    }

    /// Names of directories directly below `prefix` that exist only because
    /// a staged file lives somewhere inside them.
    pub fn child_dirs(&self, prefix: &str) -> BTreeSet<&str> {
        self.modified_files
            .keys()
            .filter_map(|path| path.strip_prefix(prefix))
            .filter_map(|rest| rest.split_once('/').map(|(dir, _)| dir))
            .collect()
    }

    /// Names of staged files directly below `prefix`.
    pub fn child_files(&self, prefix: &str) -> BTreeSet<&str> {
        self.modified_files
            .keys()
            .filter_map(|path| path.strip_prefix(prefix))
            .filter(|rest| !rest.is_empty() && !rest.contains('/'))
            .collect()
    }
}

fn sorted<'a>(paths: impl Iterator<Item = &'a String>) -> Vec<&'a str> {
    let mut paths: Vec<&str> = paths.map(String::as_str).collect();
    paths.sort_unstable();
    paths
}
