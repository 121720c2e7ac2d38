//! Backup and autosave diff bundles.
//!
//! A bundle persists a [`ChangeSet`] under the root so it survives a crash:
//!
//! ```text
//! <root>/.backup/backup.lp                     manifest
//! <root>/.backup/2026-10-17_12-00-00-123/...   copies of modified files
//! ```
//!
//! ## Phases
//!
//! 1. **Copy**: every modified file goes into a fresh timestamp directory
//! 2. **Manifest**: written last, via a temporary file renamed into place
//! 3. **Cleanup**: timestamp directories of older bundles are removed
//!
//! A bundle only exists once its manifest does. If the process dies during
//! phase 1, the half-written directory is ignored and the previous manifest
//! (if any) still points at complete data.

use crate::error::{FsError, Result, io_err};

use super::changes::ChangeSet;
use super::path::{clean_path, dir_prefix, is_contained};
use super::{remove_dir_if_exists, write_file};

use chrono::{Local, SecondsFormat};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use toml_edit::{Array, DocumentMut, Item, Value, value};

/// Which bundle to operate on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffKind {
    /// Written by `save()` before touching real files.
    Backup,
    /// Written by `autosave()`.
    Autosave,
}

impl DiffKind {
    pub fn name(&self) -> &'static str {
        match self {
            DiffKind::Backup => "backup",
            DiffKind::Autosave => "autosave",
        }
    }

    /// Bundle directory name, relative to the root.
    pub fn dir_name(&self) -> &'static str {
        match self {
            DiffKind::Backup => ".backup",
            DiffKind::Autosave => ".autosave",
        }
    }

    pub fn manifest_name(&self) -> &'static str {
        match self {
            DiffKind::Backup => "backup.lp",
            DiffKind::Autosave => "autosave.lp",
        }
    }

    pub fn dir(&self, root: &Path) -> PathBuf {
        root.join(self.dir_name())
    }

    pub fn manifest_path(&self, root: &Path) -> PathBuf {
        self.dir(root).join(self.manifest_name())
    }

    /// Returns true if a complete bundle of this kind exists under `root`.
    pub fn exists(&self, root: &Path) -> bool {
        self.manifest_path(root).is_file()
    }
}

/// Parsed bundle manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffManifest {
    pub created: String,
    pub modified_files_directory: String,
    pub modified_files: Vec<String>,
    pub removed_files: Vec<String>,
    pub removed_directories: Vec<String>,
}

impl DiffManifest {
    fn to_toml(&self) -> String {
        let mut doc = DocumentMut::new();
        doc["created"] = value(self.created.as_str());
        doc["modified_files_directory"] = value(self.modified_files_directory.as_str());
        doc["modified_files"] = path_array(&self.modified_files);
        doc["removed_files"] = path_array(&self.removed_files);
        doc["removed_directories"] = path_array(&self.removed_directories);
        doc.to_string()
    }

    fn parse(content: &str, manifest: &Path) -> Result<Self> {
        let doc: DocumentMut = content.parse()?;
        let corrupt = |reason: String| FsError::CorruptDiffBundle {
            path: manifest.to_path_buf(),
            reason,
        };

        let created = doc
            .get("created")
            .and_then(Item::as_str)
            .unwrap_or_default()
            .to_string();

        let directory = doc
            .get("modified_files_directory")
            .and_then(Item::as_str)
            .ok_or_else(|| corrupt("missing 'modified_files_directory'".into()))?;
        if directory.is_empty()
            || clean_path(directory) != directory
            || directory.contains('/')
            || !is_contained(directory)
        {
            return Err(corrupt(format!("invalid directory name '{}'", directory)));
        }

        // Paths are stored cleaned, the way the logical view looks them up.
        // Directories keep their trailing `/`.
        let paths = |key: &str, dirs: bool| -> Result<Vec<String>> {
            let Some(item) = doc.get(key) else {
                return Ok(Vec::new());
            };
            let array = item
                .as_array()
                .ok_or_else(|| corrupt(format!("'{}' is not an array", key)))?;

            array
                .iter()
                .map(|v| {
                    let path = v
                        .as_str()
                        .ok_or_else(|| corrupt(format!("'{}' contains a non-string entry", key)))?;
                    let cleaned = clean_path(path);
                    if !is_contained(&cleaned) {
                        return Err(corrupt(format!("path '{}' leaves the root", path)));
                    }
                    if dirs {
                        Ok(dir_prefix(&cleaned))
                    } else if cleaned.is_empty() {
                        Err(corrupt(format!("'{}' contains an empty path", key)))
                    } else {
                        Ok(cleaned)
                    }
                })
                .collect()
        };

        Ok(Self {
            modified_files: paths("modified_files", false)?,
            removed_files: paths("removed_files", false)?,
            removed_directories: paths("removed_directories", true)?,
            created,
            modified_files_directory: directory.to_string(),
        })
    }
}

fn path_array(paths: &[String]) -> Item {
    let mut array = Array::new();
    for path in paths {
        array.push_formatted(Value::from(path.as_str()).decorated("\n    ", ""));
    }
    if !paths.is_empty() {
        array.set_trailing_comma(true);
        array.set_trailing("\n");
    }
    Item::Value(Value::Array(array))
}

/// Persists `changes` as a bundle of `kind` under `root`.
pub fn save_diff(root: &Path, changes: &ChangeSet, kind: DiffKind) -> Result<()> {
    let bundle_dir = kind.dir(root);
    let now = Local::now();
    let directory = unique_dir_name(&bundle_dir, &now.format("%Y-%m-%d_%H-%M-%S-%3f").to_string());
    let data_dir = bundle_dir.join(&directory);

    fs::create_dir_all(&data_dir).map_err(|e| io_err("create directory", &data_dir, e))?;
    for (path, content) in changes.modified_files() {
        write_file(&data_dir.join(path), content)?;
    }

    let manifest = DiffManifest {
        created: now.to_rfc3339_opts(SecondsFormat::Millis, false),
        modified_files_directory: directory.clone(),
        modified_files: to_owned(changes.sorted_modified_paths()),
        removed_files: to_owned(changes.sorted_removed_files()),
        removed_directories: to_owned(changes.sorted_removed_dirs()),
    };

    let manifest_path = kind.manifest_path(root);
    let tmp_path = bundle_dir.join(format!("{}.tmp", kind.manifest_name()));
    write_file(&tmp_path, manifest.to_toml().as_bytes())?;
    fs::rename(&tmp_path, &manifest_path).map_err(|e| io_err("write", &manifest_path, e))?;

    remove_stale_data_dirs(&bundle_dir, &directory);

    log::debug!(
        "Saved {} ({} files) to {}",
        kind.name(),
        manifest.modified_files.len(),
        bundle_dir.display()
    );
    Ok(())
}

/// Reads the manifest of a bundle without loading file contents.
///
/// Returns `None` if there is no complete bundle of `kind`.
pub fn read_manifest(root: &Path, kind: DiffKind) -> Result<Option<DiffManifest>> {
    let manifest_path = kind.manifest_path(root);
    let content = match fs::read_to_string(&manifest_path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(io_err("read", &manifest_path, e)),
    };

    DiffManifest::parse(&content, &manifest_path).map(Some)
}

/// Loads a bundle back into a change set.
///
/// Returns `None` if there is no complete bundle of `kind`.
pub fn load_diff(root: &Path, kind: DiffKind) -> Result<Option<ChangeSet>> {
    let Some(manifest) = read_manifest(root, kind)? else {
        return Ok(None);
    };

    let manifest_path = kind.manifest_path(root);
    let data_dir = kind.dir(root).join(&manifest.modified_files_directory);
    if !data_dir.is_dir() {
        return Err(FsError::CorruptDiffBundle {
            path: manifest_path,
            reason: format!("directory '{}' is missing", data_dir.display()),
        });
    }

    let mut modified = HashMap::new();
    for path in &manifest.modified_files {
        let file = data_dir.join(path);
        let content = fs::read(&file).map_err(|e| FsError::CorruptDiffBundle {
            path: manifest_path.clone(),
            reason: format!("cannot read '{}': {}", file.display(), e),
        })?;
        modified.insert(path.clone(), content);
    }

    let removed_files: HashSet<String> = manifest.removed_files.into_iter().collect();
    let removed_dirs: HashSet<String> = manifest.removed_directories.into_iter().collect();

    log::info!(
        "Loaded {} from {} ({} modified, {} removed files, {} removed directories)",
        kind.name(),
        manifest.created,
        modified.len(),
        removed_files.len(),
        removed_dirs.len()
    );
    Ok(Some(ChangeSet::from_parts(modified, removed_files, removed_dirs)))
}

/// Removes a bundle: the manifest first, then the whole directory.
pub fn remove_diff(root: &Path, kind: DiffKind) -> Result<()> {
    let manifest_path = kind.manifest_path(root);
    match fs::remove_file(&manifest_path) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(io_err("remove", &manifest_path, e)),
    }
    remove_dir_if_exists(&kind.dir(root))
}

fn unique_dir_name(bundle_dir: &Path, base: &str) -> String {
    let mut name = base.to_string();
    let mut n = 1;
    while bundle_dir.join(&name).exists() {
        name = format!("{}-{}", base, n);
        n += 1;
    }
    name
}

/// Removes every data directory of the bundle except `keep`.
///
/// Failures are logged only, the new bundle is complete already.
fn remove_stale_data_dirs(bundle_dir: &Path, keep: &str) {
    let Ok(entries) = fs::read_dir(bundle_dir) else {
        return;
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_dir() || entry.file_name().to_string_lossy() == keep {
            continue;
        }
        if let Err(e) = fs::remove_dir_all(&path) {
            log::warn!("Could not remove old bundle data {}: {}", path.display(), e);
        }
    }
}

fn to_owned(paths: Vec<&str>) -> Vec<String> {
    paths.into_iter().map(str::to_string).collect()
}
