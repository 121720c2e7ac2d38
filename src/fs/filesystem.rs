//! The transactional file system facade.
//!
//! ## Logical View
//!
//! Every query merges three layers, first match wins:
//!
//! 1. Staged writes
//! 2. Staged removals (files, or anything below a removed directory)
//! 3. Files on disk under the root
//!
//! ## Lifecycle
//!
//! 1. **Open**: replay an interrupted save from `.backup`, lock the root when
//!    writable, then ask the restore policy about `.autosave`
//! 2. **Stage**: `write()`, `remove_file()` etc. only touch memory
//! 3. **Commit**: `save()` (see [`commit`](super::commit)), or
//!    `discard_changes()`
//! 4. **Drop**: removes `.autosave` and releases the lock
//!
//! ## Example
//!
//! ```no_run
//! # use txfs::fs::{restore, TransactionalFileSystem};
//! # fn example() -> txfs::Result<()> {
//! let mut fs = TransactionalFileSystem::open_rw("library", restore::never)?;
//!
//! fs.write("sym/resistor.toml", b"name = \"R\"".to_vec())?;
//! fs.remove_dir_recursively("sym/obsolete")?;
//! assert!(fs.file_exists("sym/resistor.toml"));
//!
//! fs.save()?;
//! # Ok(())
//! # }
//! ```

use crate::error::{FsError, Result, io_err};

use super::changes::ChangeSet;
use super::diff::{self, DiffKind};
use super::lock::DirectoryLock;
use super::path::{clean_path, dir_prefix, is_contained};

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// A directory whose modifications are staged in memory until saved.
///
/// Writable instances hold the directory's [`DirectoryLock`] for their whole
/// lifetime, so at most one writable instance per root exists at a time.
#[derive(Debug)]
pub struct TransactionalFileSystem {
    pub(super) root: PathBuf,
    pub(super) writable: bool,
    pub(super) lock: DirectoryLock,
    pub(super) changes: ChangeSet,
    pub(super) restored_from_autosave: bool,
}

impl TransactionalFileSystem {
    /// Opens the directory `root`.
    ///
    /// `restore` is only called if an autosave bundle exists; it decides
    /// whether the autosave is replayed. See [`restore`](super::restore) for
    /// ready-made policies.
    ///
    /// ## Errors
    /// - `LockUnavailable` if `writable` and another instance holds the lock
    /// - `CorruptDiffBundle`/`Manifest` if a backup or autosave can't be read
    /// - whatever `restore` returns
    pub fn open<F>(root: impl AsRef<Path>, writable: bool, restore: F) -> Result<Self>
    where
        F: FnOnce(&Path) -> Result<bool>,
    {
        let root = std::path::absolute(root.as_ref())
            .map_err(|e| io_err("resolve", root.as_ref(), e))?;

        let mut changes = ChangeSet::new();
        if let Some(backup) = diff::load_diff(&root, DiffKind::Backup)? {
            log::info!("Restoring interrupted save of {}", root.display());
            changes = backup;
        }

        let mut lock = DirectoryLock::new(&root);
        if writable {
            fs::create_dir_all(&root).map_err(|e| io_err("create directory", &root, e))?;
            lock.try_lock(None)?;
        }

        let mut restored_from_autosave = false;
        if DiffKind::Autosave.exists(&root) && restore(&root)? {
            if let Some(autosave) = diff::load_diff(&root, DiffKind::Autosave)? {
                log::info!("Restored autosave of {}", root.display());
                changes = autosave;
                restored_from_autosave = true;
            }
        }

        log::debug!(
            "Opened {} ({})",
            root.display(),
            if writable { "read-write" } else { "read-only" }
        );

        Ok(Self {
            root,
            writable,
            lock,
            changes,
            restored_from_autosave,
        })
    }

    /// Opens `root` read-only, ignoring any autosave.
    pub fn open_ro(root: impl AsRef<Path>) -> Result<Self> {
        Self::open(root, false, super::restore::never)
    }

    /// Opens `root` for writing.
    pub fn open_rw<F>(root: impl AsRef<Path>, restore: F) -> Result<Self>
    where
        F: FnOnce(&Path) -> Result<bool>,
    {
        Self::open(root, true, restore)
    }

    /// Absolute root directory.
    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }

    pub fn is_restored_from_autosave(&self) -> bool {
        self.restored_from_autosave
    }

    /// Staged, unsaved changes.
    pub fn changes(&self) -> &ChangeSet {
        &self.changes
    }

    /// Absolute path of `path`, or `None` if it lies outside the root.
    pub fn abs_path(&self, path: &str) -> Option<PathBuf> {
        super::path::resolve(&self.root, path)
    }

    /// Sorted names of the directories in `dir`.
    ///
    /// Hidden directories are included. A path outside the root has no
    /// children.
    pub fn get_dirs(&self, dir: &str) -> Vec<String> {
        let Ok(cleaned) = self.validate(dir) else {
            return Vec::new();
        };
        let prefix = dir_prefix(&cleaned);

        let mut names: BTreeSet<String> = disk_entries(&self.disk_path(&cleaned), true)
            .into_iter()
            .filter(|name| !self.changes.is_removed(&format!("{}{}/", prefix, name)))
            .collect();
        names.extend(self.changes.child_dirs(&prefix).into_iter().map(str::to_string));
        names.into_iter().collect()
    }

    /// Sorted names of the files in `dir`.
    ///
    /// Hidden files are included. A path outside the root has no children.
    pub fn get_files(&self, dir: &str) -> Vec<String> {
        let Ok(cleaned) = self.validate(dir) else {
            return Vec::new();
        };
        let prefix = dir_prefix(&cleaned);

        let mut names: BTreeSet<String> = disk_entries(&self.disk_path(&cleaned), false)
            .into_iter()
            .filter(|name| !self.changes.is_removed(&format!("{}{}", prefix, name)))
            .collect();
        names.extend(self.changes.child_files(&prefix).into_iter().map(str::to_string));
        names.into_iter().collect()
    }

    pub fn file_exists(&self, path: &str) -> bool {
        let Ok(cleaned) = self.validate(path) else {
            return false;
        };
        if self.changes.modified(&cleaned).is_some() {
            true
        } else if self.changes.is_removed(&cleaned) {
            false
        } else {
            !cleaned.is_empty() && self.disk_path(&cleaned).is_file()
        }
    }

    /// Reads a file from the logical view.
    ///
    /// ## Errors
    /// - `SandboxViolation` if `path` leaves the root
    /// - `NotFound` if the file doesn't exist
    pub fn read(&self, path: &str) -> Result<Vec<u8>> {
        self.read_if_exists(path)?
            .ok_or_else(|| FsError::NotFound(self.root.join(clean_path(path))))
    }

    /// Like [`read`](Self::read), but a missing file is `Ok(None)`.
    pub fn read_if_exists(&self, path: &str) -> Result<Option<Vec<u8>>> {
        let cleaned = self.validate(path)?;
        if let Some(content) = self.changes.modified(&cleaned) {
            return Ok(Some(content.to_vec()));
        }
        if cleaned.is_empty() || self.changes.is_removed(&cleaned) {
            return Ok(None);
        }

        let file = self.disk_path(&cleaned);
        match fs::read(&file) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(_) if file.is_dir() => Ok(None),
            Err(e) => Err(io_err("read", &file, e)),
        }
    }

    /// Stages `content` for `path`.
    pub fn write(&mut self, path: &str, content: impl Into<Vec<u8>>) -> Result<()> {
        let cleaned = self.validate(path)?;
        if cleaned.is_empty() {
            return Err(FsError::InvalidPath(
                path.to_string(),
                "not a file path".to_string(),
            ));
        }

        log::debug!("Staged write: {}", cleaned);
        self.changes.write(&cleaned, content.into());
        Ok(())
    }

    /// Stages removal of the file `path`.
    pub fn remove_file(&mut self, path: &str) -> Result<()> {
        let cleaned = self.validate(path)?;
        if cleaned.is_empty() {
            return Err(FsError::InvalidPath(
                path.to_string(),
                "not a file path".to_string(),
            ));
        }

        log::debug!("Staged removal: {}", cleaned);
        self.changes.remove_file(&cleaned);
        Ok(())
    }

    /// Stages recursive removal of `dir`. An empty path removes everything.
    pub fn remove_dir_recursively(&mut self, dir: &str) -> Result<()> {
        let cleaned = self.validate(dir)?;
        log::debug!("Staged directory removal: '{}'", cleaned);
        self.changes.remove_dir(&cleaned);
        Ok(())
    }

    /// Stages a rename by writing the content to `to` and removing `from`.
    pub fn rename_file(&mut self, from: &str, to: &str) -> Result<()> {
        let content = self.read(from)?;
        self.validate(to)?;
        self.write(to, content)?;
        if clean_path(from) != clean_path(to) {
            self.remove_file(from)?;
        }
        Ok(())
    }

    /// Drops every staged change.
    pub fn discard_changes(&mut self) {
        if !self.changes.is_empty() {
            log::debug!("Discarding {} staged changes", self.changes.stats().total());
        }
        self.changes.clear();
    }

    /// Lists the staged changes that would actually alter the disk.
    ///
    /// Removed directories and files are listed if they still exist, written
    /// files if their content differs from (or is missing on) disk. Sorted.
    pub fn check_for_modifications(&self) -> Result<Vec<String>> {
        let mut modifications = Vec::new();

        for dir in self.changes.sorted_removed_dirs() {
            if self.disk_path(dir).is_dir() {
                modifications.push(dir.to_string());
            }
        }

        for path in self.changes.sorted_removed_files() {
            if self.disk_path(path).is_file() {
                modifications.push(path.to_string());
            }
        }

        for (path, content) in self.changes.modified_files() {
            if !self.matches_disk(path, content)? {
                modifications.push(path.to_string());
            }
        }

        modifications.sort();
        Ok(modifications)
    }

    /// Releases the lock early. The file system is read-only afterwards.
    pub fn release_lock(&mut self) -> Result<()> {
        self.lock.unlock_if_locked()?;
        self.writable = false;
        Ok(())
    }

    /// Cleans `path` and rejects paths outside the root.
    pub(super) fn validate(&self, path: &str) -> Result<String> {
        let cleaned = clean_path(path);
        if is_contained(&cleaned) {
            Ok(cleaned)
        } else {
            log::debug!("Rejected path outside of {}: {}", self.root.display(), path);
            Err(FsError::SandboxViolation(path.to_string()))
        }
    }

    /// Disk location of an already validated path.
    pub(super) fn disk_path(&self, cleaned: &str) -> PathBuf {
        if cleaned.is_empty() {
            self.root.clone()
        } else {
            self.root.join(cleaned.trim_end_matches('/'))
        }
    }

    /// Returns true if the file on disk has exactly `content`.
    pub(super) fn matches_disk(&self, cleaned: &str, content: &[u8]) -> Result<bool> {
        let file = self.disk_path(cleaned);
        if !file.is_file() {
            return Ok(false);
        }
        let existing = fs::read(&file).map_err(|e| io_err("read", &file, e))?;
        Ok(existing == content)
    }
}

impl Drop for TransactionalFileSystem {
    fn drop(&mut self) {
        // A restored autosave stays until saved, in case we crash again.
        if self.writable && !self.restored_from_autosave {
            if let Err(e) = diff::remove_diff(&self.root, DiffKind::Autosave) {
                log::warn!("Could not remove autosave of {}: {}", self.root.display(), e);
            }
        }
    }
}

/// Names of the directories (or files) in `dir`, hidden ones included.
fn disk_entries(dir: &Path, dirs: bool) -> Vec<String> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };

    entries
        .flatten()
        .filter(|entry| {
            let path = entry.path();
            if dirs { path.is_dir() } else { path.is_file() }
        })
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect()
}
