//! Committing staged changes to disk.
//!
//! ## Save Phases
//!
//! 1. **Backup**: the change set is written to `.backup`
//! 2. **Autosave cleanup**: `.autosave` is obsolete once a backup exists
//! 3. **Removals**: removed directories, then removed files
//! 4. **Writes**: modified files, skipping those whose content is unchanged
//! 5. **Backup cleanup**: `.backup` is removed and the change set cleared
//!
//! If phase 3 or 4 fails, the change set and `.backup` stay in place. The
//! next open replays the backup, so the save can simply be retried.

use crate::error::{FsError, Result, io_err};

use super::diff::{self, DiffKind};
use super::filesystem::TransactionalFileSystem;
use super::lock::LOCK_FILE_NAME;
use super::write_file;

use std::fs;

impl TransactionalFileSystem {
    /// Writes the staged changes to `.autosave` without touching real files.
    pub fn autosave(&self) -> Result<()> {
        self.ensure_writable()?;
        diff::save_diff(&self.root, &self.changes, DiffKind::Autosave)?;
        log::debug!("Autosaved {}", self.root.display());
        Ok(())
    }

    /// Commits every staged change to disk.
    ///
    /// ## Errors
    /// - `ReadOnly` if the file system isn't writable or the lock was released
    /// - `Io` if a file can't be removed or written (the backup is kept)
    pub fn save(&mut self) -> Result<()> {
        self.ensure_writable()?;
        let stats = self.changes.stats();

        diff::save_diff(&self.root, &self.changes, DiffKind::Backup)?;
        self.restored_from_autosave = false;
        diff::remove_diff(&self.root, DiffKind::Autosave)?;

        self.apply_removals()?;
        self.apply_writes()?;

        diff::remove_diff(&self.root, DiffKind::Backup)?;
        self.changes.clear();

        log::info!(
            "Saved {}: {} written, {} files and {} directories removed",
            self.root.display(),
            stats.modified_files,
            stats.removed_files,
            stats.removed_dirs
        );
        Ok(())
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.writable && self.lock.is_locked() {
            Ok(())
        } else {
            Err(FsError::ReadOnly(self.root.clone()))
        }
    }

    fn apply_removals(&self) -> Result<()> {
        for dir in self.changes.sorted_removed_dirs() {
            if dir.is_empty() {
                self.clear_root()?;
                continue;
            }

            let path = self.disk_path(dir);
            if path.is_dir() {
                log::debug!("Removing directory: {}", path.display());
                fs::remove_dir_all(&path).map_err(|e| io_err("remove directory", &path, e))?;
            }
        }

        for file in self.changes.sorted_removed_files() {
            let path = self.disk_path(file);
            if path.is_file() {
                log::debug!("Removing file: {}", path.display());
                fs::remove_file(&path).map_err(|e| io_err("remove file", &path, e))?;
            }
        }

        Ok(())
    }

    fn apply_writes(&self) -> Result<()> {
        for (file, content) in self.changes.modified_files() {
            if self.matches_disk(file, content)? {
                log::debug!("Unchanged, skipping: {}", file);
                continue;
            }

            log::debug!("Writing file: {}", file);
            write_file(&self.disk_path(file), content)?;
        }
        Ok(())
    }

    /// Removes everything in the root except the lock and the backup that
    /// protects this save.
    fn clear_root(&self) -> Result<()> {
        let entries = fs::read_dir(&self.root).map_err(|e| io_err("read directory", &self.root, e))?;

        for entry in entries {
            let entry = entry.map_err(|e| io_err("read directory", &self.root, e))?;
            let name = entry.file_name();
            if name == LOCK_FILE_NAME || name == DiffKind::Backup.dir_name() {
                continue;
            }

            let path = entry.path();
            log::debug!("Removing: {}", path.display());
            let result = if path.is_dir() {
                fs::remove_dir_all(&path)
            } else {
                fs::remove_file(&path)
            };
            result.map_err(|e| io_err("remove", &path, e))?;
        }
        Ok(())
    }
}
