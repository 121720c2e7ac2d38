//! A view of one directory of a shared [`TransactionalFileSystem`].
//!
//! Several views can share one file system, e.g. one per library element.
//! Each view prefixes every path with its own directory and can't reach
//! above it.

use crate::error::{FsError, Result};

use super::diff::DiffKind;
use super::filesystem::TransactionalFileSystem;
use super::lock::LOCK_FILE_NAME;
use super::path::{clean_path, dir_prefix, is_contained};

use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use tempfile::TempDir;

/// A file system shared between several [`TransactionalDirectory`] views.
pub type SharedFileSystem = Rc<RefCell<TransactionalFileSystem>>;

#[derive(Debug, Clone)]
pub struct TransactionalDirectory {
    fs: SharedFileSystem,
    path: String,
    /// Keeps the backing directory of [`new`](Self::new) alive.
    _temp: Option<Rc<TempDir>>,
}

impl TransactionalDirectory {
    /// Creates an empty view backed by a fresh temporary directory.
    ///
    /// Useful to assemble content in memory before copying it elsewhere.
    pub fn new() -> Result<Self> {
        let temp = TempDir::new()?;
        let fs = TransactionalFileSystem::open_ro(temp.path())?;
        Ok(Self {
            fs: Rc::new(RefCell::new(fs)),
            path: String::new(),
            _temp: Some(Rc::new(temp)),
        })
    }

    /// Creates a view of `path` within `fs`.
    pub fn with_fs(fs: SharedFileSystem, path: &str) -> Self {
        Self {
            fs,
            path: clean_path(path),
            _temp: None,
        }
    }

    /// Creates a view of a sub-directory of this view.
    pub fn subdir(&self, path: &str) -> Self {
        Self {
            fs: Rc::clone(&self.fs),
            path: clean_path(&format!("{}{}", dir_prefix(&self.path), path)),
            _temp: self._temp.clone(),
        }
    }

    pub fn file_system(&self) -> &SharedFileSystem {
        &self.fs
    }

    /// Path of this view, relative to the file system root.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn abs_path(&self, path: &str) -> Option<PathBuf> {
        let full = self.full_path(path).ok()?;
        self.fs.borrow().abs_path(&full)
    }

    pub fn get_dirs(&self, path: &str) -> Vec<String> {
        match self.full_path(path) {
            Ok(full) => self.fs.borrow().get_dirs(&full),
            Err(_) => Vec::new(),
        }
    }

    pub fn get_files(&self, path: &str) -> Vec<String> {
        match self.full_path(path) {
            Ok(full) => self.fs.borrow().get_files(&full),
            Err(_) => Vec::new(),
        }
    }

    pub fn file_exists(&self, path: &str) -> bool {
        match self.full_path(path) {
            Ok(full) => self.fs.borrow().file_exists(&full),
            Err(_) => false,
        }
    }

    pub fn read(&self, path: &str) -> Result<Vec<u8>> {
        let full = self.full_path(path)?;
        self.fs.borrow().read(&full)
    }

    pub fn read_if_exists(&self, path: &str) -> Result<Option<Vec<u8>>> {
        let full = self.full_path(path)?;
        self.fs.borrow().read_if_exists(&full)
    }

    pub fn write(&self, path: &str, content: impl Into<Vec<u8>>) -> Result<()> {
        let full = self.full_path(path)?;
        self.fs.borrow_mut().write(&full, content)
    }

    pub fn remove_file(&self, path: &str) -> Result<()> {
        let full = self.full_path(path)?;
        self.fs.borrow_mut().remove_file(&full)
    }

    pub fn remove_dir_recursively(&self, path: &str) -> Result<()> {
        let full = self.full_path(path)?;
        self.fs.borrow_mut().remove_dir_recursively(&full)
    }

    /// Copies every file of this view into `dest`.
    ///
    /// Lock files and the bundles of a root view are not copied. `dest` may
    /// share the file system with this view.
    pub fn copy_to(&self, dest: &TransactionalDirectory) -> Result<()> {
        let mut files = Vec::new();
        self.collect_files("", &mut files)?;

        log::debug!(
            "Copying {} files from '{}' to '{}'",
            files.len(),
            self.path,
            dest.path
        );
        for (path, content) in files {
            dest.write(&path, content)?;
        }
        Ok(())
    }

    /// Copies this view into `dest`, then makes this view point to `dest`.
    pub fn save_to(&mut self, dest: &TransactionalDirectory) -> Result<()> {
        self.copy_to(dest)?;
        self.repoint(dest);
        Ok(())
    }

    /// Moves this view's files into `dest`, then makes this view point to
    /// `dest`.
    ///
    /// Fails with `InvalidPath` if `dest` is this view's directory or lies
    /// inside it, as removing the source would remove the copy too.
    pub fn move_to(&mut self, dest: &TransactionalDirectory) -> Result<()> {
        let same_fs = Rc::ptr_eq(&self.fs, &dest.fs);
        if same_fs && format!("{}/", dest.path).starts_with(&dir_prefix(&self.path)) {
            return Err(FsError::InvalidPath(
                dest.path.clone(),
                format!("destination lies inside '{}'", self.path),
            ));
        }

        self.copy_to(dest)?;
        self.fs.borrow_mut().remove_dir_recursively(&self.path)?;
        self.repoint(dest);
        Ok(())
    }

    fn repoint(&mut self, dest: &TransactionalDirectory) {
        self.fs = Rc::clone(&dest.fs);
        self.path = dest.path.clone();
        self._temp = dest._temp.clone();
    }

    fn collect_files(&self, dir: &str, files: &mut Vec<(String, Vec<u8>)>) -> Result<()> {
        let prefix = dir_prefix(dir);
        let at_root = self.path.is_empty() && dir.is_empty();
        for name in self.get_files(dir) {
            if name == LOCK_FILE_NAME {
                continue;
            }
            let path = format!("{}{}", prefix, name);
            let content = self.read(&path)?;
            files.push((path, content));
        }
        for name in self.get_dirs(dir) {
            if at_root && [DiffKind::Backup, DiffKind::Autosave].iter().any(|k| name == k.dir_name()) {
                continue;
            }
            self.collect_files(&format!("{}{}", prefix, name), files)?;
        }
        Ok(())
    }

    /// Prefixes `path` with this view's directory.
    fn full_path(&self, path: &str) -> Result<String> {
        let cleaned = clean_path(path);
        if !is_contained(&cleaned) {
            return Err(FsError::SandboxViolation(path.to_string()));
        }
        Ok(clean_path(&format!("{}{}", dir_prefix(&self.path), cleaned)))
    }
}
