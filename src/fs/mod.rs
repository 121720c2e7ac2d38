//! Transactional file system.
//!
//! Reads and writes go to an in-memory change set layered over a directory
//! on disk. Nothing touches the real files until [`TransactionalFileSystem::save`]
//! commits the change set, protected by a backup bundle so an interrupted
//! save is replayed on the next open.

pub mod archive;
pub mod changes;
pub mod commit;
pub mod diff;
pub mod directory;
pub mod filesystem;
pub mod lock;
pub mod path;
pub mod restore;

pub use changes::{ChangeSet, ChangeStats};
pub use diff::DiffKind;
pub use directory::TransactionalDirectory;
pub use filesystem::TransactionalFileSystem;
pub use lock::{DirectoryLock, LockStatus};

use crate::error::{Result, io_err};

use std::fs;
use std::io;
use std::path::Path;

/// Writes `content` to `path`, creating parent directories.
pub(crate) fn write_file(path: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| io_err("create directory", parent, e))?;
    }
    fs::write(path, content).map_err(|e| io_err("write", path, e))
}

/// Removes a directory tree; a missing directory is not an error.
pub(crate) fn remove_dir_if_exists(path: &Path) -> Result<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(io_err("remove directory", path, e)),
    }
}
