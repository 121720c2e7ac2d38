//! Canned policies for restoring an autosave on open.
//!
//! A policy receives the root directory and returns whether to replay the
//! `.autosave` bundle found there. Returning an error aborts the open.
//!
//! ```no_run
//! # use txfs::fs::{restore, TransactionalFileSystem};
//! # fn example() -> txfs::Result<()> {
//! let fs = TransactionalFileSystem::open_rw("project", restore::always)?;
//! if fs.is_restored_from_autosave() {
//!     println!("Recovered unsaved changes");
//! }
//! # Ok(())
//! # }
//! ```

use crate::error::{FsError, Result};

use std::path::Path;

/// Ignores the autosave (it is deleted once the file system is dropped).
pub fn never(_root: &Path) -> Result<bool> {
    Ok(false)
}

/// Replays the autosave.
pub fn always(root: &Path) -> Result<bool> {
    log::info!("Restoring autosave of {}", root.display());
    Ok(true)
}

/// Refuses to open a directory that has an autosave.
pub fn abort(root: &Path) -> Result<bool> {
    log::info!("Autosave found in {}, aborting", root.display());
    Err(FsError::Cancelled)
}
