//! Error types for txfs.
//!
//! All operations return `Result<T>` which aliases `Result<T, FsError>`.

use crate::fs::lock::LockStatus;
use std::path::PathBuf;
use thiserror::Error;

/// Errors from transactional file system operations.
#[derive(Debug, Error)]
pub enum FsError {
    /// File does not exist in the logical view.
    #[error("File '{0}' does not exist")]
    NotFound(PathBuf),

    /// Relative path resolves outside the file system root.
    #[error("Path '{0}' is outside the file system root")]
    SandboxViolation(String),

    /// Relative path is not usable for the requested operation.
    #[error("Invalid path '{0}': {1}")]
    InvalidPath(String, String),

    /// Directory is locked by someone else.
    #[error("Directory '{}' is locked by {user} ({status:?})", path.display())]
    LockUnavailable {
        path: PathBuf,
        status: LockStatus,
        user: String,
    },

    /// Mutating disk operation on a read-only file system.
    #[error("File system '{0}' is read-only")]
    ReadOnly(PathBuf),

    /// Backup or autosave bundle references data that is missing.
    #[error("Corrupt diff bundle '{}': {reason}", path.display())]
    CorruptDiffBundle { path: PathBuf, reason: String },

    /// ZIP archive could not be read or written.
    #[error("Archive error: {0}")]
    Archive(String),

    /// Restore policy or lock handler aborted the operation.
    #[error("Operation cancelled")]
    Cancelled,

    /// File system operation failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Manifest parse error.
    #[error("Manifest error: {0}")]
    Manifest(#[from] toml_edit::TomlError),

    /// Unexpected error.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<zip::result::ZipError> for FsError {
    fn from(err: zip::result::ZipError) -> Self {
        Self::Archive(err.to_string())
    }
}

/// Result type alias for txfs operations.
pub type Result<T> = std::result::Result<T, FsError>;

/// Wraps an I/O error with the path it occurred on.
pub(crate) fn io_err(action: &str, path: &std::path::Path, e: std::io::Error) -> FsError {
    FsError::Io(std::io::Error::new(
        e.kind(),
        format!("Failed to {} {}: {}", action, path.display(), e),
    ))
}
