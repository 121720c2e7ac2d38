//! Advisory, file-based directory locks.
//!
//! Locking a directory creates `<dir>/.lock`, a UTF-8 text file with six
//! lines:
//!
//! ```text
//! Homer Simpson
//! homer
//! homer-workstation
//! 1234
//! txfs
//! 2026-10-17T12:43:52Z
//! ```
//!
//! (full user name, user name, host name, process id, process name, lock
//! time in UTC). The content lets a later session tell a live lock from one
//! left behind by a crashed process.
//!
//! The lock is cooperative: only processes that honor `.lock` are excluded.

use crate::error::{FsError, Result, io_err};

use chrono::{SecondsFormat, Utc};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Name of the lock file placed in the locked directory.
pub const LOCK_FILE_NAME: &str = ".lock";

/// Lock state of a directory, as seen from this process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockStatus {
    /// No lock file exists.
    Unlocked,
    /// Locked by a process of this user on this host that is no longer running.
    StaleLock,
    /// Locked by this [`DirectoryLock`] object.
    LockedByThisApp,
    /// Locked by another running process on this host.
    LockedByOtherApp,
    /// Locked by another user or host.
    LockedByOtherUser,
    /// Locked by something we can't identify (may be stale).
    LockedByUnknownApp,
}

/// Decides whether a foreign lock may be overridden.
///
/// Receives the locked directory, its status and the user holding it.
/// Returning `Err` aborts locking.
pub type LockHandler<'a> = &'a dyn Fn(&Path, LockStatus, &str) -> Result<bool>;

/// Identity recorded in a lock file.
#[derive(Debug, Clone, PartialEq, Eq)]
struct LockOwner {
    full_name: String,
    user: String,
    host: String,
    pid: u32,
    process_name: String,
    locked_at: String,
}

impl LockOwner {
    fn current() -> Self {
        let user = current_user();
        Self {
            full_name: current_full_name().unwrap_or_else(|| user.clone()),
            user,
            host: current_host(),
            pid: std::process::id(),
            process_name: current_process_name(),
            locked_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }

    fn parse(content: &str) -> Option<Self> {
        let lines: Vec<&str> = content.split('\n').map(|l| l.trim_end_matches('\r')).collect();
        if lines.len() < 6 {
            return None;
        }

        Some(Self {
            full_name: lines[0].to_string(),
            user: lines[1].to_string(),
            host: lines[2].to_string(),
            pid: lines[3].trim().parse().ok()?,
            process_name: lines[4].to_string(),
            locked_at: lines[5].to_string(),
        })
    }

    fn to_content(&self) -> String {
        [
            self.full_name.as_str(),
            self.user.as_str(),
            self.host.as_str(),
            &self.pid.to_string(),
            self.process_name.as_str(),
            self.locked_at.as_str(),
        ]
        .join("\n")
    }

    fn display_name(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }
}

/// A lock on one directory.
///
/// Released on drop if this object holds it.
#[derive(Debug)]
pub struct DirectoryLock {
    dir: PathBuf,
    lock_file: PathBuf,
    locked: bool,
}

impl DirectoryLock {
    /// Creates an (unlocked) lock object for `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let lock_file = dir.join(LOCK_FILE_NAME);
        Self {
            dir,
            lock_file,
            locked: false,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn lock_file_path(&self) -> &Path {
        &self.lock_file
    }

    /// Returns true if this object currently holds the lock.
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Reads the current lock status of the directory.
    pub fn status(&self) -> Result<LockStatus> {
        self.status_with_user().map(|(status, _)| status)
    }

    /// Like [`status`](Self::status), also returning who holds the lock.
    pub fn status_with_user(&self) -> Result<(LockStatus, String)> {
        self.inspect().map(|(status, user, _)| (status, user))
    }

    /// Status, holder and raw content of the lock file.
    fn inspect(&self) -> Result<(LockStatus, String, Vec<u8>)> {
        let bytes = match fs::read(&self.lock_file) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Ok((LockStatus::Unlocked, String::new(), Vec::new()));
            }
            Err(e) => return Err(io_err("read lock file", &self.lock_file, e)),
        };

        let Some(owner) = LockOwner::parse(&String::from_utf8_lossy(&bytes)) else {
            log::warn!("Unrecognized lock file: {}", self.lock_file.display());
            return Ok((LockStatus::LockedByUnknownApp, "unknown".to_string(), bytes));
        };

        let me = LockOwner::current();
        let status = if owner.user != me.user || owner.host != me.host {
            LockStatus::LockedByOtherUser
        } else if owner.pid == me.pid {
            if self.locked {
                LockStatus::LockedByThisApp
            } else {
                LockStatus::LockedByUnknownApp
            }
        } else if is_process_running(owner.pid, &owner.process_name) {
            LockStatus::LockedByOtherApp
        } else {
            LockStatus::StaleLock
        };

        Ok((status, owner.display_name(), bytes))
    }

    /// Acquires the lock unless someone else holds it.
    ///
    /// - `Unlocked`: creates the lock file
    /// - `StaleLock`: replaces the stale lock file
    /// - `LockedByThisApp`: nothing to do
    /// - otherwise: asks `handler`; fails with `LockUnavailable` if there is
    ///   no handler or it declines
    ///
    /// Both creating and replacing go through `create_new`, so of two
    /// processes racing for the same directory only one gets the lock.
    pub fn try_lock(&mut self, handler: Option<LockHandler<'_>>) -> Result<()> {
        let (status, user, content) = self.inspect()?;
        match status {
            LockStatus::Unlocked => self.create_lock_file(),
            LockStatus::StaleLock => {
                log::info!("Overriding stale lock: {}", self.lock_file.display());
                self.remove_stale_lock_file(&content)?;
                self.create_lock_file()
            }
            LockStatus::LockedByThisApp => Ok(()),
            _ => {
                let overridden = match handler {
                    Some(handler) => handler(&self.dir, status, &user)?,
                    None => false,
                };
                if overridden {
                    log::warn!(
                        "Overriding lock of {} held by {}",
                        self.dir.display(),
                        user
                    );
                    self.lock()
                } else {
                    Err(FsError::LockUnavailable {
                        path: self.dir.clone(),
                        status,
                        user,
                    })
                }
            }
        }
    }

    /// Writes the lock file, overwriting any existing one.
    pub fn lock(&mut self) -> Result<()> {
        fs::write(&self.lock_file, LockOwner::current().to_content())
            .map_err(|e| io_err("write lock file", &self.lock_file, e))?;
        self.locked = true;
        log::debug!("Locked: {}", self.dir.display());
        Ok(())
    }

    /// Removes the lock file, whoever created it.
    pub fn unlock(&mut self) -> Result<()> {
        match fs::remove_file(&self.lock_file) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(io_err("remove lock file", &self.lock_file, e)),
        }
        self.locked = false;
        log::debug!("Unlocked: {}", self.dir.display());
        Ok(())
    }

    /// Unlocks only if this object holds the lock.
    pub fn unlock_if_locked(&mut self) -> Result<bool> {
        if self.locked {
            self.unlock()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Removes the lock file if it still has the stale `content`.
    ///
    /// Another process may have replaced it since it was inspected; that
    /// lock is left alone and the following `create_new` fails.
    fn remove_stale_lock_file(&self, content: &[u8]) -> Result<()> {
        let current = match fs::read(&self.lock_file) {
            Ok(current) => current,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(io_err("read lock file", &self.lock_file, e)),
        };
        if current != content {
            return Ok(());
        }

        match fs::remove_file(&self.lock_file) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_err("remove lock file", &self.lock_file, e)),
        }
    }

    /// Creates the lock file atomically so two racing processes can't both win.
    fn create_lock_file(&mut self) -> Result<()> {
        let content = LockOwner::current().to_content();
        let mut file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.lock_file)
        {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(FsError::LockUnavailable {
                    path: self.dir.clone(),
                    status: LockStatus::LockedByUnknownApp,
                    user: "unknown".to_string(),
                });
            }
            Err(e) => return Err(io_err("create lock file", &self.lock_file, e)),
        };

        if let Err(e) = file.write_all(content.as_bytes()) {
            let _ = fs::remove_file(&self.lock_file);
            return Err(io_err("write lock file", &self.lock_file, e));
        }

        self.locked = true;
        log::debug!("Locked: {}", self.dir.display());
        Ok(())
    }
}

impl Drop for DirectoryLock {
    fn drop(&mut self) {
        if let Err(e) = self.unlock_if_locked() {
            log::warn!("Could not release lock {}: {}", self.lock_file.display(), e);
        }
    }
}

fn current_user() -> String {
    ["USER", "USERNAME", "LOGNAME"]
        .iter()
        .find_map(|key| std::env::var(key).ok().filter(|v| !v.is_empty()))
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(unix)]
fn current_full_name() -> Option<String> {
    let user = current_user();
    let passwd = fs::read_to_string("/etc/passwd").ok()?;
    passwd
        .lines()
        .map(|line| line.split(':').collect::<Vec<_>>())
        .find(|fields| fields.first() == Some(&user.as_str()))
        .and_then(|fields| fields.get(4).map(|gecos| gecos.split(',').next().unwrap_or("")))
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

#[cfg(not(unix))]
fn current_full_name() -> Option<String> {
    None
}

fn current_host() -> String {
    ["HOSTNAME", "COMPUTERNAME"]
        .iter()
        .find_map(|key| std::env::var(key).ok())
        .or_else(|| fs::read_to_string("/etc/hostname").ok())
        .map(|host| host.trim().to_string())
        .filter(|host| !host.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}

fn current_process_name() -> String {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.file_stem().map(|s| s.to_string_lossy().into_owned()))
        .unwrap_or_else(|| env!("CARGO_PKG_NAME").to_string())
}

/// Checks whether `pid` is alive and still runs a process called `name`.
#[cfg(target_os = "linux")]
fn is_process_running(pid: u32, name: &str) -> bool {
    let proc_dir = Path::new("/proc").join(pid.to_string());
    if !proc_dir.exists() {
        return false;
    }

    // comm is truncated to 15 bytes
    match fs::read_to_string(proc_dir.join("comm")) {
        Ok(comm) => {
            let comm = comm.trim();
            comm.is_empty() || name.starts_with(comm) || comm.starts_with(name)
        }
        Err(_) => true,
    }
}

/// Without a portable liveness check every foreign PID counts as running.
#[cfg(not(target_os = "linux"))]
fn is_process_running(_pid: u32, _name: &str) -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn rewrite_line(lock_file: &Path, index: usize, value: &str) {
        let content = fs::read_to_string(lock_file).unwrap();
        let mut lines: Vec<String> = content.split('\n').map(str::to_string).collect();
        lines[index] = value.to_string();
        fs::write(lock_file, lines.join("\n")).unwrap();
    }

    #[test]
    fn test_new_lock_is_unlocked() {
        let temp = TempDir::new().unwrap();
        let lock = DirectoryLock::new(temp.path());

        assert_eq!(lock.dir(), temp.path());
        assert_eq!(lock.lock_file_path(), temp.path().join(".lock"));
        assert!(!lock.is_locked());
        assert_eq!(lock.status().unwrap(), LockStatus::Unlocked);
    }

    #[test]
    fn test_lock_and_unlock() {
        let temp = TempDir::new().unwrap();
        let mut lock = DirectoryLock::new(temp.path());

        lock.lock().unwrap();
        assert!(lock.lock_file_path().is_file());
        assert_eq!(lock.status().unwrap(), LockStatus::LockedByThisApp);

        lock.unlock().unwrap();
        assert!(!lock.lock_file_path().exists());
        assert_eq!(lock.status().unwrap(), LockStatus::Unlocked);
    }

    #[test]
    fn test_drop_releases_lock() {
        let temp = TempDir::new().unwrap();
        let lock_file = temp.path().join(".lock");
        {
            let mut lock = DirectoryLock::new(temp.path());
            lock.try_lock(None).unwrap();
            assert!(lock_file.exists());
        }
        assert!(!lock_file.exists());
    }

    #[test]
    fn test_drop_keeps_foreign_lock() {
        let temp = TempDir::new().unwrap();
        let lock_file = temp.path().join(".lock");
        fs::write(&lock_file, "foreign").unwrap();
        {
            let _lock = DirectoryLock::new(temp.path());
        }
        assert!(lock_file.exists());
    }

    #[test]
    fn test_try_lock_twice_on_same_dir_fails() {
        let temp = TempDir::new().unwrap();
        let mut first = DirectoryLock::new(temp.path());
        let mut second = DirectoryLock::new(temp.path());

        first.try_lock(None).unwrap();
        let result = second.try_lock(None);

        assert!(matches!(
            result,
            Err(FsError::LockUnavailable {
                status: LockStatus::LockedByUnknownApp,
                ..
            })
        ));
        assert!(first.is_locked());
        assert!(!second.is_locked());
    }

    #[test]
    fn test_try_lock_handler_declines() {
        let temp = TempDir::new().unwrap();
        let mut first = DirectoryLock::new(temp.path());
        first.lock().unwrap();

        let mut second = DirectoryLock::new(temp.path());
        let decline = |_: &Path, _: LockStatus, _: &str| -> Result<bool> { Ok(false) };
        assert!(second.try_lock(Some(&decline)).is_err());
        assert!(!second.is_locked());
    }

    #[test]
    fn test_try_lock_handler_overrides() {
        let temp = TempDir::new().unwrap();
        let mut first = DirectoryLock::new(temp.path());
        first.lock().unwrap();

        let mut second = DirectoryLock::new(temp.path());
        let accept = |_: &Path, _: LockStatus, _: &str| -> Result<bool> { Ok(true) };
        second.try_lock(Some(&accept)).unwrap();
        assert!(second.is_locked());
    }

    #[test]
    fn test_try_lock_handler_error_aborts() {
        let temp = TempDir::new().unwrap();
        let mut first = DirectoryLock::new(temp.path());
        first.lock().unwrap();

        let mut second = DirectoryLock::new(temp.path());
        let cancel = |_: &Path, _: LockStatus, _: &str| -> Result<bool> { Err(FsError::Cancelled) };
        assert!(matches!(
            second.try_lock(Some(&cancel)),
            Err(FsError::Cancelled)
        ));
    }

    #[test]
    fn test_unlock_if_locked() {
        let temp = TempDir::new().unwrap();
        let mut lock = DirectoryLock::new(temp.path());

        assert!(!lock.unlock_if_locked().unwrap());
        lock.lock().unwrap();
        assert!(lock.unlock_if_locked().unwrap());
        assert_eq!(lock.status().unwrap(), LockStatus::Unlocked);
    }

    #[test]
    fn test_locked_by_other_user() {
        let temp = TempDir::new().unwrap();
        let mut lock = DirectoryLock::new(temp.path());
        lock.lock().unwrap();
        let lock_file = lock.lock_file_path().to_path_buf();
        lock.unlock().unwrap();
        fs::write(&lock_file, LockOwner::current().to_content()).unwrap();

        rewrite_line(&lock_file, 1, "someone_else");

        assert_eq!(lock.status().unwrap(), LockStatus::LockedByOtherUser);
        assert!(lock.try_lock(None).is_err());
    }

    #[test]
    fn test_locked_by_unknown_app() {
        let temp = TempDir::new().unwrap();
        let mut lock = DirectoryLock::new(temp.path());
        lock.lock().unwrap();
        let content = fs::read(lock.lock_file_path()).unwrap();
        lock.unlock().unwrap();

        fs::write(lock.lock_file_path(), content).unwrap();

        assert_eq!(lock.status().unwrap(), LockStatus::LockedByUnknownApp);
        assert!(lock.try_lock(None).is_err());
    }

    #[test]
    fn test_garbage_lock_file_is_unknown() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(".lock"), "not a lock file").unwrap();

        let lock = DirectoryLock::new(temp.path());
        assert_eq!(lock.status().unwrap(), LockStatus::LockedByUnknownApp);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_stale_lock_is_taken_over() {
        let temp = TempDir::new().unwrap();
        let mut lock = DirectoryLock::new(temp.path());
        lock.lock().unwrap();
        lock.unlock().unwrap();
        fs::write(lock.lock_file_path(), LockOwner::current().to_content()).unwrap();

        // above the kernel's pid_max, so never a running process
        rewrite_line(lock.lock_file_path(), 3, "4000000000");

        assert_eq!(lock.status().unwrap(), LockStatus::StaleLock);
        lock.try_lock(None).unwrap();
        assert!(lock.is_locked());
        assert_eq!(lock.status().unwrap(), LockStatus::LockedByThisApp);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_stale_lock_replaced_meanwhile_is_kept() {
        let temp = TempDir::new().unwrap();
        let mut lock = DirectoryLock::new(temp.path());
        fs::write(lock.lock_file_path(), LockOwner::current().to_content()).unwrap();
        rewrite_line(lock.lock_file_path(), 3, "4000000000");
        let stale = fs::read(lock.lock_file_path()).unwrap();

        // another process took over the stale lock first
        rewrite_line(lock.lock_file_path(), 3, "4000000001");
        let winner = fs::read(lock.lock_file_path()).unwrap();
        lock.remove_stale_lock_file(&stale).unwrap();
        assert_eq!(fs::read(lock.lock_file_path()).unwrap(), winner);

        let result = lock.create_lock_file();
        assert!(matches!(result, Err(FsError::LockUnavailable { .. })));
        assert!(!lock.is_locked());
        assert_eq!(fs::read(lock.lock_file_path()).unwrap(), winner);
    }

    #[test]
    fn test_lock_file_content() {
        let temp = TempDir::new().unwrap();
        let mut lock = DirectoryLock::new(temp.path());
        lock.lock().unwrap();

        let content = fs::read_to_string(lock.lock_file_path()).unwrap();
        let lines: Vec<&str> = content.split('\n').collect();

        assert_eq!(lines.len(), 6);
        assert_eq!(lines[1], current_user());
        assert_eq!(lines[2], current_host());
        assert_eq!(lines[3], std::process::id().to_string());
        assert_eq!(lines[4], current_process_name());

        let locked_at = chrono::DateTime::parse_from_rfc3339(lines[5]).unwrap();
        let age = Utc::now().signed_duration_since(locked_at);
        assert!(age.num_seconds().abs() < 10);
    }
}
