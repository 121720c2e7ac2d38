use crate::error::{FsError, Result};
use crate::fs::diff::{self, DiffKind};
use crate::fs::{DirectoryLock, LockStatus};
use clap::Parser;
use colored::Colorize;
use std::path::PathBuf;

use super::print_paths;

#[derive(Parser, Debug, Clone)]
pub struct StatusArgs {
    /// Root directory of the file system
    pub root: PathBuf,
}

pub fn execute(args: StatusArgs) -> Result<()> {
    if !args.root.is_dir() {
        return Err(FsError::NotFound(args.root));
    }

    println!("{} {}", "Directory:".bold(), args.root.display());

    let lock = DirectoryLock::new(&args.root);
    let (status, user) = lock.status_with_user()?;
    let lock_line = match status {
        LockStatus::Unlocked => "unlocked".green().to_string(),
        LockStatus::StaleLock => format!("stale lock of {} (process is gone)", user)
            .yellow()
            .to_string(),
        LockStatus::LockedByUnknownApp => format!("locked by {} (unknown application)", user)
            .red()
            .to_string(),
        _ => format!("locked by {}", user).red().to_string(),
    };
    println!("{} {}", "Lock:".bold(), lock_line);

    for kind in [DiffKind::Backup, DiffKind::Autosave] {
        let label = format!("{}:", kind.name());
        let Some(manifest) = diff::read_manifest(&args.root, kind)? else {
            println!("{} {}", label.bold(), "none".dimmed());
            continue;
        };

        println!("{} created {}", label.bold(), manifest.created.cyan());
        print_paths("+".green().to_string().as_str(), &manifest.modified_files);
        print_paths("-".red().to_string().as_str(), &manifest.removed_files);
        print_paths("-".red().to_string().as_str(), &manifest.removed_directories);
    }

    if DiffKind::Backup.exists(&args.root) {
        println!(
            "\n{} {}",
            "A save was interrupted. Run".yellow(),
            "txfs recover".cyan()
        );
    }

    Ok(())
}
