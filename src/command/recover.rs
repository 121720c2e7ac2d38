use crate::error::{FsError, Result};
use crate::fs::{DiffKind, TransactionalFileSystem};
use anyhow::anyhow;
use clap::Parser;
use colored::Colorize;
use std::path::PathBuf;

use super::print_paths;

#[derive(Parser, Debug, Clone)]
pub struct RecoverArgs {
    /// Root directory of the file system
    pub root: PathBuf,

    /// Apply the autosave on top of any interrupted save
    #[arg(long, conflicts_with = "discard_autosave")]
    pub autosave: bool,

    /// Delete the autosave instead of applying it
    #[arg(long)]
    pub discard_autosave: bool,

    /// Show what would be written without saving
    #[arg(long, short = 'n')]
    pub dry_run: bool,
}

pub fn execute(args: RecoverArgs) -> Result<()> {
    if !args.root.is_dir() {
        return Err(FsError::NotFound(args.root));
    }

    let has_backup = DiffKind::Backup.exists(&args.root);
    let has_autosave = DiffKind::Autosave.exists(&args.root);

    if has_autosave && !args.autosave && !args.discard_autosave {
        return Err(FsError::Other(anyhow!(
            "'{}' has an autosave; pass --autosave to apply it or --discard-autosave to delete it",
            args.root.display()
        )));
    }
    if !has_backup && !has_autosave {
        println!("{}", "Nothing to recover".yellow());
        return Ok(());
    }

    let apply_autosave = args.autosave;
    let mut fs = TransactionalFileSystem::open(&args.root, !args.dry_run, |_| Ok(apply_autosave))?;
    let modifications = fs.check_for_modifications()?;

    if args.dry_run {
        println!("\n{}", "DRY RUN - No changes will be made".yellow().bold());
        print_paths("•", &modifications);
        println!(
            "\n{} change(s) pending. Run without {} to apply them.",
            modifications.len().to_string().cyan().bold(),
            "--dry-run".cyan()
        );
        return Ok(());
    }

    fs.save()?;

    println!(
        "{} {} ({} change(s))",
        "✓ Recovered".green().bold(),
        args.root.display(),
        modifications.len()
    );
    print_paths("✓".green().to_string().as_str(), &modifications);
    Ok(())
}
