use crate::error::{FsError, Result};
use crate::fs::TransactionalFileSystem;
use anyhow::anyhow;
use clap::Parser;
use colored::Colorize;
use std::path::{Path, PathBuf};

use super::print_paths;

#[derive(Parser, Debug, Clone)]
pub struct ImportArgs {
    /// ZIP file to import
    pub zip: PathBuf,

    /// Root directory of the file system (created if missing)
    pub root: PathBuf,

    /// Show which files would change without saving
    #[arg(long, short = 'n')]
    pub dry_run: bool,
}

pub fn execute(args: ImportArgs) -> Result<()> {
    if !args.zip.is_file() {
        return Err(FsError::NotFound(args.zip));
    }

    let refuse_autosave = |root: &Path| -> Result<bool> {
        Err(FsError::Other(anyhow!(
            "'{}' has an autosave; run 'txfs recover' first",
            root.display()
        )))
    };
    let mut fs = TransactionalFileSystem::open(&args.root, !args.dry_run, refuse_autosave)?;
    fs.load_from_zip_file(&args.zip)?;
    let modifications = fs.check_for_modifications()?;

    if args.dry_run {
        println!("\n{}", "DRY RUN - No changes will be made".yellow().bold());
        print_paths("•", &modifications);
        return Ok(());
    }

    fs.save()?;

    println!(
        "{} {} → {} ({} file(s) changed)",
        "✓ Imported".green().bold(),
        args.zip.display(),
        args.root.display().to_string().green(),
        modifications.len()
    );
    print_paths("✓".green().to_string().as_str(), &modifications);
    Ok(())
}
