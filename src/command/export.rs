use crate::error::{FsError, Result};
use crate::fs::TransactionalFileSystem;
use crate::fs::archive::ExportFilter;
use crate::fs::path::clean_path;
use clap::Parser;
use colored::Colorize;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
pub struct ExportArgs {
    /// Root directory of the file system
    pub root: PathBuf,

    /// ZIP file to create
    pub zip: PathBuf,

    /// Only export files inside these directories (repeatable)
    #[arg(long, value_name = "DIR")]
    pub include: Vec<String>,
}

pub fn execute(args: ExportArgs) -> Result<()> {
    if !args.root.is_dir() {
        return Err(FsError::NotFound(args.root));
    }

    let prefixes: Vec<String> = args.include.iter().map(|p| clean_path(p)).collect();
    let included = |path: &str| {
        prefixes.iter().any(|prefix| {
            prefix.is_empty()
                || path
                    .strip_prefix(prefix.as_str())
                    .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
        })
    };
    let filter: Option<ExportFilter<'_>> = if prefixes.is_empty() {
        None
    } else {
        Some(&included)
    };

    let fs = TransactionalFileSystem::open_ro(&args.root)?;
    fs.export_to_zip_file(&args.zip, filter)?;

    println!(
        "{} {} → {}",
        "✓ Exported".green().bold(),
        args.root.display(),
        args.zip.display().to_string().green()
    );
    Ok(())
}
