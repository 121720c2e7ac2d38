pub mod export;
pub mod import;
pub mod recover;
pub mod status;

use clap::Subcommand;
use colored::Colorize;

#[derive(Subcommand)]
pub enum TxfsCommand {
    /// Show the lock and any pending backup or autosave of a directory
    Status(status::StatusArgs),
    /// Finish an interrupted save (and optionally apply the autosave)
    Recover(recover::RecoverArgs),
    /// Export a directory, including unsaved backup changes, to a ZIP file
    Export(export::ExportArgs),
    /// Import a ZIP file into a directory
    Import(import::ImportArgs),
}

/// Number of paths listed before the rest is summarized.
const MAX_LISTED_PATHS: usize = 10;

/// Prints an indented path list, shortened to [`MAX_LISTED_PATHS`].
pub(crate) fn print_paths<S: AsRef<str>>(marker: &str, paths: &[S]) {
    for path in paths.iter().take(MAX_LISTED_PATHS) {
        println!("   {} {}", marker, path.as_ref().dimmed());
    }
    if paths.len() > MAX_LISTED_PATHS {
        println!(
            "   {}",
            format!("... and {} more", paths.len() - MAX_LISTED_PATHS).dimmed()
        );
    }
}
