//! ZIP import and export.
//!
//! Importing stages every file of the archive through
//! [`write`](TransactionalFileSystem::write); nothing hits the disk until
//! `save()`. Exporting walks the logical view, so staged changes are
//! included without saving first.
//!
//! ## Export Rules
//! - Hidden directories (`.backup`, `.autosave`, `.git`, ...) are skipped
//! - Lock files are skipped, also those of locked sub-directories
//! - The target ZIP is skipped if it lies inside the root
//! - An optional filter receives each relative path; `false` skips it

use crate::error::{FsError, Result, io_err};

use super::filesystem::TransactionalFileSystem;
use super::lock::LOCK_FILE_NAME;
use super::path::{clean_path, dir_prefix, is_contained};

use std::fs::{self, File};
use std::io::{self, Cursor, Read, Seek, Write};
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Decides per relative file path whether it goes into an exported ZIP.
pub type ExportFilter<'a> = &'a dyn Fn(&str) -> bool;

impl TransactionalFileSystem {
    /// Stages every file of the ZIP file at `zip_path`.
    pub fn load_from_zip_file(&mut self, zip_path: impl AsRef<Path>) -> Result<()> {
        let zip_path = zip_path.as_ref();
        let file = File::open(zip_path).map_err(|e| io_err("open ZIP file", zip_path, e))?;
        let count = self.load_from_zip(file)?;
        log::info!("Staged {} files from {}", count, zip_path.display());
        Ok(())
    }

    /// Stages every file of an in-memory ZIP archive.
    pub fn load_from_zip_bytes(&mut self, content: &[u8]) -> Result<()> {
        let count = self.load_from_zip(Cursor::new(content))?;
        log::info!("Staged {} files from ZIP data", count);
        Ok(())
    }

    /// Writes the logical view into a new ZIP file at `zip_path`.
    ///
    /// An incomplete ZIP file is deleted on error.
    pub fn export_to_zip_file(
        &self,
        zip_path: impl AsRef<Path>,
        filter: Option<ExportFilter<'_>>,
    ) -> Result<()> {
        let zip_path = zip_path.as_ref();
        let target = std::path::absolute(zip_path).map_err(|e| io_err("resolve", zip_path, e))?;
        let skip = pathdiff::diff_paths(&target, &self.root)
            .map(|rel| clean_path(&rel.to_string_lossy()))
            .filter(|rel| !rel.is_empty() && is_contained(rel));

        let file = File::create(&target).map_err(|e| io_err("create ZIP file", &target, e))?;
        match self.export_to_writer(file, skip.as_deref(), filter) {
            Ok((_, count)) => {
                log::info!("Exported {} files to {}", count, target.display());
                Ok(())
            }
            Err(e) => {
                if let Err(remove_err) = fs::remove_file(&target) {
                    log::warn!(
                        "Could not remove incomplete ZIP file {}: {}",
                        target.display(),
                        remove_err
                    );
                }
                Err(e)
            }
        }
    }

    /// Writes the logical view into an in-memory ZIP archive.
    pub fn export_to_zip_bytes(&self, filter: Option<ExportFilter<'_>>) -> Result<Vec<u8>> {
        let (cursor, count) = self.export_to_writer(Cursor::new(Vec::new()), None, filter)?;
        log::debug!("Exported {} files to ZIP data", count);
        Ok(cursor.into_inner())
    }

    /// Reads the whole archive first, so a broken entry stages nothing.
    fn load_from_zip<R: Read + Seek>(&mut self, reader: R) -> Result<usize> {
        let mut archive = ZipArchive::new(reader)?;
        let mut files = Vec::with_capacity(archive.len());

        for i in 0..archive.len() {
            let mut entry = archive.by_index(i)?;
            if entry.is_dir() {
                continue;
            }

            let name = entry.name().to_string();
            let cleaned = self.validate(&name)?;
            let mut content = Vec::new();
            entry
                .read_to_end(&mut content)
                .map_err(|e| FsError::Archive(format!("Failed to read '{}': {}", name, e)))?;
            files.push((cleaned, content));
        }

        let count = files.len();
        for (path, content) in files {
            self.write(&path, content)?;
        }
        Ok(count)
    }

    fn export_to_writer<W: Write + Seek>(
        &self,
        writer: W,
        skip: Option<&str>,
        filter: Option<ExportFilter<'_>>,
    ) -> Result<(W, usize)> {
        let mut zip = ZipWriter::new(writer);
        let count = self.export_dir(&mut zip, "", skip, filter)?;
        let writer = zip.finish()?;
        Ok((writer, count))
    }

    fn export_dir<W: Write + Seek>(
        &self,
        zip: &mut ZipWriter<W>,
        dir: &str,
        skip: Option<&str>,
        filter: Option<ExportFilter<'_>>,
    ) -> Result<usize> {
        let prefix = dir_prefix(dir);
        let mut count = 0;

        for name in self.get_dirs(dir) {
            if name.starts_with('.') {
                continue;
            }
            count += self.export_dir(zip, &format!("{}{}", prefix, name), skip, filter)?;
        }

        for name in self.get_files(dir) {
            let path = format!("{}{}", prefix, name);
            if name == LOCK_FILE_NAME || Some(path.as_str()) == skip {
                continue;
            }
            if filter.is_some_and(|accept| !accept(&path)) {
                continue;
            }

            let content = self.read(&path)?;
            zip.start_file(path.clone(), entry_options())?;
            let written = io::copy(&mut content.as_slice(), zip)
                .map_err(|e| FsError::Archive(format!("Failed to write '{}': {}", path, e)))?;
            if written != content.len() as u64 {
                return Err(FsError::Archive(format!(
                    "Failed to write '{}': {} of {} bytes written",
                    path,
                    written,
                    content.len()
                )));
            }

            log::debug!("Exported: {}", path);
            count += 1;
        }

        Ok(count)
    }
}

fn entry_options() -> SimpleFileOptions {
    SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o644)
}
