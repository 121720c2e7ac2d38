//! Shared fixtures for txfs integration tests
//!
//! The fixture mirrors a small library directory with hidden folders, nested
//! folders and names containing spaces.

use assert_cmd::cargo::cargo_bin_cmd;
use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A temporary base directory (with spaces in its path) containing:
///
/// - `1.txt` (outside of every file system root, for breakout tests)
/// - `empty/`
/// - `populated/` with a handful of files
/// - no `nonexisting/`
pub struct Fixture {
    _temp: TempDir,
    pub base: PathBuf,
}

#[allow(unused)]
impl Fixture {
    pub fn dir(&self, name: &str) -> PathBuf {
        self.base.join(name)
    }

    pub fn populated(&self) -> PathBuf {
        self.dir("populated")
    }

    pub fn empty(&self) -> PathBuf {
        self.dir("empty")
    }

    pub fn nonexisting(&self) -> PathBuf {
        self.dir("nonexisting")
    }
}

#[allow(unused)]
pub fn fixture() -> Fixture {
    let temp = TempDir::new().unwrap();
    let base = temp.path().join("spaces in path");

    fs::create_dir_all(&base).unwrap();
    fs::write(base.join("1.txt"), "1").unwrap();
    fs::create_dir_all(base.join("empty")).unwrap();

    let populated = base.join("populated");
    for dir in [".dot/dir", "1/2/3", "a/b", "foo dir/bar dir"] {
        fs::create_dir_all(populated.join(dir)).unwrap();
    }
    for (file, content) in [
        ("1.txt", "1"),
        ("2.txt", "2"),
        (".dot/file.txt", "file"),
        (".dot/dir/foo.txt", "foo"),
        ("1/1a.txt", "1a"),
        ("1/1b.txt", "1b"),
        ("1/2/3/4.txt", "4"),
        ("a/b/c", "c"),
        ("foo dir/bar dir.txt", "bar"),
        ("foo dir/bar dir/X", "X"),
    ] {
        fs::write(populated.join(file), content).unwrap();
    }

    Fixture { _temp: temp, base }
}

/// Reads a file on disk as string
#[allow(unused)]
pub fn read(path: &Path) -> String {
    fs::read_to_string(path).unwrap()
}

/// Builds an in-memory ZIP archive
#[allow(unused)]
pub fn create_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut buffer = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(Cursor::new(&mut buffer));
        for (name, content) in entries {
            zip.start_file(*name, zip::write::SimpleFileOptions::default())
                .unwrap();
            zip.write_all(content).unwrap();
        }
        zip.finish().unwrap();
    }
    buffer
}

/// Sorted entry names of a ZIP archive
#[allow(unused)]
pub fn zip_entries(content: &[u8]) -> Vec<String> {
    let archive = zip::ZipArchive::new(Cursor::new(content)).unwrap();
    let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
    names.sort();
    names
}

/// Applies the same sequence of staged operations used by several tests.
///
/// Afterwards the logical view contains `x/y/z`, `z/2.txt` and a changed
/// `.dot/file.txt`, while `1.txt` and `a/` are removed.
#[allow(unused)]
pub fn apply_mixed_operations(fs: &mut txfs::TransactionalFileSystem) {
    fs.write("x/y/z", "z").unwrap();
    fs.write("z/y/x.txt", "x").unwrap();
    fs.write("z/y.txt", "y").unwrap();
    fs.write("1.txt", "new 1").unwrap();
    fs.write(".dot/file.txt", "new file").unwrap();
    fs.remove_file("z/y/x.txt").unwrap();
    fs.remove_file("1.txt").unwrap();
    fs.remove_dir_recursively("z").unwrap();
    fs.remove_dir_recursively("a").unwrap();
    fs.write("z/1.txt", "1").unwrap();
    fs.write("z/2.txt", "2").unwrap();
    fs.remove_file("z/1.txt").unwrap();
}

/// Asserts the logical view produced by [`apply_mixed_operations`]
#[allow(unused)]
pub fn assert_mixed_view(fs: &txfs::TransactionalFileSystem) {
    assert!(fs.file_exists("x/y/z"));
    assert!(!fs.file_exists("z/y/x.txt"));
    assert!(!fs.file_exists("z/y.txt"));
    assert!(!fs.file_exists("1.txt"));
    assert!(!fs.file_exists("a/b/c"));
    assert!(!fs.file_exists("z/1.txt"));
    assert!(fs.file_exists("z/2.txt"));
    assert_eq!(fs.read("x/y/z").unwrap(), b"z");
    assert_eq!(fs.read("z/2.txt").unwrap(), b"2");
    assert_eq!(fs.read(".dot/file.txt").unwrap(), b"new file");
    for missing in ["z/y/x.txt", "z/y.txt", "1.txt", "a/b/c", "z/1.txt"] {
        assert!(fs.read(missing).is_err(), "{} should not exist", missing);
    }
}

/// Helper to run the txfs binary
#[allow(unused)]
pub fn run_txfs(args: &[&str]) -> assert_cmd::assert::Assert {
    let mut cmd = cargo_bin_cmd!("txfs");
    cmd.args(args).env_remove("RUST_LOG");
    cmd.assert()
}
