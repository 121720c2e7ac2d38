//! Relative path cleaning and sandboxed resolution.
//!
//! Pure functions with no I/O or side effects. Every relative path handed to
//! a [`TransactionalFileSystem`](super::TransactionalFileSystem) goes through
//! [`clean_path`] and [`resolve`] before it touches the disk.

use std::path::{Component, Path, PathBuf};

/// Normalizes a relative path.
///
/// ## Rules
/// - Surrounding whitespace is trimmed
/// - `\` becomes `/`
/// - Empty and `.` segments are dropped
/// - `name/..` pairs collapse
/// - Leading `..` segments are kept so [`resolve`] can reject them
pub fn clean_path(path: &str) -> String {
    let normalized = path.trim().replace('\\', "/");
    let mut segments: Vec<&str> = Vec::new();

    for segment in normalized.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.last().is_some_and(|last| *last != "..") {
                    segments.pop();
                } else {
                    segments.push("..");
                }
            }
            other => segments.push(other),
        }
    }

    segments.join("/").trim().to_string()
}

/// Returns `true` if the cleaned path stays inside the root.
///
/// The check is textual: a leading `..` or any root/prefix component (e.g. a
/// Windows drive letter) is a breakout.
pub fn is_contained(cleaned: &str) -> bool {
    Path::new(cleaned).components().all(|component| {
        matches!(component, Component::Normal(_) | Component::CurDir)
    })
}

/// Resolves `relative` against `root`.
///
/// Returns `None` if the path would escape `root`.
pub fn resolve(root: &Path, relative: &str) -> Option<PathBuf> {
    let cleaned = clean_path(relative);
    if !is_contained(&cleaned) {
        log::debug!("Rejected path outside of {}: {}", root.display(), relative);
        return None;
    }

    if cleaned.is_empty() {
        Some(root.to_path_buf())
    } else {
        Some(root.join(cleaned))
    }
}

/// Appends a trailing `/` to a non-empty cleaned directory path.
pub(crate) fn dir_prefix(cleaned: &str) -> String {
    if cleaned.is_empty() {
        String::new()
    } else {
        format!("{}/", cleaned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_path_trims_and_normalizes() {
        let cases = [
            ("", ""),
            ("   ", ""),
            (".", ""),
            ("..", ".."),
            ("../", ".."),
            ("foo bar", "foo bar"),
            ("/foo\\\\bar/", "foo/bar"),
            (" /hello world/foo bar/.txt ", "hello world/foo bar/.txt"),
            ("///HELLO/\\\\/FOO///", "HELLO/FOO"),
            ("  /\\  Hello World  \\/  ", "Hello World"),
            ("foo/../bar", "bar"),
            ("foo/bar/../././.", "foo"),
            ("./foo/bar/hello/../..", "foo"),
            ("./foo/bar/hello/../../", "foo"),
        ];

        for (input, expected) in cases {
            assert_eq!(clean_path(input), expected, "input: {:?}", input);
        }
    }

    #[test]
    fn test_clean_path_keeps_leading_parent_segments() {
        assert_eq!(clean_path("../../etc/passwd"), "../../etc/passwd");
        assert_eq!(clean_path("a/../../b"), "../b");
        assert_eq!(clean_path("../populated/1.txt"), "../populated/1.txt");
    }

    #[test]
    fn test_resolve_inside_root() {
        let root = Path::new("/tmp/root");
        assert_eq!(resolve(root, ""), Some(PathBuf::from("/tmp/root")));
        assert_eq!(
            resolve(root, "foo/bar"),
            Some(PathBuf::from("/tmp/root/foo/bar"))
        );
        assert_eq!(
            resolve(root, "/absolute/looking"),
            Some(PathBuf::from("/tmp/root/absolute/looking"))
        );
        assert_eq!(
            resolve(root, "foo/../bar"),
            Some(PathBuf::from("/tmp/root/bar"))
        );
    }

    #[test]
    fn test_resolve_rejects_breakout() {
        let root = Path::new("/tmp/root");
        assert_eq!(resolve(root, ".."), None);
        assert_eq!(resolve(root, "../1.txt"), None);
        assert_eq!(resolve(root, "../root/1.txt"), None);
        assert_eq!(resolve(root, "a/../../b"), None);
        assert_eq!(resolve(root, "..\\..\\windows"), None);
    }

    #[test]
    fn test_dir_prefix() {
        assert_eq!(dir_prefix(""), "");
        assert_eq!(dir_prefix("a/b"), "a/b/");
    }
}
