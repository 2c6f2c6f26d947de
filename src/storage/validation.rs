//! Path validation
//!
//! Helpers for the absolute, `/`-separated paths used as node keys.

use crate::error::{FsError, FsResult};

/// Longest single path segment accepted.
pub const MAX_NAME_LEN: usize = 255;

/// Split an absolute path into its parent path and final segment.
pub fn split_parent(path: &str) -> FsResult<(&str, &str)> {
    if !path.starts_with('/') {
        return Err(FsError::invalid_argument(format!("path is not absolute: {path}")));
    }
    match path.rfind('/') {
        Some(0) if path.len() == 1 => Err(FsError::invalid_argument("the root has no parent")),
        Some(0) => Ok(("/", &path[1..])),
        Some(idx) => Ok((&path[..idx], &path[idx + 1..])),
        None => Err(FsError::invalid_argument(format!("path is not absolute: {path}"))),
    }
}

/// Join a directory path and a child name.
pub fn join(parent: &str, name: &str) -> String {
    if parent == "/" {
        format!("/{name}")
    } else {
        format!("{parent}/{name}")
    }
}

/// Check a single segment before it becomes a child name.
pub fn check_name(name: &str) -> FsResult<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains('/') {
        return Err(FsError::invalid_argument(format!("invalid name: {name:?}")));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(FsError::invalid_argument(format!(
            "name longer than {MAX_NAME_LEN} bytes"
        )));
    }
    Ok(())
}

/// True when `path` lies strictly below `ancestor`.
pub fn is_descendant(path: &str, ancestor: &str) -> bool {
    if ancestor == "/" {
        return path != "/";
    }
    path.len() > ancestor.len()
        && path.starts_with(ancestor)
        && path.as_bytes()[ancestor.len()] == b'/'
}

/// Re-root `path` from `old` onto `new`; `path` must be `old` or below it.
pub fn rebase(path: &str, old: &str, new: &str) -> String {
    format!("{new}{}", &path[old.len()..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_parent() {
        assert_eq!(split_parent("/a").unwrap(), ("/", "a"));
        assert_eq!(split_parent("/a/b/c").unwrap(), ("/a/b", "c"));
        assert!(split_parent("/").is_err());
        assert!(split_parent("relative").is_err());
    }

    #[test]
    fn test_join() {
        assert_eq!(join("/", "a"), "/a");
        assert_eq!(join("/a", "b"), "/a/b");
    }

    #[test]
    fn test_check_name() {
        assert!(check_name("file.txt").is_ok());
        assert!(check_name("").is_err());
        assert!(check_name("..").is_err());
        assert!(check_name(&"x".repeat(MAX_NAME_LEN + 1)).is_err());
    }

    #[test]
    fn test_is_descendant() {
        assert!(is_descendant("/a/b", "/a"));
        assert!(!is_descendant("/ab", "/a"));
        assert!(!is_descendant("/a", "/a"));
        assert!(is_descendant("/a", "/"));
    }

    #[test]
    fn test_rebase() {
        assert_eq!(rebase("/a/b/c", "/a/b", "/x"), "/x/c");
        assert_eq!(rebase("/a/b", "/a/b", "/x"), "/x");
    }
}
