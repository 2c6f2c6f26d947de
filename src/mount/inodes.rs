//! Inode to path table
//!
//! The kernel addresses nodes by inode number while the store is keyed by
//! path. Inode numbers are assigned by the store and survive renames; this
//! table only remembers which path each number currently names.

use std::collections::HashMap;

use crate::storage::validation::{is_descendant, join, rebase};

pub const ROOT_INO: u64 = 1;

#[derive(Debug)]
pub struct InodeTable {
    paths: HashMap<u64, String>,
}

impl Default for InodeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl InodeTable {
    pub fn new() -> Self {
        let mut paths = HashMap::new();
        paths.insert(ROOT_INO, "/".to_string());
        Self { paths }
    }

    pub fn path(&self, ino: u64) -> Option<&str> {
        self.paths.get(&ino).map(String::as_str)
    }

    /// Path of `name` inside directory `parent`, if `parent` is known.
    pub fn child_path(&self, parent: u64, name: &str) -> Option<String> {
        self.path(parent).map(|dir| join(dir, name))
    }

    pub fn insert(&mut self, ino: u64, path: &str) {
        self.paths.insert(ino, path.to_string());
    }

    /// Forget whatever inode currently names `path`.
    pub fn remove_path(&mut self, path: &str) {
        self.paths.retain(|_, known| known != path);
    }

    /// Follow a rename: the replaced target is forgotten and `old` plus
    /// everything below it is re-rooted at `new`.
    pub fn rename(&mut self, old: &str, new: &str) {
        if old == new {
            return;
        }
        self.remove_path(new);
        for known in self.paths.values_mut() {
            if known == old || is_descendant(known, old) {
                *known = rebase(known, old, new);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_is_known() {
        let table = InodeTable::new();
        assert_eq!(table.path(ROOT_INO), Some("/"));
        assert_eq!(table.child_path(ROOT_INO, "a").as_deref(), Some("/a"));
        assert_eq!(table.child_path(7, "a"), None);
    }

    #[test]
    fn test_rename_moves_subtree() {
        let mut table = InodeTable::new();
        table.insert(2, "/d");
        table.insert(3, "/d/f");
        table.insert(4, "/dx");
        table.rename("/d", "/e");

        assert_eq!(table.path(2), Some("/e"));
        assert_eq!(table.path(3), Some("/e/f"));
        assert_eq!(table.path(4), Some("/dx"));
    }

    #[test]
    fn test_rename_drops_replaced_target() {
        let mut table = InodeTable::new();
        table.insert(2, "/a");
        table.insert(3, "/b");
        table.rename("/a", "/b");

        assert_eq!(table.path(2), Some("/b"));
        assert_eq!(table.path(3), None);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_remove_path() {
        let mut table = InodeTable::new();
        table.insert(2, "/a");
        table.remove_path("/a");
        assert_eq!(table.path(2), None);
        assert!(!table.is_empty());
    }
}
