//! Filesystem nodes
//!
//! A node is either a file owning its bytes or a directory owning the names
//! of its children. A file's size is always the length of its buffer.

use std::collections::BTreeSet;
use std::time::SystemTime;

use crate::storage::results::Attr;

/// Entry kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    File,
    Directory,
}

/// Advisory ownership recorded on new nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Owner {
    pub uid: u32,
    pub gid: u32,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub ino: u64,
    pub kind: NodeKind,
    /// Full `st_mode`, file type bits included.
    pub mode: u32,
    pub nlink: u32,
    pub uid: u32,
    pub gid: u32,
    pub atime: SystemTime,
    pub mtime: SystemTime,
    pub ctime: SystemTime,
    pub crtime: SystemTime,
    data: Vec<u8>,
    children: BTreeSet<String>,
}

impl Node {
    fn new(ino: u64, kind: NodeKind, mode: u32, owner: Owner, now: SystemTime) -> Self {
        let (type_bits, nlink) = match kind {
            NodeKind::File => (libc::S_IFREG as u32, 1),
            NodeKind::Directory => (libc::S_IFDIR as u32, 2),
        };
        Self {
            ino,
            kind,
            mode: type_bits | (mode & 0o7777),
            nlink,
            uid: owner.uid,
            gid: owner.gid,
            atime: now,
            mtime: now,
            ctime: now,
            crtime: now,
            data: Vec::new(),
            children: BTreeSet::new(),
        }
    }

    pub fn file(ino: u64, mode: u32, owner: Owner, now: SystemTime) -> Self {
        Self::new(ino, NodeKind::File, mode, owner, now)
    }

    pub fn directory(ino: u64, mode: u32, owner: Owner, now: SystemTime) -> Self {
        Self::new(ino, NodeKind::Directory, mode, owner, now)
    }

    pub fn is_dir(&self) -> bool {
        self.kind == NodeKind::Directory
    }

    /// Byte size; always zero for directories.
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Child names in sorted order.
    pub fn children(&self) -> impl Iterator<Item = &str> {
        self.children.iter().map(String::as_str)
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    pub fn has_child(&self, name: &str) -> bool {
        self.children.contains(name)
    }

    pub(crate) fn add_child(&mut self, name: &str) {
        self.children.insert(name.to_string());
    }

    pub(crate) fn remove_child(&mut self, name: &str) {
        self.children.remove(name);
    }

    /// Copy `bytes` in at `offset`, zero-filling any gap past the current end.
    pub(crate) fn write_at(&mut self, offset: usize, bytes: &[u8]) {
        let end = offset + bytes.len();
        if end > self.data.len() {
            self.data.resize(end, 0);
        }
        self.data[offset..end].copy_from_slice(bytes);
    }

    /// Shrink or zero-extend the buffer to `len` bytes.
    pub(crate) fn resize(&mut self, len: usize) {
        self.data.resize(len, 0);
    }

    /// Bytes in `[offset, offset + len)` clipped to the buffer.
    pub(crate) fn slice(&self, offset: u64, len: u64) -> &[u8] {
        let size = self.size();
        let start = offset.min(size) as usize;
        let end = offset.saturating_add(len).min(size) as usize;
        &self.data[start..end]
    }

    /// Modification of the entry's contents (data or child set).
    pub(crate) fn touch_modified(&mut self, now: SystemTime) {
        self.mtime = now;
        self.ctime = now;
    }

    pub fn attr(&self) -> Attr {
        Attr {
            ino: self.ino,
            kind: self.kind,
            mode: self.mode,
            nlink: self.nlink,
            size: self.size(),
            uid: self.uid,
            gid: self.gid,
            atime: self.atime,
            mtime: self.mtime,
            ctime: self.ctime,
            crtime: self.crtime,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_at_zero_fills_gap() {
        let mut node = Node::file(2, 0o644, Owner::default(), SystemTime::now());
        node.write_at(3, b"ab");
        assert_eq!(node.data(), b"\0\0\0ab");
        assert_eq!(node.size(), 5);
    }

    #[test]
    fn test_slice_is_clipped() {
        let mut node = Node::file(2, 0o644, Owner::default(), SystemTime::now());
        node.write_at(0, b"hello");
        assert_eq!(node.slice(3, 10), b"lo");
        assert!(node.slice(9, 4).is_empty());
        assert!(node.slice(u64::MAX, u64::MAX).is_empty());
    }

    #[test]
    fn test_mode_keeps_type_bits() {
        let dir = Node::directory(1, 0o40755, Owner::default(), SystemTime::now());
        assert_eq!(dir.mode & 0o7777, 0o755);
        assert_eq!(dir.mode & libc::S_IFMT as u32, libc::S_IFDIR as u32);
        assert_eq!(dir.nlink, 2);
    }
}
