//! Node store
//!
//! Flat map from absolute path to [`Node`]. Directories keep the names of
//! their children so listings and emptiness checks never scan the map.
//!
//! Capacity accounting is delta based: only the growth of a file counts
//! against the ceiling, and it is checked before any byte is touched, so a
//! failed write or truncate leaves the store exactly as it was.

use std::collections::HashMap;
use std::time::SystemTime;

use log::debug;

use crate::error::{FsError, FsResult};
use crate::storage::node::{Node, Owner};
use crate::storage::results::{Attr, DirEntry, StatFs};
use crate::storage::validation::{
    MAX_NAME_LEN, check_name, is_descendant, join, rebase, split_parent,
};

pub const BLOCK_SIZE: u64 = 4096;
pub const DEFAULT_CAPACITY: u64 = 10 * 1024 * 1024;

const ROOT: &str = "/";
const ROOT_INO: u64 = 1;

pub struct NodeStore {
    nodes: HashMap<String, Node>,
    capacity: u64,
    used: u64,
    owner: Owner,
    next_ino: u64,
}

impl NodeStore {
    pub fn new(capacity: u64) -> Self {
        Self::with_owner(capacity, Owner::default())
    }

    /// Store whose root and new nodes belong to `owner`.
    pub fn with_owner(capacity: u64, owner: Owner) -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(
            ROOT.to_string(),
            Node::directory(ROOT_INO, 0o755, owner, SystemTime::now()),
        );
        Self {
            nodes,
            capacity,
            used: 0,
            owner,
            next_ino: ROOT_INO + 1,
        }
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Sum of all file sizes.
    pub fn used(&self) -> u64 {
        self.used
    }

    pub fn lookup(&self, path: &str) -> FsResult<&Node> {
        self.nodes.get(path).ok_or_else(|| FsError::not_found(path))
    }

    fn lookup_mut(&mut self, path: &str) -> FsResult<&mut Node> {
        self.nodes.get_mut(path).ok_or_else(|| FsError::not_found(path))
    }

    fn file_mut(&mut self, path: &str) -> FsResult<&mut Node> {
        let node = self.lookup_mut(path)?;
        if node.is_dir() {
            return Err(FsError::is_directory(path));
        }
        Ok(node)
    }

    fn dir_mut(&mut self, path: &str) -> FsResult<&mut Node> {
        let node = self.lookup_mut(path)?;
        if !node.is_dir() {
            return Err(FsError::not_directory(path));
        }
        Ok(node)
    }

    fn alloc_ino(&mut self) -> u64 {
        let ino = self.next_ino;
        self.next_ino += 1;
        ino
    }

    fn ensure_space(&self, path: &str, delta: u64) -> FsResult<()> {
        let available = self.capacity.saturating_sub(self.used);
        if delta > available {
            return Err(FsError::OutOfSpace {
                path: path.to_string(),
                requested: delta,
                available,
            });
        }
        Ok(())
    }

    /// Validate the parent of a path about to be created.
    fn prepare_insert<'p>(&self, path: &'p str) -> FsResult<(&'p str, &'p str)> {
        let (parent, name) = split_parent(path)?;
        check_name(name)?;
        let dir = self.lookup(parent)?;
        if !dir.is_dir() {
            return Err(FsError::not_directory(parent));
        }
        if dir.has_child(name) {
            return Err(FsError::already_exists(path));
        }
        Ok((parent, name))
    }

    fn attach(&mut self, parent: &str, name: &str, path: &str, node: Node) -> FsResult<Attr> {
        let now = node.ctime;
        let is_dir = node.is_dir();
        let attr = node.attr();

        let dir = self.dir_mut(parent)?;
        dir.add_child(name);
        if is_dir {
            dir.nlink += 1;
        }
        dir.touch_modified(now);
        self.nodes.insert(path.to_string(), node);
        Ok(attr)
    }

    /// Ordered listing with the synthetic `.` and `..` entries first.
    pub fn list(&self, path: &str) -> FsResult<Vec<DirEntry>> {
        let node = self.lookup(path)?;
        if !node.is_dir() {
            return Err(FsError::not_directory(path));
        }
        let parent_ino = match split_parent(path) {
            Ok((parent, _)) => self.lookup(parent)?.ino,
            Err(_) => node.ino,
        };

        let mut entries = Vec::with_capacity(2);
        entries.push(DirEntry {
            name: ".".into(),
            ino: node.ino,
            kind: node.kind,
        });
        entries.push(DirEntry {
            name: "..".into(),
            ino: parent_ino,
            kind: node.kind,
        });
        for name in node.children() {
            let child = self.lookup(&join(path, name))?;
            entries.push(DirEntry {
                name: name.to_string(),
                ino: child.ino,
                kind: child.kind,
            });
        }
        Ok(entries)
    }

    pub fn create(&mut self, path: &str, mode: u32) -> FsResult<Attr> {
        let (parent, name) = self.prepare_insert(path)?;
        let ino = self.alloc_ino();
        let node = Node::file(ino, mode, self.owner, SystemTime::now());
        self.attach(parent, name, path, node)
    }

    pub fn mkdir(&mut self, path: &str, mode: u32) -> FsResult<Attr> {
        let (parent, name) = self.prepare_insert(path)?;
        let ino = self.alloc_ino();
        let node = Node::directory(ino, mode, self.owner, SystemTime::now());
        self.attach(parent, name, path, node)
    }

    pub fn unlink(&mut self, path: &str) -> FsResult<()> {
        if self.lookup(path)?.is_dir() {
            return Err(FsError::is_directory(path));
        }
        let (parent, name) = split_parent(path)?;
        let dir = self.dir_mut(parent)?;
        dir.remove_child(name);
        dir.touch_modified(SystemTime::now());

        if let Some(node) = self.nodes.remove(path) {
            self.used -= node.size();
        }
        Ok(())
    }

    pub fn rmdir(&mut self, path: &str) -> FsResult<()> {
        let node = self.lookup(path)?;
        if !node.is_dir() {
            return Err(FsError::not_directory(path));
        }
        if node.has_children() {
            return Err(FsError::directory_not_empty(path));
        }
        if path == ROOT {
            return Err(FsError::invalid_argument("the root directory cannot be removed"));
        }
        let (parent, name) = split_parent(path)?;
        let dir = self.dir_mut(parent)?;
        dir.remove_child(name);
        dir.nlink -= 1;
        dir.touch_modified(SystemTime::now());
        self.nodes.remove(path);
        Ok(())
    }

    /// Move `old` to `new`, replacing an existing file at `new`.
    ///
    /// Directories move with their whole subtree. An existing directory at
    /// `new` is never replaced, empty or not.
    pub fn rename(&mut self, old: &str, new: &str) -> FsResult<()> {
        let moving_dir = self.lookup(old)?.is_dir();
        if old == new {
            return Ok(());
        }
        if old == ROOT {
            return Err(FsError::invalid_argument("the root directory cannot be moved"));
        }
        if moving_dir && is_descendant(new, old) {
            return Err(FsError::invalid_argument(format!(
                "cannot move {old} into its own subtree"
            )));
        }
        let (old_parent, old_name) = split_parent(old)?;
        let (new_parent, new_name) = split_parent(new)?;
        check_name(new_name)?;
        if !self.lookup(new_parent)?.is_dir() {
            return Err(FsError::not_directory(new_parent));
        }
        if let Some(target) = self.nodes.get(new) {
            if target.is_dir() {
                return Err(FsError::is_directory(new));
            }
        }

        let now = SystemTime::now();
        if let Some(replaced) = self.nodes.remove(new) {
            debug!("rename replaces {} ({} bytes freed)", new, replaced.size());
            self.used -= replaced.size();
        }

        let moved: Vec<String> = self
            .nodes
            .keys()
            .filter(|key| key.as_str() == old || is_descendant(key, old))
            .cloned()
            .collect();
        for key in moved {
            if let Some(node) = self.nodes.remove(&key) {
                self.nodes.insert(rebase(&key, old, new), node);
            }
        }
        if let Some(node) = self.nodes.get_mut(new) {
            node.ctime = now;
        }

        let source = self.dir_mut(old_parent)?;
        source.remove_child(old_name);
        if moving_dir {
            source.nlink -= 1;
        }
        source.touch_modified(now);

        let target = self.dir_mut(new_parent)?;
        target.add_child(new_name);
        if moving_dir {
            target.nlink += 1;
        }
        target.touch_modified(now);
        Ok(())
    }

    pub fn read(&mut self, path: &str, offset: u64, len: u64) -> FsResult<Vec<u8>> {
        let node = self.file_mut(path)?;
        let bytes = node.slice(offset, len).to_vec();
        node.atime = SystemTime::now();
        Ok(bytes)
    }

    /// Write `bytes` at `offset`, returning the number of bytes written.
    pub fn write(&mut self, path: &str, offset: u64, bytes: &[u8]) -> FsResult<usize> {
        let node = self.lookup(path)?;
        if node.is_dir() {
            return Err(FsError::is_directory(path));
        }
        let old_size = node.size();
        let end = offset
            .checked_add(bytes.len() as u64)
            .ok_or_else(|| FsError::invalid_argument("write extends past the largest offset"))?;
        let start = usize::try_from(offset)
            .map_err(|_| FsError::invalid_argument("write offset too large"))?;
        let new_size = old_size.max(end);
        let delta = new_size - old_size;
        self.ensure_space(path, delta)?;

        let node = self.file_mut(path)?;
        node.write_at(start, bytes);
        let now = SystemTime::now();
        node.mtime = now;
        node.atime = now;
        self.used += delta;
        Ok(bytes.len())
    }

    pub fn truncate(&mut self, path: &str, length: u64) -> FsResult<Attr> {
        let node = self.lookup(path)?;
        if node.is_dir() {
            return Err(FsError::is_directory(path));
        }
        let old_size = node.size();
        let new_len = usize::try_from(length)
            .map_err(|_| FsError::invalid_argument("truncate length too large"))?;
        if length > old_size {
            self.ensure_space(path, length - old_size)?;
        }

        let node = self.file_mut(path)?;
        node.resize(new_len);
        node.mtime = SystemTime::now();
        let attr = node.attr();
        self.used = self.used - old_size + length;
        Ok(attr)
    }

    /// Set access and modification times; `None` leaves a time unchanged.
    pub fn set_times(
        &mut self,
        path: &str,
        atime: Option<SystemTime>,
        mtime: Option<SystemTime>,
    ) -> FsResult<Attr> {
        let node = self.lookup_mut(path)?;
        if let Some(atime) = atime {
            node.atime = atime;
        }
        if let Some(mtime) = mtime {
            node.mtime = mtime;
        }
        node.ctime = SystemTime::now();
        Ok(node.attr())
    }

    /// Replace the permission bits, keeping the file type.
    pub fn set_mode(&mut self, path: &str, mode: u32) -> FsResult<Attr> {
        let node = self.lookup_mut(path)?;
        node.mode = (node.mode & !0o7777) | (mode & 0o7777);
        node.ctime = SystemTime::now();
        Ok(node.attr())
    }

    pub fn set_owner(&mut self, path: &str, uid: Option<u32>, gid: Option<u32>) -> FsResult<Attr> {
        let node = self.lookup_mut(path)?;
        if let Some(uid) = uid {
            node.uid = uid;
        }
        if let Some(gid) = gid {
            node.gid = gid;
        }
        node.ctime = SystemTime::now();
        Ok(node.attr())
    }

    pub fn stat_fs(&self) -> StatFs {
        let blocks = self.capacity / BLOCK_SIZE;
        let blocks_free = self.capacity.saturating_sub(self.used) / BLOCK_SIZE;
        StatFs {
            block_size: BLOCK_SIZE as u32,
            fragment_size: BLOCK_SIZE as u32,
            blocks,
            blocks_free,
            blocks_available: blocks_free,
            files: self.nodes.len() as u64 + blocks_free,
            files_free: blocks_free,
            name_max: MAX_NAME_LEN as u32,
        }
    }
}
