//! VFS binding
//!
//! Adapts kernel requests, which name nodes by inode number, onto the
//! path-based [`CanaryFs`] dispatcher. Every failure is reported through
//! [`crate::error::report`] so the kernel sees the matching errno.

use std::ffi::OsStr;
use std::time::{Duration, SystemTime};

use fuser::{
    FileAttr, FileType, Filesystem, KernelConfig, ReplyAttr, ReplyCreate, ReplyData,
    ReplyDirectory, ReplyEmpty, ReplyEntry, ReplyOpen, ReplyStatfs, ReplyWrite, Request,
    TimeOrNow,
};
use log::{debug, info};

use crate::error::{FsError, report};
use crate::mount::inodes::InodeTable;
use crate::ops::CanaryFs;
use crate::storage::{Attr, BLOCK_SIZE, NodeKind};

const TTL: Duration = Duration::from_secs(1);

fn file_type(kind: NodeKind) -> FileType {
    match kind {
        NodeKind::File => FileType::RegularFile,
        NodeKind::Directory => FileType::Directory,
    }
}

fn file_attr(attr: &Attr) -> FileAttr {
    FileAttr {
        ino: attr.ino,
        size: attr.size,
        blocks: attr.size.div_ceil(512),
        atime: attr.atime,
        mtime: attr.mtime,
        ctime: attr.ctime,
        crtime: attr.crtime,
        kind: file_type(attr.kind),
        perm: attr.perm(),
        nlink: attr.nlink,
        uid: attr.uid,
        gid: attr.gid,
        rdev: 0,
        blksize: BLOCK_SIZE as u32,
        flags: 0,
    }
}

fn resolve_time(time: TimeOrNow) -> SystemTime {
    match time {
        TimeOrNow::SpecificTime(at) => at,
        TimeOrNow::Now => SystemTime::now(),
    }
}

/// Kernel-facing filesystem
pub struct CanaryFuse {
    fs: CanaryFs,
    inodes: InodeTable,
}

impl CanaryFuse {
    pub fn new(fs: CanaryFs) -> Self {
        Self {
            fs,
            inodes: InodeTable::new(),
        }
    }

    fn path(&self, ino: u64) -> Result<String, libc::c_int> {
        self.inodes
            .path(ino)
            .map(str::to_string)
            .ok_or(libc::ENOENT)
    }

    fn child(&self, parent: u64, name: &OsStr) -> Result<String, libc::c_int> {
        let name = name.to_str().ok_or(libc::EINVAL)?;
        self.inodes.child_path(parent, name).ok_or(libc::ENOENT)
    }

    /// Apply each requested change in turn, each one gated on its own.
    ///
    /// A single setattr is therefore not atomic: changes approved before a
    /// denied or failing one stay applied, and the kernel only sees the
    /// error. Each individual change still either happens fully or not at
    /// all.
    fn apply_setattr(
        &mut self,
        path: &str,
        mode: Option<u32>,
        uid: Option<u32>,
        gid: Option<u32>,
        size: Option<u64>,
        atime: Option<TimeOrNow>,
        mtime: Option<TimeOrNow>,
    ) -> Result<Attr, FsError> {
        let mut attr = None;
        if let Some(mode) = mode {
            attr = Some(self.fs.chmod(path, mode)?);
        }
        if uid.is_some() || gid.is_some() {
            attr = Some(self.fs.chown(path, uid, gid)?);
        }
        if let Some(size) = size {
            attr = Some(self.fs.truncate(path, size)?);
        }
        if atime.is_some() || mtime.is_some() {
            attr = Some(self.fs.utimens(
                path,
                atime.map(resolve_time),
                mtime.map(resolve_time),
            )?);
        }
        match attr {
            Some(attr) => Ok(attr),
            None => self.fs.getattr(path),
        }
    }
}

impl Filesystem for CanaryFuse {
    fn init(&mut self, _req: &Request<'_>, _config: &mut KernelConfig) -> Result<(), libc::c_int> {
        let rules = self.fs.rules();
        info!(
            "filesystem ready, capacity {} bytes, prompts {}, scope {:?}",
            self.fs.store().capacity(),
            if rules.is_interactive() { "on" } else { "off" },
            rules.scope()
        );
        Ok(())
    }

    fn destroy(&mut self) {
        info!("filesystem unmounted, {} bytes in use", self.fs.store().used());
    }

    fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        let path = match self.child(parent, name) {
            Ok(path) => path,
            Err(errno) => return reply.error(errno),
        };
        match self.fs.getattr(&path) {
            Ok(attr) => {
                self.inodes.insert(attr.ino, &path);
                reply.entry(&TTL, &file_attr(&attr), 0);
            }
            Err(e) => reply.error(report(&e)),
        }
    }

    fn getattr(&mut self, _req: &Request<'_>, ino: u64, _fh: Option<u64>, reply: ReplyAttr) {
        let path = match self.path(ino) {
            Ok(path) => path,
            Err(errno) => return reply.error(errno),
        };
        match self.fs.getattr(&path) {
            Ok(attr) => reply.attr(&TTL, &file_attr(&attr)),
            Err(e) => reply.error(report(&e)),
        }
    }

    fn setattr(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        mode: Option<u32>,
        uid: Option<u32>,
        gid: Option<u32>,
        size: Option<u64>,
        atime: Option<TimeOrNow>,
        mtime: Option<TimeOrNow>,
        _ctime: Option<SystemTime>,
        _fh: Option<u64>,
        _crtime: Option<SystemTime>,
        _chgtime: Option<SystemTime>,
        _bkuptime: Option<SystemTime>,
        _flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        let path = match self.path(ino) {
            Ok(path) => path,
            Err(errno) => return reply.error(errno),
        };
        match self.apply_setattr(&path, mode, uid, gid, size, atime, mtime) {
            Ok(attr) => reply.attr(&TTL, &file_attr(&attr)),
            Err(e) => reply.error(report(&e)),
        }
    }

    fn readdir(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        let path = match self.path(ino) {
            Ok(path) => path,
            Err(errno) => return reply.error(errno),
        };
        let entries = match self.fs.readdir(&path) {
            Ok(entries) => entries,
            Err(e) => return reply.error(report(&e)),
        };

        let skip = usize::try_from(offset).unwrap_or(0);
        for (i, entry) in entries.iter().enumerate().skip(skip) {
            // true once the reply buffer is full
            if reply.add(entry.ino, (i + 1) as i64, file_type(entry.kind), &entry.name) {
                break;
            }
        }
        reply.ok();
    }

    fn mkdir(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        mode: u32,
        umask: u32,
        reply: ReplyEntry,
    ) {
        let path = match self.child(parent, name) {
            Ok(path) => path,
            Err(errno) => return reply.error(errno),
        };
        match self.fs.mkdir(&path, mode & !umask) {
            Ok(attr) => {
                self.inodes.insert(attr.ino, &path);
                reply.entry(&TTL, &file_attr(&attr), 0);
            }
            Err(e) => reply.error(report(&e)),
        }
    }

    fn create(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        mode: u32,
        umask: u32,
        _flags: i32,
        reply: ReplyCreate,
    ) {
        let path = match self.child(parent, name) {
            Ok(path) => path,
            Err(errno) => return reply.error(errno),
        };
        match self.fs.create(&path, mode & !umask) {
            Ok((attr, fh)) => {
                self.inodes.insert(attr.ino, &path);
                reply.created(&TTL, &file_attr(&attr), 0, fh, 0);
            }
            Err(e) => reply.error(report(&e)),
        }
    }

    fn unlink(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let path = match self.child(parent, name) {
            Ok(path) => path,
            Err(errno) => return reply.error(errno),
        };
        match self.fs.unlink(&path) {
            Ok(()) => {
                self.inodes.remove_path(&path);
                reply.ok();
            }
            Err(e) => reply.error(report(&e)),
        }
    }

    fn rmdir(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let path = match self.child(parent, name) {
            Ok(path) => path,
            Err(errno) => return reply.error(errno),
        };
        match self.fs.rmdir(&path) {
            Ok(()) => {
                self.inodes.remove_path(&path);
                reply.ok();
            }
            Err(e) => reply.error(report(&e)),
        }
    }

    fn rename(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        newparent: u64,
        newname: &OsStr,
        flags: u32,
        reply: ReplyEmpty,
    ) {
        if flags != 0 {
            debug!("rename flags {flags:#x} not supported");
            return reply.error(libc::EINVAL);
        }
        let paths = self
            .child(parent, name)
            .and_then(|old| Ok((old, self.child(newparent, newname)?)));
        let (old, new) = match paths {
            Ok(paths) => paths,
            Err(errno) => return reply.error(errno),
        };
        match self.fs.rename(&old, &new) {
            Ok(()) => {
                self.inodes.rename(&old, &new);
                reply.ok();
            }
            Err(e) => reply.error(report(&e)),
        }
    }

    fn open(&mut self, _req: &Request<'_>, ino: u64, flags: i32, reply: ReplyOpen) {
        let path = match self.path(ino) {
            Ok(path) => path,
            Err(errno) => return reply.error(errno),
        };
        match self.fs.open(&path, flags) {
            Ok(fh) => reply.opened(fh, 0),
            Err(e) => reply.error(report(&e)),
        }
    }

    fn read(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        let path = match self.path(ino) {
            Ok(path) => path,
            Err(errno) => return reply.error(errno),
        };
        let offset = u64::try_from(offset).unwrap_or(0);
        match self.fs.read(&path, offset, u64::from(size)) {
            Ok(bytes) => reply.data(&bytes),
            Err(e) => reply.error(report(&e)),
        }
    }

    fn write(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        let path = match self.path(ino) {
            Ok(path) => path,
            Err(errno) => return reply.error(errno),
        };
        let offset = u64::try_from(offset).unwrap_or(0);
        match self.fs.write(&path, offset, data) {
            Ok(written) => reply.written(written as u32),
            Err(e) => reply.error(report(&e)),
        }
    }

    fn release(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        _fh: u64,
        _flags: i32,
        _lock_owner: Option<u64>,
        _flush: bool,
        reply: ReplyEmpty,
    ) {
        reply.ok();
    }

    fn statfs(&mut self, _req: &Request<'_>, ino: u64, reply: ReplyStatfs) {
        let path = self.path(ino).unwrap_or_else(|_| "/".to_string());
        let stats = self.fs.statfs(&path);
        reply.statfs(
            stats.blocks,
            stats.blocks_free,
            stats.blocks_available,
            stats.files,
            stats.files_free,
            stats.block_size,
            stats.name_max,
            stats.fragment_size,
        );
    }

    fn access(&mut self, _req: &Request<'_>, ino: u64, mask: i32, reply: ReplyEmpty) {
        let path = match self.path(ino) {
            Ok(path) => path,
            Err(errno) => return reply.error(errno),
        };
        match self.fs.access(&path, mask) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(report(&e)),
        }
    }
}
