//! Operation dispatcher
//!
//! Every entry point follows the same sequence: record the operation, ask the
//! rule engine, and only on approval run the node store operation whose
//! result is handed back unchanged. A denial never reaches the store.

use std::time::SystemTime;

use log::debug;

use crate::access::{RuleEngine, RuleScope};
use crate::error::FsResult;
use crate::middleware::{LogRecorder, OpLog};
use crate::ops::Op;
use crate::storage::{Attr, DirEntry, NodeStore, StatFs};

/// The gated in-memory filesystem
pub struct CanaryFs {
    store: NodeStore,
    access: RuleEngine,
    log: Box<dyn OpLog>,
    next_fh: u64,
}

impl CanaryFs {
    /// Filesystem prompting on the console and logging through `log`.
    pub fn new(capacity: u64, interactive: bool, scope: RuleScope) -> Self {
        Self::with_parts(
            NodeStore::new(capacity),
            RuleEngine::new(interactive, scope),
            LogRecorder,
        )
    }

    pub fn with_parts(store: NodeStore, access: RuleEngine, log: impl OpLog + 'static) -> Self {
        Self {
            store,
            access,
            log: Box::new(log),
            next_fh: 0,
        }
    }

    pub fn store(&self) -> &NodeStore {
        &self.store
    }

    pub fn rules(&self) -> &RuleEngine {
        &self.access
    }

    fn gate(&mut self, op: Op, path: &str) -> FsResult<()> {
        self.log.record(op, path);
        let decision = self.access.authorize(op, path);
        debug!("{op} {path}: {decision}");
        decision.into_result(path)
    }

    fn next_handle(&mut self) -> u64 {
        self.next_fh += 1;
        self.next_fh
    }

    /// Existence check; permission bits are advisory only.
    pub fn access(&mut self, path: &str, _mask: i32) -> FsResult<()> {
        self.gate(Op::Access, path)?;
        self.store.lookup(path)?;
        Ok(())
    }

    pub fn getattr(&mut self, path: &str) -> FsResult<Attr> {
        self.gate(Op::Getattr, path)?;
        Ok(self.store.lookup(path)?.attr())
    }

    pub fn readdir(&mut self, path: &str) -> FsResult<Vec<DirEntry>> {
        self.gate(Op::Readdir, path)?;
        self.store.list(path)
    }

    pub fn mkdir(&mut self, path: &str, mode: u32) -> FsResult<Attr> {
        self.gate(Op::Mkdir, path)?;
        self.store.mkdir(path, mode)
    }

    pub fn rmdir(&mut self, path: &str) -> FsResult<()> {
        self.gate(Op::Rmdir, path)?;
        self.store.rmdir(path)
    }

    pub fn unlink(&mut self, path: &str) -> FsResult<()> {
        self.gate(Op::Unlink, path)?;
        self.store.unlink(path)
    }

    /// Both ends are authorized independently; allowances never follow the
    /// entry to its new path.
    pub fn rename(&mut self, old: &str, new: &str) -> FsResult<()> {
        self.gate(Op::Rename, old)?;
        self.gate(Op::Rename, new)?;
        self.store.rename(old, new)
    }

    /// Returns a fresh handle number; handles carry no state.
    pub fn open(&mut self, path: &str, _flags: i32) -> FsResult<u64> {
        self.gate(Op::Open, path)?;
        self.store.lookup(path)?;
        Ok(self.next_handle())
    }

    pub fn create(&mut self, path: &str, mode: u32) -> FsResult<(Attr, u64)> {
        self.gate(Op::Create, path)?;
        let attr = self.store.create(path, mode)?;
        Ok((attr, self.next_handle()))
    }

    pub fn read(&mut self, path: &str, offset: u64, size: u64) -> FsResult<Vec<u8>> {
        self.gate(Op::Read, path)?;
        self.store.read(path, offset, size)
    }

    pub fn write(&mut self, path: &str, offset: u64, data: &[u8]) -> FsResult<usize> {
        self.gate(Op::Write, path)?;
        self.store.write(path, offset, data)
    }

    pub fn truncate(&mut self, path: &str, length: u64) -> FsResult<Attr> {
        self.gate(Op::Truncate, path)?;
        self.store.truncate(path, length)
    }

    /// `None` leaves the corresponding time unchanged.
    pub fn utimens(
        &mut self,
        path: &str,
        atime: Option<SystemTime>,
        mtime: Option<SystemTime>,
    ) -> FsResult<Attr> {
        self.gate(Op::Utimens, path)?;
        self.store.set_times(path, atime, mtime)
    }

    pub fn chmod(&mut self, path: &str, mode: u32) -> FsResult<Attr> {
        self.gate(Op::Chmod, path)?;
        self.store.set_mode(path, mode)
    }

    pub fn chown(&mut self, path: &str, uid: Option<u32>, gid: Option<u32>) -> FsResult<Attr> {
        self.gate(Op::Chown, path)?;
        self.store.set_owner(path, uid, gid)
    }

    /// Logged but never prompted.
    pub fn statfs(&mut self, path: &str) -> StatFs {
        self.log.record(Op::Statfs, path);
        self.store.stat_fs()
    }
}
