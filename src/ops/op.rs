//! Operation vocabulary
//!
//! The names under which filesystem requests are authorized and logged.

use std::fmt;

/// A filesystem operation as seen by the access gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Access,
    Getattr,
    Readdir,
    Mkdir,
    Rmdir,
    Unlink,
    Rename,
    Open,
    Create,
    Read,
    Write,
    Truncate,
    Utimens,
    Chmod,
    Chown,
    Statfs,
}

impl Op {
    pub const fn as_str(self) -> &'static str {
        match self {
            Op::Access => "access",
            Op::Getattr => "getattr",
            Op::Readdir => "readdir",
            Op::Mkdir => "mkdir",
            Op::Rmdir => "rmdir",
            Op::Unlink => "unlink",
            Op::Rename => "rename",
            Op::Open => "open",
            Op::Create => "create",
            Op::Read => "read",
            Op::Write => "write",
            Op::Truncate => "truncate",
            Op::Utimens => "utimens",
            Op::Chmod => "chmod",
            Op::Chown => "chown",
            Op::Statfs => "statfs",
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
