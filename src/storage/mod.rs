//! In-memory node storage
//!
//! Holds the directory tree, keyed by absolute path, together with the
//! capacity ceiling and the running count of bytes in use.

pub mod node;
pub mod results;
pub mod store;
pub mod validation;

pub use node::{Node, NodeKind, Owner};
pub use results::{Attr, DirEntry, StatFs};
pub use store::{BLOCK_SIZE, DEFAULT_CAPACITY, NodeStore};
