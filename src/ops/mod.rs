//! Filesystem operations
//!
//! The operation vocabulary and the dispatcher that gates each operation
//! through the access rules before touching the node store.

pub mod handlers;
pub mod op;

pub use handlers::CanaryFs;
pub use op::Op;
