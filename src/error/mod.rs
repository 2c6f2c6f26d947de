//! Error handling
//!
//! Defines the filesystem error taxonomy and its translation to errno values.

pub mod handlers;
pub mod types;

pub use handlers::{errno, report};
pub use types::*;
