//! Cross-cutting concerns
//!
//! Operation logging shared by every dispatcher entry point.

pub mod logging;

pub use logging::{LogRecorder, MemoryLog, OpLog, setup_logging};
