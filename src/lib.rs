pub mod access;
pub mod config;
pub mod error;
pub mod middleware;
pub mod mount;
pub mod ops;
pub mod storage;

pub use ops::CanaryFs;
