//! Logging middleware
//!
//! The [`OpLog`] hook sees every authorization check and every filesystem
//! statistics query as an `(operation, path)` pair.

use std::sync::{Arc, Mutex};

use log::{LevelFilter, info};

use crate::ops::Op;

pub trait OpLog: Send {
    fn record(&mut self, op: Op, path: &str);
}

/// Emits one `info` record per operation through the `log` facade
#[derive(Debug, Default, Clone, Copy)]
pub struct LogRecorder;

impl OpLog for LogRecorder {
    fn record(&mut self, op: Op, path: &str) {
        info!("op={} path={}", op, path);
    }
}

/// Keeps every record in memory; clones share the same list
#[derive(Debug, Default, Clone)]
pub struct MemoryLog {
    records: Arc<Mutex<Vec<(Op, String)>>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<(Op, String)> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    /// Number of records for `op`.
    pub fn count(&self, op: Op) -> usize {
        self.records
            .lock()
            .map(|records| records.iter().filter(|(logged, _)| *logged == op).count())
            .unwrap_or(0)
    }
}

impl OpLog for MemoryLog {
    fn record(&mut self, op: Op, path: &str) {
        if let Ok(mut records) = self.records.lock() {
            records.push((op, path.to_string()));
        }
    }
}

/// Map `-v` repetitions to a level: warn, info, then debug.
pub fn verbosity_level(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    }
}

/// Setup logging for the process. `RUST_LOG` takes precedence over `verbose`.
pub fn setup_logging(verbose: u8) {
    let default_level = verbosity_level(verbose).to_string().to_lowercase();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();
}
