//! CanaryFS - Entry Point
//!
//! Mounts a volatile in-memory filesystem that asks on the terminal before
//! letting any process touch it.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use fuser::BackgroundSession;
use log::{info, warn};

use canaryfs::CanaryFs;
use canaryfs::access::{RuleEngine, RuleScope};
use canaryfs::config::CanaryConfig;
use canaryfs::middleware::{LogRecorder, setup_logging};
use canaryfs::mount;
use canaryfs::storage::NodeStore;

#[derive(Debug, Parser)]
#[command(name = "canaryfs", version, about)]
struct Cli {
    /// Directory to mount on; created if missing
    #[arg(long)]
    mount: PathBuf,

    /// Prompt before every operation (the default)
    #[arg(long, overrides_with = "no_ask")]
    ask: bool,

    /// Approve every operation without prompting
    #[arg(long = "no-ask", overrides_with = "ask")]
    no_ask: bool,

    /// Key allowances by operation and path, or by path alone
    #[arg(long = "ask-scope", value_enum)]
    ask_scope: Option<RuleScope>,

    /// Capacity ceiling in bytes
    #[arg(long)]
    capacity: Option<u64>,

    /// Configuration file (defaults to ./canaryfs.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    /// Command-line flags win over every other configuration layer.
    fn apply(&self, config: &mut CanaryConfig) {
        if self.ask {
            config.ask = true;
        } else if self.no_ask {
            config.ask = false;
        }
        if let Some(scope) = self.ask_scope {
            config.ask_scope = scope;
        }
        if let Some(capacity) = self.capacity {
            config.capacity_bytes = capacity;
        }
    }
}

/// Resolves once the session's worker thread has stopped.
async fn session_finished(session: &BackgroundSession) {
    let mut ticker = tokio::time::interval(Duration::from_millis(500));
    while !session.guard.is_finished() {
        ticker.tick().await;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let mut config =
        CanaryConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    cli.apply(&mut config);
    config.validate().context("invalid configuration")?;

    let owner = mount::ensure_mountpoint(&cli.mount)
        .with_context(|| format!("cannot use mountpoint {}", cli.mount.display()))?;
    let fs = CanaryFs::with_parts(
        NodeStore::with_owner(config.capacity_bytes, owner),
        RuleEngine::new(config.ask, config.ask_scope),
        LogRecorder,
    );

    let session = mount::mount(fs, &cli.mount, &config)
        .with_context(|| format!("failed to mount {}", cli.mount.display()))?;
    info!(
        "mounted at {} (capacity {} bytes, prompts {}, scope {:?})",
        cli.mount.display(),
        config.capacity_bytes,
        if config.ask { "on" } else { "off" },
        config.ask_scope
    );

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for Ctrl-C")?;
            info!("interrupted, unmounting");
        }
        _ = session_finished(&session) => warn!("filesystem session ended"),
    }

    drop(session);
    mount::unmount_best_effort(&cli.mount).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::parse_from([
            "canaryfs",
            "--mount",
            "/tmp/x",
            "--no-ask",
            "--ask-scope",
            "path",
            "--capacity",
            "20",
            "-vv",
        ]);
        let mut config = CanaryConfig::default();
        cli.apply(&mut config);

        assert!(!config.ask);
        assert_eq!(config.ask_scope, RuleScope::PerPath);
        assert_eq!(config.capacity_bytes, 20);
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_last_ask_flag_wins() {
        let cli = Cli::parse_from(["canaryfs", "--mount", "/m", "--no-ask", "--ask"]);
        let mut config = CanaryConfig {
            ask: false,
            ..CanaryConfig::default()
        };
        cli.apply(&mut config);
        assert!(config.ask);
    }

    #[test]
    fn test_mount_is_required() {
        assert!(Cli::try_parse_from(["canaryfs"]).is_err());
    }
}
