//! Mount lifecycle
//!
//! Mountpoint preparation, the background FUSE session and best-effort
//! unmounting through the system `fusermount` helpers.

pub mod fuse;
pub mod inodes;

use std::io;
use std::os::unix::fs::MetadataExt;
use std::path::Path;

use fuser::{BackgroundSession, MountOption};
use log::{debug, info, warn};
use tokio::process::Command;

use crate::config::CanaryConfig;
use crate::ops::CanaryFs;
use crate::storage::Owner;

pub use fuse::CanaryFuse;
pub use inodes::InodeTable;

/// Helpers tried in order when unmounting.
const UNMOUNT_HELPERS: [&str; 2] = ["fusermount3", "fusermount"];

/// Create the mountpoint if missing and return its owner, which becomes the
/// owner of every node in the filesystem.
pub fn ensure_mountpoint(path: &Path) -> io::Result<Owner> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
        info!("created mountpoint {}", path.display());
    }
    let metadata = std::fs::metadata(path)?;
    if !metadata.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("mountpoint {} is not a directory", path.display()),
        ));
    }
    Ok(Owner {
        uid: metadata.uid(),
        gid: metadata.gid(),
    })
}

pub fn mount_options(config: &CanaryConfig) -> Vec<MountOption> {
    let mut options = vec![MountOption::FSName(config.fs_name.clone())];
    if config.auto_unmount {
        options.push(MountOption::AutoUnmount);
    }
    options
}

/// Mount `fs` at `at`. Requests are served one at a time on the session's
/// worker thread until the returned session is dropped.
pub fn mount(fs: CanaryFs, at: &Path, config: &CanaryConfig) -> io::Result<BackgroundSession> {
    let options = mount_options(config);
    debug!("mounting at {} with {:?}", at.display(), options);
    fuser::spawn_mount2(CanaryFuse::new(fs), at, &options)
}

/// Try each unmount helper until one succeeds. Failures are only logged;
/// the mount may already be gone.
pub async fn unmount_best_effort(at: &Path) {
    for helper in UNMOUNT_HELPERS {
        match Command::new(helper).arg("-u").arg(at).status().await {
            Ok(status) if status.success() => {
                info!("unmounted {} with {helper}", at.display());
                return;
            }
            Ok(status) => debug!("{helper} -u {} exited with {status}", at.display()),
            Err(e) => debug!("{helper} unavailable: {e}"),
        }
    }
    warn!("{} may still be mounted", at.display());
}
