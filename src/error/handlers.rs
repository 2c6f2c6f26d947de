//! Error handlers
//!
//! Translates [`FsError`] into the POSIX errno values the kernel expects.

use crate::error::types::FsError;
use log::{debug, warn};

/// Convert an error to the errno reported through the VFS binding
pub fn errno(err: &FsError) -> libc::c_int {
    match err {
        FsError::NotFound(_) => libc::ENOENT,
        FsError::NotDirectory(_) => libc::ENOTDIR,
        FsError::IsDirectory(_) => libc::EISDIR,
        FsError::AlreadyExists(_) => libc::EEXIST,
        FsError::DirectoryNotEmpty(_) => libc::ENOTEMPTY,
        FsError::OutOfSpace { .. } => libc::ENOSPC,
        FsError::PermissionDenied(_) => libc::EACCES,
        FsError::InvalidArgument(_) => libc::EINVAL,
    }
}

/// Log a failed operation and return its errno.
///
/// Denials and full-disk conditions are ordinary outcomes and stay at debug.
pub fn report(err: &FsError) -> libc::c_int {
    match err {
        FsError::InvalidArgument(_) => warn!("{}", err),
        _ => debug!("{}", err),
    }
    errno(err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_denial_is_eacces() {
        assert_eq!(errno(&FsError::permission_denied("/a")), libc::EACCES);
    }

    #[test]
    fn test_out_of_space_is_enospc() {
        let err = FsError::OutOfSpace {
            path: "/f".into(),
            requested: 1,
            available: 0,
        };
        assert_eq!(errno(&err), libc::ENOSPC);
        assert_eq!(report(&err), libc::ENOSPC);
    }

    #[test]
    fn test_tree_errors() {
        assert_eq!(errno(&FsError::not_found("/x")), libc::ENOENT);
        assert_eq!(errno(&FsError::not_directory("/x")), libc::ENOTDIR);
        assert_eq!(errno(&FsError::is_directory("/x")), libc::EISDIR);
        assert_eq!(errno(&FsError::already_exists("/x")), libc::EEXIST);
        assert_eq!(errno(&FsError::directory_not_empty("/x")), libc::ENOTEMPTY);
    }
}
