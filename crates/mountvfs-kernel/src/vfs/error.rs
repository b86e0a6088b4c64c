//! VFS error types.

use std::io;
use thiserror::Error;

/// POSIX errno values reported by [`VfsError::errno`].
pub mod errno {
    pub const EPERM: i32 = 1;
    pub const ENOENT: i32 = 2;
    pub const EIO: i32 = 5;
    pub const EEXIST: i32 = 17;
    pub const EXDEV: i32 = 18;
    pub const ENODEV: i32 = 19;
    pub const ENOTDIR: i32 = 20;
    pub const EISDIR: i32 = 21;
    pub const EINVAL: i32 = 22;
    pub const EROFS: i32 = 30;
    pub const ENOTEMPTY: i32 = 39;
}

/// VFS error type.
///
/// The first group is raised by the mount layer itself. The rest are what
/// backends report for their own operations; the dispatcher passes those
/// through untouched.
#[derive(Debug, Error)]
pub enum VfsError {
    /// Absolute path matched no mount point.
    #[error("no mount point for path: {0}")]
    MountNotFound(String),

    /// A filesystem is already mounted at this prefix.
    #[error("already mounted: {0}")]
    AlreadyMounted(String),

    /// Permission denied (also: mutating the virtual root).
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Path already exists.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Operation spans two different mounts.
    #[error("cross-device operation: {from} -> {to}")]
    CrossDevice { from: String, to: String },

    /// Nothing at the path.
    #[error("not found: {0}")]
    NotFound(String),

    /// Mutation on a read-only backend.
    #[error("filesystem is read-only")]
    ReadOnly,

    /// Expected a directory.
    #[error("not a directory: {0}")]
    NotADirectory(String),

    /// Expected a file.
    #[error("is a directory: {0}")]
    IsADirectory(String),

    /// Directory not empty.
    #[error("directory not empty: {0}")]
    DirectoryNotEmpty(String),

    /// A backend path resolved outside the backend's root.
    #[error("path escapes root: {0}")]
    PathEscapesRoot(String),

    /// Invalid path.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// Malformed open mode string.
    #[error("invalid mode: {0:?}")]
    InvalidMode(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

/// Constructors take anything string-like, usually the offending path.
impl VfsError {
    pub fn mount_not_found(path: impl Into<String>) -> Self {
        Self::MountNotFound(path.into())
    }

    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    pub fn already_exists(path: impl Into<String>) -> Self {
        Self::AlreadyExists(path.into())
    }

    pub fn permission_denied(path: impl Into<String>) -> Self {
        Self::PermissionDenied(path.into())
    }

    pub fn not_a_directory(path: impl Into<String>) -> Self {
        Self::NotADirectory(path.into())
    }

    pub fn is_a_directory(path: impl Into<String>) -> Self {
        Self::IsADirectory(path.into())
    }

    pub fn directory_not_empty(path: impl Into<String>) -> Self {
        Self::DirectoryNotEmpty(path.into())
    }

    pub fn path_escapes_root(path: impl Into<String>) -> Self {
        Self::PathEscapesRoot(path.into())
    }

    pub fn invalid_path(path: impl Into<String>) -> Self {
        Self::InvalidPath(path.into())
    }

    pub fn cross_device(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::CrossDevice {
            from: from.into(),
            to: to.into(),
        }
    }

    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// The POSIX errno a host runtime should raise for this error.
    pub fn errno(&self) -> i32 {
        match self {
            VfsError::MountNotFound(_) => errno::ENODEV,
            VfsError::AlreadyMounted(_) | VfsError::PermissionDenied(_) => errno::EPERM,
            VfsError::PathEscapesRoot(_) => errno::EPERM,
            VfsError::AlreadyExists(_) => errno::EEXIST,
            VfsError::CrossDevice { .. } => errno::EXDEV,
            VfsError::NotFound(_) => errno::ENOENT,
            VfsError::ReadOnly => errno::EROFS,
            VfsError::NotADirectory(_) => errno::ENOTDIR,
            VfsError::IsADirectory(_) => errno::EISDIR,
            VfsError::DirectoryNotEmpty(_) => errno::ENOTEMPTY,
            VfsError::InvalidPath(_) | VfsError::InvalidMode(_) => errno::EINVAL,
            VfsError::Io(e) => e.raw_os_error().unwrap_or(errno::EIO),
            VfsError::Other(_) => errno::EIO,
        }
    }
}

/// Lets callers that speak `std::io` use `?` on VFS results.
impl From<VfsError> for io::Error {
    fn from(e: VfsError) -> Self {
        match e {
            VfsError::MountNotFound(msg) => io::Error::new(io::ErrorKind::NotFound, msg),
            VfsError::AlreadyMounted(msg) => io::Error::new(io::ErrorKind::PermissionDenied, msg),
            VfsError::PermissionDenied(msg) => {
                io::Error::new(io::ErrorKind::PermissionDenied, msg)
            }
            VfsError::AlreadyExists(msg) => io::Error::new(io::ErrorKind::AlreadyExists, msg),
            VfsError::CrossDevice { from, to } => io::Error::new(
                io::ErrorKind::CrossesDevices,
                format!("{} -> {}", from, to),
            ),
            VfsError::NotFound(msg) => io::Error::new(io::ErrorKind::NotFound, msg),
            VfsError::ReadOnly => io::Error::new(
                io::ErrorKind::ReadOnlyFilesystem,
                "filesystem is read-only",
            ),
            VfsError::NotADirectory(msg) => io::Error::new(io::ErrorKind::NotADirectory, msg),
            VfsError::IsADirectory(msg) => io::Error::new(io::ErrorKind::IsADirectory, msg),
            VfsError::DirectoryNotEmpty(msg) => {
                io::Error::new(io::ErrorKind::DirectoryNotEmpty, msg)
            }
            VfsError::PathEscapesRoot(msg) => {
                io::Error::new(io::ErrorKind::PermissionDenied, msg)
            }
            VfsError::InvalidPath(msg) | VfsError::InvalidMode(msg) => {
                io::Error::new(io::ErrorKind::InvalidInput, msg)
            }
            VfsError::Io(e) => e,
            VfsError::Other(msg) => io::Error::other(msg),
        }
    }
}

/// VFS result type.
pub type VfsResult<T> = Result<T, VfsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errno_mapping() {
        assert_eq!(VfsError::mount_not_found("/x").errno(), errno::ENODEV);
        assert_eq!(VfsError::permission_denied("/").errno(), errno::EPERM);
        assert_eq!(VfsError::already_exists("/usb").errno(), errno::EEXIST);
        assert_eq!(VfsError::cross_device("/a/f", "/b/g").errno(), errno::EXDEV);
        assert_eq!(VfsError::ReadOnly.errno(), errno::EROFS);
    }

    #[test]
    fn test_io_errno_passthrough() {
        let err = VfsError::from(io::Error::from_raw_os_error(errno::ENOTEMPTY));
        assert_eq!(err.errno(), errno::ENOTEMPTY);
    }

    #[test]
    fn test_into_io_error() {
        let io_err: io::Error = VfsError::cross_device("/a", "/b").into();
        assert_eq!(io_err.kind(), io::ErrorKind::CrossesDevices);

        let io_err: io::Error = VfsError::mount_not_found("/nope").into();
        assert_eq!(io_err.kind(), io::ErrorKind::NotFound);
    }
}
