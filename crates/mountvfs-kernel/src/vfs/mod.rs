//! Virtual Filesystem with a mount table.
//!
//! Several filesystems share one namespace rooted at `/`. Key components:
//!
//! - [`Backend`] - Capability trait every mounted filesystem implements
//! - [`MountTable`] - Ordered mount entries; order is precedence
//! - [`resolve()`] - Maps a path to a [`Target`]
//! - [`dispatch`] - Runs an operation against a target
//! - [`ListDir`] - Lazy listing that also covers the virtual root
//! - [`Vfs`] - The session: mount table plus current volume
//! - [`MemoryBackend`] / [`LocalBackend`] - Reference backends
//!
//! ## Design Decisions
//!
//! - **First match wins**: resolution walks the table in order and stops at
//!   the first prefix that ends on a path component boundary.
//! - **Virtual root**: `/` is synthetic. It lists mount points, reports
//!   itself as a directory, and refuses mutation.
//! - **Per-backend cwd**: each backend keeps its own working directory;
//!   the session only remembers which volume is current.

pub mod backends;
pub mod config;
pub mod dispatch;
mod error;
mod listdir;
mod mount;
mod ops;
mod resolve;
mod session;
#[cfg(test)]
mod testing;
mod types;

pub use backends::{LocalBackend, MemoryBackend};
pub use config::{BackendConfig, ConfigError, MountConfig, VfsConfig};
pub use dispatch::{Op, Reply};
pub use error::{VfsError, VfsResult, errno};
pub use listdir::ListDir;
pub use mount::{MountEntry, MountInfo, MountTable, normalize_prefix};
pub use ops::{Backend, DirIter, FileHandle, VecDirIter};
pub use resolve::{Target, Volume, resolve};
pub use session::Vfs;
pub use types::{
    DirEntry, FileType, ImportStat, OpenFlags, PATH_MAX, S_IFDIR, S_IFLNK, S_IFMT, S_IFREG, Stat,
    StatVfs,
};
