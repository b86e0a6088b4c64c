//! # mountvfs-kernel
//!
//! Mount-table virtual filesystem for an embedded-style interpreter.
//!
//! A [`Vfs`] stitches several filesystems into one namespace:
//! - `/` is virtual and lists whatever is mounted
//! - Backends attach at prefixes like `/flash` or `/sd`, or at `/` itself
//! - Relative paths follow the current volume, one working directory per
//!   backend
//! - Renames never cross mounts
//!
//! ```no_run
//! # async fn demo() -> mountvfs_kernel::VfsResult<()> {
//! use mountvfs_kernel::{MemoryBackend, Vfs};
//!
//! let vfs = Vfs::new();
//! vfs.mount("/flash", MemoryBackend::new()).await?;
//! vfs.mkdir("/flash/lib").await?;
//! assert_eq!(vfs.listdir("/").await?, vec!["flash"]);
//! # Ok(())
//! # }
//! ```

pub mod vfs;

pub use vfs::{
    Backend, BackendConfig, ConfigError, DirEntry, DirIter, FileHandle, FileType, ImportStat,
    ListDir, LocalBackend, MemoryBackend, MountInfo, OpenFlags, Stat, StatVfs, Target, Vfs,
    VfsConfig, VfsError, VfsResult,
};
