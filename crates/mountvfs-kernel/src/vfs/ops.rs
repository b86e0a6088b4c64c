//! Backend capability traits.
//!
//! Every mounted filesystem implements [`Backend`]: a fixed set of ten
//! path-based operations. The mount layer never looks anything up by name;
//! it calls these methods directly.

use async_trait::async_trait;

use super::types::{DirEntry, ImportStat, OpenFlags, Stat, StatVfs};
use super::VfsResult;

/// A filesystem that can be mounted into the namespace.
///
/// Paths are backend-relative: the mount prefix has already been stripped.
/// An absolute path (`/` first) is relative to the backend's own root, any
/// other path to the backend's own working directory, which only
/// [`chdir`](Backend::chdir) changes.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Open a file.
    async fn open(&self, path: &str, flags: OpenFlags) -> VfsResult<Box<dyn FileHandle>>;

    /// Get file attributes.
    async fn stat(&self, path: &str) -> VfsResult<Stat>;

    /// Get filesystem statistics for the filesystem containing `path`.
    async fn statvfs(&self, path: &str) -> VfsResult<StatVfs>;

    /// Create a directory. The parent must exist.
    async fn mkdir(&self, path: &str) -> VfsResult<()>;

    /// Remove an empty directory.
    async fn rmdir(&self, path: &str) -> VfsResult<()>;

    /// Remove a file.
    async fn remove(&self, path: &str) -> VfsResult<()>;

    /// Rename a file or directory within this backend.
    async fn rename(&self, from: &str, to: &str) -> VfsResult<()>;

    /// Change the backend's working directory.
    async fn chdir(&self, path: &str) -> VfsResult<()>;

    /// The backend's working directory, relative to its own root.
    async fn getcwd(&self) -> VfsResult<String>;

    /// Start listing a directory.
    async fn ilistdir(&self, path: &str) -> VfsResult<Box<dyn DirIter>>;

    /// Fast existence probe.
    ///
    /// Returning `None` makes callers fall back to [`stat`](Backend::stat).
    async fn import_stat(&self, path: &str) -> Option<ImportStat> {
        let _ = path;
        None
    }

    /// Returns true if this filesystem is read-only.
    fn read_only(&self) -> bool {
        false
    }
}

/// A lazy, single-pass directory listing.
#[async_trait]
pub trait DirIter: Send {
    /// The next entry, or `None` once the listing is exhausted.
    async fn next_entry(&mut self) -> VfsResult<Option<DirEntry>>;

    /// Drain the remaining entries.
    async fn collect_entries(&mut self) -> VfsResult<Vec<DirEntry>> {
        let mut entries = Vec::new();
        while let Some(entry) = self.next_entry().await? {
            entries.push(entry);
        }
        Ok(entries)
    }
}

/// Listing over entries that were gathered up front.
#[derive(Debug)]
pub struct VecDirIter {
    entries: std::vec::IntoIter<DirEntry>,
}

impl VecDirIter {
    pub fn new(entries: Vec<DirEntry>) -> Self {
        Self {
            entries: entries.into_iter(),
        }
    }
}

#[async_trait]
impl DirIter for VecDirIter {
    async fn next_entry(&mut self) -> VfsResult<Option<DirEntry>> {
        Ok(self.entries.next())
    }
}

/// An open file.
#[async_trait]
pub trait FileHandle: Send {
    /// Read up to `size` bytes from the current position.
    ///
    /// Returns fewer bytes at EOF, and an empty vector past it.
    async fn read(&mut self, size: usize) -> VfsResult<Vec<u8>>;

    /// Write at the current position (or the end, in append mode).
    ///
    /// Returns the number of bytes written.
    async fn write(&mut self, data: &[u8]) -> VfsResult<usize>;

    /// Push buffered writes to the backend.
    async fn flush(&mut self) -> VfsResult<()> {
        Ok(())
    }

    /// Read from the current position to EOF.
    async fn read_to_end(&mut self) -> VfsResult<Vec<u8>> {
        let mut out = Vec::new();
        loop {
            let chunk = self.read(4096).await?;
            if chunk.is_empty() {
                return Ok(out);
            }
            out.extend_from_slice(&chunk);
        }
    }
}
