//! Test doubles for the mount layer.

use async_trait::async_trait;
use parking_lot::Mutex;

use super::backends::MemoryBackend;
use super::error::VfsResult;
use super::ops::{Backend, DirIter, FileHandle};
use super::types::{OpenFlags, Stat, StatVfs};

/// A memory backend that logs every call it receives as `"<op> <args>"`.
///
/// Leaves `import_stat` at the trait default, so callers take the `stat`
/// fallback.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    inner: MemoryBackend,
    calls: Mutex<Vec<String>>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls received so far.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
    }

    fn record(&self, op: &str, args: &[&str]) {
        let mut line = op.to_string();
        for arg in args {
            line.push(' ');
            line.push_str(arg);
        }
        self.calls.lock().push(line);
    }
}

#[async_trait]
impl Backend for RecordingBackend {
    async fn open(&self, path: &str, flags: OpenFlags) -> VfsResult<Box<dyn FileHandle>> {
        self.record("open", &[path]);
        self.inner.open(path, flags).await
    }

    async fn stat(&self, path: &str) -> VfsResult<Stat> {
        self.record("stat", &[path]);
        self.inner.stat(path).await
    }

    async fn statvfs(&self, path: &str) -> VfsResult<StatVfs> {
        self.record("statvfs", &[path]);
        self.inner.statvfs(path).await
    }

    async fn mkdir(&self, path: &str) -> VfsResult<()> {
        self.record("mkdir", &[path]);
        self.inner.mkdir(path).await
    }

    async fn rmdir(&self, path: &str) -> VfsResult<()> {
        self.record("rmdir", &[path]);
        self.inner.rmdir(path).await
    }

    async fn remove(&self, path: &str) -> VfsResult<()> {
        self.record("remove", &[path]);
        self.inner.remove(path).await
    }

    async fn rename(&self, from: &str, to: &str) -> VfsResult<()> {
        self.record("rename", &[from, to]);
        self.inner.rename(from, to).await
    }

    async fn chdir(&self, path: &str) -> VfsResult<()> {
        self.record("chdir", &[path]);
        self.inner.chdir(path).await
    }

    async fn getcwd(&self) -> VfsResult<String> {
        self.record("getcwd", &[]);
        self.inner.getcwd().await
    }

    async fn ilistdir(&self, path: &str) -> VfsResult<Box<dyn DirIter>> {
        self.record("ilistdir", &[path]);
        self.inner.ilistdir(path).await
    }
}
