//! The VFS session context.
//!
//! [`Vfs`] owns the mount table and the current volume. Every public
//! operation resolves its path and dispatches while holding the read guard;
//! `chdir`, `mount` and `unmount` take the write guard.

use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, trace};

use super::dispatch;
use super::error::{VfsError, VfsResult};
use super::listdir::ListDir;
use super::mount::{MountInfo, MountTable};
use super::ops::{Backend, DirIter, FileHandle};
use super::resolve::{Target, Volume, resolve};
use super::types::{ImportStat, OpenFlags, Stat, StatVfs};

#[derive(Debug, Default)]
struct VfsState {
    table: MountTable,
    current: Volume,
}

impl VfsState {
    fn resolve(&self, path: &str) -> Target {
        resolve(&self.table, &self.current, path)
    }
}

/// Mount table plus working volume: one per interpreter session.
#[derive(Debug, Default)]
pub struct Vfs {
    state: RwLock<VfsState>,
}

impl Vfs {
    /// Create a VFS with nothing mounted.
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Mount table
    // ========================================================================

    /// Mount `backend` at `prefix`, after every existing mount.
    pub async fn mount(&self, prefix: &str, backend: impl Backend + 'static) -> VfsResult<()> {
        self.mount_arc(prefix, Arc::new(backend)).await
    }

    /// Mount an already-shared backend.
    #[tracing::instrument(skip(self, backend), name = "vfs.mount")]
    pub async fn mount_arc(&self, prefix: &str, backend: Arc<dyn Backend>) -> VfsResult<()> {
        let mut state = self.state.write().await;
        let entry = state.table.mount(prefix, backend)?;
        debug!(
            prefix = entry.prefix(),
            read_only = entry.backend().read_only(),
            mounts = state.table.len(),
            "mounted"
        );
        Ok(())
    }

    /// Remove the mount at `prefix` and hand back its backend.
    ///
    /// If it was the current volume, the virtual root becomes current.
    #[tracing::instrument(skip(self), name = "vfs.unmount")]
    pub async fn unmount(&self, prefix: &str) -> VfsResult<Arc<dyn Backend>> {
        let mut state = self.state.write().await;
        let entry = state.table.unmount(prefix)?;

        if let Volume::Mounted(current) = &state.current {
            if Arc::ptr_eq(current, &entry) {
                state.current = Volume::VirtualRoot;
                debug!(prefix = entry.prefix(), "unmounted current volume, back at /");
            }
        }
        debug!(prefix = entry.prefix(), mounts = state.table.len(), "unmounted");
        Ok(Arc::clone(entry.backend()))
    }

    /// Current mounts, in precedence order.
    pub async fn mounts(&self) -> Vec<MountInfo> {
        self.state.read().await.table.list()
    }

    /// Where `path` lands right now.
    pub async fn resolve(&self, path: &str) -> Target {
        self.state.read().await.resolve(path)
    }

    // ========================================================================
    // Files
    // ========================================================================

    /// Open a file with a Python-style mode string (`"r"`, `"wb"`, `"a+"`, ...).
    pub async fn open(&self, path: &str, mode: &str) -> VfsResult<Box<dyn FileHandle>> {
        let flags = OpenFlags::parse(mode)?;
        self.open_with(path, flags).await
    }

    #[tracing::instrument(skip(self), name = "vfs.open")]
    pub async fn open_with(&self, path: &str, flags: OpenFlags) -> VfsResult<Box<dyn FileHandle>> {
        let state = self.state.read().await;
        dispatch::open(&state.resolve(path), flags).await
    }

    #[tracing::instrument(skip(self), name = "vfs.stat")]
    pub async fn stat(&self, path: &str) -> VfsResult<Stat> {
        let state = self.state.read().await;
        dispatch::stat(&state.resolve(path)).await
    }

    /// Filesystem statistics.
    ///
    /// For the virtual root this asks whatever is mounted at `/`, and only
    /// synthesizes a record when nothing is.
    #[tracing::instrument(skip(self), name = "vfs.statvfs")]
    pub async fn statvfs(&self, path: &str) -> VfsResult<StatVfs> {
        let state = self.state.read().await;
        match state.resolve(path) {
            Target::VirtualRoot => match state.table.root_mount() {
                Some(root) => root.backend().statvfs("/").await,
                None => Ok(StatVfs::virtual_root()),
            },
            target => dispatch::statvfs(&target).await,
        }
    }

    #[tracing::instrument(skip(self), name = "vfs.mkdir")]
    pub async fn mkdir(&self, path: &str) -> VfsResult<()> {
        let state = self.state.read().await;
        dispatch::mkdir(&state.resolve(path)).await
    }

    #[tracing::instrument(skip(self), name = "vfs.rmdir")]
    pub async fn rmdir(&self, path: &str) -> VfsResult<()> {
        let state = self.state.read().await;
        dispatch::rmdir(&state.resolve(path)).await
    }

    #[tracing::instrument(skip(self), name = "vfs.remove")]
    pub async fn remove(&self, path: &str) -> VfsResult<()> {
        let state = self.state.read().await;
        dispatch::remove(&state.resolve(path)).await
    }

    /// Rename within one mount. Crossing mounts fails with
    /// [`VfsError::CrossDevice`].
    #[tracing::instrument(skip(self), name = "vfs.rename")]
    pub async fn rename(&self, from: &str, to: &str) -> VfsResult<()> {
        let state = self.state.read().await;
        let from = state.resolve(from);
        let to = state.resolve(to);
        dispatch::rename(&from, &to).await
    }

    /// Cheap existence probe for module loaders.
    ///
    /// Never fails: anything that goes wrong reads as [`ImportStat::NoExist`].
    #[tracing::instrument(skip(self), name = "vfs.import_stat")]
    pub async fn import_stat(&self, path: &str) -> ImportStat {
        let state = self.state.read().await;
        let Target::Mounted { entry, remainder } = state.resolve(path) else {
            return ImportStat::NoExist;
        };

        let backend = entry.backend();
        if let Some(found) = backend.import_stat(&remainder).await {
            return found;
        }
        match backend.stat(&remainder).await {
            Ok(st) if st.is_dir() => ImportStat::Dir,
            Ok(_) => ImportStat::File,
            Err(e) => {
                trace!(path, error = %e, "import_stat: treating as missing");
                ImportStat::NoExist
            }
        }
    }

    // ========================================================================
    // Working directory and listings
    // ========================================================================

    /// Change the working volume and directory.
    ///
    /// Going to `/` also moves a root-mounted backend to its own root, so
    /// relative paths start there.
    #[tracing::instrument(skip(self), name = "vfs.chdir")]
    pub async fn chdir(&self, path: &str) -> VfsResult<()> {
        let mut state = self.state.write().await;
        match state.resolve(path) {
            Target::NotFound(path) => Err(VfsError::mount_not_found(path)),
            Target::VirtualRoot => {
                if let Some(root) = state.table.root_mount() {
                    root.backend().chdir("/").await?;
                }
                state.current = Volume::VirtualRoot;
                debug!("current volume: /");
                Ok(())
            }
            Target::Mounted { entry, remainder } => {
                entry.backend().chdir(&remainder).await?;
                debug!(prefix = entry.prefix(), path = %remainder, "current volume changed");
                state.current = Volume::Mounted(entry);
                Ok(())
            }
        }
    }

    /// Absolute working directory: the current mount's prefix plus the
    /// backend's own working directory.
    #[tracing::instrument(skip(self), name = "vfs.getcwd")]
    pub async fn getcwd(&self) -> VfsResult<String> {
        let state = self.state.read().await;
        let entry = match &state.current {
            Volume::VirtualRoot => return Ok("/".to_string()),
            Volume::Mounted(entry) => entry,
        };

        let cwd = entry.backend().getcwd().await?;
        if entry.is_root() {
            return Ok(cwd);
        }
        if cwd == "/" {
            return Ok(entry.prefix().to_string());
        }
        if cwd.starts_with('/') {
            Ok(format!("{}{}", entry.prefix(), cwd))
        } else {
            Ok(format!("{}/{}", entry.prefix(), cwd))
        }
    }

    /// Names in a directory, in listing order. An empty path lists the
    /// working directory.
    #[tracing::instrument(skip(self), name = "vfs.listdir")]
    pub async fn listdir(&self, path: &str) -> VfsResult<Vec<String>> {
        let mut iter = self.ilistdir(path).await?;
        let mut names = Vec::new();
        while let Some(entry) = iter.next_entry().await? {
            names.push(entry.name);
        }
        Ok(names)
    }

    /// Lazy listing. It sees the mount table as it was when this was called.
    #[tracing::instrument(skip(self), name = "vfs.ilistdir")]
    pub async fn ilistdir(&self, path: &str) -> VfsResult<ListDir> {
        let state = self.state.read().await;
        let target = state.resolve(path);
        ListDir::open(state.table.clone(), &target).await
    }
}
