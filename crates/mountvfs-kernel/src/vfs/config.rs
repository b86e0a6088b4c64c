//! Startup mount table, described in RON.
//!
//! ```ron
//! (
//!     mounts: [
//!         (prefix: "/flash", backend: Memory),
//!         (prefix: "/host", backend: Local(root: "~/work", read_only: true)),
//!     ],
//! )
//! ```
//!
//! Entries are mounted in the order listed, which is also their precedence.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::backends::{LocalBackend, MemoryBackend};
use super::error::VfsError;
use super::ops::Backend;
use super::session::Vfs;

/// Which backend to mount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackendConfig {
    /// Empty in-memory filesystem.
    Memory,
    /// Host directory. `~` is expanded.
    Local {
        root: String,
        #[serde(default)]
        read_only: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountConfig {
    pub prefix: String,
    pub backend: BackendConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VfsConfig {
    #[serde(default)]
    pub mounts: Vec<MountConfig>,
}

/// Error type for loading and applying a mount configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON parse error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("local root {} is not a directory", .0.display())]
    BadRoot(PathBuf),
    #[error("mount failed: {0}")]
    Mount(#[from] VfsError),
}

impl BackendConfig {
    /// Host path for a `Local` root, with `~` expanded.
    fn expand_root(root: &str) -> PathBuf {
        shellexpand::tilde(root).as_ref().into()
    }

    async fn instantiate(&self) -> Result<Arc<dyn Backend>, ConfigError> {
        match self {
            BackendConfig::Memory => Ok(Arc::new(MemoryBackend::new())),
            BackendConfig::Local { root, read_only } => {
                let path = Self::expand_root(root);
                match tokio::fs::metadata(&path).await {
                    Ok(meta) if meta.is_dir() => {}
                    _ => return Err(ConfigError::BadRoot(path)),
                }
                Ok(Arc::new(LocalBackend::new(path).with_read_only(*read_only)))
            }
        }
    }
}

impl VfsConfig {
    pub fn from_ron(text: &str) -> Result<Self, ConfigError> {
        Ok(ron::from_str(text)?)
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = tokio::fs::read_to_string(path.as_ref()).await?;
        Self::from_ron(&text)
    }

    /// Mount every entry, in order, into a fresh [`Vfs`].
    pub async fn build(&self) -> Result<Vfs, ConfigError> {
        let vfs = Vfs::new();
        for mount in &self.mounts {
            let backend = mount.backend.instantiate().await?;
            vfs.mount_arc(&mount.prefix, backend).await?;
        }
        tracing::info!(mounts = self.mounts.len(), "vfs configured");
        Ok(vfs)
    }
}
