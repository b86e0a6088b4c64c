//! Lazy directory listing across mounts.
//!
//! Listing the virtual root walks the mount table, yielding one directory
//! entry per mount point. A mount at `/` ends the walk: its backend's own
//! root listing is forwarded instead, and mounts after it are never
//! reported.

use async_trait::async_trait;

use super::dispatch;
use super::error::{VfsError, VfsResult};
use super::mount::MountTable;
use super::ops::DirIter;
use super::resolve::Target;
use super::types::DirEntry;

enum State {
    /// Emitting synthetic entries; `cursor` is the next table index.
    WalkingMounts { mounts: MountTable, cursor: usize },
    /// Forwarding a backend listing.
    Delegated(Box<dyn DirIter>),
    Done,
}

/// Directory iterator returned by [`Vfs::ilistdir`](super::Vfs::ilistdir).
///
/// Holds its own snapshot of the mount table, so mounts added or removed
/// while it is alive do not show up in it.
pub struct ListDir {
    state: State,
}

impl std::fmt::Debug for ListDir {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &self.state {
            State::WalkingMounts { cursor, .. } => format!("WalkingMounts({})", cursor),
            State::Delegated(_) => "Delegated".to_string(),
            State::Done => "Done".to_string(),
        };
        f.debug_struct("ListDir").field("state", &state).finish()
    }
}

impl ListDir {
    /// Start listing `target`.
    ///
    /// A mounted target opens the backend listing right away, so errors like
    /// a missing directory surface here rather than on the first `next`.
    pub async fn open(mounts: MountTable, target: &Target) -> VfsResult<Self> {
        let state = match target {
            Target::VirtualRoot => State::WalkingMounts { mounts, cursor: 0 },
            Target::Mounted { .. } => State::Delegated(dispatch::ilistdir(target).await?),
            Target::NotFound(path) => return Err(VfsError::mount_not_found(path.clone())),
        };
        Ok(Self { state })
    }
}

#[async_trait]
impl DirIter for ListDir {
    async fn next_entry(&mut self) -> VfsResult<Option<DirEntry>> {
        loop {
            match &mut self.state {
                State::Done => return Ok(None),
                State::Delegated(inner) => {
                    let entry = inner.next_entry().await?;
                    if entry.is_none() {
                        self.state = State::Done;
                    }
                    return Ok(entry);
                }
                State::WalkingMounts { mounts, cursor } => {
                    let Some(entry) = mounts.get(*cursor).cloned() else {
                        self.state = State::Done;
                        return Ok(None);
                    };
                    *cursor += 1;

                    if entry.is_root() {
                        let inner = entry.backend().ilistdir("/").await?;
                        self.state = State::Delegated(inner);
                        continue;
                    }
                    return Ok(Some(DirEntry::directory(entry.name())));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::backends::MemoryBackend;
    use crate::vfs::ops::Backend;
    use crate::vfs::testing::RecordingBackend;
    use crate::vfs::types::OpenFlags;
    use std::sync::Arc;

    async fn names(mut iter: ListDir) -> Vec<String> {
        iter.collect_entries()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect()
    }

    #[tokio::test]
    async fn test_lists_mount_points_in_order() {
        let mut table = MountTable::new();
        table.mount("/usb", Arc::new(MemoryBackend::new())).unwrap();
        table.mount("/flash", Arc::new(MemoryBackend::new())).unwrap();

        let mut iter = ListDir::open(table, &Target::VirtualRoot).await.unwrap();
        let usb = iter.next_entry().await.unwrap().unwrap();
        assert_eq!(usb.name, "usb");
        assert!(usb.kind.is_dir());
        assert_eq!(usb.ino, 0);
        assert_eq!(iter.next_entry().await.unwrap().unwrap().name, "flash");
        assert!(iter.next_entry().await.unwrap().is_none());
        // Stays exhausted.
        assert!(iter.next_entry().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_empty_table() {
        let iter = ListDir::open(MountTable::new(), &Target::VirtualRoot).await.unwrap();
        assert!(names(iter).await.is_empty());
    }

    #[tokio::test]
    async fn test_root_mount_takes_over() {
        let root = Arc::new(MemoryBackend::new());
        root.mkdir("/lib").await.unwrap();
        root.open("/boot.py", OpenFlags::create_truncate()).await.unwrap();

        let mut table = MountTable::new();
        table.mount("/flash", Arc::new(MemoryBackend::new())).unwrap();
        table.mount("/", root).unwrap();
        table.mount("/sd", Arc::new(MemoryBackend::new())).unwrap();

        let iter = ListDir::open(table, &Target::VirtualRoot).await.unwrap();
        assert_eq!(names(iter).await, vec!["flash", "boot.py", "lib"]);
    }

    #[tokio::test]
    async fn test_root_mount_listed_at_root_path() {
        let root = Arc::new(RecordingBackend::new());
        let mut table = MountTable::new();
        table.mount("/", root.clone()).unwrap();

        let iter = ListDir::open(table, &Target::VirtualRoot).await.unwrap();
        assert!(names(iter).await.is_empty());
        assert_eq!(root.calls(), vec!["ilistdir /"]);
    }

    #[tokio::test]
    async fn test_delegates_mounted_target() {
        let backend = Arc::new(RecordingBackend::new());
        backend.mkdir("/docs").await.unwrap();
        backend.open("/docs/a.txt", OpenFlags::create_truncate()).await.unwrap();
        backend.clear();

        let mut table = MountTable::new();
        let entry = table.mount("/usb", backend.clone()).unwrap();
        let target = Target::mounted(entry, "/docs");

        let iter = ListDir::open(table, &target).await.unwrap();
        assert_eq!(names(iter).await, vec!["a.txt"]);
        assert_eq!(backend.calls(), vec!["ilistdir /docs"]);
    }

    #[tokio::test]
    async fn test_open_errors() {
        let table = MountTable::new();
        let err = ListDir::open(table.clone(), &Target::NotFound("/nope".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, VfsError::MountNotFound(_)));

        let mut table = MountTable::new();
        let entry = table.mount("/usb", Arc::new(MemoryBackend::new())).unwrap();
        let err = ListDir::open(table, &Target::mounted(entry, "/missing"))
            .await
            .unwrap_err();
        assert!(matches!(err, VfsError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_snapshot_ignores_later_mounts() {
        let mut table = MountTable::new();
        table.mount("/a", Arc::new(MemoryBackend::new())).unwrap();

        let iter = ListDir::open(table.clone(), &Target::VirtualRoot).await.unwrap();
        table.mount("/b", Arc::new(MemoryBackend::new())).unwrap();
        table.unmount("/a").unwrap();

        assert_eq!(names(iter).await, vec!["a"]);
    }
}
