//! VFS mount table.
//!
//! An ordered list of mount entries. Order is precedence: the resolver
//! takes the first entry whose prefix matches a path, so a mount at `/mnt`
//! listed before `/mnt/project` shadows it. Longer prefixes do not win on
//! their own.

use std::sync::Arc;

use super::error::{VfsError, VfsResult};
use super::ops::Backend;

/// One attached backend.
pub struct MountEntry {
    /// Normalized prefix: leading `/`, no trailing `/` (except for root).
    prefix: String,
    backend: Arc<dyn Backend>,
}

impl std::fmt::Debug for MountEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MountEntry")
            .field("prefix", &self.prefix)
            .field("read_only", &self.backend.read_only())
            .finish()
    }
}

impl MountEntry {
    pub fn new(prefix: &str, backend: Arc<dyn Backend>) -> Self {
        Self {
            prefix: normalize_prefix(prefix),
            backend,
        }
    }

    /// The mount prefix, e.g. `/flash` or `/`.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The prefix without its leading slash; empty for a root mount.
    pub fn name(&self) -> &str {
        &self.prefix[1..]
    }

    /// True if mounted exactly at `/`.
    pub fn is_root(&self) -> bool {
        self.prefix == "/"
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }
}

/// Information about a mount point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountInfo {
    /// The mount prefix (e.g., "/flash").
    pub prefix: String,
    /// Whether this mount is read-only.
    pub read_only: bool,
}

/// Normalize a mount prefix: ensure it starts with `/` and has no trailing slash.
pub fn normalize_prefix(prefix: &str) -> String {
    let s = prefix.trim_end_matches('/');
    if s.is_empty() {
        "/".to_string()
    } else if !s.starts_with('/') {
        format!("/{}", s)
    } else {
        s.to_string()
    }
}

/// Ordered mount entries.
///
/// Cloning is cheap and yields a snapshot: later mounts and unmounts on the
/// source table do not show through.
#[derive(Debug, Clone, Default)]
pub struct MountTable {
    entries: Arc<Vec<Arc<MountEntry>>>,
}

impl MountTable {
    /// Create a new empty mount table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a mount. It gets the lowest precedence so far.
    ///
    /// Fails with [`VfsError::AlreadyMounted`] if the prefix is taken, which
    /// also keeps at most one entry at `/`.
    pub fn mount(&mut self, prefix: &str, backend: Arc<dyn Backend>) -> VfsResult<Arc<MountEntry>> {
        let entry = Arc::new(MountEntry::new(prefix, backend));
        if self.get_by_prefix(entry.prefix()).is_some() {
            return Err(VfsError::AlreadyMounted(entry.prefix().to_string()));
        }
        Arc::make_mut(&mut self.entries).push(Arc::clone(&entry));
        Ok(entry)
    }

    /// Remove the mount at `prefix` and return it.
    pub fn unmount(&mut self, prefix: &str) -> VfsResult<Arc<MountEntry>> {
        let prefix = normalize_prefix(prefix);
        let index = self
            .entries
            .iter()
            .position(|e| e.prefix() == prefix)
            .ok_or_else(|| VfsError::mount_not_found(prefix))?;
        Ok(Arc::make_mut(&mut self.entries).remove(index))
    }

    /// Entries in precedence order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<MountEntry>> {
        self.entries.iter()
    }

    /// Entry at `index` in precedence order.
    pub fn get(&self, index: usize) -> Option<&Arc<MountEntry>> {
        self.entries.get(index)
    }

    /// Entry mounted at exactly `prefix`.
    pub fn get_by_prefix(&self, prefix: &str) -> Option<&Arc<MountEntry>> {
        let prefix = normalize_prefix(prefix);
        self.entries.iter().find(|e| e.prefix() == prefix)
    }

    /// The entry mounted at `/`, if any.
    pub fn root_mount(&self) -> Option<&Arc<MountEntry>> {
        self.entries.iter().find(|e| e.is_root())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// List all current mounts.
    pub fn list(&self) -> Vec<MountInfo> {
        self.entries
            .iter()
            .map(|e| MountInfo {
                prefix: e.prefix().to_string(),
                read_only: e.backend().read_only(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::backends::MemoryBackend;

    fn mem() -> Arc<dyn Backend> {
        Arc::new(MemoryBackend::new())
    }

    #[test]
    fn test_normalize_prefix() {
        assert_eq!(normalize_prefix("/"), "/");
        assert_eq!(normalize_prefix(""), "/");
        assert_eq!(normalize_prefix("flash"), "/flash");
        assert_eq!(normalize_prefix("/flash/"), "/flash");
        assert_eq!(normalize_prefix("/mnt/sd//"), "/mnt/sd");
    }

    #[test]
    fn test_entry_name() {
        let table_entry = MountEntry::new("/usb", mem());
        assert_eq!(table_entry.name(), "usb");
        assert!(!table_entry.is_root());

        let root = MountEntry::new("/", mem());
        assert_eq!(root.name(), "");
        assert!(root.is_root());
    }

    #[test]
    fn test_mount_preserves_order() {
        let mut table = MountTable::new();
        table.mount("/flash", mem()).unwrap();
        table.mount("/", mem()).unwrap();
        table.mount("/sd", mem()).unwrap();

        let prefixes: Vec<_> = table.iter().map(|e| e.prefix()).collect();
        assert_eq!(prefixes, vec!["/flash", "/", "/sd"]);
        assert_eq!(table.root_mount().map(|e| e.prefix()), Some("/"));
    }

    #[test]
    fn test_duplicate_prefix_rejected() {
        let mut table = MountTable::new();
        table.mount("/", mem()).unwrap();
        table.mount("/flash", mem()).unwrap();

        assert!(matches!(table.mount("/", mem()), Err(VfsError::AlreadyMounted(_))));
        assert!(matches!(
            table.mount("flash/", mem()),
            Err(VfsError::AlreadyMounted(_))
        ));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_unmount() {
        let mut table = MountTable::new();
        table.mount("/a", mem()).unwrap();
        table.mount("/b", mem()).unwrap();

        let removed = table.unmount("/a/").unwrap();
        assert_eq!(removed.prefix(), "/a");
        assert_eq!(table.len(), 1);
        assert!(matches!(table.unmount("/a"), Err(VfsError::MountNotFound(_))));
    }

    #[test]
    fn test_snapshot_is_isolated() {
        let mut table = MountTable::new();
        table.mount("/a", mem()).unwrap();
        let snapshot = table.clone();

        table.mount("/b", mem()).unwrap();
        table.unmount("/a").unwrap();

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.get(0).map(|e| e.prefix()), Some("/a"));
        assert_eq!(table.get(0).map(|e| e.prefix()), Some("/b"));
    }

    #[test]
    fn test_list_mounts() {
        let mut table = MountTable::new();
        table.mount("/scratch", mem()).unwrap();
        table.mount("/data", mem()).unwrap();

        let mounts = table.list();
        assert_eq!(
            mounts,
            vec![
                MountInfo { prefix: "/scratch".into(), read_only: false },
                MountInfo { prefix: "/data".into(), read_only: false },
            ]
        );
    }
}
