//! In-memory filesystem backend.
//!
//! Used for scratch mounts and testing. All data is ephemeral.

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::{absolutize, parent_of};
use crate::vfs::error::{VfsError, VfsResult};
use crate::vfs::ops::{Backend, DirIter, FileHandle, VecDirIter};
use crate::vfs::types::{DirEntry, FileType, ImportStat, OpenFlags, Stat, StatVfs, now_secs};

/// Node in the memory filesystem.
#[derive(Debug, Clone)]
enum Node {
    File { data: Vec<u8>, stat: Stat },
    Directory { stat: Stat },
}

impl Node {
    fn stat(&self) -> Stat {
        match self {
            Node::File { stat, .. } | Node::Directory { stat } => *stat,
        }
    }

    fn kind(&self) -> FileType {
        match self {
            Node::File { .. } => FileType::File,
            Node::Directory { .. } => FileType::Directory,
        }
    }
}

/// Nodes keyed by normalized absolute path. `/` always exists.
type Nodes = Arc<RwLock<BTreeMap<String, Node>>>;

/// In-memory filesystem backend.
///
/// Thread-safe via internal locks. Open files share the node map, so a
/// write through a handle is visible to `stat` immediately. All data is
/// lost when the last clone is dropped.
#[derive(Debug)]
pub struct MemoryBackend {
    nodes: Nodes,
    cwd: Mutex<String>,
    next_ino: AtomicU64,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    /// Create a new empty in-memory filesystem.
    pub fn new() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(
            "/".to_string(),
            Node::Directory {
                stat: Stat::directory(0o755).with_ino(1),
            },
        );
        Self {
            nodes: Arc::new(RwLock::new(nodes)),
            cwd: Mutex::new("/".to_string()),
            next_ino: AtomicU64::new(2),
        }
    }

    fn ino(&self) -> u64 {
        self.next_ino.fetch_add(1, Ordering::Relaxed)
    }

    /// Absolute key for a backend path.
    fn key(&self, path: &str) -> String {
        absolutize(&self.cwd.lock(), path)
    }

    /// Fail unless the parent of `key` is an existing directory.
    fn check_parent(nodes: &BTreeMap<String, Node>, key: &str) -> VfsResult<()> {
        let parent = parent_of(key);
        match nodes.get(parent) {
            Some(Node::Directory { .. }) => Ok(()),
            Some(_) => Err(VfsError::not_a_directory(parent)),
            None => Err(VfsError::not_found(parent)),
        }
    }

    /// Keys strictly below `dir`.
    fn descendants(nodes: &BTreeMap<String, Node>, dir: &str) -> Vec<String> {
        let prefix = if dir == "/" { "/".to_string() } else { format!("{}/", dir) };
        nodes
            .range(prefix.clone()..)
            .take_while(|(k, _)| k.starts_with(&prefix))
            .filter(|(k, _)| k.as_str() != "/")
            .map(|(k, _)| k.clone())
            .collect()
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn open(&self, path: &str, flags: OpenFlags) -> VfsResult<Box<dyn FileHandle>> {
        let key = self.key(path);
        let mut nodes = self.nodes.write();

        match nodes.get_mut(&key) {
            Some(Node::Directory { .. }) => return Err(VfsError::is_a_directory(key)),
            Some(Node::File { .. }) if flags.exclusive => {
                return Err(VfsError::already_exists(key));
            }
            Some(Node::File { data, stat }) => {
                if flags.truncate {
                    data.clear();
                    stat.size = 0;
                    stat.mtime = now_secs();
                }
            }
            None if flags.create => {
                Self::check_parent(&nodes, &key)?;
                let stat = Stat::file(0, 0o644).with_ino(self.ino());
                nodes.insert(key.clone(), Node::File { data: Vec::new(), stat });
            }
            None => return Err(VfsError::not_found(key)),
        }

        Ok(Box::new(MemoryFile {
            nodes: Arc::clone(&self.nodes),
            key,
            flags,
            pos: 0,
        }))
    }

    async fn stat(&self, path: &str) -> VfsResult<Stat> {
        let key = self.key(path);
        self.nodes
            .read()
            .get(&key)
            .map(Node::stat)
            .ok_or_else(|| VfsError::not_found(key))
    }

    async fn statvfs(&self, path: &str) -> VfsResult<StatVfs> {
        let key = self.key(path);
        let nodes = self.nodes.read();
        if !nodes.contains_key(&key) {
            return Err(VfsError::not_found(key));
        }

        let mut st = StatVfs::default();
        let bytes: u64 = nodes
            .values()
            .map(|n| match n {
                Node::File { data, .. } => data.len() as u64,
                Node::Directory { .. } => 0,
            })
            .sum();
        let used = bytes.div_ceil(st.bsize);
        st.bfree = st.blocks.saturating_sub(used);
        st.bavail = st.bfree;
        st.ffree = st.files.saturating_sub(nodes.len() as u64);
        st.favail = st.ffree;
        Ok(st)
    }

    async fn mkdir(&self, path: &str) -> VfsResult<()> {
        let key = self.key(path);
        let mut nodes = self.nodes.write();

        if nodes.contains_key(&key) {
            return Err(VfsError::already_exists(key));
        }
        Self::check_parent(&nodes, &key)?;

        let stat = Stat::directory(0o755).with_ino(self.ino());
        nodes.insert(key, Node::Directory { stat });
        Ok(())
    }

    async fn rmdir(&self, path: &str) -> VfsResult<()> {
        let key = self.key(path);
        if key == "/" {
            return Err(VfsError::permission_denied("cannot remove root"));
        }

        let mut nodes = self.nodes.write();
        match nodes.get(&key) {
            Some(Node::Directory { .. }) => {}
            Some(_) => return Err(VfsError::not_a_directory(key)),
            None => return Err(VfsError::not_found(key)),
        }
        if !Self::descendants(&nodes, &key).is_empty() {
            return Err(VfsError::directory_not_empty(key));
        }

        nodes.remove(&key);
        Ok(())
    }

    async fn remove(&self, path: &str) -> VfsResult<()> {
        let key = self.key(path);
        let mut nodes = self.nodes.write();

        match nodes.get(&key) {
            Some(Node::Directory { .. }) => Err(VfsError::is_a_directory(key)),
            Some(_) => {
                nodes.remove(&key);
                Ok(())
            }
            None => Err(VfsError::not_found(key)),
        }
    }

    async fn rename(&self, from: &str, to: &str) -> VfsResult<()> {
        let from = self.key(from);
        let to = self.key(to);
        if from == to {
            return Ok(());
        }
        if from == "/" || to.starts_with(&format!("{}/", from)) {
            return Err(VfsError::invalid_path(format!("cannot move {} into {}", from, to)));
        }

        let mut nodes = self.nodes.write();
        let is_dir = match nodes.get(&from) {
            Some(node) => node.kind().is_dir(),
            None => return Err(VfsError::not_found(from)),
        };
        Self::check_parent(&nodes, &to)?;
        match nodes.get(&to) {
            Some(Node::Directory { .. }) => return Err(VfsError::is_a_directory(to)),
            Some(_) if is_dir => return Err(VfsError::not_a_directory(to)),
            _ => {}
        }

        // Children move with their directory.
        let mut moved = Self::descendants(&nodes, &from);
        moved.push(from.clone());
        for old in moved {
            if let Some(node) = nodes.remove(&old) {
                let new = format!("{}{}", to, &old[from.len()..]);
                nodes.insert(new, node);
            }
        }
        Ok(())
    }

    async fn chdir(&self, path: &str) -> VfsResult<()> {
        let key = self.key(path);
        match self.nodes.read().get(&key) {
            Some(Node::Directory { .. }) => {}
            Some(_) => return Err(VfsError::not_a_directory(key)),
            None => return Err(VfsError::not_found(key)),
        }
        *self.cwd.lock() = key;
        Ok(())
    }

    async fn getcwd(&self) -> VfsResult<String> {
        Ok(self.cwd.lock().clone())
    }

    async fn ilistdir(&self, path: &str) -> VfsResult<Box<dyn DirIter>> {
        let key = self.key(path);
        let nodes = self.nodes.read();

        match nodes.get(&key) {
            Some(Node::Directory { .. }) => {}
            Some(_) => return Err(VfsError::not_a_directory(key)),
            None => return Err(VfsError::not_found(key)),
        }

        // Direct children only, in key order.
        let entries = Self::descendants(&nodes, &key)
            .into_iter()
            .filter(|k| parent_of(k) == key)
            .filter_map(|k| {
                let node = nodes.get(&k)?;
                let name = k.rsplit('/').next()?.to_string();
                Some(DirEntry::new(name, node.kind()).with_ino(node.stat().ino))
            })
            .collect();
        Ok(Box::new(VecDirIter::new(entries)))
    }

    async fn import_stat(&self, path: &str) -> Option<ImportStat> {
        let key = self.key(path);
        Some(match self.nodes.read().get(&key) {
            Some(Node::File { .. }) => ImportStat::File,
            Some(Node::Directory { .. }) => ImportStat::Dir,
            None => ImportStat::NoExist,
        })
    }
}

/// Open file in a [`MemoryBackend`].
#[derive(Debug)]
struct MemoryFile {
    nodes: Nodes,
    key: String,
    flags: OpenFlags,
    pos: usize,
}

#[async_trait]
impl FileHandle for MemoryFile {
    async fn read(&mut self, size: usize) -> VfsResult<Vec<u8>> {
        if !self.flags.read {
            return Err(VfsError::permission_denied(format!("{} not open for reading", self.key)));
        }
        let nodes = self.nodes.read();
        match nodes.get(&self.key) {
            Some(Node::File { data, .. }) => {
                let start = self.pos.min(data.len());
                let end = start.saturating_add(size).min(data.len());
                self.pos = end;
                Ok(data[start..end].to_vec())
            }
            Some(Node::Directory { .. }) => Err(VfsError::is_a_directory(self.key.clone())),
            None => Err(VfsError::not_found(self.key.clone())),
        }
    }

    async fn write(&mut self, buf: &[u8]) -> VfsResult<usize> {
        if !self.flags.is_write() {
            return Err(VfsError::permission_denied(format!("{} not open for writing", self.key)));
        }
        let mut nodes = self.nodes.write();
        match nodes.get_mut(&self.key) {
            Some(Node::File { data, stat }) => {
                if self.flags.append {
                    self.pos = data.len();
                }
                let end = self.pos + buf.len();
                if end > data.len() {
                    data.resize(end, 0);
                }
                data[self.pos..end].copy_from_slice(buf);
                self.pos = end;
                stat.size = data.len() as u64;
                stat.mtime = now_secs();
                Ok(buf.len())
            }
            Some(Node::Directory { .. }) => Err(VfsError::is_a_directory(self.key.clone())),
            None => Err(VfsError::not_found(self.key.clone())),
        }
    }
}
