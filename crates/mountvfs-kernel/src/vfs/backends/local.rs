//! Local filesystem backend.
//!
//! Provides access to real filesystem paths, with path security
//! to prevent escaping the root directory.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use super::absolutize;
use crate::vfs::error::{VfsError, VfsResult};
use crate::vfs::ops::{Backend, DirIter, FileHandle};
use crate::vfs::types::{DirEntry, FileType, OpenFlags, Stat, StatVfs};

/// Local filesystem backend.
///
/// All operations are relative to `root`. For example, if `root` is
/// `/home/amy/board`, then `stat("/lib/main.py")` looks at
/// `/home/amy/board/lib/main.py`.
///
/// `..` never climbs above `root`, and a symlink that points outside it is
/// refused with [`VfsError::PathEscapesRoot`].
#[derive(Debug)]
pub struct LocalBackend {
    root: PathBuf,
    read_only: bool,
    cwd: Mutex<String>,
}

impl LocalBackend {
    /// Create a new local filesystem rooted at the given path.
    ///
    /// The root is canonicalized at construction time to handle symlinks
    /// (e.g. macOS `/tmp` → `/private/tmp`).
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root: PathBuf = root.into();
        let root = dunce::canonicalize(&root).unwrap_or(root);
        Self {
            root,
            read_only: false,
            cwd: Mutex::new("/".to_string()),
        }
    }

    /// Builder-style read-only switch.
    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Set whether this filesystem is read-only.
    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    /// Get the root path.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Backend path to host path, plus the normalized backend path.
    fn resolve(&self, path: &str) -> VfsResult<(PathBuf, String)> {
        let abs = absolutize(&self.cwd.lock(), path);
        let rel = abs.trim_start_matches('/');
        let full = if rel.is_empty() {
            self.root.clone()
        } else {
            self.root.join(rel)
        };

        // Symlinks can still point outside. New files are checked through
        // their parent.
        let canonical = if full.exists() {
            dunce::canonicalize(&full)?
        } else {
            match (full.parent(), full.file_name()) {
                (Some(parent), Some(name)) if parent.exists() => {
                    dunce::canonicalize(parent)?.join(name)
                }
                _ => full,
            }
        };

        if !canonical.starts_with(&self.root) {
            return Err(VfsError::path_escapes_root(format!(
                "{} is not under {}",
                canonical.display(),
                self.root.display()
            )));
        }

        Ok((canonical, abs))
    }

    /// Check if write operations are allowed.
    fn check_writable(&self) -> VfsResult<()> {
        if self.read_only {
            Err(VfsError::ReadOnly)
        } else {
            Ok(())
        }
    }

    /// Convert std::fs::Metadata to Stat.
    fn metadata_to_stat(meta: &std::fs::Metadata) -> Stat {
        let secs = |t: i64| t.max(0) as u64;
        Stat {
            mode: meta.mode(),
            ino: meta.ino(),
            dev: meta.dev(),
            nlink: meta.nlink(),
            uid: meta.uid(),
            gid: meta.gid(),
            size: meta.size(),
            atime: secs(meta.atime()),
            mtime: secs(meta.mtime()),
            ctime: secs(meta.ctime()),
        }
    }

    fn file_type(ft: std::fs::FileType) -> FileType {
        if ft.is_dir() {
            FileType::Directory
        } else if ft.is_symlink() {
            FileType::Symlink
        } else {
            FileType::File
        }
    }
}

#[async_trait]
impl Backend for LocalBackend {
    async fn open(&self, path: &str, flags: OpenFlags) -> VfsResult<Box<dyn FileHandle>> {
        if flags.is_write() || flags.create {
            self.check_writable()?;
        }
        let (full, abs) = self.resolve(path)?;
        if fs::metadata(&full).await.is_ok_and(|m| m.is_dir()) {
            return Err(VfsError::is_a_directory(abs));
        }

        let mut options = fs::OpenOptions::new();
        options
            .read(flags.read)
            .write(flags.write)
            .append(flags.append)
            .truncate(flags.truncate);
        if flags.exclusive {
            options.create_new(true);
        } else {
            options.create(flags.create);
        }

        let file = options.open(&full).await?;
        Ok(Box::new(LocalFile { file }))
    }

    async fn stat(&self, path: &str) -> VfsResult<Stat> {
        let (full, _) = self.resolve(path)?;
        let meta = fs::metadata(&full).await?;
        Ok(Self::metadata_to_stat(&meta))
    }

    async fn statvfs(&self, path: &str) -> VfsResult<StatVfs> {
        let (full, _) = self.resolve(path)?;

        #[cfg(unix)]
        {
            use rustix::fs::statvfs;

            let st = statvfs(&full).map_err(|e| VfsError::Io(e.into()))?;

            Ok(StatVfs {
                bsize: st.f_bsize,
                frsize: st.f_frsize,
                blocks: st.f_blocks,
                bfree: st.f_bfree,
                bavail: st.f_bavail,
                files: st.f_files,
                ffree: st.f_ffree,
                favail: st.f_favail,
                flags: st.f_flag.bits(),
                namemax: st.f_namemax,
            })
        }

        #[cfg(not(unix))]
        {
            let _ = full;
            Ok(StatVfs::default())
        }
    }

    async fn mkdir(&self, path: &str) -> VfsResult<()> {
        self.check_writable()?;
        let (full, _) = self.resolve(path)?;
        fs::create_dir(&full).await.map_err(VfsError::from)
    }

    async fn rmdir(&self, path: &str) -> VfsResult<()> {
        self.check_writable()?;
        let (full, _) = self.resolve(path)?;
        if full == self.root {
            return Err(VfsError::permission_denied("cannot remove mount root"));
        }
        fs::remove_dir(&full).await.map_err(VfsError::from)
    }

    async fn remove(&self, path: &str) -> VfsResult<()> {
        self.check_writable()?;
        let (full, _) = self.resolve(path)?;
        fs::remove_file(&full).await.map_err(VfsError::from)
    }

    async fn rename(&self, from: &str, to: &str) -> VfsResult<()> {
        self.check_writable()?;
        let (from_path, _) = self.resolve(from)?;
        let (to_path, _) = self.resolve(to)?;
        fs::rename(&from_path, &to_path)
            .await
            .map_err(VfsError::from)
    }

    async fn chdir(&self, path: &str) -> VfsResult<()> {
        let (full, abs) = self.resolve(path)?;
        let meta = fs::metadata(&full).await?;
        if !meta.is_dir() {
            return Err(VfsError::not_a_directory(abs));
        }
        *self.cwd.lock() = abs;
        Ok(())
    }

    async fn getcwd(&self) -> VfsResult<String> {
        Ok(self.cwd.lock().clone())
    }

    async fn ilistdir(&self, path: &str) -> VfsResult<Box<dyn DirIter>> {
        let (full, _) = self.resolve(path)?;
        let dir = fs::read_dir(&full).await?;
        Ok(Box::new(LocalDirIter { dir }))
    }

    fn read_only(&self) -> bool {
        self.read_only
    }
}

/// Open file in a [`LocalBackend`].
#[derive(Debug)]
struct LocalFile {
    file: fs::File,
}

#[async_trait]
impl FileHandle for LocalFile {
    async fn read(&mut self, size: usize) -> VfsResult<Vec<u8>> {
        let mut buffer = Vec::with_capacity(size.min(64 * 1024));
        (&mut self.file)
            .take(size as u64)
            .read_to_end(&mut buffer)
            .await?;
        Ok(buffer)
    }

    async fn write(&mut self, data: &[u8]) -> VfsResult<usize> {
        self.file.write_all(data).await?;
        // tokio completes writes in the background until flushed.
        self.file.flush().await?;
        Ok(data.len())
    }

    async fn flush(&mut self) -> VfsResult<()> {
        self.file.flush().await.map_err(VfsError::from)
    }
}

/// Streaming listing over a host directory.
#[derive(Debug)]
struct LocalDirIter {
    dir: fs::ReadDir,
}

#[async_trait]
impl DirIter for LocalDirIter {
    async fn next_entry(&mut self) -> VfsResult<Option<DirEntry>> {
        let Some(entry) = self.dir.next_entry().await? else {
            return Ok(None);
        };
        let kind = LocalBackend::file_type(entry.file_type().await?);
        let name = entry.file_name().to_string_lossy().into_owned();
        Ok(Some(DirEntry::new(name, kind).with_ino(entry.ino())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn setup() -> (LocalBackend, TempDir) {
        let dir = TempDir::new().unwrap();
        let backend = LocalBackend::new(dir.path());
        (backend, dir)
    }

    async fn write_file(backend: &LocalBackend, path: &str, data: &[u8]) {
        let mut f = backend.open(path, OpenFlags::create_truncate()).await.unwrap();
        f.write(data).await.unwrap();
    }

    #[tokio::test]
    async fn test_create_and_read() {
        let (backend, dir) = setup().await;

        write_file(&backend, "/test.txt", b"hello world").await;

        let mut f = backend.open("/test.txt", OpenFlags::read()).await.unwrap();
        assert_eq!(f.read_to_end().await.unwrap(), b"hello world");
        assert_eq!(std::fs::read(dir.path().join("test.txt")).unwrap(), b"hello world");
    }

    #[tokio::test]
    async fn test_partial_read() {
        let (backend, _dir) = setup().await;
        write_file(&backend, "/test.txt", b"hello world").await;

        let mut f = backend.open("test.txt", OpenFlags::read()).await.unwrap();
        assert_eq!(f.read(6).await.unwrap(), b"hello ");
        assert_eq!(f.read(5).await.unwrap(), b"world");
        assert!(f.read(5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_mkdir_and_ilistdir() {
        let (backend, _dir) = setup().await;

        backend.mkdir("/subdir").await.unwrap();
        write_file(&backend, "/subdir/file.txt", b"").await;
        write_file(&backend, "/root.txt", b"").await;

        let mut iter = backend.ilistdir("/").await.unwrap();
        let mut entries = iter.collect_entries().await.unwrap();
        entries.sort_by(|a, b| a.name.cmp(&b.name));

        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["root.txt", "subdir"]);
        assert!(entries[1].kind.is_dir());
        assert!(entries[0].ino > 0);

        // The parent has to exist.
        assert!(backend.mkdir("/a/b").await.is_err());
    }

    #[tokio::test]
    async fn test_stat() {
        let (backend, _dir) = setup().await;
        write_file(&backend, "/f", b"12345").await;

        let st = backend.stat("/f").await.unwrap();
        assert!(st.is_file());
        assert_eq!(st.size, 5);
        assert!(st.ino > 0);
        assert!(st.mtime > 0);
        assert!(backend.stat("/").await.unwrap().is_dir());
    }

    #[tokio::test]
    async fn test_statvfs() {
        let (backend, _dir) = setup().await;
        let st = backend.statvfs("/").await.unwrap();
        assert!(st.bsize > 0);
        assert!(st.blocks > 0);
        assert!(st.namemax > 0);
    }

    #[tokio::test]
    async fn test_read_only() {
        let (backend, dir) = setup().await;
        std::fs::write(dir.path().join("existing"), "data").unwrap();
        let backend = backend.with_read_only(true);

        assert!(matches!(
            backend.open("/test.txt", OpenFlags::create_truncate()).await,
            Err(VfsError::ReadOnly)
        ));
        assert!(matches!(backend.mkdir("/d").await, Err(VfsError::ReadOnly)));
        assert!(matches!(backend.remove("/existing").await, Err(VfsError::ReadOnly)));

        let mut f = backend.open("/existing", OpenFlags::read()).await.unwrap();
        assert_eq!(f.read_to_end().await.unwrap(), b"data");
        assert!(backend.read_only());
    }

    #[tokio::test]
    async fn test_dotdot_is_clamped() {
        let (backend, dir) = setup().await;
        std::fs::write(dir.path().join("inside"), "x").unwrap();

        let st = backend.stat("../../../inside").await.unwrap();
        assert!(st.is_file());
        assert!(backend.stat("../../../etc/passwd").await.is_err());
    }

    #[tokio::test]
    async fn test_symlink_escape_blocked() {
        let outside = TempDir::new().unwrap();
        std::fs::write(outside.path().join("secret"), "s").unwrap();
        let (backend, dir) = setup().await;
        std::os::unix::fs::symlink(outside.path(), dir.path().join("link")).unwrap();

        let result = backend.stat("/link/secret").await;
        assert!(matches!(result, Err(VfsError::PathEscapesRoot(_))));
    }

    #[tokio::test]
    async fn test_rename() {
        let (backend, _dir) = setup().await;
        write_file(&backend, "/old.txt", b"content").await;

        backend.rename("/old.txt", "/new.txt").await.unwrap();

        assert!(backend.stat("/old.txt").await.is_err());
        let mut f = backend.open("/new.txt", OpenFlags::read()).await.unwrap();
        assert_eq!(f.read_to_end().await.unwrap(), b"content");
    }

    #[tokio::test]
    async fn test_remove_and_rmdir() {
        let (backend, _dir) = setup().await;
        backend.mkdir("/d").await.unwrap();
        write_file(&backend, "/d/f", b"").await;

        assert!(backend.rmdir("/d").await.is_err());
        backend.remove("/d/f").await.unwrap();
        backend.rmdir("/d").await.unwrap();
        assert!(backend.stat("/d").await.is_err());
        assert!(matches!(backend.rmdir("/").await, Err(VfsError::PermissionDenied(_))));
    }

    #[tokio::test]
    async fn test_cwd() {
        let (backend, _dir) = setup().await;
        backend.mkdir("/lib").await.unwrap();

        backend.chdir("lib").await.unwrap();
        assert_eq!(backend.getcwd().await.unwrap(), "/lib");

        write_file(&backend, "mod.py", b"").await;
        assert!(backend.stat("/lib/mod.py").await.unwrap().is_file());
        assert!(matches!(backend.chdir("mod.py").await, Err(VfsError::NotADirectory(_))));
    }

    #[tokio::test]
    async fn test_open_directory_fails() {
        let (backend, _dir) = setup().await;
        assert!(matches!(
            backend.open("/", OpenFlags::read()).await,
            Err(VfsError::IsADirectory(_))
        ));
    }
}
