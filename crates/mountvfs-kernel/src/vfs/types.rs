//! Core VFS types.
//!
//! Records mirror the POSIX `stat`/`statvfs` shapes so a host runtime can
//! hand them straight to user code as tuples.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};
use strum::{Display, EnumString};

use super::error::{VfsError, VfsResult};

/// File type bit mask.
pub const S_IFMT: u32 = 0o170_000;
/// Directory.
pub const S_IFDIR: u32 = 0o040_000;
/// Regular file.
pub const S_IFREG: u32 = 0o100_000;
/// Symbolic link.
pub const S_IFLNK: u32 = 0o120_000;

/// Maximum path length, reported as `namemax` for the virtual root.
pub const PATH_MAX: u64 = 512;

/// Current time as whole seconds since the Unix epoch.
pub(crate) fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Kind of directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileType {
    /// Regular file.
    File,
    /// Directory.
    Directory,
    /// Symbolic link.
    Symlink,
}

impl FileType {
    pub fn is_file(&self) -> bool {
        matches!(self, FileType::File)
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, FileType::Directory)
    }

    pub fn is_symlink(&self) -> bool {
        matches!(self, FileType::Symlink)
    }

    /// The `S_IF*` bits for this type.
    pub fn mode_bits(&self) -> u32 {
        match self {
            FileType::File => S_IFREG,
            FileType::Directory => S_IFDIR,
            FileType::Symlink => S_IFLNK,
        }
    }

    /// Decode the type bits of a `st_mode` value.
    pub fn from_mode(mode: u32) -> Option<Self> {
        match mode & S_IFMT {
            S_IFREG => Some(FileType::File),
            S_IFDIR => Some(FileType::Directory),
            S_IFLNK => Some(FileType::Symlink),
            _ => None,
        }
    }
}

/// Result of `stat`.
///
/// Times are whole seconds since the Unix epoch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stat {
    /// Type and permission bits.
    pub mode: u32,
    /// Inode number, or zero when the backend has none.
    pub ino: u64,
    pub dev: u64,
    pub nlink: u64,
    pub uid: u32,
    pub gid: u32,
    /// Size in bytes.
    pub size: u64,
    pub atime: u64,
    pub mtime: u64,
    pub ctime: u64,
}

impl Stat {
    /// Attributes for a new file.
    pub fn file(size: u64, perm: u32) -> Self {
        let now = now_secs();
        Self {
            mode: S_IFREG | (perm & 0o7777),
            nlink: 1,
            size,
            atime: now,
            mtime: now,
            ctime: now,
            ..Default::default()
        }
    }

    /// Attributes for a new directory.
    pub fn directory(perm: u32) -> Self {
        let now = now_secs();
        Self {
            mode: S_IFDIR | (perm & 0o7777),
            nlink: 2, // . and ..
            atime: now,
            mtime: now,
            ctime: now,
            ..Default::default()
        }
    }

    /// The synthetic answer for the virtual root: a directory, all else zero.
    pub fn virtual_root() -> Self {
        Self {
            mode: S_IFDIR,
            ..Default::default()
        }
    }

    /// Set the inode number.
    pub fn with_ino(mut self, ino: u64) -> Self {
        self.ino = ino;
        self
    }

    /// Decoded file type, if the mode carries a known one.
    pub fn kind(&self) -> Option<FileType> {
        FileType::from_mode(self.mode)
    }

    pub fn is_file(&self) -> bool {
        self.mode & S_IFMT == S_IFREG
    }

    pub fn is_dir(&self) -> bool {
        self.mode & S_IFMT == S_IFDIR
    }

    /// Permission bits only.
    pub fn perm(&self) -> u32 {
        self.mode & 0o7777
    }
}

/// Result of `statvfs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatVfs {
    /// Block size.
    pub bsize: u64,
    /// Fragment size.
    pub frsize: u64,
    /// Total blocks.
    pub blocks: u64,
    /// Free blocks.
    pub bfree: u64,
    /// Available blocks (to non-root).
    pub bavail: u64,
    /// Total inodes.
    pub files: u64,
    /// Free inodes.
    pub ffree: u64,
    /// Available inodes (to non-root).
    pub favail: u64,
    /// Mount flags.
    pub flags: u64,
    /// Maximum name length.
    pub namemax: u64,
}

impl StatVfs {
    /// The synthetic answer for an unbacked virtual root.
    pub fn virtual_root() -> Self {
        Self {
            bsize: 0,
            frsize: 0,
            blocks: 0,
            bfree: 0,
            bavail: 0,
            files: 0,
            ffree: 0,
            favail: 0,
            flags: 0,
            namemax: PATH_MAX,
        }
    }
}

/// A roomy, mostly empty filesystem: 4 GiB in 4 KiB blocks, half free.
impl Default for StatVfs {
    fn default() -> Self {
        let blocks = 1 << 20;
        Self {
            bsize: 4096,
            frsize: 4096,
            blocks,
            bfree: blocks / 2,
            bavail: blocks / 2,
            files: blocks,
            ffree: blocks / 2,
            favail: blocks / 2,
            flags: 0,
            namemax: 255,
        }
    }
}

/// Directory entry, as yielded by `ilistdir`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    /// Final path component.
    pub name: String,
    /// Entry type.
    pub kind: FileType,
    /// Inode number, or zero when there is none.
    pub ino: u64,
}

impl DirEntry {
    pub fn new(name: impl Into<String>, kind: FileType) -> Self {
        Self {
            name: name.into(),
            kind,
            ino: 0,
        }
    }

    pub fn file(name: impl Into<String>) -> Self {
        Self::new(name, FileType::File)
    }

    pub fn directory(name: impl Into<String>) -> Self {
        Self::new(name, FileType::Directory)
    }

    /// Set the inode number.
    pub fn with_ino(mut self, ino: u64) -> Self {
        self.ino = ino;
        self
    }

    /// `S_IF*` bits for the entry's type.
    pub fn mode(&self) -> u32 {
        self.kind.mode_bits()
    }
}

/// Existence probe used by module loaders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum ImportStat {
    /// Nothing at the path (or it could not be examined).
    NoExist,
    /// A regular file.
    File,
    /// A directory.
    Dir,
}

/// Open file flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenFlags {
    pub read: bool,
    pub write: bool,
    /// Append mode.
    pub append: bool,
    /// Create if not exists.
    pub create: bool,
    /// Truncate on open.
    pub truncate: bool,
    /// With `create`: fail if the file exists.
    pub exclusive: bool,
}

impl Default for OpenFlags {
    fn default() -> Self {
        Self {
            read: true,
            write: false,
            append: false,
            create: false,
            truncate: false,
            exclusive: false,
        }
    }
}

impl OpenFlags {
    /// Read-only access.
    pub fn read() -> Self {
        Self::default()
    }

    /// Create and truncate, write only (`"w"`).
    pub fn create_truncate() -> Self {
        Self {
            read: false,
            write: true,
            create: true,
            truncate: true,
            ..Default::default()
        }
    }

    /// Create or append, write only (`"a"`).
    pub fn append() -> Self {
        Self {
            read: false,
            write: true,
            append: true,
            create: true,
            ..Default::default()
        }
    }

    /// Create exclusively, fail if exists (`"x"`).
    pub fn create_exclusive() -> Self {
        Self {
            read: false,
            write: true,
            create: true,
            exclusive: true,
            ..Default::default()
        }
    }

    /// Parse a Python-style mode string such as `"r"`, `"wb"` or `"a+"`.
    ///
    /// At most one of `rwax`, an optional `+`, and at most one of `bt`.
    /// Without any of `rwax` the mode reads.
    pub fn parse(mode: &str) -> VfsResult<Self> {
        let invalid = || VfsError::InvalidMode(mode.to_string());

        let mut base: Option<Self> = None;
        let mut plus = false;
        let mut encoding_set = false;
        for c in mode.chars() {
            match c {
                'r' | 'w' | 'a' | 'x' if base.is_none() => {
                    base = Some(match c {
                        'r' => Self::read(),
                        'w' => Self::create_truncate(),
                        'a' => Self::append(),
                        _ => Self::create_exclusive(),
                    });
                }
                '+' if !plus => plus = true,
                'b' | 't' if !encoding_set => encoding_set = true,
                _ => return Err(invalid()),
            }
        }

        let mut flags = base.unwrap_or_default();
        if plus {
            flags.read = true;
            flags.write = true;
        }
        Ok(flags)
    }

    /// True if the handle may modify the file.
    pub fn is_write(&self) -> bool {
        self.write || self.append
    }
}

impl FromStr for OpenFlags {
    type Err = VfsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_type() {
        assert!(FileType::File.is_file());
        assert!(!FileType::File.is_dir());
        assert!(FileType::Directory.is_dir());
        assert!(FileType::Symlink.is_symlink());
        assert_eq!(FileType::from_mode(S_IFDIR | 0o755), Some(FileType::Directory));
        assert_eq!(FileType::from_mode(0), None);
    }

    #[test]
    fn test_stat_constructors() {
        let file = Stat::file(1024, 0o644);
        assert!(file.is_file());
        assert_eq!(file.size, 1024);
        assert_eq!(file.perm(), 0o644);

        let dir = Stat::directory(0o755);
        assert!(dir.is_dir());
        assert_eq!(dir.perm(), 0o755);
        assert_eq!(dir.nlink, 2);
    }

    #[test]
    fn test_virtual_root_records() {
        let st = Stat::virtual_root();
        assert_eq!(st.mode, S_IFDIR);
        assert_eq!(st.size, 0);
        assert_eq!(st.mtime, 0);

        let vfs = StatVfs::virtual_root();
        assert_eq!(vfs.blocks, 0);
        assert_eq!(vfs.bsize, 0);
        assert!(vfs.namemax > 0);
    }

    #[test]
    fn test_dir_entry() {
        let file = DirEntry::file("test.txt");
        assert_eq!(file.name, "test.txt");
        assert!(file.kind.is_file());
        assert_eq!(file.ino, 0);

        let dir = DirEntry::directory("subdir").with_ino(7);
        assert_eq!(dir.mode(), S_IFDIR);
        assert_eq!(dir.ino, 7);
    }

    #[test]
    fn test_import_stat_names() {
        assert_eq!(ImportStat::NoExist.to_string(), "no_exist");
        assert_eq!("dir".parse::<ImportStat>().unwrap(), ImportStat::Dir);
    }

    #[test]
    fn test_open_flags_parse() {
        let read = OpenFlags::parse("r").unwrap();
        assert!(read.read);
        assert!(!read.write);

        let write = OpenFlags::parse("wb").unwrap();
        assert!(write.write && write.create && write.truncate);
        assert!(!write.read);

        let append = OpenFlags::parse("a+").unwrap();
        assert!(append.append && append.read && append.write);

        let excl = OpenFlags::parse("x").unwrap();
        assert!(excl.create && excl.exclusive);

        assert_eq!(OpenFlags::parse("").unwrap(), OpenFlags::read());
        assert_eq!(OpenFlags::parse("b").unwrap(), OpenFlags::read());
    }

    #[test]
    fn test_open_flags_rejects_garbage() {
        for bad in ["rw", "r++", "bt", "q", "wx"] {
            assert!(
                matches!(OpenFlags::parse(bad), Err(VfsError::InvalidMode(_))),
                "{bad} should be rejected"
            );
        }
    }
}
