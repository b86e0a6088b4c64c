//! Operation dispatch to resolved targets.
//!
//! [`dispatch`] is a closed match over [`Op`]: a `Mounted` target forwards
//! to the backend with its remainder path, `VirtualRoot` answers `stat` and
//! `statvfs` itself and refuses everything else, `NotFound` refuses
//! everything. Backend errors come back untouched.

use strum::IntoStaticStr;

use super::error::{VfsError, VfsResult};
use super::ops::{DirIter, FileHandle};
use super::resolve::Target;
use super::types::{OpenFlags, Stat, StatVfs};

/// An operation on a resolved target. The path is the target's remainder.
#[derive(Debug, Clone, Copy, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum Op<'a> {
    Open(OpenFlags),
    Stat,
    Statvfs,
    Mkdir,
    Rmdir,
    Remove,
    /// Rename to `to`, a remainder on the same backend.
    Rename { to: &'a str },
    Chdir,
    Getcwd,
    Ilistdir,
}

impl Op<'_> {
    /// Operation name, for logs and error messages.
    pub fn name(&self) -> &'static str {
        self.into()
    }
}

/// What a backend handed back.
pub enum Reply {
    File(Box<dyn FileHandle>),
    Stat(Stat),
    StatVfs(StatVfs),
    Cwd(String),
    Dir(Box<dyn DirIter>),
    Done,
}

impl std::fmt::Debug for Reply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Reply::File(_) => f.write_str("File(..)"),
            Reply::Stat(st) => f.debug_tuple("Stat").field(st).finish(),
            Reply::StatVfs(st) => f.debug_tuple("StatVfs").field(st).finish(),
            Reply::Cwd(cwd) => f.debug_tuple("Cwd").field(cwd).finish(),
            Reply::Dir(_) => f.write_str("Dir(..)"),
            Reply::Done => f.write_str("Done"),
        }
    }
}

fn mismatch(expected: &str, got: &Reply) -> VfsError {
    VfsError::other(format!("expected {} reply, got {:?}", expected, got))
}

impl Reply {
    pub fn into_file(self) -> VfsResult<Box<dyn FileHandle>> {
        match self {
            Reply::File(handle) => Ok(handle),
            other => Err(mismatch("file", &other)),
        }
    }

    pub fn into_stat(self) -> VfsResult<Stat> {
        match self {
            Reply::Stat(st) => Ok(st),
            other => Err(mismatch("stat", &other)),
        }
    }

    pub fn into_statvfs(self) -> VfsResult<StatVfs> {
        match self {
            Reply::StatVfs(st) => Ok(st),
            other => Err(mismatch("statvfs", &other)),
        }
    }

    pub fn into_cwd(self) -> VfsResult<String> {
        match self {
            Reply::Cwd(cwd) => Ok(cwd),
            other => Err(mismatch("cwd", &other)),
        }
    }

    pub fn into_dir(self) -> VfsResult<Box<dyn DirIter>> {
        match self {
            Reply::Dir(iter) => Ok(iter),
            other => Err(mismatch("directory", &other)),
        }
    }

    pub fn into_unit(self) -> VfsResult<()> {
        match self {
            Reply::Done => Ok(()),
            other => Err(mismatch("empty", &other)),
        }
    }
}

/// Run `op` against `target`.
pub async fn dispatch(target: &Target, op: Op<'_>) -> VfsResult<Reply> {
    let (entry, path) = match target {
        Target::NotFound(path) => return Err(VfsError::mount_not_found(path.clone())),
        Target::VirtualRoot => {
            return match op {
                Op::Stat => Ok(Reply::Stat(Stat::virtual_root())),
                Op::Statvfs => Ok(Reply::StatVfs(StatVfs::virtual_root())),
                op => Err(VfsError::permission_denied(format!(
                    "{} on virtual root",
                    op.name()
                ))),
            };
        }
        Target::Mounted { entry, remainder } => (entry, remainder.as_str()),
    };

    tracing::trace!(op = op.name(), prefix = entry.prefix(), path, "dispatch");
    let backend = entry.backend();
    let reply = match op {
        Op::Open(flags) => Reply::File(backend.open(path, flags).await?),
        Op::Stat => Reply::Stat(backend.stat(path).await?),
        Op::Statvfs => Reply::StatVfs(backend.statvfs(path).await?),
        Op::Mkdir => {
            backend.mkdir(path).await?;
            Reply::Done
        }
        Op::Rmdir => {
            backend.rmdir(path).await?;
            Reply::Done
        }
        Op::Remove => {
            backend.remove(path).await?;
            Reply::Done
        }
        Op::Rename { to } => {
            backend.rename(path, to).await?;
            Reply::Done
        }
        Op::Chdir => {
            backend.chdir(path).await?;
            Reply::Done
        }
        Op::Getcwd => Reply::Cwd(backend.getcwd().await?),
        Op::Ilistdir => Reply::Dir(backend.ilistdir(path).await?),
    };
    Ok(reply)
}

// ============================================================================
// Typed wrappers
// ============================================================================

pub async fn open(target: &Target, flags: OpenFlags) -> VfsResult<Box<dyn FileHandle>> {
    dispatch(target, Op::Open(flags)).await?.into_file()
}

pub async fn stat(target: &Target) -> VfsResult<Stat> {
    dispatch(target, Op::Stat).await?.into_stat()
}

pub async fn statvfs(target: &Target) -> VfsResult<StatVfs> {
    dispatch(target, Op::Statvfs).await?.into_statvfs()
}

/// Create a directory.
///
/// The virtual root and a mount point itself (remainder exactly `/`)
/// already exist. Whether the parent exists is the backend's business.
pub async fn mkdir(target: &Target) -> VfsResult<()> {
    match target {
        Target::VirtualRoot => Err(VfsError::already_exists("/")),
        Target::Mounted { entry, remainder } if remainder == "/" => {
            Err(VfsError::already_exists(entry.prefix()))
        }
        _ => dispatch(target, Op::Mkdir).await?.into_unit(),
    }
}

pub async fn rmdir(target: &Target) -> VfsResult<()> {
    dispatch(target, Op::Rmdir).await?.into_unit()
}

pub async fn remove(target: &Target) -> VfsResult<()> {
    dispatch(target, Op::Remove).await?.into_unit()
}

/// Rename within one filesystem.
///
/// Targets on different devices fail with [`VfsError::CrossDevice`] before
/// any backend sees the call; there is no copy-and-delete fallback.
pub async fn rename(from: &Target, to: &Target) -> VfsResult<()> {
    if !from.same_device(to) {
        return Err(VfsError::cross_device(from.describe(), to.describe()));
    }
    let to = to.remainder().unwrap_or("/");
    dispatch(from, Op::Rename { to }).await?.into_unit()
}

pub async fn chdir(target: &Target) -> VfsResult<()> {
    dispatch(target, Op::Chdir).await?.into_unit()
}

pub async fn getcwd(target: &Target) -> VfsResult<String> {
    dispatch(target, Op::Getcwd).await?.into_cwd()
}

pub async fn ilistdir(target: &Target) -> VfsResult<Box<dyn DirIter>> {
    dispatch(target, Op::Ilistdir).await?.into_dir()
}
