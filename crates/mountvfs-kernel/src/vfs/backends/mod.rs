//! VFS backends.
//!
//! Backends implement [`Backend`](crate::vfs::Backend) for different storage
//! types.

mod local;
mod memory;

pub use local::LocalBackend;
pub use memory::MemoryBackend;

/// Join `path` onto `cwd` and normalize the result.
///
/// Absolute paths ignore `cwd`. `.` and empty components are dropped, and
/// `..` pops a component but never climbs above `/`. The result always
/// starts with `/` and never ends with one, except for the root itself.
pub(crate) fn absolutize(cwd: &str, path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    let base = if path.starts_with('/') { "" } else { cwd };
    for component in base.split('/').chain(path.split('/')) {
        match component {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            name => parts.push(name),
        }
    }
    format!("/{}", parts.join("/"))
}

/// Parent of a normalized absolute path. The root is its own parent.
pub(crate) fn parent_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "/",
        Some(i) => &path[..i],
    }
}
