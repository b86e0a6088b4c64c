//! Path resolution against the mount table.
//!
//! Matching is single-pass and order-sensitive: entries are tried in table
//! order and the first whose prefix is followed by `/` or end-of-string in
//! the path wins. `/data` therefore never claims `/database/x`.

use std::sync::Arc;

use super::mount::{MountEntry, MountTable};

/// The filesystem that relative paths resolve against.
#[derive(Clone, Default)]
pub enum Volume {
    /// The synthetic root directory.
    #[default]
    VirtualRoot,
    /// A mounted backend.
    Mounted(Arc<MountEntry>),
}

impl std::fmt::Debug for Volume {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Volume::VirtualRoot => f.write_str("VirtualRoot"),
            Volume::Mounted(entry) => f.debug_tuple("Mounted").field(&entry.prefix()).finish(),
        }
    }
}

/// Where a path lands.
#[derive(Clone)]
pub enum Target {
    /// The root directory, with no backend behind it.
    VirtualRoot,
    /// An absolute path no mount claims. Carries the path for errors.
    NotFound(String),
    /// A backend, plus the path to hand it.
    Mounted {
        entry: Arc<MountEntry>,
        remainder: String,
    },
}

impl std::fmt::Debug for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Target::VirtualRoot => f.write_str("VirtualRoot"),
            Target::NotFound(path) => f.debug_tuple("NotFound").field(path).finish(),
            Target::Mounted { entry, remainder } => f
                .debug_struct("Mounted")
                .field("prefix", &entry.prefix())
                .field("remainder", remainder)
                .finish(),
        }
    }
}

impl Target {
    pub fn mounted(entry: Arc<MountEntry>, remainder: impl Into<String>) -> Self {
        Target::Mounted {
            entry,
            remainder: remainder.into(),
        }
    }

    /// The mount entry, for `Mounted` targets.
    pub fn entry(&self) -> Option<&Arc<MountEntry>> {
        match self {
            Target::Mounted { entry, .. } => Some(entry),
            _ => None,
        }
    }

    /// The backend-relative path, for `Mounted` targets.
    pub fn remainder(&self) -> Option<&str> {
        match self {
            Target::Mounted { remainder, .. } => Some(remainder),
            _ => None,
        }
    }

    /// True if both targets address the same filesystem, whatever the
    /// remainders are.
    pub fn same_device(&self, other: &Target) -> bool {
        match (self, other) {
            (Target::VirtualRoot, Target::VirtualRoot) => true,
            (Target::NotFound(_), Target::NotFound(_)) => true,
            (Target::Mounted { entry: a, .. }, Target::Mounted { entry: b, .. }) => {
                Arc::ptr_eq(a, b)
            }
            _ => false,
        }
    }

    /// Human-readable location for error messages.
    pub fn describe(&self) -> String {
        match self {
            Target::VirtualRoot => "/".to_string(),
            Target::NotFound(path) => path.clone(),
            Target::Mounted { entry, remainder } => {
                let prefix = if entry.is_root() { "" } else { entry.prefix() };
                let rest = remainder.trim_start_matches('/');
                match (prefix.is_empty(), rest.is_empty()) {
                    (true, true) => "/".to_string(),
                    (false, true) => prefix.to_string(),
                    _ => format!("{}/{}", prefix, rest),
                }
            }
        }
    }
}

/// Resolve `path` against `table`, with `current` as the working volume.
///
/// Absolute paths, and every path while the current volume is the virtual
/// root, are matched against the table. Other relative paths go straight to
/// the current volume's backend, unchanged.
pub fn resolve(table: &MountTable, current: &Volume, path: &str) -> Target {
    if path.starts_with('/') || matches!(current, Volume::VirtualRoot) {
        let (rest, is_abs) = match path.strip_prefix('/') {
            Some(rest) => (rest, true),
            None => (path, false),
        };
        if rest.is_empty() {
            return Target::VirtualRoot;
        }

        for entry in table.iter() {
            let name = entry.name();
            if name.is_empty() {
                // Mounted at root: claims everything not claimed before it.
                return Target::mounted(Arc::clone(entry), path);
            }
            let Some(after) = rest.strip_prefix(name) else {
                continue;
            };
            if after.is_empty() {
                return Target::mounted(Arc::clone(entry), "/");
            }
            if after.starts_with('/') {
                return Target::mounted(Arc::clone(entry), after);
            }
        }

        if is_abs {
            return Target::NotFound(path.to_string());
        }
    }

    match current {
        Volume::VirtualRoot => Target::VirtualRoot,
        Volume::Mounted(entry) => Target::mounted(Arc::clone(entry), path),
    }
}
