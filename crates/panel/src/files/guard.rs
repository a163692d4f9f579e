//! Path confinement for per-server file access.
//!
//! Every file operation enters through [`ServerRoots::confine`], which turns a
//! server identifier and a client-relative path into a [`ConfinedPath`]. The
//! check is purely lexical: the candidate is normalized first (collapsing `.`,
//! `..` and redundant separators) and only then compared against the server
//! root, component by component. Nothing here touches the filesystem, so paths
//! that do not exist yet (uploads, mkdir) are confined the same way.

use std::io;
use std::path::{Component, Path, PathBuf};

use super::error::FileError;

/// Default identifier that maps to the servers directory itself.
pub const DEFAULT_GLOBAL_SERVER_ID: &str = "__global__";

/// Directory under each server holding its game data.
pub const SERVER_DATA_DIR: &str = "mc-data";

/// Resolves server identifiers to their root directories.
#[derive(Debug, Clone)]
pub struct ServerRoots {
    /// Absolute, normalized directory containing one folder per server.
    servers_dir: PathBuf,
    /// Identifier that maps to `servers_dir` for cross-server browsing.
    global_id: String,
}

impl ServerRoots {
    /// Create roots below `servers_dir`.
    ///
    /// Relative directories are made absolute against the current working
    /// directory; the result is normalized once here so every root derived
    /// from it is normalized too.
    pub fn new<P: AsRef<Path>>(servers_dir: P) -> io::Result<Self> {
        let absolute = std::path::absolute(servers_dir.as_ref())?;
        Ok(Self {
            servers_dir: normalize(&absolute),
            global_id: DEFAULT_GLOBAL_SERVER_ID.to_string(),
        })
    }

    /// Use a different sentinel for the global (all servers) root.
    pub fn with_global_id(mut self, global_id: impl Into<String>) -> Self {
        self.global_id = global_id.into();
        self
    }

    /// The servers directory.
    pub fn servers_dir(&self) -> &Path {
        &self.servers_dir
    }

    /// The global sentinel identifier.
    pub fn global_id(&self) -> &str {
        &self.global_id
    }

    /// Root directory for `server_id`.
    ///
    /// Server identifiers must be a single plain path segment.
    pub fn root_for(&self, server_id: &str) -> Result<PathBuf, FileError> {
        if server_id == self.global_id {
            return Ok(self.servers_dir.clone());
        }
        if !is_plain_name(server_id) {
            return Err(FileError::InvalidPath(format!("server id {server_id:?}")));
        }
        Ok(self.servers_dir.join(server_id).join(SERVER_DATA_DIR))
    }

    /// Confine a client-relative path to the root of `server_id`.
    pub fn confine(&self, server_id: &str, relative: &str) -> Result<ConfinedPath, FileError> {
        let root = self.root_for(server_id)?;
        confine_to(root, relative)
    }
}

/// A path proven to lie at or below a server root.
///
/// Only constructible through confinement. Holds the absolute path for I/O and
/// the forward-slash relative form used in replies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfinedPath {
    root: PathBuf,
    absolute: PathBuf,
    relative: String,
}

impl ConfinedPath {
    /// Absolute path for filesystem calls.
    pub fn as_path(&self) -> &Path {
        &self.absolute
    }

    /// The server root this path was confined to.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path relative to the root, forward slashes, empty for the root itself.
    pub fn relative(&self) -> &str {
        &self.relative
    }

    /// Whether this is the root itself.
    pub fn is_root(&self) -> bool {
        self.relative.is_empty()
    }

    /// Base name of the entry. For the root this is the root directory's name.
    pub fn file_name(&self) -> String {
        self.absolute
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "/".to_string())
    }

    /// Relative path of the parent directory (empty at the top level).
    pub fn parent_relative(&self) -> &str {
        match self.relative.rfind('/') {
            Some(idx) => &self.relative[..idx],
            None => "",
        }
    }
}

/// Confine `relative` below an already normalized absolute `root`.
pub(crate) fn confine_to(root: PathBuf, relative: &str) -> Result<ConfinedPath, FileError> {
    if relative.contains('\0') {
        return Err(FileError::InvalidPath(relative.to_string()));
    }

    // Client paths are always relative to the root; backslashes count as
    // separators so `..\..\` is normalized like `../../`.
    let cleaned = relative.replace('\\', "/");
    let candidate = normalize(&root.join(cleaned.trim_start_matches('/')));

    // Component-wise prefix: `/data/srv12` is not inside `/data/srv1`.
    let rest = match candidate.strip_prefix(&root) {
        Ok(rest) => rest,
        Err(_) => return Err(FileError::InvalidPath(relative.to_string())),
    };

    let relative = rest
        .iter()
        .map(|segment| segment.to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");

    Ok(ConfinedPath {
        root,
        absolute: candidate,
        relative,
    })
}

/// Lexically normalize a path: drop `.`, resolve `..` against preceding
/// segments, collapse separators. `..` never climbs above the filesystem root.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            Component::Normal(segment) => out.push(segment),
        }
    }
    out
}

/// Join two client-relative paths with a forward slash.
pub(crate) fn join_relative(base: &str, name: &str) -> String {
    let base = base.trim_end_matches(['/', '\\']);
    if base.is_empty() {
        name.to_string()
    } else {
        format!("{base}/{name}")
    }
}

/// A bare entry name: non-empty, not `.` or `..`, no separators or NUL.
pub(crate) fn is_plain_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\', '\0'])
}
