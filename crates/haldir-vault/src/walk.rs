//! Path-safe traversal of a skill directory.
//!
//! The walk never follows a symlink: entries are inspected with `lstat` and
//! any symlink anywhere in the tree is rejected outright. This closes the
//! window for symlink-race substitutions between walk and read.

use crate::limits::WalkLimits;
use crate::result::ErrorCode;
use std::fs;
use std::path::{Path, PathBuf};

/// Reserved directory holding the envelope artifacts. Excluded from the
/// walk, and therefore from integrity hashing.
pub const VAULT_DIR: &str = ".vault";

/// Hard-link handling. `Allow` is honored only in runtime context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HardlinkMode {
    Reject,
    Allow,
}

/// A regular file discovered by the walk.
#[derive(Debug, Clone)]
pub struct WalkedFile {
    /// Root-relative path with forward-slash separators.
    pub rel_path: String,
    pub abs_path: PathBuf,
    pub size: u64,
}

/// Walk rejection reasons, each mapping to a stable error code.
#[derive(Debug, thiserror::Error)]
pub enum WalkError {
    #[error("symbolic link in skill directory: {path}")]
    Symlink { path: String },

    #[error("file has multiple hard links: {path}")]
    Hardlink { path: String },

    #[error("{reason}")]
    Limits { reason: String },

    #[error("path escapes the skill root: {path}")]
    Escape { path: String },

    #[error("i/o failure at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl WalkError {
    /// The stable code this rejection surfaces as.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Symlink { .. } => ErrorCode::Symlink,
            Self::Hardlink { .. } => ErrorCode::Hardlink,
            Self::Limits { .. } => ErrorCode::Limits,
            Self::Escape { .. } | Self::Io { .. } => ErrorCode::IntegrityMismatch,
        }
    }

    /// The offending path, when one is attached.
    pub fn path(&self) -> Option<&str> {
        match self {
            Self::Symlink { path }
            | Self::Hardlink { path }
            | Self::Escape { path }
            | Self::Io { path, .. } => Some(path),
            Self::Limits { .. } => None,
        }
    }
}

/// Walk a skill directory, producing regular files sorted by the UTF-8 byte
/// order of their root-relative forward-slash paths.
///
/// Rejections, in the order they fire per entry: symlink, hard-link count,
/// file count, file size, total size, root escape. The file-count check
/// fires before any size check to bound worst-case work.
pub fn walk_skill_dir(
    root: &Path,
    limits: &WalkLimits,
    hardlinks: HardlinkMode,
) -> Result<Vec<WalkedFile>, WalkError> {
    let canonical_root = fs::canonicalize(root).map_err(|e| WalkError::Io {
        path: root.display().to_string(),
        source: e,
    })?;

    let mut files = Vec::new();
    let mut total_bytes: u64 = 0;
    walk_dir(
        &canonical_root,
        &canonical_root,
        limits,
        hardlinks,
        &mut files,
        &mut total_bytes,
    )?;

    files.sort_by(|a, b| a.rel_path.as_bytes().cmp(b.rel_path.as_bytes()));
    tracing::debug!(
        files = files.len(),
        bytes = total_bytes,
        root = %canonical_root.display(),
        "walked skill directory"
    );
    Ok(files)
}

fn walk_dir(
    dir: &Path,
    root: &Path,
    limits: &WalkLimits,
    hardlinks: HardlinkMode,
    files: &mut Vec<WalkedFile>,
    total_bytes: &mut u64,
) -> Result<(), WalkError> {
    let entries = fs::read_dir(dir).map_err(|e| WalkError::Io {
        path: dir.display().to_string(),
        source: e,
    })?;

    for entry in entries {
        let entry = entry.map_err(|e| WalkError::Io {
            path: dir.display().to_string(),
            source: e,
        })?;
        let path = entry.path();
        let rel = rel_path_of(&path, root)?;

        // lstat: never follow links while classifying the entry
        let meta = fs::symlink_metadata(&path).map_err(|e| WalkError::Io {
            path: rel.clone(),
            source: e,
        })?;
        let file_type = meta.file_type();

        if file_type.is_symlink() {
            return Err(WalkError::Symlink { path: rel });
        }

        if file_type.is_dir() {
            if dir == root && entry.file_name() == VAULT_DIR {
                continue;
            }
            walk_dir(&path, root, limits, hardlinks, files, total_bytes)?;
            continue;
        }

        if !file_type.is_file() {
            return Err(WalkError::Limits {
                reason: format!("unsupported file type: {}", rel),
            });
        }

        if hardlinks == HardlinkMode::Reject && link_count(&meta) > 1 {
            return Err(WalkError::Hardlink { path: rel });
        }

        if files.len() >= limits.max_files {
            return Err(WalkError::Limits {
                reason: format!("file count exceeds limit {}", limits.max_files),
            });
        }
        if meta.len() > limits.max_file_size {
            return Err(WalkError::Limits {
                reason: format!(
                    "file '{}' size {} exceeds limit {}",
                    rel,
                    meta.len(),
                    limits.max_file_size
                ),
            });
        }
        *total_bytes += meta.len();
        if *total_bytes > limits.max_total_size {
            return Err(WalkError::Limits {
                reason: format!("total size exceeds limit {}", limits.max_total_size),
            });
        }

        // lstat already excluded links, but resolve anyway and require the
        // result to stay under the root
        let resolved = fs::canonicalize(&path).map_err(|e| WalkError::Io {
            path: rel.clone(),
            source: e,
        })?;
        if !resolved.starts_with(root) {
            return Err(WalkError::Escape { path: rel });
        }

        files.push(WalkedFile {
            rel_path: rel,
            abs_path: path,
            size: meta.len(),
        });
    }

    Ok(())
}

fn rel_path_of(path: &Path, root: &Path) -> Result<String, WalkError> {
    let rel = path
        .strip_prefix(root)
        .map_err(|_| WalkError::Escape {
            path: path.display().to_string(),
        })?;

    let mut parts = Vec::new();
    for component in rel.components() {
        match component.as_os_str().to_str() {
            Some(s) => parts.push(s),
            None => {
                return Err(WalkError::Limits {
                    reason: format!("non-UTF-8 path: {}", rel.display()),
                })
            }
        }
    }
    Ok(parts.join("/"))
}

#[cfg(unix)]
fn link_count(meta: &fs::Metadata) -> u64 {
    use std::os::unix::fs::MetadataExt;
    meta.nlink()
}

#[cfg(not(unix))]
fn link_count(_meta: &fs::Metadata) -> u64 {
    1
}
