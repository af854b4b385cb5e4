//! Path normalisation for proposed paths.
//!
//! [`normalize`] is lexical: a proposed file may not exist yet, and
//! symlinks must not change which rules apply. [`resolve_on_disk`] is the
//! filesystem counterpart used right before a write.

use std::io;
use std::path::{Component, Path, PathBuf};

/// Outcome of normalising a proposed path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NormalizedPath {
    /// Repository-relative path using `/` separators.
    Relative(String),
    /// The path leaves the repository (`..` past the root, or an absolute
    /// path outside it).
    Escapes(String),
}

impl NormalizedPath {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Relative(p) | Self::Escapes(p) => p,
        }
    }
}

/// Normalise `path` relative to `repo_root`.
pub fn normalize(path: &Path, repo_root: Option<&Path>) -> NormalizedPath {
    let display = path.to_string_lossy().replace('\\', "/");

    let relative = if path.is_absolute() {
        match repo_root.and_then(|root| path.strip_prefix(root).ok()) {
            Some(rel) => rel,
            None => return NormalizedPath::Escapes(display),
        }
    } else {
        path
    };

    let mut parts: Vec<String> = Vec::new();
    for component in relative.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if parts.pop().is_none() {
                    return NormalizedPath::Escapes(display);
                }
            }
            Component::Normal(part) => {
                // Windows-style separators inside a single component.
                for piece in part.to_string_lossy().split('\\') {
                    match piece {
                        "" | "." => {}
                        ".." => {
                            if parts.pop().is_none() {
                                return NormalizedPath::Escapes(display);
                            }
                        }
                        other => parts.push(other.to_string()),
                    }
                }
            }
            Component::RootDir | Component::Prefix(_) => {
                return NormalizedPath::Escapes(display);
            }
        }
    }
    NormalizedPath::Relative(parts.join("/"))
}

/// Whether the normalised relative `path` lies at or under `root`.
pub fn is_under(path: &str, root: &str) -> bool {
    let root = root.trim_end_matches('/');
    if root.is_empty() {
        return true;
    }
    path == root
        || path
            .strip_prefix(root)
            .map(|rest| rest.starts_with('/'))
            .unwrap_or(false)
}

/// What the filesystem says about a repository-relative path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OnDisk {
    /// No symlinks below the root; the deepest existing ancestor resolves
    /// to this repository-relative path.
    Inside(String),
    /// The named component (repository-relative) is a symlink.
    Symlink(String),
    /// The deepest existing ancestor resolves outside the repository.
    Outside(PathBuf),
}

/// Walk the normalised relative `rel` below `repo_root` one component at
/// a time without following symlinks.
///
/// Components that do not exist yet end the walk.
pub fn resolve_on_disk(repo_root: &Path, rel: &str) -> io::Result<OnDisk> {
    let mut current = repo_root.to_path_buf();
    let mut deepest = repo_root.to_path_buf();
    let mut walked: Vec<&str> = Vec::new();

    for part in rel.split('/').filter(|p| !p.is_empty()) {
        current.push(part);
        walked.push(part);
        match std::fs::symlink_metadata(&current) {
            Ok(meta) if meta.file_type().is_symlink() => {
                return Ok(OnDisk::Symlink(walked.join("/")));
            }
            Ok(_) => deepest = current.clone(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => break,
            Err(e) => return Err(e),
        }
    }

    let root = repo_root.canonicalize()?;
    let resolved = deepest.canonicalize()?;
    match resolved.strip_prefix(&root) {
        Ok(inside) => Ok(OnDisk::Inside(
            inside.to_string_lossy().replace('\\', "/"),
        )),
        Err(_) => Ok(OnDisk::Outside(resolved)),
    }
}

/// Repository-relative location of `rel` with every symlink followed.
///
/// `None` when `rel` does not exist or resolves outside the repository.
pub fn canonical_relative(repo_root: &Path, rel: &str) -> io::Result<Option<String>> {
    let resolved = match repo_root.join(rel).canonicalize() {
        Ok(p) => p,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };
    let root = repo_root.canonicalize()?;
    Ok(resolved
        .strip_prefix(&root)
        .ok()
        .map(|p| p.to_string_lossy().replace('\\', "/")))
}
