//! Path normalization utilities.
//!
//! Provides consistent path handling across the codebase:
//! - `normalize_path` - file system paths (canonicalize + fallback)
//! - `normalize_file_path` - file paths that may not exist right now
//! - `expand_tilde` - `~` expansion for user-supplied paths

use std::path::{Component, Path, PathBuf};

/// Normalize a file system path to absolute form.
///
/// Tries `canonicalize()` first (resolves symlinks, `.`, `..`).
/// Falls back to:
/// - Return as-is if already absolute
/// - Join with current directory if relative
///
/// The fallback is cleaned lexically so `a/./b` and `a/b` compare equal.
#[inline]
pub fn normalize_path(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| {
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path))
        };
        lexical_clean(&absolute)
    })
}

/// Normalize a path to a file that may be absent at this instant.
///
/// Editors that save atomically remove and recreate the file, so events for
/// the watched file can arrive while it does not exist. The parent directory
/// is canonicalized and the file name re-attached, which keeps symlinked
/// parents and relative spellings comparable.
pub fn normalize_file_path(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }

    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => {
            let parent = if parent.as_os_str().is_empty() {
                Path::new(".")
            } else {
                parent
            };
            normalize_path(parent).join(name)
        }
        _ => normalize_path(path),
    }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(raw: &str) -> String {
    shellexpand::tilde(raw).into_owned()
}

/// Resolve `.` and `..` components without touching the filesystem.
fn lexical_clean(path: &Path) -> PathBuf {
    let mut cleaned = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                cleaned.pop();
            }
            other => cleaned.push(other.as_os_str()),
        }
    }
    cleaned
}
