//! Path normalization helpers
//!
//! `normalize_path` is total: it never fails, even for paths that do not
//! exist yet. Symlinks are resolved only for the components that exist on
//! disk; everything after the first missing component is collapsed
//! lexically.

use std::fs;
use std::path::{Component, Path, PathBuf, MAIN_SEPARATOR_STR};

/// Resolve `path` against `base` into an absolute, `..`-free path.
///
/// - `None` path: returns `base` (resolved) or the current directory.
/// - A leading `~` is expanded to the user's home directory.
/// - Relative paths are joined onto `base` when given, else onto the
///   current directory.
pub fn normalize_path(path: Option<&Path>, base: Option<&Path>) -> PathBuf {
    let joined = match path {
        None => match base {
            Some(base) => base.to_path_buf(),
            None => current_dir(),
        },
        Some(path) => {
            let expanded = expand_user(path);
            match base {
                Some(base) if !expanded.is_absolute() => base.join(expanded),
                _ => expanded,
            }
        }
    };
    resolve_lenient(&joined)
}

/// Append (or replace) the extension of `name`.
///
/// `ext` may be given with or without its leading dot. An absent or empty
/// extension leaves `name` untouched.
pub fn ensure_extension(name: &str, ext: Option<&str>) -> String {
    let ext = match ext.map(|e| e.trim_start_matches('.')) {
        Some(e) if !e.is_empty() => e,
        _ => return name.to_string(),
    };

    let current = Path::new(name);
    if current.extension().and_then(|e| e.to_str()) == Some(ext) {
        return name.to_string();
    }
    current.with_extension(ext).to_string_lossy().into_owned()
}

/// Expand a leading `~` component to the home directory
fn expand_user(path: &Path) -> PathBuf {
    let mut components = path.components();
    match components.next() {
        Some(Component::Normal(first)) if first == "~" => match dirs::home_dir() {
            Some(home) => home.join(components.as_path()),
            None => path.to_path_buf(),
        },
        _ => path.to_path_buf(),
    }
}

fn current_dir() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from(MAIN_SEPARATOR_STR))
}

/// Non-strict resolution: follows symlinks that exist, collapses `.`/`..`
fn resolve_lenient(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        current_dir().join(path)
    };

    let mut resolved = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => resolved.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                // `pop` refuses to go above the root
                resolved.pop();
            }
            Component::Normal(segment) => {
                resolved.push(segment);
                let is_symlink = fs::symlink_metadata(&resolved)
                    .map(|meta| meta.file_type().is_symlink())
                    .unwrap_or(false);
                if is_symlink {
                    if let Ok(target) = fs::canonicalize(&resolved) {
                        resolved = target;
                    }
                }
            }
        }
    }
    resolved
}
