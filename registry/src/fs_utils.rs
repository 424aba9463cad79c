//! Filesystem helpers shared by the scanner and the lifecycle manager.
//!
//! Tree operations are driven by `walkdir` iterators so arbitrarily deep theme
//! trees never recurse on the call stack.

use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;
use walkdir::WalkDir;

use crate::error::{ThemeError, ThemeResult};

/// Immediate subdirectories of `dir`. Unreadable entries are skipped.
pub fn subdirectories(dir: &Path) -> impl Iterator<Item = PathBuf> {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_dir())
        .map(|entry| entry.into_path())
}

/// Creates `dir` and its parents when missing.
pub fn ensure_dir(dir: &Path) -> ThemeResult<()> {
    fs::create_dir_all(dir).map_err(ThemeError::io_at("create directory", dir))
}

/// Recursively copies `src` into `dst`, creating `dst` if needed.
///
/// Symbolic links are not followed and not reproduced.
pub fn copy_dir(src: &Path, dst: &Path) -> ThemeResult<()> {
    ensure_dir(dst)?;

    for entry in WalkDir::new(src).min_depth(1) {
        let entry = entry.map_err(|e| walk_error(src, e))?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| ThemeError::io_at("copy", entry.path())(std::io::Error::other(e)))?;
        let target = dst.join(relative);

        if entry.file_type().is_dir() {
            ensure_dir(&target)?;
        } else if entry.file_type().is_file() {
            fs::copy(entry.path(), &target).map_err(ThemeError::io_at("copy", entry.path()))?;
        } else {
            log::debug!("Skipping non-regular entry {}", entry.path().display());
        }
    }

    Ok(())
}

/// Moves a directory tree, falling back to copy + remove when a plain rename
/// is not possible (for example across filesystems).
pub fn move_dir(src: &Path, dst: &Path) -> ThemeResult<()> {
    if let Some(parent) = dst.parent() {
        ensure_dir(parent)?;
    }

    match fs::rename(src, dst) {
        Ok(()) => Ok(()),
        Err(e) => {
            log::debug!(
                "Rename {} -> {} failed ({e}), copying instead",
                src.display(),
                dst.display()
            );
            copy_dir(src, dst)?;
            remove_dir(src)
        }
    }
}

/// Removes a directory tree, deepest entries first.
pub fn remove_dir(dir: &Path) -> ThemeResult<()> {
    for entry in WalkDir::new(dir).contents_first(true) {
        let entry = entry.map_err(|e| walk_error(dir, e))?;
        let path = entry.path();
        if entry.file_type().is_dir() {
            fs::remove_dir(path).map_err(ThemeError::io_at("remove directory", path))?;
        } else {
            fs::remove_file(path).map_err(ThemeError::io_at("remove file", path))?;
        }
    }
    Ok(())
}

/// Total size in bytes of every regular file below `dir`.
pub fn dir_size(dir: &Path) -> u64 {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| entry.metadata().ok())
        .map(|metadata| metadata.len())
        .sum()
}

fn walk_error(root: &Path, error: walkdir::Error) -> ThemeError {
    let path = error.path().unwrap_or(root).to_path_buf();
    let source = error
        .into_io_error()
        .unwrap_or_else(|| std::io::Error::other("filesystem loop detected"));
    ThemeError::io_at("walk", &path)(source)
}

/// RAII guard for a uniquely named scratch directory.
///
/// The directory is removed when the guard drops, whichever way the owning
/// operation exits. Removal failures are logged and otherwise ignored.
pub struct TempDirGuard {
    path: PathBuf,
}

impl TempDirGuard {
    /// Creates `<root>/<uuid>`.
    pub fn create(root: &Path) -> ThemeResult<Self> {
        let path = root.join(Uuid::new_v4().to_string());
        ensure_dir(&path)?;
        log::debug!("Created scratch directory {}", path.display());
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempDirGuard {
    fn drop(&mut self) {
        if !self.path.exists() {
            return;
        }
        match remove_dir(&self.path) {
            Ok(()) => log::debug!("Removed scratch directory {}", self.path.display()),
            Err(e) => log::warn!(
                "Failed to remove scratch directory {}: {e}",
                self.path.display()
            ),
        }
    }
}
