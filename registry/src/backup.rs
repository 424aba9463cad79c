//! Timestamped copies of theme directories taken before destructive changes.

use chrono::Local;
use std::path::{Path, PathBuf};

use crate::error::{ThemeError, ThemeResult};
use crate::fs_utils;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Copies theme directories into `<backup_root>/<slug>_<timestamp>`.
#[derive(Debug, Clone)]
pub struct BackupStore {
    root: PathBuf,
}

impl BackupStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Copies `theme_dir` and returns the backup location.
    pub fn backup(&self, slug: &str, theme_dir: &Path) -> ThemeResult<PathBuf> {
        if !theme_dir.is_dir() {
            return Err(ThemeError::SourceNotFound {
                path: theme_dir.to_path_buf(),
            });
        }

        let target = self.next_target(slug);
        if let Err(e) = fs_utils::copy_dir(theme_dir, &target) {
            let _ = fs_utils::remove_dir(&target);
            return Err(e);
        }
        log::info!("Backed up theme '{slug}' to {}", target.display());
        Ok(target)
    }

    /// Like [`backup`](Self::backup) but only logs failures.
    pub fn backup_best_effort(&self, slug: &str, theme_dir: &Path) -> Option<PathBuf> {
        match self.backup(slug, theme_dir) {
            Ok(path) => Some(path),
            Err(e) => {
                log::warn!("Backup of theme '{slug}' failed, continuing: {e}");
                None
            }
        }
    }

    /// Existing backups of `slug`, oldest first.
    pub fn list(&self, slug: &str) -> Vec<PathBuf> {
        let prefix = format!("{slug}_");
        let mut backups: Vec<PathBuf> = fs_utils::subdirectories(&self.root)
            .filter(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .and_then(|name| name.strip_prefix(&prefix))
                    .is_some_and(|rest| rest.starts_with(|c: char| c.is_ascii_digit()))
            })
            .collect();
        backups.sort();
        backups
    }

    fn next_target(&self, slug: &str) -> PathBuf {
        let stamp = Local::now().format(TIMESTAMP_FORMAT).to_string();
        let base = self.root.join(format!("{slug}_{stamp}"));
        if !base.exists() {
            return base;
        }
        // Same slug backed up twice within one second
        (1..)
            .map(|n| self.root.join(format!("{slug}_{stamp}_{n}")))
            .find(|candidate| !candidate.exists())
            .unwrap_or(base)
    }
}
