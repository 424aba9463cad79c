//! Mutating theme operations: install, activate, clone, delete.
//!
//! Every operation that touches a slug holds that slug's lock for its whole
//! duration and invalidates the catalog cache once the filesystem settles, so
//! the next read always reflects the change.

use serde::Serialize;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::archive;
use crate::backup::BackupStore;
use crate::bulk::BulkDeleteResult;
use crate::catalog::{ThemeCatalog, ThemeRecord};
use crate::config::{InstallSource, RegistryConfig};
use crate::error::{ThemeError, ThemeResult};
use crate::fs_utils::{self, TempDirGuard};
use crate::locks::SlugLocks;
use crate::manifest::{self, DEFAULT_VERSION, MANIFEST_FILE};
use crate::pointer::RenderPointer;
use crate::remote::{self, RemoteFetcher};
use crate::validation::{SlugValidator, Validator};

/// Skip reason recorded by bulk delete for a protected slug.
pub const REASON_PROTECTED: &str = "protected";
/// Skip reason recorded by bulk delete for the active slug.
pub const REASON_ACTIVE: &str = "active theme";

/// Result of a successful install.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstalledTheme {
    pub slug: String,
    pub path: PathBuf,
    /// An existing theme with the same slug was replaced
    pub replaced: bool,
    /// Auto-enable was configured and activation succeeded
    pub activated: bool,
}

#[derive(Debug, Clone, Copy)]
enum Placement {
    Move,
    Copy,
}

/// Performs lifecycle operations against the themes directory.
pub struct LifecycleManager {
    config: RegistryConfig,
    catalog: Arc<ThemeCatalog>,
    render: Arc<dyn RenderPointer>,
    fetcher: Arc<dyn RemoteFetcher>,
    backups: BackupStore,
    locks: SlugLocks,
}

impl LifecycleManager {
    pub fn new(
        config: RegistryConfig,
        catalog: Arc<ThemeCatalog>,
        render: Arc<dyn RenderPointer>,
        fetcher: Arc<dyn RemoteFetcher>,
    ) -> Self {
        let backups = BackupStore::new(config.backup_path());
        Self {
            config,
            catalog,
            render,
            fetcher,
            backups,
            locks: SlugLocks::new(),
        }
    }

    /// Installs the theme contained in a zip archive.
    ///
    /// The manifest may sit at any depth inside the archive; the directory
    /// holding it becomes the theme root and the declared slug decides where
    /// it lands.
    pub fn install_from_zip(&self, archive_path: &Path) -> ThemeResult<InstalledTheme> {
        self.ensure_source_allowed(InstallSource::Zip)?;
        if !archive_path.is_file() {
            return Err(ThemeError::SourceNotFound {
                path: archive_path.to_path_buf(),
            });
        }

        let staging = TempDirGuard::create(&self.config.temp_path())?;
        let (slug, path, replaced) = self
            .stage_zip(archive_path, staging.path())
            .inspect_err(|e| log::error!("Install from {} failed: {e}", archive_path.display()))?;
        drop(staging);

        Ok(self.finish_install(slug, path, replaced, InstallSource::Zip))
    }

    /// Installs a theme from a remote repository reference.
    ///
    /// `owner/repo` shorthand is expanded to a GitHub clone URL.
    pub fn install_from_remote(&self, reference: &str) -> ThemeResult<InstalledTheme> {
        self.ensure_source_allowed(InstallSource::Git)?;
        let url = remote::resolve_reference(reference);

        let staging = TempDirGuard::create(&self.config.temp_path())?;
        let (slug, path, replaced) = self
            .stage_remote(&url, &staging.path().join("checkout"))
            .inspect_err(|e| log::error!("Install from {url} failed: {e}"))?;
        drop(staging);

        Ok(self.finish_install(slug, path, replaced, InstallSource::Git))
    }

    /// Copies a theme from a local directory.
    ///
    /// The slug is `slug_override`, else the manifest's slug, else the source
    /// directory's name. When an override differs from the declared slug the
    /// installed manifest is rewritten to match.
    pub fn install_from_local(
        &self,
        source: &Path,
        slug_override: Option<&str>,
    ) -> ThemeResult<InstalledTheme> {
        self.ensure_source_allowed(InstallSource::Local)?;
        if !source.is_dir() {
            return Err(ThemeError::SourceNotFound {
                path: source.to_path_buf(),
            });
        }

        let manifest_path =
            manifest::find_manifest(source).ok_or_else(|| ThemeError::InvalidStructure {
                reason: format!("No {MANIFEST_FILE} found in {}", source.display()),
            })?;
        let fields = manifest::parse_manifest(&manifest_path)?;
        let theme_root = manifest_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| source.to_path_buf());

        let declared = manifest::declared_slug(&fields);
        let slug = match (slug_override, &declared) {
            (Some(slug), _) => slug.to_string(),
            (None, Some(slug)) => slug.clone(),
            (None, None) => dir_name(source).ok_or_else(|| ThemeError::InvalidStructure {
                reason: format!("Cannot derive a slug from {}", source.display()),
            })?,
        };
        SlugValidator.validate(&slug)?;

        let (path, replaced) = self
            .locks
            .with_lock(&slug, || {
                let target = self.config.themes_path().join(&slug);
                if is_same_dir(&theme_root, &target) {
                    return Err(ThemeError::AlreadyExists { slug: slug.clone() });
                }

                let (path, replaced) = self.place_theme(&theme_root, &slug, Placement::Copy)?;
                if slug_override.is_some() && declared.as_deref() != Some(slug.as_str()) {
                    manifest::rewrite_manifest(&path.join(MANIFEST_FILE), |fields| {
                        fields.insert("slug".to_string(), json!(slug));
                    })?;
                }
                Ok((path, replaced))
            })
            .inspect_err(|e| log::error!("Install from {} failed: {e}", source.display()))?;

        Ok(self.finish_install(slug, path, replaced, InstallSource::Local))
    }

    /// Reinstalls a theme from the GitHub repository named in its `homepage`.
    pub fn update_from_homepage(&self, slug: &str) -> ThemeResult<InstalledTheme> {
        let record = self.resolve(slug)?;
        let homepage = record
            .descriptor
            .homepage
            .clone()
            .filter(|homepage| homepage.contains("github.com"))
            .ok_or_else(|| ThemeError::InvalidStructure {
                reason: format!("Theme '{slug}' has no GitHub homepage to update from"),
            })?;

        // Replacement already backs up the old copy when backup_existing is on
        if !self.config.backup_existing() {
            self.backups.backup_best_effort(slug, &record.path);
        }

        log::info!("Updating theme '{slug}' from {homepage}");
        self.install_from_remote(&homepage)
    }

    /// Makes `slug` the active theme.
    ///
    /// Invalid themes are refused and leave the pointer untouched. When the
    /// durable store rejects the write the in-memory pointer has already
    /// moved; the error is [`ThemeError::PersistenceFailed`]. Slugs that
    /// fail [`SlugValidator`] are refused before anything is touched.
    pub fn activate(&self, slug: &str) -> ThemeResult<()> {
        SlugValidator
            .validate(slug)
            .inspect_err(|e| log::error!("Refusing to activate theme {slug:?}: {e}"))?;

        self.locks
            .with_lock(slug, || {
                let record = self.resolve(slug)?;
                if !record.is_valid {
                    return Err(ThemeError::InvalidTheme {
                        slug: slug.to_string(),
                        errors: record.errors,
                    });
                }

                self.render.clear();
                self.render.set(slug, record.parent());
                let persisted = self.catalog.pointer().set(slug);

                self.catalog.invalidate();
                self.render.clear_view_cache();

                persisted?;
                log::info!("Activated theme '{slug}'");
                Ok(())
            })
            .inspect_err(|e| log::error!("Failed to activate theme '{slug}': {e}"))
    }

    /// Copies `source_slug` to a new theme whose parent is the source.
    pub fn clone_theme(
        &self,
        source_slug: &str,
        new_slug: &str,
        new_name: &str,
    ) -> ThemeResult<PathBuf> {
        SlugValidator.validate(new_slug)?;

        self.locks
            .with_locks(source_slug, new_slug, || {
                let source = self.resolve(source_slug)?;
                let target = self.config.themes_path().join(new_slug);
                if target.exists() || self.catalog.snapshot()?.contains(new_slug) {
                    return Err(ThemeError::AlreadyExists {
                        slug: new_slug.to_string(),
                    });
                }

                let copied = fs_utils::copy_dir(&source.path, &target).and_then(|()| {
                    manifest::rewrite_manifest(&target.join(MANIFEST_FILE), |fields| {
                        fields.insert("name".to_string(), json!(new_name));
                        fields.insert("slug".to_string(), json!(new_slug));
                        fields.insert("version".to_string(), json!(DEFAULT_VERSION));
                        fields.insert("parent".to_string(), json!(source_slug));
                    })
                });
                if let Err(e) = copied {
                    if target.exists() {
                        let _ = fs_utils::remove_dir(&target);
                    }
                    return Err(e);
                }

                self.catalog.invalidate();
                log::info!("Cloned theme '{source_slug}' to '{new_slug}'");
                Ok(target)
            })
            .inspect_err(|e| log::error!("Failed to clone theme '{source_slug}': {e}"))
    }

    /// Deletes a theme directory after backing it up.
    ///
    /// Protected themes and the active theme are refused without touching
    /// the filesystem.
    pub fn delete(&self, slug: &str) -> ThemeResult<()> {
        self.locks
            .with_lock(slug, || {
                let removed = self.remove_theme(slug);
                if !matches!(&removed, Err(e) if e.is_deletion_blocked()) {
                    self.catalog.invalidate();
                }
                removed
            })
            .inspect_err(|e| log::error!("Failed to delete theme '{slug}': {e}"))
    }

    /// Deletes each slug independently; one failure never stops the rest.
    pub fn bulk_delete<S: AsRef<str>>(&self, slugs: &[S]) -> BulkDeleteResult {
        let mut result = BulkDeleteResult::new(slugs.len());

        for slug in slugs.iter().map(AsRef::as_ref) {
            match self.locks.with_lock(slug, || self.remove_theme(slug)) {
                Ok(()) => result.add_deleted(slug),
                Err(ThemeError::Protected { .. }) => result.add_skipped(slug, REASON_PROTECTED),
                Err(ThemeError::ActiveThemeConflict { .. }) => {
                    result.add_skipped(slug, REASON_ACTIVE)
                }
                Err(e) => {
                    log::warn!("Bulk delete of '{slug}' failed: {e}");
                    result.add_error(slug, e.to_string());
                }
            }
        }

        if !result.deleted.is_empty() {
            self.catalog.invalidate();
        }
        log::info!("{}", result.summary());
        result
    }

    /// Refuses deletion of protected themes and of the active theme.
    pub fn check_deletable(&self, slug: &str) -> ThemeResult<()> {
        let active = self.catalog.pointer().get();
        match deletion_blockers(&self.config, &active, slug).first() {
            None => Ok(()),
            Some(&REASON_PROTECTED) => Err(ThemeError::Protected {
                slug: slug.to_string(),
            }),
            Some(_) => Err(ThemeError::ActiveThemeConflict {
                slug: slug.to_string(),
            }),
        }
    }

    /// Drops the cached catalog so the next read rescans.
    pub fn refresh(&self) {
        self.catalog.invalidate();
        log::info!("Theme discovery refreshed");
    }

    fn remove_theme(&self, slug: &str) -> ThemeResult<()> {
        self.check_deletable(slug)?;
        let record = self.resolve(slug)?;

        if self.config.backup_existing() {
            self.backups.backup_best_effort(slug, &record.path);
        }

        if !record.path.is_dir() {
            return Err(ThemeError::NotFound {
                slug: slug.to_string(),
            });
        }
        fs_utils::remove_dir(&record.path)?;
        if record.path.exists() {
            return Err(ThemeError::io_at("delete", &record.path)(std::io::Error::other(
                "directory still present after removal",
            )));
        }

        log::info!("Deleted theme '{slug}'");
        Ok(())
    }

    fn stage_zip(
        &self,
        archive_path: &Path,
        staging: &Path,
    ) -> ThemeResult<(String, PathBuf, bool)> {
        let limits = archive::ExtractLimits {
            max_entries: self.config.max_archive_entries(),
            max_total_bytes: self.config.max_archive_bytes(),
        };
        archive::extract_zip(archive_path, staging, limits)?;
        let (theme_root, slug) = locate_declared_theme(staging)?;
        let (path, replaced) = self.locks.with_lock(&slug, || {
            self.place_theme(&theme_root, &slug, Placement::Move)
        })?;
        Ok((slug, path, replaced))
    }

    fn stage_remote(&self, url: &str, checkout: &Path) -> ThemeResult<(String, PathBuf, bool)> {
        self.fetcher.fetch(url, checkout)?;
        let (theme_root, slug) = locate_declared_theme(checkout)?;

        let git_dir = theme_root.join(".git");
        if git_dir.exists() {
            fs_utils::remove_dir(&git_dir)?;
        }

        let (path, replaced) = self.locks.with_lock(&slug, || {
            self.place_theme(&theme_root, &slug, Placement::Move)
        })?;
        Ok((slug, path, replaced))
    }

    fn resolve(&self, slug: &str) -> ThemeResult<ThemeRecord> {
        self.catalog
            .find(slug)?
            .ok_or_else(|| ThemeError::NotFound {
                slug: slug.to_string(),
            })
    }

    fn ensure_source_allowed(&self, source: InstallSource) -> ThemeResult<()> {
        if self.config.is_source_allowed(source) {
            Ok(())
        } else {
            Err(ThemeError::SourceNotAllowed {
                source_kind: source.to_string(),
            })
        }
    }

    /// Puts `theme_root` at `<themes>/<slug>`, replacing (and backing up) any
    /// existing theme there. Returns the target and whether it replaced one.
    fn place_theme(
        &self,
        theme_root: &Path,
        slug: &str,
        placement: Placement,
    ) -> ThemeResult<(PathBuf, bool)> {
        let themes_root = self.config.themes_path();
        fs_utils::ensure_dir(&themes_root)?;
        let target = themes_root.join(slug);

        let replaced = target.exists();
        if replaced {
            if self.config.backup_existing() {
                self.backups.backup_best_effort(slug, &target);
            }
            fs_utils::remove_dir(&target)?;
            log::info!("Removed previous installation of '{slug}'");
        }

        let placed = match placement {
            Placement::Move => fs_utils::move_dir(theme_root, &target),
            Placement::Copy => fs_utils::copy_dir(theme_root, &target),
        };
        if let Err(e) = placed {
            if target.exists() {
                let _ = fs_utils::remove_dir(&target);
            }
            return Err(e);
        }

        Ok((target, replaced))
    }

    fn finish_install(
        &self,
        slug: String,
        path: PathBuf,
        replaced: bool,
        source: InstallSource,
    ) -> InstalledTheme {
        self.catalog.invalidate();
        log::info!(
            "Installed theme '{slug}' from {source} source at {}",
            path.display()
        );

        let activated = self.config.auto_enable()
            && match self.activate(&slug) {
                Ok(()) => true,
                Err(e) => {
                    log::warn!("Installed theme '{slug}' could not be auto-enabled: {e}");
                    false
                }
            };

        InstalledTheme {
            slug,
            path,
            replaced,
            activated,
        }
    }
}

/// Reasons `slug` may not be deleted, protection first.
pub fn deletion_blockers(
    config: &RegistryConfig,
    active_slug: &str,
    slug: &str,
) -> Vec<&'static str> {
    let mut reasons = Vec::new();
    if config.protected_themes().iter().any(|p| p == slug) {
        reasons.push(REASON_PROTECTED);
    }
    if active_slug == slug {
        reasons.push(REASON_ACTIVE);
    }
    reasons
}

/// Finds the manifest inside an unpacked source tree and returns the theme
/// root with its declared, validated slug.
fn locate_declared_theme(tree: &Path) -> ThemeResult<(PathBuf, String)> {
    let manifest_path = manifest::find_manifest(tree).ok_or_else(|| ThemeError::InvalidStructure {
        reason: format!("No {MANIFEST_FILE} found in the theme source"),
    })?;
    let fields = manifest::parse_manifest(&manifest_path)?;
    let slug = manifest::declared_slug(&fields).ok_or_else(|| ThemeError::InvalidStructure {
        reason: format!("{MANIFEST_FILE} does not declare a slug"),
    })?;
    SlugValidator.validate(&slug)?;

    let theme_root = manifest_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| tree.to_path_buf());
    Ok((theme_root, slug))
}

fn dir_name(path: &Path) -> Option<String> {
    path.canonicalize()
        .ok()?
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
}

fn is_same_dir(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogCache;
    use crate::pointer::{
        ActiveThemePointer, ActiveThemeStore, MemoryRenderPointer, MemoryStore, RenderCall,
    };
    use crate::scanner::CatalogScanner;
    use claims::*;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    struct Fixture {
        _tmp: TempDir,
        themes: PathBuf,
        render: Arc<MemoryRenderPointer>,
        store: Arc<MemoryStore>,
        manager: LifecycleManager,
    }

    struct NoFetch;

    impl RemoteFetcher for NoFetch {
        fn fetch(&self, url: &str, _dest: &Path) -> ThemeResult<()> {
            Err(ThemeError::FetchFailed {
                reference: url.to_string(),
                reason: "offline".to_string(),
            })
        }
    }

    fn write_theme(themes: &Path, dir: &str, manifest: &str) {
        let path = themes.join(dir);
        fs::create_dir_all(path.join("views")).unwrap();
        fs::write(path.join(MANIFEST_FILE), manifest).unwrap();
    }

    fn fixture() -> Fixture {
        let tmp = TempDir::new().unwrap();
        let themes = tmp.path().join("themes");
        write_theme(&themes, "default", r#"{"name":"Default","version":"1.0.0"}"#);
        write_theme(
            &themes,
            "plain",
            r#"{"name":"Plain","version":"2.0.0","parent":"default"}"#,
        );
        write_theme(&themes, "broken", r#"{"description":"no name"}"#);

        let config = RegistryConfig::with_themes_path(&themes)
            .set_backup_path(tmp.path().join("backups"))
            .set_temp_path(tmp.path().join("tmp"));
        let store = Arc::new(MemoryStore::new());
        let pointer = Arc::new(ActiveThemePointer::new(store.clone(), "default"));
        let catalog = Arc::new(ThemeCatalog::new(
            CatalogScanner::new(&themes, config.required_fields()),
            CatalogCache::new(Duration::ZERO),
            pointer,
        ));
        let render = Arc::new(MemoryRenderPointer::new());
        let manager = LifecycleManager::new(config, catalog, render.clone(), Arc::new(NoFetch));

        Fixture {
            _tmp: tmp,
            themes,
            render,
            store,
            manager,
        }
    }

    #[test]
    fn activate_updates_pointer_and_render_layer() {
        let f = fixture();
        assert_ok!(f.manager.activate("plain"));

        assert_eq!(f.store.get_active().as_deref(), Some("plain"));
        assert_eq!(
            f.render.calls(),
            vec![
                RenderCall::Clear,
                RenderCall::Set {
                    slug: "plain".to_string(),
                    parent: Some("default".to_string())
                },
                RenderCall::ClearViewCache,
            ]
        );
        let catalog = f.manager.catalog.snapshot().unwrap();
        assert!(catalog.get("plain").unwrap().active);
        assert!(!catalog.get("default").unwrap().active);
    }

    #[test]
    fn activate_refuses_unknown_and_invalid() {
        let f = fixture();
        assert_matches!(f.manager.activate("ghost"), Err(ThemeError::NotFound { .. }));
        assert_matches!(
            f.manager.activate("broken"),
            Err(ThemeError::InvalidTheme { .. })
        );
        assert_none!(f.store.get_active());
        assert!(f.render.calls().is_empty());
    }

    #[test]
    fn delete_is_blocked_for_protected_and_active() {
        let f = fixture();
        assert_matches!(f.manager.delete("default"), Err(ThemeError::Protected { .. }));

        assert_ok!(f.manager.activate("plain"));
        assert_matches!(
            f.manager.delete("plain"),
            Err(ThemeError::ActiveThemeConflict { .. })
        );
        assert!(f.themes.join("plain").is_dir());
        assert!(f.themes.join("default").is_dir());
    }

    #[test]
    fn delete_removes_directory_and_backs_up() {
        let f = fixture();
        assert_ok!(f.manager.delete("plain"));
        assert!(!f.themes.join("plain").exists());
        assert_eq!(f.manager.backups.list("plain").len(), 1);
        assert_none!(f.manager.catalog.find("plain").unwrap());
        assert_matches!(f.manager.delete("plain"), Err(ThemeError::NotFound { .. }));
    }

    #[test]
    fn clone_rewrites_manifest() {
        let f = fixture();
        let path = assert_ok!(f.manager.clone_theme("plain", "plain-copy", "Plain Copy"));
        assert_eq!(path, f.themes.join("plain-copy"));

        let record = f.manager.catalog.find("plain-copy").unwrap().unwrap();
        assert_eq!(record.name(), "Plain Copy");
        assert_eq!(record.descriptor.version, "1.0.0");
        assert_eq!(record.parent(), Some("plain"));
        assert!(record.is_valid);
    }

    #[test]
    fn clone_refuses_existing_target_and_bad_slug() {
        let f = fixture();
        assert_matches!(
            f.manager.clone_theme("plain", "default", "Again"),
            Err(ThemeError::AlreadyExists { .. })
        );
        assert_matches!(
            f.manager.clone_theme("plain", "../escape", "Escape"),
            Err(ThemeError::InvalidSlug { .. })
        );
        assert_matches!(
            f.manager.clone_theme("ghost", "ghost-copy", "Ghost"),
            Err(ThemeError::NotFound { .. })
        );
        assert!(!f.themes.join("ghost-copy").exists());
    }

    #[test]
    fn bulk_delete_classifies_each_slug() {
        let f = fixture();
        let result = f.manager.bulk_delete(&["default", "plain", "ghost", "broken"]);

        assert_eq!(result.deleted, vec!["plain", "broken"]);
        assert_eq!(result.skipped.len(), 1);
        assert_eq!(result.skipped[0].reason, REASON_PROTECTED);
        assert_eq!(result.errored.len(), 1);
        assert_eq!(result.errored[0].slug, "ghost");
        assert_eq!(f.manager.catalog.snapshot().unwrap().len(), 1);
    }

    #[test]
    fn remote_install_gated_and_fetch_errors_surface() {
        let f = fixture();
        assert_matches!(
            f.manager.install_from_remote("acme/theme"),
            Err(ThemeError::FetchFailed { .. })
        );
    }
}
