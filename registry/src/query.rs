//! Read-only views over the theme catalog.

use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

use crate::catalog::{ThemeCatalog, ThemeRecord};
use crate::config::RegistryConfig;
use crate::error::ThemeResult;
use crate::lifecycle;
use crate::requirements;

/// Message reported by [`ThemeQuery::requirement_errors`] for unknown slugs.
pub const THEME_NOT_FOUND: &str = "Theme not found";

/// Counts over one catalog snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ThemeStats {
    pub total: usize,
    pub active: usize,
    pub inactive: usize,
    pub valid: usize,
    pub invalid: usize,
}

/// Query facade handed to callers that only read.
pub struct ThemeQuery {
    config: RegistryConfig,
    catalog: Arc<ThemeCatalog>,
}

impl ThemeQuery {
    pub fn new(config: RegistryConfig, catalog: Arc<ThemeCatalog>) -> Self {
        Self { config, catalog }
    }

    /// Every theme, in slug order.
    pub fn all(&self) -> ThemeResult<Vec<ThemeRecord>> {
        self.filtered(|_| true)
    }

    pub fn find_by_slug(&self, slug: &str) -> ThemeResult<Option<ThemeRecord>> {
        self.catalog.find(slug)
    }

    /// Themes whose display name contains `needle`, ignoring case.
    pub fn find_by_name(&self, needle: &str) -> ThemeResult<Vec<ThemeRecord>> {
        let needle = needle.to_lowercase();
        self.filtered(|record| record.name().to_lowercase().contains(&needle))
    }

    pub fn active_theme(&self) -> ThemeResult<Option<ThemeRecord>> {
        Ok(self.catalog.snapshot()?.active().cloned())
    }

    /// Slug the pointer currently reports, whether or not it is installed.
    pub fn active_slug(&self) -> String {
        self.catalog.pointer().get()
    }

    pub fn active(&self) -> ThemeResult<Vec<ThemeRecord>> {
        self.filtered(|record| record.active)
    }

    pub fn inactive(&self) -> ThemeResult<Vec<ThemeRecord>> {
        self.filtered(|record| !record.active)
    }

    pub fn valid(&self) -> ThemeResult<Vec<ThemeRecord>> {
        self.filtered(|record| record.is_valid)
    }

    pub fn invalid(&self) -> ThemeResult<Vec<ThemeRecord>> {
        self.filtered(|record| !record.is_valid)
    }

    pub fn stats(&self) -> ThemeResult<ThemeStats> {
        let catalog = self.catalog.snapshot()?;
        let active = catalog.iter().filter(|r| r.active).count();
        let valid = catalog.iter().filter(|r| r.is_valid).count();

        Ok(ThemeStats {
            total: catalog.len(),
            active,
            inactive: catalog.len() - active,
            valid,
            invalid: catalog.len() - valid,
        })
    }

    pub fn exists(&self, slug: &str) -> ThemeResult<bool> {
        Ok(self.catalog.snapshot()?.contains(slug))
    }

    pub fn protected_themes(&self) -> Vec<String> {
        self.config.protected_themes()
    }

    pub fn is_protected(&self, slug: &str) -> bool {
        self.config.protected_themes().iter().any(|p| p == slug)
    }

    /// Neither protected nor active.
    pub fn can_delete(&self, slug: &str) -> bool {
        self.deletion_blockers(slug).is_empty()
    }

    /// Why `slug` cannot be deleted; empty when it can.
    pub fn deletion_blockers(&self, slug: &str) -> Vec<&'static str> {
        lifecycle::deletion_blockers(&self.config, &self.active_slug(), slug)
    }

    pub fn can_disable(&self, slug: &str) -> bool {
        !self.is_protected(slug)
    }

    pub fn meets_requirements(&self, slug: &str) -> ThemeResult<bool> {
        Ok(self.requirement_errors(slug)?.is_empty())
    }

    /// Unmet platform requirements of `slug`.
    pub fn requirement_errors(&self, slug: &str) -> ThemeResult<Vec<String>> {
        let Some(record) = self.catalog.find(slug)? else {
            return Ok(vec![THEME_NOT_FOUND.to_string()]);
        };
        Ok(requirements::requirement_errors(
            &record.descriptor.requirements,
            self.config.runtime_version(),
            self.config.framework_version(),
        ))
    }

    pub fn supports_feature(&self, slug: &str, feature: &str) -> ThemeResult<bool> {
        Ok(self
            .catalog
            .find(slug)?
            .is_some_and(|record| record.descriptor.supports.contains(feature)))
    }

    /// Absolute path of the declared screenshot, when the file exists.
    pub fn screenshot_path(&self, slug: &str) -> ThemeResult<Option<PathBuf>> {
        Ok(self.catalog.find(slug)?.and_then(|record| {
            let screenshot = record.descriptor.screenshot.as_ref()?;
            let path = record.path.join(screenshot);
            path.is_file().then_some(path)
        }))
    }

    pub fn themes_path(&self) -> PathBuf {
        self.config.themes_path()
    }

    fn filtered<F>(&self, keep: F) -> ThemeResult<Vec<ThemeRecord>>
    where
        F: Fn(&ThemeRecord) -> bool,
    {
        Ok(self
            .catalog
            .snapshot()?
            .iter()
            .filter(|record| keep(record))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogCache;
    use crate::pointer::{ActiveThemePointer, MemoryStore};
    use crate::scanner::CatalogScanner;
    use claims::*;
    use std::fs;
    use std::path::Path;
    use std::time::Duration;
    use tempfile::TempDir;

    fn write_theme(themes: &Path, dir: &str, manifest: &str) -> PathBuf {
        let path = themes.join(dir);
        fs::create_dir_all(path.join("views")).unwrap();
        fs::write(path.join("theme.json"), manifest).unwrap();
        path
    }

    fn query(tmp: &TempDir) -> ThemeQuery {
        let themes = tmp.path().join("themes");
        let config = RegistryConfig::with_themes_path(&themes).set_platform_versions("8.2.0", "11.0");
        let pointer = Arc::new(ActiveThemePointer::new(Arc::new(MemoryStore::new()), "default"));
        let catalog = Arc::new(ThemeCatalog::new(
            CatalogScanner::new(&themes, config.required_fields()),
            CatalogCache::new(Duration::ZERO),
            pointer,
        ));
        ThemeQuery::new(config, catalog)
    }

    #[test]
    fn stats_and_filters() {
        let tmp = TempDir::new().unwrap();
        let themes = tmp.path().join("themes");
        write_theme(&themes, "default", r#"{"name":"Default","version":"1.0.0"}"#);
        write_theme(&themes, "ocean", r#"{"name":"Ocean Breeze","version":"1.2.0"}"#);
        write_theme(&themes, "broken", r#"{"name":"Broken"}"#);

        let query = query(&tmp);
        assert_eq!(
            query.stats().unwrap(),
            ThemeStats {
                total: 3,
                active: 1,
                inactive: 2,
                valid: 2,
                invalid: 1
            }
        );
        assert_eq!(query.active_theme().unwrap().unwrap().slug(), "default");
        assert_eq!(query.invalid().unwrap()[0].slug(), "broken");
        assert_eq!(query.find_by_name("BREEZE").unwrap().len(), 1);
        assert!(query.exists("ocean").unwrap());
        assert!(!query.exists("ghost").unwrap());
    }

    #[test]
    fn deletability_rules() {
        let tmp = TempDir::new().unwrap();
        let query = query(&tmp);

        assert!(query.is_protected("default"));
        assert!(!query.can_delete("default"));
        assert!(!query.can_disable("default"));
        assert_eq!(
            query.deletion_blockers("default"),
            vec![lifecycle::REASON_PROTECTED, lifecycle::REASON_ACTIVE]
        );
        assert!(query.can_delete("ocean"));
        assert!(query.can_disable("ocean"));
    }

    #[test]
    fn requirements_features_and_screenshot() {
        let tmp = TempDir::new().unwrap();
        let themes = tmp.path().join("themes");
        let dir = write_theme(
            &themes,
            "modern",
            r#"{
                "name": "Modern",
                "version": "1.0.0",
                "requirements": {"runtime": ">=8.1", "framework": "^12.0"},
                "supports": ["dark-mode"],
                "screenshot": "screenshot.png"
            }"#,
        );

        let query = query(&tmp);
        assert_eq!(
            query.requirement_errors("modern").unwrap(),
            vec!["framework 12.0 or higher is required".to_string()]
        );
        assert!(!query.meets_requirements("modern").unwrap());
        assert_eq!(
            query.requirement_errors("ghost").unwrap(),
            vec![THEME_NOT_FOUND.to_string()]
        );

        assert!(query.supports_feature("modern", "dark-mode").unwrap());
        assert!(!query.supports_feature("modern", "rtl").unwrap());

        assert_none!(query.screenshot_path("modern").unwrap());
        fs::write(dir.join("screenshot.png"), [0u8; 4]).unwrap();
        assert_eq!(
            query.screenshot_path("modern").unwrap(),
            Some(dir.join("screenshot.png"))
        );
    }
}
