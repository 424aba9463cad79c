use std::sync::Arc;

use crate::catalog::{CatalogCache, ThemeCatalog};
use crate::config::RegistryConfig;
use crate::lifecycle::LifecycleManager;
use crate::pointer::{
    ActiveThemePointer, ActiveThemeStore, EnvFileStore, MemoryRenderPointer, RenderPointer,
};
use crate::query::ThemeQuery;
use crate::remote::{GitFetcher, RemoteFetcher};
use crate::scanner::CatalogScanner;

/// Entry point that wires the registry together.
///
/// Construct one per process. The query facade and the lifecycle manager it
/// hands out share one active-theme pointer and one catalog cache, so a
/// mutation made through [`lifecycle`](Self::lifecycle) is visible to the
/// next [`query`](Self::query) read.
///
/// # Examples
///
/// ```no_run
/// use registry::config::RegistryConfig;
/// use registry::manager::ThemeManager;
///
/// let manager = ThemeManager::with_defaults(RegistryConfig::with_themes_path("themes"));
/// for theme in manager.query().all()? {
///     println!("{} ({})", theme.name(), theme.slug());
/// }
/// manager.lifecycle().activate("default")?;
/// # Ok::<(), registry::error::ThemeError>(())
/// ```
pub struct ThemeManager {
    config: RegistryConfig,
    catalog: Arc<ThemeCatalog>,
    render: Arc<dyn RenderPointer>,
    query: ThemeQuery,
    lifecycle: LifecycleManager,
}

impl ThemeManager {
    pub fn new(
        config: RegistryConfig,
        store: Arc<dyn ActiveThemeStore>,
        render: Arc<dyn RenderPointer>,
        fetcher: Arc<dyn RemoteFetcher>,
    ) -> Self {
        let pointer = Arc::new(ActiveThemePointer::new(store, config.default_theme()));
        let catalog = Arc::new(ThemeCatalog::new(
            CatalogScanner::new(config.themes_path(), config.required_fields()),
            CatalogCache::new(config.cache_duration()),
            pointer,
        ));

        log::debug!(
            "Theme manager ready (themes: {}, cache: {}s)",
            config.themes_path().display(),
            config.cache_duration().as_secs()
        );

        Self {
            query: ThemeQuery::new(config.clone(), Arc::clone(&catalog)),
            lifecycle: LifecycleManager::new(
                config.clone(),
                Arc::clone(&catalog),
                Arc::clone(&render),
                fetcher,
            ),
            config,
            catalog,
            render,
        }
    }

    /// Env-file persistence, an in-memory render pointer and `git` fetching.
    pub fn with_defaults(config: RegistryConfig) -> Self {
        let store = Arc::new(EnvFileStore::new(config.env_file(), config.env_key()));
        let fetcher = Arc::new(GitFetcher::new(config.fetch_timeout()));
        Self::new(config, store, Arc::new(MemoryRenderPointer::new()), fetcher)
    }

    pub fn query(&self) -> &ThemeQuery {
        &self.query
    }

    pub fn lifecycle(&self) -> &LifecycleManager {
        &self.lifecycle
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn render(&self) -> &Arc<dyn RenderPointer> {
        &self.render
    }

    pub fn catalog(&self) -> &Arc<ThemeCatalog> {
        &self.catalog
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pointer::MemoryStore;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn lifecycle_changes_are_visible_to_queries() {
        let tmp = TempDir::new().unwrap();
        let themes = tmp.path().join("themes");
        for slug in ["default", "alt"] {
            fs::create_dir_all(themes.join(slug).join("views")).unwrap();
            fs::write(
                themes.join(slug).join("theme.json"),
                format!(r#"{{"name":"{slug}","version":"1.0.0"}}"#),
            )
            .unwrap();
        }

        let manager = ThemeManager::new(
            RegistryConfig::with_themes_path(&themes).set_backup_existing(false),
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryRenderPointer::new()),
            Arc::new(GitFetcher::new(std::time::Duration::from_secs(1))),
        );

        // Warm the cache before mutating
        assert_eq!(manager.query().stats().unwrap().total, 2);

        manager.lifecycle().activate("alt").unwrap();
        assert_eq!(manager.query().active_theme().unwrap().unwrap().slug(), "alt");
        assert_eq!(manager.render().active().as_deref(), Some("alt"));

        manager.lifecycle().clone_theme("alt", "alt-two", "Alt Two").unwrap();
        assert_eq!(manager.query().stats().unwrap().total, 3);
    }
}
