//! Catalog snapshots and the cache that hands them out.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use crate::error::ThemeResult;
use crate::manifest::ThemeDescriptor;
use crate::pointer::ActiveThemePointer;
use crate::scanner::CatalogScanner;

/// Derived, informational data about a theme directory.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ThemeMetadata {
    pub template_files: usize,
    pub stylesheet_files: usize,
    pub script_files: usize,
    pub size_bytes: u64,
    pub last_modified: Option<DateTime<Utc>>,
}

/// One discovered theme as seen by the most recent scan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThemeRecord {
    pub descriptor: ThemeDescriptor,
    pub path: PathBuf,
    pub active: bool,
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub metadata: ThemeMetadata,
}

impl ThemeRecord {
    pub fn slug(&self) -> &str {
        &self.descriptor.slug
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn parent(&self) -> Option<&str> {
        self.descriptor.parent.as_deref()
    }
}

/// Immutable set of theme records keyed by slug.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    themes: BTreeMap<String, ThemeRecord>,
}

impl Catalog {
    pub fn get(&self, slug: &str) -> Option<&ThemeRecord> {
        self.themes.get(slug)
    }

    pub fn contains(&self, slug: &str) -> bool {
        self.themes.contains_key(slug)
    }

    /// Records in slug order.
    pub fn iter(&self) -> impl Iterator<Item = &ThemeRecord> {
        self.themes.values()
    }

    pub fn len(&self) -> usize {
        self.themes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.themes.is_empty()
    }

    pub fn active(&self) -> Option<&ThemeRecord> {
        self.themes.values().find(|record| record.active)
    }

    pub(crate) fn insert(&mut self, record: ThemeRecord) {
        self.themes.insert(record.slug().to_string(), record);
    }
}

struct CachedCatalog {
    catalog: Arc<Catalog>,
    built_at: Instant,
}

/// Time-bounded holder of the latest catalog snapshot.
///
/// Readers share one `Arc<Catalog>`; [`invalidate`](Self::invalidate) drops
/// it so the next [`get_or_build`](Self::get_or_build) rebuilds. A snapshot
/// whose build overlapped an invalidation is returned but never stored.
pub struct CatalogCache {
    entry: RwLock<Option<CachedCatalog>>,
    generation: AtomicU64,
    ttl: Duration,
}

impl CatalogCache {
    /// A zero `ttl` keeps snapshots until invalidated.
    pub fn new(ttl: Duration) -> Self {
        Self {
            entry: RwLock::new(None),
            generation: AtomicU64::new(0),
            ttl,
        }
    }

    pub fn get_or_build<F>(&self, build: F) -> ThemeResult<Arc<Catalog>>
    where
        F: FnOnce() -> ThemeResult<Catalog>,
    {
        if let Some(catalog) = self.fresh() {
            log::debug!("Theme catalog cache hit");
            return Ok(catalog);
        }

        log::debug!("Theme catalog cache miss, rescanning");
        let started = self.generation.load(Ordering::Acquire);
        let catalog = Arc::new(build()?);

        let mut entry = self.entry.write().unwrap_or_else(PoisonError::into_inner);
        if self.generation.load(Ordering::Acquire) == started {
            *entry = Some(CachedCatalog {
                catalog: Arc::clone(&catalog),
                built_at: Instant::now(),
            });
        } else {
            log::debug!("Theme catalog invalidated during rescan, not caching");
        }
        Ok(catalog)
    }

    pub fn invalidate(&self) {
        let mut entry = self.entry.write().unwrap_or_else(PoisonError::into_inner);
        self.generation.fetch_add(1, Ordering::AcqRel);
        *entry = None;
        log::debug!("Theme catalog cache invalidated");
    }

    pub fn is_cached(&self) -> bool {
        self.fresh().is_some()
    }

    fn fresh(&self) -> Option<Arc<Catalog>> {
        let entry = self.entry.read().unwrap_or_else(PoisonError::into_inner);
        let cached = entry.as_ref()?;
        if !self.ttl.is_zero() && cached.built_at.elapsed() >= self.ttl {
            return None;
        }
        Some(Arc::clone(&cached.catalog))
    }
}

/// Scanner, cache and active pointer bundled behind one read path.
pub struct ThemeCatalog {
    scanner: CatalogScanner,
    cache: CatalogCache,
    pointer: Arc<ActiveThemePointer>,
}

impl ThemeCatalog {
    pub fn new(scanner: CatalogScanner, cache: CatalogCache, pointer: Arc<ActiveThemePointer>) -> Self {
        Self {
            scanner,
            cache,
            pointer,
        }
    }

    /// Current snapshot, rescanning when the cache is empty or stale.
    pub fn snapshot(&self) -> ThemeResult<Arc<Catalog>> {
        self.cache
            .get_or_build(|| self.scanner.scan(&self.pointer.get()))
    }

    /// Clone of the record for `slug` in the current snapshot.
    pub fn find(&self, slug: &str) -> ThemeResult<Option<ThemeRecord>> {
        Ok(self.snapshot()?.get(slug).cloned())
    }

    pub fn invalidate(&self) {
        self.cache.invalidate();
    }

    pub fn scanner(&self) -> &CatalogScanner {
        &self.scanner
    }

    pub fn pointer(&self) -> &ActiveThemePointer {
        &self.pointer
    }
}
