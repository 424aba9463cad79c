//! Active theme tracking.
//!
//! [`ActiveThemePointer`] is the process-wide answer to "which theme is
//! active". It keeps an in-memory slot in front of a durable
//! [`ActiveThemeStore`]; writes go to the slot first and then through to the
//! store. The rendering layer is told about activations through
//! [`RenderPointer`].

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use crate::error::{ThemeError, ThemeResult};

/// Durable storage for the active slug (environment file, database, ...).
pub trait ActiveThemeStore: Send + Sync {
    fn get_active(&self) -> Option<String>;
    fn set_active(&self, slug: &str) -> ThemeResult<()>;
}

/// The rendering layer's own notion of the current theme.
pub trait RenderPointer: Send + Sync {
    fn set(&self, slug: &str, parent: Option<&str>);
    fn clear(&self);
    fn active(&self) -> Option<String>;
    fn clear_view_cache(&self);
}

/// Stores the active slug as a `KEY=value` line in an env file.
///
/// Other lines, comments included, are preserved verbatim. The key is
/// appended when absent and the file is created when missing.
#[derive(Debug, Clone)]
pub struct EnvFileStore {
    path: PathBuf,
    key: String,
}

impl EnvFileStore {
    pub fn new(path: impl Into<PathBuf>, key: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            key: key.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parse_line<'a>(&self, line: &'a str) -> Option<&'a str> {
        let line = line.trim();
        if line.starts_with('#') {
            return None;
        }
        let (key, value) = line.split_once('=')?;
        if key.trim() != self.key {
            return None;
        }
        Some(value.trim().trim_matches(['"', '\'']))
    }
}

impl ActiveThemeStore for EnvFileStore {
    fn get_active(&self) -> Option<String> {
        let content = fs::read_to_string(&self.path).ok()?;
        content
            .lines()
            .filter_map(|line| self.parse_line(line))
            .last()
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    }

    fn set_active(&self, slug: &str) -> ThemeResult<()> {
        if slug.is_empty() || slug.chars().any(|c| c.is_control() || c == '=' || c == '#') {
            return Err(ThemeError::InvalidSlug {
                slug: slug.to_string(),
                reason: "Slug cannot be stored as an env file value".to_string(),
            });
        }

        let existing = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(ThemeError::io_at("read env file", &self.path)(e)),
        };

        let mut content = String::with_capacity(existing.len() + slug.len() + 16);
        let mut written = false;
        for line in existing.lines() {
            if self.parse_line(line).is_some() {
                // Collapse duplicate keys into the first occurrence
                if !written {
                    content.push_str(&format!("{}={slug}\n", self.key));
                    written = true;
                }
                continue;
            }
            content.push_str(line);
            content.push('\n');
        }
        if !written {
            content.push_str(&format!("{}={slug}\n", self.key));
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(ThemeError::io_at("create directory", parent))?;
        }
        fs::write(&self.path, content).map_err(ThemeError::io_at("write env file", &self.path))?;

        log::debug!("Persisted {}={slug} to {}", self.key, self.path.display());
        Ok(())
    }
}

/// In-process store, mostly for tests and embedders without durable state.
#[derive(Debug, Default)]
pub struct MemoryStore {
    value: RwLock<Option<String>>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(slug: impl Into<String>) -> Self {
        Self {
            value: RwLock::new(Some(slug.into())),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Makes every subsequent `set_active` fail until turned off again.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

impl ActiveThemeStore for MemoryStore {
    fn get_active(&self) -> Option<String> {
        self.value
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_active(&self, slug: &str) -> ThemeResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(ThemeError::io("Failed to persist active theme")(
                std::io::Error::other("store is read-only"),
            ));
        }
        *self.value.write().unwrap_or_else(PoisonError::into_inner) = Some(slug.to_string());
        Ok(())
    }
}

/// A call observed by [`MemoryRenderPointer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderCall {
    Set {
        slug: String,
        parent: Option<String>,
    },
    Clear,
    ClearViewCache,
}

/// Rendering pointer that just remembers what it was told.
#[derive(Debug, Default)]
pub struct MemoryRenderPointer {
    current: RwLock<Option<String>>,
    calls: Mutex<Vec<RenderCall>>,
}

impl MemoryRenderPointer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<RenderCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn record(&self, call: RenderCall) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
    }
}

impl RenderPointer for MemoryRenderPointer {
    fn set(&self, slug: &str, parent: Option<&str>) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(slug.to_string());
        self.record(RenderCall::Set {
            slug: slug.to_string(),
            parent: parent.map(str::to_string),
        });
    }

    fn clear(&self) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = None;
        self.record(RenderCall::Clear);
    }

    fn active(&self) -> Option<String> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn clear_view_cache(&self) {
        self.record(RenderCall::ClearViewCache);
    }
}

/// Process-wide active theme slot with write-through persistence.
pub struct ActiveThemePointer {
    slot: RwLock<Option<String>>,
    store: Arc<dyn ActiveThemeStore>,
    fallback: String,
}

impl ActiveThemePointer {
    pub fn new(store: Arc<dyn ActiveThemeStore>, fallback: impl Into<String>) -> Self {
        Self {
            slot: RwLock::new(None),
            store,
            fallback: fallback.into(),
        }
    }

    /// Slot value, else the durable value, else the configured fallback.
    pub fn get(&self) -> String {
        if let Some(slug) = self
            .slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
        {
            return slug;
        }
        self.store
            .get_active()
            .unwrap_or_else(|| self.fallback.clone())
    }

    /// Updates the slot, then writes through to the store.
    ///
    /// A store failure is reported as [`ThemeError::PersistenceFailed`]; the
    /// slot keeps the new value.
    pub fn set(&self, slug: &str) -> ThemeResult<()> {
        *self.slot.write().unwrap_or_else(PoisonError::into_inner) = Some(slug.to_string());

        self.store
            .set_active(slug)
            .map_err(|e| ThemeError::PersistenceFailed {
                reason: e.to_string(),
            })
    }

    /// Empties the in-memory slot; the durable value is untouched.
    pub fn clear(&self) {
        *self.slot.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}
