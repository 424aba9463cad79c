//! Registry configuration.
//!
//! All fields are optional so a partial `[registry]` table (or none at all)
//! deserializes cleanly; accessors supply the defaults.

use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::requirements::parse_version;

pub const DEFAULT_THEMES_PATH: &str = "themes";
pub const DEFAULT_BACKUP_PATH: &str = "storage/theme-backups";
pub const DEFAULT_TEMP_PATH: &str = "storage/temp/themes";
pub const DEFAULT_THEME_SLUG: &str = "default";
pub const DEFAULT_ENV_FILE: &str = ".env";
pub const DEFAULT_ENV_KEY: &str = "ACTIVE_THEME";
pub const DEFAULT_CACHE_DURATION_SECS: u64 = 3600;
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_MAX_ARCHIVE_ENTRIES: usize = 10_000;
pub const DEFAULT_MAX_ARCHIVE_BYTES: u64 = 512 * 1024 * 1024;
pub const DEFAULT_FRAMEWORK_VERSION: &str = "1.0.0";

/// Kinds of sources a theme can be installed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallSource {
    Zip,
    Git,
    Local,
}

impl InstallSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstallSource::Zip => "zip",
            InstallSource::Git => "git",
            InstallSource::Local => "local",
        }
    }
}

impl fmt::Display for InstallSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration consumed by the scanner, lifecycle manager and query facade.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegistryConfig {
    themes_path: Option<PathBuf>,
    backup_path: Option<PathBuf>,
    temp_path: Option<PathBuf>,
    default_theme: Option<String>,
    protected_themes: Option<Vec<String>>,
    required_fields: Option<Vec<String>>,
    allowed_sources: Option<Vec<InstallSource>>,
    auto_enable: Option<bool>,
    backup_existing: Option<bool>,
    cache_duration_secs: Option<u64>,
    runtime_version: Option<String>,
    framework_version: Option<String>,
    fetch_timeout_secs: Option<u64>,
    max_archive_entries: Option<usize>,
    max_archive_bytes: Option<u64>,
    env_file: Option<PathBuf>,
    env_key: Option<String>,
}

impl RegistryConfig {
    /// Configuration rooted at `themes_path` with every other value defaulted.
    pub fn with_themes_path(themes_path: impl Into<PathBuf>) -> Self {
        Self {
            themes_path: Some(themes_path.into()),
            ..Self::default()
        }
    }

    pub fn themes_path(&self) -> PathBuf {
        self.themes_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_THEMES_PATH))
    }

    pub fn backup_path(&self) -> PathBuf {
        self.backup_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_BACKUP_PATH))
    }

    pub fn temp_path(&self) -> PathBuf {
        self.temp_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_TEMP_PATH))
    }

    /// Slug reported as active when neither memory nor the durable store has one.
    pub fn default_theme(&self) -> &str {
        self.default_theme.as_deref().unwrap_or(DEFAULT_THEME_SLUG)
    }

    pub fn protected_themes(&self) -> Vec<String> {
        self.protected_themes
            .clone()
            .unwrap_or_else(|| vec![DEFAULT_THEME_SLUG.to_string()])
    }

    pub fn required_fields(&self) -> Vec<String> {
        self.required_fields
            .clone()
            .unwrap_or_else(|| vec!["name".to_string(), "version".to_string()])
    }

    pub fn allowed_sources(&self) -> Vec<InstallSource> {
        self.allowed_sources.clone().unwrap_or_else(|| {
            vec![InstallSource::Zip, InstallSource::Git, InstallSource::Local]
        })
    }

    pub fn is_source_allowed(&self, source: InstallSource) -> bool {
        self.allowed_sources().contains(&source)
    }

    pub fn auto_enable(&self) -> bool {
        self.auto_enable.unwrap_or(false)
    }

    pub fn backup_existing(&self) -> bool {
        self.backup_existing.unwrap_or(true)
    }

    /// Zero disables time-based expiry; invalidation still applies.
    pub fn cache_duration(&self) -> Duration {
        Duration::from_secs(
            self.cache_duration_secs
                .unwrap_or(DEFAULT_CACHE_DURATION_SECS),
        )
    }

    pub fn runtime_version(&self) -> &str {
        self.runtime_version
            .as_deref()
            .unwrap_or(env!("CARGO_PKG_VERSION"))
    }

    pub fn framework_version(&self) -> &str {
        self.framework_version
            .as_deref()
            .unwrap_or(DEFAULT_FRAMEWORK_VERSION)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs.unwrap_or(DEFAULT_FETCH_TIMEOUT_SECS))
    }

    /// Most entries a zip install may contain.
    pub fn max_archive_entries(&self) -> usize {
        self.max_archive_entries
            .unwrap_or(DEFAULT_MAX_ARCHIVE_ENTRIES)
    }

    /// Most uncompressed bytes a zip install may expand to.
    pub fn max_archive_bytes(&self) -> u64 {
        self.max_archive_bytes.unwrap_or(DEFAULT_MAX_ARCHIVE_BYTES)
    }

    pub fn env_file(&self) -> PathBuf {
        self.env_file
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ENV_FILE))
    }

    pub fn env_key(&self) -> &str {
        self.env_key.as_deref().unwrap_or(DEFAULT_ENV_KEY)
    }

    // Builder-style setters used by embedders and tests

    pub fn set_backup_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.backup_path = Some(path.into());
        self
    }

    pub fn set_temp_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.temp_path = Some(path.into());
        self
    }

    pub fn set_default_theme(mut self, slug: impl Into<String>) -> Self {
        self.default_theme = Some(slug.into());
        self
    }

    pub fn set_protected_themes(mut self, slugs: Vec<String>) -> Self {
        self.protected_themes = Some(slugs);
        self
    }

    pub fn set_required_fields(mut self, fields: Vec<String>) -> Self {
        self.required_fields = Some(fields);
        self
    }

    pub fn set_allowed_sources(mut self, sources: Vec<InstallSource>) -> Self {
        self.allowed_sources = Some(sources);
        self
    }

    pub fn set_auto_enable(mut self, enabled: bool) -> Self {
        self.auto_enable = Some(enabled);
        self
    }

    pub fn set_backup_existing(mut self, enabled: bool) -> Self {
        self.backup_existing = Some(enabled);
        self
    }

    pub fn set_cache_duration_secs(mut self, secs: u64) -> Self {
        self.cache_duration_secs = Some(secs);
        self
    }

    pub fn set_platform_versions(
        mut self,
        runtime: impl Into<String>,
        framework: impl Into<String>,
    ) -> Self {
        self.runtime_version = Some(runtime.into());
        self.framework_version = Some(framework.into());
        self
    }

    pub fn set_fetch_timeout_secs(mut self, secs: u64) -> Self {
        self.fetch_timeout_secs = Some(secs);
        self
    }

    pub fn set_archive_limits(mut self, max_entries: usize, max_bytes: u64) -> Self {
        self.max_archive_entries = Some(max_entries);
        self.max_archive_bytes = Some(max_bytes);
        self
    }

    pub fn set_env_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.env_file = Some(path.into());
        self
    }

    /// Validate the configuration, collecting every problem found.
    pub fn validate(&self) -> Result<(), Vec<ConfigValidationError>> {
        let mut errors = Vec::new();

        if self.themes_path().as_os_str().is_empty() {
            errors.push(ConfigValidationError::EmptyPath {
                field: "themes_path",
            });
        }
        if self.temp_path().as_os_str().is_empty() {
            errors.push(ConfigValidationError::EmptyPath { field: "temp_path" });
        }
        if self.backup_existing() && self.backup_path().as_os_str().is_empty() {
            errors.push(ConfigValidationError::EmptyPath {
                field: "backup_path",
            });
        }
        if self.env_key().trim().is_empty() {
            errors.push(ConfigValidationError::EmptyEnvKey);
        }
        for (field, value) in [
            ("runtime_version", self.runtime_version()),
            ("framework_version", self.framework_version()),
        ] {
            if parse_version(value).is_none() {
                errors.push(ConfigValidationError::PlatformVersion {
                    field,
                    configured: value.to_string(),
                });
            }
        }
        if self.fetch_timeout().is_zero() {
            errors.push(ConfigValidationError::FetchTimeout);
        }
        if self.max_archive_entries() == 0 || self.max_archive_bytes() == 0 {
            errors.push(ConfigValidationError::ArchiveLimit);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Configuration validation errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid {field}: path must not be empty")]
    EmptyPath { field: &'static str },
    #[error("Invalid env_key: must not be empty")]
    EmptyEnvKey,
    #[error("Invalid {field}: '{configured}' is not a version number")]
    PlatformVersion {
        field: &'static str,
        configured: String,
    },
    #[error("Invalid fetch_timeout_secs: must be greater than zero")]
    FetchTimeout,
    #[error("Invalid archive limits: max_archive_entries and max_archive_bytes must be greater than zero")]
    ArchiveLimit,
}

impl ConfigValidationError {
    pub fn user_message(&self) -> String {
        match self {
            ConfigValidationError::EmptyPath { field } => {
                format!(
                    "Empty path configured!\n\n\
                    Setting: {field}\n\n\
                    Please set {field} in the [registry] section of themectl.toml."
                )
            }
            ConfigValidationError::EmptyEnvKey => "Empty active theme key!\n\n\
                Please set env_key in the [registry] section of themectl.toml, \
                for example ACTIVE_THEME."
                .to_string(),
            ConfigValidationError::PlatformVersion { field, configured } => {
                format!(
                    "Platform version is not a version number!\n\n\
                    Setting: {field}\n\
                    Your configured value: {configured}\n\n\
                    Please use a dotted version such as 8.2 or 11.0.3."
                )
            }
            ConfigValidationError::FetchTimeout => "Remote fetch timeout is zero!\n\n\
                Please set fetch_timeout_secs to a positive number of seconds."
                .to_string(),
            ConfigValidationError::ArchiveLimit => "Archive limits disable zip installs!\n\n\
                Please set max_archive_entries and max_archive_bytes to positive values."
                .to_string(),
        }
    }
}
