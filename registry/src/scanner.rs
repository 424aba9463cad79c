//! Builds a [`Catalog`] from the themes directory.

use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::catalog::{Catalog, ThemeMetadata, ThemeRecord};
use crate::error::{ThemeError, ThemeResult};
use crate::fs_utils;
use crate::manifest::{self, MANIFEST_FILE, ManifestFields, ThemeDescriptor};

/// Directory every valid theme must contain.
pub const VIEWS_DIR: &str = "views";

const TEMPLATE_SUFFIXES: &[&str] = &[".blade.php", ".html", ".twig", ".hbs"];
const STYLESHEET_EXTENSIONS: &[&str] = &["css", "scss", "sass", "less"];
const SCRIPT_EXTENSIONS: &[&str] = &["js", "mjs", "ts"];

/// Walks the themes root and turns every manifest-bearing directory into a
/// [`ThemeRecord`].
#[derive(Debug, Clone)]
pub struct CatalogScanner {
    themes_path: PathBuf,
    required_fields: Vec<String>,
}

impl CatalogScanner {
    pub fn new(themes_path: impl Into<PathBuf>, required_fields: Vec<String>) -> Self {
        Self {
            themes_path: themes_path.into(),
            required_fields,
        }
    }

    pub fn themes_path(&self) -> &Path {
        &self.themes_path
    }

    /// Scans the themes root.
    ///
    /// A missing root yields an empty catalog. Directories without a manifest,
    /// or whose manifest does not parse, are left out. `active_slug` marks the
    /// record whose slug matches it.
    pub fn scan(&self, active_slug: &str) -> ThemeResult<Catalog> {
        let mut catalog = Catalog::default();

        if !self.themes_path.exists() {
            log::debug!(
                "Themes directory {} does not exist",
                self.themes_path.display()
            );
            return Ok(catalog);
        }

        let entries = fs::read_dir(&self.themes_path)
            .map_err(ThemeError::io_at("read themes directory", &self.themes_path))?;
        let mut dirs: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.is_dir())
            .collect();
        dirs.sort();

        for dir in dirs {
            if let Some(record) = self.inspect(&dir, active_slug) {
                if catalog.contains(record.slug()) {
                    log::debug!(
                        "Slug '{}' declared again by {}, replacing earlier entry",
                        record.slug(),
                        dir.display()
                    );
                }
                catalog.insert(record);
            }
        }

        log::debug!(
            "Scanned {}: {} theme(s)",
            self.themes_path.display(),
            catalog.len()
        );
        Ok(catalog)
    }

    /// Builds the record for a single theme directory, or `None` when the
    /// directory has no readable manifest.
    pub fn inspect(&self, dir: &Path, active_slug: &str) -> Option<ThemeRecord> {
        let manifest_path = dir.join(MANIFEST_FILE);
        if !manifest_path.is_file() {
            return None;
        }

        let fields = match manifest::parse_manifest(&manifest_path) {
            Ok(fields) => fields,
            Err(e) => {
                log::debug!("Skipping {}: {e}", dir.display());
                return None;
            }
        };

        let dir_name = dir
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let descriptor = ThemeDescriptor::from_fields(&fields, &dir_name);
        let errors = validate_theme(dir, &fields, &descriptor, &self.required_fields);

        Some(ThemeRecord {
            active: descriptor.slug == active_slug,
            is_valid: errors.is_empty(),
            errors,
            metadata: collect_metadata(dir),
            path: dir.to_path_buf(),
            descriptor,
        })
    }
}

/// Ordered list of structural problems with a theme directory.
pub fn validate_theme(
    dir: &Path,
    fields: &ManifestFields,
    descriptor: &ThemeDescriptor,
    required_fields: &[String],
) -> Vec<String> {
    let mut errors = Vec::new();

    for field in required_fields {
        if !manifest::is_field_present(fields, field) {
            errors.push(format!("Missing required field: {field}"));
        }
    }

    if !dir.join(VIEWS_DIR).is_dir() {
        errors.push("Views directory is missing".to_string());
    }

    for asset in &descriptor.assets {
        if !dir.join(asset).exists() {
            errors.push(format!("Asset file not found: {asset}"));
        }
    }

    errors
}

/// File counts per class, total size and directory modification time.
pub fn collect_metadata(dir: &Path) -> ThemeMetadata {
    let mut metadata = ThemeMetadata {
        last_modified: fs::metadata(dir)
            .and_then(|m| m.modified())
            .ok()
            .map(DateTime::<Utc>::from),
        ..ThemeMetadata::default()
    };

    for entry in WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
    {
        let name = entry.file_name().to_string_lossy().to_lowercase();
        let extension = entry
            .path()
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        if TEMPLATE_SUFFIXES.iter().any(|suffix| name.ends_with(suffix)) {
            metadata.template_files += 1;
        } else if STYLESHEET_EXTENSIONS.contains(&extension.as_str()) {
            metadata.stylesheet_files += 1;
        } else if SCRIPT_EXTENSIONS.contains(&extension.as_str()) {
            metadata.script_files += 1;
        }
    }
    metadata.size_bytes = fs_utils::dir_size(dir);

    metadata
}

#[cfg(test)]
mod tests {
    use super::*;
    use claims::*;
    use tempfile::TempDir;

    fn theme(root: &Path, dir: &str, manifest: &str, views: bool) -> PathBuf {
        let path = root.join(dir);
        fs::create_dir_all(&path).unwrap();
        fs::write(path.join(MANIFEST_FILE), manifest).unwrap();
        if views {
            fs::create_dir_all(path.join(VIEWS_DIR)).unwrap();
        }
        path
    }

    fn scanner(root: &Path) -> CatalogScanner {
        CatalogScanner::new(root, vec!["name".to_string(), "version".to_string()])
    }

    #[test]
    fn missing_root_is_empty_catalog() {
        let tmp = TempDir::new().unwrap();
        let catalog = assert_ok!(scanner(&tmp.path().join("nope")).scan("default"));
        assert!(catalog.is_empty());
    }

    #[test]
    fn skips_directories_without_manifest_or_with_broken_manifest() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("no-manifest/views")).unwrap();
        theme(tmp.path(), "broken", "{ nope", true);
        theme(tmp.path(), "ok", r#"{"name":"Ok","version":"1.0.0"}"#, true);
        fs::write(tmp.path().join("stray.txt"), "").unwrap();

        let catalog = scanner(tmp.path()).scan("default").unwrap();
        assert_eq!(catalog.len(), 1);
        assert!(catalog.get("ok").unwrap().is_valid);
    }

    #[test]
    fn validation_errors_are_ordered() {
        let tmp = TempDir::new().unwrap();
        theme(
            tmp.path(),
            "bad",
            r#"{"version":"","assets":["css/app.css","js/missing.js"]}"#,
            false,
        );
        fs::create_dir_all(tmp.path().join("bad/css")).unwrap();
        fs::write(tmp.path().join("bad/css/app.css"), "body{}").unwrap();

        let catalog = scanner(tmp.path()).scan("default").unwrap();
        let record = catalog.get("bad").unwrap();
        assert!(!record.is_valid);
        assert_eq!(
            record.errors,
            vec![
                "Missing required field: name",
                "Missing required field: version",
                "Views directory is missing",
                "Asset file not found: js/missing.js",
            ]
        );
        // Display name falls back to the directory even though it is invalid
        assert_eq!(record.name(), "bad");
    }

    #[test]
    fn declared_slug_wins_and_last_duplicate_wins() {
        let tmp = TempDir::new().unwrap();
        theme(tmp.path(), "a-first", r#"{"name":"First","slug":"shared","version":"1"}"#, true);
        theme(tmp.path(), "b-second", r#"{"name":"Second","slug":"shared","version":"1"}"#, true);

        let catalog = scanner(tmp.path()).scan("shared").unwrap();
        assert_eq!(catalog.len(), 1);
        let record = catalog.get("shared").unwrap();
        assert_eq!(record.name(), "Second");
        assert!(record.active);
        assert_eq!(record.path, tmp.path().join("b-second"));
    }

    #[test]
    fn metadata_counts_file_classes() {
        let tmp = TempDir::new().unwrap();
        let dir = theme(tmp.path(), "meta", r#"{"name":"M","version":"1"}"#, true);
        for file in [
            "views/home.blade.php",
            "views/page.html",
            "views/partials/nav.twig",
            "css/app.css",
            "css/theme.scss",
            "js/app.js",
            "js/util.ts",
            "README.md",
        ] {
            let path = dir.join(file);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, "x").unwrap();
        }

        let metadata = collect_metadata(&dir);
        assert_eq!(metadata.template_files, 3);
        assert_eq!(metadata.stylesheet_files, 2);
        assert_eq!(metadata.script_files, 2);
        assert!(metadata.size_bytes >= 8);
        assert_some!(metadata.last_modified);
    }
}
