//! Theme manifest (`theme.json`) parsing.
//!
//! Parsing is syntax-only: any JSON object is accepted and returned as a raw
//! field map. Semantic checks (required fields, views directory, assets) are
//! the scanner's job, which is why the raw map is kept alongside the typed
//! [`ThemeDescriptor`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{ThemeError, ThemeResult};
use crate::fs_utils;

/// File name of the manifest at the root of every theme directory.
pub const MANIFEST_FILE: &str = "theme.json";

/// Version assigned when a manifest declares none, and to every fresh clone.
pub const DEFAULT_VERSION: &str = "1.0.0";

/// Raw manifest content.
pub type ManifestFields = Map<String, Value>;

/// Typed view of a theme manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThemeDescriptor {
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub version: String,
    pub author: Option<String>,
    pub author_email: Option<String>,
    pub homepage: Option<String>,
    pub license: Option<String>,
    /// Single-level inheritance pointer; never resolved here.
    pub parent: Option<String>,
    /// Platform component name -> minimum version constraint.
    pub requirements: BTreeMap<String, String>,
    /// Relative paths expected to exist inside the theme directory.
    pub assets: Vec<String>,
    pub supports: BTreeSet<String>,
    pub screenshot: Option<String>,
}

impl ThemeDescriptor {
    /// Builds a descriptor from raw manifest fields.
    ///
    /// `dir_name` stands in for a missing slug and a missing name, so a theme
    /// is always displayable even when its manifest is incomplete.
    pub fn from_fields(fields: &ManifestFields, dir_name: &str) -> Self {
        let slug = declared_slug(fields).unwrap_or_else(|| dir_name.to_string());

        Self {
            name: string_field(fields, "name").unwrap_or_else(|| dir_name.to_string()),
            slug,
            description: string_field(fields, "description"),
            version: string_field(fields, "version").unwrap_or_else(|| DEFAULT_VERSION.to_string()),
            author: string_field(fields, "author"),
            author_email: string_field(fields, "author_email"),
            homepage: string_field(fields, "homepage"),
            license: string_field(fields, "license"),
            parent: string_field(fields, "parent"),
            requirements: requirements_field(fields),
            assets: string_list_field(fields, "assets"),
            supports: string_list_field(fields, "supports").into_iter().collect(),
            screenshot: string_field(fields, "screenshot"),
        }
    }
}

/// Parses a manifest file into its raw field map.
///
/// Fails with [`ThemeError::ParseError`] when the content is not JSON or its
/// top level is not an object.
pub fn parse_manifest(path: &Path) -> ThemeResult<ManifestFields> {
    let content = fs::read_to_string(path).map_err(ThemeError::io_at("read manifest", path))?;
    let value: Value = serde_json::from_str(&content).map_err(|source| ThemeError::ParseError {
        path: path.to_path_buf(),
        source,
    })?;

    match value {
        Value::Object(fields) => Ok(fields),
        other => Err(ThemeError::ParseError {
            path: path.to_path_buf(),
            source: serde::de::Error::custom(format!(
                "expected a JSON object at the top level, found {}",
                json_type_name(&other)
            )),
        }),
    }
}

/// Writes manifest fields back as pretty-printed JSON.
pub fn write_manifest(path: &Path, fields: &ManifestFields) -> ThemeResult<()> {
    let content = serde_json::to_string_pretty(fields).map_err(|source| ThemeError::ParseError {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, content).map_err(ThemeError::io_at("write manifest", path))
}

/// Reads a manifest, applies `edit` to its fields and writes it back.
/// Fields the edit does not touch are preserved.
pub fn rewrite_manifest<F>(path: &Path, edit: F) -> ThemeResult<()>
where
    F: FnOnce(&mut ManifestFields),
{
    let mut fields = parse_manifest(path)?;
    edit(&mut fields);
    write_manifest(path, &fields)
}

/// Searches `root` depth-first for a manifest; the first match wins.
///
/// The root itself is checked before any subdirectory, and subdirectories
/// are visited in name order so the result does not depend on the order the
/// filesystem happens to list entries.
pub fn find_manifest(root: &Path) -> Option<PathBuf> {
    let candidate = root.join(MANIFEST_FILE);
    if candidate.is_file() {
        return Some(candidate);
    }

    // Explicit stack instead of recursion; children are pushed in reverse so
    // the lexicographically first directory is explored first.
    let mut stack: Vec<PathBuf> = sorted_subdirectories(root).into_iter().rev().collect();
    while let Some(dir) = stack.pop() {
        let candidate = dir.join(MANIFEST_FILE);
        if candidate.is_file() {
            return Some(candidate);
        }
        stack.extend(sorted_subdirectories(&dir).into_iter().rev());
    }

    None
}

/// The manifest's `slug` when it is a non-empty string.
pub fn declared_slug(fields: &ManifestFields) -> Option<String> {
    string_field(fields, "slug").filter(|slug| !slug.trim().is_empty())
}

/// Required-field presence test: absent, `null`, empty strings, empty
/// collections, `false` and zero all count as missing.
pub fn is_field_present(fields: &ManifestFields, field: &str) -> bool {
    match fields.get(field) {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.is_empty() && s != "0",
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::Object(map)) => !map.is_empty(),
        Some(Value::Bool(flag)) => *flag,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|v| v != 0.0),
    }
}

fn sorted_subdirectories(dir: &Path) -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = fs_utils::subdirectories(dir).collect();
    dirs.sort();
    dirs
}

fn string_field(fields: &ManifestFields, key: &str) -> Option<String> {
    match fields.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn string_list_field(fields: &ManifestFields, key: &str) -> Vec<String> {
    match fields.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

fn requirements_field(fields: &ManifestFields) -> BTreeMap<String, String> {
    match fields.get("requirements") {
        Some(Value::Object(map)) => map
            .iter()
            .filter_map(|(component, version)| {
                version
                    .as_str()
                    .map(|version| (component.clone(), version.to_string()))
            })
            .collect(),
        _ => BTreeMap::new(),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use claims::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn fields(value: Value) -> ManifestFields {
        match value {
            Value::Object(map) => map,
            _ => panic!("fixture must be an object"),
        }
    }

    #[test]
    fn parse_full_manifest() {
        let manifest = fields(json!({
            "name": "Midnight",
            "slug": "midnight",
            "description": "Dark theme",
            "version": "2.1.0",
            "author": "Jane",
            "author_email": "jane@example.com",
            "homepage": "https://github.com/jane/midnight",
            "license": "MIT",
            "parent": "default",
            "requirements": { "runtime": ">=8.1", "framework": "^11" },
            "assets": ["css/app.css", "js/app.js"],
            "supports": ["dark-mode", "rtl", "dark-mode"],
            "screenshot": "screenshot.png"
        }));

        let descriptor = ThemeDescriptor::from_fields(&manifest, "midnight-dir");
        assert_eq!(descriptor.name, "Midnight");
        assert_eq!(descriptor.slug, "midnight");
        assert_eq!(descriptor.version, "2.1.0");
        assert_eq!(descriptor.parent.as_deref(), Some("default"));
        assert_eq!(descriptor.requirements.get("runtime").unwrap(), ">=8.1");
        assert_eq!(descriptor.assets, vec!["css/app.css", "js/app.js"]);
        assert_eq!(descriptor.supports.len(), 2);
        assert_eq!(descriptor.screenshot.as_deref(), Some("screenshot.png"));
    }

    #[test]
    fn parse_minimal_manifest_falls_back_to_directory() {
        let descriptor = ThemeDescriptor::from_fields(&Map::new(), "bare");
        assert_eq!(descriptor.name, "bare");
        assert_eq!(descriptor.slug, "bare");
        assert_eq!(descriptor.version, DEFAULT_VERSION);
        assert!(descriptor.parent.is_none());
        assert!(descriptor.assets.is_empty());
    }

    #[test]
    fn empty_slug_is_not_declared() {
        assert_none!(declared_slug(&fields(json!({ "slug": "" }))));
        assert_none!(declared_slug(&fields(json!({ "slug": "   " }))));
        assert_none!(declared_slug(&fields(json!({ "slug": ["x"] }))));
        assert_eq!(
            declared_slug(&fields(json!({ "slug": "x" }))).as_deref(),
            Some("x")
        );
    }

    #[test]
    fn field_presence_matches_emptiness_rules() {
        let manifest = fields(json!({
            "name": "",
            "version": "1.0.0",
            "tags": [],
            "flag": false,
            "zero": 0,
            "nothing": null
        }));
        assert!(!is_field_present(&manifest, "name"));
        assert!(is_field_present(&manifest, "version"));
        assert!(!is_field_present(&manifest, "tags"));
        assert!(!is_field_present(&manifest, "flag"));
        assert!(!is_field_present(&manifest, "zero"));
        assert!(!is_field_present(&manifest, "nothing"));
        assert!(!is_field_present(&manifest, "missing"));
    }

    #[test]
    fn parse_rejects_malformed_and_non_object_json() {
        let tmp = TempDir::new().unwrap();
        let broken = tmp.path().join("broken.json");
        fs::write(&broken, "{ not valid json }").unwrap();
        assert_matches!(parse_manifest(&broken), Err(ThemeError::ParseError { .. }));

        let array = tmp.path().join("array.json");
        fs::write(&array, "[1, 2, 3]").unwrap();
        assert_matches!(parse_manifest(&array), Err(ThemeError::ParseError { .. }));
    }

    #[test]
    fn rewrite_preserves_unknown_fields() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(MANIFEST_FILE);
        fs::write(&path, r#"{"name":"A","custom":{"x":1}}"#).unwrap();

        assert_ok!(rewrite_manifest(&path, |fields| {
            fields.insert("name".to_string(), json!("B"));
        }));

        let rewritten = parse_manifest(&path).unwrap();
        assert_eq!(rewritten["name"], json!("B"));
        assert_eq!(rewritten["custom"], json!({ "x": 1 }));
    }

    #[test]
    fn find_manifest_is_depth_first_and_ordered() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("b-dir")).unwrap();
        fs::create_dir_all(root.join("a-dir/nested/deeper")).unwrap();
        fs::write(root.join("b-dir").join(MANIFEST_FILE), "{}").unwrap();
        fs::write(
            root.join("a-dir/nested/deeper").join(MANIFEST_FILE),
            "{}",
        )
        .unwrap();

        // a-dir is explored completely before b-dir is considered
        let found = find_manifest(root).unwrap();
        assert_eq!(found, root.join("a-dir/nested/deeper").join(MANIFEST_FILE));

        fs::write(root.join(MANIFEST_FILE), "{}").unwrap();
        assert_eq!(find_manifest(root).unwrap(), root.join(MANIFEST_FILE));
    }

    #[test]
    fn find_manifest_returns_none_for_empty_tree() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("x/y")).unwrap();
        assert_none!(find_manifest(tmp.path()));
    }
}
