use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors produced by theme discovery and lifecycle operations.
///
/// Every lifecycle operation returns [`ThemeResult`]; callers that only need
/// the success/failure bit can use `.is_ok()`. The variants carry enough
/// context to tell the user *why* an operation was refused without having to
/// re-query the registry.
///
/// # Error Categories
///
/// ## Source Errors
/// - [`SourceNotFound`] - Archive or local directory does not exist
/// - [`SourceNotAllowed`] - Install source kind disabled in configuration
/// - [`Archive`] - Archive could not be opened or extracted
/// - [`FetchFailed`] - Remote repository fetch failed or timed out
///
/// ## Structure Errors
/// - [`InvalidStructure`] - No manifest found, or manifest has no usable slug
/// - [`InvalidSlug`] - Slug is not safe to use as a directory name
/// - [`ParseError`] - Manifest is not well-formed JSON
///
/// ## State Errors
/// - [`NotFound`] - Unknown slug
/// - [`AlreadyExists`] - Clone target already occupied
/// - [`Protected`] / [`ActiveThemeConflict`] - Deletion blocked
/// - [`InvalidTheme`] - Activation of a theme that failed validation
///
/// ## System Errors
/// - [`IoFailure`] - Filesystem operation failed
/// - [`PersistenceFailed`] - Active theme could not be written to durable storage
///
/// # Examples
///
/// ```no_run
/// use registry::error::ThemeError;
///
/// fn describe(error: &ThemeError) -> &'static str {
///     match error {
///         ThemeError::Protected { .. } => "theme is protected",
///         ThemeError::ActiveThemeConflict { .. } => "theme is currently active",
///         _ => "operation failed",
///     }
/// }
/// ```
///
/// [`SourceNotFound`]: ThemeError::SourceNotFound
/// [`SourceNotAllowed`]: ThemeError::SourceNotAllowed
/// [`Archive`]: ThemeError::Archive
/// [`FetchFailed`]: ThemeError::FetchFailed
/// [`InvalidStructure`]: ThemeError::InvalidStructure
/// [`InvalidSlug`]: ThemeError::InvalidSlug
/// [`ParseError`]: ThemeError::ParseError
/// [`NotFound`]: ThemeError::NotFound
/// [`AlreadyExists`]: ThemeError::AlreadyExists
/// [`Protected`]: ThemeError::Protected
/// [`ActiveThemeConflict`]: ThemeError::ActiveThemeConflict
/// [`InvalidTheme`]: ThemeError::InvalidTheme
/// [`IoFailure`]: ThemeError::IoFailure
/// [`PersistenceFailed`]: ThemeError::PersistenceFailed
#[derive(Debug, Error)]
pub enum ThemeError {
    /// The archive or local source path does not exist.
    #[error("Theme source not found: {}", path.display())]
    SourceNotFound { path: PathBuf },

    /// The install source kind is not listed in `allowed_sources`.
    #[error("Installation from '{source_kind}' sources is not allowed")]
    SourceNotAllowed { source_kind: String },

    /// The source tree has no manifest, or the manifest has no usable slug.
    #[error("Invalid theme structure: {reason}")]
    InvalidStructure { reason: String },

    /// A slug that would be unsafe or ambiguous as a directory name.
    #[error("Invalid theme slug '{slug}': {reason}")]
    InvalidSlug { slug: String, reason: String },

    /// Clone target slug is already occupied.
    #[error("Theme '{slug}' already exists")]
    AlreadyExists { slug: String },

    /// Slug is listed in `protected_themes`.
    #[error("Theme '{slug}' is protected and cannot be deleted")]
    Protected { slug: String },

    /// Slug is the currently active theme.
    #[error("Theme '{slug}' is the active theme and cannot be deleted")]
    ActiveThemeConflict { slug: String },

    /// No theme with this slug in the catalog (or its directory vanished).
    #[error("Theme '{slug}' not found")]
    NotFound { slug: String },

    /// Theme exists but failed validation.
    #[error("Theme '{slug}' is invalid: {}", errors.join("; "))]
    InvalidTheme { slug: String, errors: Vec<String> },

    /// A filesystem operation failed.
    #[error("{context}: {source}")]
    IoFailure {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// Manifest content is not well-formed structured data.
    #[error("Failed to parse manifest '{}': {source}", path.display())]
    ParseError {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Archive could not be opened or one of its entries could not be extracted.
    #[error("Failed to extract archive '{}': {reason}", path.display())]
    Archive { path: PathBuf, reason: String },

    /// Remote repository fetch exited unsuccessfully or timed out.
    #[error("Failed to fetch '{reference}': {reason}")]
    FetchFailed { reference: String, reason: String },

    /// In-memory pointer changed but the durable store rejected the write.
    #[error("Active theme persistence failed: {reason}")]
    PersistenceFailed { reason: String },
}

impl ThemeError {
    /// Builds a `map_err` adapter that wraps an [`std::io::Error`] with context.
    pub fn io(context: impl Into<String>) -> impl FnOnce(std::io::Error) -> ThemeError {
        let context = context.into();
        move |source| ThemeError::IoFailure { context, source }
    }

    /// `map_err` adapter for I/O on a specific path.
    pub fn io_at(action: &str, path: &Path) -> impl FnOnce(std::io::Error) -> ThemeError {
        Self::io(format!("Failed to {action} '{}'", path.display()))
    }

    /// Stable short label for logs and exit summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            ThemeError::SourceNotFound { .. } => "source_not_found",
            ThemeError::SourceNotAllowed { .. } => "source_not_allowed",
            ThemeError::InvalidStructure { .. } => "invalid_structure",
            ThemeError::InvalidSlug { .. } => "invalid_slug",
            ThemeError::AlreadyExists { .. } => "already_exists",
            ThemeError::Protected { .. } => "protected",
            ThemeError::ActiveThemeConflict { .. } => "active_theme_conflict",
            ThemeError::NotFound { .. } => "not_found",
            ThemeError::InvalidTheme { .. } => "invalid_theme",
            ThemeError::IoFailure { .. } => "io_failure",
            ThemeError::ParseError { .. } => "parse_error",
            ThemeError::Archive { .. } => "archive",
            ThemeError::FetchFailed { .. } => "fetch_failed",
            ThemeError::PersistenceFailed { .. } => "persistence_failed",
        }
    }

    /// True for the two refusals produced by the deletability check.
    pub fn is_deletion_blocked(&self) -> bool {
        matches!(
            self,
            ThemeError::Protected { .. } | ThemeError::ActiveThemeConflict { .. }
        )
    }
}

/// Result type alias for registry operations
pub type ThemeResult<T> = Result<T, ThemeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_adapter_keeps_context() {
        let error = ThemeError::io("Failed to copy theme")(std::io::Error::other("disk full"));
        assert_eq!(error.to_string(), "Failed to copy theme: disk full");
        assert_eq!(error.kind(), "io_failure");
    }

    #[test]
    fn test_deletion_blocked_classification() {
        assert!(
            ThemeError::Protected {
                slug: "default".to_string()
            }
            .is_deletion_blocked()
        );
        assert!(
            ThemeError::ActiveThemeConflict {
                slug: "x".to_string()
            }
            .is_deletion_blocked()
        );
        assert!(
            !ThemeError::NotFound {
                slug: "x".to_string()
            }
            .is_deletion_blocked()
        );
    }

    #[test]
    fn test_invalid_theme_message_lists_errors() {
        let error = ThemeError::InvalidTheme {
            slug: "broken".to_string(),
            errors: vec![
                "Missing required field: name".to_string(),
                "Views directory is missing".to_string(),
            ],
        };
        assert_eq!(
            error.to_string(),
            "Theme 'broken' is invalid: Missing required field: name; Views directory is missing"
        );
    }
}
