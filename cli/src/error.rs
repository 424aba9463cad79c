use registry::error::ThemeError;
use std::fmt::Display;

/// Errors surfaced by the `themectl` binary.
///
/// # Error Categories
///
/// - [`Config`] - Configuration file or environment could not be loaded or
///   failed validation
/// - [`Theme`] - A registry operation failed; wraps [`ThemeError`]
/// - [`Usage`] - Arguments are inconsistent (for example `--slug` with a zip
///   source)
///
/// [`Config`]: AppError::Config
/// [`Theme`]: AppError::Theme
/// [`Usage`]: AppError::Usage
#[derive(Debug)]
pub enum AppError {
    /// Configuration loading or validation failures.
    ///
    /// The message is already formatted for the user, usually a joined list
    /// of `user_message()` texts.
    Config(String),

    /// Registry operation failures.
    Theme(ThemeError),

    /// Invalid or conflicting command-line arguments.
    Usage(String),
}

impl AppError {
    /// Short label for the error category.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Config(_) => "config",
            AppError::Theme(e) => e.kind(),
            AppError::Usage(_) => "usage",
        }
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::Config(msg) => write!(f, "Configuration Error: {msg}"),
            AppError::Theme(err) => write!(f, "Theme Error: {err}"),
            AppError::Usage(msg) => write!(f, "Usage Error: {msg}"),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Theme(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ThemeError> for AppError {
    fn from(err: ThemeError) -> Self {
        AppError::Theme(err)
    }
}

/// Result type alias for command execution
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_prefixes_category() {
        let err = AppError::Usage("--slug requires a local source".to_string());
        assert_eq!(err.to_string(), "Usage Error: --slug requires a local source");

        let err: AppError = ThemeError::NotFound {
            slug: "ghost".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "Theme Error: Theme 'ghost' not found");
        assert_eq!(err.kind(), "not_found");
        assert!(std::error::Error::source(&err).is_some());
    }
}
