use crate::error::ThemeError;

/// Core validation trait that all validators must implement.
///
/// # Type Parameters
///
/// * `T` - The type of data being validated (can be unsized like `str`)
///
/// # Examples
///
/// ```
/// use registry::validation::{SlugValidator, Validator};
///
/// assert!(SlugValidator.validate("midnight-blue").is_ok());
/// assert!(SlugValidator.validate("../etc").is_err());
/// ```
pub trait Validator<T: ?Sized> {
    type Error;

    /// Validate the input and return Ok(()) if valid, or Err with validation error
    fn validate(&self, input: &T) -> Result<(), Self::Error>;
}

/// Upper bound on slug length; slugs become directory names.
pub const MAX_SLUG_LENGTH: usize = 64;

/// Validator for slugs that are about to become directory names under the
/// themes root (install targets, clone targets, slug overrides).
pub struct SlugValidator;

impl Validator<str> for SlugValidator {
    type Error = ThemeError;

    fn validate(&self, input: &str) -> Result<(), Self::Error> {
        let invalid = |reason: &str| ThemeError::InvalidSlug {
            slug: input.to_string(),
            reason: reason.to_string(),
        };

        if input.is_empty() {
            return Err(invalid("Slug cannot be empty"));
        }

        if input.len() > MAX_SLUG_LENGTH {
            return Err(invalid("Slug too long (max 64 characters)"));
        }

        // Anything else could escape the themes root or collide on
        // case-insensitive filesystems.
        if !input
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(invalid(
                "Slug contains invalid characters (only letters, digits, hyphens, and underscores allowed)",
            ));
        }

        if input.starts_with(['-', '_']) || input.ends_with(['-', '_']) {
            return Err(invalid(
                "Slug cannot start or end with hyphens or underscores",
            ));
        }

        Ok(())
    }
}

/// Derives a lowercase-dashed slug from a display name.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;

    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    slug
}
