use serde::Serialize;

/// Why a slug was left alone during a bulk delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedTheme {
    pub slug: String,
    pub reason: String,
}

/// A slug whose deletion was attempted and failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedTheme {
    pub slug: String,
    pub error: String,
}

/// Outcome of deleting several themes in one request.
///
/// Every requested slug ends up in exactly one of `deleted`, `skipped` or
/// `errored`. Processing continues after individual failures.
///
/// # Examples
///
/// ```
/// use registry::bulk::BulkDeleteResult;
///
/// let mut result = BulkDeleteResult::new(2);
/// result.add_deleted("old-theme");
/// result.add_skipped("default", "protected");
///
/// assert!(!result.is_complete_success());
/// assert_eq!(result.summary(), "Deleted 1 theme(s), skipped 1, 0 error(s)");
/// ```
#[derive(Debug, Clone, Default, Serialize)]
pub struct BulkDeleteResult {
    /// Number of slugs in the request
    pub total_requested: usize,
    pub deleted: Vec<String>,
    /// Blocked by the deletability check (active or protected)
    pub skipped: Vec<SkippedTheme>,
    pub errored: Vec<FailedTheme>,
}

impl BulkDeleteResult {
    pub fn new(total_requested: usize) -> Self {
        Self {
            total_requested,
            ..Self::default()
        }
    }

    pub fn add_deleted(&mut self, slug: &str) {
        self.deleted.push(slug.to_string());
    }

    pub fn add_skipped(&mut self, slug: &str, reason: &str) {
        self.skipped.push(SkippedTheme {
            slug: slug.to_string(),
            reason: reason.to_string(),
        });
    }

    pub fn add_error(&mut self, slug: &str, error: String) {
        self.errored.push(FailedTheme {
            slug: slug.to_string(),
            error,
        });
    }

    /// True when every requested slug was deleted.
    pub fn is_complete_success(&self) -> bool {
        self.deleted.len() == self.total_requested
            && self.skipped.is_empty()
            && self.errored.is_empty()
    }

    pub fn summary(&self) -> String {
        format!(
            "Deleted {} theme(s), skipped {}, {} error(s)",
            self.deleted.len(),
            self.skipped.len(),
            self.errored.len()
        )
    }
}
