//! Platform requirement checks for theme manifests.
//!
//! Requirement values are loose constraint strings such as `>=8.1` or `^11`.
//! Operator prefixes are stripped and the remainder is compared as a minimum
//! version against the configured platform versions.

use semver::Version;
use std::collections::BTreeMap;

/// Requirement key compared against the configured runtime version.
pub const RUNTIME_REQUIREMENT: &str = "runtime";
/// Requirement key compared against the configured host framework version.
pub const FRAMEWORK_REQUIREMENT: &str = "framework";

/// Removes leading comparison operators and a `v` prefix.
pub fn strip_operators(raw: &str) -> &str {
    raw.trim()
        .trim_start_matches(['>', '<', '=', '^', '~', 'v', 'V', ' '])
        .trim()
}

/// Parses a loose dotted version (`8`, `8.1`, `v8.1.3`, `>=11.0-beta`).
///
/// Missing minor/patch components default to zero, components past the third
/// are ignored, and pre-release or build suffixes are dropped.
pub fn parse_version(raw: &str) -> Option<Version> {
    let stripped = strip_operators(raw);
    let core = stripped.split(['-', '+']).next()?;
    if core.is_empty() {
        return None;
    }

    let mut numbers = [0u64; 3];
    for (index, part) in core.split('.').enumerate() {
        let value = part.trim().parse::<u64>().ok()?;
        if index < numbers.len() {
            numbers[index] = value;
        }
    }

    Some(Version::new(numbers[0], numbers[1], numbers[2]))
}

/// True when `current` is at least the minimum expressed by `required`.
pub fn satisfies(current: &str, required: &str) -> bool {
    match (parse_version(current), parse_version(required)) {
        (Some(current), Some(required)) => current >= required,
        _ => false,
    }
}

/// Lists unmet platform requirements, one message per failing component.
pub fn requirement_errors(
    requirements: &BTreeMap<String, String>,
    runtime_version: &str,
    framework_version: &str,
) -> Vec<String> {
    let mut errors = Vec::new();

    for (component, current) in [
        (RUNTIME_REQUIREMENT, runtime_version),
        (FRAMEWORK_REQUIREMENT, framework_version),
    ] {
        let Some(required) = requirements.get(component) else {
            continue;
        };
        if parse_version(required).is_none() {
            errors.push(format!(
                "{component} requirement '{required}' is not a valid version"
            ));
            continue;
        }
        if !satisfies(current, required) {
            errors.push(format!(
                "{component} {} or higher is required",
                strip_operators(required)
            ));
        }
    }

    errors
}
