//! URL pattern and servlet-name matching.
//!
//! # Responsibilities
//! - Match a request path against a single URL pattern
//! - Match a request path against a mapping's pattern set
//! - Match a servlet name against a mapping's name set
//!
//! # Design Decisions
//! - Pattern forms are tried in a fixed order: exact, path prefix, extension
//! - A `/x/*` pattern that fails the prefix test never falls through to the
//!   extension test
//! - No default-pattern (`/`) fallback: that form only selects servlets
//! - Matching is case-sensitive and allocation-free

use crate::routing::mapping::{FilterMapping, ServletNames, UrlPatterns};

/// Returns true if `request_path` matches the URL pattern `pattern`.
pub fn match_url_pattern(pattern: &str, request_path: &str) -> bool {
    // Exact
    if pattern == request_path {
        return true;
    }

    // Path prefix ("/.../*")
    if pattern == "/*" {
        return true;
    }
    if let Some(prefix) = pattern.strip_suffix("/*") {
        return match request_path.strip_prefix(prefix) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        };
    }

    // Extension ("*.ext")
    if let Some(extension) = pattern.strip_prefix("*.") {
        let segment = match request_path.rfind('/') {
            Some(slash) => &request_path[slash + 1..],
            None => return false,
        };
        return match segment.rfind('.') {
            Some(period) if period > 0 && period + 1 < segment.len() => {
                &segment[period + 1..] == extension
            }
            _ => false,
        };
    }

    false
}

/// Returns true if the mapping's URL predicate selects `request_path`.
///
/// The match-all sentinel also selects requests without a path, such as
/// named dispatches.
pub fn matches_url(mapping: &FilterMapping, request_path: Option<&str>) -> bool {
    match &mapping.url_patterns {
        UrlPatterns::All => true,
        UrlPatterns::Patterns(patterns) => match request_path {
            Some(path) => patterns.iter().any(|p| match_url_pattern(p, path)),
            None => false,
        },
    }
}

/// Returns true if the mapping's servlet-name predicate selects `servlet_name`.
pub fn matches_servlet(mapping: &FilterMapping, servlet_name: Option<&str>) -> bool {
    let Some(name) = servlet_name else {
        return false;
    };
    match &mapping.servlet_names {
        ServletNames::All => true,
        ServletNames::Names(names) => names.iter().any(|n| n == name),
    }
}
