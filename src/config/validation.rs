//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate URL pattern forms and dispatcher names
//! - Detect duplicate filter and servlet names
//! - Check the default servlet exists
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: PipelineConfig → Result<(), Vec<ValidationError>>
//! - Mappings naming undefined filters are accepted; resolution skips them

use std::collections::HashSet;

use crate::config::schema::PipelineConfig;
use crate::routing::dispatcher::DispatcherType;
use crate::routing::mapping::MATCH_ALL;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("duplicate filter name '{0}'")]
    DuplicateFilter(String),

    #[error("duplicate servlet name '{0}'")]
    DuplicateServlet(String),

    #[error("invalid URL pattern '{pattern}' for '{owner}'")]
    InvalidUrlPattern { owner: String, pattern: String },

    #[error("unknown dispatcher '{dispatcher}' in mapping for filter '{filter}'")]
    UnknownDispatcher { filter: String, dispatcher: String },

    #[error("mapping for filter '{0}' has neither URL patterns nor servlet names")]
    EmptyMapping(String),

    #[error("default servlet '{0}' is not defined")]
    UnknownDefaultServlet(String),

    #[error("request timeout must be greater than zero")]
    ZeroTimeout,
}

/// Returns true if `pattern` is a well-formed URL pattern.
///
/// Accepted forms: `*`, the empty string (context root), `*.ext`, and
/// `/...` paths whose only `*` is a trailing `/*`.
pub fn is_valid_url_pattern(pattern: &str) -> bool {
    if pattern == MATCH_ALL || pattern.is_empty() {
        return true;
    }
    if pattern.contains('\n') || pattern.contains('\r') {
        return false;
    }
    if let Some(extension) = pattern.strip_prefix("*.") {
        return !extension.is_empty() && !extension.contains('/') && !extension.contains('*');
    }
    if !pattern.starts_with('/') {
        return false;
    }
    let body = pattern.strip_suffix("/*").unwrap_or(pattern);
    !body.contains('*')
}

/// Validate a configuration, collecting every error found.
pub fn validate_config(config: &PipelineConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroTimeout);
    }

    let mut filter_names = HashSet::new();
    for filter in &config.filters {
        if !filter_names.insert(filter.name.as_str()) {
            errors.push(ValidationError::DuplicateFilter(filter.name.clone()));
        }
    }

    for mapping in &config.filter_mappings {
        if mapping.url_patterns.is_empty() && mapping.servlet_names.is_empty() {
            errors.push(ValidationError::EmptyMapping(mapping.filter_name.clone()));
        }
        for pattern in &mapping.url_patterns {
            if !is_valid_url_pattern(pattern) {
                errors.push(ValidationError::InvalidUrlPattern {
                    owner: mapping.filter_name.clone(),
                    pattern: pattern.clone(),
                });
            }
        }
        for dispatcher in &mapping.dispatchers {
            if dispatcher.parse::<DispatcherType>().is_err() {
                errors.push(ValidationError::UnknownDispatcher {
                    filter: mapping.filter_name.clone(),
                    dispatcher: dispatcher.clone(),
                });
            }
        }
    }

    let mut servlet_names = HashSet::new();
    for servlet in &config.servlets {
        if !servlet_names.insert(servlet.name.as_str()) {
            errors.push(ValidationError::DuplicateServlet(servlet.name.clone()));
        }
        for pattern in &servlet.url_patterns {
            if !is_valid_url_pattern(pattern) {
                errors.push(ValidationError::InvalidUrlPattern {
                    owner: servlet.name.clone(),
                    pattern: pattern.clone(),
                });
            }
        }
    }

    if let Some(default) = &config.default_servlet {
        if !servlet_names.contains(default.as_str()) {
            errors.push(ValidationError::UnknownDefaultServlet(default.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
