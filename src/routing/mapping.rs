//! Filter mapping rules.
//!
//! A mapping associates a filter (by name) with the dispatcher types it
//! applies to and either a URL predicate, a servlet-name predicate, or both.

use crate::config::schema::FilterMappingConfig;
use crate::routing::dispatcher::{DispatcherMask, DispatcherType, UnknownDispatcher};

/// Sentinel used in configuration for "match everything".
pub const MATCH_ALL: &str = "*";

/// URL predicate of a mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlPatterns {
    /// The `*` sentinel: matches every request, including named dispatches.
    All,
    /// Explicit patterns, tried in order. May be empty.
    Patterns(Vec<String>),
}

/// Servlet-name predicate of a mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServletNames {
    /// The `*` sentinel: matches every named servlet.
    All,
    /// Explicit servlet names. May be empty.
    Names(Vec<String>),
}

/// One configured association between a filter and a match predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterMapping {
    pub filter_name: String,
    pub dispatchers: DispatcherMask,
    pub url_patterns: UrlPatterns,
    pub servlet_names: ServletNames,
}

impl FilterMapping {
    /// Create a mapping that selects nothing until patterns or names are added.
    pub fn new(filter_name: impl Into<String>, dispatchers: DispatcherMask) -> Self {
        Self {
            filter_name: filter_name.into(),
            dispatchers,
            url_patterns: UrlPatterns::Patterns(Vec::new()),
            servlet_names: ServletNames::Names(Vec::new()),
        }
    }

    /// Add a URL pattern. `*` switches the mapping to match every URL.
    pub fn with_url_pattern(mut self, pattern: impl Into<String>) -> Self {
        let pattern = pattern.into();
        if pattern == MATCH_ALL {
            self.url_patterns = UrlPatterns::All;
        } else if let UrlPatterns::Patterns(patterns) = &mut self.url_patterns {
            patterns.push(pattern);
        }
        self
    }

    /// Add a servlet name. `*` switches the mapping to match every servlet.
    pub fn with_servlet_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if name == MATCH_ALL {
            self.servlet_names = ServletNames::All;
        } else if let ServletNames::Names(names) = &mut self.servlet_names {
            names.push(name);
        }
        self
    }

    pub fn match_all_urls(mut self) -> Self {
        self.url_patterns = UrlPatterns::All;
        self
    }

    pub fn match_all_servlets(mut self) -> Self {
        self.servlet_names = ServletNames::All;
        self
    }

    pub fn applies_to(&self, dispatcher: DispatcherType) -> bool {
        self.dispatchers.contains(dispatcher)
    }

    /// Build a mapping from its configuration entry.
    pub fn from_config(config: &FilterMappingConfig) -> Result<Self, UnknownDispatcher> {
        let dispatchers = config
            .dispatchers
            .iter()
            .map(|d| d.parse::<DispatcherType>())
            .collect::<Result<Vec<_>, _>>()?;

        let mapping = FilterMapping::new(&config.filter_name, DispatcherMask::from_types(dispatchers));
        let mapping = config
            .url_patterns
            .iter()
            .fold(mapping, |m, p| m.with_url_pattern(p.as_str()));
        Ok(config
            .servlet_names
            .iter()
            .fold(mapping, |m, n| m.with_servlet_name(n.as_str())))
    }
}
