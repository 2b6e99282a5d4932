//! Servlet wrappers.

use std::sync::Arc;

use crate::chain::Servlet;

/// A named servlet instance with its mapping and async declaration.
pub struct Wrapper {
    name: String,
    class: String,
    servlet: Arc<dyn Servlet>,
    async_supported: bool,
    url_patterns: Vec<String>,
}

impl Wrapper {
    pub fn new(name: impl Into<String>, servlet: Arc<dyn Servlet>) -> Self {
        let name = name.into();
        Self {
            class: name.clone(),
            name,
            servlet,
            async_supported: false,
            url_patterns: Vec::new(),
        }
    }

    pub fn class(mut self, class: impl Into<String>) -> Self {
        self.class = class.into();
        self
    }

    pub fn async_supported(mut self, supported: bool) -> Self {
        self.async_supported = supported;
        self
    }

    pub fn url_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.url_patterns.push(pattern.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn class_name(&self) -> &str {
        &self.class
    }

    pub fn servlet(&self) -> Arc<dyn Servlet> {
        self.servlet.clone()
    }

    pub fn is_async_supported(&self) -> bool {
        self.async_supported
    }

    pub fn url_patterns(&self) -> &[String] {
        &self.url_patterns
    }
}

impl std::fmt::Debug for Wrapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wrapper")
            .field("name", &self.name)
            .field("class", &self.class)
            .field("async_supported", &self.async_supported)
            .field("url_patterns", &self.url_patterns)
            .finish()
    }
}
