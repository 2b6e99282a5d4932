//! Implementation classes available to configuration.
//!
//! # Responsibilities
//! - Map class names used in config files to constructors
//! - Provide the built-in filters and servlets
//!
//! # Design Decisions
//! - Registration is explicit; no reflection or dynamic loading
//! - Later registrations under the same class name replace earlier ones

use std::collections::HashMap;
use std::sync::Arc;

use crate::chain::{ChainError, Filter, Servlet};
use crate::components;
use crate::config::schema::{PipelineConfig, ServletConfig};
use crate::registry::RegistryError;
use crate::registry::filter_config::{filter_constructor, FilterConstructor, FilterDef};

/// Builds a servlet instance from its configuration.
pub type ServletConstructor = Arc<dyn Fn(&ServletConfig) -> Result<Arc<dyn Servlet>, ChainError> + Send + Sync>;

/// Class-name → constructor tables for filters and servlets.
#[derive(Clone, Default)]
pub struct ComponentFactory {
    filters: HashMap<String, FilterConstructor>,
    servlets: HashMap<String, ServletConstructor>,
}

impl ComponentFactory {
    /// An empty factory.
    pub fn new() -> Self {
        Self::default()
    }

    /// A factory pre-loaded with the built-in components.
    pub fn with_builtins() -> Self {
        let mut factory = Self::new();
        components::register_builtins(&mut factory);
        factory
    }

    pub fn register_filter<F>(&mut self, class: impl Into<String>, constructor: F) -> &mut Self
    where
        F: Fn(&FilterDef) -> Result<Arc<dyn Filter>, ChainError> + Send + Sync + 'static,
    {
        self.filters.insert(class.into(), filter_constructor(constructor));
        self
    }

    pub fn register_servlet<F>(&mut self, class: impl Into<String>, constructor: F) -> &mut Self
    where
        F: Fn(&ServletConfig) -> Result<Arc<dyn Servlet>, ChainError> + Send + Sync + 'static,
    {
        self.servlets.insert(class.into(), Arc::new(constructor));
        self
    }

    pub fn filter_constructor(&self, class: &str) -> Option<FilterConstructor> {
        self.filters.get(class).cloned()
    }

    pub fn servlet_constructor(&self, class: &str) -> Option<ServletConstructor> {
        self.servlets.get(class).cloned()
    }

    /// Check that every component `config` declares has a registered class,
    /// without constructing anything.
    pub fn check_classes(&self, config: &PipelineConfig) -> Result<(), RegistryError> {
        if let Some(filter) = config.filters.iter().find(|f| !self.filters.contains_key(&f.class)) {
            return Err(RegistryError::UnknownFilterClass {
                filter: filter.name.clone(),
                class: filter.class.clone(),
            });
        }
        if let Some(servlet) = config.servlets.iter().find(|s| !self.servlets.contains_key(&s.class)) {
            return Err(RegistryError::UnknownServletClass {
                servlet: servlet.name.clone(),
                class: servlet.class.clone(),
            });
        }
        Ok(())
    }

    pub fn filter_classes(&self) -> Vec<&str> {
        let mut classes: Vec<&str> = self.filters.keys().map(String::as_str).collect();
        classes.sort_unstable();
        classes
    }

    pub fn servlet_classes(&self) -> Vec<&str> {
        let mut classes: Vec<&str> = self.servlets.keys().map(String::as_str).collect();
        classes.sort_unstable();
        classes
    }
}

impl std::fmt::Debug for ComponentFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentFactory")
            .field("filters", &self.filter_classes())
            .field("servlets", &self.servlet_classes())
            .finish()
    }
}
