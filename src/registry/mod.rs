//! Filter and servlet registry.
//!
//! # Data Flow
//! ```text
//! PipelineConfig
//!     → component.rs (class name → constructor)
//!     → filter_config.rs (FilterDef + lazy instance)
//!     → wrapper.rs (servlet instance + mapping)
//!     → Registry (immutable snapshot, shared via Arc)
//!
//! Per request:
//!     path → map_servlet → Wrapper
//!     Registry → chain::factory (filter maps, filter configs)
//! ```
//!
//! # Design Decisions
//! - A Registry is immutable; reloads build a new one
//! - Servlets are constructed when the registry is built, filters on first use
//! - Filter and servlet `destroy` hooks run when the registry is dropped

pub mod component;
pub mod filter_config;
pub mod wrapper;

use std::collections::HashMap;
use std::sync::Arc;

use crate::chain::{ChainError, Filter, FilterRegistry};
use crate::config::schema::PipelineConfig;
use crate::routing::dispatcher::UnknownDispatcher;
use crate::routing::matcher::match_url_pattern;
use crate::routing::FilterMapping;

pub use component::{ComponentFactory, ServletConstructor};
pub use filter_config::{filter_constructor, AsyncSupport, FilterConfig, FilterConstructor, FilterDef};
pub use wrapper::Wrapper;

/// Error building a registry from configuration.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("filter '{filter}' uses unknown class '{class}'")]
    UnknownFilterClass { filter: String, class: String },

    #[error("servlet '{servlet}' uses unknown class '{class}'")]
    UnknownServletClass { servlet: String, class: String },

    #[error("servlet '{servlet}' failed to initialise: {source}")]
    ServletInit {
        servlet: String,
        #[source]
        source: ChainError,
    },

    #[error(transparent)]
    Mapping(#[from] UnknownDispatcher),

    #[error("default servlet '{0}' is not defined")]
    UnknownDefaultServlet(String),
}

/// Immutable snapshot of filters, mappings and servlets.
#[derive(Debug, Default)]
pub struct Registry {
    filter_maps: Vec<FilterMapping>,
    filter_configs: HashMap<String, Arc<FilterConfig>>,
    wrappers: Vec<Arc<Wrapper>>,
    default_servlet: Option<Arc<Wrapper>>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Build a registry from configuration using `components` for classes.
    pub fn from_config(config: &PipelineConfig, components: &ComponentFactory) -> Result<Self, RegistryError> {
        let mut builder = Registry::builder();

        for filter in &config.filters {
            let constructor = components.filter_constructor(&filter.class).ok_or_else(|| {
                RegistryError::UnknownFilterClass {
                    filter: filter.name.clone(),
                    class: filter.class.clone(),
                }
            })?;
            let def = FilterDef {
                name: filter.name.clone(),
                class: filter.class.clone(),
                async_supported: filter.async_supported.into(),
                init_params: filter.init_params.clone(),
            };
            builder = builder.filter_config(FilterConfig::new(def, constructor));
        }

        for mapping in &config.filter_mappings {
            builder = builder.filter_mapping(FilterMapping::from_config(mapping)?);
        }

        for servlet in &config.servlets {
            let constructor = components.servlet_constructor(&servlet.class).ok_or_else(|| {
                RegistryError::UnknownServletClass {
                    servlet: servlet.name.clone(),
                    class: servlet.class.clone(),
                }
            })?;
            let instance = constructor(servlet).map_err(|source| RegistryError::ServletInit {
                servlet: servlet.name.clone(),
                source,
            })?;
            let wrapper = servlet.url_patterns.iter().fold(
                Wrapper::new(&servlet.name, instance)
                    .class(&servlet.class)
                    .async_supported(servlet.async_supported),
                |w, p| w.url_pattern(p.as_str()),
            );
            builder = builder.servlet(wrapper);
        }

        if let Some(default) = &config.default_servlet {
            builder = builder.default_servlet(default);
        }

        let registry = builder.build()?;
        tracing::info!(
            filters = registry.filter_configs.len(),
            filter_mappings = registry.filter_maps.len(),
            servlets = registry.wrappers.len(),
            "Registry built"
        );
        Ok(registry)
    }

    pub fn find_wrapper(&self, name: &str) -> Option<Arc<Wrapper>> {
        self.wrappers.iter().find(|w| w.name() == name).cloned()
    }

    /// Select the servlet for a path: the first servlet with a matching URL
    /// pattern, in configured order, else the default servlet.
    pub fn map_servlet(&self, path: &str) -> Option<Arc<Wrapper>> {
        self.wrappers
            .iter()
            .find(|w| w.url_patterns().iter().any(|p| match_url_pattern(p, path)))
            .or(self.default_servlet.as_ref())
            .cloned()
    }

    pub fn wrappers(&self) -> &[Arc<Wrapper>] {
        &self.wrappers
    }

    pub fn filter_configs(&self) -> impl Iterator<Item = &Arc<FilterConfig>> {
        self.filter_configs.values()
    }
}

impl FilterRegistry for Registry {
    fn filter_maps(&self) -> &[FilterMapping] {
        &self.filter_maps
    }

    fn find_filter_config(&self, name: &str) -> Option<Arc<FilterConfig>> {
        self.filter_configs.get(name).cloned()
    }
}

impl Drop for Registry {
    fn drop(&mut self) {
        for config in self.filter_configs.values() {
            config.release();
        }
        for wrapper in &self.wrappers {
            wrapper.servlet().destroy();
        }
    }
}

/// Incremental construction of a [`Registry`].
#[derive(Default)]
pub struct RegistryBuilder {
    filter_maps: Vec<FilterMapping>,
    filter_configs: HashMap<String, Arc<FilterConfig>>,
    wrappers: Vec<Arc<Wrapper>>,
    default_servlet: Option<String>,
}

impl RegistryBuilder {
    pub fn filter_config(mut self, config: FilterConfig) -> Self {
        self.filter_configs
            .insert(config.name().to_string(), Arc::new(config));
        self
    }

    /// Register an already constructed filter.
    pub fn filter(self, def: FilterDef, filter: Arc<dyn Filter>) -> Self {
        self.filter_config(FilterConfig::with_instance(def, filter))
    }

    pub fn filter_mapping(mut self, mapping: FilterMapping) -> Self {
        self.filter_maps.push(mapping);
        self
    }

    pub fn servlet(mut self, wrapper: Wrapper) -> Self {
        self.wrappers.push(Arc::new(wrapper));
        self
    }

    pub fn default_servlet(mut self, name: impl Into<String>) -> Self {
        self.default_servlet = Some(name.into());
        self
    }

    pub fn build(self) -> Result<Registry, RegistryError> {
        let default_servlet = match self.default_servlet {
            Some(name) => Some(
                self.wrappers
                    .iter()
                    .find(|w| w.name() == name)
                    .cloned()
                    .ok_or(RegistryError::UnknownDefaultServlet(name))?,
            ),
            None => None,
        };
        Ok(Registry {
            filter_maps: self.filter_maps,
            filter_configs: self.filter_configs,
            wrappers: self.wrappers,
            default_servlet,
        })
    }
}
