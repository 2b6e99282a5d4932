//! Filter definitions and their lazily constructed instances.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::chain::{ChainError, Filter};

/// Tri-state async support declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AsyncSupport {
    Supported,
    Unsupported,
    #[default]
    Unspecified,
}

impl From<Option<bool>> for AsyncSupport {
    fn from(value: Option<bool>) -> Self {
        match value {
            Some(true) => AsyncSupport::Supported,
            Some(false) => AsyncSupport::Unsupported,
            None => AsyncSupport::Unspecified,
        }
    }
}

/// A registered filter: name, implementation class and declarations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterDef {
    pub name: String,
    pub class: String,
    pub async_supported: AsyncSupport,
    pub init_params: HashMap<String, String>,
}

impl FilterDef {
    pub fn new(name: impl Into<String>, class: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            class: class.into(),
            async_supported: AsyncSupport::Unspecified,
            init_params: HashMap::new(),
        }
    }

    pub fn async_supported(mut self, support: AsyncSupport) -> Self {
        self.async_supported = support;
        self
    }

    pub fn init_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.init_params.insert(name.into(), value.into());
        self
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.init_params.get(name).map(String::as_str)
    }
}

/// Builds a filter instance from its definition.
pub type FilterConstructor = Arc<dyn Fn(&FilterDef) -> Result<Arc<dyn Filter>, ChainError> + Send + Sync>;

/// Box a closure as a [`FilterConstructor`].
pub fn filter_constructor<F>(f: F) -> FilterConstructor
where
    F: Fn(&FilterDef) -> Result<Arc<dyn Filter>, ChainError> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// A filter definition bound to its (lazily created) instance.
///
/// Chains hold `Arc<FilterConfig>` and compare them by identity.
pub struct FilterConfig {
    def: FilterDef,
    constructor: FilterConstructor,
    instance: Mutex<Option<Arc<dyn Filter>>>,
}

impl FilterConfig {
    pub fn new(def: FilterDef, constructor: FilterConstructor) -> Self {
        Self {
            def,
            constructor,
            instance: Mutex::new(None),
        }
    }

    /// Bind a definition to an already constructed filter.
    pub fn with_instance(def: FilterDef, filter: Arc<dyn Filter>) -> Self {
        let template = filter.clone();
        Self {
            def,
            constructor: filter_constructor(move |_| Ok(template.clone())),
            instance: Mutex::new(Some(filter)),
        }
    }

    pub fn name(&self) -> &str {
        &self.def.name
    }

    pub fn class(&self) -> &str {
        &self.def.class
    }

    pub fn def(&self) -> &FilterDef {
        &self.def
    }

    /// True only when the definition explicitly declares no async support.
    pub fn declares_no_async(&self) -> bool {
        self.def.async_supported == AsyncSupport::Unsupported
    }

    /// The filter instance, constructing it on first use.
    ///
    /// A failed construction is reported to the caller and retried on the
    /// next request.
    pub fn filter(&self) -> Result<Arc<dyn Filter>, ChainError> {
        let mut instance = self.instance.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(filter) = instance.as_ref() {
            return Ok(filter.clone());
        }
        let filter = (self.constructor)(&self.def).inspect_err(|e| {
            tracing::error!(filter = %self.def.name, class = %self.def.class, error = %e, "Filter initialisation failed");
        })?;
        tracing::debug!(filter = %self.def.name, "Filter initialised");
        *instance = Some(filter.clone());
        Ok(filter)
    }

    pub fn is_initialised(&self) -> bool {
        self.instance
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Destroy the instance, if one was created.
    pub fn release(&self) {
        let taken = self
            .instance
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(filter) = taken {
            filter.destroy();
        }
    }
}

impl std::fmt::Debug for FilterConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterConfig")
            .field("def", &self.def)
            .field("initialised", &self.is_initialised())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{FilterChain, ServletRequest, ServletResponse};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Noop(Arc<AtomicUsize>);

    impl Filter for Noop {
        fn do_filter(&self, req: &ServletRequest, res: &ServletResponse, chain: &mut FilterChain) -> Result<(), ChainError> {
            chain.do_filter(req, res)
        }

        fn destroy(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_constructed_once() {
        let built = Arc::new(AtomicUsize::new(0));
        let destroyed = Arc::new(AtomicUsize::new(0));
        let (b, d) = (built.clone(), destroyed.clone());
        let config = FilterConfig::new(
            FilterDef::new("n", "noop"),
            filter_constructor(move |_| {
                b.fetch_add(1, Ordering::SeqCst);
                Ok(Arc::new(Noop(d.clone())) as Arc<dyn Filter>)
            }),
        );

        assert!(!config.is_initialised());
        config.filter().unwrap();
        config.filter().unwrap();
        assert_eq!(built.load(Ordering::SeqCst), 1);

        config.release();
        assert_eq!(destroyed.load(Ordering::SeqCst), 1);
        assert!(!config.is_initialised());
    }

    #[test]
    fn test_construction_failure_propagates() {
        let config = FilterConfig::new(
            FilterDef::new("n", "broken"),
            filter_constructor(|def| Err(ChainError::servlet(format!("cannot build {}", def.class)))),
        );
        let err = config.filter().err().unwrap();
        assert_eq!(err.to_string(), "cannot build broken");
        assert!(!config.is_initialised());
    }

    #[test]
    fn test_async_declaration() {
        let def = FilterDef::new("n", "c");
        assert_eq!(def.async_supported, AsyncSupport::Unspecified);
        assert_eq!(AsyncSupport::from(Some(false)), AsyncSupport::Unsupported);
        assert_eq!(AsyncSupport::from(Some(true)), AsyncSupport::Supported);
    }
}
