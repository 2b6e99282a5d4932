//! Request servicing through the filter pipeline.
//!
//! # Data Flow
//! ```text
//! service(request):
//!     Registry snapshot → map_servlet(path) → pooled FilterChain
//!     → populate_chain (REQUEST) → do_filter
//!     → while async started: ASYNC dispatch to the same servlet
//!     → chain released back to the pool
//!
//! dispatch(request, FORWARD | INCLUDE | ERROR | ASYNC, target):
//!     save dispatcher attributes → fresh FilterChain → do_filter
//!     → restore dispatcher attributes
//! ```
//!
//! # Design Decisions
//! - Each traversal works on the registry snapshot it started with
//! - Chains are never pooled when a privileged executor is installed
//! - Privileged execution is fixed at construction; reloads swap the
//!   registry and the tracking flag only

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::chain::{
    populate_chain, ChainError, DispatchState, FilterChain, PrivilegedExecutor, ServletRequest,
    ServletResponse, SpanExecutor,
};
use crate::config::schema::PipelineConfig;
use crate::container::pool::ChainPool;
use crate::observability::metrics;
use crate::registry::{ComponentFactory, Registry, RegistryError, Wrapper};
use crate::routing::DispatcherType;

/// Upper bound on ASYNC re-dispatches for one request.
const MAX_ASYNC_DISPATCHES: usize = 16;
/// Internal dispatches a single request may nest before the innermost fails.
const MAX_DISPATCH_DEPTH: usize = 32;

/// Where an internal dispatch goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchTarget {
    /// A context-relative path, mapped to a servlet like an incoming request.
    Path(String),
    /// A servlet by name; no path is available for filter URL matching.
    Named(String),
}

impl std::fmt::Display for DispatchTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DispatchTarget::Path(path) => write!(f, "path '{path}'"),
            DispatchTarget::Named(name) => write!(f, "servlet '{name}'"),
        }
    }
}

/// Failure servicing an incoming request.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("no servlet mapped for path '{0}'")]
    NotFound(String),

    #[error(transparent)]
    Chain(#[from] ChainError),
}

/// Construction options for a [`Pipeline`].
#[derive(Clone)]
pub struct PipelineOptions {
    pub track_last_serviced: bool,
    pub executor: Option<Arc<dyn PrivilegedExecutor>>,
    pub max_idle_per_servlet: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            track_last_serviced: false,
            executor: None,
            max_idle_per_servlet: 64,
        }
    }
}

impl PipelineOptions {
    pub fn from_config(config: &PipelineConfig) -> Self {
        let executor = config
            .security
            .privileged_execution
            .then(|| Arc::new(SpanExecutor) as Arc<dyn PrivilegedExecutor>);
        Self {
            track_last_serviced: config.isolation.track_last_serviced,
            executor,
            max_idle_per_servlet: config.pool.max_idle_per_servlet,
        }
    }
}

/// The servicing container: registry snapshot, chain pool and settings.
pub struct Pipeline {
    registry: ArcSwap<Registry>,
    components: ComponentFactory,
    pool: ChainPool,
    executor: Option<Arc<dyn PrivilegedExecutor>>,
    track_last_serviced: AtomicBool,
}

impl Pipeline {
    pub fn new(registry: Registry, components: ComponentFactory, options: PipelineOptions) -> Arc<Self> {
        Arc::new(Self {
            registry: ArcSwap::from_pointee(registry),
            components,
            pool: ChainPool::new(options.max_idle_per_servlet),
            executor: options.executor,
            track_last_serviced: AtomicBool::new(options.track_last_serviced),
        })
    }

    /// Build the registry described by `config` and wrap it in a pipeline.
    pub fn from_config(config: &PipelineConfig, components: ComponentFactory) -> Result<Arc<Self>, RegistryError> {
        let registry = Registry::from_config(config, &components)?;
        let options = PipelineOptions::from_config(config);
        tracing::info!(
            track_last_serviced = options.track_last_serviced,
            privileged_execution = options.executor.is_some(),
            max_idle_per_servlet = options.max_idle_per_servlet,
            "Pipeline initialised"
        );
        Ok(Self::new(registry, components, options))
    }

    /// Swap in a registry built from `config`. Traversals already running keep
    /// the registry they started with.
    pub fn reload(&self, config: &PipelineConfig) -> Result<(), RegistryError> {
        let registry = Registry::from_config(config, &self.components)?;
        if config.security.privileged_execution != self.executor.is_some() {
            tracing::warn!("Privileged execution setting changed; restart required for it to apply");
        }
        self.registry.store(Arc::new(registry));
        self.track_last_serviced
            .store(config.isolation.track_last_serviced, Ordering::Release);
        self.pool.clear();
        tracing::info!("Pipeline registry reloaded");
        Ok(())
    }

    /// Current registry snapshot.
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.load_full()
    }

    pub fn pool(&self) -> &ChainPool {
        &self.pool
    }

    /// Build a fresh chain for `request` targeting `wrapper`.
    pub fn create_filter_chain(&self, request: &ServletRequest, wrapper: &Wrapper) -> FilterChain {
        let mut chain = self.new_chain();
        populate_chain(&mut chain, &**self.registry.load(), request, wrapper);
        chain
    }

    /// Service an incoming request: REQUEST dispatch to the servlet mapped to
    /// its path, then ASYNC dispatches while the servlet keeps starting async.
    pub fn service(self: &Arc<Self>, request: &ServletRequest, response: &ServletResponse) -> Result<(), ServiceError> {
        request.attach_pipeline(Arc::downgrade(self));
        let registry = self.registry.load_full();
        let path = request.path().to_string();
        let wrapper = registry
            .map_servlet(&path)
            .ok_or_else(|| ServiceError::NotFound(path.clone()))?;

        let result = self
            .dispatch_to(&registry, &wrapper, request, response, DispatcherType::Request, Some(path.clone()), true)
            .and_then(|()| {
                let mut resumed = 0;
                while request.take_async_started() {
                    resumed += 1;
                    if resumed > MAX_ASYNC_DISPATCHES {
                        return Err(ChainError::runtime(format!(
                            "request restarted async more than {MAX_ASYNC_DISPATCHES} times"
                        )));
                    }
                    self.dispatch_to(&registry, &wrapper, request, response, DispatcherType::Async, Some(path.clone()), true)?;
                }
                Ok(())
            });

        result.map_err(|err| {
            metrics::record_chain_failure(err.kind());
            tracing::warn!(request_id = %request.id(), path = %path, servlet = %wrapper.name(), error = %err, "Request failed");
            ServiceError::Chain(err)
        })
    }

    /// Internal dispatch of `request` to `target` with a fresh chain. The
    /// request's dispatcher attributes are restored before returning.
    ///
    /// Fails once more than `MAX_DISPATCH_DEPTH` dispatches are nested on the
    /// same request, so a forwarding cycle ends the request instead of the
    /// worker's stack.
    pub fn dispatch(
        &self,
        request: &ServletRequest,
        response: &ServletResponse,
        dispatcher: DispatcherType,
        target: DispatchTarget,
    ) -> Result<(), ChainError> {
        let depth = request.enter_dispatch();
        let result = if depth > MAX_DISPATCH_DEPTH {
            tracing::warn!(request_id = %request.id(), target = %target, depth, "Internal dispatch nested too deeply");
            Err(ChainError::runtime(format!(
                "internal dispatch to {target} nested more than {MAX_DISPATCH_DEPTH} levels"
            )))
        } else {
            self.dispatch_nested(request, response, dispatcher, &target)
        };
        request.leave_dispatch();
        result
    }

    fn dispatch_nested(
        &self,
        request: &ServletRequest,
        response: &ServletResponse,
        dispatcher: DispatcherType,
        target: &DispatchTarget,
    ) -> Result<(), ChainError> {
        let registry = self.registry.load_full();
        let (wrapper, path) = match target {
            DispatchTarget::Path(path) => {
                let path = path.split_once('?').map_or(path.as_str(), |(p, _)| p);
                (registry.map_servlet(path), Some(path.to_string()))
            }
            DispatchTarget::Named(name) => (registry.find_wrapper(name), None),
        };
        let wrapper = wrapper.ok_or_else(|| ChainError::servlet(format!("no servlet available for {target}")))?;

        tracing::debug!(request_id = %request.id(), dispatcher = %dispatcher, target = %target, "Internal dispatch");
        self.dispatch_to(&registry, &wrapper, request, response, dispatcher, path, false)
    }

    #[allow(clippy::too_many_arguments)]
    fn dispatch_to(
        &self,
        registry: &Registry,
        wrapper: &Wrapper,
        request: &ServletRequest,
        response: &ServletResponse,
        dispatcher: DispatcherType,
        path: Option<String>,
        pooled: bool,
    ) -> Result<(), ChainError> {
        let previous = request.replace_dispatch(DispatchState { dispatcher, path });
        let result = self.run_chain(registry, wrapper, request, response, pooled);
        request.replace_dispatch(previous);
        result
    }

    fn run_chain(
        &self,
        registry: &Registry,
        wrapper: &Wrapper,
        request: &ServletRequest,
        response: &ServletResponse,
        pooled: bool,
    ) -> Result<(), ChainError> {
        let pooled = pooled && self.executor.is_none();
        let mut chain = if pooled {
            self.pool
                .acquire(wrapper.name(), FilterChain::new)
                .track_last_serviced(self.track_last_serviced.load(Ordering::Acquire))
        } else {
            self.new_chain()
        };

        populate_chain(&mut chain, registry, request, wrapper);
        record_non_async_components(&chain, wrapper, request);
        let result = chain.do_filter(request, response);

        if pooled {
            self.pool.give_back(wrapper.name(), chain);
        }
        result
    }

    fn new_chain(&self) -> FilterChain {
        let chain = FilterChain::new().track_last_serviced(self.track_last_serviced.load(Ordering::Acquire));
        match &self.executor {
            Some(executor) => chain.with_executor(Arc::clone(executor)),
            None => chain,
        }
    }
}

fn record_non_async_components(chain: &FilterChain, wrapper: &Wrapper, request: &ServletRequest) {
    let mut components: Vec<String> = chain.non_async_filters().into_iter().collect();
    components.sort_unstable();
    if !wrapper.is_async_supported() {
        components.push(wrapper.class_name().to_string());
    }
    request.set_non_async_components(components);
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("registry", &self.registry.load_full())
            .field("pool", &self.pool)
            .field("privileged", &self.executor.is_some())
            .field("track_last_serviced", &self.track_last_serviced.load(Ordering::Relaxed))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{Filter, Servlet};
    use crate::registry::FilterDef;
    use crate::routing::FilterMapping;

    struct Echo;

    impl Servlet for Echo {
        fn service(&self, request: &ServletRequest, response: &ServletResponse) -> Result<(), ChainError> {
            response.write_str(&format!("{}:{}", request.dispatcher_type(), request.dispatch_path().unwrap_or_default()))?;
            Ok(())
        }
    }

    struct Tag(&'static str);

    impl Filter for Tag {
        fn do_filter(&self, req: &ServletRequest, res: &ServletResponse, chain: &mut FilterChain) -> Result<(), ChainError> {
            res.write_str(self.0)?;
            chain.do_filter(req, res)
        }
    }

    fn pipeline() -> Arc<Pipeline> {
        let registry = Registry::builder()
            .filter(FilterDef::new("T", "tag"), Arc::new(Tag("[t]")))
            .filter_mapping(FilterMapping::new("T", crate::routing::DispatcherMask::REQUEST).with_url_pattern("/*"))
            .servlet(Wrapper::new("echo", Arc::new(Echo)).url_pattern("/echo/*"))
            .build()
            .unwrap();
        Pipeline::new(registry, ComponentFactory::new(), PipelineOptions::default())
    }

    #[test]
    fn test_service_runs_request_dispatch() {
        let pipeline = pipeline();
        let req = ServletRequest::builder("GET", "/echo/a").build();
        let res = ServletResponse::new();
        pipeline.service(&req, &res).unwrap();
        assert_eq!(res.body(), b"[t]REQUEST:/echo/a");
        assert_eq!(pipeline.pool().idle_count("echo"), 1);
    }

    #[test]
    fn test_service_not_found() {
        let pipeline = pipeline();
        let req = ServletRequest::builder("GET", "/missing").build();
        let err = pipeline.service(&req, &ServletResponse::new()).unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(path) if path == "/missing"));
    }

    #[test]
    fn test_dispatch_restores_attributes() {
        let pipeline = pipeline();
        let req = ServletRequest::builder("GET", "/echo/a").build();
        let res = ServletResponse::new();
        pipeline
            .dispatch(&req, &res, DispatcherType::Include, DispatchTarget::Path("/echo/b?x=1".into()))
            .unwrap();
        // the mapping only covers REQUEST, so the filter is skipped
        assert_eq!(res.body(), b"INCLUDE:/echo/b");
        assert_eq!(req.dispatcher_type(), DispatcherType::Request);
        assert_eq!(req.dispatch_path().as_deref(), Some("/echo/a"));
    }

    #[test]
    fn test_dispatch_unknown_target() {
        let pipeline = pipeline();
        let req = ServletRequest::builder("GET", "/echo/a").build();
        let err = pipeline
            .dispatch(&req, &ServletResponse::new(), DispatcherType::Forward, DispatchTarget::Named("ghost".into()))
            .unwrap_err();
        assert!(matches!(err, ChainError::Servlet(_)));
    }

    #[test]
    fn test_create_filter_chain() {
        let pipeline = pipeline();
        let req = ServletRequest::builder("GET", "/echo/a").build();
        let wrapper = pipeline.registry().find_wrapper("echo").unwrap();
        let chain = pipeline.create_filter_chain(&req, &wrapper);
        assert_eq!(chain.filter_names(), vec!["T"]);
        assert!(chain.has_servlet());
    }
}
