//! The filter chain execution object.
//!
//! # State
//! ```text
//! filters: [f0, f1, ..., f(n-1)]   pos: next slot to run
//!
//! do_filter:
//!     pos < n  → run filters[pos], pos += 1 (the filter calls do_filter again
//!                to continue; returning without calling it short-circuits)
//!     pos >= n → run the servlet
//! ```
//!
//! # Lifecycle
//! - `configure` / `add_filter` + `set_servlet`: populate
//! - `reuse`: rewind the cursor for a re-dispatch through the same filters
//! - `release`: clear everything so the chain can be pooled
//!
//! # Design Decisions
//! - Owned by exactly one worker per traversal; no internal locking
//! - Each call advances exactly one step; recursion through the filters
//!   realises the loop
//! - Async downgrade is written to the request, never kept on the chain

use std::collections::HashSet;
use std::sync::Arc;

use crate::chain::error::{classify, classify_privileged, ChainError, Stage};
use crate::chain::filter::Servlet;
use crate::chain::privileged::PrivilegedExecutor;
use crate::chain::request::{ServletRequest, ServletResponse};
use crate::chain::serviced::ServicedGuard;
use crate::observability::metrics;
use crate::registry::FilterConfig;

/// Number of slots added each time the filter storage is full.
pub const INCREMENT: usize = 10;

/// Reusable, single-traversal execution object for one request.
#[derive(Default)]
pub struct FilterChain {
    filters: Vec<Arc<FilterConfig>>,
    pos: usize,
    servlet: Option<Arc<dyn Servlet>>,
    servlet_supports_async: bool,
    executor: Option<Arc<dyn PrivilegedExecutor>>,
    track_last_serviced: bool,
}

impl FilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run every filter and servlet invocation through `executor`.
    pub fn with_executor(mut self, executor: Arc<dyn PrivilegedExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Record the request/response handed to the servlet in the worker-local
    /// slot read by [`last_serviced_request`](crate::chain::last_serviced_request).
    pub fn track_last_serviced(mut self, enabled: bool) -> Self {
        self.track_last_serviced = enabled;
        self
    }

    /// Replace the chain contents with `filters` and `servlet`.
    pub fn configure<I>(&mut self, filters: I, servlet: Arc<dyn Servlet>, servlet_supports_async: bool)
    where
        I: IntoIterator<Item = Arc<FilterConfig>>,
    {
        self.release();
        for filter in filters {
            self.add_filter(filter);
        }
        self.set_servlet(servlet, servlet_supports_async);
    }

    /// Append a filter unless this exact config is already present.
    pub fn add_filter(&mut self, config: Arc<FilterConfig>) {
        if self.filters.iter().any(|f| Arc::ptr_eq(f, &config)) {
            return;
        }
        if self.filters.len() == self.filters.capacity() {
            self.filters.reserve_exact(INCREMENT);
        }
        self.filters.push(config);
    }

    pub fn set_servlet(&mut self, servlet: Arc<dyn Servlet>, supports_async: bool) {
        self.servlet = Some(servlet);
        self.servlet_supports_async = supports_async;
    }

    /// Number of configured filters.
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Index of the next filter to run.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Allocated filter slots.
    pub fn capacity(&self) -> usize {
        self.filters.capacity()
    }

    pub fn has_servlet(&self) -> bool {
        self.servlet.is_some()
    }

    /// Names of the configured filters, in execution order.
    pub fn filter_names(&self) -> Vec<&str> {
        self.filters.iter().map(|f| f.name()).collect()
    }

    /// Run the next stage of the chain.
    pub fn do_filter(&mut self, request: &ServletRequest, response: &ServletResponse) -> Result<(), ChainError> {
        let Some(executor) = self.executor.clone() else {
            return self.internal_do_filter(request, response);
        };
        executor
            .run_privileged("doFilter", request.user_principal(), &mut || {
                self.internal_do_filter(request, response)
            })
            .map_err(classify_privileged)
    }

    fn internal_do_filter(&mut self, request: &ServletRequest, response: &ServletResponse) -> Result<(), ChainError> {
        if self.pos < self.filters.len() {
            let config = Arc::clone(&self.filters[self.pos]);
            self.pos += 1;
            return self
                .invoke_filter(&config, request, response)
                .map_err(|err| classify(err, Stage::Filter));
        }

        self.invoke_servlet(request, response)
            .map_err(|err| classify(err, Stage::Servlet))
    }

    fn invoke_filter(
        &mut self,
        config: &FilterConfig,
        request: &ServletRequest,
        response: &ServletResponse,
    ) -> Result<(), ChainError> {
        let filter = config.filter()?;

        if request.is_async_supported() && config.declares_no_async() {
            tracing::debug!(filter = %config.name(), request_id = %request.id(), "Async support disabled by filter");
            request.set_async_supported(false);
        }

        metrics::record_filter_invocation(config.name());
        match self.executor.clone() {
            Some(executor) => executor.run_privileged("doFilter", request.user_principal(), &mut || {
                filter.do_filter(request, response, self)
            }),
            None => filter.do_filter(request, response, self),
        }
    }

    fn invoke_servlet(&mut self, request: &ServletRequest, response: &ServletResponse) -> Result<(), ChainError> {
        let servlet = self
            .servlet
            .clone()
            .ok_or_else(|| ChainError::runtime("filter chain has no servlet configured"))?;

        let _serviced = self
            .track_last_serviced
            .then(|| ServicedGuard::enter(request, response));

        if request.is_async_supported() && !self.servlet_supports_async {
            request.set_async_supported(false);
        }

        metrics::record_servlet_invocation();
        match &self.executor {
            Some(executor) => executor.run_privileged("service", request.user_principal(), &mut || {
                servlet.service(request, response)
            }),
            None => servlet.service(request, response),
        }
    }

    /// Rewind the cursor without touching the configured filters or servlet.
    pub fn reuse(&mut self) {
        self.pos = 0;
    }

    /// Clear every slot, the servlet and the counters.
    pub fn release(&mut self) {
        self.filters.clear();
        self.pos = 0;
        self.servlet = None;
        self.servlet_supports_async = false;
    }

    /// Implementation classes of configured filters that explicitly declare
    /// no async support.
    pub fn non_async_filters(&self) -> HashSet<String> {
        let mut result = HashSet::new();
        self.find_non_async_filters(&mut result);
        result
    }

    /// Add the classes reported by [`non_async_filters`](Self::non_async_filters) to `result`.
    pub fn find_non_async_filters(&self, result: &mut HashSet<String>) {
        result.extend(
            self.filters
                .iter()
                .filter(|f| f.declares_no_async())
                .map(|f| f.class().to_string()),
        );
    }
}

impl std::fmt::Debug for FilterChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterChain")
            .field("filters", &self.filter_names())
            .field("pos", &self.pos)
            .field("has_servlet", &self.servlet.is_some())
            .field("servlet_supports_async", &self.servlet_supports_async)
            .field("privileged", &self.executor.is_some())
            .finish()
    }
}
