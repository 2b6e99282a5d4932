//! Filter chain construction.
//!
//! # Responsibilities
//! - Read the dispatcher attributes from the request
//! - Resolve the filter names for the target servlet
//! - Look up each filter's config and populate the chain
//!
//! # Design Decisions
//! - Unknown filter names are logged and skipped, never fatal
//! - The chain may arrive pre-used (pooled); it is released first

use std::sync::Arc;

use crate::chain::filter_chain::FilterChain;
use crate::chain::request::ServletRequest;
use crate::observability::metrics;
use crate::registry::{FilterConfig, Wrapper};
use crate::routing::{resolve, FilterMapping};

/// Source of filter mappings and filter configs for chain construction.
pub trait FilterRegistry {
    /// Filter mappings in configured order.
    fn filter_maps(&self) -> &[FilterMapping];

    /// The config registered under `name`, if any.
    fn find_filter_config(&self, name: &str) -> Option<Arc<FilterConfig>>;
}

/// Populate `chain` with the filters that apply to `request` when it targets
/// the servlet held by `wrapper`.
pub fn populate_chain<R>(chain: &mut FilterChain, registry: &R, request: &ServletRequest, wrapper: &Wrapper)
where
    R: FilterRegistry + ?Sized,
{
    chain.release();
    chain.set_servlet(wrapper.servlet(), wrapper.is_async_supported());

    let mappings = registry.filter_maps();
    if mappings.is_empty() {
        return;
    }

    let dispatch = request.dispatch_state();
    let names = resolve(mappings, dispatch.dispatcher, dispatch.path.as_deref(), Some(wrapper.name()));

    for name in names {
        match registry.find_filter_config(&name) {
            Some(config) => chain.add_filter(config),
            None => {
                tracing::warn!(filter = %name, servlet = %wrapper.name(), "Filter mapping references an undefined filter, skipping");
            }
        }
    }

    tracing::debug!(
        request_id = %request.id(),
        dispatcher = %dispatch.dispatcher,
        path = ?dispatch.path,
        servlet = %wrapper.name(),
        filters = ?chain.filter_names(),
        "Filter chain built"
    );
    metrics::record_chain_built(chain.len());
}
