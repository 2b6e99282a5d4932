//! Filter and servlet contracts.

use crate::chain::error::ChainError;
use crate::chain::filter_chain::FilterChain;
use crate::chain::request::{ServletRequest, ServletResponse};

/// A pluggable unit that runs before the servlet.
///
/// The filter receives the chain itself as its continuation: calling
/// [`FilterChain::do_filter`] runs the next stage, returning without calling
/// it short-circuits the rest of the chain.
pub trait Filter: Send + Sync {
    fn do_filter(
        &self,
        request: &ServletRequest,
        response: &ServletResponse,
        chain: &mut FilterChain,
    ) -> Result<(), ChainError>;

    /// Called once when the owning registry is retired.
    fn destroy(&self) {}
}

/// The terminal handler invoked once every filter has run.
pub trait Servlet: Send + Sync {
    fn service(&self, request: &ServletRequest, response: &ServletResponse) -> Result<(), ChainError>;

    /// Called once when the owning registry is retired.
    fn destroy(&self) {}
}
