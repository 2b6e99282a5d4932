//! Filter chain execution subsystem.
//!
//! # Data Flow
//! ```text
//! ServletRequest (dispatcher type, dispatch path)
//!     → factory.rs (resolve filter names, look up configs)
//!     → filter_chain.rs (populated FilterChain)
//!     → do_filter → filter.rs (Filter::do_filter, chain as continuation)
//!                 → ... → Servlet::service
//!     → error.rs (classify failures)
//!
//! Around the servlet call:
//!     serviced.rs (worker-local last-serviced record)
//! Around every invocation:
//!     privileged.rs (optional executor)
//! ```
//!
//! # Design Decisions
//! - Single pass, single attempt: no retries, no timeouts
//! - Chain objects are reusable and poolable, never shared concurrently

pub mod error;
pub mod factory;
pub mod filter;
pub mod filter_chain;
pub mod privileged;
pub mod request;
pub mod serviced;

pub use error::{BoxError, ChainError, ServletException};
pub use factory::{populate_chain, FilterRegistry};
pub use filter::{Filter, Servlet};
pub use filter_chain::{FilterChain, INCREMENT};
pub use privileged::{DirectExecutor, PrivilegedExecutor, SpanExecutor};
pub use request::{DispatchState, ServletRequest, ServletResponse};
pub use serviced::{last_serviced_request, last_serviced_response};
