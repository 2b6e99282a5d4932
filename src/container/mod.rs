//! Servicing container.
//!
//! # Data Flow
//! ```text
//! Transport (http::server, tests)
//!     → pipeline.rs (servlet mapping, REQUEST / ASYNC / internal dispatch)
//!     → pool.rs (idle chains per servlet)
//!     → chain (populate + do_filter)
//!
//! Config reload:
//!     PipelineConfig → Registry::from_config → ArcSwap::store
//! ```

pub mod pipeline;
pub mod pool;

pub use pipeline::{DispatchTarget, Pipeline, PipelineOptions, ServiceError};
pub use pool::ChainPool;
