//! Servlet-style filter pipeline library.

pub mod chain;
pub mod components;
pub mod config;
pub mod container;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod registry;
pub mod routing;

pub use chain::{ChainError, Filter, FilterChain, Servlet, ServletRequest, ServletResponse};
pub use config::schema::PipelineConfig;
pub use container::Pipeline;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
