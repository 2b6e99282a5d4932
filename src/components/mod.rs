//! Built-in filters and servlets.

pub mod filters;
pub mod servlets;

use std::sync::Arc;

use crate::chain::{Filter, Servlet};
use crate::registry::ComponentFactory;

/// Register every built-in component with `factory`.
pub fn register_builtins(factory: &mut ComponentFactory) {
    factory
        .register_filter("request-log", |_| Ok(Arc::new(filters::RequestLogFilter) as Arc<dyn Filter>))
        .register_filter("response-header", |def| {
            Ok(Arc::new(filters::ResponseHeaderFilter::from_def(def)?) as Arc<dyn Filter>)
        })
        .register_filter("require-header", |def| {
            Ok(Arc::new(filters::RequireHeaderFilter::from_def(def)?) as Arc<dyn Filter>)
        });

    factory
        .register_servlet("echo", |_| Ok(Arc::new(servlets::EchoServlet) as Arc<dyn Servlet>))
        .register_servlet("static-text", |config| {
            Ok(Arc::new(servlets::StaticTextServlet::from_config(config)?) as Arc<dyn Servlet>)
        })
        .register_servlet("forwarding", |config| {
            Ok(Arc::new(servlets::ForwardingServlet::from_config(config)?) as Arc<dyn Servlet>)
        })
        .register_servlet("async-echo", |_| Ok(Arc::new(servlets::AsyncEchoServlet) as Arc<dyn Servlet>));
}
