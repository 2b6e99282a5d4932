//! Built-in filters.

use std::time::Instant;

use crate::chain::{ChainError, Filter, FilterChain, ServletRequest, ServletResponse};
use crate::registry::FilterDef;

fn required_param<'a>(def: &'a FilterDef, name: &str) -> Result<&'a str, ChainError> {
    def.param(name).ok_or_else(|| {
        ChainError::servlet(format!(
            "filter '{}' ({}) requires init parameter '{}'",
            def.name, def.class, name
        ))
    })
}

/// Logs each traversal with its outcome and latency.
pub struct RequestLogFilter;

impl Filter for RequestLogFilter {
    fn do_filter(
        &self,
        request: &ServletRequest,
        response: &ServletResponse,
        chain: &mut FilterChain,
    ) -> Result<(), ChainError> {
        let start = Instant::now();
        let result = chain.do_filter(request, response);
        match &result {
            Ok(()) => tracing::info!(
                request_id = %request.id(),
                method = %request.method(),
                path = %request.path(),
                dispatcher = %request.dispatcher_type(),
                status = response.status(),
                elapsed_us = start.elapsed().as_micros() as u64,
                "Request serviced"
            ),
            Err(e) => tracing::warn!(
                request_id = %request.id(),
                method = %request.method(),
                path = %request.path(),
                error = %e,
                "Request failed"
            ),
        }
        result
    }
}

/// Sets a fixed response header, then continues.
///
/// Init parameters: `name`, `value`.
pub struct ResponseHeaderFilter {
    name: String,
    value: String,
}

impl ResponseHeaderFilter {
    pub fn from_def(def: &FilterDef) -> Result<Self, ChainError> {
        Ok(Self {
            name: required_param(def, "name")?.to_string(),
            value: required_param(def, "value")?.to_string(),
        })
    }
}

impl Filter for ResponseHeaderFilter {
    fn do_filter(
        &self,
        request: &ServletRequest,
        response: &ServletResponse,
        chain: &mut FilterChain,
    ) -> Result<(), ChainError> {
        response.set_header(self.name.as_str(), self.value.as_str());
        chain.do_filter(request, response)
    }
}

/// Rejects requests lacking a header, producing the response itself.
///
/// Init parameters: `header` (required), `status` (default 401).
pub struct RequireHeaderFilter {
    header: String,
    status: u16,
}

impl RequireHeaderFilter {
    pub fn from_def(def: &FilterDef) -> Result<Self, ChainError> {
        let status = match def.param("status") {
            Some(s) => s
                .parse()
                .map_err(|_| ChainError::servlet(format!("filter '{}': invalid status '{}'", def.name, s)))?,
            None => 401,
        };
        Ok(Self {
            header: required_param(def, "header")?.to_string(),
            status,
        })
    }
}

impl Filter for RequireHeaderFilter {
    fn do_filter(
        &self,
        request: &ServletRequest,
        response: &ServletResponse,
        chain: &mut FilterChain,
    ) -> Result<(), ChainError> {
        if request.header(&self.header).is_some() {
            return chain.do_filter(request, response);
        }
        tracing::debug!(request_id = %request.id(), header = %self.header, "Required header missing");
        response.set_status(self.status);
        response.set_header("content-type", "text/plain");
        response.write_str(&format!("missing required header: {}\n", self.header))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::Servlet;
    use crate::registry::FilterConfig;
    use std::sync::Arc;

    struct Ok200;

    impl Servlet for Ok200 {
        fn service(&self, _: &ServletRequest, response: &ServletResponse) -> Result<(), ChainError> {
            response.write_str("ok")?;
            Ok(())
        }
    }

    fn run(filter: Arc<dyn Filter>, request: &ServletRequest) -> ServletResponse {
        let config = Arc::new(FilterConfig::with_instance(FilterDef::new("f", "f"), filter));
        let mut chain = FilterChain::new();
        chain.configure([config], Arc::new(Ok200), false);
        let response = ServletResponse::new();
        chain.do_filter(request, &response).unwrap();
        response
    }

    #[test]
    fn test_require_header_short_circuits() {
        let def = FilterDef::new("auth", "require-header").init_param("header", "authorization");
        let filter: Arc<dyn Filter> = Arc::new(RequireHeaderFilter::from_def(&def).unwrap());

        let denied = run(filter.clone(), &ServletRequest::builder("GET", "/").build());
        assert_eq!(denied.status(), 401);
        assert!(String::from_utf8(denied.body()).unwrap().contains("authorization"));

        let allowed = run(
            filter,
            &ServletRequest::builder("GET", "/").header("Authorization", "token").build(),
        );
        assert_eq!(allowed.status(), 200);
        assert_eq!(allowed.body(), b"ok");
    }

    #[test]
    fn test_response_header_requires_params() {
        let err = ResponseHeaderFilter::from_def(&FilterDef::new("h", "response-header").init_param("name", "x"))
            .err()
            .unwrap();
        assert!(err.to_string().contains("'value'"));

        let def = FilterDef::new("h", "response-header")
            .init_param("name", "x-served-by")
            .init_param("value", "pipeline");
        let res = run(
            Arc::new(ResponseHeaderFilter::from_def(&def).unwrap()),
            &ServletRequest::builder("GET", "/").build(),
        );
        assert_eq!(res.header("x-served-by").as_deref(), Some("pipeline"));
    }

    #[test]
    fn test_require_header_custom_status() {
        let def = FilterDef::new("auth", "require-header")
            .init_param("header", "x-key")
            .init_param("status", "403");
        let res = run(
            Arc::new(RequireHeaderFilter::from_def(&def).unwrap()),
            &ServletRequest::builder("GET", "/").build(),
        );
        assert_eq!(res.status(), 403);
    }
}
