//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use filter_pipeline::chain::{last_serviced_request, ChainError, Servlet, ServletRequest, ServletResponse};
use filter_pipeline::config::loader::parse_config;
use filter_pipeline::config::PipelineConfig;
use filter_pipeline::container::Pipeline;
use filter_pipeline::http::HttpServer;
use filter_pipeline::lifecycle::Shutdown;
use filter_pipeline::registry::ComponentFactory;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

/// Always fails with an error outside the known failure kinds.
pub struct FailingServlet;

impl Servlet for FailingServlet {
    fn service(&self, _: &ServletRequest, _: &ServletResponse) -> Result<(), ChainError> {
        Err(ChainError::other("backend exploded"))
    }
}

/// Reports whether the worker-local record points at the current request.
pub struct TrackingServlet;

impl Servlet for TrackingServlet {
    fn service(&self, request: &ServletRequest, response: &ServletResponse) -> Result<(), ChainError> {
        let tracked = last_serviced_request().is_some_and(|r| ServletRequest::ptr_eq(&r, request));
        response.write_str(&format!("tracked={tracked}"))?;
        Ok(())
    }
}

/// Built-in components plus the test servlets above.
pub fn components() -> ComponentFactory {
    let mut factory = ComponentFactory::with_builtins();
    factory
        .register_servlet("failing", |_| Ok(Arc::new(FailingServlet) as Arc<dyn Servlet>))
        .register_servlet("tracking", |_| Ok(Arc::new(TrackingServlet) as Arc<dyn Servlet>));
    factory
}

pub fn config(toml: &str) -> PipelineConfig {
    parse_config(toml).unwrap()
}

pub fn pipeline(toml: &str) -> Arc<Pipeline> {
    Pipeline::from_config(&config(toml), components()).unwrap()
}

/// Run `request` through `pipeline`, returning the response.
pub fn service(pipeline: &Arc<Pipeline>, request: &ServletRequest) -> ServletResponse {
    let response = ServletResponse::new();
    pipeline.service(request, &response).unwrap();
    response
}

pub fn body(response: &ServletResponse) -> String {
    String::from_utf8(response.body()).unwrap()
}

/// A running HTTP server on an ephemeral port.
#[allow(dead_code)]
pub struct TestServer {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub config_updates: mpsc::UnboundedSender<PipelineConfig>,
    pub handle: tokio::task::JoinHandle<Result<(), std::io::Error>>,
}

#[allow(dead_code)]
impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Start an HTTP server for `toml` and wait until it accepts connections.
#[allow(dead_code)]
pub async fn start_server(toml: &str) -> TestServer {
    let config = config(toml);
    let pipeline = Pipeline::from_config(&config, components()).unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let (config_updates, updates_rx) = mpsc::unbounded_channel();
    let server = HttpServer::new(config, pipeline);
    let server_shutdown = shutdown.subscribe();
    let handle = tokio::spawn(async move { server.run(listener, updates_rx, server_shutdown).await });

    tokio::time::sleep(Duration::from_millis(100)).await;

    TestServer {
        addr,
        shutdown,
        config_updates,
        handle,
    }
}

#[allow(dead_code)]
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
