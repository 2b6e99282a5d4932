//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the pipeline handler
//! - Wire up middleware (tracing, timeout)
//! - Bind server to listener
//! - Run each request through the pipeline on a blocking worker
//! - Apply configuration updates to the running pipeline

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    response::Response,
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::chain::ServletResponse;
use crate::config::PipelineConfig;
use crate::container::{Pipeline, ServiceError};
use crate::http::request::{request_id, to_servlet_request};
use crate::http::response::{error_response, from_servlet_response};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub max_body_bytes: usize,
}

/// HTTP front end for a [`Pipeline`].
pub struct HttpServer {
    router: Router,
    config: PipelineConfig,
    pipeline: Arc<Pipeline>,
}

impl HttpServer {
    /// Create a new HTTP server serving `pipeline`.
    pub fn new(config: PipelineConfig, pipeline: Arc<Pipeline>) -> Self {
        let state = AppState {
            pipeline: Arc::clone(&pipeline),
            max_body_bytes: config.listener.max_body_bytes,
        };
        let router = Self::build_router(&config, state);
        Self {
            router,
            config,
            pipeline,
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &PipelineConfig, state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(pipeline_handler))
            .route("/", any(pipeline_handler))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs))),
            )
    }

    /// Run the server until `shutdown` fires, reloading the pipeline from
    /// every configuration received on `config_updates`.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<PipelineConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let pipeline = Arc::clone(&self.pipeline);
        let reloader = tokio::spawn(async move {
            while let Some(config) = config_updates.recv().await {
                if let Err(e) = pipeline.reload(&config) {
                    tracing::error!(error = %e, "Rejected configuration update, keeping current pipeline");
                }
            }
        });

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        reloader.abort();
        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn pipeline(&self) -> &Arc<Pipeline> {
        &self.pipeline
    }
}

/// Runs every request through the pipeline.
async fn pipeline_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let request_id = request_id(&request);
    let servlet_request = match to_servlet_request(request, &request_id, state.max_body_bytes).await {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!(request_id = %request_id, error = %e, "Rejected request");
            return error_response(e.status(), &e.to_string(), &request_id);
        }
    };
    tracing::debug!(
        request_id = %request_id,
        method = %servlet_request.method(),
        path = %servlet_request.path(),
        "Servicing request"
    );

    // The chain and the last-serviced record belong to one worker thread for
    // the whole traversal.
    let servlet_response = ServletResponse::new();
    let outcome = tokio::task::spawn_blocking({
        let pipeline = state.pipeline;
        let request = servlet_request.clone();
        let response = servlet_response.clone();
        move || pipeline.service(&request, &response)
    })
    .await;

    match outcome {
        Ok(Ok(())) => from_servlet_response(&servlet_response, &request_id),
        Ok(Err(ServiceError::NotFound(path))) => {
            tracing::debug!(request_id = %request_id, path = %path, "No servlet mapped");
            error_response(StatusCode::NOT_FOUND, "No servlet mapped for path", &request_id)
        }
        Ok(Err(ServiceError::Chain(e))) => {
            tracing::error!(request_id = %request_id, kind = e.kind(), error = %e, "Filter chain failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error", &request_id)
        }
        Err(e) => {
            tracing::error!(request_id = %request_id, error = %e, "Pipeline worker panicked");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error", &request_id)
        }
    }
}
