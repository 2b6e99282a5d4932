//! HTTP request adaptation.
//!
//! # Responsibilities
//! - Take the request ID from `x-request-id` or generate one (UUID v4)
//! - Read the body within the configured size limit, telling an oversized
//!   body (413) apart from a broken one (400)
//! - Build the transport-neutral [`ServletRequest`]
//!
//! # Design Decisions
//! - Request ID assigned before anything else so every log line carries it
//! - Headers that are not valid UTF-8 are dropped

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::LengthLimitError;

use crate::chain::ServletRequest;

pub const X_REQUEST_ID: &str = "x-request-id";

/// Request ID carried by `request`, or a fresh one.
pub fn request_id<B>(request: &Request<B>) -> String {
    request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

/// Failure turning an HTTP request into a servlet request.
#[derive(Debug, thiserror::Error)]
pub enum AdaptError {
    #[error("request body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },

    #[error("failed to read request body: {0}")]
    Body(#[source] axum::Error),
}

impl AdaptError {
    fn from_body_error(err: axum::Error, limit: usize) -> Self {
        let mut source: Option<&(dyn std::error::Error + 'static)> = Some(&err);
        while let Some(e) = source {
            if e.is::<LengthLimitError>() {
                return AdaptError::BodyTooLarge { limit };
            }
            source = e.source();
        }
        AdaptError::Body(err)
    }

    /// Status answered to the client for this failure.
    pub fn status(&self) -> StatusCode {
        match self {
            AdaptError::BodyTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            AdaptError::Body(_) => StatusCode::BAD_REQUEST,
        }
    }
}

/// Convert `request` into a [`ServletRequest`] that may be suspended
/// asynchronously.
pub async fn to_servlet_request(
    request: Request<Body>,
    request_id: &str,
    max_body_bytes: usize,
) -> Result<ServletRequest, AdaptError> {
    let (parts, body) = request.into_parts();
    let body = axum::body::to_bytes(body, max_body_bytes)
        .await
        .map_err(|e| AdaptError::from_body_error(e, max_body_bytes))?;

    let uri = parts.uri.path_and_query().map_or("/", |pq| pq.as_str());
    let builder = ServletRequest::builder(parts.method.as_str(), uri)
        .id(request_id)
        .body(body.to_vec())
        .async_supported(true);

    let builder = parts
        .headers
        .iter()
        .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str(), v)))
        .fold(builder, |b, (name, value)| b.header(name, value));

    Ok(builder.build())
}
