//! HTTP response adaptation.
//!
//! # Responsibilities
//! - Convert the [`ServletResponse`] into an axum response
//! - Echo the request ID on every response
//!
//! # Design Decisions
//! - Invalid status codes become 500; invalid header names or values are dropped

use axum::body::Body;
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::chain::ServletResponse;
use crate::http::request::X_REQUEST_ID;

/// Build the HTTP response for a completed traversal.
pub fn from_servlet_response(response: &ServletResponse, request_id: &str) -> Response {
    let status = StatusCode::from_u16(response.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut http = Response::new(Body::from(response.take_body()));
    *http.status_mut() = status;

    let headers = http.headers_mut();
    for (name, value) in response.headers() {
        if let (Ok(name), Ok(value)) = (HeaderName::try_from(name.as_str()), HeaderValue::from_str(&value)) {
            headers.append(name, value);
        }
    }
    with_request_id(http, request_id)
}

/// Plain-text error response.
pub fn error_response(status: StatusCode, message: &str, request_id: &str) -> Response {
    with_request_id((status, message.to_string()).into_response(), request_id)
}

fn with_request_id(mut response: Response, request_id: &str) -> Response {
    if let Ok(value) = HeaderValue::from_str(request_id) {
        response.headers_mut().insert(X_REQUEST_ID, value);
    }
    response
}
