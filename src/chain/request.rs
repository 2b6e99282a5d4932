//! Servlet request and response handles.
//!
//! # Responsibilities
//! - Carry the transport-neutral view of one request through the chain
//! - Hold request-associated state that outlives any single chain object
//!   (dispatcher attributes, async support, attributes)
//! - Collect the response produced by filters and the servlet
//!
//! # Design Decisions
//! - Handles are cheap `Arc` clones; identity is pointer identity
//! - Interior mutability so filters and servlets work through `&` handles
//! - The async-support flag lives here, not on the chain: the chain may be
//!   released before anyone asks whether the request may stay suspended

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU16, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError, Weak};

use dashmap::DashMap;

use crate::chain::error::ChainError;
use crate::container::Pipeline;
use crate::routing::DispatcherType;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Dispatcher attributes describing how the request reached the current stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchState {
    pub dispatcher: DispatcherType,
    /// Context-relative path used for filter URL matching. Absent for named
    /// dispatches.
    pub path: Option<String>,
}

struct RequestInner {
    id: String,
    method: String,
    path: String,
    query: Option<String>,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
    principal: Option<String>,
    dispatch: Mutex<DispatchState>,
    async_supported: AtomicBool,
    async_started: AtomicBool,
    dispatch_depth: AtomicUsize,
    non_async_components: Mutex<Vec<String>>,
    attributes: DashMap<String, String>,
    pipeline: OnceLock<Weak<Pipeline>>,
}

/// Shared handle to a request being processed.
#[derive(Clone)]
pub struct ServletRequest {
    inner: Arc<RequestInner>,
}

impl ServletRequest {
    pub fn builder(method: impl Into<String>, uri: impl AsRef<str>) -> RequestBuilder {
        RequestBuilder::new(method, uri)
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn method(&self) -> &str {
        &self.inner.method
    }

    /// Context-relative request path, without the query string.
    pub fn path(&self) -> &str {
        &self.inner.path
    }

    pub fn query(&self) -> Option<&str> {
        self.inner.query.as_deref()
    }

    /// First header value with the given name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.inner
            .headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.inner.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.inner.body
    }

    pub fn user_principal(&self) -> Option<&str> {
        self.inner.principal.as_deref()
    }

    pub fn dispatcher_type(&self) -> DispatcherType {
        lock(&self.inner.dispatch).dispatcher
    }

    pub fn dispatch_path(&self) -> Option<String> {
        lock(&self.inner.dispatch).path.clone()
    }

    pub fn dispatch_state(&self) -> DispatchState {
        lock(&self.inner.dispatch).clone()
    }

    /// Replace the dispatcher attributes, returning the previous ones so the
    /// caller can restore them when the dispatch returns.
    pub fn replace_dispatch(&self, state: DispatchState) -> DispatchState {
        std::mem::replace(&mut *lock(&self.inner.dispatch), state)
    }

    /// Number of internal dispatches currently nested on this request.
    pub fn dispatch_depth(&self) -> usize {
        self.inner.dispatch_depth.load(Ordering::Acquire)
    }

    /// Enter an internal dispatch, returning the new nesting depth. Every call
    /// is paired with [`leave_dispatch`](Self::leave_dispatch).
    pub(crate) fn enter_dispatch(&self) -> usize {
        self.inner.dispatch_depth.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub(crate) fn leave_dispatch(&self) {
        self.inner.dispatch_depth.fetch_sub(1, Ordering::AcqRel);
    }

    pub fn is_async_supported(&self) -> bool {
        self.inner.async_supported.load(Ordering::Acquire)
    }

    pub fn set_async_supported(&self, supported: bool) {
        self.inner.async_supported.store(supported, Ordering::Release);
    }

    /// Request that the transport keep this request open after the current
    /// traversal returns.
    ///
    /// Fails if a component in the processing chain does not support
    /// asynchronous continuation.
    pub fn start_async(&self) -> Result<(), ChainError> {
        if !self.is_async_supported() {
            let components = lock(&self.inner.non_async_components).join(", ");
            return Err(ChainError::runtime(format!(
                "Unable to start async because the following components in the processing chain do not support async: [{components}]"
            )));
        }
        self.inner.async_started.store(true, Ordering::Release);
        Ok(())
    }

    pub fn is_async_started(&self) -> bool {
        self.inner.async_started.load(Ordering::Acquire)
    }

    /// Clear the async-started flag, returning whether it was set.
    pub fn take_async_started(&self) -> bool {
        self.inner.async_started.swap(false, Ordering::AcqRel)
    }

    /// Record the components of the current chain lacking async support,
    /// reported by [`start_async`](Self::start_async) on refusal.
    pub fn set_non_async_components(&self, components: Vec<String>) {
        *lock(&self.inner.non_async_components) = components;
    }

    pub fn attribute(&self, name: &str) -> Option<String> {
        self.inner.attributes.get(name).map(|v| v.value().clone())
    }

    pub fn set_attribute(&self, name: impl Into<String>, value: impl Into<String>) {
        self.inner.attributes.insert(name.into(), value.into());
    }

    pub fn remove_attribute(&self, name: &str) -> Option<String> {
        self.inner.attributes.remove(name).map(|(_, v)| v)
    }

    /// The pipeline servicing this request, for internal dispatches.
    pub fn pipeline(&self) -> Option<Arc<Pipeline>> {
        self.inner.pipeline.get().and_then(Weak::upgrade)
    }

    pub(crate) fn attach_pipeline(&self, pipeline: Weak<Pipeline>) {
        let _ = self.inner.pipeline.set(pipeline);
    }

    /// True if both handles refer to the same request.
    pub fn ptr_eq(a: &ServletRequest, b: &ServletRequest) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }
}

impl std::fmt::Debug for ServletRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServletRequest")
            .field("id", &self.inner.id)
            .field("method", &self.inner.method)
            .field("path", &self.inner.path)
            .field("dispatch", &self.dispatch_state())
            .finish()
    }
}

/// Builder for [`ServletRequest`].
pub struct RequestBuilder {
    id: Option<String>,
    method: String,
    path: String,
    query: Option<String>,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
    principal: Option<String>,
    async_supported: bool,
}

impl RequestBuilder {
    fn new(method: impl Into<String>, uri: impl AsRef<str>) -> Self {
        let (path, query) = match uri.as_ref().split_once('?') {
            Some((path, query)) => (path.to_string(), Some(query.to_string())),
            None => (uri.as_ref().to_string(), None),
        };
        Self {
            id: None,
            method: method.into(),
            path,
            query,
            headers: Vec::new(),
            body: Vec::new(),
            principal: None,
            async_supported: false,
        }
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn principal(mut self, principal: impl Into<String>) -> Self {
        self.principal = Some(principal.into());
        self
    }

    /// Whether the platform can keep this request suspended.
    pub fn async_supported(mut self, supported: bool) -> Self {
        self.async_supported = supported;
        self
    }

    pub fn build(self) -> ServletRequest {
        let dispatch = DispatchState {
            dispatcher: DispatcherType::Request,
            path: Some(self.path.clone()),
        };
        ServletRequest {
            inner: Arc::new(RequestInner {
                id: self.id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
                method: self.method,
                path: self.path,
                query: self.query,
                headers: self.headers,
                body: self.body,
                principal: self.principal,
                dispatch: Mutex::new(dispatch),
                async_supported: AtomicBool::new(self.async_supported),
                async_started: AtomicBool::new(false),
                dispatch_depth: AtomicUsize::new(0),
                non_async_components: Mutex::new(Vec::new()),
                attributes: DashMap::new(),
                pipeline: OnceLock::new(),
            }),
        }
    }
}

struct ResponseInner {
    status: AtomicU16,
    headers: Mutex<Vec<(String, String)>>,
    body: Mutex<Vec<u8>>,
}

/// Shared handle to the response being produced.
#[derive(Clone)]
pub struct ServletResponse {
    inner: Arc<ResponseInner>,
}

impl ServletResponse {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ResponseInner {
                status: AtomicU16::new(200),
                headers: Mutex::new(Vec::new()),
                body: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn status(&self) -> u16 {
        self.inner.status.load(Ordering::Acquire)
    }

    pub fn set_status(&self, status: u16) {
        self.inner.status.store(status, Ordering::Release);
    }

    /// Set a header, replacing existing values with the same name.
    pub fn set_header(&self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let mut headers = lock(&self.inner.headers);
        headers.retain(|(k, _)| !k.eq_ignore_ascii_case(&name));
        headers.push((name, value.into()));
    }

    pub fn add_header(&self, name: impl Into<String>, value: impl Into<String>) {
        lock(&self.inner.headers).push((name.into(), value.into()));
    }

    pub fn header(&self, name: &str) -> Option<String> {
        lock(&self.inner.headers)
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.clone())
    }

    pub fn headers(&self) -> Vec<(String, String)> {
        lock(&self.inner.headers).clone()
    }

    pub fn write(&self, bytes: &[u8]) -> io::Result<()> {
        lock(&self.inner.body).extend_from_slice(bytes);
        Ok(())
    }

    pub fn write_str(&self, text: &str) -> io::Result<()> {
        self.write(text.as_bytes())
    }

    pub fn body(&self) -> Vec<u8> {
        lock(&self.inner.body).clone()
    }

    /// Discard buffered output, keeping status and headers.
    pub fn reset_buffer(&self) {
        lock(&self.inner.body).clear();
    }

    /// Take the buffered body, leaving it empty.
    pub fn take_body(&self) -> Vec<u8> {
        std::mem::take(&mut *lock(&self.inner.body))
    }

    /// True if both handles refer to the same response.
    pub fn ptr_eq(a: &ServletResponse, b: &ServletResponse) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }
}

impl Default for ServletResponse {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ServletResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServletResponse")
            .field("status", &self.status())
            .finish()
    }
}

/// Query string parsed into key/value pairs. Later keys win.
pub fn parse_query(query: &str) -> HashMap<String, String> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => (k.to_string(), v.to_string()),
            None => (pair.to_string(), String::new()),
        })
        .collect()
}
