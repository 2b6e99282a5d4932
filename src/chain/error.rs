//! Failure taxonomy for filter and servlet invocations.
//!
//! # Classification
//! ```text
//! Io        → passed through unchanged
//! Servlet   → passed through unchanged
//! Runtime   → passed through unchanged
//! Fatal     → passed through unchanged, never wrapped
//! Invocation(inner) → unwrapped; Fatal inner passes through, anything else
//!                     is wrapped into Servlet
//! Other     → wrapped into Servlet with the original as source
//! ```
//!
//! Panics are not part of the taxonomy: they unwind through the chain
//! untouched.

use std::io;

/// Boxed error used as the cause of wrapped failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub(crate) const FILTER_FAILURE: &str = "Filter execution threw an exception";
pub(crate) const SERVLET_FAILURE: &str = "Servlet execution threw an exception";

/// Application failure defined by the request-processing protocol.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct ServletException {
    message: String,
    #[source]
    cause: Option<BoxError>,
}

impl ServletException {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            cause: None,
        }
    }

    pub fn with_cause(message: impl Into<String>, cause: impl Into<BoxError>) -> Self {
        Self {
            message: message.into(),
            cause: Some(cause.into()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// The wrapped cause, if any.
    pub fn root_cause(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        self.cause.as_deref()
    }
}

/// Failure raised while running a filter chain.
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    /// Transport failure.
    #[error("I/O failure: {0}")]
    Io(#[from] io::Error),

    /// Application failure.
    #[error(transparent)]
    Servlet(#[from] ServletException),

    /// Unchecked failure such as an illegal state.
    #[error("{0}")]
    Runtime(String),

    /// Unrecoverable condition. Never wrapped.
    #[error("fatal: {0}")]
    Fatal(String),

    /// Failure reported through an invocation layer (e.g. a privileged
    /// executor); the inner failure is what the component raised.
    #[error("invocation failed: {0}")]
    Invocation(#[source] Box<ChainError>),

    /// Any other failure.
    #[error("{0}")]
    Other(#[source] BoxError),
}

impl ChainError {
    pub fn servlet(message: impl Into<String>) -> Self {
        ChainError::Servlet(ServletException::new(message))
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        ChainError::Runtime(message.into())
    }

    pub fn other(cause: impl Into<BoxError>) -> Self {
        ChainError::Other(cause.into())
    }

    /// Short label used for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ChainError::Io(_) => "io",
            ChainError::Servlet(_) => "servlet",
            ChainError::Runtime(_) => "runtime",
            ChainError::Fatal(_) => "fatal",
            ChainError::Invocation(_) => "invocation",
            ChainError::Other(_) => "other",
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, ChainError::Fatal(_))
    }

    fn passes_through(&self) -> bool {
        matches!(
            self,
            ChainError::Io(_) | ChainError::Servlet(_) | ChainError::Runtime(_) | ChainError::Fatal(_)
        )
    }
}

/// Where a failure was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Stage {
    Filter,
    Servlet,
}

impl Stage {
    fn message(self) -> &'static str {
        match self {
            Stage::Filter => FILTER_FAILURE,
            Stage::Servlet => SERVLET_FAILURE,
        }
    }
}

/// Classify a failure raised by a filter or servlet invocation.
pub(crate) fn classify(err: ChainError, stage: Stage) -> ChainError {
    if err.passes_through() {
        return err;
    }
    let cause = match err {
        ChainError::Invocation(inner) if inner.is_fatal() => return *inner,
        ChainError::Invocation(inner) => BoxError::from(*inner),
        ChainError::Other(cause) => cause,
        passthrough => return passthrough,
    };
    tracing::debug!(stage = ?stage, error = %cause, "Wrapping unexpected failure");
    ChainError::Servlet(ServletException::with_cause(stage.message(), cause))
}

/// Classify a failure returned by the privileged executor around a whole
/// chain step. Unexpected failures keep their own message.
pub(crate) fn classify_privileged(err: ChainError) -> ChainError {
    let err = match err {
        ChainError::Invocation(inner) => *inner,
        err => err,
    };
    if err.passes_through() {
        return err;
    }
    let message = err.to_string();
    ChainError::Servlet(ServletException::with_cause(message, err))
}
