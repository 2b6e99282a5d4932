//! Privileged execution hook.
//!
//! The chain runs every filter and servlet invocation through an optional
//! [`PrivilegedExecutor`]. Without one, invocations run directly.

use crate::chain::error::ChainError;

/// A unit of work run under a privileged context.
pub type PrivilegedAction<'a> = dyn FnMut() -> Result<(), ChainError> + 'a;

/// Runs an action under an optional privileged or security context.
pub trait PrivilegedExecutor: Send + Sync {
    /// Run `action` as `operation` on behalf of `principal`.
    ///
    /// Implementations may report failures of `action` wrapped in
    /// [`ChainError::Invocation`]; the chain unwraps them.
    fn run_privileged(
        &self,
        operation: &str,
        principal: Option<&str>,
        action: &mut PrivilegedAction<'_>,
    ) -> Result<(), ChainError>;
}

/// Runs actions directly on the calling worker.
#[derive(Debug, Default, Clone, Copy)]
pub struct DirectExecutor;

impl PrivilegedExecutor for DirectExecutor {
    fn run_privileged(
        &self,
        _operation: &str,
        _principal: Option<&str>,
        action: &mut PrivilegedAction<'_>,
    ) -> Result<(), ChainError> {
        action()
    }
}

/// Runs actions inside a `privileged` tracing span and reports unexpected
/// failures through the invocation layer.
#[derive(Debug, Default, Clone, Copy)]
pub struct SpanExecutor;

impl PrivilegedExecutor for SpanExecutor {
    fn run_privileged(
        &self,
        operation: &str,
        principal: Option<&str>,
        action: &mut PrivilegedAction<'_>,
    ) -> Result<(), ChainError> {
        let span = tracing::debug_span!("privileged", operation, principal = principal.unwrap_or("-"));
        let _entered = span.enter();
        action().map_err(|err| match err {
            ChainError::Other(_) => ChainError::Invocation(Box::new(err)),
            err => err,
        })
    }
}
