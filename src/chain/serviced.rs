//! Worker-local record of the request/response handed to the servlet.
//!
//! # Design Decisions
//! - One slot per worker thread (`thread_local!`), never a shared cell
//! - Set immediately before the servlet runs, cleared by a drop guard so
//!   every exit path clears it, unwinding included
//! - Nested dispatches clear the record on return; the outer servlet does
//!   not see it restored

use std::cell::RefCell;

use crate::chain::request::{ServletRequest, ServletResponse};

thread_local! {
    static LAST_SERVICED: RefCell<Option<(ServletRequest, ServletResponse)>> =
        const { RefCell::new(None) };
}

/// The request currently being serviced on this worker, if tracking is
/// enabled and a servlet is running.
pub fn last_serviced_request() -> Option<ServletRequest> {
    LAST_SERVICED.with(|slot| slot.borrow().as_ref().map(|(req, _)| req.clone()))
}

/// The response currently being serviced on this worker, if tracking is
/// enabled and a servlet is running.
pub fn last_serviced_response() -> Option<ServletResponse> {
    LAST_SERVICED.with(|slot| slot.borrow().as_ref().map(|(_, res)| res.clone()))
}

/// Holds the record for the duration of one servlet invocation.
pub(crate) struct ServicedGuard {
    _private: (),
}

impl ServicedGuard {
    pub(crate) fn enter(request: &ServletRequest, response: &ServletResponse) -> Self {
        LAST_SERVICED.with(|slot| {
            *slot.borrow_mut() = Some((request.clone(), response.clone()));
        });
        Self { _private: () }
    }
}

impl Drop for ServicedGuard {
    fn drop(&mut self) {
        // try_with: the thread-local may already be gone during thread exit.
        let _ = LAST_SERVICED.try_with(|slot| slot.borrow_mut().take());
    }
}
