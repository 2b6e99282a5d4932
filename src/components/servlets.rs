//! Built-in servlets.

use crate::chain::{ChainError, Servlet, ServletRequest, ServletResponse};
use crate::config::schema::ServletConfig;
use crate::container::DispatchTarget;
use crate::routing::DispatcherType;

/// Writes the request line, dispatcher type and body back.
pub struct EchoServlet;

impl Servlet for EchoServlet {
    fn service(&self, request: &ServletRequest, response: &ServletResponse) -> Result<(), ChainError> {
        response.set_header("content-type", "text/plain");
        response.write_str(&format!(
            "{} {} dispatcher={}\n",
            request.method(),
            request.path(),
            request.dispatcher_type()
        ))?;
        response.write(request.body())?;
        Ok(())
    }
}

/// Serves a fixed body.
///
/// Init parameters: `body`, `content_type` (default `text/plain`), `status`
/// (default 200).
pub struct StaticTextServlet {
    body: String,
    content_type: String,
    status: u16,
}

impl StaticTextServlet {
    pub fn from_config(config: &ServletConfig) -> Result<Self, ChainError> {
        let status = match config.init_params.get("status") {
            Some(s) => s
                .parse()
                .map_err(|_| ChainError::servlet(format!("servlet '{}': invalid status '{}'", config.name, s)))?,
            None => 200,
        };
        Ok(Self {
            body: config.init_params.get("body").cloned().unwrap_or_default(),
            content_type: config
                .init_params
                .get("content_type")
                .cloned()
                .unwrap_or_else(|| "text/plain".to_string()),
            status,
        })
    }
}

impl Servlet for StaticTextServlet {
    fn service(&self, _request: &ServletRequest, response: &ServletResponse) -> Result<(), ChainError> {
        response.set_status(self.status);
        response.set_header("content-type", self.content_type.as_str());
        response.write_str(&self.body)?;
        Ok(())
    }
}

/// Forwards to, or includes, another path through the pipeline.
///
/// Init parameters: `target` (required), `mode` (`forward` or `include`,
/// default `forward`).
pub struct ForwardingServlet {
    target: String,
    dispatcher: DispatcherType,
}

impl ForwardingServlet {
    pub fn from_config(config: &ServletConfig) -> Result<Self, ChainError> {
        let target = config
            .init_params
            .get("target")
            .cloned()
            .ok_or_else(|| ChainError::servlet(format!("servlet '{}' requires init parameter 'target'", config.name)))?;
        let dispatcher = match config.init_params.get("mode").map(String::as_str) {
            None | Some("forward") => DispatcherType::Forward,
            Some("include") => DispatcherType::Include,
            Some(other) => {
                return Err(ChainError::servlet(format!(
                    "servlet '{}': unknown mode '{}'",
                    config.name, other
                )))
            }
        };
        Ok(Self { target, dispatcher })
    }
}

impl Servlet for ForwardingServlet {
    fn service(&self, request: &ServletRequest, response: &ServletResponse) -> Result<(), ChainError> {
        let pipeline = request
            .pipeline()
            .ok_or_else(|| ChainError::runtime("request is not attached to a pipeline"))?;
        if self.dispatcher == DispatcherType::Forward {
            response.reset_buffer();
        }
        pipeline.dispatch(
            request,
            response,
            self.dispatcher,
            DispatchTarget::Path(self.target.clone()),
        )
    }
}

/// Suspends on the initial dispatch and answers on the async resumption.
pub struct AsyncEchoServlet;

impl Servlet for AsyncEchoServlet {
    fn service(&self, request: &ServletRequest, response: &ServletResponse) -> Result<(), ChainError> {
        match request.dispatcher_type() {
            DispatcherType::Async => {
                response.set_header("content-type", "text/plain");
                response.write_str(&format!("resumed {}\n", request.path()))?;
                Ok(())
            }
            _ => request.start_async(),
        }
    }
}
