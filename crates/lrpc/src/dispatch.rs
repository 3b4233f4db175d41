//! Resolves one inbound call end-to-end.

use std::sync::Arc;

use serde_json::value::RawValue;
use tracing::{debug, Span};

use crate::envelope::{RequestEnvelope, ResponseEnvelope};
use crate::error::{LrpcError, Result};
use crate::registry::{Invocation, Registry};

/// Outcome of a call that reached its handler.
#[derive(Debug)]
pub enum Outcome {
    /// The handler succeeded; send this envelope.
    Success(ResponseEnvelope<Box<RawValue>>),
    /// The handler returned an error. Its response value is discarded.
    Failed { message: String },
}

/// Routes raw calls to handlers in a frozen [`Registry`].
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<Registry>,
    span: Span,
}

impl Dispatcher {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            span: Span::current(),
        }
    }

    /// Attach per-call tracing to `span`.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Dispatch a call to `path` with the raw request envelope `raw_body`.
    ///
    /// Returns an error only for transport failures: unknown path, malformed
    /// envelope or body, or an unencodable response. Handler failures are
    /// reported as [`Outcome::Failed`].
    pub fn dispatch(&self, path: &str, raw_body: &[u8]) -> Result<Outcome> {
        let handler = self
            .registry
            .get(path)
            .ok_or_else(|| LrpcError::NoSuchHandler {
                path: path.to_string(),
            })?;

        let envelope: RequestEnvelope =
            serde_json::from_slice(raw_body).map_err(LrpcError::Decode)?;

        debug!(parent: &self.span, "request handle call: {} {}", path, handler.name());

        match handler.invoke(&envelope.body)? {
            Invocation::Reply(body) => Ok(Outcome::Success(ResponseEnvelope::success(body))),
            Invocation::Failed(message) => {
                debug!(parent: &self.span, "{} failed: {}", handler.name(), message);
                Ok(Outcome::Failed { message })
            }
        }
    }
}
