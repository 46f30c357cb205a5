//! Request handling: validate, dispatch, invoke, respond.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use serde_json::Value;
use tracing::{Span, debug, error, warn};

use courier_protocol::request::parse_error;
use courier_protocol::{Attribution, Codec, JsonCodec, Request, Response, RpcError};

use crate::args::{Args, Context, MethodError};
use crate::dispatcher::Dispatcher;

/// How an invocation ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success(Value),
    /// A taxonomy error, reported as is.
    Failure(RpcError),
    /// Anything else, reported as a `ServerError` with this text as data.
    Unexpected(String),
}

impl Outcome {
    /// The error this outcome is reported as, if it is not a success.
    pub fn into_result(self) -> Result<Value, RpcError> {
        match self {
            Self::Success(value) => Ok(value),
            Self::Failure(err) => Err(err),
            Self::Unexpected(text) => Err(RpcError::server_error(text)),
        }
    }
}

/// Turns request bytes into response bytes.
///
/// A manager holds no per-call state; `handle` can be awaited from many
/// tasks at once. Dropping a `handle` future cancels the call and no
/// response is produced for it.
pub struct Manager {
    dispatcher: Dispatcher,
    context: Context,
    codec: Arc<dyn Codec>,
}

impl Manager {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher,
            context: Context::default(),
            codec: Arc::new(JsonCodec),
        }
    }

    #[must_use]
    pub fn with_context(mut self, context: Context) -> Self {
        self.context = context;
        self
    }

    #[must_use]
    pub fn with_codec(mut self, codec: Arc<dyn Codec>) -> Self {
        self.codec = codec;
        self
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn codec(&self) -> &dyn Codec {
        self.codec.as_ref()
    }

    /// Handles one encoded request.
    ///
    /// Returns the encoded response, or `None` when no response is due.
    pub async fn handle(&self, bytes: &[u8]) -> Option<Vec<u8>> {
        let response = self.get_response(bytes).await?;
        match response.serialize(self.codec()) {
            Ok(encoded) => Some(encoded),
            Err(e) => {
                error!(request_id = ?response.request_id, error = %e, "failed to encode response");
                let fallback =
                    Response::failure(response.request_id, &RpcError::server_error(e.to_string()));
                match fallback.serialize(self.codec()) {
                    Ok(encoded) => Some(encoded),
                    Err(e) => {
                        error!(
                            request_id = ?fallback.request_id,
                            error = %e,
                            "failed to encode error response, dropping it"
                        );
                        None
                    }
                }
            }
        }
    }

    /// Handles one encoded request, returning the response unencoded.
    #[tracing::instrument(skip_all, fields(method, request_id, duration_ms))]
    pub async fn get_response(&self, bytes: &[u8]) -> Option<Response> {
        let start = std::time::Instant::now();

        let value = match self.codec.decode(bytes) {
            Ok(value) => value,
            Err(e) => {
                debug!(error = %e, "undecodable request");
                return Some(Response::failure(None, &parse_error(e)));
            }
        };

        let attribution = Attribution::salvage(&value);
        let request = match Request::from_value(value) {
            Ok(request) => Arc::new(request),
            Err(err) => {
                debug!(request_id = ?attribution.id, error = %err, "invalid request");
                return attribution
                    .rsvp
                    .then(|| Response::failure(attribution.id, &err));
            }
        };

        let span = Span::current();
        span.record("method", request.method.as_str());
        span.record("request_id", request.id.as_str());

        if request.expired() {
            warn!(ttl = ?request.ttl, issued_at = request.issued_at, "request arrived too late");
            return None;
        }

        let outcome = self.invoke(&request).await;
        span.record("duration_ms", start.elapsed().as_millis());

        if request.expired() {
            warn!(ttl = ?request.ttl, issued_at = request.issued_at, "request took too long to complete");
            return None;
        }
        if !request.rsvp {
            return None;
        }

        let request_id = Some(request.id.clone());
        Some(match outcome.into_result() {
            Ok(result) => Response::success(request_id, result),
            Err(err) => Response::failure(request_id, &err),
        })
    }

    /// Runs a validated request against the dispatcher.
    ///
    /// Expiry is not checked here.
    pub async fn invoke(&self, request: &Arc<Request>) -> Outcome {
        let method = match self.dispatcher.lookup(&request.method) {
            Ok(method) => method,
            Err(err) => {
                debug!(error = %err, "method not found");
                return Outcome::Failure(err);
            }
        };

        // Synchronous bodies run inside `invoke`, asynchronous ones when polled.
        let result = match Args::bind(method.signature(), request, &self.context) {
            Ok(args) => match std::panic::catch_unwind(AssertUnwindSafe(|| method.invoke(args))) {
                Ok(fut) => AssertUnwindSafe(fut)
                    .catch_unwind()
                    .await
                    .unwrap_or_else(panicked),
                Err(payload) => panicked(payload),
            },
            Err(e) => Err(e),
        };

        match result {
            Ok(value) => Outcome::Success(value),
            Err(MethodError::Rpc(err)) => {
                debug!(code = err.code(), error = %err, "method failed");
                Outcome::Failure(err)
            }
            Err(err @ MethodError::Signature(_)) => {
                let check = method
                    .signature()
                    .check_call(request.params.keys().map(String::as_str), self.context.names());
                match check.explanation() {
                    Some(explanation) => {
                        debug!(%explanation, "wrong signature in call");
                        Outcome::Failure(RpcError::invalid_params(explanation))
                    }
                    None => {
                        error!(error = %err, "signature failure in a call that fits");
                        Outcome::Unexpected(err.to_string())
                    }
                }
            }
            Err(err @ MethodError::Failure { .. }) => {
                error!(error = %err, "method failed unexpectedly");
                Outcome::Unexpected(err.to_string())
            }
        }
    }
}

fn panicked(payload: Box<dyn Any + Send>) -> Result<Value, MethodError> {
    let message = if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "method panicked".to_string()
    };
    Err(MethodError::failure("Panic", message))
}
