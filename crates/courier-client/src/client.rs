//! The calling side: build a request, hand it to a transport, read the
//! response.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use courier_core::Timestamp;
use courier_protocol::{
    Codec, ErrorKind, JsonCodec, Params, Request, Response, RpcError, generate_id,
};

use crate::error::TransportError;
use crate::transport::{BlockingTransport, Transport, TransportOptions};

/// Result of a call.
pub type CallResult<T> = Result<T, RpcError>;

/// TTLs applied when a call does not set one.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TtlDefaults {
    /// For calls that expect a response.
    pub rpc: Option<f64>,
    /// For notifications.
    pub notification: Option<f64>,
}

impl TtlDefaults {
    /// Resolves the two defaults, each falling back to `default_ttl`.
    pub fn new(
        default_ttl: Option<f64>,
        default_rpc_ttl: Option<f64>,
        default_notification_ttl: Option<f64>,
    ) -> Self {
        Self {
            rpc: default_rpc_ttl.or(default_ttl),
            notification: default_notification_ttl.or(default_ttl),
        }
    }

    /// The same TTL for every call.
    pub fn shared(ttl: f64) -> Self {
        Self::new(Some(ttl), None, None)
    }

    pub fn for_rsvp(&self, rsvp: bool) -> Option<f64> {
        if rsvp { self.rpc } else { self.notification }
    }
}

/// Per-call settings.
#[derive(Debug, Clone, PartialEq)]
pub struct CallOptions {
    /// Issue time; now when unset.
    pub ts: Option<Timestamp>,
    /// Overrides the configured default.
    pub ttl: Option<f64>,
    /// Request id; generated when unset.
    pub id: Option<String>,
    pub rsvp: bool,
    /// Never expire, whatever `ttl` or the defaults say.
    pub durable: bool,
    pub transport: TransportOptions,
}

impl Default for CallOptions {
    fn default() -> Self {
        Self {
            ts: None,
            ttl: None,
            id: None,
            rsvp: true,
            durable: false,
            transport: TransportOptions::new(),
        }
    }
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Options for a fire-and-forget call.
    pub fn notification() -> Self {
        Self::new().rsvp(false)
    }

    #[must_use]
    pub fn ts(mut self, ts: Timestamp) -> Self {
        self.ts = Some(ts);
        self
    }

    #[must_use]
    pub fn ttl(mut self, ttl: f64) -> Self {
        self.ttl = Some(ttl);
        self
    }

    #[must_use]
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn rsvp(mut self, rsvp: bool) -> Self {
        self.rsvp = rsvp;
        self
    }

    #[must_use]
    pub fn durable(mut self) -> Self {
        self.durable = true;
        self
    }

    #[must_use]
    pub fn transport_option(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.transport.insert(name.into(), value.into());
        self
    }
}

/// State shared by the async and blocking clients.
#[derive(Clone)]
struct Caller {
    ttl: TtlDefaults,
    codec: Arc<dyn Codec>,
}

impl Default for Caller {
    fn default() -> Self {
        Self {
            ttl: TtlDefaults::default(),
            codec: Arc::new(JsonCodec),
        }
    }
}

impl Caller {
    fn prepare_request(&self, method: &str, params: Params, options: &CallOptions) -> Request {
        let ttl = if options.durable {
            None
        } else {
            options.ttl.or(self.ttl.for_rsvp(options.rsvp))
        };

        let mut request = Request::new(method, params)
            .with_ttl(ttl)
            .with_rsvp(options.rsvp)
            .with_id(options.id.clone().unwrap_or_else(generate_id));
        if let Some(ts) = options.ts {
            request = request.issued_at(ts);
        }
        request
    }

    fn encode(&self, request: &Request) -> CallResult<Vec<u8>> {
        request
            .serialize(self.codec.as_ref())
            .map_err(|e| RpcError::from_failure(ErrorKind::ServerError, "ProtocolError", e))
    }

    fn parse_reply(
        &self,
        request: &Request,
        reply: Result<Option<Vec<u8>>, TransportError>,
    ) -> CallResult<Option<Value>> {
        let reply = reply.map_err(|e| {
            debug!(request_id = %request.id, error = %e, "transport failed");
            e.into_rpc()
        })?;

        if !request.rsvp {
            return Ok(None);
        }

        let bytes = reply.ok_or_else(|| RpcError::server_error("No response"))?;
        let response = Response::validate_and_parse(&bytes, self.codec.as_ref())?;
        if response.request_id.as_deref() != Some(request.id.as_str()) {
            warn!(
                expected = %request.id,
                received = ?response.request_id,
                "response request_id mismatch"
            );
        }

        match response.into_result() {
            Ok(result) => Ok(Some(result)),
            Err(err) => {
                debug!(request_id = %request.id, code = err.code(), error = %err, "call failed");
                Err(err)
            }
        }
    }
}

fn decode_result<R: DeserializeOwned>(value: Value) -> CallResult<R> {
    serde_json::from_value(value)
        .map_err(|e| RpcError::from_failure(ErrorKind::ServerError, "ResultTypeError", e))
}

/// Asynchronous caller over a [`Transport`].
///
/// ```rust,no_run
/// # async fn demo() -> Result<(), courier_protocol::RpcError> {
/// use courier_client::{Client, UnixSocketTransport};
///
/// let client = Client::new(UnixSocketTransport::with_defaults());
/// let sum: i64 = client.method("add").arg("a", 1).arg("b", 2).call_as().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client<T> {
    transport: T,
    caller: Caller,
}

impl<T: Transport> Client<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            caller: Caller::default(),
        }
    }

    #[must_use]
    pub fn with_ttl_defaults(mut self, ttl: TtlDefaults) -> Self {
        self.caller.ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_codec(mut self, codec: Arc<dyn Codec>) -> Self {
        self.caller.codec = codec;
        self
    }

    pub fn ttl_defaults(&self) -> TtlDefaults {
        self.caller.ttl
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Builds the request a call with `options` would send.
    pub fn prepare_request(&self, method: &str, params: Params, options: &CallOptions) -> Request {
        self.caller.prepare_request(method, params, options)
    }

    /// Calls `method` and waits for its result.
    pub async fn call(&self, method: &str, params: Params) -> CallResult<Value> {
        let result = self.call_with(method, params, CallOptions::new()).await?;
        Ok(result.unwrap_or_default())
    }

    /// Calls `method` and deserializes its result.
    pub async fn call_as<R: DeserializeOwned>(&self, method: &str, params: Params) -> CallResult<R> {
        decode_result(self.call(method, params).await?)
    }

    /// Sends `method` as a notification.
    pub async fn notify(&self, method: &str, params: Params) -> CallResult<()> {
        self.call_with(method, params, CallOptions::notification())
            .await
            .map(|_| ())
    }

    /// Calls `method` with explicit options.
    ///
    /// Returns `None` for notifications.
    pub async fn call_with(
        &self,
        method: &str,
        params: Params,
        options: CallOptions,
    ) -> CallResult<Option<Value>> {
        let request = self.prepare_request(method, params, &options);
        let payload = self.caller.encode(&request)?;
        debug!(method, request_id = %request.id, rsvp = request.rsvp, "sending request");

        let reply = self
            .transport
            .send(payload, &request, &options.transport)
            .await;
        self.caller.parse_reply(&request, reply)
    }

    /// Starts a call to `name` with default options.
    pub fn method(&self, name: impl Into<String>) -> MethodCall<'_, Self> {
        MethodCall::new(self, name.into())
    }
}

/// Blocking caller over a [`BlockingTransport`].
#[derive(Clone)]
pub struct BlockingClient<T> {
    transport: T,
    caller: Caller,
}

impl<T: BlockingTransport> BlockingClient<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            caller: Caller::default(),
        }
    }

    #[must_use]
    pub fn with_ttl_defaults(mut self, ttl: TtlDefaults) -> Self {
        self.caller.ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_codec(mut self, codec: Arc<dyn Codec>) -> Self {
        self.caller.codec = codec;
        self
    }

    pub fn ttl_defaults(&self) -> TtlDefaults {
        self.caller.ttl
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn prepare_request(&self, method: &str, params: Params, options: &CallOptions) -> Request {
        self.caller.prepare_request(method, params, options)
    }

    pub fn call(&self, method: &str, params: Params) -> CallResult<Value> {
        let result = self.call_with(method, params, CallOptions::new())?;
        Ok(result.unwrap_or_default())
    }

    pub fn call_as<R: DeserializeOwned>(&self, method: &str, params: Params) -> CallResult<R> {
        decode_result(self.call(method, params)?)
    }

    pub fn notify(&self, method: &str, params: Params) -> CallResult<()> {
        self.call_with(method, params, CallOptions::notification())
            .map(|_| ())
    }

    pub fn call_with(
        &self,
        method: &str,
        params: Params,
        options: CallOptions,
    ) -> CallResult<Option<Value>> {
        let request = self.prepare_request(method, params, &options);
        let payload = self.caller.encode(&request)?;
        debug!(method, request_id = %request.id, rsvp = request.rsvp, "sending request");

        let reply = self
            .transport
            .send(payload, &request, &options.transport);
        self.caller.parse_reply(&request, reply)
    }

    pub fn method(&self, name: impl Into<String>) -> MethodCall<'_, Self> {
        MethodCall::new(self, name.into())
    }
}

/// A call under construction: `client.method("add").arg("a", 1).call()`.
#[must_use]
pub struct MethodCall<'a, C> {
    client: &'a C,
    method: String,
    params: Params,
}

impl<'a, C> MethodCall<'a, C> {
    fn new(client: &'a C, method: String) -> Self {
        Self {
            client,
            method,
            params: Params::new(),
        }
    }

    pub fn arg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }
}

impl<T: Transport> MethodCall<'_, Client<T>> {
    pub async fn call(self) -> CallResult<Value> {
        self.client.call(&self.method, self.params).await
    }

    pub async fn call_as<R: DeserializeOwned>(self) -> CallResult<R> {
        self.client.call_as(&self.method, self.params).await
    }

    pub async fn notify(self) -> CallResult<()> {
        self.client.notify(&self.method, self.params).await
    }
}

impl<T: BlockingTransport> MethodCall<'_, BlockingClient<T>> {
    pub fn call(self) -> CallResult<Value> {
        self.client.call(&self.method, self.params)
    }

    pub fn call_as<R: DeserializeOwned>(self) -> CallResult<R> {
        self.client.call_as(&self.method, self.params)
    }

    pub fn notify(self) -> CallResult<()> {
        self.client.notify(&self.method, self.params)
    }
}
