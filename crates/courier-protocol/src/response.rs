//! Response envelope.
//!
//! A response carries exactly one of `result` or `error`:
//!
//! ```text
//! {"result": 3, "request_id": "x", "id": "…"}
//! {"error": {"code": -32601, "message": "Method not found", "data": "add"},
//!  "request_id": "x", "id": "…"}
//! ```
//!
//! A response that cannot be decoded or does not have this shape is the
//! remote peer's fault, so it surfaces as `ServerError` rather than
//! `ParseError`.

use serde_json::{Map, Value, json};

use crate::codec::Codec;
use crate::error::ProtocolResult;
use crate::request::generate_id;
use crate::taxonomy::{ErrorObject, RpcError};

const INVALID_RESPONSE: &str = "Invalid response";

/// The single payload of a response.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    /// The method's return value.
    Result(Value),
    /// The failure, in wire form.
    Error(ErrorObject),
}

/// Reply to a request that asked for one.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// Id of the request being answered; `None` when the request was too
    /// malformed to carry one.
    pub request_id: Option<String>,
    /// Id of this response, independent of the request id.
    pub id: String,
    pub body: ResponseBody,
}

impl Response {
    /// Creates a success response with a fresh id.
    pub fn success(request_id: Option<String>, result: Value) -> Self {
        Self {
            request_id,
            id: generate_id(),
            body: ResponseBody::Result(result),
        }
    }

    /// Creates an error response with a fresh id.
    pub fn failure(request_id: Option<String>, error: &RpcError) -> Self {
        Self {
            request_id,
            id: generate_id(),
            body: ResponseBody::Error(error.to_object()),
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn is_success(&self) -> bool {
        matches!(self.body, ResponseBody::Result(_))
    }

    pub fn result(&self) -> Option<&Value> {
        match &self.body {
            ResponseBody::Result(result) => Some(result),
            ResponseBody::Error(_) => None,
        }
    }

    pub fn error(&self) -> Option<&ErrorObject> {
        match &self.body {
            ResponseBody::Result(_) => None,
            ResponseBody::Error(error) => Some(error),
        }
    }

    /// Returns the result, or rebuilds the taxonomy error the peer raised.
    pub fn into_result(self) -> Result<Value, RpcError> {
        match self.body {
            ResponseBody::Result(result) => Ok(result),
            ResponseBody::Error(error) => Err(RpcError::from_object(error)),
        }
    }

    /// Wire form as a value tree.
    pub fn to_value(&self) -> Value {
        match &self.body {
            ResponseBody::Result(result) => json!({
                "id": self.id,
                "request_id": self.request_id,
                "result": result,
            }),
            ResponseBody::Error(error) => json!({
                "error": error,
                "id": self.id,
                "request_id": self.request_id,
            }),
        }
    }

    /// Encodes the response with `codec`.
    pub fn serialize(&self, codec: &dyn Codec) -> ProtocolResult<Vec<u8>> {
        codec.encode(&self.to_value())
    }

    /// Decodes and validates a response.
    ///
    /// Every failure is a `ServerError`.
    pub fn validate_and_parse(bytes: &[u8], codec: &dyn Codec) -> Result<Self, RpcError> {
        let value = codec
            .decode(bytes)
            .map_err(|e| RpcError::server_error(e.to_string()))?;
        Self::from_value(value)
    }

    /// Validates an already decoded value.
    pub fn from_value(value: Value) -> Result<Self, RpcError> {
        let Value::Object(mut data) = value else {
            return Err(invalid());
        };

        let has_result = data.contains_key("result");
        let has_error = data.contains_key("error");
        if has_result == has_error {
            return Err(invalid());
        }

        let id = take_string(&mut data, "id")?;
        let request_id = take_string(&mut data, "request_id")?;

        let body = match (data.remove("result"), data.remove("error")) {
            (Some(result), None) => ResponseBody::Result(result),
            (None, Some(error)) => {
                ResponseBody::Error(serde_json::from_value(error).map_err(|_| invalid())?)
            }
            _ => return Err(invalid()),
        };

        Ok(Self {
            request_id: Some(request_id),
            id,
            body,
        })
    }
}

fn take_string(data: &mut Map<String, Value>, key: &str) -> Result<String, RpcError> {
    match data.remove(key) {
        Some(Value::String(value)) => Ok(value),
        _ => Err(invalid()),
    }
}

fn invalid() -> RpcError {
    RpcError::server_error(INVALID_RESPONSE)
}
