//! Error taxonomy shared by both ends of a call.
//!
//! Every [`ErrorKind`] owns a stable numeric code and a fixed message. The
//! code is what crosses the wire; the receiving side looks it up in the
//! process-wide [`Registry`] to rebuild the same kind. Codes the local
//! registry does not know survive as [`RpcError::Unknown`] with the peer's
//! code, message and data intact.

use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Every error kind this build knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The envelope bytes could not be decoded.
    ParseError,
    /// The decoded envelope is not a valid request.
    InvalidRequest,
    /// No method is registered under the requested name.
    MethodNotFound,
    /// The arguments do not fit the method's signature.
    InvalidParams,
    /// Internal failure of the RPC machinery.
    InternalError,
    /// The request could not be completed in time.
    Timeout,
    /// The server could not complete the request.
    ServerError,
    /// Authentication is required and has failed or is missing.
    Unauthorized,
    /// The request was valid but the caller may not perform it.
    Forbidden,
    /// Input parameters failed application validation.
    ValidationError,
    /// A system the method depends on did not answer.
    ExternalServiceUnavailable,
}

/// Coarse grouping of error kinds by where the fault lies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorBand {
    /// The envelope itself is malformed.
    Framing,
    /// The method or its arguments do not match.
    Dispatch,
    /// The method ran (or tried to) and failed.
    Execution,
}

impl ErrorKind {
    /// Declaration list the registry is built from.
    pub const ALL: [ErrorKind; 11] = [
        ErrorKind::ParseError,
        ErrorKind::InvalidRequest,
        ErrorKind::MethodNotFound,
        ErrorKind::InvalidParams,
        ErrorKind::InternalError,
        ErrorKind::Timeout,
        ErrorKind::ServerError,
        ErrorKind::Unauthorized,
        ErrorKind::Forbidden,
        ErrorKind::ValidationError,
        ErrorKind::ExternalServiceUnavailable,
    ];

    /// Wire code. These values are fixed for interoperability.
    pub const fn code(self) -> i64 {
        match self {
            Self::ParseError => -32700,
            Self::InvalidRequest => -32600,
            Self::MethodNotFound => -32601,
            Self::InvalidParams => -32602,
            Self::InternalError => -32603,
            Self::Timeout => -32604,
            Self::ServerError => -32000,
            Self::Unauthorized => 1000,
            Self::Forbidden => 1001,
            Self::ValidationError => 2000,
            Self::ExternalServiceUnavailable => 3000,
        }
    }

    /// Default message sent alongside the code.
    pub const fn message(self) -> &'static str {
        match self {
            Self::ParseError => "Parse error",
            Self::InvalidRequest => "Invalid Request",
            Self::MethodNotFound => "Method not found",
            Self::InvalidParams => "Invalid params",
            Self::InternalError => "Internal error",
            Self::Timeout => "Timeout",
            Self::ServerError => "Server error",
            Self::Unauthorized => "Unauthorized",
            Self::Forbidden => "Forbidden",
            Self::ValidationError => "Validation error",
            Self::ExternalServiceUnavailable => "External service unavailable",
        }
    }

    pub const fn band(self) -> ErrorBand {
        match self {
            Self::ParseError | Self::InvalidRequest => ErrorBand::Framing,
            Self::MethodNotFound | Self::InvalidParams => ErrorBand::Dispatch,
            _ => ErrorBand::Execution,
        }
    }

    /// Looks `code` up in the process-wide registry.
    pub fn from_code(code: i64) -> Option<Self> {
        registry().get(code)
    }
}

/// Two kinds were declared with the same code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("error code {code} is declared by both {first:?} and {second:?}")]
pub struct DuplicateCode {
    pub code: i64,
    pub first: ErrorKind,
    pub second: ErrorKind,
}

/// Code → kind lookup table.
#[derive(Debug, Clone)]
pub struct Registry {
    by_code: HashMap<i64, ErrorKind>,
}

impl Registry {
    /// Builds a registry from a declaration list, rejecting code collisions.
    pub fn build(kinds: impl IntoIterator<Item = ErrorKind>) -> Result<Self, DuplicateCode> {
        let mut by_code = HashMap::new();
        for kind in kinds {
            if let Some(first) = by_code.insert(kind.code(), kind) {
                return Err(DuplicateCode {
                    code: kind.code(),
                    first,
                    second: kind,
                });
            }
        }
        Ok(Self { by_code })
    }

    pub fn get(&self, code: i64) -> Option<ErrorKind> {
        self.by_code.get(&code).copied()
    }

    pub fn len(&self) -> usize {
        self.by_code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_code.is_empty()
    }
}

/// Whether every kind in `kinds` has its own code.
pub const fn codes_are_unique(kinds: &[ErrorKind]) -> bool {
    let mut i = 0;
    while i < kinds.len() {
        let mut j = i + 1;
        while j < kinds.len() {
            if kinds[i].code() == kinds[j].code() {
                return false;
            }
            j += 1;
        }
        i += 1;
    }
    true
}

// Code collisions in the declared taxonomy fail the build.
const _: () = assert!(
    codes_are_unique(&ErrorKind::ALL),
    "two error kinds share a wire code"
);

static REGISTRY: LazyLock<Registry> = LazyLock::new(|| match Registry::build(ErrorKind::ALL) {
    Ok(registry) => registry,
    // Unreachable: the declared codes are checked at compile time.
    Err(duplicate) => panic!("invalid error taxonomy: {duplicate}"),
});

/// The process-wide registry, built on first use.
pub fn registry() -> &'static Registry {
    &REGISTRY
}

/// Wire form of an error: `{code, message, data}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorObject {
    pub code: i64,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Value,
}

/// A taxonomy error.
#[derive(Debug, Clone, PartialEq)]
pub enum RpcError {
    /// A kind present in the local registry.
    Known { kind: ErrorKind, data: Value },
    /// A code the local registry does not know, kept verbatim.
    Unknown {
        code: i64,
        message: Option<String>,
        data: Value,
    },
}

impl RpcError {
    pub fn new(kind: ErrorKind, data: impl Into<Value>) -> Self {
        Self::Known {
            kind,
            data: data.into(),
        }
    }

    /// Builds an error of `kind` from a native failure.
    ///
    /// The data becomes `"<failure_kind>: <description>"`; the message stays
    /// the kind's fixed text.
    pub fn from_failure(
        kind: ErrorKind,
        failure_kind: &str,
        description: impl fmt::Display,
    ) -> Self {
        Self::new(kind, format!("{failure_kind}: {description}"))
    }

    /// Rebuilds the registered kind for `code`.
    ///
    /// For an unregistered code the result is [`RpcError::Unknown`] carrying
    /// `message` as given, since there is no local default for it.
    pub fn from_code(code: i64, data: Value, message: Option<String>) -> Self {
        match ErrorKind::from_code(code) {
            Some(kind) => Self::Known { kind, data },
            None => Self::Unknown {
                code,
                message,
                data,
            },
        }
    }

    pub fn from_object(object: ErrorObject) -> Self {
        Self::from_code(object.code, object.data, object.message)
    }

    pub fn parse_error(data: impl Into<Value>) -> Self {
        Self::new(ErrorKind::ParseError, data)
    }

    pub fn invalid_request(data: impl Into<Value>) -> Self {
        Self::new(ErrorKind::InvalidRequest, data)
    }

    pub fn method_not_found(method: impl Into<String>) -> Self {
        Self::new(ErrorKind::MethodNotFound, method.into())
    }

    pub fn invalid_params(data: impl Into<Value>) -> Self {
        Self::new(ErrorKind::InvalidParams, data)
    }

    pub fn internal_error(data: impl Into<Value>) -> Self {
        Self::new(ErrorKind::InternalError, data)
    }

    pub fn timeout(data: impl Into<Value>) -> Self {
        Self::new(ErrorKind::Timeout, data)
    }

    pub fn server_error(data: impl Into<Value>) -> Self {
        Self::new(ErrorKind::ServerError, data)
    }

    pub fn unauthorized(data: impl Into<Value>) -> Self {
        Self::new(ErrorKind::Unauthorized, data)
    }

    pub fn forbidden(data: impl Into<Value>) -> Self {
        Self::new(ErrorKind::Forbidden, data)
    }

    pub fn validation(data: impl Into<Value>) -> Self {
        Self::new(ErrorKind::ValidationError, data)
    }

    pub fn external_service_unavailable(data: impl Into<Value>) -> Self {
        Self::new(ErrorKind::ExternalServiceUnavailable, data)
    }

    /// The registered kind, or `None` for an unknown code.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Known { kind, .. } => Some(*kind),
            Self::Unknown { .. } => None,
        }
    }

    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind() == Some(kind)
    }

    pub fn code(&self) -> i64 {
        match self {
            Self::Known { kind, .. } => kind.code(),
            Self::Unknown { code, .. } => *code,
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Known { kind, .. } => Some(kind.message()),
            Self::Unknown { message, .. } => message.as_deref(),
        }
    }

    pub fn data(&self) -> &Value {
        match self {
            Self::Known { data, .. } | Self::Unknown { data, .. } => data,
        }
    }

    /// Wire form of this error.
    pub fn to_object(&self) -> ErrorObject {
        ErrorObject {
            code: self.code(),
            message: self.message().map(str::to_string),
            data: self.data().clone(),
        }
    }
}

impl From<ErrorObject> for RpcError {
    fn from(object: ErrorObject) -> Self {
        Self::from_object(object)
    }
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: ", self.code(), self.message().unwrap_or("<no message>"))?;
        match self.data() {
            Value::String(text) => f.write_str(text),
            other => write!(f, "{other}"),
        }
    }
}

impl std::error::Error for RpcError {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn standard_codes() {
        let expected = [
            (ErrorKind::ParseError, -32700, "Parse error"),
            (ErrorKind::InvalidRequest, -32600, "Invalid Request"),
            (ErrorKind::MethodNotFound, -32601, "Method not found"),
            (ErrorKind::InvalidParams, -32602, "Invalid params"),
            (ErrorKind::InternalError, -32603, "Internal error"),
            (ErrorKind::Timeout, -32604, "Timeout"),
            (ErrorKind::ServerError, -32000, "Server error"),
            (ErrorKind::Unauthorized, 1000, "Unauthorized"),
            (ErrorKind::Forbidden, 1001, "Forbidden"),
            (ErrorKind::ValidationError, 2000, "Validation error"),
            (
                ErrorKind::ExternalServiceUnavailable,
                3000,
                "External service unavailable",
            ),
        ];
        for (kind, code, message) in expected {
            assert_eq!(kind.code(), code, "{kind:?}");
            assert_eq!(kind.message(), message, "{kind:?}");
        }
    }

    #[test]
    fn registry_covers_every_kind() {
        assert_eq!(registry().len(), ErrorKind::ALL.len());
        for kind in ErrorKind::ALL {
            assert_eq!(ErrorKind::from_code(kind.code()), Some(kind));
        }
    }

    #[test]
    fn registry_rejects_duplicate_codes() {
        let err = Registry::build([
            ErrorKind::ParseError,
            ErrorKind::Forbidden,
            ErrorKind::ParseError,
        ])
        .unwrap_err();
        assert_eq!(err.code, -32700);
        assert_eq!(err.first, ErrorKind::ParseError);
        assert_eq!(err.second, ErrorKind::ParseError);
    }

    #[test]
    fn declared_codes_are_checked_at_build_time() {
        const DECLARED_UNIQUE: bool = codes_are_unique(&ErrorKind::ALL);
        assert!(DECLARED_UNIQUE);
        assert!(!codes_are_unique(&[
            ErrorKind::Forbidden,
            ErrorKind::Timeout,
            ErrorKind::Forbidden,
        ]));
        assert!(codes_are_unique(&[]));
    }

    #[test]
    fn reconstruct_every_registered_kind() {
        let data = json!({"field": "name", "reason": ["too", "short"]});
        for kind in ErrorKind::ALL {
            let err = RpcError::from_code(kind.code(), data.clone(), None);
            assert_eq!(err.kind(), Some(kind));
            assert_eq!(err.data(), &data);
            assert_eq!(err.message(), Some(kind.message()));
        }
    }

    #[test]
    fn registered_code_ignores_remote_message() {
        let err = RpcError::from_code(1001, json!("no"), Some("Go away".into()));
        assert!(err.is(ErrorKind::Forbidden));
        assert_eq!(err.message(), Some("Forbidden"));
    }

    #[test]
    fn unknown_code_is_kept_verbatim() {
        let err = RpcError::from_code(4242, json!("details"), Some("Quota exceeded".into()));
        assert_eq!(err.kind(), None);
        assert_eq!(err.code(), 4242);
        assert_eq!(err.message(), Some("Quota exceeded"));
        assert_eq!(err.data(), &json!("details"));
        assert_eq!(
            err.to_object(),
            ErrorObject {
                code: 4242,
                message: Some("Quota exceeded".into()),
                data: json!("details"),
            }
        );
    }

    #[test]
    fn failure_data_names_the_failure() {
        let err = RpcError::from_failure(ErrorKind::ServerError, "ZeroDivisionError", "division by zero");
        assert_eq!(err.data(), &json!("ZeroDivisionError: division by zero"));
        assert_eq!(err.message(), Some("Server error"));
    }

    #[test]
    fn display_renders_code_message_data() {
        assert_eq!(
            RpcError::method_not_found("cook_salad").to_string(),
            "-32601 Method not found: cook_salad"
        );
        assert_eq!(
            RpcError::validation(json!({"a": 1})).to_string(),
            r#"2000 Validation error: {"a":1}"#
        );
    }

    #[test]
    fn error_object_wire_shape() {
        let object = RpcError::invalid_params("Missing arguments: b").to_object();
        insta::assert_json_snapshot!(object, @r#"
        {
          "code": -32602,
          "message": "Invalid params",
          "data": "Missing arguments: b"
        }
        "#);
    }

    #[test]
    fn error_object_tolerates_missing_fields() {
        let object: ErrorObject = serde_json::from_value(json!({"code": 1000})).unwrap();
        assert_eq!(object.message, None);
        assert_eq!(object.data, Value::Null);
        assert!(RpcError::from(object).is(ErrorKind::Unauthorized));
    }

    #[test]
    fn bands() {
        assert_eq!(ErrorKind::ParseError.band(), ErrorBand::Framing);
        assert_eq!(ErrorKind::InvalidParams.band(), ErrorBand::Dispatch);
        assert_eq!(ErrorKind::Forbidden.band(), ErrorBand::Execution);
    }
}
