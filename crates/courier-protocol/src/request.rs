//! Request envelope.
//!
//! ```text
//! {
//!   "version":   "1.0",
//!   "method":    "add",
//!   "params":    {"a": 1, "b": 2},
//!   "issued_at": 1326499200.0,
//!   "ttl":       30.0 | null,
//!   "id":        "0f9c…",
//!   "rsvp":      true
//! }
//! ```

use courier_core::time::{self, Timestamp};
use serde_json::{Map, Value, json};
use uuid::Uuid;

use crate::PROTOCOL_VERSION;
use crate::codec::Codec;
use crate::error::{ProtocolError, ProtocolResult};
use crate::taxonomy::RpcError;

/// Older peers send the issue time under this key.
const LEGACY_ISSUED_AT_KEY: &str = "ts";

/// Keys every request must carry, in the order they are checked.
const REQUIRED_FIELDS: [&str; 7] = [
    "version",
    "method",
    "params",
    "issued_at",
    "ttl",
    "id",
    "rsvp",
];

/// Named arguments of a call.
pub type Params = Map<String, Value>;

/// A call from a caller to a method.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// Name of the method to run.
    pub method: String,
    /// Named arguments.
    pub params: Params,
    /// When the caller issued the request.
    pub issued_at: Timestamp,
    /// Seconds after `issued_at` past which the request is stale.
    pub ttl: Option<f64>,
    /// Correlation id chosen by the caller. Never used for routing.
    pub id: String,
    /// Whether the caller waits for a response.
    pub rsvp: bool,
}

/// Generates a fresh envelope id.
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

impl Request {
    /// Creates a request issued now, with no TTL, a fresh id and `rsvp` set.
    pub fn new(method: impl Into<String>, params: Params) -> Self {
        Self {
            method: method.into(),
            params,
            issued_at: time::now_seconds(),
            ttl: None,
            id: generate_id(),
            rsvp: true,
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    #[must_use]
    pub fn with_ttl(mut self, ttl: Option<f64>) -> Self {
        self.ttl = ttl;
        self
    }

    #[must_use]
    pub fn issued_at(mut self, issued_at: Timestamp) -> Self {
        self.issued_at = issued_at;
        self
    }

    #[must_use]
    pub fn with_rsvp(mut self, rsvp: bool) -> Self {
        self.rsvp = rsvp;
        self
    }

    /// Protocol version this request is written in.
    pub fn version(&self) -> &'static str {
        PROTOCOL_VERSION
    }

    /// Instant after which the request is stale, if it ever is.
    pub fn deadline(&self) -> Option<Timestamp> {
        time::expires_at(self.issued_at, self.ttl)
    }

    /// Whether the request is stale right now.
    pub fn expired(&self) -> bool {
        self.expired_at(time::now_seconds())
    }

    /// Whether the request is stale at `now`.
    pub fn expired_at(&self, now: Timestamp) -> bool {
        time::is_expired(self.issued_at, self.ttl, now)
    }

    /// Wire form as a value tree.
    pub fn to_value(&self) -> Value {
        json!({
            "id": self.id,
            "issued_at": self.issued_at,
            "method": self.method,
            "params": self.params,
            "rsvp": self.rsvp,
            "ttl": self.ttl,
            "version": PROTOCOL_VERSION,
        })
    }

    /// Encodes the request with `codec`.
    pub fn serialize(&self, codec: &dyn Codec) -> ProtocolResult<Vec<u8>> {
        codec.encode(&self.to_value())
    }

    /// Decodes and validates a request.
    ///
    /// Undecodable bytes are a `ParseError`; anything structurally wrong
    /// with the decoded value is an `InvalidRequest` naming the field.
    pub fn validate_and_parse(bytes: &[u8], codec: &dyn Codec) -> Result<Self, RpcError> {
        let value = codec.decode(bytes).map_err(parse_error)?;
        Self::from_value(value)
    }

    /// Validates an already decoded value.
    pub fn from_value(value: Value) -> Result<Self, RpcError> {
        let Value::Object(mut data) = value else {
            return Err(RpcError::invalid_request("Request body must be an object"));
        };

        if !data.contains_key("issued_at")
            && let Some(ts) = data.remove(LEGACY_ISSUED_AT_KEY)
        {
            data.insert("issued_at".to_string(), ts);
        }

        for field in REQUIRED_FIELDS {
            if !data.contains_key(field) {
                return Err(RpcError::invalid_request(format!(
                    "Missing required field \"{field}\""
                )));
            }
        }

        if data.get("version").and_then(Value::as_str) != Some(PROTOCOL_VERSION) {
            return Err(RpcError::invalid_request(format!(
                "Version must be {PROTOCOL_VERSION}"
            )));
        }

        let method = match data.remove("method") {
            Some(Value::String(method)) => method,
            _ => return Err(bad_field("method")),
        };
        let params = match data.remove("params") {
            Some(Value::Object(params)) => params,
            _ => return Err(bad_field("params")),
        };
        let issued_at = data
            .get("issued_at")
            .and_then(Value::as_f64)
            .ok_or_else(|| bad_field("issued_at"))?;
        let ttl = match data.get("ttl") {
            Some(Value::Null) => None,
            Some(Value::Number(ttl)) => Some(ttl.as_f64().ok_or_else(|| bad_field("ttl"))?),
            _ => return Err(bad_field("ttl")),
        };
        let id = match data.remove("id") {
            Some(Value::String(id)) => id,
            _ => return Err(bad_field("id")),
        };
        let rsvp = data
            .get("rsvp")
            .and_then(Value::as_bool)
            .ok_or_else(|| bad_field("rsvp"))?;

        Ok(Self {
            method,
            params,
            issued_at,
            ttl,
            id,
            rsvp,
        })
    }
}

/// What can be recovered from a request that failed validation.
///
/// Enough to address an error response to the caller, or to learn that
/// the caller asked for none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribution {
    /// The request id, when present and a string.
    pub id: Option<String>,
    /// `false` only when the request explicitly said so.
    pub rsvp: bool,
}

impl Default for Attribution {
    fn default() -> Self {
        Self { id: None, rsvp: true }
    }
}

impl Attribution {
    /// Extracts whatever addressing information `value` holds.
    pub fn salvage(value: &Value) -> Self {
        let Some(data) = value.as_object() else {
            return Self::default();
        };
        Self {
            id: data.get("id").and_then(Value::as_str).map(str::to_string),
            rsvp: data.get("rsvp").and_then(Value::as_bool).unwrap_or(true),
        }
    }
}

/// Maps a decode failure to the taxonomy error reported to the caller.
///
/// A [`ProtocolError::Decode`] already renders as `"<kind>: <description>"`.
pub fn parse_error(err: ProtocolError) -> RpcError {
    RpcError::parse_error(err.to_string())
}

fn bad_field(field: &str) -> RpcError {
    RpcError::invalid_request(format!("Bad \"{field}\" value"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::JsonCodec;
    use crate::taxonomy::ErrorKind;

    fn params(value: Value) -> Params {
        value.as_object().cloned().unwrap()
    }

    fn valid() -> Value {
        json!({
            "version": "1.0",
            "method": "cook_salad",
            "params": {"name": "Caesar"},
            "issued_at": 1326499200.0,
            "ttl": 30.0,
            "id": "req-1",
            "rsvp": true,
        })
    }

    fn invalid_data(value: Value) -> String {
        let err = Request::from_value(value).unwrap_err();
        assert!(err.is(ErrorKind::InvalidRequest), "{err}");
        err.data().as_str().unwrap().to_string()
    }

    #[test]
    fn new_request_defaults() {
        let request = Request::new("ping", Params::new());
        assert_eq!(request.version(), "1.0");
        assert!(request.rsvp);
        assert!(request.ttl.is_none());
        assert!(!request.id.is_empty());
        assert!(!request.expired());
    }

    #[test]
    fn ids_are_unique() {
        let a = Request::new("ping", Params::new());
        let b = Request::new("ping", Params::new());
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn wire_shape() {
        let request = Request::new("cook_salad", params(json!({"name": "Caesar"})))
            .with_id("req-1")
            .issued_at(1326499200.0);
        insta::assert_json_snapshot!(request.to_value(), {".issued_at" => "[issued_at]"}, @r#"
        {
          "id": "req-1",
          "issued_at": "[issued_at]",
          "method": "cook_salad",
          "params": {
            "name": "Caesar"
          },
          "rsvp": true,
          "ttl": null,
          "version": "1.0"
        }
        "#);
    }

    #[test]
    fn roundtrip_through_codec() {
        let requests = [
            Request::new("add", params(json!({"a": 1, "b": [2, 3]}))),
            Request::new("notify", Params::new())
                .with_rsvp(false)
                .with_ttl(Some(0.5)),
            Request::new("nested", params(json!({"x": {"y": null}})))
                .with_id("fixed")
                .issued_at(1.25),
        ];
        for request in requests {
            let bytes = request.serialize(&JsonCodec).unwrap();
            let parsed = Request::validate_and_parse(&bytes, &JsonCodec).unwrap();
            assert_eq!(parsed, request);
        }
    }

    #[test]
    fn accepts_integer_timestamps() {
        let mut value = valid();
        value["issued_at"] = json!(1326499200);
        value["ttl"] = json!(5);
        let request = Request::from_value(value).unwrap();
        assert_eq!(request.issued_at, 1326499200.0);
        assert_eq!(request.ttl, Some(5.0));
    }

    #[test]
    fn accepts_legacy_timestamp_key() {
        let mut value = valid();
        let ts = value.as_object_mut().unwrap().remove("issued_at").unwrap();
        value["ts"] = ts;
        let request = Request::from_value(value).unwrap();
        assert_eq!(request.issued_at, 1326499200.0);
    }

    #[test]
    fn undecodable_bytes_are_parse_errors() {
        let err = Request::validate_and_parse(b"some invalid json", &JsonCodec).unwrap_err();
        assert!(err.is(ErrorKind::ParseError));
        assert!(err.data().as_str().unwrap().starts_with("SyntaxError: "));
    }

    #[test]
    fn rejects_non_objects() {
        assert_eq!(invalid_data(json!([1, 2])), "Request body must be an object");
        assert_eq!(invalid_data(json!("text")), "Request body must be an object");
    }

    #[test]
    fn rejects_missing_fields() {
        for field in REQUIRED_FIELDS {
            let mut value = valid();
            value.as_object_mut().unwrap().remove(field);
            assert_eq!(
                invalid_data(value),
                format!("Missing required field \"{field}\"")
            );
        }
    }

    #[test]
    fn rejects_other_versions() {
        for version in [json!("2.0"), json!(1.0), Value::Null] {
            let mut value = valid();
            value["version"] = version;
            assert_eq!(invalid_data(value), "Version must be 1.0");
        }
    }

    #[test]
    fn rejects_badly_typed_fields() {
        let cases = [
            ("method", json!(42)),
            ("params", json!(["positional"])),
            ("issued_at", json!("yesterday")),
            ("ttl", json!("forever")),
            ("id", json!(7)),
            ("rsvp", json!("yes")),
        ];
        for (field, bad) in cases {
            let mut value = valid();
            value[field] = bad;
            assert_eq!(invalid_data(value), format!("Bad \"{field}\" value"));
        }
    }

    #[test]
    fn expiry() {
        let now = time::now_seconds();
        let ttl = 10.0;

        let stale = Request::new("m", Params::new())
            .with_ttl(Some(ttl))
            .issued_at(now - (ttl + 0.5));
        assert!(stale.expired());

        let fresh = Request::new("m", Params::new())
            .with_ttl(Some(ttl))
            .issued_at(now);
        assert!(!fresh.expired());

        let durable = Request::new("m", Params::new()).issued_at(0.0);
        assert!(!durable.expired());
        assert_eq!(durable.deadline(), None);
    }

    #[test]
    fn expiry_is_recomputed() {
        let mut request = Request::new("m", Params::new())
            .with_ttl(Some(1.0))
            .issued_at(100.0);
        assert!(request.expired_at(101.5));
        request.ttl = Some(5.0);
        assert!(!request.expired_at(101.5));
    }

    #[test]
    fn salvage_attribution() {
        let partial = json!({"id": "abc", "rsvp": false, "params": 3});
        assert_eq!(
            Attribution::salvage(&partial),
            Attribution {
                id: Some("abc".into()),
                rsvp: false,
            }
        );
        assert_eq!(Attribution::salvage(&json!({"id": 5})), Attribution::default());
        assert_eq!(Attribution::salvage(&json!(null)), Attribution::default());
    }
}
