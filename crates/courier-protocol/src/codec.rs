//! Byte encoding of envelopes.
//!
//! The envelope layer works on [`serde_json::Value`] trees. A [`Codec`]
//! turns those trees into bytes and back, so hosts can swap the text
//! encoding without touching validation or dispatch.

use serde_json::Value;

use crate::error::{ProtocolError, ProtocolResult};

/// Serialize/deserialize pair used for every envelope.
pub trait Codec: Send + Sync {
    /// Encodes a value into bytes.
    fn encode(&self, value: &Value) -> ProtocolResult<Vec<u8>>;

    /// Decodes bytes into a value.
    ///
    /// Failures should be reported as [`ProtocolError::Decode`] so the
    /// description can be echoed to the peer.
    fn decode(&self, bytes: &[u8]) -> ProtocolResult<Value>;
}

/// UTF-8 JSON, non-ASCII characters written as-is.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode(&self, value: &Value) -> ProtocolResult<Vec<u8>> {
        serde_json::to_vec(value).map_err(|e| ProtocolError::Encode(e.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> ProtocolResult<Value> {
        serde_json::from_slice(bytes)
            .map_err(|e| ProtocolError::decode(format!("{:?}Error", e.classify()), e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn keeps_non_ascii_text() {
        let bytes = JsonCodec.encode(&json!({"name": "Цезарь"})).unwrap();
        assert_eq!(std::str::from_utf8(&bytes).unwrap(), r#"{"name":"Цезарь"}"#);
    }

    #[test]
    fn decode_reports_failure_class() {
        let err = JsonCodec.decode(b"some invalid json").unwrap_err();
        match err {
            ProtocolError::Decode { kind, description } => {
                assert_eq!(kind, "SyntaxError");
                assert!(description.contains("line 1"), "{description}");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let err = JsonCodec.decode(b"{\"a\": ").unwrap_err();
        assert!(matches!(err, ProtocolError::Decode { ref kind, .. } if kind == "EofError"));
    }
}
