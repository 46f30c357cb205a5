//! Envelope model and error taxonomy for courier.
//!
//! A call travels as a [`Request`] and, when the caller asked for one,
//! comes back as a [`Response`]. Both are plain value trees turned into
//! bytes by a [`Codec`]; nothing here knows about sockets or queues.
//! Stream hosts can delimit payloads with the helpers in [`framing`].
//!
//! # Example
//!
//! ```rust
//! use courier_protocol::{JsonCodec, Params, Request};
//!
//! let request = Request::new("add", Params::new());
//! let bytes = request.serialize(&JsonCodec).unwrap();
//! let parsed = Request::validate_and_parse(&bytes, &JsonCodec).unwrap();
//! assert_eq!(parsed.id, request.id);
//! ```

pub mod codec;
mod error;
pub mod framing;
pub mod request;
pub mod response;
pub mod taxonomy;

pub use codec::{Codec, JsonCodec};
pub use error::{ProtocolError, ProtocolResult};
pub use framing::{FrameReader, FrameWriter, decode_frame, encode_frame};
pub use request::{Attribution, Params, Request, generate_id};
pub use response::{Response, ResponseBody};
pub use taxonomy::{ErrorBand, ErrorKind, ErrorObject, Registry, RpcError, registry};

/// Envelope version written into, and required of, every request.
pub const PROTOCOL_VERSION: &str = "1.0";

/// Name under which a method may receive the request it is serving.
pub const REQUEST_PARAM: &str = "rpc_request";

/// Maximum framed payload size (1 MiB).
pub const MAX_MESSAGE_SIZE: u32 = 1024 * 1024;
