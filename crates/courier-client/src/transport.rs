//! Byte transport seam.
//!
//! A transport receives the encoded request, the request itself and the
//! per-call options, and returns the encoded response. It returns `None`
//! (or anything at all, which is ignored) when the request is a
//! notification.
//!
//! Closures are transports:
//!
//! ```rust
//! use courier_client::{Client, TransportOptions, TransportResult};
//! use courier_protocol::Request;
//!
//! let client = Client::new(
//!     |payload: Vec<u8>, request: &Request, _options: &TransportOptions| {
//!         let rsvp = request.rsvp;
//!         async move {
//!             // Hand `payload` to a queue, an HTTP client, ...
//!             let _ = payload;
//!             TransportResult::Ok(rsvp.then(Vec::new))
//!         }
//!     },
//! );
//! # let _ = client;
//! ```

use std::future::Future;

use serde_json::{Map, Value};

use courier_protocol::Request;

use crate::error::TransportResult;

/// Free-form per-call settings handed to the transport untouched.
pub type TransportOptions = Map<String, Value>;

/// Asynchronous byte transport.
pub trait Transport: Send + Sync {
    fn send(
        &self,
        payload: Vec<u8>,
        request: &Request,
        options: &TransportOptions,
    ) -> impl Future<Output = TransportResult<Option<Vec<u8>>>> + Send;
}

impl<F, Fut> Transport for F
where
    F: Fn(Vec<u8>, &Request, &TransportOptions) -> Fut + Send + Sync,
    Fut: Future<Output = TransportResult<Option<Vec<u8>>>> + Send,
{
    fn send(
        &self,
        payload: Vec<u8>,
        request: &Request,
        options: &TransportOptions,
    ) -> impl Future<Output = TransportResult<Option<Vec<u8>>>> + Send {
        self(payload, request, options)
    }
}

/// Blocking byte transport.
pub trait BlockingTransport {
    fn send(
        &self,
        payload: Vec<u8>,
        request: &Request,
        options: &TransportOptions,
    ) -> TransportResult<Option<Vec<u8>>>;
}

impl<F> BlockingTransport for F
where
    F: Fn(Vec<u8>, &Request, &TransportOptions) -> TransportResult<Option<Vec<u8>>>,
{
    fn send(
        &self,
        payload: Vec<u8>,
        request: &Request,
        options: &TransportOptions,
    ) -> TransportResult<Option<Vec<u8>>> {
        self(payload, request, options)
    }
}
