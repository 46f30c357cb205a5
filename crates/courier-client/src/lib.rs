//! Calling side of courier.
//!
//! A [`Client`] (or [`BlockingClient`]) builds requests, hands the encoded
//! bytes to a [`Transport`] and turns the response back into a value or an
//! [`RpcError`](courier_protocol::RpcError). [`UnixSocketTransport`] talks to
//! a `courier_server::SocketServer`; any closure with the right shape is a
//! transport too.
//!
//! This crate also provides the `courier` command-line interface.

pub mod cli;
pub mod client;
pub mod commands;
pub mod config;
pub mod error;
pub mod socket;
pub mod transport;

pub use client::{BlockingClient, CallOptions, CallResult, Client, MethodCall, TtlDefaults};
pub use config::ClientConfig;
pub use error::{CommandError, CommandResult, ConfigError, TransportError, TransportResult};
pub use socket::UnixSocketTransport;
pub use transport::{BlockingTransport, Transport, TransportOptions};
