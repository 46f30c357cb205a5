//! Dispatcher, Manager and Unix socket host.
//!
//! Methods are registered on a [`Dispatcher`] together with a [`Signature`]
//! describing their named parameters. A [`Manager`] turns request bytes
//! into response bytes: it validates the envelope, drops stale requests,
//! binds arguments (injecting [`Context`] values and the request itself),
//! runs the method and encodes the outcome. [`SocketServer`] is one host
//! for a manager; any transport that moves bytes will do.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use courier_server::{Dispatcher, Manager, ServerConfig, Signature, SocketServer};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut dispatcher = Dispatcher::new();
//!     dispatcher.register_fn("add", Signature::new().required("a").required("b"), |args| {
//!         Ok(args.get::<i64>("a")? + args.get::<i64>("b")?)
//!     });
//!
//!     let server = SocketServer::new(ServerConfig::default()).await?;
//!     server.serve(Arc::new(Manager::new(dispatcher))).await?;
//!     Ok(())
//! }
//! ```

mod args;
mod config;
mod dispatcher;
mod error;
mod manager;
mod signature;
mod socket;

pub use args::{Args, Context, ContextValue, MethodError};
pub use config::{ServerConfig, default_socket_path};
pub use dispatcher::{AsyncFnMethod, Dispatcher, FnMethod, Method, MethodFuture};
pub use error::{ServeError, ServeResult};
pub use manager::{Manager, Outcome};
pub use signature::{CallCheck, Param, Signature};
pub use socket::{Connection, SocketServer};
