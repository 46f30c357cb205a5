//! Core helpers: unix-seconds clock, tracing setup

pub mod time;
pub mod tracing;

pub use time::{Timestamp, expires_at, is_expired, now_seconds};
pub use tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};
