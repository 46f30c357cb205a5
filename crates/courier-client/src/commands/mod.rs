//! Implementations of the `courier` subcommands.

pub mod call;
pub mod config;
