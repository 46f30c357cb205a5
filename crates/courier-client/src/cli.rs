//! Command-line interface definition.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use serde_json::Value;

use courier_protocol::Params;

/// courier - call methods on a courier socket host
#[derive(Debug, Parser)]
#[command(name = "courier")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, env = "COURIER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, short = 'v')]
    pub debug: bool,

    /// Path to the server socket
    #[arg(long, env = "COURIER_SOCKET")]
    pub socket_path: Option<PathBuf>,

    /// Connection timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Call a method and print its result as JSON
    Call(CallArgs),

    /// Send a method as a notification
    Notify(CallArgs),

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Arguments shared by `call` and `notify`.
#[derive(Debug, Args)]
pub struct CallArgs {
    /// Method name
    pub method: String,

    /// Parameters as name=value; values are parsed as JSON, falling back to strings
    #[arg(value_parser = parse_param)]
    pub params: Vec<(String, Value)>,

    /// Seconds before the request goes stale
    #[arg(long, conflicts_with = "durable")]
    pub ttl: Option<f64>,

    /// Never let the request go stale
    #[arg(long)]
    pub durable: bool,

    /// Request id (generated when omitted)
    #[arg(long)]
    pub id: Option<String>,
}

impl CallArgs {
    /// Collects the parameters; a repeated name keeps the last value.
    pub fn params(&self) -> Params {
        self.params.iter().cloned().collect()
    }
}

/// Configuration actions.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Dump current configuration
    Dump,

    /// Show configuration file path
    Path,
}

fn parse_param(raw: &str) -> Result<(String, Value), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got '{raw}'"))?;
    if name.is_empty() {
        return Err(format!("missing parameter name in '{raw}'"));
    }

    let value =
        serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((name.to_string(), value))
}
