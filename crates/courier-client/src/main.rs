//! courier CLI entry point.

use std::process::ExitCode;

use clap::Parser;
use tracing::Level;

use courier_client::cli::{Cli, Command, ConfigAction};
use courier_client::commands;
use courier_client::config::ClientConfig;
use courier_client::error::CommandResult;
use courier_client::{Client, UnixSocketTransport};
use courier_core::{TracingConfig, TracingOutputFormat, init_tracing};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let tracing = if cli.debug {
        TracingConfig::debug()
    } else {
        TracingConfig::default()
            .with_level(Level::WARN)
            .with_format(TracingOutputFormat::Compact)
    };
    if let Err(e) = init_tracing(tracing) {
        eprintln!("warning: {e}");
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> CommandResult<()> {
    let mut config = match cli.config {
        Some(ref path) => ClientConfig::load_from(path)?,
        None => ClientConfig::load()?,
    };
    if let Some(path) = cli.socket_path {
        config.server.socket_path = Some(path);
    }
    if let Some(timeout) = cli.timeout {
        config.server.timeout = timeout;
    }

    match cli.command {
        Command::Call(args) => commands::call::call(&client(&config), &args).await,
        Command::Notify(args) => commands::call::notify(&client(&config), &args).await,
        Command::Config { action } => match action {
            ConfigAction::Dump => commands::config::dump(&config),
            ConfigAction::Path => commands::config::path(),
        },
    }
}

fn client(config: &ClientConfig) -> Client<UnixSocketTransport> {
    Client::new(config.transport()).with_ttl_defaults(config.ttl_defaults())
}
