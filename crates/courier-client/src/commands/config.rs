//! Configuration commands.

use crate::config::ClientConfig;
use crate::error::{CommandError, CommandResult};

/// Dump the effective configuration to stdout.
pub fn dump(config: &ClientConfig) -> CommandResult<()> {
    println!("# config.toml ({})", ClientConfig::default_path().display());
    println!("{}", render(config)?);
    Ok(())
}

/// Show the configuration file path.
pub fn path() -> CommandResult<()> {
    let config_path = ClientConfig::default_path();
    println!("config: {}", config_path.display());
    Ok(())
}

fn render(config: &ClientConfig) -> CommandResult<String> {
    toml::to_string_pretty(config)
        .map_err(|e| CommandError::Output(format!("failed to serialize config: {e}")))
}
