//! `call` and `notify`.

use serde_json::Value;
use tracing::debug;

use crate::cli::CallArgs;
use crate::client::{CallOptions, Client};
use crate::error::{CommandError, CommandResult};
use crate::transport::Transport;

fn call_options(args: &CallArgs, rsvp: bool) -> CallOptions {
    let mut options = CallOptions::new().rsvp(rsvp);
    options.ttl = args.ttl;
    options.id = args.id.clone();
    if args.durable {
        options = options.durable();
    }
    options
}

/// Calls the method and prints its result as pretty JSON.
pub async fn call<T: Transport>(client: &Client<T>, args: &CallArgs) -> CommandResult<()> {
    let result = client
        .call_with(&args.method, args.params(), call_options(args, true))
        .await?
        .unwrap_or_default();
    println!("{}", render(&result)?);
    Ok(())
}

/// Sends the method as a notification.
pub async fn notify<T: Transport>(client: &Client<T>, args: &CallArgs) -> CommandResult<()> {
    client
        .call_with(&args.method, args.params(), call_options(args, false))
        .await?;
    debug!(method = %args.method, "notification sent");
    Ok(())
}

fn render(result: &Value) -> CommandResult<String> {
    serde_json::to_string_pretty(result).map_err(|e| CommandError::Output(e.to_string()))
}
