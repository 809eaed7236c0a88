//! cmux - command-line client for the cmux control socket

use std::time::Duration;

use serde_json::Value;

use cmux_client::Client;
use cmux_utils::{init_logging_with_config, CmuxError, LogConfig, Result};

mod cli;

use cli::{command_line, Args, Command};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse_args();
    init_logging_with_config(LogConfig::client())?;
    tracing::debug!("CLI args: {:?}", args);

    match run(args).await {
        Ok(()) => Ok(()),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let mut client = Client::discover(args.socket.as_deref())
        .await?
        .with_timeout(Duration::from_millis(args.timeout));
    tracing::debug!(socket = %client.socket_path().display(), "Using socket");

    if let Some(password) = &args.password {
        client.login(password).await?;
    }

    match args.command {
        Command::V1(words) => {
            let reply = client.command(&command_line(&words)).await?;
            println!("{}", reply);
        }
        Command::Rpc { method, params } => {
            let params = match params {
                Some(raw) => serde_json::from_str::<Value>(&raw)
                    .map_err(|e| CmuxError::InvalidMessage(format!("params: {}", e)))?,
                None => Value::Object(Default::default()),
            };
            if args.json {
                let response = client.call_raw(&method, params).await?;
                println!("{}", response.to_line());
                if !response.ok {
                    std::process::exit(1);
                }
            } else {
                let result = client.call(&method, params).await?;
                let pretty = serde_json::to_string_pretty(&result)
                    .map_err(|e| CmuxError::internal(e.to_string()))?;
                println!("{}", pretty);
            }
        }
    }
    Ok(())
}
