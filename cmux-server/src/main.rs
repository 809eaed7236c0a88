//! cmux control socket server binary

use tracing::{error, info};

use cmux_server::access::AccessGate;
use cmux_server::config::ConfigLoader;
use cmux_server::{listener, SharedState};
use cmux_utils::{default_socket_path, init_logging_with_config, LogConfig, Result};

async fn run_server() -> Result<()> {
    info!("cmux server starting");

    let config = ConfigLoader::load_and_validate()?;
    let socket_path = config
        .socket
        .path
        .clone()
        .unwrap_or_else(default_socket_path);
    let gate = AccessGate::from_config(&config.socket);
    let shared_state = SharedState::new(config, gate, socket_path);

    let shutdown_tx = shared_state.shutdown_tx.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupt received, shutting down");
                let _ = shutdown_tx.send(());
            }
            Err(e) => error!("Failed to listen for ctrl-c: {}", e),
        }
    });

    listener::serve(shared_state).await?;

    info!("cmux server stopped");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging_with_config(LogConfig::server())?;
    run_server().await
}
