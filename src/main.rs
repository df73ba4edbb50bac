//! Room-based WebSocket Broadcast Server - Entry Point
//!
//! Starts the TCP listener and the RoomHub, accepting connections until
//! ctrl-c, then shuts every room down.

use std::env;

use tokio::net::TcpListener;
use tracing::{error, info, trace};
use tracing_subscriber::EnvFilter;

use chat_hub::{handle_connection, HandlerError, Message, MessageType, RoomHub, ServerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging with environment filter
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=chat_hub=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("chat_hub=info")),
        )
        .init();

    // Get bind address from command line or use default
    let mut config = ServerConfig::default();
    if let Some(addr) = env::args().nth(1) {
        config = config.bind(addr);
    }

    // Start TCP listener
    let listener = TcpListener::bind(&config.bind_addr).await?;
    info!("WebSocket Chat Hub listening on {}", config.bind_addr);

    let hub = RoomHub::new(config.clone());
    if let Some(name) = &config.default_room {
        let room = hub.new_room(name)?;
        info!(room = %room.name, id = %room.id, "Default room ready");
    }

    hub.add_handler(|msg: &mut Message, _hub: &RoomHub| -> Result<(), HandlerError> {
        if msg.kind == MessageType::Message {
            trace!(from = %msg.from, room = %msg.room, "Got a message: {}", msg.data);
        } else {
            info!(from = %msg.from, "Command: {}", msg.kind);
        }
        Ok(())
    });

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    // Connection accept loop
    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) => {
                    info!("New connection from {}", addr);
                    let hub = hub.clone();

                    // Spawn handler task for each connection
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, hub).await {
                            error!("Connection handler error: {}", e);
                        }
                    });
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                }
            },
            signal = &mut shutdown => {
                if let Err(e) = signal {
                    error!("Failed to listen for shutdown signal: {}", e);
                }
                break;
            }
        }
    }

    hub.shutdown_and_wait().await;
    info!("Chat Hub stopped");
    Ok(())
}
