use log::{error, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;

use chat_hub::config::ServerConfig;
use chat_hub::core::ChatServer;
use chat_hub::handlers::routes;

#[tokio::main]
async fn main() {
    // Initialize env
    let dotenv_result = dotenvy::dotenv();

    // Initialize logging
    env_logger::init();

    match dotenv_result {
        Ok(path) => info!("Environment variables loaded from {}", path.display()),
        Err(e) => warn!("Failed to load .env file: {}", e),
    };

    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    info!("Configuration: host={}, port={}", config.host, config.port);

    // Build the server address
    let addr: SocketAddr = match format!("{}:{}", config.host, config.port).parse() {
        Ok(addr) => addr,
        Err(e) => {
            error!("Failed to parse server address: {}", e);
            std::process::exit(1);
        }
    };

    let server = Arc::new(ChatServer::new(config));
    server.start_background_tasks();

    info!("Starting chat hub on {}", addr);

    let (bound, serving) = match warp::serve(routes(server)).try_bind_with_graceful_shutdown(
        addr,
        async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutdown signal received");
        },
    ) {
        Ok(pair) => pair,
        Err(e) => {
            error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    info!("Listening on {}", bound);
    serving.await;
    info!("Chat hub stopped");
}
