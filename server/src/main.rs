use clap::Parser;
use log::info;
use server::config::{Args, ServerConfig};
use server::network::Server;
use server::rating::DefaultElo;
use server::storage::InMemoryStore;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        println!("Tip: Set RUST_LOG=info to see server logs");
        println!("Example: RUST_LOG=info cargo run --bin server");
    }

    let config = ServerConfig::from(Args::parse());
    info!("Starting server with {:?}", config);

    let server = Server::bind(config, Arc::new(InMemoryStore::new()), Arc::new(DefaultElo)).await?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
