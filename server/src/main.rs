use clap::Parser;
use log::{info, warn};
use server::config::{protection_from_secs, ServerConfig};
use server::network::{Server, ServerMessage};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Maximum number of concurrent players
    #[arg(short, long, default_value = "32")]
    max_clients: usize,

    /// Number of apples kept in the arena
    #[arg(short, long, default_value = "1")]
    apples: usize,

    /// Spawn protection in seconds
    #[arg(long, default_value = "3.0")]
    protection_secs: f32,

    /// Seconds of silence before a player is dropped
    #[arg(long, default_value = "5")]
    timeout_secs: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let config = ServerConfig {
        max_clients: args.max_clients,
        apple_count: args.apples,
        protection: protection_from_secs(args.protection_secs)?,
        client_timeout: Duration::from_secs(args.timeout_secs),
        ..ServerConfig::default()
    };

    let address = format!("{}:{}", args.host, args.port);
    info!("Starting server on {}", address);
    info!(
        "Max clients: {}, apples: {}, protection: {:?}",
        config.max_clients, config.apple_count, config.protection
    );

    let mut server = Server::new(&address, config).await?;

    let handle = server.handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl+C received, shutting down");
            if handle.send(ServerMessage::Shutdown).is_err() {
                warn!("Server loop already stopped");
            }
        }
    });

    server.run().await?;

    Ok(())
}
