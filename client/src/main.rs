use clap::Parser;
use client::network::Client;
use log::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Name shown to other players
    #[arg(short = 'n', long, default_value = "player")]
    nickname: String,

    /// Simulation frames per second
    #[arg(short = 'f', long, default_value = "60")]
    fps: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    info!("Starting client...");
    info!("Connecting to: {}", args.server);
    info!("Controls: type up/down/left/right (or w/a/s/d, ArrowUp, swipe <dx> <dy>), quit to leave");

    let mut client = Client::new(&args.server, &args.nickname, args.fps).await?;

    client.run().await?;

    Ok(())
}
