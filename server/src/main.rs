use clap::Parser;
use log::{error, info};
use server::config::ArenaConfig;
use server::network::{Server, ServerMessage};
use server::registry::RoomRegistry;
use std::path::PathBuf;
use std::time::Duration;

/// Authoritative server for the two-seat grid arena
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Tick rate (scheduler passes per second)
    #[arg(short, long, default_value = "20")]
    tick_rate: u32,

    /// Maximum number of connected clients
    #[arg(short, long, default_value = "64")]
    max_clients: usize,

    /// Seconds of silence before a client is dropped
    #[arg(long, default_value = "5")]
    client_timeout_secs: u64,

    /// Match length in seconds
    #[arg(long)]
    match_secs: Option<u64>,

    /// Seconds between modifier throws
    #[arg(long)]
    modifier_secs: Option<u64>,

    /// JSON file with arena tuning; missing fields use defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Fixed RNG seed for reproducible matches
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ArenaConfig::from_json_file(path)?,
        None => ArenaConfig::default(),
    };
    config.override_timers(args.match_secs, args.modifier_secs);

    info!("Starting arena server on {}:{}", args.host, args.port);
    info!(
        "Tick rate: {} Hz, max clients: {}, match: {}s, modifiers every {}s",
        args.tick_rate,
        args.max_clients,
        config.match_duration_ms / 1000,
        config.modifier_interval_ms / 1000
    );

    let registry = match args.seed {
        Some(seed) => {
            info!("Using fixed seed {}", seed);
            RoomRegistry::with_seed(config, seed)
        }
        None => RoomRegistry::new(config),
    };

    let tick_duration = Duration::from_secs_f64(1.0 / args.tick_rate.max(1) as f64);
    let addr = format!("{}:{}", args.host, args.port);

    let mut server = Server::new(
        &addr,
        tick_duration,
        args.max_clients,
        Duration::from_secs(args.client_timeout_secs),
        registry,
    )
    .await?;

    let shutdown = server.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, shutting down gracefully...");
            let _ = shutdown.send(ServerMessage::Shutdown);
        }
    });

    if let Err(e) = server.run().await {
        error!("Server error: {}", e);
        return Err(e);
    }

    Ok(())
}
