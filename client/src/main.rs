use clap::Parser;
use client::network::{Client, ClientConfig};
use log::info;
use shared::config::check_divider;
use shared::{Codec, NetFlags, Shutdown, DEFAULT_NETWORK_TICK_DIVIDER};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Proxy endpoint to connect to (tcp:// or ws://)
    #[arg(short, long, default_value = "tcp://127.0.0.1:9001")]
    proxy: String,

    /// Must match the server's network tick divider
    #[arg(short = 'd', long, default_value_t = DEFAULT_NETWORK_TICK_DIVIDER)]
    network_tick_divider: u16,

    /// Stop after this many simulation steps
    #[arg(long)]
    steps: Option<u64>,

    /// Say something after connecting
    #[arg(long)]
    say: Option<String>,

    /// Stand still instead of wandering around
    #[arg(long)]
    idle: bool,

    /// Seed for the wander pattern
    #[arg(long, default_value = "7")]
    seed: u64,

    #[command(flatten)]
    net: NetFlags,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    args.net.validate()?;

    let config = ClientConfig {
        proxy: args.proxy,
        network_tick_divider: check_divider(args.network_tick_divider)?,
        steps: args.steps,
        say: args.say,
        idle: args.idle,
        seed: args.seed,
        ..Default::default()
    };

    info!("Starting client, connecting to {}", config.proxy);
    let client = Client::new(config, Arc::new(Codec::standard()))?;

    let shutdown = Shutdown::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Received Ctrl+C, shutting down gracefully...");
            }
            shutdown.trigger();
        });
    }

    let state = client.run(shutdown).await;
    if let Some(position) = state.local_position() {
        info!("Final position ({:.1}, {:.1})", position.x, position.y);
    }
    Ok(())
}
