use clap::Parser;
use log::info;
use proxy::relay::{ProxyConfig, Relay};
use shared::{Codec, Listener, NetFlags, Shutdown};
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Endpoint clients connect to (tcp:// or ws://)
    #[arg(short, long, default_value = "tcp://127.0.0.1:9001")]
    bind: String,

    /// Server endpoint to relay to
    #[arg(short, long, default_value = "tcp://127.0.0.1:9000")]
    upstream: String,

    /// Seconds of client silence before it is dropped
    #[arg(long, default_value = "60")]
    timeout_secs: u64,

    /// Word to mask in chat, may be repeated
    #[arg(long = "banned-word", value_name = "WORD")]
    banned_words: Vec<String>,

    #[command(flatten)]
    net: NetFlags,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    args.net.validate()?;

    let codec = Arc::new(Codec::standard());
    let shutdown = Shutdown::new();

    let config = ProxyConfig {
        upstream: args.upstream,
        timeout: Duration::from_secs(args.timeout_secs),
        banned_words: args.banned_words,
        ..Default::default()
    };

    info!("Starting proxy on {}, relaying to {}", args.bind, config.upstream);
    let listener = Listener::bind(&args.bind, Arc::clone(&codec)).await?;
    let relay = Relay::new(config, codec, shutdown.clone())?;

    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Received Ctrl+C, shutting down gracefully...");
            }
            shutdown.trigger();
        });
    }

    relay.serve(listener).await;
    Ok(())
}
