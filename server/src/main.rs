use clap::Parser;
use log::info;
use server::network::{Server, ServerConfig};
use shared::config::check_divider;
use shared::{NetFlags, Shutdown, DEFAULT_NETWORK_TICK_DIVIDER};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Endpoint to accept proxy connections on (tcp:// or ws://)
    #[arg(short, long, default_value = "tcp://127.0.0.1:9000")]
    bind: String,

    /// Simulation steps per sent broadcast
    #[arg(short = 'd', long, default_value_t = DEFAULT_NETWORK_TICK_DIVIDER)]
    network_tick_divider: u16,

    /// Simulation steps per second
    #[arg(short, long, default_value = "60")]
    tick_rate: u32,

    #[command(flatten)]
    net: NetFlags,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    args.net.validate()?;

    let config = ServerConfig {
        bind: args.bind,
        network_tick_divider: check_divider(args.network_tick_divider)?,
        tick_rate: args.tick_rate,
        ..Default::default()
    };

    info!("Starting server...");
    let server = Server::bind(config).await?;

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

    server.run(shutdown).await?;
    Ok(())
}
