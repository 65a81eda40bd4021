use clap::Parser;
use log::info;
use server::config::ServerConfig;
use server::network::{Server, ServerMessage};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value_t = shared::DEFAULT_PORT)]
    port: u16,

    /// Maximum number of simultaneous connections
    #[arg(short, long, default_value = "64")]
    max_clients: usize,

    /// Send a `rejected` event to clients whose events are dropped
    #[arg(long)]
    notify_rejections: bool,

    /// Do not send the current user list to newly connected clients
    #[arg(long)]
    no_join_sync: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let config = ServerConfig {
        host: args.host,
        port: args.port,
        max_clients: args.max_clients,
        notify_rejections: args.notify_rejections,
        sync_on_join: !args.no_join_sync,
    };

    info!("Starting presence server on {}", config.address());
    info!("Max clients: {}", config.max_clients);

    let server = Server::bind(config).await?;
    let shutdown = server.handle();
    let server_task = tokio::spawn(server.run());

    tokio::select! {
        result = server_task => {
            if let Err(e) = result {
                eprintln!("Server task panicked: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
            let _ = shutdown.send(ServerMessage::Shutdown);
        }
    }

    Ok(())
}
