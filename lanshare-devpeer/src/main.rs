use clap::Parser;
use lanshare_devpeer::{AppState, serve};
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "lanshare-devpeer")]
struct DevPeerArgs {
    #[arg(long, default_value = "127.0.0.1:8080")]
    bind_address: String,
    /// Username reported as the local user.
    #[arg(long, default_value = "me")]
    name: String,
    /// Peer shown as online; repeat for several.
    #[arg(long = "peer")]
    peers: Vec<String>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = DevPeerArgs::parse();
    let listener = match tokio::net::TcpListener::bind(&args.bind_address).await {
        Ok(listener) => listener,
        Err(err) => {
            error!("failed to bind {}: {}", args.bind_address, err);
            std::process::exit(1);
        }
    };

    let state = AppState::new(args.name);
    for peer in args.peers {
        state.add_peer(peer).await;
    }

    info!("dev peer starting on {}", args.bind_address);
    if let Err(err) = serve(listener, state).await {
        warn!("dev peer exited: {}", err);
    }
}
