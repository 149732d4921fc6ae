use std::path::PathBuf;

use clap::Parser;
use lanshare_client::{
    ConfigOverrides, HttpPeerService, Session, SessionSettings,
    console::{self, ConsoleRenderer},
    logging::init_logging,
    resolve_config,
};
use tokio::sync::mpsc;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "lanshare", about = "Terminal client for a LAN chat and file-sharing peer")]
struct ClientArgs {
    /// Optional JSON config file; flags given here override it.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Append logs to this file instead of stderr.
    #[arg(long)]
    log_file: Option<PathBuf>,
    #[command(flatten)]
    overrides: ConfigOverrides,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = ClientArgs::parse();
    init_logging(args.log_file.as_deref());

    let config = match resolve_config(args.config.as_deref(), &args.overrides) {
        Ok(config) => config,
        Err(err) => {
            error!("invalid configuration: {err}");
            std::process::exit(2);
        }
    };

    let service = match HttpPeerService::new(&config.server_url, config.request_timeout()) {
        Ok(service) => service,
        Err(err) => {
            error!("cannot create peer client: {err}");
            std::process::exit(1);
        }
    };

    info!(server = %service.base_url(), "lanshare client starting");
    println!("{}", console::HELP);

    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    console::spawn_stdin_reader(command_tx);

    let session = Session::new(
        service,
        SessionSettings {
            intervals: config.poll_intervals(),
            max_offer_bytes: config.max_offer_bytes,
        },
    );
    let (_, ()) = tokio::join!(
        session.run(command_rx, event_tx),
        console::print_events(event_rx, ConsoleRenderer::new()),
    );
    info!("lanshare client stopped");
}
