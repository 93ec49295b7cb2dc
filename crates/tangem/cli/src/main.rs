use clap::Parser;
use tangem_apdu_transport_pcsc::PcscDeviceManager;
use tangem_card::tasks;
use tracing::{info, warn};

mod commands;
mod utils;

use commands::{Commands, list_readers};
use utils::{CliResult, SessionArgs, reader, session};

#[derive(Parser)]
#[command(version, about = "Tangem CLI for reading and using Tangem cards")]
struct Cli {
    /// Optional reader name to use (will auto-detect if not specified)
    #[arg(short, long, global = true)]
    reader: Option<String>,

    /// Trace level output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// PINs and session options
    #[command(flatten)]
    session: SessionArgs,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> CliResult {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let manager = PcscDeviceManager::new()?;
    if matches!(cli.command, Commands::List) {
        return list_readers(&manager);
    }

    let transport = reader::connect(&manager, cli.reader.as_deref(), &cli.session)?;
    info!(reader = transport.reader_name(), "Using reader");

    let card = session::open_card(transport, &cli.session);

    // Ctrl-C stops the operation at the next exchange, even mid security delay
    let cancel = card.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling");
            cancel.cancel();
        }
    });

    let command = cli.command;
    let (_, outcome) =
        tasks::run_blocking(card, move |card| Ok(commands::execute(card, &command))).await?;
    outcome?
}

fn setup_logging(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_ansi(true)
        .init();
}
