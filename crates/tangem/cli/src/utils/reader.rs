use tangem_apdu_transport_pcsc::{
    ConnectStrategy, PcscConfig, PcscDeviceManager, PcscReader, PcscTransport,
};
use tracing::debug;

use super::{CliResult, SessionArgs};

/// Find a reader with a specific name
pub fn find_reader_by_name(manager: &PcscDeviceManager, reader_name: &str) -> CliResult<PcscReader> {
    let readers = manager.list_readers()?;

    readers
        .iter()
        .find(|r| r.name() == reader_name)
        .cloned()
        .ok_or_else(|| format!("Reader '{reader_name}' not found").into())
}

/// List all available readers
pub fn list_readers(manager: &PcscDeviceManager) -> CliResult {
    let readers = manager.list_readers()?;

    if readers.is_empty() {
        println!("No readers found!");
        return Ok(());
    }

    println!("Available readers:");
    for (i, reader) in readers.iter().enumerate() {
        println!("{}. {reader}", i + 1);
    }

    Ok(())
}

/// Open the requested reader, or the first one holding a card
///
/// Without a card anywhere, the first reader is opened and the user gets
/// `--wait` seconds to tap one.
pub fn connect(
    manager: &PcscDeviceManager,
    reader_name: Option<&str>,
    args: &SessionArgs,
) -> CliResult<PcscTransport> {
    let config = PcscConfig::default().with_wait_timeout(args.wait_timeout());

    let strategy = match reader_name {
        Some(name) => ConnectStrategy::Reader(find_reader_by_name(manager, name)?.name().to_string()),
        None if manager.list_readers()?.iter().any(PcscReader::has_card) => ConnectStrategy::AnyCard,
        None => ConnectStrategy::FirstAvailable,
    };
    debug!(?strategy, "Connecting");

    let mut transport = manager.connect_strategy(strategy, config)?;
    if !tangem_apdu_core::CardTransport::is_connected(&transport) {
        println!("Tap a card on {}", transport.reader_name());
        transport.wait_for_card()?;
    }
    Ok(transport)
}
