//! Engine setup for the Tangem CLI

use std::sync::Arc;
use std::time::Duration;

use colored::Colorize;
use tangem_apdu_transport_pcsc::PcscTransport;
use tangem_card::{
    BatchSubstitutions, DelayObserver, EvmCoinEngine, SessionConfig, Tangem,
};

use super::SessionArgs;

/// Prints security delays and progress as they happen
#[derive(Debug, Default)]
pub struct ConsoleObserver;

impl DelayObserver for ConsoleObserver {
    fn on_security_delay(&self, remaining: Duration) {
        println!(
            "{} {:.1}s remaining, keep the card on the reader",
            "Security delay:".yellow().bold(),
            remaining.as_secs_f32()
        );
    }

    fn on_progress(&self, percent: u8) {
        println!("{} {percent}%", "Progress:".blue());
    }
}

/// Build the engine for a connected reader
pub fn open_card(transport: PcscTransport, args: &SessionArgs) -> Tangem<PcscTransport> {
    let config = SessionConfig::default().with_max_encryption(args.max_encryption.into());

    let mut card = Tangem::with_config(transport, config)
        .with_coin_engine(EvmCoinEngine::default())
        .with_substitutions(BatchSubstitutions::historic())
        .with_observer(Arc::new(ConsoleObserver));

    if let Some(pin) = &args.pin {
        card.set_pin(pin);
    }
    if let Some(pin2) = &args.pin2 {
        card.set_pin2(pin2);
    }
    card
}
