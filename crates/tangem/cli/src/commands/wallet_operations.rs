//! Commands for wallet management and signing

use alloy_primitives::hex;
use tangem_card::SignOptions;
use tracing::info;

use super::Card;
use crate::utils::{self, CliResult, display};

/// Generate the wallet key
pub fn create_wallet_command(card: &mut Card) -> CliResult {
    card.read()?;
    card.create_wallet()?;

    println!("{}", display::success("Wallet created"));
    println!("{}", display::card_state(card.state()));
    Ok(())
}

/// Destroy the wallet key after confirmation
pub fn purge_wallet_command(card: &mut Card, skip_confirmation: bool) -> CliResult {
    card.read()?;
    if !skip_confirmation
        && !utils::confirm("The wallet key will be destroyed and any funds lost. Continue?")
    {
        println!("{}", display::warning("Purge aborted"));
        return Ok(());
    }

    card.purge_wallet()?;
    let status = card
        .state()
        .status
        .map_or_else(|| "unknown".to_string(), |status| status.to_string());
    println!("{}", display::success(&format!("Wallet purged, card is {status}")));
    Ok(())
}

/// Sign hashes or a raw transaction
pub fn sign_command(
    card: &mut Card,
    data: &[String],
    raw: bool,
    issuer_key: Option<&str>,
) -> CliResult {
    let mut options = SignOptions::default();
    if let Some(key) = issuer_key {
        options = options.with_issuer_transaction_key(utils::parse_signing_key(key)?);
    }
    let payloads = data
        .iter()
        .map(|item| utils::parse_hex(item))
        .collect::<CliResult<Vec<_>>>()?;

    card.read()?;
    let response = if raw {
        let [transaction] = payloads.as_slice() else {
            return Err("--raw takes exactly one transaction".into());
        };
        card.sign_raw(transaction, &options)?
    } else {
        card.sign_with(payloads.as_slice(), &options)?
    };
    info!(count = response.signatures.len(), "Signing finished");

    println!("{}", display::section_title("Signatures"));
    for (i, signature) in response.signatures.iter().enumerate() {
        println!("  {}. {}", i + 1, hex::encode(signature));
    }
    if let Some(remaining) = response.remaining_signatures {
        println!("  Remaining signatures: {remaining}");
    }
    Ok(())
}
