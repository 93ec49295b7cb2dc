//! Commands for reading and authenticating the card

use bytes::Bytes;
use tangem_card::VerifyCodeRequest;
use tangem_card::constants::HASH_ALG_SHA256;
use tracing::info;

use super::Card;
use crate::utils::{self, CliResult, display};

/// Read the card and display its state
pub fn read_command(card: &mut Card) -> CliResult {
    let state = card.read()?;
    println!("{}", display::card_state(state));
    Ok(())
}

/// Confirm the card key
pub fn verify_command(card: &mut Card) -> CliResult {
    card.read()?;
    if card.verify_card()? {
        println!("{}", display::success("Card is genuine"));
    } else {
        println!("{}", display::warning("Card signature did not verify"));
    }
    Ok(())
}

/// Confirm the wallet key
pub fn check_wallet_command(card: &mut Card) -> CliResult {
    card.read()?;
    if card.check_wallet()? {
        println!("{}", display::success("Wallet key verified"));
    } else {
        println!("{}", display::warning("Wallet signature did not verify"));
    }
    Ok(())
}

/// Bump the validation counter
pub fn validate_command(card: &mut Card) -> CliResult {
    card.read()?;
    let validation = card.validate_card()?;

    println!(
        "{}",
        display::key_value_box(
            "Card validated",
            vec![
                (
                    "Counter",
                    validation
                        .counter
                        .map_or_else(|| "not reported".into(), |c| c.to_string()),
                ),
                (
                    "Signature",
                    validation
                        .signature
                        .map_or_else(|| "not reported".into(), alloy_primitives::hex::encode),
                ),
            ],
        )
    );
    Ok(())
}

/// Hash code pages with a challenge
pub fn verify_code_command(
    card: &mut Card,
    address: u32,
    count: u16,
    challenge: Option<&str>,
) -> CliResult {
    let challenge = match challenge {
        Some(hex) => utils::parse_hex(hex)?,
        None => rand_v8::random::<[u8; 16]>().to_vec(),
    };

    card.read()?;
    info!(address, count, "Verifying code pages");
    let hash = card.verify_code(&VerifyCodeRequest {
        hash_alg: HASH_ALG_SHA256.to_string(),
        code_page_address: address,
        code_page_count: count,
        challenge: Bytes::from(challenge.clone()),
    })?;

    println!(
        "{}",
        display::key_value_box(
            "Code hash",
            vec![
                ("Challenge", alloy_primitives::hex::encode(&challenge)),
                ("Hash", alloy_primitives::hex::encode(&hash)),
            ],
        )
    );
    Ok(())
}
