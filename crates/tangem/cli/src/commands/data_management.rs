//! Commands for issuer data

use alloy_primitives::hex;
use bytes::Bytes;

use super::Card;
use crate::utils::{self, CliResult, display};

/// Read and verify issuer data
pub fn get_issuer_data_command(card: &mut Card, extra: bool) -> CliResult {
    card.read()?;

    if extra {
        match card.get_issuer_data_ex()? {
            Some(data) => println!(
                "{}",
                display::key_value_box(
                    "Extra issuer data",
                    vec![("Size", data.len().to_string()), ("Data", hex::encode(&data))],
                )
            ),
            None => println!("No extra issuer data"),
        }
        return Ok(());
    }

    let Some(records) = card.get_issuer_data()? else {
        println!("No issuer data");
        return Ok(());
    };
    let counter = card.state().issuer_data.as_ref().and_then(|data| data.counter);
    let hex_or_none = |value: Option<Bytes>| value.map_or_else(|| "-".to_string(), hex::encode);
    println!(
        "{}",
        display::key_value_box(
            "Issuer data",
            vec![
                ("Validated balance", hex_or_none(records.validated_balance)),
                ("Denomination", hex_or_none(records.denomination)),
                (
                    "Denomination text",
                    records.denomination_text.unwrap_or_else(|| "-".to_string()),
                ),
                ("Last sign date", hex_or_none(records.last_sign_date)),
                ("Counter", counter.map_or_else(|| "-".to_string(), |c| c.to_string())),
            ],
        )
    );
    Ok(())
}

/// Sign issuer data and write it
pub fn write_issuer_data_command(card: &mut Card, data: &str, key: &str, extra: bool) -> CliResult {
    let data = utils::parse_hex(data)?;
    let key = utils::parse_signing_key(key)?;

    card.read()?;
    if extra {
        card.write_issuer_data_ex(&data, &key)?;
    } else {
        card.write_issuer_data_signed(Bytes::from(data), &key)?;
    }
    println!("{}", display::success("Issuer data written"));
    Ok(())
}
