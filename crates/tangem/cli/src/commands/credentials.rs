//! Commands for managing PINs

use tangem_card::SwapPinOutcome;

use super::Card;
use crate::utils::{CliResult, display};

/// Change PIN1 and PIN2
pub fn swap_pin_command(
    card: &mut Card,
    new_pin: &str,
    new_pin2: &str,
    no_wait: bool,
) -> CliResult {
    card.read()?;
    match card.swap_pin(new_pin, new_pin2, no_wait)? {
        SwapPinOutcome::NeedPause { remaining } => {
            println!(
                "{}",
                display::warning(&format!(
                    "Security delay running ({:.1}s left), try again",
                    remaining.as_secs_f32()
                ))
            );
        }
        outcome => println!("{}", display::success(&outcome.to_string())),
    }
    Ok(())
}

/// Report whether PIN2 is the default
pub fn check_pin2_command(card: &mut Card) -> CliResult {
    card.read()?;
    let message = match card.check_pin2_is_default()? {
        Some(true) => display::warning("PIN2 is the default, consider changing it"),
        Some(false) => display::success("PIN2 has been changed"),
        None => display::warning("This card cannot tell without a security delay"),
    };
    println!("{message}");
    Ok(())
}
