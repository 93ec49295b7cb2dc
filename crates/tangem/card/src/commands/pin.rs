use std::time::Duration;

use derive_more::Display;
use tangem_apdu_core::prelude::*;
use tracing::{debug, info};
use zeroize::Zeroizing;

use crate::application::{Exchange, check_status};
use crate::constants::DEFAULT_PIN2;
use crate::crypto;
use crate::types::{FirmwareVersion, Setting};
use crate::{Error, Result, Tangem};

/// Outcome of SwapPin
///
/// `90 00` means nothing changed; this is the only command where that status
/// is read that way.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum SwapPinOutcome {
    /// Both PINs were already set to the submitted values
    #[display("PINs not changed")]
    PinsNotChanged,
    /// PIN1 changed
    #[display("PIN1 changed")]
    Pin1Changed,
    /// PIN2 changed
    #[display("PIN2 changed")]
    Pin2Changed,
    /// Both PINs changed
    #[display("PIN1 and PIN2 changed")]
    PinsChanged,
    /// The card started a security delay and the caller chose not to wait
    #[display("security delay, {remaining:?} remaining")]
    NeedPause {
        /// Remaining delay
        remaining: Duration,
    },
}

impl SwapPinOutcome {
    /// Whether the card accepted the submitted PINs
    pub const fn is_accepted(&self) -> bool {
        !matches!(self, Self::NeedPause { .. })
    }
}

impl<T: CardTransport> Tangem<T> {
    /// Change PIN1 and/or PIN2
    ///
    /// Submitting the current values checks them without changing anything.
    /// With `break_on_pause` the first security delay is returned as
    /// [`SwapPinOutcome::NeedPause`] instead of being waited out.
    pub fn swap_pin(
        &mut self,
        new_pin: &str,
        new_pin2: &str,
        break_on_pause: bool,
    ) -> Result<SwapPinOutcome> {
        self.sync_token();
        let pin2 = Zeroizing::new(self.pin2.to_string());
        self.swap_pin_with(&pin2, new_pin, new_pin2, break_on_pause)
    }

    fn swap_pin_with(
        &mut self,
        pin2: &str,
        new_pin: &str,
        new_pin2: &str,
        break_on_pause: bool,
    ) -> Result<SwapPinOutcome> {
        let frame = self
            .command(Instruction::SwapPin)?
            .with_tlv(Tlv::new(TlvTag::Pin2, crypto::pin_hash(pin2).to_vec()))
            .with_tlv(Tlv::new(TlvTag::NewPin, crypto::pin_hash(new_pin).to_vec()))
            .with_tlv(Tlv::new(TlvTag::NewPin2, crypto::pin_hash(new_pin2).to_vec()));

        let response = match self.transceive(frame, break_on_pause)? {
            Exchange::NeedPause { remaining } => {
                debug!(?remaining, "PIN swap interrupted by security delay");
                return Ok(SwapPinOutcome::NeedPause { remaining });
            }
            Exchange::Completed(response) => response,
        };

        let outcome = match response.status() {
            Status::ProcessCompleted => SwapPinOutcome::PinsNotChanged,
            Status::Pin1Changed => SwapPinOutcome::Pin1Changed,
            Status::Pin2Changed => SwapPinOutcome::Pin2Changed,
            Status::PinsChanged => SwapPinOutcome::PinsChanged,
            _ => {
                let error = check_status(response).err().unwrap_or(Error::InvalidData(
                    "unexpected PIN swap status",
                ));
                if matches!(error, Error::InvalidPin) && pin2 == DEFAULT_PIN2 {
                    self.state.use_default_pin2 = Some(false);
                }
                return Err(error);
            }
        };

        self.state.use_default_pin2 = Some(new_pin2 == DEFAULT_PIN2);
        self.set_pin(new_pin);
        self.set_pin2(new_pin2);
        info!(%outcome, "PIN swap completed");
        Ok(outcome)
    }

    /// Find out whether PIN2 is still the default
    ///
    /// Probes with a no-op swap to the default PIN2 without waiting out a
    /// security delay. Only firmware that answers such a probe immediately is
    /// asked; for the rest the flag becomes unknown.
    pub fn check_pin2_is_default(&mut self) -> Result<Option<bool>> {
        self.sync_token();
        let firmware = self.state.firmware.clone().ok_or(Error::ReadRequired)?;

        let smart_delay = self
            .state
            .settings
            .is_some_and(|settings| settings.contains(Setting::SmartSecurityDelay));
        let answers_immediately = firmware > FirmwareVersion::new(1, 19)
            || (firmware > FirmwareVersion::new(1, 12)
                && (self.state.security_delay.is_zero() || smart_delay));

        let is_default = if answers_immediately {
            let pin = Zeroizing::new(self.pin.to_string());
            match self.swap_pin_with(DEFAULT_PIN2, &pin, DEFAULT_PIN2, true) {
                Ok(SwapPinOutcome::NeedPause { .. }) => None,
                Ok(_) => Some(true),
                Err(Error::InvalidPin) => Some(false),
                Err(e) => return Err(e),
            }
        } else {
            debug!(%firmware, "Firmware cannot probe PIN2 without a delay");
            None
        };

        self.state.use_default_pin2 = is_default;
        Ok(is_default)
    }
}
