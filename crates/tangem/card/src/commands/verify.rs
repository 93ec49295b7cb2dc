use tangem_apdu_core::prelude::*;
use tracing::{info, warn};

use crate::constants::CURVE_SECP256K1;
use crate::crypto;
use crate::types::CardStatus;
use crate::{Error, Result, Tangem};

impl<T: CardTransport> Tangem<T> {
    /// Challenge the card key
    ///
    /// The card signs `challenge ‖ salt` with its card key. The outcome is
    /// recorded in the card state; a bad signature is not an error.
    pub fn verify_card(&mut self) -> Result<bool> {
        self.sync_token();
        let card_public_key = self
            .state
            .card_public_key
            .clone()
            .ok_or(Error::ReadRequired)?;
        if self.state.status == Some(CardStatus::NotPersonalized) {
            self.state.manufacturer_confirmed = Some(false);
            return Ok(false);
        }

        let challenge = self.crypto.challenge();
        let frame = self
            .command(Instruction::VerifyCard)?
            .with_tlv(Tlv::new(TlvTag::Challenge, challenge.to_vec()));

        let response = match self.run(frame, false) {
            Ok(response) => response,
            Err(e) => {
                if !matches!(e, Error::InvalidPin) {
                    self.state.manufacturer_confirmed = Some(false);
                }
                return Err(e);
            }
        };

        let salt = response.tlvs().require(TlvTag::Salt)?;
        let signature = response.tlvs().require(TlvTag::CardSignature)?;
        let valid = crypto::verify(
            &card_public_key,
            &[&challenge[..], salt].concat(),
            signature,
        );

        if !valid {
            warn!("Card signature verification failed");
        }
        self.state.card_public_key_valid = Some(valid);
        self.state.manufacturer_confirmed = Some(valid);
        info!(valid, "Card verified");
        Ok(valid)
    }

    /// Challenge the wallet key
    ///
    /// Same scheme as [`verify_card`](Self::verify_card) with the wallet key.
    pub fn check_wallet(&mut self) -> Result<bool> {
        self.sync_token();
        match self.state.status {
            None => return Err(Error::ReadRequired),
            Some(CardStatus::NotPersonalized) => return Ok(false),
            Some(CardStatus::Loaded) => {}
            Some(_) => return Err(Error::InvalidState("card must be loaded")),
        }

        let challenge = self.crypto.challenge();
        let frame = self
            .command(Instruction::CheckWallet)?
            .with_tlv(Tlv::new(TlvTag::Challenge, challenge.to_vec()));
        let response = self.run(frame, false)?;

        let salt = response.tlvs().require(TlvTag::Salt)?;
        let signature = response.tlvs().require(TlvTag::Signature)?;

        let valid = match (&self.state.wallet_public_key, self.state.curve_id.as_deref()) {
            (Some(key), Some(CURVE_SECP256K1)) => crypto::verify(
                &key.uncompressed,
                &[&challenge[..], salt].concat(),
                signature,
            ),
            (_, curve) => {
                warn!(?curve, "No secp256k1 wallet key to check against");
                false
            }
        };

        self.state.wallet_public_key_valid = Some(valid);
        info!(valid, "Wallet checked");
        Ok(valid)
    }
}
