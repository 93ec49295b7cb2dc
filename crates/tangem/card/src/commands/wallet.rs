use tangem_apdu_core::prelude::*;
use tracing::info;

use crate::crypto::{self, WalletKey};
use crate::types::{CardStatus, Setting};
use crate::{Error, Result, Tangem};

impl<T: CardTransport> Tangem<T> {
    pub(crate) fn pin2_command(&self, instruction: Instruction) -> Result<CommandFrame> {
        Ok(self
            .command(instruction)?
            .with_tlv(Tlv::new(TlvTag::Pin2, crypto::pin_hash(&self.pin2).to_vec())))
    }

    /// Generate the wallet key on an empty card
    pub fn create_wallet(&mut self) -> Result<()> {
        self.sync_token();
        match self.state.status {
            None => return Err(Error::ReadRequired),
            Some(CardStatus::Empty) => {}
            Some(_) => return Err(Error::InvalidState("card must be empty")),
        }

        let frame = self.pin2_command(Instruction::CreateWallet)?;
        let result = self.run(frame, false);
        self.track_default_pin2(&result);
        let response = result?;

        let mut staged = self.state.clone();
        staged.status = Some(match response.tlvs().uint(TlvTag::Status)? {
            Some(code) => CardStatus::try_from(code)?,
            None => CardStatus::Loaded,
        });
        if let Some(key) = response.tlvs().bytes(TlvTag::WalletPublicKey) {
            staged.wallet_public_key = Some(WalletKey::from_sec1(key)?);
            staged.wallet_public_key_valid = None;
            staged.wallet_address = self.derive_address(&staged);
        }
        self.state = staged;

        info!(card_id = self.state.card_id.as_deref(), "Wallet created");
        Ok(())
    }

    /// Destroy the wallet key
    ///
    /// Reusable cards return to Empty, others become Purged for good.
    pub fn purge_wallet(&mut self) -> Result<()> {
        self.sync_token();
        match self.state.status {
            None => return Err(Error::ReadRequired),
            Some(CardStatus::Loaded) => {}
            Some(_) => return Err(Error::InvalidState("card must be loaded")),
        }
        if self
            .state
            .settings
            .is_some_and(|settings| settings.contains(Setting::ForbidPurgeWallet))
        {
            return Err(Error::InvalidState("card forbids purging the wallet"));
        }

        let frame = self.pin2_command(Instruction::PurgeWallet)?;
        let result = self.run(frame, false);
        self.track_default_pin2(&result);
        let response = result?;

        let reusable = self
            .state
            .settings
            .is_some_and(|settings| settings.contains(Setting::IsReusable));
        let status = match response.tlvs().uint(TlvTag::Status)? {
            Some(code) => CardStatus::try_from(code)?,
            None if reusable => CardStatus::Empty,
            None => CardStatus::Purged,
        };
        self.state.status = Some(status);
        self.state.clear_wallet();
        self.state.clear_offline_values();

        info!(card_id = self.state.card_id.as_deref(), %status, "Wallet purged");
        Ok(())
    }
}
