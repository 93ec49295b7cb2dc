use std::time::Duration;

use bytes::Bytes;
use tangem_apdu_core::prelude::*;
use tracing::{debug, info, warn};

use crate::constants::{CURVE_SECP256K1, PAUSE_UNIT};
use crate::crypto::WalletKey;
use crate::types::{
    CardState, CardStatus, FirmwareVersion, IssuerDataRecords, SettingsMask, SigningMethods,
};
use crate::{Result, Tangem};

/// First firmware whose issuer has separate data and transaction keys
const SPLIT_ISSUER_KEYS: (u32, u32) = (1, 5);

impl<T: CardTransport> Tangem<T> {
    /// Read the card
    ///
    /// Discovers the encryption mode the card requires, rebuilds the card
    /// state from the response, derives the wallet address and then reads
    /// issuer data, or writes the scheduled issuer data instead. A failing
    /// issuer data step never fails the Read; it only clears the offline
    /// balance and denomination.
    pub fn read(&mut self) -> Result<&CardState> {
        self.sync_token();

        let response = self.probe_read()?;

        let mut staged = self.state.clone();
        apply_read(&mut staged, response.tlvs())?;
        staged.encryption_mode = self.encryption;
        self.enrich(&mut staged);
        self.state = staged;

        info!(
            card_id = self.state.card_id.as_deref(),
            status = ?self.state.status,
            mode = %self.encryption,
            "Card read"
        );

        self.read_or_write_issuer_data();
        Ok(&self.state)
    }

    /// Apply collaborators to freshly parsed state
    fn enrich(&self, staged: &mut CardState) {
        if let (Some(store), Some(batch)) = (&self.substitutions, staged.card_data.batch.clone()) {
            if let Some(patch) = store.substitution(&batch) {
                debug!(%batch, "Applying card data substitution");
                patch.apply(&mut staged.card_data);
            }
        }

        if let (Some(directory), Some(issuer_id)) = (&self.issuers, &staged.card_data.issuer_id) {
            if let Some(keys) = directory.keys(issuer_id) {
                if staged.issuer_data_public_key.is_none() {
                    staged.issuer_data_public_key = Some(keys.data_key);
                }
                if staged.issuer_transaction_public_key.is_none() {
                    staged.issuer_transaction_public_key = Some(keys.transaction_key);
                }
            }
        }

        staged.wallet_address = self.derive_address(staged);
    }

    /// Address of the staged wallet key, if the coin engine knows the chain
    pub(crate) fn derive_address(&self, staged: &CardState) -> Option<String> {
        let engine = self.coin_engine.as_ref()?;
        let key = staged.wallet_public_key.as_ref()?;
        let blockchain = staged.card_data.blockchain_id.as_deref()?;
        if !engine.supports(blockchain) {
            debug!(%blockchain, "Coin engine does not support blockchain");
            return None;
        }
        match engine.address(blockchain, key) {
            Ok(address) => Some(address),
            Err(e) => {
                warn!(error = %e, "Failed to derive wallet address");
                None
            }
        }
    }

    fn read_or_write_issuer_data(&mut self) {
        let card_id = self.state.card_id.clone();
        let pending = self
            .pending_issuer_data
            .take_if(|pending| Some(&pending.card_id) == card_id.as_ref());

        let records = match pending {
            Some(pending) => {
                let result = self
                    .write_issuer_data(
                        pending.data.clone(),
                        pending.signature.clone(),
                        pending.counter,
                    )
                    .and_then(|()| IssuerDataRecords::decode(&pending.data).map(Some));
                if result.is_err() {
                    self.pending_issuer_data = Some(pending);
                }
                result
            }
            None => self.get_issuer_data(),
        };

        let records = match records {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "Issuer data step failed");
                None
            }
        };
        apply_offline_values(&mut self.state, records.as_ref());
    }
}

/// Offline balance and denomination from verified issuer data
fn apply_offline_values(state: &mut CardState, records: Option<&IssuerDataRecords>) {
    let full_signatures = state.max_signatures.is_some()
        && state.max_signatures == state.remaining_signatures;

    state.offline_balance = match records {
        Some(records) if state.is_loaded() && full_signatures => records.validated_balance.clone(),
        _ => None,
    };

    match records.and_then(|records| records.denomination.clone().map(|d| (d, records))) {
        Some((denomination, records)) => {
            state.denomination = Some(denomination);
            state.denomination_text = records.denomination_text.clone();
        }
        None => {
            state.denomination = None;
            state.denomination_text = None;
        }
    }
}

fn owned(tlvs: &TlvList, tag: TlvTag) -> Option<Bytes> {
    tlvs.bytes(tag).map(Bytes::copy_from_slice)
}

/// Update card state from a Read response
///
/// Only records present in the response change the state. Personalization
/// data is parsed unless the card was never personalized; wallet data only
/// for loaded cards.
pub(crate) fn apply_read(state: &mut CardState, tlvs: &TlvList) -> Result<()> {
    let status = tlvs
        .uint(TlvTag::Status)?
        .ok_or(TlvError::MissingTag(TlvTag::Status))?;
    let status = CardStatus::try_from(status)?;
    let card_id = tlvs.require(TlvTag::CardId)?;

    state.status = Some(status);
    state.card_id = Some(hex::encode_upper(card_id));
    state.card_id_bytes = Some(Bytes::copy_from_slice(card_id));
    if let Some(manufacturer) = tlvs.ascii(TlvTag::ManufacturerId)? {
        state.manufacturer_id = Some(manufacturer);
    }
    if let Some(firmware) = tlvs.ascii(TlvTag::Firmware)? {
        match FirmwareVersion::parse(&firmware) {
            Some(version) => state.firmware = Some(version),
            None => warn!(%firmware, "Unparsable firmware version, keeping the previous one"),
        }
    }
    if let Some(health) = tlvs.uint_as::<u8>(TlvTag::Health)? {
        state.health = Some(health);
    }

    if status != CardStatus::NotPersonalized {
        apply_personalization(state, tlvs)?;
    }

    if status == CardStatus::Loaded {
        apply_wallet(state, tlvs)?;
    } else {
        state.clear_wallet();
        state.curve_id = None;
    }
    Ok(())
}

fn apply_personalization(state: &mut CardState, tlvs: &TlvList) -> Result<()> {
    state.card_public_key = Some(Bytes::copy_from_slice(
        tlvs.require(TlvTag::CardPublicKey)?,
    ));

    if let Some(card_data) = tlvs.bytes(TlvTag::CardData) {
        let card_data = TlvList::decode(card_data)?;
        state.card_data.apply(&card_data)?;

        // Legacy firmware reports its version inside the card data
        if state.firmware.is_none() {
            state.firmware = card_data
                .ascii(TlvTag::Firmware)?
                .and_then(|raw| FirmwareVersion::parse(&raw));
        }
    }
    // Decides the issuer key layout only; never committed to the state
    let firmware = state.firmware.clone().unwrap_or_else(|| {
        warn!("Card did not report its firmware, assuming 0.0 for issuer keys");
        FirmwareVersion::new(0, 0)
    });

    let data_key = owned(tlvs, TlvTag::IssuerDataPublicKey);
    let transaction_key = owned(tlvs, TlvTag::IssuerTransactionPublicKey);
    // Older cards use one issuer key pair for both purposes
    let data_key = if (firmware.major, firmware.minor) < SPLIT_ISSUER_KEYS {
        transaction_key.clone().or(data_key)
    } else {
        data_key.or_else(|| transaction_key.clone())
    };
    if data_key.is_some() {
        state.issuer_data_public_key = data_key;
    }
    if transaction_key.is_some() {
        state.issuer_transaction_public_key = transaction_key;
    }

    if let Some(mask) = tlvs.uint_as::<u32>(TlvTag::SettingsMask)? {
        state.settings = Some(SettingsMask::from(mask));
    }
    if let Some(units) = tlvs.uint(TlvTag::PauseBeforePin2)? {
        state.security_delay = pause_duration(units);
    }
    match tlvs.uint_as::<u8>(TlvTag::SigningMethod)? {
        Some(code) => state.signing_methods = Some(SigningMethods::from_code(code)),
        None if state.signing_methods.is_none() => {
            warn!("Card did not report its signing methods, assuming plain hash signing");
            state.signing_methods = Some(SigningMethods::from_code(0));
        }
        None => {}
    }
    if let Some(max) = tlvs.uint_as::<u32>(TlvTag::MaxSignatures)? {
        state.max_signatures = Some(max);
    }
    Ok(())
}

fn apply_wallet(state: &mut CardState, tlvs: &TlvList) -> Result<()> {
    if let Some(curve) = tlvs.ascii(TlvTag::CurveId)? {
        state.curve_id = Some(curve);
    }
    if let Some(key) = tlvs.bytes(TlvTag::WalletPublicKey) {
        state.wallet_public_key = match state.curve_id.as_deref() {
            Some(CURVE_SECP256K1) => Some(WalletKey::from_sec1(key)?),
            other => {
                warn!(curve = ?other, "Wallet key on unsupported curve");
                None
            }
        };
    }
    if let Some(remaining) = tlvs.uint_as::<u32>(TlvTag::RemainingSignatures)? {
        state.remaining_signatures = Some(remaining);
    }
    if let Some(signed) = tlvs.uint_as::<u32>(TlvTag::SignedHashes)? {
        state.signed_hashes = Some(signed);
    }
    Ok(())
}

/// Convert a Pause or PauseBeforePin2 value
pub(crate) fn pause_duration(units: u64) -> Duration {
    PAUSE_UNIT.saturating_mul(u32::try_from(units).unwrap_or(u32::MAX))
}
