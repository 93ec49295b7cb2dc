use std::time::Duration;

use bytes::Bytes;

use super::{
    CardData, CardStatus, FirmwareVersion, IssuerData, SettingsMask, SigningMethods,
};
use crate::crypto::WalletKey;
use crate::session::EncryptionMode;

/// Everything the host has learned about the connected card
///
/// Built up by successive commands. A field changes only when the response
/// that carries it arrives; the whole state is discarded when a different
/// token is presented.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CardState {
    /// Physical token id (NFC UID) the state belongs to
    pub token_id: Option<Bytes>,
    /// Encryption mode the card accepted
    pub encryption_mode: EncryptionMode,

    /// Lifecycle status
    pub status: Option<CardStatus>,
    /// Card id as upper-case hex
    pub card_id: Option<String>,
    /// Raw card id bytes
    pub card_id_bytes: Option<Bytes>,
    /// Manufacturer id
    pub manufacturer_id: Option<String>,
    /// Whether the card key was confirmed by VerifyCard
    pub manufacturer_confirmed: Option<bool>,
    /// Firmware version
    pub firmware: Option<FirmwareVersion>,
    /// Health byte
    pub health: Option<u8>,

    /// Card public key (SEC1)
    pub card_public_key: Option<Bytes>,
    /// Outcome of the last VerifyCard
    pub card_public_key_valid: Option<bool>,

    /// Personalization metadata
    pub card_data: CardData,
    /// Curve of the wallet key
    pub curve_id: Option<String>,
    /// Wallet public key
    pub wallet_public_key: Option<WalletKey>,
    /// Outcome of the last CheckWallet
    pub wallet_public_key_valid: Option<bool>,
    /// Address derived by the coin engine
    pub wallet_address: Option<String>,

    /// Settings mask
    pub settings: Option<SettingsMask>,
    /// Allowed signing methods
    pub signing_methods: Option<SigningMethods>,
    /// Whether PIN2 is still the default; `None` when unknown
    pub use_default_pin2: Option<bool>,
    /// Security delay before PIN2 commands
    pub security_delay: Duration,

    /// Signature limit
    pub max_signatures: Option<u32>,
    /// Signatures left
    pub remaining_signatures: Option<u32>,
    /// Hashes signed so far
    pub signed_hashes: Option<u32>,

    /// Issuer public key used for issuer data verification
    pub issuer_data_public_key: Option<Bytes>,
    /// Issuer public key used for transaction co-signatures
    pub issuer_transaction_public_key: Option<Bytes>,
    /// Last verified issuer data
    pub issuer_data: Option<IssuerData>,
    /// Last verified extra issuer data
    pub issuer_data_ex: Option<IssuerData>,

    /// Balance validated by the issuer
    pub offline_balance: Option<Bytes>,
    /// Note denomination
    pub denomination: Option<Bytes>,
    /// Human readable denomination
    pub denomination_text: Option<String>,
}

impl CardState {
    /// Empty state for a newly observed token
    pub fn for_token(token_id: Option<Bytes>) -> Self {
        Self {
            token_id,
            ..Self::default()
        }
    }

    /// Whether a Read has populated the card identity
    pub const fn is_read(&self) -> bool {
        self.card_id_bytes.is_some()
    }

    /// Whether the card holds a wallet key
    pub fn is_loaded(&self) -> bool {
        self.status == Some(CardStatus::Loaded)
    }

    /// Drop wallet-derived fields
    pub fn clear_wallet(&mut self) {
        self.wallet_public_key = None;
        self.wallet_public_key_valid = None;
        self.wallet_address = None;
        self.remaining_signatures = None;
        self.signed_hashes = None;
    }

    /// Drop issuer-data-derived fields
    pub fn clear_offline_values(&mut self) {
        self.offline_balance = None;
        self.denomination = None;
        self.denomination_text = None;
    }
}
