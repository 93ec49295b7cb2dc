//! Collaborators consulted while building the card state
//!
//! The engine knows nothing about blockchains or issuers. Address derivation,
//! issuer key lookup and batch metadata fixes are delegated to these traits so
//! applications can plug in their own registries.

use std::collections::HashMap;
use std::fmt;

use alloy_primitives::{Address, keccak256};
use bytes::Bytes;

use crate::crypto::WalletKey;
use crate::types::CardData;
use crate::{Error, Result};

/// Derives a display address from a wallet public key
pub trait CoinEngine: Send + Sync + fmt::Debug {
    /// Whether this engine understands the blockchain id
    fn supports(&self, blockchain_id: &str) -> bool;

    /// Address for the wallet key on the given blockchain
    fn address(&self, blockchain_id: &str, public_key: &WalletKey) -> Result<String>;
}

/// Public keys an issuer uses to sign data and co-sign transactions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuerKeys {
    /// Key that signs issuer data
    pub data_key: Bytes,
    /// Key that co-signs transactions
    pub transaction_key: Bytes,
}

/// Resolves issuer ids to their public keys
pub trait IssuerDirectory: Send + Sync + fmt::Debug {
    /// Keys for the issuer, if known
    fn keys(&self, issuer_id: &str) -> Option<IssuerKeys>;
}

/// Metadata override for cards personalized with incomplete data
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CardDataSubstitution {
    /// Replacement blockchain id
    pub blockchain_id: Option<String>,
    /// Replacement token symbol
    pub token_symbol: Option<String>,
    /// Replacement token contract address
    pub token_contract_address: Option<String>,
    /// Replacement token decimals
    pub token_decimal: Option<u8>,
}

impl CardDataSubstitution {
    /// Override only the contract address
    pub fn contract_address(address: &str) -> Self {
        Self {
            token_contract_address: Some(address.to_string()),
            ..Self::default()
        }
    }

    /// Apply the present fields on top of card data
    pub fn apply(&self, data: &mut CardData) {
        if let Some(id) = &self.blockchain_id {
            data.blockchain_id = Some(id.clone());
        }
        if let Some(symbol) = &self.token_symbol {
            data.token_symbol = Some(symbol.clone());
        }
        if let Some(address) = &self.token_contract_address {
            data.token_contract_address = Some(address.clone());
        }
        if let Some(decimal) = self.token_decimal {
            data.token_decimal = Some(decimal);
        }
    }
}

/// Per-batch metadata overrides
pub trait SubstitutionStore: Send + Sync + fmt::Debug {
    /// Override for the batch, if any
    fn substitution(&self, batch: &str) -> Option<CardDataSubstitution>;
}

/// Address derivation for EVM chains
#[derive(Debug, Clone)]
pub struct EvmCoinEngine {
    chains: Vec<String>,
}

impl Default for EvmCoinEngine {
    fn default() -> Self {
        Self::new(["ETH", "RSK"])
    }
}

impl EvmCoinEngine {
    /// Engine accepting the listed blockchain ids
    ///
    /// An id matches when its part before any `/` (e.g. `ETH/test`) is listed.
    pub fn new<I, S>(chains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            chains: chains.into_iter().map(Into::into).collect(),
        }
    }

    /// EIP-55 address of an uncompressed secp256k1 key
    pub fn checksum_address(public_key: &WalletKey) -> String {
        let hash = keccak256(&public_key.uncompressed[1..]);
        Address::from_slice(&hash[12..]).to_checksum(None)
    }
}

impl CoinEngine for EvmCoinEngine {
    fn supports(&self, blockchain_id: &str) -> bool {
        let base = blockchain_id
            .split_once('/')
            .map_or(blockchain_id, |(base, _)| base);
        self.chains.iter().any(|chain| chain == base)
    }

    fn address(&self, blockchain_id: &str, public_key: &WalletKey) -> Result<String> {
        if !self.supports(blockchain_id) {
            return Err(Error::CoinEngine(format!(
                "unsupported blockchain {blockchain_id}"
            )));
        }
        Ok(Self::checksum_address(public_key))
    }
}

/// Issuer directory backed by a map
#[derive(Debug, Clone, Default)]
pub struct StaticIssuerDirectory {
    issuers: HashMap<String, IssuerKeys>,
}

impl StaticIssuerDirectory {
    /// Empty directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an issuer
    pub fn with_issuer(mut self, issuer_id: impl Into<String>, keys: IssuerKeys) -> Self {
        self.issuers.insert(issuer_id.into(), keys);
        self
    }
}

impl IssuerDirectory for StaticIssuerDirectory {
    fn keys(&self, issuer_id: &str) -> Option<IssuerKeys> {
        self.issuers.get(issuer_id).cloned()
    }
}

/// Substitution store backed by a map
#[derive(Debug, Clone, Default)]
pub struct BatchSubstitutions {
    batches: HashMap<String, CardDataSubstitution>,
}

impl BatchSubstitutions {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Contract address fixes for early token batches
    pub fn historic() -> Self {
        Self::new()
            .with_batch(
                "0017",
                CardDataSubstitution::contract_address(
                    "0x9Eef75bA8e81340da9D8d1fd06B2f313DB88839c",
                ),
            )
            .with_batch(
                "0019",
                CardDataSubstitution::contract_address(
                    "0x0c056b0cda0763cc14b8b2d6c02465c91e33ec72",
                ),
            )
    }

    /// Register an override for a batch
    pub fn with_batch(mut self, batch: impl Into<String>, patch: CardDataSubstitution) -> Self {
        self.batches.insert(batch.into(), patch);
        self
    }
}

impl SubstitutionStore for BatchSubstitutions {
    fn substitution(&self, batch: &str) -> Option<CardDataSubstitution> {
        self.batches.get(batch).cloned()
    }
}
