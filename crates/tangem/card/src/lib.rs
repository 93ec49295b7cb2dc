//! Host side of the Tangem card protocol
//!
//! [`Tangem`] drives one card over any [`CardTransport`]: it discovers the
//! encryption mode the card requires, opens Fast or Strong sessions, waits out
//! security delays and keeps a [`CardState`] built from the card's answers.
//!
//! ```no_run
//! # fn run<T: tangem_apdu_core::CardTransport>(transport: T) -> tangem_card::Result<()> {
//! use tangem_card::{EvmCoinEngine, Tangem};
//!
//! let mut card = Tangem::new(transport).with_coin_engine(EvmCoinEngine::default());
//! let state = card.read()?;
//! println!("{:?} {:?}", state.card_id, state.wallet_address);
//!
//! let signatures = card.sign(&[[0u8; 32]])?;
//! assert_eq!(signatures.len(), 1);
//! # Ok(())
//! # }
//! ```
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod application;
mod commands;
mod config;
pub mod constants;
pub mod crypto;
mod delay;
mod error;
mod external;
mod session;
pub mod tasks;
mod types;

pub use application::Tangem;
pub use commands::*;
pub use config::SessionConfig;
pub use delay::{CancelHandle, DelayObserver, NoopObserver};
pub use error::{Error, Result};
pub use external::{
    BatchSubstitutions, CardDataSubstitution, CoinEngine, EvmCoinEngine, IssuerDirectory,
    IssuerKeys, StaticIssuerDirectory, SubstitutionStore,
};
pub use session::{EncryptionMode, SecureSession, SessionKey};
pub use types::*;

pub use tangem_apdu_core::CardTransport;
