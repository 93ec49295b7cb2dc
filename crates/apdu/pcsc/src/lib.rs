//! PC/SC transport for Tangem cards
//!
//! This crate implements the `CardTransport` trait from `tangem-apdu-core` on
//! top of the PC/SC API, so any contactless reader supported by the system
//! smart-card service can carry the Tangem protocol.
//!
//! # Examples
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use tangem_apdu_core::CardTransport;
//! use tangem_apdu_transport_pcsc::{ConnectStrategy, PcscConfig, PcscDeviceManager};
//!
//! let manager = PcscDeviceManager::new()?;
//! for reader in manager.list_readers()? {
//!     println!("{} (card: {})", reader.name(), reader.has_card());
//! }
//!
//! let transport = manager.connect_strategy(ConnectStrategy::AnyCard, PcscConfig::default())?;
//! println!("token id: {:?}", transport.token_id());
//! # Ok(())
//! # }
//! ```
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![warn(missing_docs)]

mod config;
mod error;
mod manager;
mod reader;
mod transport;

pub use config::{ConnectStrategy, PcscConfig, ShareMode};
pub use error::PcscError;
pub use manager::PcscDeviceManager;
pub use reader::PcscReader;
pub use transport::PcscTransport;

// Re-export some pcsc types for convenience
pub use pcsc::{Protocol, Protocols};
