//! Session management for encrypted exchanges
//!
//! A session holds the negotiated encryption mode and the ephemeral key that
//! wraps command payloads. It is never persisted and is dropped whenever the
//! protocol key changes or a different token is presented.

use std::fmt;

use bytes::Bytes;
use derive_more::Display;
use k256::{PublicKey, SecretKey};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::crypto::{self, Challenge};
use crate::{Error, Result};

/// Encryption mode negotiated with the card
///
/// Ordered by strength; discovery only ever moves forward.
#[derive(Debug, Display, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EncryptionMode {
    /// Payloads travel in the clear
    #[default]
    None,
    /// Symmetric challenge exchange
    Fast,
    /// ECDH over ephemeral secp256k1 keys
    Strong,
}

impl EncryptionMode {
    /// Value carried in P1 of wrapped commands and P2 of OpenSession
    pub const fn code(self) -> u8 {
        match self {
            Self::None => 0x00,
            Self::Fast => 0x01,
            Self::Strong => 0x02,
        }
    }

    /// Mode for a P1/P2 value
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0x00 => Some(Self::None),
            0x01 => Some(Self::Fast),
            0x02 => Some(Self::Strong),
            _ => None,
        }
    }

    /// Next stronger mode, if any
    pub const fn escalate(self) -> Option<Self> {
        match self {
            Self::None => Some(Self::Fast),
            Self::Fast => Some(Self::Strong),
            Self::Strong => None,
        }
    }
}

/// Symmetric session key
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SessionKey([u8; 32]);

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionKey(..)")
    }
}

impl SessionKey {
    /// Wrap raw key bytes
    pub const fn new(key: [u8; 32]) -> Self {
        Self(key)
    }

    /// Raw key bytes
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Fast mode: SHA-256(host challenge ‖ card challenge ‖ protocol key)
    pub fn fast(protocol_key: &[u8; 32], host: &Challenge, card: &[u8]) -> Self {
        Self(crypto::sha256_concat(&[&host[..], card, &protocol_key[..]]))
    }

    /// Strong mode: SHA-256(ECDH shared x ‖ protocol key)
    pub fn strong(protocol_key: &[u8; 32], ours: &SecretKey, theirs: &PublicKey) -> Self {
        let shared = crypto::ecdh(ours, theirs);
        Self(crypto::sha256_concat(&[&shared[..], &protocol_key[..]]))
    }
}

/// Negotiated session state
#[derive(Debug, Clone, Default)]
pub struct SecureSession {
    mode: EncryptionMode,
    key: Option<SessionKey>,
}

impl SecureSession {
    /// Plain session, no wrapping
    pub const fn plain() -> Self {
        Self {
            mode: EncryptionMode::None,
            key: None,
        }
    }

    /// Established encrypted session
    pub const fn established(mode: EncryptionMode, key: SessionKey) -> Self {
        Self {
            mode,
            key: Some(key),
        }
    }

    /// Current mode
    pub const fn mode(&self) -> EncryptionMode {
        self.mode
    }

    /// Whether the session can wrap payloads for `mode`
    pub fn is_ready_for(&self, mode: EncryptionMode) -> bool {
        self.mode == mode && (mode == EncryptionMode::None || self.key.is_some())
    }

    /// Drop the key, keeping the plain mode
    pub fn invalidate(&mut self) {
        *self = Self::plain();
    }

    fn key(&self) -> Result<&SessionKey> {
        self.key
            .as_ref()
            .ok_or(Error::InvalidState("session not established"))
    }

    /// Encrypt a command payload
    pub fn wrap(&self, payload: &[u8]) -> Result<Bytes> {
        match self.mode {
            EncryptionMode::None => Ok(Bytes::copy_from_slice(payload)),
            _ => Ok(Bytes::from(crypto::encrypt(self.key()?.as_bytes(), payload)?)),
        }
    }

    /// Decrypt a response payload
    pub fn unwrap(&self, payload: &[u8]) -> Result<Bytes> {
        match self.mode {
            EncryptionMode::None => Ok(Bytes::copy_from_slice(payload)),
            _ if payload.is_empty() => Ok(Bytes::new()),
            _ => Ok(Bytes::from(crypto::decrypt(self.key()?.as_bytes(), payload)?)),
        }
    }
}
