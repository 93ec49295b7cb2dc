//! Response frame definitions
//!
//! A response is `TLV-payload ‖ SW1 ‖ SW2`. Parsing never fails outright: a
//! frame that cannot be decoded is returned flagged with a diagnostic so the
//! caller decides whether the failure is worth a retry.

pub mod status;

use bytes::Bytes;
use tracing::trace;

use crate::tlv::{TlvList, TlvTag};
use status::{Status, StatusWord};

/// Parsed response frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseFrame {
    status: StatusWord,
    tlvs: TlvList,
    parse_error: Option<String>,
}

impl ResponseFrame {
    /// Create a response from a status word and records
    pub const fn new(status: StatusWord, tlvs: TlvList) -> Self {
        Self {
            status,
            tlvs,
            parse_error: None,
        }
    }

    /// Split raw bytes into payload and status word
    ///
    /// Returns `None` when fewer than two bytes are present.
    pub fn split(data: &[u8]) -> Option<(&[u8], StatusWord)> {
        let split = data.len().checked_sub(2)?;
        let (payload, sw) = data.split_at(split);
        Some((payload, StatusWord::new(sw[0], sw[1])))
    }

    /// Parse a plain response frame
    pub fn parse(data: &[u8]) -> Self {
        match Self::split(data) {
            Some((payload, status)) => Self::from_parts(status, payload),
            None => Self {
                status: StatusWord::new(0x00, 0x00),
                tlvs: TlvList::new(),
                parse_error: Some(format!(
                    "response of {} bytes has no status word",
                    data.len()
                )),
            },
        }
    }

    /// Build a response from a status word and an already decrypted payload
    pub fn from_parts(status: StatusWord, payload: &[u8]) -> Self {
        let (tlvs, parse_error) = match TlvList::decode(payload) {
            Ok(tlvs) => (tlvs, None),
            Err(e) => (TlvList::new(), Some(e.to_string())),
        };

        trace!(
            sw1 = format_args!("{:#04x}", status.sw1),
            sw2 = format_args!("{:#04x}", status.sw2),
            payload_len = payload.len(),
            records = tlvs.len(),
            parse_error = parse_error.as_deref(),
            "Parsed response frame"
        );

        Self {
            status,
            tlvs,
            parse_error,
        }
    }

    /// Status word
    pub const fn status_word(&self) -> StatusWord {
        self.status
    }

    /// Classified status
    pub const fn status(&self) -> Status {
        self.status.status()
    }

    /// Response records
    pub const fn tlvs(&self) -> &TlvList {
        &self.tlvs
    }

    /// Consume the response, returning its records
    pub fn into_tlvs(self) -> TlvList {
        self.tlvs
    }

    /// Diagnostic when the payload could not be decoded
    pub fn parse_error(&self) -> Option<&str> {
        self.parse_error.as_deref()
    }

    /// Whether the payload decoded cleanly
    pub const fn is_parsed(&self) -> bool {
        self.parse_error.is_none()
    }

    /// Value of the first record with the given tag
    pub fn bytes(&self, tag: TlvTag) -> Option<&[u8]> {
        self.tlvs.bytes(tag)
    }

    /// Serialize back to raw bytes
    pub fn to_bytes(&self) -> Result<Bytes, crate::tlv::TlvError> {
        let mut data = self.tlvs.encode()?.to_vec();
        data.push(self.status.sw1);
        data.push(self.status.sw2);
        Ok(Bytes::from(data))
    }
}
