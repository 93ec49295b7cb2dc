//! Core types for the Tangem card wire protocol
//!
//! This crate provides the byte-level building blocks shared by every Tangem
//! host implementation:
//!
//! - A Simple-TLV codec with the Tangem tag registry
//! - Command frames (`CLA INS P1 P2 Lc payload Le`) with short and extended length
//! - Response frames and status word classification
//! - The [`CardTransport`] trait implemented by concrete readers
//!
//! Nothing in here knows about sessions, encryption or card state; those live in
//! the `tangem-card` crate.
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![forbid(unsafe_code)]
#![warn(missing_docs, rustdoc::missing_crate_level_docs)]

// Re-export bytes for convenience
pub use bytes::{Bytes, BytesMut};

pub mod command;
pub mod response;
pub mod tlv;
pub mod transport;

pub use command::{CommandApdu, CommandFrame, FrameError, Instruction};
pub use response::ResponseFrame;
pub use response::status::{Status, StatusWord};
pub use tlv::{Tlv, TlvError, TlvList, TlvTag};
pub use transport::{CardTransport, TransportError};

/// Prelude module containing commonly used traits and types
pub mod prelude {
    pub use crate::{Bytes, BytesMut};

    pub use crate::command::{CommandApdu, CommandFrame, FrameError, ISO_CLA, Instruction};
    pub use crate::response::ResponseFrame;
    pub use crate::response::status::{Status, StatusWord};
    pub use crate::tlv::{Tlv, TlvError, TlvList, TlvTag};
    pub use crate::transport::{CardTransport, TransportError};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reexports() {
        let frame = CommandFrame::new(Instruction::Read)
            .with_tlv(Tlv::new(TlvTag::Pin, vec![0x01, 0x02]));
        assert_eq!(frame.instruction(), Instruction::Read);
        assert_eq!(frame.tlvs().len(), 1);

        let response = ResponseFrame::parse(&[0x02, 0x01, 0x02, 0x90, 0x00]);
        assert!(response.parse_error().is_none());
        assert_eq!(response.status_word(), StatusWord::new(0x90, 0x00));
        assert_eq!(response.status(), Status::ProcessCompleted);
    }
}
