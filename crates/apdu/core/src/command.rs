//! Command frame definitions
//!
//! Wire format: `CLA ‖ INS ‖ P1 ‖ P2 ‖ Lc ‖ payload ‖ Le`. Payloads up to 255
//! bytes use the short form (`Lc` one byte, `Le = 00`); longer payloads use the
//! extended form (`00 ‖ Lc(2)`, `Le = 00 00`).

use bytes::{BufMut, Bytes, BytesMut};
use derive_more::Display;
use thiserror::Error;

use crate::tlv::{Tlv, TlvError, TlvList};

/// Class byte used by every Tangem command
pub const ISO_CLA: u8 = 0x00;

/// Largest payload that fits the short length form
pub const MAX_SHORT_PAYLOAD: usize = 255;

/// Largest payload that fits the extended length form
pub const MAX_EXTENDED_PAYLOAD: usize = 65_535;

/// Errors raised when building or parsing command frames
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    /// Fewer than four header bytes
    #[error("Command frame too short: {0} bytes")]
    TooShort(usize),

    /// Lc disagrees with the bytes that follow
    #[error("Command length field {declared} does not match {available} available bytes")]
    LengthMismatch {
        /// Length announced by Lc
        declared: usize,
        /// Bytes actually present after Lc
        available: usize,
    },

    /// Payload longer than the extended length form allows
    #[error("Payload too long: {0} bytes")]
    PayloadTooLong(usize),

    /// TLV payload could not be encoded or decoded
    #[error(transparent)]
    Tlv(#[from] TlvError),
}

/// Instruction codes understood by the card
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Instruction {
    /// Read card identity, settings and wallet state
    Read,
    /// Challenge the card key
    VerifyCard,
    /// Bump the anti-clone validation counter
    ValidateCard,
    /// Hash a range of firmware code pages
    VerifyCode,
    /// Write issuer data
    WriteIssuerData,
    /// Read issuer data
    GetIssuerData,
    /// Generate the wallet key
    CreateWallet,
    /// Challenge the wallet key
    CheckWallet,
    /// Change PIN and/or PIN2
    SwapPin,
    /// Sign hashes or a raw transaction
    Sign,
    /// Destroy the wallet key
    PurgeWallet,
    /// Start an encrypted session
    OpenSession,
}

impl Instruction {
    /// Every instruction, in code order
    pub const ALL: [Self; 12] = [
        Self::Read,
        Self::VerifyCard,
        Self::ValidateCard,
        Self::VerifyCode,
        Self::WriteIssuerData,
        Self::GetIssuerData,
        Self::CreateWallet,
        Self::CheckWallet,
        Self::SwapPin,
        Self::Sign,
        Self::PurgeWallet,
        Self::OpenSession,
    ];

    /// INS byte
    pub const fn code(self) -> u8 {
        match self {
            Self::Read => 0xF2,
            Self::VerifyCard => 0xF3,
            Self::ValidateCard => 0xF4,
            Self::VerifyCode => 0xF5,
            Self::WriteIssuerData => 0xF6,
            Self::GetIssuerData => 0xF7,
            Self::CreateWallet => 0xF8,
            Self::CheckWallet => 0xF9,
            Self::SwapPin => 0xFA,
            Self::Sign => 0xFB,
            Self::PurgeWallet => 0xFC,
            Self::OpenSession => 0xFF,
        }
    }

    /// Instruction for an INS byte
    pub const fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0xF2 => Self::Read,
            0xF3 => Self::VerifyCard,
            0xF4 => Self::ValidateCard,
            0xF5 => Self::VerifyCode,
            0xF6 => Self::WriteIssuerData,
            0xF7 => Self::GetIssuerData,
            0xF8 => Self::CreateWallet,
            0xF9 => Self::CheckWallet,
            0xFA => Self::SwapPin,
            0xFB => Self::Sign,
            0xFC => Self::PurgeWallet,
            0xFF => Self::OpenSession,
            _ => return None,
        })
    }
}

/// Raw command APDU with an opaque payload
///
/// This is what actually travels over the transport; the payload may be
/// encrypted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandApdu {
    /// Command class byte
    pub cla: u8,
    /// Instruction byte
    pub ins: u8,
    /// Parameter 1
    pub p1: u8,
    /// Parameter 2
    pub p2: u8,
    /// Command data
    pub data: Bytes,
}

impl CommandApdu {
    /// Whether the payload needs the extended length form
    pub fn is_extended(&self) -> bool {
        self.data.len() > MAX_SHORT_PAYLOAD
    }

    /// Serialize to raw bytes
    pub fn to_bytes(&self) -> Result<Bytes, FrameError> {
        let len = self.data.len();
        if len > MAX_EXTENDED_PAYLOAD {
            return Err(FrameError::PayloadTooLong(len));
        }

        let mut buffer = BytesMut::with_capacity(4 + 3 + len + 2);

        // Header: CLA, INS, P1, P2
        buffer.put_u8(self.cla);
        buffer.put_u8(self.ins);
        buffer.put_u8(self.p1);
        buffer.put_u8(self.p2);

        if len == 0 {
            buffer.put_u8(0x00);
        } else if len <= MAX_SHORT_PAYLOAD {
            buffer.put_u8(len as u8);
            buffer.put_slice(&self.data);
            buffer.put_u8(0x00);
        } else {
            buffer.put_u8(0x00);
            buffer.put_u16(len as u16);
            buffer.put_slice(&self.data);
            buffer.put_u16(0x0000);
        }

        Ok(buffer.freeze())
    }

    /// Parse raw command bytes
    pub fn from_bytes(data: &[u8]) -> Result<Self, FrameError> {
        if data.len() < 4 {
            return Err(FrameError::TooShort(data.len()));
        }

        let (cla, ins, p1, p2) = (data[0], data[1], data[2], data[3]);
        let body = &data[4..];

        let payload: &[u8] = match body.len() {
            // Header only, or header plus short/extended Le
            0 | 1 => &[],
            3 if body[0] == 0x00 => &[],
            _ if body[0] != 0x00 => {
                let lc = body[0] as usize;
                let rest = &body[1..];
                // Optional single-byte Le
                if rest.len() != lc && rest.len() != lc + 1 {
                    return Err(FrameError::LengthMismatch {
                        declared: lc,
                        available: rest.len(),
                    });
                }
                &rest[..lc]
            }
            _ => {
                if body.len() < 3 {
                    return Err(FrameError::LengthMismatch {
                        declared: 0,
                        available: body.len() - 1,
                    });
                }
                let lc = u16::from_be_bytes([body[1], body[2]]) as usize;
                let rest = &body[3..];
                // Optional two-byte Le
                if rest.len() != lc && rest.len() != lc + 2 {
                    return Err(FrameError::LengthMismatch {
                        declared: lc,
                        available: rest.len(),
                    });
                }
                &rest[..lc]
            }
        };

        Ok(Self {
            cla,
            ins,
            p1,
            p2,
            data: Bytes::copy_from_slice(payload),
        })
    }
}

/// Typed command frame: header plus an ordered TLV payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandFrame {
    class: u8,
    instruction: Instruction,
    p1: u8,
    p2: u8,
    tlvs: TlvList,
}

impl CommandFrame {
    /// Create a frame with the ISO class, zero parameters and no records
    pub const fn new(instruction: Instruction) -> Self {
        Self {
            class: ISO_CLA,
            instruction,
            p1: 0,
            p2: 0,
            tlvs: TlvList::new(),
        }
    }

    /// Set P1
    pub const fn with_p1(mut self, p1: u8) -> Self {
        self.p1 = p1;
        self
    }

    /// Set P2
    pub const fn with_p2(mut self, p2: u8) -> Self {
        self.p2 = p2;
        self
    }

    /// Append a record
    pub fn with_tlv(mut self, tlv: Tlv) -> Self {
        self.tlvs.push(tlv);
        self
    }

    /// Append a record in place
    pub fn push(&mut self, tlv: Tlv) {
        self.tlvs.push(tlv);
    }

    /// Class byte
    pub const fn class(&self) -> u8 {
        self.class
    }

    /// Instruction
    pub const fn instruction(&self) -> Instruction {
        self.instruction
    }

    /// P1
    pub const fn p1(&self) -> u8 {
        self.p1
    }

    /// P2
    pub const fn p2(&self) -> u8 {
        self.p2
    }

    /// TLV records
    pub const fn tlvs(&self) -> &TlvList {
        &self.tlvs
    }

    /// Encode the TLV payload
    pub fn payload(&self) -> Result<Bytes, FrameError> {
        Ok(self.tlvs.encode()?)
    }

    /// Build the raw APDU carrying `payload` under this frame's header
    pub fn to_apdu(&self, payload: Bytes) -> CommandApdu {
        CommandApdu {
            cla: self.class,
            ins: self.instruction.code(),
            p1: self.p1,
            p2: self.p2,
            data: payload,
        }
    }

    /// Serialize with the plain TLV payload
    pub fn to_bytes(&self) -> Result<Bytes, FrameError> {
        self.to_apdu(self.payload()?).to_bytes()
    }

    /// Parse a plain (unencrypted) command frame
    pub fn from_bytes(data: &[u8]) -> Result<Self, FrameError> {
        let apdu = CommandApdu::from_bytes(data)?;
        let instruction = Instruction::from_code(apdu.ins).ok_or(FrameError::Tlv(
            TlvError::InvalidValue {
                tag: crate::tlv::TlvTag::Unknown(apdu.ins),
                reason: "unknown instruction",
            },
        ))?;
        Ok(Self {
            class: apdu.cla,
            instruction,
            p1: apdu.p1,
            p2: apdu.p2,
            tlvs: TlvList::decode(&apdu.data)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;

    use super::*;
    use crate::tlv::TlvTag;

    #[test]
    fn test_short_frame_bytes() {
        let frame = CommandFrame::new(Instruction::Read)
            .with_tlv(Tlv::new(TlvTag::Pin, hex!("0102").to_vec()));
        assert_eq!(
            frame.to_bytes().unwrap().as_ref(),
            hex!("00 F2 00 00 04 10 02 0102 00").as_slice()
        );
    }

    #[test]
    fn test_short_round_trip() {
        let frame = CommandFrame::new(Instruction::OpenSession)
            .with_p2(0x02)
            .with_tlv(Tlv::new(TlvTag::SessionKeyA, vec![0x04; 65]))
            .with_tlv(Tlv::u8(TlvTag::Mode, 1));

        let bytes = frame.to_bytes().unwrap();
        assert_eq!(bytes[4] as usize, bytes.len() - 6);
        assert_eq!(CommandFrame::from_bytes(&bytes).unwrap(), frame);
    }

    #[test]
    fn test_extended_round_trip() {
        let frame = CommandFrame::new(Instruction::WriteIssuerData)
            .with_p1(0x01)
            .with_tlv(Tlv::new(TlvTag::IssuerData, vec![0x5A; 600]));

        let bytes = frame.to_bytes().unwrap();
        let payload_len = frame.payload().unwrap().len();
        assert_eq!(bytes[4], 0x00);
        assert_eq!(u16::from_be_bytes([bytes[5], bytes[6]]) as usize, payload_len);
        assert_eq!(&bytes[bytes.len() - 2..], &[0x00, 0x00]);

        let parsed = CommandFrame::from_bytes(&bytes).unwrap();
        assert_eq!(parsed, frame);
        assert_eq!(parsed.p1(), 0x01);
    }

    #[test]
    fn test_boundary_uses_short_form() {
        let apdu = CommandApdu {
            cla: ISO_CLA,
            ins: Instruction::Sign.code(),
            p1: 0,
            p2: 0,
            data: Bytes::from(vec![0x11; 255]),
        };
        assert!(!apdu.is_extended());
        let bytes = apdu.to_bytes().unwrap();
        assert_eq!(bytes.len(), 4 + 1 + 255 + 1);
        assert_eq!(CommandApdu::from_bytes(&bytes).unwrap(), apdu);
    }

    #[test]
    fn test_length_mismatch() {
        assert_eq!(
            CommandApdu::from_bytes(&hex!("00 F2 00 00 05 01 02")),
            Err(FrameError::LengthMismatch {
                declared: 5,
                available: 2
            })
        );
        assert_eq!(
            CommandApdu::from_bytes(&hex!("00 F2")),
            Err(FrameError::TooShort(2))
        );
    }

    #[test]
    fn test_instruction_codes() {
        for ins in Instruction::ALL {
            assert_eq!(Instruction::from_code(ins.code()), Some(ins));
        }
        assert_eq!(Instruction::from_code(0xA4), None);
        assert_eq!(Instruction::SwapPin.to_string(), "SwapPin");
    }
}
