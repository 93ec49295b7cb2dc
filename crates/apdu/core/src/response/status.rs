//! Status word definitions for card responses

use std::fmt;

use tracing::Level;

/// Status Word (SW1-SW2) from a card response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusWord {
    /// First status byte (SW1)
    pub sw1: u8,
    /// Second status byte (SW2)
    pub sw2: u8,
}

impl StatusWord {
    /// Create a new status word
    pub const fn new(sw1: u8, sw2: u8) -> Self {
        Self { sw1, sw2 }
    }

    /// Create from a u16 value (SW1 | SW2)
    pub const fn from_u16(status: u16) -> Self {
        Self {
            sw1: (status >> 8) as u8,
            sw2: status as u8,
        }
    }

    /// Convert to a u16 value (SW1 | SW2)
    pub const fn to_u16(&self) -> u16 {
        ((self.sw1 as u16) << 8) | (self.sw2 as u16)
    }

    /// Classify this status word
    pub const fn status(&self) -> Status {
        Status::from_u16(self.to_u16())
    }

    /// Check if this status word indicates success (90 00)
    pub const fn is_success(&self) -> bool {
        self.sw1 == 0x90 && self.sw2 == 0x00
    }

    /// Get the appropriate tracing level for this status word
    pub const fn tracing_level(&self) -> Level {
        match self.status() {
            Status::ProcessCompleted
            | Status::Pin1Changed
            | Status::Pin2Changed
            | Status::PinsChanged => Level::DEBUG,
            Status::NeedPause | Status::NeedEncryption => Level::INFO,
            _ => Level::WARN,
        }
    }

    /// Get a description of this status word
    pub const fn description(&self) -> &'static str {
        self.status().description()
    }
}

impl From<u16> for StatusWord {
    fn from(status: u16) -> Self {
        Self::from_u16(status)
    }
}

impl From<(u8, u8)> for StatusWord {
    fn from((sw1, sw2): (u8, u8)) -> Self {
        Self::new(sw1, sw2)
    }
}

impl From<StatusWord> for u16 {
    fn from(sw: StatusWord) -> Self {
        sw.to_u16()
    }
}

impl fmt::Display for StatusWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02X}{:02X} ({})", self.sw1, self.sw2, self.description())
    }
}

/// Classification of a status word
///
/// `PINS_NOT_CHANGED` shares `90 00` with [`Status::ProcessCompleted`]; only
/// the PIN swap command interprets it that way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// 90 00
    ProcessCompleted,
    /// 90 01
    Pin1Changed,
    /// 90 02
    Pin2Changed,
    /// 90 03
    PinsChanged,
    /// 6A 86, reported when a PIN does not match
    InvalidParams,
    /// 62 86
    ErrorProcessingCommand,
    /// 69 85
    InvalidState,
    /// 6D 00
    InsNotSupported,
    /// 69 82, the command must be sent inside an encrypted session
    NeedEncryption,
    /// 97 89, the card is running a security delay
    NeedPause,
    /// Any other value
    Unknown(u16),
}

impl Status {
    /// Classify a raw status word
    pub const fn from_u16(sw: u16) -> Self {
        match sw {
            0x9000 => Self::ProcessCompleted,
            0x9001 => Self::Pin1Changed,
            0x9002 => Self::Pin2Changed,
            0x9003 => Self::PinsChanged,
            0x6A86 => Self::InvalidParams,
            0x6286 => Self::ErrorProcessingCommand,
            0x6985 => Self::InvalidState,
            0x6D00 => Self::InsNotSupported,
            0x6982 => Self::NeedEncryption,
            0x9789 => Self::NeedPause,
            other => Self::Unknown(other),
        }
    }

    /// Raw status word value
    pub const fn code(self) -> u16 {
        match self {
            Self::ProcessCompleted => 0x9000,
            Self::Pin1Changed => 0x9001,
            Self::Pin2Changed => 0x9002,
            Self::PinsChanged => 0x9003,
            Self::InvalidParams => 0x6A86,
            Self::ErrorProcessingCommand => 0x6286,
            Self::InvalidState => 0x6985,
            Self::InsNotSupported => 0x6D00,
            Self::NeedEncryption => 0x6982,
            Self::NeedPause => 0x9789,
            Self::Unknown(other) => other,
        }
    }

    /// Status word for this classification
    pub const fn status_word(self) -> StatusWord {
        StatusWord::from_u16(self.code())
    }

    /// Whether the command completed (any of the success variants)
    pub const fn is_completed(self) -> bool {
        matches!(
            self,
            Self::ProcessCompleted | Self::Pin1Changed | Self::Pin2Changed | Self::PinsChanged
        )
    }

    /// Short description
    pub const fn description(self) -> &'static str {
        match self {
            Self::ProcessCompleted => "Process completed",
            Self::Pin1Changed => "PIN1 changed",
            Self::Pin2Changed => "PIN2 changed",
            Self::PinsChanged => "PIN1 and PIN2 changed",
            Self::InvalidParams => "Invalid parameters or PIN",
            Self::ErrorProcessingCommand => "Error processing command",
            Self::InvalidState => "Invalid state",
            Self::InsNotSupported => "Instruction not supported",
            Self::NeedEncryption => "Encryption required",
            Self::NeedPause => "Security delay in progress",
            Self::Unknown(_) => "Unknown status word",
        }
    }
}
