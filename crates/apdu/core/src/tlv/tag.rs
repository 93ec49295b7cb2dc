//! Tag registry for Tangem TLV records

macro_rules! tlv_tags {
    ($( $(#[$doc:meta])* $name:ident = $value:literal ),+ $(,)?) => {
        /// Tag of a TLV record
        ///
        /// Tags not in the registry are carried as [`TlvTag::Unknown`] so that a
        /// decoded sequence always re-encodes to the same bytes.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum TlvTag {
            $( $(#[$doc])* $name, )+
            /// Tag byte not in the registry
            Unknown(u8),
        }

        impl TlvTag {
            /// Raw tag byte
            pub const fn code(self) -> u8 {
                match self {
                    $( Self::$name => $value, )+
                    Self::Unknown(code) => code,
                }
            }

            /// Look up a tag by its raw byte
            pub const fn from_code(code: u8) -> Self {
                match code {
                    $( $value => Self::$name, )+
                    other => Self::Unknown(other),
                }
            }

            /// Registry name of the tag
            pub const fn name(self) -> &'static str {
                match self {
                    $( Self::$name => stringify!($name), )+
                    Self::Unknown(_) => "Unknown",
                }
            }
        }
    };
}

tlv_tags! {
    /// Card identifier (8 bytes)
    CardId = 0x01,
    /// Card status, see `CardStatus`
    Status = 0x02,
    /// Card public key (SEC1 uncompressed)
    CardPublicKey = 0x03,
    /// Signature produced with the card key
    CardSignature = 0x04,
    /// Curve name of the wallet key (ASCII)
    CurveId = 0x05,
    /// Hash algorithm name (ASCII)
    HashAlgId = 0x06,
    SigningMethod = 0x07,
    MaxSignatures = 0x08,
    /// Security delay before PIN2 commands, in units of 10 ms
    PauseBeforePin2 = 0x09,
    SettingsMask = 0x0A,
    /// Nested card data records
    CardData = 0x0C,
    Health = 0x0F,
    Pin = 0x10,
    Pin2 = 0x11,
    NewPin = 0x12,
    NewPin2 = 0x13,
    Challenge = 0x16,
    Salt = 0x17,
    ValidationCounter = 0x18,
    SessionKeyA = 0x1A,
    SessionKeyB = 0x1B,
    /// Remaining security delay, in units of 10 ms
    Pause = 0x1C,
    ManufacturerId = 0x20,
    Mode = 0x23,
    Offset = 0x24,
    Size = 0x25,
    IssuerDataPublicKey = 0x30,
    IssuerTransactionPublicKey = 0x31,
    IssuerData = 0x32,
    IssuerDataSignature = 0x33,
    IssuerTransactionSignature = 0x34,
    IssuerDataCounter = 0x35,
    CodePageAddress = 0x40,
    CodePageCount = 0x41,
    CodeHash = 0x42,
    TrOutHashSize = 0x50,
    TrOutHash = 0x51,
    TrOutRaw = 0x52,
    TerminalTransactionSignature = 0x57,
    TerminalPublicKey = 0x5C,
    WalletPublicKey = 0x60,
    Signature = 0x61,
    RemainingSignatures = 0x62,
    SignedHashes = 0x63,
    /// Firmware version string (ASCII)
    Firmware = 0x80,
    Batch = 0x81,
    ManufactureDateTime = 0x82,
    IssuerId = 0x83,
    BlockchainId = 0x84,
    TokenSymbol = 0xA0,
    TokenContractAddress = 0xA1,
    TokenDecimal = 0xA2,
    Denomination = 0xC0,
    ValidatedBalance = 0xC1,
    LastSignDate = 0xC2,
    DenominationText = 0xC3,
}

impl From<u8> for TlvTag {
    fn from(code: u8) -> Self {
        Self::from_code(code)
    }
}

impl From<TlvTag> for u8 {
    fn from(tag: TlvTag) -> Self {
        tag.code()
    }
}

impl std::fmt::Display for TlvTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({:#04x})", self.name(), self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_lookup() {
        assert_eq!(TlvTag::from_code(0x01), TlvTag::CardId);
        assert_eq!(TlvTag::from_code(0x5C), TlvTag::TerminalPublicKey);
        assert_eq!(TlvTag::DenominationText.code(), 0xC3);
        assert_eq!(TlvTag::from_code(0x7E), TlvTag::Unknown(0x7E));
        assert_eq!(TlvTag::Unknown(0x7E).code(), 0x7E);
    }

    #[test]
    fn test_display() {
        assert_eq!(TlvTag::Pause.to_string(), "Pause(0x1c)");
    }
}
