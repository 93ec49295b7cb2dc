use std::fmt;

use tangem_apdu_core::{TlvList, TlvTag};

use crate::Result;

/// Manufacture date carried in ManufactureDateTime (`year(2) ‖ month ‖ day`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManufactureDate {
    /// Calendar year
    pub year: u16,
    /// Month, 1 to 12
    pub month: u8,
    /// Day of month
    pub day: u8,
}

impl ManufactureDate {
    /// Decode the 4-byte record
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        match bytes {
            [y0, y1, month, day, ..] => Some(Self {
                year: u16::from_be_bytes([*y0, *y1]),
                month: *month,
                day: *day,
            }),
            _ => None,
        }
    }
}

impl fmt::Display for ManufactureDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}-{:02}", self.year, self.month, self.day)
    }
}

/// Token metadata written at personalization
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CardData {
    /// Batch id as upper-case hex
    pub batch: Option<String>,
    /// Blockchain identifier, e.g. `ETH`
    pub blockchain_id: Option<String>,
    /// Issuer identifier
    pub issuer_id: Option<String>,
    /// Manufacture date
    pub manufacture_date: Option<ManufactureDate>,
    /// Token symbol for token cards
    pub token_symbol: Option<String>,
    /// Token contract address for token cards
    pub token_contract_address: Option<String>,
    /// Token decimals for token cards
    pub token_decimal: Option<u8>,
}

impl CardData {
    /// Apply the records present in a CardData TLV
    ///
    /// Absent records leave the current value untouched.
    pub fn apply(&mut self, tlvs: &TlvList) -> Result<()> {
        if let Some(batch) = tlvs.hex(TlvTag::Batch) {
            self.batch = Some(batch);
        }
        if let Some(id) = tlvs.ascii(TlvTag::BlockchainId)? {
            self.blockchain_id = Some(id);
        }
        if let Some(id) = tlvs.ascii(TlvTag::IssuerId)? {
            self.issuer_id = Some(id);
        }
        if let Some(bytes) = tlvs.bytes(TlvTag::ManufactureDateTime) {
            self.manufacture_date = ManufactureDate::from_bytes(bytes);
        }
        if let Some(symbol) = tlvs.ascii(TlvTag::TokenSymbol)? {
            self.token_symbol = Some(symbol);
        }
        if let Some(address) = tlvs.ascii(TlvTag::TokenContractAddress)? {
            self.token_contract_address = Some(address);
        }
        if let Some(decimal) = tlvs.uint_as::<u8>(TlvTag::TokenDecimal)? {
            self.token_decimal = Some(decimal);
        }
        Ok(())
    }
}
