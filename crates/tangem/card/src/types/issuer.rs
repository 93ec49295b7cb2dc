use bytes::Bytes;
use tangem_apdu_core::{TlvList, TlvTag};

use crate::Result;

/// Issuer data block with its issuer signature
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuerData {
    /// Data as stored on the card
    pub data: Bytes,
    /// Issuer signature over `card id ‖ data [‖ counter]`
    pub signature: Bytes,
    /// Replay counter, when the card reports one
    pub counter: Option<u32>,
}

/// Signed issuer data waiting to be written on the next Read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingIssuerData {
    /// Card the data was signed for
    pub card_id: String,
    /// New data
    pub data: Bytes,
    /// Issuer signature over `card id ‖ data [‖ counter]`
    pub signature: Bytes,
    /// Replay counter
    pub counter: Option<u32>,
}

/// Issuer data as parsed for display
///
/// Issuer data is itself a TLV sequence; these are the records the protocol
/// layer understands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssuerDataRecords {
    /// Balance confirmed by the issuer
    pub validated_balance: Option<Bytes>,
    /// Note denomination
    pub denomination: Option<Bytes>,
    /// Human readable denomination
    pub denomination_text: Option<String>,
    /// Last time the card signed, as recorded by the issuer
    pub last_sign_date: Option<Bytes>,
}

impl IssuerDataRecords {
    /// Decode the records carried in issuer data
    ///
    /// Empty data has no records.
    pub fn decode(data: &[u8]) -> Result<Self> {
        let tlvs = TlvList::decode(data)?;
        Ok(Self {
            validated_balance: tlvs.bytes(TlvTag::ValidatedBalance).map(Bytes::copy_from_slice),
            denomination: tlvs.bytes(TlvTag::Denomination).map(Bytes::copy_from_slice),
            denomination_text: tlvs.ascii(TlvTag::DenominationText)?,
            last_sign_date: tlvs.bytes(TlvTag::LastSignDate).map(Bytes::copy_from_slice),
        })
    }
}
