use bytes::Bytes;
use tangem_apdu_core::prelude::*;
use tracing::info;

use crate::{Result, Tangem};

impl<T: CardTransport> Tangem<T> {
    /// Bump the card validation counter
    ///
    /// The counter and its card signature are meant for the issuer's
    /// anti-clone backend.
    pub fn validate_card(&mut self) -> Result<CardValidation> {
        self.sync_token();
        let frame = self.pin2_command(Instruction::ValidateCard)?;
        let result = self.run(frame, false);
        self.track_default_pin2(&result);
        let response = result?;

        let validation = CardValidation {
            counter: response
                .tlvs()
                .uint_as::<u32>(TlvTag::ValidationCounter)?,
            signature: response
                .tlvs()
                .bytes(TlvTag::CardSignature)
                .map(Bytes::copy_from_slice),
        };
        info!(counter = validation.counter, "Card validated");
        Ok(validation)
    }

    /// Hash a range of firmware code pages with a challenge
    ///
    /// The result is compared against a published hash library.
    pub fn verify_code(&mut self, request: &VerifyCodeRequest) -> Result<Bytes> {
        self.sync_token();
        let frame = self
            .command(Instruction::VerifyCode)?
            .with_tlv(Tlv::ascii(TlvTag::HashAlgId, &request.hash_alg))
            .with_tlv(Tlv::u32(TlvTag::CodePageAddress, request.code_page_address))
            .with_tlv(Tlv::u16(TlvTag::CodePageCount, request.code_page_count))
            .with_tlv(Tlv::new(TlvTag::Challenge, request.challenge.clone()));

        let response = self.run(frame, false)?;
        Ok(Bytes::copy_from_slice(
            response.tlvs().require(TlvTag::CodeHash)?,
        ))
    }
}

/// Result of ValidateCard
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardValidation {
    /// New validation counter
    pub counter: Option<u32>,
    /// Card signature over the counter
    pub signature: Option<Bytes>,
}

/// Parameters of VerifyCode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyCodeRequest {
    /// Hash algorithm, e.g. `sha-256`
    pub hash_alg: String,
    /// First code page
    pub code_page_address: u32,
    /// Number of code pages
    pub code_page_count: u16,
    /// Challenge appended before hashing
    pub challenge: Bytes,
}
