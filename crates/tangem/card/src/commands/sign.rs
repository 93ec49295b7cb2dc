use bytes::Bytes;
use k256::ecdsa::SigningKey;
use tangem_apdu_core::prelude::*;
use tracing::{debug, info};

use super::issuer_data::sign_issuer_data;
use crate::constants::{HASH_ALG_SHA256, MAX_HASHES, MAX_RAW_LEN};
use crate::crypto::{self, FixedSignature};
use crate::types::{IssuerData, SigningMethod, SigningMethods};
use crate::{Error, Result, Tangem};

/// Optional attachments of a Sign command
#[derive(Debug, Clone, Default)]
pub struct SignOptions {
    /// Issuer key that co-signs the signed material
    pub issuer_transaction_key: Option<SigningKey>,
    /// Issuer data written together with the signatures
    pub issuer_data: Option<Bytes>,
    /// Issuer key that signs `issuer_data`
    pub issuer_data_key: Option<SigningKey>,
}

impl SignOptions {
    /// Co-sign with the issuer transaction key
    pub fn with_issuer_transaction_key(mut self, key: SigningKey) -> Self {
        self.issuer_transaction_key = Some(key);
        self
    }

    /// Write issuer data in the same command
    pub fn with_issuer_data(mut self, data: impl Into<Bytes>, key: SigningKey) -> Self {
        self.issuer_data = Some(data.into());
        self.issuer_data_key = Some(key);
        self
    }
}

/// Result of a Sign command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignResponse {
    /// One signature per submitted hash, in order
    pub signatures: Vec<FixedSignature>,
    /// Signatures left on the card
    pub remaining_signatures: Option<u32>,
    /// Hashes signed so far
    pub signed_hashes: Option<u32>,
}

/// Which signing methods a request needs
struct MethodSet {
    plain: SigningMethod,
    validated: SigningMethod,
    with_issuer_data: SigningMethod,
}

const HASH_METHODS: MethodSet = MethodSet {
    plain: SigningMethod::SignHash,
    validated: SigningMethod::SignHashValidatedByIssuer,
    with_issuer_data: SigningMethod::SignHashValidatedByIssuerAndWriteIssuerData,
};

const RAW_METHODS: MethodSet = MethodSet {
    plain: SigningMethod::SignRaw,
    validated: SigningMethod::SignRawValidatedByIssuer,
    with_issuer_data: SigningMethod::SignRawValidatedByIssuerAndWriteIssuerData,
};

/// Reject hash batches the card would refuse
pub(crate) fn check_hashes<H: AsRef<[u8]>>(hashes: &[H]) -> Result<(u8, Vec<u8>)> {
    let Some(first) = hashes.first() else {
        return Err(Error::InvalidHashes("no hashes"));
    };
    if hashes.len() > MAX_HASHES {
        return Err(Error::InvalidHashes("too many hashes"));
    }
    let size = first.as_ref().len();
    let size = u8::try_from(size)
        .ok()
        .filter(|size| *size > 0)
        .ok_or(Error::InvalidHashes("invalid hash size"))?;
    if hashes.iter().any(|hash| hash.as_ref().len() != usize::from(size)) {
        return Err(Error::InvalidHashes("hash lengths differ"));
    }
    Ok((size, hashes.iter().flat_map(|hash| hash.as_ref()).copied().collect()))
}

fn check_methods(methods: SigningMethods, set: &MethodSet, options: &SignOptions) -> Result<()> {
    if options.issuer_data.is_some() {
        if !methods.contains(set.with_issuer_data) {
            return Err(Error::SigningMethodNotAllowed(
                "card does not sign with an issuer data update",
            ));
        }
        if options.issuer_data_key.is_none() {
            return Err(Error::SigningMethodNotAllowed(
                "issuer data update needs the issuer data key",
            ));
        }
    }
    if options.issuer_transaction_key.is_none() && !methods.contains(set.plain) {
        return Err(Error::SigningMethodNotAllowed(
            "card requires issuer validation",
        ));
    }
    if options.issuer_transaction_key.is_some()
        && !methods.contains(set.validated)
        && !methods.contains(set.with_issuer_data)
    {
        debug!("Card does not ask for issuer validation, sending it anyway");
    }
    Ok(())
}

impl<T: CardTransport> Tangem<T> {
    /// Sign 1 to 10 hashes of equal length
    pub fn sign<H: AsRef<[u8]>>(&mut self, hashes: &[H]) -> Result<Vec<FixedSignature>> {
        Ok(self.sign_with(hashes, &SignOptions::default())?.signatures)
    }

    /// Sign hashes with issuer and terminal attachments
    ///
    /// The batch is checked before anything is sent.
    pub fn sign_with<H: AsRef<[u8]>>(
        &mut self,
        hashes: &[H],
        options: &SignOptions,
    ) -> Result<SignResponse> {
        let (size, concatenated) = check_hashes(hashes)?;
        let count = hashes.len();
        self.sync_token();

        let frame = self
            .pin2_command(Instruction::Sign)?
            .with_tlv(Tlv::u8(TlvTag::TrOutHashSize, size))
            .with_tlv(Tlv::new(TlvTag::TrOutHash, concatenated.clone()));
        let (response, issuer_data) =
            self.sign_frame(frame, &concatenated, &HASH_METHODS, options)?;

        let signatures = split_signatures(response.tlvs().require(TlvTag::Signature)?, count)?;
        let result = self.finish_sign(&response, signatures, issuer_data)?;
        info!(count, remaining = result.remaining_signatures, "Hashes signed");
        Ok(result)
    }

    /// Sign a raw transaction part, hashed by the card with SHA-256
    pub fn sign_raw(&mut self, raw: &[u8], options: &SignOptions) -> Result<SignResponse> {
        if raw.is_empty() {
            return Err(Error::InvalidHashes("empty transaction"));
        }
        if raw.len() > MAX_RAW_LEN {
            return Err(Error::InvalidHashes("raw transaction too long"));
        }
        self.sync_token();

        let frame = self
            .pin2_command(Instruction::Sign)?
            .with_tlv(Tlv::new(TlvTag::TrOutRaw, raw.to_vec()))
            .with_tlv(Tlv::ascii(TlvTag::HashAlgId, HASH_ALG_SHA256));
        let (response, issuer_data) = self.sign_frame(frame, raw, &RAW_METHODS, options)?;

        let signatures = split_signatures(response.tlvs().require(TlvTag::Signature)?, 1)?;
        let result = self.finish_sign(&response, signatures, issuer_data)?;
        info!(len = raw.len(), "Raw transaction signed");
        Ok(result)
    }

    /// Attach issuer and terminal signatures and send
    fn sign_frame(
        &mut self,
        mut frame: CommandFrame,
        material: &[u8],
        set: &MethodSet,
        options: &SignOptions,
    ) -> Result<(ResponseFrame, Option<IssuerData>)> {
        let methods = self.state.signing_methods.ok_or(Error::ReadRequired)?;
        check_methods(methods, set, options)?;
        let card_id = self.card_id()?;

        let mut cosigned = material.to_vec();
        let mut issuer_data = None;
        if let (Some(data), Some(key)) = (&options.issuer_data, &options.issuer_data_key) {
            let counter = self.next_issuer_data_counter();
            let signature = sign_issuer_data(key, &card_id, data, counter)?;
            frame.push(Tlv::new(TlvTag::IssuerData, data.clone()));
            frame.push(Tlv::new(TlvTag::IssuerDataSignature, signature.to_vec()));
            if let Some(counter) = counter {
                frame.push(Tlv::u32(TlvTag::IssuerDataCounter, counter));
            }
            cosigned.extend_from_slice(data);
            issuer_data = Some(IssuerData {
                data: data.clone(),
                signature: Bytes::copy_from_slice(&signature),
                counter,
            });
        }
        if let Some(key) = &options.issuer_transaction_key {
            let signature = crypto::sign(key, &cosigned)?;
            frame.push(Tlv::new(TlvTag::IssuerTransactionSignature, signature.to_vec()));
        }
        if let Some(terminal) = &self.config.terminal_key {
            let signature = crypto::sign(terminal, material)?;
            frame.push(Tlv::new(TlvTag::TerminalTransactionSignature, signature.to_vec()));
            if let Some(public) = self.config.terminal_public_key() {
                frame.push(Tlv::new(TlvTag::TerminalPublicKey, public));
            }
        }

        let result = self.run(frame, false);
        self.track_default_pin2(&result);
        Ok((result?, issuer_data))
    }

    fn finish_sign(
        &mut self,
        response: &ResponseFrame,
        signatures: Vec<FixedSignature>,
        issuer_data: Option<IssuerData>,
    ) -> Result<SignResponse> {
        let remaining = response
            .tlvs()
            .uint_as::<u32>(TlvTag::RemainingSignatures)?;
        let signed = response.tlvs().uint_as::<u32>(TlvTag::SignedHashes)?;

        if remaining.is_some() {
            self.state.remaining_signatures = remaining;
        }
        if signed.is_some() {
            self.state.signed_hashes = signed;
        }
        if issuer_data.is_some() {
            self.state.issuer_data = issuer_data;
        }

        Ok(SignResponse {
            signatures,
            remaining_signatures: remaining,
            signed_hashes: signed,
        })
    }
}

fn split_signatures(bytes: &[u8], count: usize) -> Result<Vec<FixedSignature>> {
    if bytes.len() != count * 64 {
        return Err(Error::InvalidData("signature count does not match hashes"));
    }
    Ok(bytes
        .chunks_exact(64)
        .map(|chunk| {
            let mut signature = [0u8; 64];
            signature.copy_from_slice(chunk);
            signature
        })
        .collect())
}
