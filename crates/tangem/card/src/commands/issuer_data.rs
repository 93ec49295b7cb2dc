//! Issuer data commands
//!
//! Issuer data is a block the issuer writes and signs; the card stores it
//! without interpreting it. With `ProtectIssuerDataAgainstReplay` set, every
//! write carries a counter that must grow, and the counter is part of the
//! signed material.
//!
//! The extra issuer data variant moves larger blocks in parts: a start
//! command signed over `card id ‖ counter ‖ size`, the parts themselves, and
//! a finalize command signed over `card id ‖ data ‖ counter`.

use bytes::{BufMut, Bytes, BytesMut};
use k256::ecdsa::SigningKey;
use tangem_apdu_core::prelude::*;
use tracing::{debug, info, trace};

use crate::constants::{ISSUER_DATA_EX_PART, issuer_data_mode};
use crate::crypto::{self, FixedSignature};
use crate::types::{IssuerData, IssuerDataRecords, Setting};
use crate::{Error, Result, Tangem};

/// Sign issuer data for one card
///
/// The signed material is `card id ‖ data`, followed by the big-endian
/// counter when the card protects issuer data against replay.
pub fn sign_issuer_data(
    key: &SigningKey,
    card_id: &[u8],
    data: &[u8],
    counter: Option<u32>,
) -> Result<FixedSignature> {
    crypto::sign(key, &issuer_data_material(card_id, data, counter))
}

fn issuer_data_material(card_id: &[u8], data: &[u8], counter: Option<u32>) -> Vec<u8> {
    let mut material = BytesMut::with_capacity(card_id.len() + data.len() + 4);
    material.put_slice(card_id);
    material.put_slice(data);
    if let Some(counter) = counter {
        material.put_u32(counter);
    }
    material.to_vec()
}

fn start_material(card_id: &[u8], counter: Option<u32>, size: u16) -> Vec<u8> {
    let mut material = BytesMut::with_capacity(card_id.len() + 6);
    material.put_slice(card_id);
    if let Some(counter) = counter {
        material.put_u32(counter);
    }
    material.put_u16(size);
    material.to_vec()
}

impl<T: CardTransport> Tangem<T> {
    fn protects_issuer_data(&self) -> bool {
        self.state
            .settings
            .is_some_and(|settings| settings.contains(Setting::ProtectIssuerDataAgainstReplay))
    }

    /// Counter the next issuer data write must carry
    pub(crate) fn next_issuer_data_counter(&self) -> Option<u32> {
        self.protects_issuer_data().then(|| {
            self.state
                .issuer_data
                .as_ref()
                .and_then(|data| data.counter)
                .map_or(1, |counter| counter.saturating_add(1))
        })
    }

    fn next_issuer_data_ex_counter(&self) -> Option<u32> {
        self.protects_issuer_data().then(|| {
            self.state
                .issuer_data_ex
                .as_ref()
                .and_then(|data| data.counter)
                .map_or(1, |counter| counter.saturating_add(1))
        })
    }

    fn issuer_data_key(&self) -> Result<Bytes> {
        self.state
            .issuer_data_public_key
            .clone()
            .ok_or(Error::InvalidIssuerData("issuer data key unknown"))
    }

    /// Read and verify issuer data
    ///
    /// Returns `None` when the card holds no issuer data. Data that does not
    /// verify against the issuer data key is rejected and leaves the card
    /// state untouched.
    pub fn get_issuer_data(&mut self) -> Result<Option<IssuerDataRecords>> {
        self.sync_token();
        let card_id = self.card_id()?;
        let protected = self.protects_issuer_data();

        let frame = self.command(Instruction::GetIssuerData)?;
        let response = self.run(frame, false)?;
        let tlvs = response.tlvs();

        let (Some(data), Some(signature)) = (
            tlvs.bytes(TlvTag::IssuerData),
            tlvs.bytes(TlvTag::IssuerDataSignature),
        ) else {
            return Err(Error::InvalidIssuerData("missing data or signature"));
        };
        let counter = tlvs.bytes(TlvTag::IssuerDataCounter);

        if data.is_empty() && signature.is_empty() {
            debug!("Card holds no issuer data");
            self.state.issuer_data = None;
            return Ok(None);
        }

        let mut material = [&card_id[..], data].concat();
        if protected {
            let counter = counter.ok_or(Error::InvalidIssuerData("missing counter"))?;
            material.extend_from_slice(counter);
        }
        if !crypto::verify(&self.issuer_data_key()?, &material, signature) {
            return Err(Error::InvalidIssuerData("signature verification failed"));
        }

        let records = IssuerDataRecords::decode(data)?;
        self.state.issuer_data = Some(IssuerData {
            data: Bytes::copy_from_slice(data),
            signature: Bytes::copy_from_slice(signature),
            counter: tlvs.uint_as::<u32>(TlvTag::IssuerDataCounter)?,
        });
        info!(len = data.len(), "Issuer data verified");
        Ok(Some(records))
    }

    /// Write issuer data signed elsewhere
    pub fn write_issuer_data(
        &mut self,
        data: Bytes,
        signature: Bytes,
        counter: Option<u32>,
    ) -> Result<()> {
        self.sync_token();
        let mut frame = self
            .command(Instruction::WriteIssuerData)?
            .with_tlv(Tlv::new(TlvTag::IssuerData, data.clone()))
            .with_tlv(Tlv::new(TlvTag::IssuerDataSignature, signature.clone()));
        if let Some(counter) = counter {
            frame.push(Tlv::u32(TlvTag::IssuerDataCounter, counter));
        }
        self.run(frame, false)?;

        info!(len = data.len(), ?counter, "Issuer data written");
        self.state.issuer_data = Some(IssuerData {
            data,
            signature,
            counter,
        });
        Ok(())
    }

    /// Sign issuer data with the issuer data key and write it
    pub fn write_issuer_data_signed(&mut self, data: Bytes, key: &SigningKey) -> Result<()> {
        self.sync_token();
        let card_id = self.card_id()?;
        let counter = self.next_issuer_data_counter();
        let signature = sign_issuer_data(key, &card_id, &data, counter)?;
        self.write_issuer_data(data, Bytes::copy_from_slice(&signature), counter)
    }

    /// Read and verify extra issuer data, part by part
    pub fn get_issuer_data_ex(&mut self) -> Result<Option<Bytes>> {
        self.sync_token();
        let card_id = self.card_id()?;
        let protected = self.protects_issuer_data();

        let mut collected = BytesMut::new();
        let mut size = None;
        let (signature, counter) = loop {
            let offset = u16::try_from(collected.len())
                .map_err(|_| Error::InvalidData("extra issuer data too long"))?;
            let frame = self
                .command(Instruction::GetIssuerData)?
                .with_tlv(Tlv::u8(TlvTag::Mode, issuer_data_mode::START_OR_READ))
                .with_tlv(Tlv::u16(TlvTag::Offset, offset));
            let response = self.run(frame, false)?;
            let tlvs = response.tlvs();

            let part = tlvs.bytes(TlvTag::IssuerData).unwrap_or_default();
            collected.extend_from_slice(part);
            if size.is_none() {
                size = tlvs.uint(TlvTag::Size)?;
            }
            if let Some(total) = size.filter(|total| *total > 0) {
                let percent = (collected.len() as u64 * 100 / total).min(100) as u8;
                self.observer.on_progress(percent);
                trace!(read = collected.len(), total, "Extra issuer data progress");
            }

            let signature = tlvs.bytes(TlvTag::IssuerDataSignature);
            let counter = tlvs.bytes(TlvTag::IssuerDataCounter);
            if let Some(signature) = signature {
                if !protected || counter.is_some() {
                    break (
                        Bytes::copy_from_slice(signature),
                        counter.map(Bytes::copy_from_slice),
                    );
                }
            }
            if part.is_empty() {
                return Err(Error::InvalidIssuerData("card stopped sending data"));
            }
        };
        self.observer.on_progress(100);

        let counter_value = counter
            .as_deref()
            .map(|raw| raw.iter().fold(0u32, |acc, b| (acc << 8) | u32::from(*b)));

        if collected.is_empty() || signature.is_empty() {
            debug!("Card holds no extra issuer data");
            self.state.issuer_data_ex = Some(IssuerData {
                data: Bytes::new(),
                signature: Bytes::new(),
                counter: counter_value,
            });
            return Ok(None);
        }

        let mut material = [&card_id[..], &collected[..]].concat();
        if let Some(counter) = counter.as_deref().filter(|_| protected) {
            material.extend_from_slice(counter);
        }
        if !crypto::verify(&self.issuer_data_key()?, &material, &signature) {
            return Err(Error::InvalidIssuerData("signature verification failed"));
        }

        let data = collected.freeze();
        self.state.issuer_data_ex = Some(IssuerData {
            data: data.clone(),
            signature,
            counter: counter_value,
        });
        info!(len = data.len(), "Extra issuer data verified");
        Ok(Some(data))
    }

    /// Write extra issuer data, signing with the issuer data key
    ///
    /// Each step returns at the first security delay instead of waiting.
    pub fn write_issuer_data_ex(&mut self, data: &[u8], key: &SigningKey) -> Result<()> {
        self.sync_token();
        let card_id = self.card_id()?;
        let size = u16::try_from(data.len())
            .map_err(|_| Error::InvalidData("extra issuer data too long"))?;
        let counter = self.next_issuer_data_ex_counter();

        let start_signature = crypto::sign(key, &start_material(&card_id, counter, size))?;
        let mut frame = self
            .command(Instruction::WriteIssuerData)?
            .with_tlv(Tlv::u8(TlvTag::Mode, issuer_data_mode::START_OR_READ));
        if let Some(counter) = counter {
            frame.push(Tlv::u32(TlvTag::IssuerDataCounter, counter));
        }
        frame.push(Tlv::u16(TlvTag::Size, size));
        frame.push(Tlv::new(TlvTag::IssuerDataSignature, start_signature.to_vec()));
        self.run(frame, true)?;
        self.observer.on_progress(10);

        let mut offset = 0usize;
        for part in data.chunks(ISSUER_DATA_EX_PART) {
            let frame = self
                .command(Instruction::WriteIssuerData)?
                .with_tlv(Tlv::u8(TlvTag::Mode, issuer_data_mode::WRITE_PART))
                .with_tlv(Tlv::u16(TlvTag::Offset, offset as u16))
                .with_tlv(Tlv::new(TlvTag::IssuerData, part.to_vec()));
            self.run(frame, true)?;
            offset += part.len();
            self.observer
                .on_progress((10 + offset * 80 / data.len()) as u8);
            trace!(written = offset, total = data.len(), "Extra issuer data progress");
        }

        let final_signature = sign_issuer_data(key, &card_id, data, counter)?;
        let frame = self
            .command(Instruction::WriteIssuerData)?
            .with_tlv(Tlv::u8(TlvTag::Mode, issuer_data_mode::FINALIZE))
            .with_tlv(Tlv::new(TlvTag::IssuerDataSignature, final_signature.to_vec()));
        self.run(frame, true)?;
        self.observer.on_progress(100);

        self.state.issuer_data_ex = Some(IssuerData {
            data: Bytes::copy_from_slice(data),
            signature: Bytes::copy_from_slice(&final_signature),
            counter,
        });
        info!(len = data.len(), ?counter, "Extra issuer data written");
        Ok(())
    }
}
