//! Common test utilities
//!
//! `ScriptedTransport` replays canned responses and records what was sent.
//! `SimulatedCard` is a small card emulator that speaks the real protocol:
//! PIN checks, Fast and Strong sessions, security delays, issuer data and
//! signing with its own keys.
#![allow(dead_code, unreachable_pub)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use k256::ecdsa::SigningKey;
use k256::ecdsa::signature::hazmat::PrehashSigner;
use k256::{PublicKey, SecretKey};
use pbkdf2::pbkdf2_hmac;
use rand_v8::rngs::StdRng;
use rand_v8::{RngCore, SeedableRng};
use sha2::Sha256;
use tangem_apdu_core::prelude::*;
use tangem_card::constants::{DEFAULT_PIN, DEFAULT_PIN2, PBKDF2_ITERATIONS};
use tangem_card::crypto::{self, WalletKey};
use tangem_card::{
    CardStatus, DelayObserver, EncryptionMode, SecureSession, SessionKey, Setting, SettingsMask,
    SigningMethod, SigningMethods,
};

pub const TOKEN_ID: [u8; 7] = [0x04, 0x5A, 0x1B, 0x22, 0x6C, 0x48, 0x80];
pub const CARD_ID: [u8; 8] = [0xCB, 0x22, 0x00, 0x00, 0x00, 0x02, 0x73, 0x74];

/// Install a test subscriber once; output only shows with `--nocapture`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Deterministic secp256k1 key
pub fn key(seed: u64) -> SigningKey {
    let mut rng = StdRng::seed_from_u64(seed);
    loop {
        let mut bytes = [0u8; 32];
        rng.fill_bytes(&mut bytes);
        if let Ok(key) = SigningKey::from_slice(&bytes) {
            return key;
        }
    }
}

/// Uncompressed SEC1 encoding of a key's public point
pub fn public(key: &SigningKey) -> Vec<u8> {
    key.verifying_key().to_encoded_point(false).as_bytes().to_vec()
}

fn completed(tlvs: Vec<Tlv>) -> Result<(Vec<Tlv>, Status), Status> {
    Ok((tlvs, Status::ProcessCompleted))
}

fn response(tlvs: &TlvList, status: Status) -> Bytes {
    let mut data = tlvs.encode().unwrap_or_default().to_vec();
    data.extend_from_slice(&status.code().to_be_bytes());
    Bytes::from(data)
}

/// Transport replaying canned responses
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    pub responses: VecDeque<Bytes>,
    pub commands: Vec<Bytes>,
    pub token_id: Option<Bytes>,
    pub timeouts: Vec<Duration>,
    timeout: Duration,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self {
            token_id: Some(Bytes::from_static(&TOKEN_ID)),
            ..Self::default()
        }
    }

    /// Queue a plain response
    pub fn respond(mut self, tlvs: Vec<Tlv>, status: Status) -> Self {
        self.responses.push_back(response(&TlvList::from(tlvs), status));
        self
    }

    /// Queue a security delay response
    pub fn pause(self, units: u16) -> Self {
        self.respond(vec![Tlv::u16(TlvTag::Pause, units)], Status::NeedPause)
    }

    /// Instructions of all commands sent so far
    pub fn instructions(&self) -> Vec<u8> {
        self.commands.iter().map(|command| command[1]).collect()
    }
}

impl CardTransport for ScriptedTransport {
    type Error = TransportError;

    fn do_exchange(&mut self, command: &[u8]) -> Result<Bytes, Self::Error> {
        self.commands.push(Bytes::copy_from_slice(command));
        self.responses
            .pop_front()
            .ok_or_else(|| TransportError::io("no scripted response"))
    }

    fn token_id(&self) -> Option<Bytes> {
        self.token_id.clone()
    }

    fn set_timeout(&mut self, timeout: Duration) {
        self.timeouts.push(timeout);
        self.timeout = timeout;
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn is_connected(&self) -> bool {
        true
    }
}

/// Observer counting notifications
#[derive(Debug, Default)]
pub struct RecordingObserver {
    pub delays: Mutex<Vec<Duration>>,
    pub progress: Mutex<Vec<u8>>,
    pub requests: Mutex<u32>,
    pub finished: Mutex<u32>,
}

impl RecordingObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().unwrap().clone()
    }

    pub fn progress(&self) -> Vec<u8> {
        self.progress.lock().unwrap().clone()
    }
}

impl DelayObserver for RecordingObserver {
    fn on_before_request(&self, _timeout: Duration) {
        *self.requests.lock().unwrap() += 1;
    }

    fn on_security_delay(&self, remaining: Duration) {
        self.delays.lock().unwrap().push(remaining);
    }

    fn on_wait_finished(&self) {
        *self.finished.lock().unwrap() += 1;
    }

    fn on_progress(&self, percent: u8) {
        self.progress.lock().unwrap().push(percent);
    }
}

/// Extra issuer data write in progress
#[derive(Debug, Clone, Default)]
struct ExWrite {
    size: usize,
    counter: Option<u32>,
    data: Vec<u8>,
}

/// Card emulator
#[derive(Debug)]
pub struct SimulatedCard {
    pub token_id: Bytes,
    pub card_id: [u8; 8],
    pub status: CardStatus,
    pub firmware: String,
    pub pin_hash: [u8; 32],
    pub pin2_hash: [u8; 32],
    pub required_mode: EncryptionMode,
    pub settings: SettingsMask,
    pub signing_methods: SigningMethods,
    pub card_key: SigningKey,
    pub wallet_key: Option<SigningKey>,
    pub issuer_data_key: SigningKey,
    pub issuer_transaction_key: SigningKey,
    pub issuer_data: Vec<u8>,
    pub issuer_data_signature: Vec<u8>,
    pub issuer_data_counter: Option<u32>,
    pub issuer_data_ex: Vec<u8>,
    pub issuer_data_ex_counter: Option<u32>,
    pub max_signatures: u32,
    pub remaining_signatures: u32,
    pub signed_hashes: u32,
    pub validation_counter: u32,
    /// Security delay rounds before each PIN2 command completes
    pub pause_rounds: u32,
    /// Answer VerifyCard with a random signature
    pub forge_card_signature: bool,
    /// Instructions received, in order
    pub log: Vec<u8>,
    session: SecureSession,
    paused: u32,
    ex_write: Option<ExWrite>,
    rng: StdRng,
}

impl SimulatedCard {
    /// Personalized card without a wallet
    pub fn empty() -> Self {
        Self {
            token_id: Bytes::from_static(&TOKEN_ID),
            card_id: CARD_ID,
            status: CardStatus::Empty,
            firmware: "2.30".to_string(),
            pin_hash: crypto::pin_hash(DEFAULT_PIN),
            pin2_hash: crypto::pin_hash(DEFAULT_PIN2),
            required_mode: EncryptionMode::None,
            settings: SettingsMask::new(&[Setting::IsReusable, Setting::AllowSwapPin]),
            signing_methods: SigningMethods::new(&[SigningMethod::SignHash, SigningMethod::SignRaw]),
            card_key: key(1),
            wallet_key: None,
            issuer_data_key: key(2),
            issuer_transaction_key: key(3),
            issuer_data: Vec::new(),
            issuer_data_signature: Vec::new(),
            issuer_data_counter: None,
            issuer_data_ex: Vec::new(),
            issuer_data_ex_counter: None,
            max_signatures: 1000,
            remaining_signatures: 1000,
            signed_hashes: 0,
            validation_counter: 0,
            pause_rounds: 0,
            forge_card_signature: false,
            log: Vec::new(),
            session: SecureSession::plain(),
            paused: 0,
            ex_write: None,
            rng: StdRng::seed_from_u64(99),
        }
    }

    /// Card with a secp256k1 wallet key
    pub fn loaded() -> Self {
        Self {
            status: CardStatus::Loaded,
            wallet_key: Some(key(4)),
            ..Self::empty()
        }
    }

    pub fn with_mode(mut self, mode: EncryptionMode) -> Self {
        self.required_mode = mode;
        self
    }

    pub fn with_settings(mut self, settings: &[Setting]) -> Self {
        self.settings = SettingsMask::new(settings);
        self
    }

    pub fn with_signing_methods(mut self, methods: &[SigningMethod]) -> Self {
        self.signing_methods = SigningMethods::new(methods);
        self
    }

    /// Store issuer data signed with the card's issuer data key
    pub fn with_issuer_data(mut self, data: &[u8], counter: Option<u32>) -> Self {
        let mut material = [&self.card_id[..], data].concat();
        if let Some(counter) = counter {
            material.extend_from_slice(&counter.to_be_bytes());
        }
        self.issuer_data = data.to_vec();
        self.issuer_data_signature = crypto::sign(&self.issuer_data_key, &material)
            .unwrap()
            .to_vec();
        self.issuer_data_counter = counter;
        self
    }

    pub fn wallet_public(&self) -> Option<WalletKey> {
        self.wallet_key
            .as_ref()
            .map(|key| WalletKey::from(&PublicKey::from(key.verifying_key())))
    }

    fn protects_issuer_data(&self) -> bool {
        self.settings.contains(Setting::ProtectIssuerDataAgainstReplay)
    }

    fn protocol_key(&self) -> [u8; 32] {
        let mut key = [0u8; 32];
        pbkdf2_hmac::<Sha256>(&self.pin_hash, &self.token_id, PBKDF2_ITERATIONS, &mut key);
        key
    }

    fn random(&mut self, len: usize) -> Vec<u8> {
        let mut bytes = vec![0u8; len];
        self.rng.fill_bytes(&mut bytes);
        bytes
    }

    fn open_session(&mut self, apdu: &CommandApdu) -> Bytes {
        let Some(mode) = EncryptionMode::from_code(apdu.p2) else {
            return response(&TlvList::new(), Status::InvalidParams);
        };
        let Ok(tlvs) = TlvList::decode(&apdu.data) else {
            return response(&TlvList::new(), Status::InvalidParams);
        };
        let Some(host) = tlvs.bytes(TlvTag::SessionKeyA) else {
            return response(&TlvList::new(), Status::InvalidParams);
        };

        let protocol_key = self.protocol_key();
        let (key, session_key_b) = match mode {
            EncryptionMode::Strong => {
                let secret = SecretKey::from_slice(&key(77).to_bytes()).unwrap();
                let theirs = PublicKey::from_sec1_bytes(host).unwrap();
                let ours = WalletKey::from(&secret.public_key()).uncompressed.to_vec();
                (SessionKey::strong(&protocol_key, &secret, &theirs), ours)
            }
            _ => {
                let card = self.random(16);
                let mut challenge = [0u8; 16];
                challenge.copy_from_slice(host);
                (SessionKey::fast(&protocol_key, &challenge, &card), card)
            }
        };
        self.session = SecureSession::established(mode, key);
        response(
            &vec![Tlv::new(TlvTag::SessionKeyB, session_key_b)].into(),
            Status::ProcessCompleted,
        )
    }

    fn read_response(&self) -> Vec<Tlv> {
        let card_data = TlvList::from(vec![
            Tlv::new(TlvTag::Batch, vec![0x00, 0x17]),
            Tlv::ascii(TlvTag::BlockchainId, "ETH"),
            Tlv::ascii(TlvTag::IssuerId, "TANGEM SDK"),
            Tlv::new(TlvTag::ManufactureDateTime, vec![0x07, 0xE4, 0x05, 0x11]),
        ])
        .encode()
        .unwrap();

        let mut tlvs = vec![
            Tlv::new(TlvTag::CardId, self.card_id.to_vec()),
            Tlv::ascii(TlvTag::ManufacturerId, "TANGEM"),
            Tlv::u8(TlvTag::Status, self.status.code()),
            Tlv::ascii(TlvTag::Firmware, &self.firmware),
            Tlv::new(TlvTag::CardPublicKey, public(&self.card_key)),
            Tlv::u32(TlvTag::SettingsMask, self.settings.bits()),
            Tlv::new(TlvTag::IssuerDataPublicKey, public(&self.issuer_data_key)),
            Tlv::new(
                TlvTag::IssuerTransactionPublicKey,
                public(&self.issuer_transaction_key),
            ),
            Tlv::u8(TlvTag::Health, 0),
            Tlv::u16(TlvTag::PauseBeforePin2, 0),
            Tlv::u8(TlvTag::SigningMethod, self.signing_methods.code()),
            Tlv::u32(TlvTag::MaxSignatures, self.max_signatures),
            Tlv::new(TlvTag::CardData, card_data),
        ];
        if let (CardStatus::Loaded, Some(wallet)) = (self.status, self.wallet_public()) {
            tlvs.push(Tlv::ascii(TlvTag::CurveId, "secp256k1"));
            tlvs.push(Tlv::new(TlvTag::WalletPublicKey, wallet.uncompressed.to_vec()));
            tlvs.push(Tlv::u32(TlvTag::RemainingSignatures, self.remaining_signatures));
            tlvs.push(Tlv::u32(TlvTag::SignedHashes, self.signed_hashes));
        }
        tlvs
    }

    fn challenge_response(&mut self, key: &SigningKey, tlvs: &TlvList, tag: TlvTag) -> Vec<Tlv> {
        let challenge = tlvs.bytes(TlvTag::Challenge).unwrap_or_default().to_vec();
        let salt = self.random(16);
        let signature = if self.forge_card_signature && tag == TlvTag::CardSignature {
            self.random(64)
        } else {
            crypto::sign(key, &[&challenge[..], &salt[..]].concat())
                .unwrap()
                .to_vec()
        };
        vec![
            Tlv::new(TlvTag::CardId, self.card_id.to_vec()),
            Tlv::new(TlvTag::Salt, salt),
            Tlv::new(tag, signature),
        ]
    }

    fn needs_pin2(instruction: Instruction) -> bool {
        matches!(
            instruction,
            Instruction::Sign
                | Instruction::CreateWallet
                | Instruction::PurgeWallet
                | Instruction::SwapPin
                | Instruction::ValidateCard
        )
    }

    fn sign(&mut self, tlvs: &TlvList) -> Result<Vec<Tlv>, Status> {
        let wallet = self.wallet_key.clone().ok_or(Status::InvalidState)?;
        let (digests, count) = match tlvs.bytes(TlvTag::TrOutRaw) {
            Some(raw) => (vec![crypto::sha256(raw).to_vec()], 1),
            None => {
                let size = tlvs.uint(TlvTag::TrOutHashSize).ok().flatten().ok_or(Status::InvalidParams)?;
                let hashes = tlvs.bytes(TlvTag::TrOutHash).ok_or(Status::InvalidParams)?;
                let chunks: Vec<Vec<u8>> =
                    hashes.chunks(size as usize).map(<[u8]>::to_vec).collect();
                let count = chunks.len() as u32;
                (chunks, count)
            }
        };

        if let Some(signature) = tlvs.bytes(TlvTag::IssuerTransactionSignature) {
            let mut material = tlvs
                .bytes(TlvTag::TrOutRaw)
                .or_else(|| tlvs.bytes(TlvTag::TrOutHash))
                .unwrap_or_default()
                .to_vec();
            if let Some(data) = tlvs.bytes(TlvTag::IssuerData) {
                material.extend_from_slice(data);
            }
            if !crypto::verify(&public(&self.issuer_transaction_key), &material, signature) {
                return Err(Status::InvalidParams);
            }
        }
        if let Some(data) = tlvs.bytes(TlvTag::IssuerData) {
            let counter = tlvs.uint(TlvTag::IssuerDataCounter).ok().flatten().map(|c| c as u32);
            let signature = tlvs.bytes(TlvTag::IssuerDataSignature).unwrap_or_default();
            self.store_issuer_data(data, signature, counter)?;
        }

        let mut signatures = Vec::new();
        for digest in &digests {
            let signature: k256::ecdsa::Signature =
                wallet.sign_prehash(digest).map_err(|_| Status::InvalidParams)?;
            signatures.extend_from_slice(&signature.to_bytes());
        }
        self.remaining_signatures -= count;
        self.signed_hashes += count;

        Ok(vec![
            Tlv::new(TlvTag::CardId, self.card_id.to_vec()),
            Tlv::new(TlvTag::Signature, signatures),
            Tlv::u32(TlvTag::RemainingSignatures, self.remaining_signatures),
            Tlv::u32(TlvTag::SignedHashes, self.signed_hashes),
        ])
    }

    fn store_issuer_data(
        &mut self,
        data: &[u8],
        signature: &[u8],
        counter: Option<u32>,
    ) -> Result<(), Status> {
        let mut material = [&self.card_id[..], data].concat();
        if self.protects_issuer_data() {
            let counter = counter.ok_or(Status::InvalidParams)?;
            if self.issuer_data_counter.is_some_and(|current| counter <= current) {
                return Err(Status::InvalidParams);
            }
            material.extend_from_slice(&counter.to_be_bytes());
        }
        if !crypto::verify(&public(&self.issuer_data_key), &material, signature) {
            return Err(Status::InvalidParams);
        }
        self.issuer_data = data.to_vec();
        self.issuer_data_signature = signature.to_vec();
        if self.protects_issuer_data() {
            self.issuer_data_counter = counter;
        }
        Ok(())
    }

    fn get_issuer_data(&self, tlvs: &TlvList) -> Vec<Tlv> {
        let mut out = vec![Tlv::new(TlvTag::CardId, self.card_id.to_vec())];
        if tlvs.contains(TlvTag::Mode) {
            let offset = tlvs.uint(TlvTag::Offset).ok().flatten().unwrap_or(0) as usize;
            let end = (offset + 1000).min(self.issuer_data_ex.len());
            let part = self.issuer_data_ex.get(offset..end).unwrap_or_default();
            out.push(Tlv::new(TlvTag::IssuerData, part.to_vec()));
            if offset == 0 {
                out.push(Tlv::u16(TlvTag::Size, self.issuer_data_ex.len() as u16));
            }
            if end >= self.issuer_data_ex.len() {
                let mut material = [&self.card_id[..], &self.issuer_data_ex[..]].concat();
                if self.protects_issuer_data() {
                    let counter = self.issuer_data_ex_counter.unwrap_or(0);
                    material.extend_from_slice(&counter.to_be_bytes());
                    out.push(Tlv::u32(TlvTag::IssuerDataCounter, counter));
                }
                let signature = if self.issuer_data_ex.is_empty() {
                    Vec::new()
                } else {
                    crypto::sign(&self.issuer_data_key, &material).unwrap().to_vec()
                };
                out.push(Tlv::new(TlvTag::IssuerDataSignature, signature));
            }
            return out;
        }

        out.push(Tlv::new(TlvTag::IssuerData, self.issuer_data.clone()));
        out.push(Tlv::new(TlvTag::IssuerDataSignature, self.issuer_data_signature.clone()));
        if let Some(counter) = self.issuer_data_counter {
            out.push(Tlv::u32(TlvTag::IssuerDataCounter, counter));
        }
        out
    }

    fn write_issuer_data_ex(&mut self, tlvs: &TlvList, mode: u64) -> Result<(), Status> {
        let signature = tlvs.bytes(TlvTag::IssuerDataSignature);
        match mode {
            1 => {
                let size = tlvs.uint(TlvTag::Size).ok().flatten().ok_or(Status::InvalidParams)?;
                let counter = tlvs.uint(TlvTag::IssuerDataCounter).ok().flatten().map(|c| c as u32);
                let mut material = self.card_id.to_vec();
                if let Some(counter) = counter {
                    material.extend_from_slice(&counter.to_be_bytes());
                }
                material.extend_from_slice(&(size as u16).to_be_bytes());
                if !crypto::verify(&public(&self.issuer_data_key), &material, signature.unwrap_or_default()) {
                    return Err(Status::InvalidParams);
                }
                self.ex_write = Some(ExWrite {
                    size: size as usize,
                    counter,
                    data: vec![0u8; size as usize],
                });
            }
            2 => {
                let write = self.ex_write.as_mut().ok_or(Status::InvalidState)?;
                let offset = tlvs.uint(TlvTag::Offset).ok().flatten().unwrap_or(0) as usize;
                let part = tlvs.bytes(TlvTag::IssuerData).unwrap_or_default();
                let target = write
                    .data
                    .get_mut(offset..offset + part.len())
                    .ok_or(Status::InvalidParams)?;
                target.copy_from_slice(part);
            }
            3 => {
                let write = self.ex_write.take().ok_or(Status::InvalidState)?;
                let mut material = [&self.card_id[..], &write.data[..]].concat();
                if let Some(counter) = write.counter {
                    material.extend_from_slice(&counter.to_be_bytes());
                }
                if !crypto::verify(&public(&self.issuer_data_key), &material, signature.unwrap_or_default()) {
                    return Err(Status::InvalidParams);
                }
                debug_assert_eq!(write.size, write.data.len());
                self.issuer_data_ex = write.data;
                self.issuer_data_ex_counter = write.counter;
            }
            _ => return Err(Status::InvalidParams),
        }
        Ok(())
    }

    fn swap_pin(&mut self, tlvs: &TlvList) -> Result<(Vec<Tlv>, Status), Status> {
        let new_pin = tlvs.bytes(TlvTag::NewPin).ok_or(Status::InvalidParams)?;
        let new_pin2 = tlvs.bytes(TlvTag::NewPin2).ok_or(Status::InvalidParams)?;
        let pin_changed = new_pin != self.pin_hash;
        let pin2_changed = new_pin2 != self.pin2_hash;
        self.pin_hash.copy_from_slice(new_pin);
        self.pin2_hash.copy_from_slice(new_pin2);
        if pin_changed {
            self.session = SecureSession::plain();
        }
        let status = match (pin_changed, pin2_changed) {
            (false, false) => Status::ProcessCompleted,
            (true, false) => Status::Pin1Changed,
            (false, true) => Status::Pin2Changed,
            (true, true) => Status::PinsChanged,
        };
        Ok((vec![Tlv::new(TlvTag::CardId, self.card_id.to_vec())], status))
    }

    fn dispatch(
        &mut self,
        instruction: Instruction,
        tlvs: &TlvList,
    ) -> Result<(Vec<Tlv>, Status), Status> {
        let card_id = Tlv::new(TlvTag::CardId, self.card_id.to_vec());
        match instruction {
            Instruction::Read => completed(self.read_response()),
            Instruction::VerifyCard => {
                let key = self.card_key.clone();
                completed(self.challenge_response(&key, tlvs, TlvTag::CardSignature))
            }
            Instruction::CheckWallet => {
                let key = self.wallet_key.clone().ok_or(Status::InvalidState)?;
                completed(self.challenge_response(&key, tlvs, TlvTag::Signature))
            }
            Instruction::CreateWallet => {
                if self.status != CardStatus::Empty {
                    return Err(Status::InvalidState);
                }
                self.wallet_key = Some(key(5));
                self.status = CardStatus::Loaded;
                let wallet = self.wallet_public().ok_or(Status::InvalidState)?;
                completed(vec![
                    card_id,
                    Tlv::u8(TlvTag::Status, self.status.code()),
                    Tlv::new(TlvTag::WalletPublicKey, wallet.uncompressed.to_vec()),
                ])
            }
            Instruction::PurgeWallet => {
                if self.status != CardStatus::Loaded {
                    return Err(Status::InvalidState);
                }
                self.wallet_key = None;
                self.status = CardStatus::Empty;
                completed(vec![card_id, Tlv::u8(TlvTag::Status, self.status.code())])
            }
            Instruction::SwapPin => self.swap_pin(tlvs),
            Instruction::Sign => self.sign(tlvs).map(|tlvs| (tlvs, Status::ProcessCompleted)),
            Instruction::GetIssuerData => completed(self.get_issuer_data(tlvs)),
            Instruction::WriteIssuerData => {
                match tlvs.uint(TlvTag::Mode).ok().flatten() {
                    Some(mode) => self.write_issuer_data_ex(tlvs, mode)?,
                    None => {
                        let data = tlvs.bytes(TlvTag::IssuerData).ok_or(Status::InvalidParams)?;
                        let signature = tlvs.bytes(TlvTag::IssuerDataSignature).unwrap_or_default();
                        let counter =
                            tlvs.uint(TlvTag::IssuerDataCounter).ok().flatten().map(|c| c as u32);
                        self.store_issuer_data(data, signature, counter)?;
                    }
                }
                completed(vec![card_id])
            }
            Instruction::ValidateCard => {
                self.validation_counter += 1;
                let signature = crypto::sign(&self.card_key, &self.validation_counter.to_be_bytes())
                    .map_err(|_| Status::ErrorProcessingCommand)?;
                completed(vec![
                    card_id,
                    Tlv::u32(TlvTag::ValidationCounter, self.validation_counter),
                    Tlv::new(TlvTag::CardSignature, signature.to_vec()),
                ])
            }
            Instruction::VerifyCode => {
                let challenge = tlvs.bytes(TlvTag::Challenge).unwrap_or_default();
                completed(vec![
                    card_id,
                    Tlv::new(TlvTag::CodeHash, crypto::sha256(challenge).to_vec()),
                ])
            }
            Instruction::OpenSession => Err(Status::InsNotSupported),
        }
    }

    fn handle(&mut self, command: &[u8]) -> Bytes {
        let Ok(apdu) = CommandApdu::from_bytes(command) else {
            return response(&TlvList::new(), Status::ErrorProcessingCommand);
        };
        let Some(instruction) = Instruction::from_code(apdu.ins) else {
            return response(&TlvList::new(), Status::InsNotSupported);
        };
        self.log.push(apdu.ins);

        if instruction == Instruction::OpenSession {
            return self.open_session(&apdu);
        }

        let Some(mode) = EncryptionMode::from_code(apdu.p1) else {
            return response(&TlvList::new(), Status::InvalidParams);
        };
        if mode < self.required_mode {
            return response(&TlvList::new(), Status::NeedEncryption);
        }
        let session = match mode {
            EncryptionMode::None => SecureSession::plain(),
            _ if self.session.mode() == mode => self.session.clone(),
            _ => return response(&TlvList::new(), Status::NeedEncryption),
        };
        let Ok(payload) = session.unwrap(&apdu.data) else {
            return response(&TlvList::new(), Status::ErrorProcessingCommand);
        };
        let Ok(tlvs) = TlvList::decode(&payload) else {
            return response(&TlvList::new(), Status::ErrorProcessingCommand);
        };

        if tlvs.bytes(TlvTag::Pin) != Some(&self.pin_hash[..]) {
            return response(&TlvList::new(), Status::InvalidParams);
        }
        if Self::needs_pin2(instruction) {
            if tlvs.bytes(TlvTag::Pin2) != Some(&self.pin2_hash[..]) {
                return response(&TlvList::new(), Status::InvalidParams);
            }
            if self.paused < self.pause_rounds {
                self.paused += 1;
                let remaining = (self.pause_rounds - self.paused + 1) * 100;
                return response(
                    &vec![Tlv::u16(TlvTag::Pause, remaining as u16)].into(),
                    Status::NeedPause,
                );
            }
            self.paused = 0;
        }

        let (tlvs, status) = match self.dispatch(instruction, &tlvs) {
            Ok(result) => result,
            Err(status) => return response(&TlvList::new(), status),
        };
        let plain = TlvList::from(tlvs).encode().unwrap_or_default();
        // A PIN change drops the session only after this response
        let mut data = session.wrap(&plain).map(|b| b.to_vec()).unwrap_or_default();
        data.extend_from_slice(&status.code().to_be_bytes());
        Bytes::from(data)
    }
}

impl CardTransport for SimulatedCard {
    type Error = TransportError;

    fn do_exchange(&mut self, command: &[u8]) -> Result<Bytes, Self::Error> {
        Ok(self.handle(command))
    }

    fn token_id(&self) -> Option<Bytes> {
        Some(self.token_id.clone())
    }

    fn set_timeout(&mut self, _timeout: Duration) {}

    fn timeout(&self) -> Duration {
        Duration::from_secs(5)
    }

    fn is_connected(&self) -> bool {
        true
    }
}
