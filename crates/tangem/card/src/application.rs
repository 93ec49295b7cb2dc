//! Tangem card engine
//!
//! [`Tangem`] owns the transport, the negotiated session and the card state.
//! Every command runs through [`Tangem::transceive`], which wraps the payload
//! for the current encryption mode, sends it and keeps resending while the
//! card reports a security delay.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tangem_apdu_core::prelude::*;
use tracing::{debug, info, trace, warn};
use zeroize::Zeroizing;

use crate::commands::pause_duration;
use crate::config::SessionConfig;
use crate::constants::{DEFAULT_PIN, DEFAULT_PIN2};
use crate::crypto::{self, CryptoProvider};
use crate::delay::{CancelHandle, DelayObserver, NoopObserver, RetryContext};
use crate::external::{CoinEngine, IssuerDirectory, SubstitutionStore};
use crate::session::{EncryptionMode, SecureSession, SessionKey};
use crate::types::{CardState, PendingIssuerData};
use crate::{Error, Result};

/// Final outcome of one command's exchange loop
#[derive(Debug, Clone)]
pub(crate) enum Exchange {
    /// The card answered with something other than a pause
    Completed(ResponseFrame),
    /// The card asked for a pause and the caller chose not to wait
    NeedPause {
        /// Remaining delay
        remaining: Duration,
    },
}

/// Tangem card engine
pub struct Tangem<T: CardTransport> {
    pub(crate) transport: T,
    pub(crate) crypto: CryptoProvider,
    pub(crate) config: SessionConfig,
    pub(crate) session: SecureSession,
    /// Mode the next command is sent with
    pub(crate) encryption: EncryptionMode,
    pub(crate) state: CardState,
    pub(crate) pin: Zeroizing<String>,
    pub(crate) pin2: Zeroizing<String>,
    protocol_key: Option<Zeroizing<[u8; 32]>>,
    pub(crate) coin_engine: Option<Box<dyn CoinEngine>>,
    pub(crate) issuers: Option<Box<dyn IssuerDirectory>>,
    pub(crate) substitutions: Option<Box<dyn SubstitutionStore>>,
    pub(crate) observer: Arc<dyn DelayObserver>,
    pub(crate) cancel: CancelHandle,
    pub(crate) pending_issuer_data: Option<PendingIssuerData>,
}

impl<T: CardTransport> std::fmt::Debug for Tangem<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tangem")
            .field("transport", &self.transport)
            .field("encryption", &self.encryption)
            .field("card_id", &self.state.card_id)
            .finish_non_exhaustive()
    }
}

impl<T: CardTransport> Tangem<T> {
    /// Create an engine with the default configuration
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, SessionConfig::default())
    }

    /// Create an engine with a custom configuration
    pub fn with_config(transport: T, config: SessionConfig) -> Self {
        let state = CardState::for_token(transport.token_id());
        Self {
            transport,
            crypto: CryptoProvider::new(),
            encryption: config.initial_encryption,
            config,
            session: SecureSession::plain(),
            state,
            pin: Zeroizing::new(DEFAULT_PIN.to_string()),
            pin2: Zeroizing::new(DEFAULT_PIN2.to_string()),
            protocol_key: None,
            coin_engine: None,
            issuers: None,
            substitutions: None,
            observer: Arc::new(NoopObserver),
            cancel: CancelHandle::new(),
            pending_issuer_data: None,
        }
    }

    /// Use an explicit crypto provider
    pub fn with_crypto(mut self, crypto: CryptoProvider) -> Self {
        self.crypto = crypto;
        self
    }

    /// Derive wallet addresses with this engine
    pub fn with_coin_engine(mut self, engine: impl CoinEngine + 'static) -> Self {
        self.coin_engine = Some(Box::new(engine));
        self
    }

    /// Resolve issuer keys missing from the card
    pub fn with_issuer_directory(mut self, directory: impl IssuerDirectory + 'static) -> Self {
        self.issuers = Some(Box::new(directory));
        self
    }

    /// Patch card metadata per batch
    pub fn with_substitutions(mut self, store: impl SubstitutionStore + 'static) -> Self {
        self.substitutions = Some(Box::new(store));
        self
    }

    /// Receive exchange and security delay notifications
    pub fn with_observer(mut self, observer: Arc<dyn DelayObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Handle that cancels the running operation from another thread
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Card state gathered so far
    pub const fn state(&self) -> &CardState {
        &self.state
    }

    /// Encryption mode used for the next command
    pub const fn encryption_mode(&self) -> EncryptionMode {
        self.encryption
    }

    /// Underlying transport
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Underlying transport, mutably
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Consume the engine and return the transport
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Set PIN1
    ///
    /// A different PIN changes the protocol key, so the session is dropped.
    pub fn set_pin(&mut self, pin: &str) {
        if self.pin.as_str() != pin {
            self.pin = Zeroizing::new(pin.to_string());
            self.reset_protocol_key();
        }
    }

    /// Set PIN2
    pub fn set_pin2(&mut self, pin2: &str) {
        self.pin2 = Zeroizing::new(pin2.to_string());
    }

    /// Signed issuer data to write on the next Read
    pub fn schedule_issuer_data_write(&mut self, pending: PendingIssuerData) {
        self.pending_issuer_data = Some(pending);
    }

    /// Issuer data waiting for the next Read
    pub const fn pending_issuer_data(&self) -> Option<&PendingIssuerData> {
        self.pending_issuer_data.as_ref()
    }

    fn reset_protocol_key(&mut self) {
        self.protocol_key = None;
        self.session.invalidate();
    }

    /// Start over when a different token is presented
    pub(crate) fn sync_token(&mut self) {
        let token_id = self.transport.token_id();
        if token_id != self.state.token_id {
            debug!(
                token_id = ?token_id.as_ref().map(hex::encode),
                "New token presented, discarding card state"
            );
            self.state = CardState::for_token(token_id);
            self.encryption = self.config.initial_encryption;
            self.reset_protocol_key();
        }
    }

    /// Card id bytes from the last Read
    pub(crate) fn card_id(&self) -> Result<Bytes> {
        self.state.card_id_bytes.clone().ok_or(Error::ReadRequired)
    }

    fn protocol_key(&mut self) -> Result<Zeroizing<[u8; 32]>> {
        if let Some(key) = &self.protocol_key {
            return Ok(key.clone());
        }
        let token_id = self.transport.token_id().ok_or(Error::NoTokenId)?;
        let key = crypto::protocol_key(&self.pin, &token_id);
        self.protocol_key = Some(key.clone());
        Ok(key)
    }

    /// Open a session for `mode` unless one is already established
    pub(crate) fn ensure_session(&mut self, mode: EncryptionMode) -> Result<()> {
        if self.session.is_ready_for(mode) {
            return Ok(());
        }
        match mode {
            EncryptionMode::None => {
                self.session = SecureSession::plain();
                Ok(())
            }
            EncryptionMode::Fast | EncryptionMode::Strong => self.open_session(mode),
        }
    }

    fn open_session(&mut self, mode: EncryptionMode) -> Result<()> {
        self.session.invalidate();
        debug!(%mode, "Opening session");

        let (session_key_a, ephemeral) = match mode {
            EncryptionMode::Strong => {
                let secret = self.crypto.ephemeral_key();
                let point = crypto::WalletKey::from(&secret.public_key()).uncompressed;
                (point.to_vec(), Some(secret))
            }
            _ => (self.crypto.challenge().to_vec(), None),
        };

        let frame = CommandFrame::new(Instruction::OpenSession)
            .with_p2(mode.code())
            .with_tlv(Tlv::new(TlvTag::SessionKeyA, session_key_a.clone()));

        let raw = self.send_raw(&frame.to_bytes()?)?;
        let response = ResponseFrame::parse(&raw);
        if let Some(error) = response.parse_error() {
            return Err(Error::ResponseParse(error.to_string()));
        }
        if response.status() != Status::ProcessCompleted {
            warn!(status = %response.status_word(), "Card refused to open a session");
            return Err(Error::Status(response.status_word()));
        }
        let session_key_b = response.tlvs().require(TlvTag::SessionKeyB)?;

        let protocol_key = self.protocol_key()?;
        let key = match ephemeral {
            Some(secret) => {
                let theirs = k256::PublicKey::from_sec1_bytes(session_key_b)?;
                SessionKey::strong(&protocol_key, &secret, &theirs)
            }
            None => {
                let mut host = [0u8; 16];
                host.copy_from_slice(&session_key_a);
                SessionKey::fast(&protocol_key, &host, session_key_b)
            }
        };
        self.session = SecureSession::established(mode, key);
        debug!(%mode, "Session established");
        Ok(())
    }

    fn send_raw(&mut self, command: &[u8]) -> Result<Bytes> {
        self.transport
            .exchange(command)
            .map_err(|e| Error::Transport(e.into()))
    }

    /// Start a command frame with the records every command carries
    ///
    /// Read identifies the terminal, everything else names the card.
    pub(crate) fn command(&self, instruction: Instruction) -> Result<CommandFrame> {
        let mut frame = CommandFrame::new(instruction)
            .with_tlv(Tlv::new(TlvTag::Pin, crypto::pin_hash(&self.pin).to_vec()));
        if instruction == Instruction::Read {
            if let Some(terminal) = self.config.terminal_public_key() {
                frame.push(Tlv::new(TlvTag::TerminalPublicKey, terminal));
            }
        } else {
            frame.push(Tlv::new(TlvTag::CardId, self.card_id()?));
        }
        Ok(frame)
    }

    /// Send a command, resending while the card runs a security delay
    pub(crate) fn transceive(
        &mut self,
        frame: CommandFrame,
        break_on_pause: bool,
    ) -> Result<Exchange> {
        let mode = self.encryption;
        self.ensure_session(mode)?;

        let frame = frame.with_p1(mode.code());
        let payload = frame.payload()?;
        let apdu = frame.to_apdu(self.session.wrap(&payload)?).to_bytes()?;

        debug!(
            instruction = %frame.instruction(),
            %mode,
            records = frame.tlvs().len(),
            "Sending command"
        );

        let mut retry = RetryContext::new(break_on_pause);
        let result = self.exchange_loop(&apdu, mode, &mut retry);
        self.observer.on_wait_finished();

        if retry.rounds > 0 {
            debug!(
                rounds = retry.rounds,
                waited = ?retry.waited,
                "Security delay finished"
            );
        }
        result
    }

    fn exchange_loop(
        &mut self,
        apdu: &[u8],
        mode: EncryptionMode,
        retry: &mut RetryContext,
    ) -> Result<Exchange> {
        loop {
            self.cancel.check()?;

            let timeout =
                self.config.base_timeout + self.state.security_delay.max(retry.pause);
            self.transport.set_timeout(timeout);

            self.observer.on_before_request(timeout);
            let raw = self.send_raw(apdu);
            self.observer.on_after_request();
            let raw = raw?;

            // The response to a cancelled command is discarded
            self.cancel.check()?;

            let response = self.open_response(&raw, mode)?;
            if response.status() != Status::NeedPause {
                return Ok(Exchange::Completed(response));
            }

            let remaining = response
                .tlvs()
                .uint(TlvTag::Pause)?
                .map_or(self.config.default_pause, pause_duration);
            retry.record(remaining);
            trace!(?remaining, round = retry.rounds, "Card requested a pause");

            if retry.break_on_pause {
                return Ok(Exchange::NeedPause { remaining });
            }
            self.observer.on_security_delay(remaining);
        }
    }

    /// Parse a response, decrypting the payload unless it is a pause
    fn open_response(&self, raw: &[u8], mode: EncryptionMode) -> Result<ResponseFrame> {
        let response = match ResponseFrame::split(raw) {
            Some((payload, status))
                if mode != EncryptionMode::None && status.status() != Status::NeedPause =>
            {
                ResponseFrame::from_parts(status, &self.session.unwrap(payload)?)
            }
            _ => ResponseFrame::parse(raw),
        };
        match response.parse_error() {
            Some(error) => Err(Error::ResponseParse(error.to_string())),
            None => Ok(response),
        }
    }

    /// Send a command and require a completed status
    pub(crate) fn run(&mut self, frame: CommandFrame, break_on_pause: bool) -> Result<ResponseFrame> {
        let instruction = frame.instruction();
        match self.transceive(frame, break_on_pause)? {
            Exchange::NeedPause { remaining } => Err(Error::NeedPause { remaining }),
            Exchange::Completed(response) => {
                let response = check_status(response)?;
                trace!(%instruction, status = %response.status_word(), "Command completed");
                Ok(response)
            }
        }
    }

    /// Send Read, escalating the encryption mode while the card asks for it
    pub(crate) fn probe_read(&mut self) -> Result<ResponseFrame> {
        loop {
            let frame = self.command(Instruction::Read)?;
            match self.transceive(frame, false)? {
                Exchange::Completed(response) if response.status() == Status::NeedEncryption => {
                    let next = self
                        .encryption
                        .escalate()
                        .filter(|mode| *mode <= self.config.max_encryption)
                        .ok_or(Error::UnsupportedEncryption)?;
                    info!(from = %self.encryption, to = %next, "Card requires stronger encryption");
                    self.encryption = next;
                }
                Exchange::Completed(response) => return check_status(response),
                Exchange::NeedPause { remaining } => return Err(Error::NeedPause { remaining }),
            }
        }
    }

    /// Record the PIN2 outcome when the default PIN2 was used
    pub(crate) fn track_default_pin2<R>(&mut self, result: &Result<R>) {
        if self.pin2.as_str() != DEFAULT_PIN2 {
            return;
        }
        match result {
            Ok(_) => self.state.use_default_pin2 = Some(true),
            Err(Error::InvalidPin) => self.state.use_default_pin2 = Some(false),
            Err(_) => {}
        }
    }
}

/// Map a final status word to success or an error
pub(crate) fn check_status(response: ResponseFrame) -> Result<ResponseFrame> {
    match response.status() {
        status if status.is_completed() => Ok(response),
        Status::InvalidParams => Err(Error::InvalidPin),
        Status::NeedEncryption => Err(Error::NeedEncryption),
        _ => Err(Error::Status(response.status_word())),
    }
}
