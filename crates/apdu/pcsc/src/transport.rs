//! PC/SC transport implementation

use std::{ffi::CString, fmt, time::Duration};

use bytes::Bytes;
use pcsc::{Card, Context, Disposition, ReaderState, State};
use tangem_apdu_core::CardTransport;
use tracing::{debug, warn};

use crate::{config::PcscConfig, error::PcscError};

/// GET DATA for the contactless UID, answered by the reader itself
const GET_UID: [u8; 5] = [0xFF, 0xCA, 0x00, 0x00, 0x00];

/// Largest frame that still fits the short length form
const MAX_SHORT_FRAME: usize = 4 + 1 + 255 + 1;

/// Transport implementation using PC/SC
pub struct PcscTransport {
    /// PC/SC context
    context: Context,
    /// Card connection, if established
    card: Option<Card>,
    /// Reader name
    reader_name: String,
    /// Configuration
    config: PcscConfig,
    /// UID of the connected token
    uid: Option<Bytes>,
    /// Current per-exchange timeout
    timeout: Duration,
}

impl fmt::Debug for PcscTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PcscTransport")
            .field("reader_name", &self.reader_name)
            .field("has_card", &self.card.is_some())
            .field("uid", &self.uid.as_ref().map(hex::encode))
            .field("config", &self.config)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl PcscTransport {
    /// Create a new PC/SC transport for the specified reader
    pub(crate) fn new(
        context: Context,
        reader_name: &str,
        config: PcscConfig,
    ) -> Result<Self, PcscError> {
        let timeout = config.timeout;
        let mut transport = Self {
            context,
            card: None,
            reader_name: reader_name.to_string(),
            config,
            uid: None,
            timeout,
        };

        // A missing card is not fatal here; the first exchange retries
        if let Err(e) = transport.connect_card() {
            debug!(reader = %transport.reader_name, error = %e, "No card on open");
        }

        Ok(transport)
    }

    fn reader_cstr(&self) -> Result<CString, PcscError> {
        CString::new(self.reader_name.clone())
            .map_err(|_| PcscError::ReaderNotFound(self.reader_name.clone()))
    }

    /// Try to connect to the card and read its UID
    fn connect_card(&mut self) -> Result<(), PcscError> {
        if self.card.is_some() {
            return Ok(());
        }

        let reader_cstr = self.reader_cstr()?;

        let card = match self.context.connect(
            &reader_cstr,
            self.config.share_mode.into(),
            self.config.protocols,
        ) {
            Ok(card) => card,
            Err(pcsc::Error::NoSmartcard) => {
                return Err(PcscError::NoCard(self.reader_name.clone()));
            }
            Err(e) => return Err(e.into()),
        };

        let mut buffer = [0u8; pcsc::MAX_BUFFER_SIZE];
        self.uid = match card.transmit(&GET_UID, &mut buffer) {
            Ok(response) if response.len() >= 2 && response[response.len() - 2..] == [0x90, 0x00] => {
                Some(Bytes::copy_from_slice(&response[..response.len() - 2]))
            }
            Ok(response) => {
                warn!(response = %hex::encode(response), "Reader did not report a UID");
                None
            }
            Err(e) => {
                warn!(error = %e, "Failed to read UID");
                None
            }
        };
        debug!(
            reader = %self.reader_name,
            uid = ?self.uid.as_ref().map(hex::encode),
            "Connected to card"
        );

        self.card = Some(card);
        Ok(())
    }

    /// Block until a card is presented or the wait timeout expires
    pub fn wait_for_card(&mut self) -> Result<(), PcscError> {
        if self.card.is_some() {
            return Ok(());
        }

        let reader_cstr = self.reader_cstr()?;
        let mut states = vec![ReaderState::new(reader_cstr.as_c_str(), State::UNAWARE)];
        self.context.get_status_change(Some(Duration::ZERO), &mut states)?;

        while !states[0].event_state().contains(State::PRESENT) {
            states[0].sync_current_state();
            match self
                .context
                .get_status_change(Some(self.config.wait_timeout), &mut states)
            {
                Ok(()) => {}
                Err(pcsc::Error::Timeout) => {
                    return Err(PcscError::Timeout(self.reader_name.clone()));
                }
                Err(e) => return Err(e.into()),
            }
        }

        self.connect_card()
    }

    /// Get the ATR of the current card
    pub fn atr(&self) -> Result<Vec<u8>, PcscError> {
        self.card.as_ref().map_or_else(
            || Err(PcscError::NoCard(self.reader_name.clone())),
            |card| {
                card.get_attribute_owned(pcsc::Attribute::AtrString)
                    .map_err(Into::into)
            },
        )
    }

    /// Get the reader name
    pub fn reader_name(&self) -> &str {
        &self.reader_name
    }

    /// Drop the current connection so the next exchange reconnects
    pub fn disconnect(&mut self) {
        self.uid = None;
        if let Some(card) = self.card.take()
            && let Err((_, e)) = card.disconnect(Disposition::ResetCard)
        {
            debug!(error = %e, "Disconnect failed");
        }
    }

    /// Transmit a command to the card
    fn transmit_command(&mut self, command: &[u8]) -> Result<Bytes, PcscError> {
        if !self.config.extended_length && command.len() > MAX_SHORT_FRAME {
            return Err(PcscError::ExtendedLength(command.len()));
        }

        // Connect if needed
        self.connect_card()?;

        let card = match &mut self.card {
            Some(card) => card,
            None => return Err(PcscError::NoCard(self.reader_name.clone())),
        };

        let mut response_buffer = vec![0u8; pcsc::MAX_BUFFER_SIZE_EXTENDED];

        match card.transmit(command, &mut response_buffer) {
            Ok(response) => Ok(Bytes::copy_from_slice(response)),
            Err(e) => {
                // If card was reset or removed, clear our reference
                if matches!(e, pcsc::Error::ResetCard | pcsc::Error::RemovedCard) {
                    self.card = None;
                    self.uid = None;

                    // Only a reset is worth a transparent reconnect
                    if self.config.auto_reconnect
                        && e == pcsc::Error::ResetCard
                        && self.connect_card().is_ok()
                    {
                        return self.transmit_command(command);
                    }
                    return Err(PcscError::CardRemoved);
                }

                if command.len() > MAX_SHORT_FRAME
                    && matches!(
                        e,
                        pcsc::Error::InsufficientBuffer | pcsc::Error::InvalidParameter
                    )
                {
                    return Err(PcscError::ExtendedLength(command.len()));
                }

                Err(e.into())
            }
        }
    }
}

impl CardTransport for PcscTransport {
    type Error = PcscError;

    fn do_exchange(&mut self, command: &[u8]) -> Result<Bytes, Self::Error> {
        self.transmit_command(command)
    }

    fn token_id(&self) -> Option<Bytes> {
        self.uid.clone()
    }

    fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn is_connected(&self) -> bool {
        self.card.is_some()
    }
}

impl Drop for PcscTransport {
    fn drop(&mut self) {
        if let Some(card) = self.card.take() {
            let _ = card.disconnect(Disposition::LeaveCard);
        }
    }
}
