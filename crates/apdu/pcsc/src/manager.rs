//! Reader discovery and connection

use std::ffi::CString;
use std::time::Duration;

use pcsc::{Context, ReaderState, Scope, State};
use tracing::debug;

use crate::config::{ConnectStrategy, PcscConfig};
use crate::error::PcscError;
use crate::reader::PcscReader;
use crate::transport::PcscTransport;

/// Entry point to the system smart-card service
#[allow(missing_debug_implementations)]
pub struct PcscDeviceManager {
    context: Context,
}

impl PcscDeviceManager {
    /// Establish a user-scope PC/SC context
    pub fn new() -> Result<Self, PcscError> {
        Ok(Self {
            context: Context::establish(Scope::User)?,
        })
    }

    /// Snapshot of every reader and whether a card sits on it
    pub fn list_readers(&self) -> Result<Vec<PcscReader>, PcscError> {
        let names = self.context.list_readers_owned()?;
        if names.is_empty() {
            return Err(PcscError::NoReadersAvailable);
        }

        let mut states: Vec<ReaderState> = names
            .iter()
            .map(|name| ReaderState::new(name.clone(), State::UNAWARE))
            .collect();

        // A zero timeout reports the current state without waiting
        match self
            .context
            .get_status_change(Some(Duration::ZERO), &mut states)
        {
            Ok(()) => Ok(states.iter().map(PcscReader::from_reader_state).collect()),
            Err(e) => {
                debug!(error = %e, "Reader status unavailable, assuming no cards");
                Ok(names.iter().map(Self::without_card).collect())
            }
        }
    }

    fn without_card(name: &CString) -> PcscReader {
        PcscReader::new(name.to_string_lossy().into_owned(), false, None)
    }

    /// Open a reader with the default configuration
    pub fn open_reader(&self, reader_name: &str) -> Result<PcscTransport, PcscError> {
        self.open_reader_with_config(reader_name, PcscConfig::default())
    }

    /// Open a reader; a missing card is reported on the first exchange
    pub fn open_reader_with_config(
        &self,
        reader_name: &str,
        config: PcscConfig,
    ) -> Result<PcscTransport, PcscError> {
        PcscTransport::new(self.context.clone(), reader_name, config)
    }

    /// Open the reader the strategy selects
    pub fn connect_strategy(
        &self,
        strategy: ConnectStrategy,
        config: PcscConfig,
    ) -> Result<PcscTransport, PcscError> {
        let name = match strategy {
            ConnectStrategy::Reader(name) => name,
            ConnectStrategy::AnyCard => self
                .list_readers()?
                .into_iter()
                .find(PcscReader::has_card)
                .map(|reader| reader.name().to_string())
                .ok_or_else(|| PcscError::NoCard("any reader".to_string()))?,
            ConnectStrategy::FirstAvailable => self
                .list_readers()?
                .into_iter()
                .next()
                .map(|reader| reader.name().to_string())
                .ok_or(PcscError::NoReadersAvailable)?,
        };
        debug!(reader = %name, "Opening reader");
        self.open_reader_with_config(&name, config)
    }
}
