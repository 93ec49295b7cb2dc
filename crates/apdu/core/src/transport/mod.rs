//! Transport traits for exchanging frames with a Tangem card
//!
//! A transport owns the exclusive byte-level channel to one physically present
//! token. It has no knowledge of TLVs, sessions or status words.

pub mod error;

use std::fmt;
use std::time::Duration;

use bytes::Bytes;
pub use error::TransportError;
use tracing::{debug, trace};

/// Trait for basic card transports
///
/// Exactly one exchange is in flight at a time; `&mut self` enforces that.
pub trait CardTransport: Send + fmt::Debug {
    /// Error type returned by the transport
    type Error: Into<TransportError> + fmt::Debug;

    /// Send a raw command frame and return the raw response frame
    ///
    /// Blocks until the token answers, the timeout expires or the tag is lost.
    fn exchange(&mut self, command: &[u8]) -> Result<Bytes, Self::Error> {
        trace!(command = %hex::encode(command), "Transmitting raw command");
        let result = self.do_exchange(command);
        match &result {
            Ok(response) => {
                trace!(response = %hex::encode(response), "Received raw response");
            }
            Err(e) => {
                debug!(error = ?e, "Transport error during exchange");
            }
        }
        result
    }

    /// Internal implementation of exchange
    /// This is the method that concrete implementations should override
    fn do_exchange(&mut self, command: &[u8]) -> Result<Bytes, Self::Error>;

    /// Physical token identifier (NFC UID) of the connected token
    fn token_id(&self) -> Option<Bytes>;

    /// Set the per-exchange timeout
    fn set_timeout(&mut self, timeout: Duration);

    /// Current per-exchange timeout
    fn timeout(&self) -> Duration;

    /// Check if the transport is connected to a physical card
    fn is_connected(&self) -> bool;
}

impl<T: CardTransport + ?Sized> CardTransport for Box<T> {
    type Error = T::Error;

    fn exchange(&mut self, command: &[u8]) -> Result<Bytes, Self::Error> {
        (**self).exchange(command)
    }

    fn do_exchange(&mut self, command: &[u8]) -> Result<Bytes, Self::Error> {
        (**self).do_exchange(command)
    }

    fn token_id(&self) -> Option<Bytes> {
        (**self).token_id()
    }

    fn set_timeout(&mut self, timeout: Duration) {
        (**self).set_timeout(timeout);
    }

    fn timeout(&self) -> Duration {
        (**self).timeout()
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }
}

#[cfg(test)]
#[derive(Debug, Clone)]
#[allow(missing_docs)]
pub(crate) struct MockTransport {
    /// Mock responses to return
    pub(crate) responses: Vec<Bytes>,
    /// Commands that were sent
    pub(crate) commands: Vec<Bytes>,
    /// Whether the transport is connected
    pub(crate) connected: bool,
    pub(crate) timeout: Duration,
}

#[cfg(test)]
impl MockTransport {
    /// Create a new mock transport with the given responses
    pub(crate) const fn new(responses: Vec<Bytes>) -> Self {
        Self {
            responses,
            commands: Vec::new(),
            connected: true,
            timeout: Duration::from_secs(1),
        }
    }
}

#[cfg(test)]
impl CardTransport for MockTransport {
    type Error = TransportError;

    fn do_exchange(&mut self, command: &[u8]) -> Result<Bytes, Self::Error> {
        if !self.connected {
            return Err(TransportError::TagLost);
        }

        self.commands.push(Bytes::copy_from_slice(command));

        if self.responses.is_empty() {
            return Err(TransportError::io("no scripted response"));
        }
        Ok(self.responses.remove(0))
    }

    fn token_id(&self) -> Option<Bytes> {
        Some(Bytes::from_static(&[0x04, 0x11, 0x22, 0x33]))
    }

    fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}
