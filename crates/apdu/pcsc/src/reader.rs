use std::fmt;

use pcsc::{ReaderState, State};

/// A PC/SC reader as seen at listing time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PcscReader {
    name: String,
    has_card: bool,
    atr: Option<Vec<u8>>,
}

impl PcscReader {
    /// Describe a reader
    pub const fn new(name: String, has_card: bool, atr: Option<Vec<u8>>) -> Self {
        Self {
            name,
            has_card,
            atr,
        }
    }

    /// Reader name as reported by the service
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether a card was in the field when the reader was listed
    pub const fn has_card(&self) -> bool {
        self.has_card
    }

    /// ATR of the card in the field
    pub fn atr(&self) -> Option<&[u8]> {
        self.atr.as_deref()
    }

    pub(crate) fn from_reader_state(state: &ReaderState) -> Self {
        let flags = state.event_state();
        let has_card = flags.contains(State::PRESENT) && !flags.contains(State::EMPTY);
        Self::new(
            state.name().to_string_lossy().into_owned(),
            has_card,
            has_card.then(|| state.atr().to_vec()),
        )
    }
}

impl fmt::Display for PcscReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.atr {
            Some(atr) => write!(f, "{} (card present, ATR {})", self.name, hex::encode_upper(atr)),
            None if self.has_card => write!(f, "{} (card present)", self.name),
            None => write!(f, "{} (no card)", self.name),
        }
    }
}
