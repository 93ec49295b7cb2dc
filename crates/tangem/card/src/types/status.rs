use derive_more::Display;

/// Lifecycle status reported by the card
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CardStatus {
    /// Blank card, no issuer data
    #[display("not personalized")]
    NotPersonalized,
    /// Personalized, no wallet key yet
    #[display("empty")]
    Empty,
    /// Wallet key present
    #[display("loaded")]
    Loaded,
    /// Wallet key destroyed; the card cannot be reused
    #[display("purged")]
    Purged,
}

impl CardStatus {
    /// Raw status byte
    pub const fn code(self) -> u8 {
        match self {
            Self::NotPersonalized => 0,
            Self::Empty => 1,
            Self::Loaded => 2,
            Self::Purged => 3,
        }
    }
}

impl TryFrom<u64> for CardStatus {
    type Error = crate::Error;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::NotPersonalized),
            1 => Ok(Self::Empty),
            2 => Ok(Self::Loaded),
            3 => Ok(Self::Purged),
            _ => Err(Self::Error::InvalidData("unknown card status")),
        }
    }
}
