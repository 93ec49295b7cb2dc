use std::cmp::Ordering;
use std::fmt;

/// Firmware version reported by the card, e.g. `1.19d`
///
/// Only the numeric `major.minor` part takes part in comparisons; the
/// trailing build type is kept for display.
#[derive(Debug, Clone, Eq)]
pub struct FirmwareVersion {
    /// Major version
    pub major: u32,
    /// Minor version
    pub minor: u32,
    raw: String,
}

impl FirmwareVersion {
    /// Version with no build suffix
    pub fn new(major: u32, minor: u32) -> Self {
        Self {
            major,
            minor,
            raw: format!("{major}.{minor}"),
        }
    }

    /// Parse a firmware string
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        let (major, rest) = trimmed.split_once('.')?;
        let minor_digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
        Some(Self {
            major: major.trim().parse().ok()?,
            minor: minor_digits.parse().ok()?,
            raw: trimmed.to_string(),
        })
    }

    /// The string as reported by the card
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl PartialEq for FirmwareVersion {
    fn eq(&self, other: &Self) -> bool {
        (self.major, self.minor) == (other.major, other.minor)
    }
}

impl PartialOrd for FirmwareVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FirmwareVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor).cmp(&(other.major, other.minor))
    }
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
