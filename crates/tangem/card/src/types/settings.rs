use std::fmt;

/// A single bit of the card settings mask
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Setting {
    IsReusable = 0x0001,
    UseActivation = 0x0002,
    ForbidPurgeWallet = 0x0004,
    UseBlock = 0x0008,
    AllowSwapPin = 0x0010,
    AllowSwapPin2 = 0x0020,
    UseCvc = 0x0040,
    ForbidDefaultPin = 0x0080,
    UseOneCommandAtTime = 0x0100,
    UseNdef = 0x0200,
    UseDynamicNdef = 0x0400,
    SmartSecurityDelay = 0x0800,
    ProtectIssuerDataAgainstReplay = 0x4000,
    SkipSecurityDelayIfValidatedByLinkedTerminal = 0x08_0000,
}

impl Setting {
    const ALL: [Self; 14] = [
        Self::IsReusable,
        Self::UseActivation,
        Self::ForbidPurgeWallet,
        Self::UseBlock,
        Self::AllowSwapPin,
        Self::AllowSwapPin2,
        Self::UseCvc,
        Self::ForbidDefaultPin,
        Self::UseOneCommandAtTime,
        Self::UseNdef,
        Self::UseDynamicNdef,
        Self::SmartSecurityDelay,
        Self::ProtectIssuerDataAgainstReplay,
        Self::SkipSecurityDelayIfValidatedByLinkedTerminal,
    ];
}

/// Settings mask container
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SettingsMask(u32);

impl SettingsMask {
    /// Build a mask from individual settings
    pub fn new(settings: &[Setting]) -> Self {
        Self(settings.iter().fold(0, |mask, &s| mask | s as u32))
    }

    /// Raw mask value
    pub const fn bits(&self) -> u32 {
        self.0
    }

    /// Whether a setting is enabled
    pub const fn contains(&self, setting: Setting) -> bool {
        self.0 & setting as u32 != 0
    }
}

impl From<u32> for SettingsMask {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl fmt::Display for SettingsMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = Setting::ALL
            .iter()
            .filter(|s| self.contains(**s))
            .map(|s| format!("{s:?}"))
            .collect();
        write!(f, "{:#06x} [{}]", self.0, names.join(", "))
    }
}
