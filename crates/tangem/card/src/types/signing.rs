use std::fmt;

/// How the card agrees to sign
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigningMethod {
    /// Plain hashes
    SignHash = 0,
    /// Raw transaction, hashed by the card
    SignRaw = 1,
    /// Hashes co-signed by the issuer
    SignHashValidatedByIssuer = 2,
    /// Raw transaction co-signed by the issuer
    SignRawValidatedByIssuer = 3,
    /// Issuer co-signed hashes plus an issuer data update
    SignHashValidatedByIssuerAndWriteIssuerData = 4,
    /// Issuer co-signed raw transaction plus an issuer data update
    SignRawValidatedByIssuerAndWriteIssuerData = 5,
}

impl SigningMethod {
    const ALL: [Self; 6] = [
        Self::SignHash,
        Self::SignRaw,
        Self::SignHashValidatedByIssuer,
        Self::SignRawValidatedByIssuer,
        Self::SignHashValidatedByIssuerAndWriteIssuerData,
        Self::SignRawValidatedByIssuerAndWriteIssuerData,
    ];

    const fn bit(self) -> u8 {
        1 << self as u8
    }
}

/// Set of signing methods allowed by the card
///
/// The card reports either one method, or with bit 0x80 set, a bitmask over
/// methods 0 to 5.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SigningMethods(u8);

impl SigningMethods {
    /// Build a set from methods
    pub fn new(methods: &[SigningMethod]) -> Self {
        Self(methods.iter().fold(0, |set, m| set | m.bit()))
    }

    /// Decode the SigningMethod byte
    pub const fn from_code(code: u8) -> Self {
        if code & 0x80 != 0 {
            Self(code & 0x3F)
        } else if code < 6 {
            Self(1 << code)
        } else {
            Self(0)
        }
    }

    /// Encode as the SigningMethod byte
    pub const fn code(&self) -> u8 {
        if self.0.count_ones() == 1 {
            self.0.trailing_zeros() as u8
        } else {
            0x80 | self.0
        }
    }

    /// Whether `method` is allowed
    pub const fn contains(&self, method: SigningMethod) -> bool {
        self.0 & method.bit() != 0
    }

    /// Iterate the allowed methods
    pub fn iter(&self) -> impl Iterator<Item = SigningMethod> + '_ {
        SigningMethod::ALL.into_iter().filter(|m| self.contains(*m))
    }
}

impl fmt::Display for SigningMethods {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.iter().map(|m| format!("{m:?}")).collect();
        write!(f, "{}", names.join(", "))
    }
}
