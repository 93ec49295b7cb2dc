//! Protocol constants

use std::time::Duration;

/// PIN used when the card owner never set one
pub const DEFAULT_PIN: &str = "000000";

/// PIN2 used when the card owner never set one
pub const DEFAULT_PIN2: &str = "000";

/// PBKDF2 iterations used to derive the protocol key
pub const PBKDF2_ITERATIONS: u32 = 50;

/// Security delay assumed when a pause response carries no duration
pub const DEFAULT_PAUSE: Duration = Duration::from_secs(60);

/// Base per-exchange timeout before widening by the security delay
pub const DEFAULT_EXCHANGE_TIMEOUT: Duration = Duration::from_secs(5);

/// Pause and PauseBeforePin2 values are expressed in units of this
pub const PAUSE_UNIT: Duration = Duration::from_millis(10);

/// Length of every host challenge
pub const CHALLENGE_LEN: usize = 16;

/// Largest batch accepted by one Sign command
pub const MAX_HASHES: usize = 10;

/// Largest raw transaction accepted by SignRaw
pub const MAX_RAW_LEN: usize = 1024;

/// Chunk size used when writing extra issuer data
pub const ISSUER_DATA_EX_PART: usize = 1524;

/// Curve name reported by cards with secp256k1 wallet keys
pub const CURVE_SECP256K1: &str = "secp256k1";

/// Hash algorithm name sent with SignRaw and VerifyCode
pub const HASH_ALG_SHA256: &str = "sha-256";

/// Mode values for issuer data extra commands
pub mod issuer_data_mode {
    /// Start a write, or read a chunk
    pub const START_OR_READ: u8 = 0x01;
    /// Write one part
    pub const WRITE_PART: u8 = 0x02;
    /// Finalize a write
    pub const FINALIZE: u8 = 0x03;
}
