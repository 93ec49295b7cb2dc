//! Card commands
//!
//! Each module adds its commands to [`Tangem`](crate::Tangem) as methods.

mod issuer_data;
pub use issuer_data::sign_issuer_data;
mod pin;
pub use pin::SwapPinOutcome;
mod read;
pub(crate) use read::pause_duration;
mod sign;
pub use sign::{SignOptions, SignResponse};
mod validate;
pub use validate::{CardValidation, VerifyCodeRequest};
mod verify;
mod wallet;
