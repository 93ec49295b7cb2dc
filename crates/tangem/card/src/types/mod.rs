mod card_data;
mod card_state;
mod firmware;
mod issuer;
mod settings;
mod signing;
mod status;

pub use card_data::{CardData, ManufactureDate};
pub use card_state::CardState;
pub use firmware::FirmwareVersion;
pub use issuer::{IssuerData, IssuerDataRecords, PendingIssuerData};
pub use settings::{Setting, SettingsMask};
pub use signing::{SigningMethod, SigningMethods};
pub use status::CardStatus;
