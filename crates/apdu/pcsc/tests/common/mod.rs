//! Common test utilities

use tangem_apdu_transport_pcsc::{ConnectStrategy, PcscConfig, PcscDeviceManager, PcscTransport};

/// Try to get a real device manager for tests
pub fn get_manager() -> Option<PcscDeviceManager> {
    PcscDeviceManager::new().ok()
}

/// Try to get a real transport with a card for tests
pub fn get_test_transport() -> Option<PcscTransport> {
    let manager = get_manager()?;
    manager
        .connect_strategy(ConnectStrategy::AnyCard, PcscConfig::default())
        .ok()
}
