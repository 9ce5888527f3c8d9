//! BLE transport configuration.

use serde::Deserialize;

/// Configuration for the btleplug transport.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BleConfig {
    /// Which host adapter to use, in the order the OS lists them.
    pub adapter_index: usize,
    /// Buffer size of the connection-state broadcast channel.
    pub event_capacity: usize,
}

impl Default for BleConfig {
    fn default() -> Self {
        Self {
            adapter_index: 0,
            event_capacity: 32,
        }
    }
}
