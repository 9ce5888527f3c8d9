//! Engine timing configuration.

use std::time::Duration;

use serde::Deserialize;

/// Timings for sessions, the stay-paired connection and auto-discovery.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Bounded scan used by a shutter session to locate the camera, in ms.
    pub session_scan_timeout_ms: u64,
    /// Connect timeout, in ms.
    pub connect_timeout_ms: u64,
    /// Wait after the pairing write before any further protocol action, in ms.
    pub handshake_settle_ms: u64,
    /// Wait between half-press and full-press, in ms.
    pub shutter_settle_ms: u64,
    /// Whether to probe the shutter characteristic after pairing.
    pub verify_pairing: bool,
    /// Passive monitor poll period, in ms.
    pub passive_poll_interval_ms: u64,
    /// How long passive monitoring runs before active scanning takes over, in ms.
    pub active_scan_grace_ms: u64,
    /// Length of one active scan attempt, in ms.
    pub active_scan_window_ms: u64,
    /// Delay before the next active scan after a miss or failed connect, in ms.
    pub active_scan_retry_ms: u64,
    /// Delay before auto-discovery resumes after a disconnect, in ms.
    pub reconnect_delay_ms: u64,
    /// Bound on waiting for a graceful disconnect to be confirmed, in ms.
    pub disconnect_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            session_scan_timeout_ms: 5_000,
            connect_timeout_ms: 10_000,
            handshake_settle_ms: 500,
            shutter_settle_ms: 300,
            verify_pairing: true,
            passive_poll_interval_ms: 2_000,
            active_scan_grace_ms: 6_000,
            active_scan_window_ms: 10_000,
            active_scan_retry_ms: 5_000,
            reconnect_delay_ms: 2_000,
            disconnect_timeout_ms: 3_000,
        }
    }
}

impl EngineConfig {
    #[must_use]
    pub fn session_scan_timeout(&self) -> Duration {
        Duration::from_millis(self.session_scan_timeout_ms)
    }

    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    #[must_use]
    pub fn handshake_settle(&self) -> Duration {
        Duration::from_millis(self.handshake_settle_ms)
    }

    #[must_use]
    pub fn shutter_settle(&self) -> Duration {
        Duration::from_millis(self.shutter_settle_ms)
    }

    #[must_use]
    pub fn passive_poll_interval(&self) -> Duration {
        Duration::from_millis(self.passive_poll_interval_ms)
    }

    #[must_use]
    pub fn active_scan_grace(&self) -> Duration {
        Duration::from_millis(self.active_scan_grace_ms)
    }

    #[must_use]
    pub fn active_scan_window(&self) -> Duration {
        Duration::from_millis(self.active_scan_window_ms)
    }

    #[must_use]
    pub fn active_scan_retry(&self) -> Duration {
        Duration::from_millis(self.active_scan_retry_ms)
    }

    #[must_use]
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    #[must_use]
    pub fn disconnect_timeout(&self) -> Duration {
        Duration::from_millis(self.disconnect_timeout_ms)
    }
}
