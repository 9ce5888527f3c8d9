//! Discovery mode: which reconnection mechanism currently owns the camera.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Exactly one mode is in effect at a time.
///
/// Passive monitoring, active scanning and a live connection are mutually
/// exclusive; switching mode cancels whatever the previous mode scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryMode {
    /// Nothing scheduled.
    #[default]
    Idle,
    /// Polling the already-connected list for a camera-initiated reconnect.
    PassiveMonitoring,
    /// Scanning for the remembered camera.
    ActiveScanning,
    /// A stay-paired connection is live.
    Connected,
}

impl DiscoveryMode {
    /// Whether background discovery work is scheduled.
    #[must_use]
    pub fn is_searching(self) -> bool {
        matches!(self, Self::PassiveMonitoring | Self::ActiveScanning)
    }
}

impl fmt::Display for DiscoveryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::PassiveMonitoring => "passive_monitoring",
            Self::ActiveScanning => "active_scanning",
            Self::Connected => "connected",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_default_to_idle() {
        assert_eq!(DiscoveryMode::default(), DiscoveryMode::Idle);
    }

    #[test]
    fn should_report_searching_only_for_passive_and_active() {
        assert!(!DiscoveryMode::Idle.is_searching());
        assert!(DiscoveryMode::PassiveMonitoring.is_searching());
        assert!(DiscoveryMode::ActiveScanning.is_searching());
        assert!(!DiscoveryMode::Connected.is_searching());
    }

    #[test]
    fn should_serialize_as_snake_case() {
        let json = serde_json::to_string(&DiscoveryMode::PassiveMonitoring).unwrap();
        assert_eq!(json, "\"passive_monitoring\"");
    }
}
