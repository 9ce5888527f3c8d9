//! Events the engine raises for the presentation layer.

use serde::{Deserialize, Serialize};

use crate::camera::CameraIdentity;
use crate::id::EventId;
use crate::time::{Timestamp, now};

/// What happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CameraEventKind {
    /// Auto-discovery reconnected and authenticated with the remembered
    /// camera; the UI can switch to its controls view.
    ControlsReady { camera: CameraIdentity },
}

/// An immutable record of something the engine did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraEvent {
    pub id: EventId,
    #[serde(flatten)]
    pub kind: CameraEventKind,
    pub timestamp: Timestamp,
}

impl CameraEvent {
    /// Stamp a new event with a fresh id and the current time.
    #[must_use]
    pub fn new(kind: CameraEventKind) -> Self {
        Self {
            id: EventId::new(),
            kind,
            timestamp: now(),
        }
    }

    /// Shorthand for [`CameraEventKind::ControlsReady`].
    #[must_use]
    pub fn controls_ready(camera: CameraIdentity) -> Self {
        Self::new(CameraEventKind::ControlsReady { camera })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::CameraAddress;

    #[test]
    fn should_serialize_with_type_tag() {
        let camera = CameraIdentity::new(
            CameraAddress::parse("AA:BB:CC:DD:EE:FF").unwrap(),
            Some("EOS R6"),
        );
        let event = CameraEvent::controls_ready(camera);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "controls_ready");
        assert_eq!(json["camera"]["address"], "AA:BB:CC:DD:EE:FF");
        assert_eq!(json["camera"]["display_name"], "EOS R6");
    }
}
