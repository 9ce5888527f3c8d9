//! Shutter session states and outcomes.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::id::SessionId;
use crate::relay::RelayStatus;

/// The step a shutter session is executing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Locate,
    Connect,
    Discover,
    Authenticate,
    Trigger,
    Teardown,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Locate => "locate",
            Self::Connect => "connect",
            Self::Discover => "discover",
            Self::Authenticate => "authenticate",
            Self::Trigger => "trigger",
            Self::Teardown => "teardown",
        })
    }
}

/// Why a session (or a lifecycle operation) did not succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(rename_all = "snake_case")]
pub enum SessionFailure {
    /// No remembered camera, or the camera was neither connected nor seen
    /// during the bounded scan.
    #[error("camera not found")]
    DeviceNotFound,

    /// The connect attempt timed out or the transport refused it.
    #[error("connection failed")]
    ConnectionFailed,

    /// The pairing or shutter characteristic is missing, or a write was
    /// attempted with characteristics from a closed connection.
    #[error("required characteristics not found")]
    CharacteristicsNotFound,

    /// The pairing handshake failed twice.
    #[error("authentication failed")]
    AuthenticationFailed,

    /// A write of the trigger sequence failed.
    #[error("shutter sequence failed")]
    ShutterSequenceFailed,

    /// Closing the connection failed. Never changes a session's outcome.
    #[error("disconnect failed")]
    DisconnectError,
}

impl SessionFailure {
    /// Short human-readable status for UI and relay surfaces.
    #[must_use]
    pub const fn status_text(self) -> &'static str {
        match self {
            Self::DeviceNotFound => "no camera",
            Self::ConnectionFailed => "connection failed",
            Self::CharacteristicsNotFound => "camera not supported",
            Self::AuthenticationFailed => "pairing failed",
            Self::ShutterSequenceFailed => "capture failed",
            Self::DisconnectError => "disconnect failed",
        }
    }
}

/// Result of one shutter session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionReport {
    pub session_id: SessionId,
    /// `None` when the trigger sequence was written completely.
    pub failure: Option<SessionFailure>,
    /// Whether Authenticate needed its single retry.
    pub retried_authentication: bool,
}

impl SessionReport {
    /// The public contract of a shutter attempt.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.failure.is_none()
    }

    /// Status text for UI surfaces.
    #[must_use]
    pub fn status_text(&self) -> &'static str {
        self.failure.map_or("photo taken", SessionFailure::status_text)
    }

    /// Status reported back to the companion device.
    #[must_use]
    pub fn relay_status(&self) -> RelayStatus {
        if self.succeeded() {
            RelayStatus::ShutterSuccess
        } else {
            RelayStatus::ShutterFailed
        }
    }
}
