//! The remote-shutter GATT protocol.
//!
//! | Characteristic | UUID | Write | Payload |
//! |----------------|------|-------|---------|
//! | Pairing | `00050002-0000-1000-0000-d8492fffa821` | with response | `0x03` + device name bytes |
//! | Shutter | `00050003-0000-1000-0000-d8492fffa821` | without response | one byte: `0x0C`, `0x8C`, `0x00` |
//! | Status | `00050004-0000-1000-0000-d8492fffa821` | - | indications, unused |
//!
//! A shot is a half-press (focus), a full press, then a release. The camera
//! needs a short settle between half and full press only.

use serde::{Deserialize, Serialize};

/// Primary service exposed by the camera.
pub const SERVICE_UUID: uuid::Uuid = uuid::Uuid::from_u128(0x0005_0000_0000_1000_0000_d849_2fff_a821);

/// Characteristic accepting the identity handshake.
pub const PAIRING_CHAR: uuid::Uuid = uuid::Uuid::from_u128(0x0005_0002_0000_1000_0000_d849_2fff_a821);

/// Characteristic accepting single-byte button states.
pub const SHUTTER_CHAR: uuid::Uuid = uuid::Uuid::from_u128(0x0005_0003_0000_1000_0000_d849_2fff_a821);

/// Characteristic that indicates camera status changes.
pub const STATUS_CHAR: uuid::Uuid = uuid::Uuid::from_u128(0x0005_0004_0000_1000_0000_d849_2fff_a821);

/// Opcode prefixed to the device name in the pairing write.
pub const PAIRING_OPCODE: u8 = 0x03;

/// Focus bit of the shutter byte.
pub const FOCUS_BIT: u8 = 0x0C;

/// Shutter-release bit of the shutter byte.
pub const SHUTTER_BIT: u8 = 0x80;

/// Standard Device Information characteristics read after pairing.
pub mod device_info {
    /// Manufacturer Name String (`0x2A29`).
    pub const MANUFACTURER: uuid::Uuid = uuid::Uuid::from_u128(0x0000_2a29_0000_1000_8000_0080_5f9b_34fb);
    /// Model Number String (`0x2A24`).
    pub const MODEL: uuid::Uuid = uuid::Uuid::from_u128(0x0000_2a24_0000_1000_8000_0080_5f9b_34fb);
    /// Serial Number String (`0x2A26`).
    pub const SERIAL: uuid::Uuid = uuid::Uuid::from_u128(0x0000_2a26_0000_1000_8000_0080_5f9b_34fb);
    /// Software Revision String (`0x2A28`).
    pub const SOFTWARE: uuid::Uuid = uuid::Uuid::from_u128(0x0000_2a28_0000_1000_8000_0080_5f9b_34fb);
}

/// GATT write semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteKind {
    /// Acknowledged write (ATT Write Request).
    WithResponse,
    /// Unacknowledged write (ATT Write Command).
    WithoutResponse,
}

/// One button state written to the shutter characteristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShutterCommand {
    /// Focus (half-press).
    HalfPress,
    /// Focus and shutter (full press).
    FullPress,
    /// All buttons released.
    Release,
}

impl ShutterCommand {
    /// The byte written for this command.
    #[must_use]
    pub const fn byte(self) -> u8 {
        match self {
            Self::HalfPress => FOCUS_BIT,
            Self::FullPress => SHUTTER_BIT | FOCUS_BIT,
            Self::Release => 0x00,
        }
    }

    /// Single-byte payload for a GATT write.
    #[must_use]
    pub const fn payload(self) -> [u8; 1] {
        [self.byte()]
    }
}

/// The full trigger sequence, in write order.
pub const SHUTTER_SEQUENCE: [ShutterCommand; 3] = [
    ShutterCommand::HalfPress,
    ShutterCommand::FullPress,
    ShutterCommand::Release,
];

/// Build the pairing handshake: [`PAIRING_OPCODE`] followed by the raw
/// UTF-8 bytes of `device_name`.
#[must_use]
pub fn pairing_payload(device_name: &str) -> Vec<u8> {
    let mut payload = Vec::with_capacity(1 + device_name.len());
    payload.push(PAIRING_OPCODE);
    payload.extend_from_slice(device_name.as_bytes());
    payload
}
