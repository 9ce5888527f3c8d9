//! Camera and local-device identities.
//!
//! A [`CameraIdentity`] is created on the first successful pairing and
//! overwritten by every later one. A [`LocalIdentity`] is the name this
//! device announces during the pairing handshake.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Opaque, vendor-assigned identifier of a BLE peripheral.
///
/// Usually a MAC address (`AA:BB:CC:DD:EE:FF`), but platforms that hide MAC
/// addresses hand out other stable strings. The value is trimmed and
/// upper-cased so comparisons are case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CameraAddress(String);

impl CameraAddress {
    /// Parse and normalise an address.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyAddress`] when the input is blank.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyAddress);
        }
        Ok(Self(trimmed.to_ascii_uppercase()))
    }

    /// Borrow the normalised string form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether `other` (in any case) designates this address.
    #[must_use]
    pub fn matches(&self, other: &str) -> bool {
        self.0.eq_ignore_ascii_case(other.trim())
    }
}

impl fmt::Display for CameraAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for CameraAddress {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for CameraAddress {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CameraAddress> for String {
    fn from(value: CameraAddress) -> Self {
        value.0
    }
}

/// The remembered camera.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraIdentity {
    pub address: CameraAddress,
    pub display_name: String,
}

impl CameraIdentity {
    /// Build an identity, falling back to the address when the peripheral
    /// did not advertise a name.
    #[must_use]
    pub fn new(address: CameraAddress, display_name: Option<&str>) -> Self {
        let display_name = display_name
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map_or_else(|| address.to_string(), str::to_owned);
        Self {
            address,
            display_name,
        }
    }
}

/// Name this device sends to the camera during the pairing handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalIdentity {
    pub device_name: String,
}

impl LocalIdentity {
    /// Create a local identity.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyName`] when the name is blank.
    pub fn new(device_name: impl Into<String>) -> Result<Self, ValidationError> {
        let device_name = device_name.into();
        if device_name.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }
        Ok(Self { device_name })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_normalise_address_to_upper_case() {
        let addr = CameraAddress::parse(" aa:bb:cc:dd:ee:ff ").unwrap();
        assert_eq!(addr.as_str(), "AA:BB:CC:DD:EE:FF");
    }

    #[test]
    fn should_reject_blank_address() {
        assert_eq!(
            CameraAddress::parse("   "),
            Err(ValidationError::EmptyAddress)
        );
    }

    #[test]
    fn should_match_address_case_insensitively() {
        let addr: CameraAddress = "DC:FE:23:4A:E0:36".parse().unwrap();
        assert!(addr.matches("dc:fe:23:4a:e0:36"));
        assert!(!addr.matches("DC:FE:23:4A:E0:37"));
    }

    #[test]
    fn should_serialize_address_as_plain_string() {
        let addr = CameraAddress::parse("aa:bb:cc:dd:ee:ff").unwrap();
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, "\"AA:BB:CC:DD:EE:FF\"");
        let back: CameraAddress = serde_json::from_str("\"aa:bb:cc:dd:ee:ff\"").unwrap();
        assert_eq!(back, addr);
    }

    #[test]
    fn should_reject_blank_address_when_deserializing() {
        let result: Result<CameraAddress, _> = serde_json::from_str("\"\"");
        assert!(result.is_err());
    }

    #[test]
    fn should_fall_back_to_address_when_name_missing() {
        let addr = CameraAddress::parse("AA:BB:CC:DD:EE:FF").unwrap();
        let identity = CameraIdentity::new(addr.clone(), Some("  "));
        assert_eq!(identity.display_name, "AA:BB:CC:DD:EE:FF");

        let named = CameraIdentity::new(addr, Some("EOS R6"));
        assert_eq!(named.display_name, "EOS R6");
    }

    #[test]
    fn should_reject_blank_local_name() {
        assert_eq!(LocalIdentity::new(""), Err(ValidationError::EmptyName));
        assert_eq!(LocalIdentity::new("Pixel").unwrap().device_name, "Pixel");
    }
}
