//! GATT transport port: scan, connect, discover, read and write a BLE
//! peripheral.
//!
//! The transport is stateless from the engine's point of view: every call
//! names the peripheral by [`CameraAddress`]. Connection bookkeeping (the
//! single live connection, stale characteristic detection) lives in
//! [`CameraLink`](crate::services::link::CameraLink).

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use shutterlink_domain::camera::CameraAddress;
use shutterlink_domain::error::ShutterLinkError;
use shutterlink_domain::protocol::WriteKind;

/// A peripheral seen by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeripheralInfo {
    pub address: CameraAddress,
    pub name: Option<String>,
}

/// Operations a characteristic supports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CharacteristicProperties {
    pub read: bool,
    pub write: bool,
    pub write_without_response: bool,
}

impl CharacteristicProperties {
    /// Whether any kind of write is accepted.
    #[must_use]
    pub fn supports_write(self) -> bool {
        self.write || self.write_without_response
    }
}

/// A characteristic as discovered on the current connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GattCharacteristic {
    pub uuid: uuid::Uuid,
    pub service_uuid: uuid::Uuid,
    pub properties: CharacteristicProperties,
}

/// A discovered service and its characteristics, in discovery order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GattService {
    pub uuid: uuid::Uuid,
    pub characteristics: Vec<GattCharacteristic>,
}

/// A connection-state notification from the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionStateChange {
    pub address: CameraAddress,
    pub connected: bool,
}

/// Errors raised by a [`GattTransport`].
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// No BLE adapter on the host.
    #[error("no BLE adapter available")]
    Unavailable,

    /// The transport does not know the peripheral.
    #[error("peripheral {0} not found")]
    PeripheralNotFound(CameraAddress),

    /// The characteristic is not present on the peripheral.
    #[error("characteristic {0} not found")]
    CharacteristicNotFound(uuid::Uuid),

    /// The underlying BLE stack failed.
    #[error("BLE operation failed")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl From<TransportError> for ShutterLinkError {
    fn from(err: TransportError) -> Self {
        Self::Transport(Box::new(err))
    }
}

/// BLE central capabilities the engine depends on.
pub trait GattTransport: Send + Sync {
    /// Peripherals the host already holds a connection to.
    fn connected_peripherals(
        &self,
    ) -> impl Future<Output = Result<Vec<PeripheralInfo>, TransportError>> + Send;

    /// Scan until a peripheral with `address` is seen or `window` elapses.
    ///
    /// The scan is stopped before returning, whether or not it matched.
    fn scan_for(
        &self,
        address: &CameraAddress,
        window: Duration,
    ) -> impl Future<Output = Result<Option<PeripheralInfo>, TransportError>> + Send;

    /// Stop any running scan. Idempotent.
    fn stop_scan(&self) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Whether the host holds a connection to `address`.
    fn is_connected(
        &self,
        address: &CameraAddress,
    ) -> impl Future<Output = Result<bool, TransportError>> + Send;

    /// Open a connection. The caller bounds it with a timeout.
    fn connect(
        &self,
        address: &CameraAddress,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Request disconnection. Returns once the request is issued.
    fn disconnect(
        &self,
        address: &CameraAddress,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Discover every service on a connected peripheral.
    fn discover_services(
        &self,
        address: &CameraAddress,
    ) -> impl Future<Output = Result<Vec<GattService>, TransportError>> + Send;

    /// Write `data` to a characteristic.
    fn write(
        &self,
        address: &CameraAddress,
        characteristic: &GattCharacteristic,
        data: &[u8],
        kind: WriteKind,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Read a characteristic value.
    fn read(
        &self,
        address: &CameraAddress,
        characteristic: &GattCharacteristic,
    ) -> impl Future<Output = Result<Vec<u8>, TransportError>> + Send;

    /// Subscribe to connection-state changes for every peripheral.
    fn connection_events(&self) -> broadcast::Receiver<ConnectionStateChange>;
}

impl<T: GattTransport> GattTransport for Arc<T> {
    fn connected_peripherals(
        &self,
    ) -> impl Future<Output = Result<Vec<PeripheralInfo>, TransportError>> + Send {
        (**self).connected_peripherals()
    }

    fn scan_for(
        &self,
        address: &CameraAddress,
        window: Duration,
    ) -> impl Future<Output = Result<Option<PeripheralInfo>, TransportError>> + Send {
        (**self).scan_for(address, window)
    }

    fn stop_scan(&self) -> impl Future<Output = Result<(), TransportError>> + Send {
        (**self).stop_scan()
    }

    fn is_connected(
        &self,
        address: &CameraAddress,
    ) -> impl Future<Output = Result<bool, TransportError>> + Send {
        (**self).is_connected(address)
    }

    fn connect(
        &self,
        address: &CameraAddress,
    ) -> impl Future<Output = Result<(), TransportError>> + Send {
        (**self).connect(address)
    }

    fn disconnect(
        &self,
        address: &CameraAddress,
    ) -> impl Future<Output = Result<(), TransportError>> + Send {
        (**self).disconnect(address)
    }

    fn discover_services(
        &self,
        address: &CameraAddress,
    ) -> impl Future<Output = Result<Vec<GattService>, TransportError>> + Send {
        (**self).discover_services(address)
    }

    fn write(
        &self,
        address: &CameraAddress,
        characteristic: &GattCharacteristic,
        data: &[u8],
        kind: WriteKind,
    ) -> impl Future<Output = Result<(), TransportError>> + Send {
        (**self).write(address, characteristic, data, kind)
    }

    fn read(
        &self,
        address: &CameraAddress,
        characteristic: &GattCharacteristic,
    ) -> impl Future<Output = Result<Vec<u8>, TransportError>> + Send {
        (**self).read(address, characteristic)
    }

    fn connection_events(&self) -> broadcast::Receiver<ConnectionStateChange> {
        (**self).connection_events()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_support_write_when_either_write_flag_set() {
        let ack = CharacteristicProperties {
            write: true,
            ..CharacteristicProperties::default()
        };
        let unack = CharacteristicProperties {
            write_without_response: true,
            ..CharacteristicProperties::default()
        };
        let read_only = CharacteristicProperties {
            read: true,
            ..CharacteristicProperties::default()
        };
        assert!(ack.supports_write());
        assert!(unack.supports_write());
        assert!(!read_only.supports_write());
    }

    #[test]
    fn should_box_transport_error_into_domain_error() {
        let err: ShutterLinkError = TransportError::Unavailable.into();
        assert!(matches!(err, ShutterLinkError::Transport(_)));
    }
}
