//! Characteristic resolver.
//!
//! Maps the services discovered on a connection to the two characteristics
//! the protocol writes to. Results are bound to the connection they were
//! discovered on and are never cached; callers rediscover after every
//! (re)connect.

use shutterlink_domain::protocol::{PAIRING_CHAR, SHUTTER_CHAR};

use crate::ports::{GattService, GattTransport};
use crate::services::link::{CameraLink, CharacteristicRef, ConnectionHandle, LinkError};

/// The pairing and shutter characteristics of one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacteristicSet {
    pub pairing: CharacteristicRef,
    pub shutter: CharacteristicRef,
    /// Whether the shutter characteristic was adopted by the write-capable
    /// fallback rather than matched by UUID.
    pub shutter_fallback: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("pairing characteristic not found")]
    PairingMissing,

    #[error("no shutter characteristic and no writable fallback")]
    ShutterMissing,

    #[error("service discovery failed")]
    Link(#[from] LinkError),
}

/// Pick the pairing and shutter characteristics out of `services`.
///
/// The shutter characteristic is matched by UUID first. Without a match,
/// the first write-capable characteristic of any service (other than the
/// pairing one) is adopted.
///
/// # Errors
///
/// [`ResolveError::PairingMissing`] or [`ResolveError::ShutterMissing`].
pub fn resolve(
    connection: &ConnectionHandle,
    services: &[GattService],
) -> Result<CharacteristicSet, ResolveError> {
    let all = || services.iter().flat_map(|service| &service.characteristics);

    let pairing = all()
        .find(|c| c.uuid == PAIRING_CHAR)
        .ok_or(ResolveError::PairingMissing)?;

    let (shutter, shutter_fallback) = match all().find(|c| c.uuid == SHUTTER_CHAR) {
        Some(exact) => (exact, false),
        None => {
            let fallback = all()
                .find(|c| c.uuid != PAIRING_CHAR && c.properties.supports_write())
                .ok_or(ResolveError::ShutterMissing)?;
            tracing::info!(uuid = %fallback.uuid, "adopting writable characteristic as shutter");
            (fallback, true)
        }
    };

    Ok(CharacteristicSet {
        pairing: CharacteristicRef::new(connection.clone(), pairing.clone()),
        shutter: CharacteristicRef::new(connection.clone(), shutter.clone()),
        shutter_fallback,
    })
}

/// Discover services on `connection` and resolve them.
///
/// # Errors
///
/// See [`resolve`]; discovery failures surface as [`ResolveError::Link`].
pub async fn discover<T: GattTransport>(
    link: &CameraLink<T>,
    connection: &ConnectionHandle,
) -> Result<CharacteristicSet, ResolveError> {
    let services = link.discover_services(connection).await?;
    tracing::debug!(services = services.len(), "services discovered");
    resolve(connection, &services)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::ports::{CharacteristicProperties, GattCharacteristic};
    use crate::testing::{FakeGatt, camera_address, camera_services};
    use shutterlink_domain::protocol::SERVICE_UUID;

    async fn handle() -> ConnectionHandle {
        let link = CameraLink::new(Arc::new(FakeGatt::with_camera()));
        link.connect(&camera_address(), Duration::from_secs(1))
            .await
            .unwrap()
    }

    fn characteristic(uuid: u128, write: bool) -> GattCharacteristic {
        GattCharacteristic {
            uuid: uuid::Uuid::from_u128(uuid),
            service_uuid: SERVICE_UUID,
            properties: CharacteristicProperties {
                read: !write,
                write,
                write_without_response: false,
            },
        }
    }

    fn service(characteristics: Vec<GattCharacteristic>) -> GattService {
        GattService {
            uuid: SERVICE_UUID,
            characteristics,
        }
    }

    #[tokio::test]
    async fn should_match_both_characteristics_by_uuid() {
        let handle = handle().await;
        let set = resolve(&handle, &camera_services()).unwrap();

        assert_eq!(set.pairing.uuid(), PAIRING_CHAR);
        assert_eq!(set.shutter.uuid(), SHUTTER_CHAR);
        assert!(!set.shutter_fallback);
        assert_eq!(set.shutter.connection(), &handle);
    }

    #[tokio::test]
    async fn should_fall_back_to_first_writable_characteristic() {
        let handle = handle().await;
        let services = vec![
            service(vec![characteristic(0x10, false), characteristic(0x11, true)]),
            service(vec![
                GattCharacteristic {
                    uuid: PAIRING_CHAR,
                    ..characteristic(0, true)
                },
                characteristic(0x12, true),
            ]),
        ];

        let set = resolve(&handle, &services).unwrap();

        assert!(set.shutter_fallback);
        assert_eq!(set.shutter.uuid(), uuid::Uuid::from_u128(0x11));
    }

    #[tokio::test]
    async fn should_not_adopt_pairing_characteristic_as_shutter() {
        let handle = handle().await;
        let services = vec![service(vec![
            GattCharacteristic {
                uuid: PAIRING_CHAR,
                ..characteristic(0, true)
            },
            characteristic(0x10, false),
        ])];

        let result = resolve(&handle, &services);

        assert!(matches!(result, Err(ResolveError::ShutterMissing)));
    }

    #[tokio::test]
    async fn should_fail_without_pairing_characteristic() {
        let handle = handle().await;
        let services = vec![service(vec![GattCharacteristic {
            uuid: SHUTTER_CHAR,
            ..characteristic(0, true)
        }])];

        let result = resolve(&handle, &services);

        assert!(matches!(result, Err(ResolveError::PairingMissing)));
    }

    #[tokio::test]
    async fn should_rediscover_on_every_call() {
        let gatt = Arc::new(FakeGatt::with_camera());
        let link = CameraLink::new(Arc::clone(&gatt));
        let handle = link
            .connect(&camera_address(), Duration::from_secs(1))
            .await
            .unwrap();

        discover(&link, &handle).await.unwrap();
        discover(&link, &handle).await.unwrap();

        assert_eq!(
            gatt.count(|c| matches!(c, crate::testing::Call::Discover(_))),
            2
        );
    }
}
