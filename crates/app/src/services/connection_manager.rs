//! Connection lifecycle manager: the "stay paired" connection.
//!
//! Unlike a [`ShutterSession`](super::shutter_session::ShutterSession), the
//! connection established here is kept open after the handshake. Loss of the
//! connection is observed by [`CameraLink`]; the owning controller then calls
//! [`ConnectionManager::clear`] and restarts auto-discovery.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;

use shutterlink_domain::camera::{CameraAddress, CameraIdentity};
use shutterlink_domain::protocol::device_info;
use shutterlink_domain::session::SessionFailure;

use crate::config::EngineConfig;
use crate::ports::{GattService, GattTransport, PeripheralInfo, PreferenceStore};
use crate::services::handshake::Handshake;
use crate::services::identity_service::IdentityService;
use crate::services::link::{CameraLink, CharacteristicRef, ConnectionHandle};
use crate::services::resolver::{self, CharacteristicSet};

/// Standard Device Information strings, read best-effort after pairing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub serial: Option<String>,
    pub software: Option<String>,
}

/// State of an established, authenticated connection.
#[derive(Debug, Clone)]
pub struct PairedConnection {
    pub camera: CameraIdentity,
    pub handle: ConnectionHandle,
    pub characteristics: CharacteristicSet,
    pub device_info: DeviceInfo,
}

/// Establishes and tears down the long-lived connection.
pub struct ConnectionManager<T, S> {
    link: Arc<CameraLink<T>>,
    identity: Arc<IdentityService<S>>,
    handshake: Handshake,
    config: EngineConfig,
    paired: Mutex<Option<PairedConnection>>,
}

impl<T: GattTransport, S: PreferenceStore> ConnectionManager<T, S> {
    pub fn new(
        link: Arc<CameraLink<T>>,
        identity: Arc<IdentityService<S>>,
        config: EngineConfig,
    ) -> Self {
        Self {
            link,
            identity,
            handshake: Handshake::from_config(&config),
            config,
            paired: Mutex::new(None),
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<PairedConnection>> {
        self.paired.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Connect to `camera`, resolve its characteristics and run the
    /// handshake once. The connection is released again if any step after
    /// connect fails.
    ///
    /// # Errors
    ///
    /// [`SessionFailure::ConnectionFailed`],
    /// [`SessionFailure::CharacteristicsNotFound`] or
    /// [`SessionFailure::AuthenticationFailed`].
    #[tracing::instrument(skip(self), fields(address = %camera.address))]
    pub async fn establish(&self, camera: &CameraIdentity) -> Result<(), SessionFailure> {
        let handle = self
            .link
            .connect(&camera.address, self.config.connect_timeout())
            .await
            .map_err(|err| {
                tracing::warn!(%err, "connect failed");
                SessionFailure::ConnectionFailed
            })?;

        match self.authenticate(&handle).await {
            Ok((characteristics, device_info)) => {
                tracing::info!(model = ?device_info.model, "camera paired and ready");
                *self.slot() = Some(PairedConnection {
                    camera: camera.clone(),
                    handle,
                    characteristics,
                    device_info,
                });
                Ok(())
            }
            Err(failure) => {
                tracing::warn!(%failure, "could not establish connection");
                if let Err(err) = self.link.disconnect(&camera.address).await {
                    tracing::warn!(%err, "release after failed establish failed");
                }
                Err(failure)
            }
        }
    }

    async fn authenticate(
        &self,
        handle: &ConnectionHandle,
    ) -> Result<(CharacteristicSet, DeviceInfo), SessionFailure> {
        let services = self.link.discover_services(handle).await.map_err(|err| {
            tracing::warn!(%err, "service discovery failed");
            SessionFailure::CharacteristicsNotFound
        })?;
        let characteristics = resolver::resolve(handle, &services).map_err(|err| {
            tracing::warn!(%err, "camera does not expose the shutter service");
            SessionFailure::CharacteristicsNotFound
        })?;

        let local = self.identity.local_identity().await;
        if !self.handshake.run(&self.link, &characteristics, &local).await {
            return Err(SessionFailure::AuthenticationFailed);
        }

        let device_info = self.read_device_info(handle, &services).await;
        Ok((characteristics, device_info))
    }

    async fn read_device_info(
        &self,
        handle: &ConnectionHandle,
        services: &[GattService],
    ) -> DeviceInfo {
        let mut info = DeviceInfo::default();
        let fields = [
            (device_info::MANUFACTURER, &mut info.manufacturer),
            (device_info::MODEL, &mut info.model),
            (device_info::SERIAL, &mut info.serial),
            (device_info::SOFTWARE, &mut info.software),
        ];
        for (uuid, field) in fields {
            let Some(characteristic) = services
                .iter()
                .flat_map(|service| &service.characteristics)
                .find(|c| c.uuid == uuid && c.properties.read)
            else {
                continue;
            };
            let target = CharacteristicRef::new(handle.clone(), characteristic.clone());
            match self.link.read(&target).await {
                Ok(bytes) => {
                    let value = String::from_utf8_lossy(&bytes)
                        .trim_end_matches('\0')
                        .trim()
                        .to_owned();
                    if !value.is_empty() {
                        *field = Some(value);
                    }
                }
                Err(err) => tracing::debug!(%err, %uuid, "device information read failed"),
            }
        }
        info
    }

    /// Pair with a newly chosen camera and remember it.
    ///
    /// # Errors
    ///
    /// Same as [`establish`](Self::establish).
    pub async fn pair(&self, peripheral: &PeripheralInfo) -> Result<CameraIdentity, SessionFailure> {
        let camera = CameraIdentity::new(peripheral.address.clone(), peripheral.name.as_deref());
        self.establish(&camera).await?;
        if let Err(err) = self.identity.remember_camera(&camera).await {
            tracing::warn!(%err, "paired but could not remember camera");
        }
        Ok(camera)
    }

    /// Establish the connection with the remembered camera.
    ///
    /// # Errors
    ///
    /// [`SessionFailure::DeviceNotFound`] when no camera is remembered, or
    /// the errors of [`establish`](Self::establish).
    pub async fn reconnect(&self) -> Result<CameraIdentity, SessionFailure> {
        let camera = match self.identity.camera_identity().await {
            Ok(Some(camera)) => camera,
            Ok(None) => return Err(SessionFailure::DeviceNotFound),
            Err(err) => {
                tracing::warn!(%err, "could not read remembered camera");
                return Err(SessionFailure::DeviceNotFound);
            }
        };
        self.establish(&camera).await?;
        Ok(camera)
    }

    /// Close the connection and wait for the transport to confirm, bounded
    /// by the disconnect timeout. Local state is cleared either way.
    ///
    /// # Errors
    ///
    /// [`SessionFailure::DisconnectError`] when the request fails or is not
    /// confirmed in time.
    pub async fn disconnect(&self) -> Result<(), SessionFailure> {
        let Some(address) = self.target().await else {
            return Ok(());
        };
        self.link
            .disconnect_confirmed(&address, self.config.disconnect_timeout())
            .await
            .map_err(|err| {
                tracing::warn!(%err, %address, "graceful disconnect failed");
                SessionFailure::DisconnectError
            })
    }

    /// Close the connection without waiting for confirmation.
    ///
    /// # Errors
    ///
    /// [`SessionFailure::DisconnectError`] when the request fails.
    pub async fn force_disconnect(&self) -> Result<(), SessionFailure> {
        let Some(address) = self.target().await else {
            return Ok(());
        };
        self.link.disconnect(&address).await.map_err(|err| {
            tracing::warn!(%err, %address, "forced disconnect failed");
            SessionFailure::DisconnectError
        })
    }

    async fn target(&self) -> Option<CameraAddress> {
        match self.clear() {
            Some(paired) => Some(paired.camera.address),
            None => self.link.current().await.map(|h| h.address().clone()),
        }
    }

    /// Drop cached connection state. Returns what was held.
    pub fn clear(&self) -> Option<PairedConnection> {
        self.slot().take()
    }

    /// The established connection, if any.
    #[must_use]
    pub fn paired(&self) -> Option<PairedConnection> {
        self.slot().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Call, FakeGatt, InMemoryPreferenceStore, camera_address};
    use shutterlink_domain::camera::LocalIdentity;
    use shutterlink_domain::protocol::PAIRING_CHAR;

    struct Fixture {
        gatt: Arc<FakeGatt>,
        store: Arc<InMemoryPreferenceStore>,
        link: Arc<CameraLink<Arc<FakeGatt>>>,
        manager: ConnectionManager<Arc<FakeGatt>, Arc<InMemoryPreferenceStore>>,
    }

    fn fixture(store: InMemoryPreferenceStore) -> Fixture {
        let gatt = Arc::new(FakeGatt::advertising_camera());
        gatt.set_value(device_info::MANUFACTURER, b"Canon\0");
        gatt.set_value(device_info::MODEL, b"EOS R6");
        let store = Arc::new(store);
        let link = Arc::new(CameraLink::new(Arc::clone(&gatt)));
        let identity = Arc::new(IdentityService::new(
            Arc::clone(&store),
            LocalIdentity::new("Pixel").unwrap(),
        ));
        let manager = ConnectionManager::new(Arc::clone(&link), identity, EngineConfig::default());
        Fixture {
            gatt,
            store,
            link,
            manager,
        }
    }

    fn peripheral() -> PeripheralInfo {
        PeripheralInfo {
            address: camera_address(),
            name: Some("EOS R6".to_owned()),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn should_keep_connection_open_after_pairing() {
        let f = fixture(InMemoryPreferenceStore::default());

        let camera = f.manager.pair(&peripheral()).await.unwrap();

        assert_eq!(camera.display_name, "EOS R6");
        assert!(f.link.is_connected().await);
        assert_eq!(f.gatt.count(|c| matches!(c, Call::Disconnect(_))), 0);
        assert_eq!(f.gatt.writes_to(PAIRING_CHAR).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn should_remember_camera_after_pairing() {
        let f = fixture(InMemoryPreferenceStore::default());

        f.manager.pair(&peripheral()).await.unwrap();

        assert_eq!(
            f.store.value("camera_address").as_deref(),
            Some("AA:BB:CC:DD:EE:FF")
        );
        assert_eq!(f.store.value("camera_name").as_deref(), Some("EOS R6"));
    }

    #[tokio::test(start_paused = true)]
    async fn should_read_device_information_best_effort() {
        let f = fixture(InMemoryPreferenceStore::default());

        f.manager.pair(&peripheral()).await.unwrap();

        let info = f.manager.paired().unwrap().device_info;
        assert_eq!(info.manufacturer.as_deref(), Some("Canon"));
        assert_eq!(info.model.as_deref(), Some("EOS R6"));
        assert_eq!(info.serial, None);
    }

    #[tokio::test(start_paused = true)]
    async fn should_release_link_when_handshake_fails() {
        let f = fixture(InMemoryPreferenceStore::default());
        f.gatt.fail_writes(PAIRING_CHAR, 1);

        let result = f.manager.pair(&peripheral()).await;

        assert_eq!(result, Err(SessionFailure::AuthenticationFailed));
        assert!(!f.link.is_connected().await);
        assert!(f.manager.paired().is_none());
        assert!(f.store.value("camera_address").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn should_fail_reconnect_without_remembered_camera() {
        let f = fixture(InMemoryPreferenceStore::default());

        assert_eq!(
            f.manager.reconnect().await,
            Err(SessionFailure::DeviceNotFound)
        );
        assert!(f.gatt.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn should_clear_state_on_graceful_disconnect() {
        let f = fixture(InMemoryPreferenceStore::remembering(&camera_address(), "EOS R6"));
        f.manager.reconnect().await.unwrap();

        f.manager.disconnect().await.unwrap();

        assert!(f.manager.paired().is_none());
        assert!(!f.link.is_connected().await);
    }

    #[tokio::test(start_paused = true)]
    async fn should_report_disconnect_error_when_not_confirmed() {
        let f = fixture(InMemoryPreferenceStore::remembering(&camera_address(), "EOS R6"));
        f.manager.reconnect().await.unwrap();
        f.gatt.ignore_disconnects();

        let result = f.manager.disconnect().await;

        assert_eq!(result, Err(SessionFailure::DisconnectError));
        assert!(f.manager.paired().is_none());
        assert!(!f.link.is_connected().await);
    }

    #[tokio::test(start_paused = true)]
    async fn should_force_disconnect_without_waiting() {
        let f = fixture(InMemoryPreferenceStore::remembering(&camera_address(), "EOS R6"));
        f.manager.reconnect().await.unwrap();
        f.gatt.ignore_disconnects();

        f.manager.force_disconnect().await.unwrap();

        assert!(f.manager.paired().is_none());
        assert_eq!(f.gatt.count(|c| matches!(c, Call::Disconnect(_))), 1);
    }
}
