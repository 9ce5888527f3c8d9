//! Identity service: remembered camera and local device name, on top of
//! the [`PreferenceStore`] port.

use tokio::sync::OnceCell;

use shutterlink_domain::camera::{CameraAddress, CameraIdentity, LocalIdentity};
use shutterlink_domain::error::ShutterLinkError;

use crate::ports::PreferenceStore;
use crate::ports::preferences::keys;

/// Reads and writes identities through a [`PreferenceStore`].
pub struct IdentityService<S> {
    store: S,
    fallback: LocalIdentity,
    local: OnceCell<LocalIdentity>,
}

impl<S: PreferenceStore> IdentityService<S> {
    /// `fallback` is announced when the store holds no local device name.
    pub fn new(store: S, fallback: LocalIdentity) -> Self {
        Self {
            store,
            fallback,
            local: OnceCell::new(),
        }
    }

    /// The remembered camera, if any.
    ///
    /// A stored address that no longer parses is treated as absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn camera_identity(&self) -> Result<Option<CameraIdentity>, ShutterLinkError> {
        let Some(raw) = self.store.get(keys::CAMERA_ADDRESS).await? else {
            return Ok(None);
        };
        let address = match CameraAddress::parse(&raw) {
            Ok(address) => address,
            Err(err) => {
                tracing::warn!(%err, "ignoring invalid remembered camera address");
                return Ok(None);
            }
        };
        let name = self.store.get(keys::CAMERA_NAME).await?;
        Ok(Some(CameraIdentity::new(address, name.as_deref())))
    }

    /// Remember `camera`, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    #[tracing::instrument(skip(self), fields(address = %camera.address))]
    pub async fn remember_camera(&self, camera: &CameraIdentity) -> Result<(), ShutterLinkError> {
        self.store
            .set(keys::CAMERA_ADDRESS, camera.address.as_str())
            .await?;
        self.store
            .set(keys::CAMERA_NAME, &camera.display_name)
            .await?;
        tracing::info!(name = %camera.display_name, "camera remembered");
        Ok(())
    }

    /// The name announced during the handshake.
    ///
    /// Read once, then cached. When the store holds no usable name the
    /// configured fallback is used and written back.
    pub async fn local_identity(&self) -> LocalIdentity {
        self.local
            .get_or_init(|| self.load_local_identity())
            .await
            .clone()
    }

    async fn load_local_identity(&self) -> LocalIdentity {
        match self.store.get(keys::LOCAL_DEVICE_NAME).await {
            Ok(Some(name)) => {
                if let Ok(local) = LocalIdentity::new(name) {
                    return local;
                }
            }
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(%err, "could not read local device name, using fallback");
                return self.fallback.clone();
            }
        }

        if let Err(err) = self
            .store
            .set(keys::LOCAL_DEVICE_NAME, &self.fallback.device_name)
            .await
        {
            tracing::warn!(%err, "could not persist local device name");
        }
        self.fallback.clone()
    }

    /// Address of the local BLE adapter, as last recorded.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn local_address(&self) -> Result<Option<String>, ShutterLinkError> {
        self.store.get(keys::LOCAL_DEVICE_ADDRESS).await
    }

    /// Record the address of the local BLE adapter.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn remember_local_address(&self, address: &str) -> Result<(), ShutterLinkError> {
        self.store.set(keys::LOCAL_DEVICE_ADDRESS, address).await
    }
}
