//! Preference store port: the key/value persistence the engine reads the
//! remembered camera and the local device name from.

use std::future::Future;
use std::sync::Arc;

use shutterlink_domain::error::ShutterLinkError;

/// Keys the engine reads and writes.
pub mod keys {
    /// Address of the remembered camera.
    pub const CAMERA_ADDRESS: &str = "camera_address";
    /// Display name of the remembered camera.
    pub const CAMERA_NAME: &str = "camera_name";
    /// Name announced to the camera during the pairing handshake.
    pub const LOCAL_DEVICE_NAME: &str = "local_device_name";
    /// Address of the local BLE adapter.
    pub const LOCAL_DEVICE_ADDRESS: &str = "local_device_address";
}

/// String key/value persistence.
pub trait PreferenceStore: Send + Sync {
    /// Read the value stored under `key`.
    fn get(&self, key: &str)
    -> impl Future<Output = Result<Option<String>, ShutterLinkError>> + Send;

    /// Store `value` under `key`, replacing any previous value.
    fn set(
        &self,
        key: &str,
        value: &str,
    ) -> impl Future<Output = Result<(), ShutterLinkError>> + Send;
}

impl<T: PreferenceStore> PreferenceStore for Arc<T> {
    fn get(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<Option<String>, ShutterLinkError>> + Send {
        (**self).get(key)
    }

    fn set(
        &self,
        key: &str,
        value: &str,
    ) -> impl Future<Output = Result<(), ShutterLinkError>> + Send {
        (**self).set(key, value)
    }
}
