//! Pairing handshake.
//!
//! The camera accepts shutter commands only after it has been told who is
//! talking to it: [`PAIRING_OPCODE`](shutterlink_domain::protocol::PAIRING_OPCODE)
//! followed by the local device name, written with response to the pairing
//! characteristic.

use std::time::Duration;

use shutterlink_domain::camera::LocalIdentity;
use shutterlink_domain::protocol::{ShutterCommand, WriteKind, pairing_payload};

use crate::config::EngineConfig;
use crate::ports::GattTransport;
use crate::services::link::CameraLink;
use crate::services::resolver::CharacteristicSet;

/// Sends the identity handshake on an established connection.
#[derive(Debug, Clone, Copy)]
pub struct Handshake {
    settle: Duration,
    verify: bool,
}

impl Handshake {
    #[must_use]
    pub fn new(settle: Duration, verify: bool) -> Self {
        Self { settle, verify }
    }

    #[must_use]
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.handshake_settle(), config.verify_pairing)
    }

    /// Run the handshake. Returns `false` only when the pairing write fails.
    ///
    /// The optional verification probe (a release byte on the shutter
    /// characteristic) is allowed to fail: cameras reject it now and then
    /// even after accepting the pairing.
    #[tracing::instrument(skip_all, fields(device_name = %local.device_name))]
    pub async fn run<T: GattTransport>(
        &self,
        link: &CameraLink<T>,
        characteristics: &CharacteristicSet,
        local: &LocalIdentity,
    ) -> bool {
        let payload = pairing_payload(&local.device_name);
        if let Err(err) = link
            .write(&characteristics.pairing, &payload, WriteKind::WithResponse)
            .await
        {
            tracing::warn!(%err, "pairing write failed");
            return false;
        }

        tokio::time::sleep(self.settle).await;

        if self.verify {
            let probe = ShutterCommand::Release.payload();
            if let Err(err) = link
                .write(&characteristics.shutter, &probe, WriteKind::WithResponse)
                .await
            {
                tracing::debug!(%err, "camera rejected pairing verification probe");
            }
        }

        tracing::debug!("handshake accepted");
        true
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::services::resolver::discover;
    use crate::testing::{FakeGatt, camera_address};
    use shutterlink_domain::protocol::{PAIRING_CHAR, SHUTTER_CHAR};

    const SETTLE: Duration = Duration::from_millis(500);

    async fn connected() -> (Arc<FakeGatt>, CameraLink<Arc<FakeGatt>>, CharacteristicSet) {
        let gatt = Arc::new(FakeGatt::with_camera());
        let link = CameraLink::new(Arc::clone(&gatt));
        let handle = link
            .connect(&camera_address(), Duration::from_secs(1))
            .await
            .unwrap();
        let set = discover(&link, &handle).await.unwrap();
        (gatt, link, set)
    }

    fn pixel() -> LocalIdentity {
        LocalIdentity::new("Pixel").unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn should_write_pairing_payload_with_response() {
        let (gatt, link, set) = connected().await;

        assert!(Handshake::new(SETTLE, true).run(&link, &set, &pixel()).await);

        let writes = gatt.writes_to(PAIRING_CHAR);
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].data, vec![0x03, 0x50, 0x69, 0x78, 0x65, 0x6C]);
        assert_eq!(writes[0].kind, WriteKind::WithResponse);
    }

    #[tokio::test(start_paused = true)]
    async fn should_wait_settle_interval_before_probe() {
        let (gatt, link, set) = connected().await;

        Handshake::new(SETTLE, true).run(&link, &set, &pixel()).await;

        let pairing = &gatt.writes_to(PAIRING_CHAR)[0];
        let probe = &gatt.writes_to(SHUTTER_CHAR)[0];
        assert_eq!(probe.data, vec![0x00]);
        assert_eq!(probe.at - pairing.at, SETTLE);
    }

    #[tokio::test(start_paused = true)]
    async fn should_succeed_when_verification_probe_fails() {
        let (gatt, link, set) = connected().await;
        gatt.fail_writes(SHUTTER_CHAR, 1);

        assert!(Handshake::new(SETTLE, true).run(&link, &set, &pixel()).await);
    }

    #[tokio::test(start_paused = true)]
    async fn should_fail_when_pairing_write_fails() {
        let (gatt, link, set) = connected().await;
        gatt.fail_writes(PAIRING_CHAR, 1);

        assert!(!Handshake::new(SETTLE, true).run(&link, &set, &pixel()).await);
        assert!(gatt.writes_to(SHUTTER_CHAR).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn should_skip_probe_when_verification_disabled() {
        let (gatt, link, set) = connected().await;

        assert!(Handshake::new(SETTLE, false).run(&link, &set, &pixel()).await);
        assert!(gatt.writes_to(SHUTTER_CHAR).is_empty());
    }
}
