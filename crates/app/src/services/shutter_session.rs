//! Shutter session: one connect, authenticate, trigger, disconnect cycle
//! per shot.
//!
//! The camera cannot be remote-controlled and operated by hand at the same
//! time, so every shot holds the connection only as long as needed. The
//! steps run strictly in order; the first unrecoverable failure is terminal
//! except in Authenticate, which gets one retry with fresh discovery.
//! Teardown runs exactly once whatever happened before it.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::Instrument;

use shutterlink_domain::camera::CameraIdentity;
use shutterlink_domain::id::SessionId;
use shutterlink_domain::protocol::{SHUTTER_SEQUENCE, ShutterCommand, WriteKind};
use shutterlink_domain::session::{SessionFailure, SessionReport, SessionState};

use crate::config::EngineConfig;
use crate::ports::{GattTransport, PreferenceStore};
use crate::services::handshake::Handshake;
use crate::services::identity_service::IdentityService;
use crate::services::link::{CameraLink, LinkError};
use crate::services::resolver::{self, CharacteristicSet};

/// Anything that can take a picture on request.
pub trait ShutterTrigger: Send + Sync {
    /// Run one shutter attempt.
    fn trigger(&self) -> impl Future<Output = SessionReport> + Send;
}

impl<T: ShutterTrigger> ShutterTrigger for Arc<T> {
    fn trigger(&self) -> impl Future<Output = SessionReport> + Send {
        (**self).trigger()
    }
}

/// Runs shutter sessions against the remembered camera.
pub struct ShutterSession<T, S> {
    link: Arc<CameraLink<T>>,
    identity: Arc<IdentityService<S>>,
    handshake: Handshake,
    config: EngineConfig,
    gate: Mutex<()>,
}

impl<T: GattTransport, S: PreferenceStore> ShutterSession<T, S> {
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
            gate: Mutex::new(()),
        }
    }

    /// Take a picture. `true` only when the whole trigger sequence was
    /// written.
    pub async fn trigger_shutter(&self) -> bool {
        self.run().await.succeeded()
    }

    /// Run one session and report how it ended.
    ///
    /// Concurrent calls queue up; sessions never overlap.
    pub async fn run(&self) -> SessionReport {
        let _gate = self.gate.lock().await;
        let session_id = SessionId::new();
        let span = tracing::info_span!("shutter_session", %session_id);
        self.execute(session_id).instrument(span).await
    }

    async fn execute(&self, session_id: SessionId) -> SessionReport {
        let mut retried_authentication = false;

        let camera = match self.identity.camera_identity().await {
            Ok(Some(camera)) => camera,
            Ok(None) => {
                tracing::info!("no camera remembered");
                return SessionReport {
                    session_id,
                    failure: Some(SessionFailure::DeviceNotFound),
                    retried_authentication,
                };
            }
            Err(err) => {
                tracing::warn!(%err, "could not read remembered camera");
                return SessionReport {
                    session_id,
                    failure: Some(SessionFailure::DeviceNotFound),
                    retried_authentication,
                };
            }
        };

        let outcome = self.drive(&camera, &mut retried_authentication).await;
        self.teardown(&camera).await;

        match outcome {
            Ok(()) => tracing::info!("photo taken"),
            Err(failure) => tracing::warn!(%failure, "shutter session failed"),
        }

        SessionReport {
            session_id,
            failure: outcome.err(),
            retried_authentication,
        }
    }

    async fn drive(
        &self,
        camera: &CameraIdentity,
        retried_authentication: &mut bool,
    ) -> Result<(), SessionFailure> {
        step(SessionState::Locate);
        self.locate(camera).await?;

        step(SessionState::Connect);
        let handle = self
            .link
            .connect(&camera.address, self.config.connect_timeout())
            .await
            .map_err(|err| {
                tracing::warn!(%err, "connect failed");
                SessionFailure::ConnectionFailed
            })?;

        step(SessionState::Discover);
        let mut characteristics = resolver::discover(&self.link, &handle)
            .await
            .map_err(|err| {
                tracing::warn!(%err, "characteristic discovery failed");
                SessionFailure::CharacteristicsNotFound
            })?;

        step(SessionState::Authenticate);
        let local = self.identity.local_identity().await;
        if !self.handshake.run(&self.link, &characteristics, &local).await {
            tracing::info!("handshake failed, rediscovering and retrying once");
            *retried_authentication = true;
            characteristics = resolver::discover(&self.link, &handle)
                .await
                .map_err(|err| {
                    tracing::warn!(%err, "characteristic rediscovery failed");
                    SessionFailure::CharacteristicsNotFound
                })?;
            if !self.handshake.run(&self.link, &characteristics, &local).await {
                return Err(SessionFailure::AuthenticationFailed);
            }
        }

        step(SessionState::Trigger);
        self.press(&characteristics).await
    }

    async fn locate(&self, camera: &CameraIdentity) -> Result<(), SessionFailure> {
        let transport = self.link.transport();
        match transport.connected_peripherals().await {
            Ok(connected) if connected.iter().any(|p| p.address == camera.address) => {
                tracing::debug!("camera already connected");
                return Ok(());
            }
            Ok(_) => {}
            Err(err) => tracing::debug!(%err, "could not list connected peripherals"),
        }

        match transport
            .scan_for(&camera.address, self.config.session_scan_timeout())
            .await
        {
            Ok(Some(_)) => Ok(()),
            Ok(None) => Err(SessionFailure::DeviceNotFound),
            Err(err) => {
                tracing::warn!(%err, "scan failed");
                Err(SessionFailure::DeviceNotFound)
            }
        }
    }

    async fn press(&self, characteristics: &CharacteristicSet) -> Result<(), SessionFailure> {
        for command in SHUTTER_SEQUENCE {
            self.link
                .write(
                    &characteristics.shutter,
                    &command.payload(),
                    WriteKind::WithoutResponse,
                )
                .await
                .map_err(|err| {
                    tracing::warn!(%err, ?command, "shutter write failed");
                    match err {
                        LinkError::StaleCharacteristic => SessionFailure::CharacteristicsNotFound,
                        _ => SessionFailure::ShutterSequenceFailed,
                    }
                })?;
            if command == ShutterCommand::HalfPress {
                tokio::time::sleep(self.config.shutter_settle()).await;
            }
        }
        Ok(())
    }

    async fn teardown(&self, camera: &CameraIdentity) {
        step(SessionState::Teardown);
        if let Err(err) = self.link.disconnect(&camera.address).await {
            tracing::warn!(%err, failure = %SessionFailure::DisconnectError, "teardown failed");
        }
    }
}

impl<T: GattTransport, S: PreferenceStore> ShutterTrigger for ShutterSession<T, S> {
    fn trigger(&self) -> impl Future<Output = SessionReport> + Send {
        self.run()
    }
}

fn step(state: SessionState) {
    tracing::debug!(%state, "session step");
}
