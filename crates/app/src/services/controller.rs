//! Camera controller: owns the connection context and coordinates the
//! per-shot session, the stay-paired connection and auto-discovery.
//!
//! The controller is the only holder of the [`CameraLink`]; the other
//! services receive it as a capability. Every time the link's slot empties
//! the controller drops the lifecycle state and schedules auto-discovery
//! after the reconnect delay.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use shutterlink_domain::camera::{CameraAddress, CameraIdentity, LocalIdentity};
use shutterlink_domain::discovery::DiscoveryMode;
use shutterlink_domain::session::{SessionFailure, SessionReport};

use crate::config::EngineConfig;
use crate::ports::{EventPublisher, GattTransport, PeripheralInfo, PreferenceStore};
use crate::services::auto_discovery::AutoDiscovery;
use crate::services::connection_manager::{ConnectionManager, DeviceInfo};
use crate::services::identity_service::IdentityService;
use crate::services::link::{CameraLink, LinkEvent};
use crate::services::shutter_session::{ShutterSession, ShutterTrigger};

/// Snapshot of what the engine is doing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ControllerStatus {
    pub mode: DiscoveryMode,
    /// Whether the stay-paired connection is established.
    pub connected: bool,
    pub camera: Option<CameraIdentity>,
    pub device_info: Option<DeviceInfo>,
}

pub struct CameraController<T, S, P> {
    link: Arc<CameraLink<T>>,
    identity: Arc<IdentityService<S>>,
    session: ShutterSession<T, S>,
    connections: Arc<ConnectionManager<T, S>>,
    discovery: Arc<AutoDiscovery<T, S, P>>,
    config: EngineConfig,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl<T, S, P> CameraController<T, S, P>
where
    T: GattTransport + 'static,
    S: PreferenceStore + 'static,
    P: EventPublisher + Send + Sync + 'static,
{
    /// Build the engine around its ports.
    pub fn new(
        transport: T,
        store: S,
        publisher: P,
        fallback_name: LocalIdentity,
        config: EngineConfig,
    ) -> Self {
        let link = Arc::new(CameraLink::new(transport));
        let identity = Arc::new(IdentityService::new(store, fallback_name));
        let session = ShutterSession::new(Arc::clone(&link), Arc::clone(&identity), config.clone());
        let connections = Arc::new(ConnectionManager::new(
            Arc::clone(&link),
            Arc::clone(&identity),
            config.clone(),
        ));
        let discovery = Arc::new(AutoDiscovery::new(
            Arc::clone(&link),
            Arc::clone(&identity),
            Arc::clone(&connections),
            publisher,
            config.clone(),
        ));
        Self {
            link,
            identity,
            session,
            connections,
            discovery,
            config,
            tasks: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn identity(&self) -> &IdentityService<S> {
        &self.identity
    }

    /// Start watching the connection and begin auto-discovery.
    pub fn start(&self) {
        let watcher = self.link.spawn_watcher();
        let monitor = self.spawn_release_monitor();
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend([watcher, monitor]);
        self.discovery.start_after(std::time::Duration::ZERO);
        tracing::info!("camera controller started");
    }

    fn spawn_release_monitor(&self) -> JoinHandle<()> {
        let mut released = self.link.subscribe();
        let connections = Arc::clone(&self.connections);
        let discovery = Arc::clone(&self.discovery);
        let delay = self.config.reconnect_delay();
        tokio::spawn(async move {
            loop {
                match released.recv().await {
                    Ok(LinkEvent::Released { address, lost }) => {
                        if connections.clear().is_some() {
                            tracing::info!(%address, lost, "paired connection ended");
                        }
                        discovery.start_after(delay);
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "release monitor lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    /// Take a picture. `true` only when the trigger sequence was written.
    pub async fn trigger_shutter(&self) -> bool {
        self.run_session().await.succeeded()
    }

    /// Run one shutter session with auto-discovery paused.
    pub async fn run_session(&self) -> SessionReport {
        self.discovery.stop().await;
        let report = self.session.run().await;
        self.discovery.start_after(self.config.reconnect_delay());
        report
    }

    /// Pair with `peripheral` and keep the connection open.
    ///
    /// # Errors
    ///
    /// The failure of the establish step.
    #[tracing::instrument(skip(self), fields(address = %peripheral.address))]
    pub async fn pair(&self, peripheral: &PeripheralInfo) -> Result<CameraIdentity, SessionFailure> {
        self.discovery.stop().await;
        let result = self.connections.pair(peripheral).await;
        self.after_establish(result.is_ok());
        result
    }

    /// Locate the camera at `address` (connected or advertising) and pair
    /// with it.
    ///
    /// # Errors
    ///
    /// [`SessionFailure::DeviceNotFound`] when the camera is neither
    /// connected nor seen within the session scan timeout, otherwise the
    /// failure of [`pair`](Self::pair).
    pub async fn pair_address(
        &self,
        address: &CameraAddress,
    ) -> Result<CameraIdentity, SessionFailure> {
        self.discovery.stop().await;
        let transport = self.link.transport();
        let connected = transport
            .connected_peripherals()
            .await
            .unwrap_or_default()
            .into_iter()
            .find(|p| p.address == *address);
        let peripheral = match connected {
            Some(peripheral) => Some(peripheral),
            None => transport
                .scan_for(address, self.config.session_scan_timeout())
                .await
                .unwrap_or_else(|err| {
                    tracing::warn!(%err, "scan failed");
                    None
                }),
        };
        let Some(peripheral) = peripheral else {
            self.after_establish(false);
            return Err(SessionFailure::DeviceNotFound);
        };
        self.pair(&peripheral).await
    }

    /// Establish the stay-paired connection with the remembered camera.
    ///
    /// # Errors
    ///
    /// The failure of the establish step.
    pub async fn reconnect(&self) -> Result<CameraIdentity, SessionFailure> {
        self.discovery.stop().await;
        let result = self.connections.reconnect().await;
        self.after_establish(result.is_ok());
        result
    }

    fn after_establish(&self, connected: bool) {
        if connected {
            self.discovery.mark_connected();
        } else {
            self.discovery.start_after(self.config.reconnect_delay());
        }
    }

    /// Close the connection gracefully, then resume auto-discovery.
    ///
    /// # Errors
    ///
    /// [`SessionFailure::DisconnectError`] when the disconnect is not
    /// confirmed; cleanup happens regardless.
    pub async fn disconnect(&self) -> Result<(), SessionFailure> {
        let result = self.connections.disconnect().await;
        self.discovery.start_after(self.config.reconnect_delay());
        result
    }

    /// Close the connection without waiting, then resume auto-discovery.
    ///
    /// # Errors
    ///
    /// [`SessionFailure::DisconnectError`] when the request fails.
    pub async fn force_disconnect(&self) -> Result<(), SessionFailure> {
        let result = self.connections.force_disconnect().await;
        self.discovery.start_after(self.config.reconnect_delay());
        result
    }

    pub async fn status(&self) -> ControllerStatus {
        let paired = self.connections.paired();
        let camera = match &paired {
            Some(paired) => Some(paired.camera.clone()),
            None => self.identity.camera_identity().await.unwrap_or_else(|err| {
                tracing::warn!(%err, "could not read remembered camera");
                None
            }),
        };
        ControllerStatus {
            mode: self.discovery.mode(),
            connected: paired.is_some(),
            camera,
            device_info: paired.map(|p| p.device_info),
        }
    }

    #[must_use]
    pub fn watch_mode(&self) -> watch::Receiver<DiscoveryMode> {
        self.discovery.watch_mode()
    }

    /// Stop background work and release the camera.
    pub async fn shutdown(&self) {
        self.discovery.stop().await;
        for task in self
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
        {
            task.abort();
        }
        if let Err(failure) = self.connections.force_disconnect().await {
            tracing::warn!(%failure, "camera not released on shutdown");
        }
        tracing::info!("camera controller stopped");
    }
}

impl<T, S, P> ShutterTrigger for CameraController<T, S, P>
where
    T: GattTransport + 'static,
    S: PreferenceStore + 'static,
    P: EventPublisher + Send + Sync + 'static,
{
    fn trigger(&self) -> impl Future<Output = SessionReport> + Send {
        self.run_session()
    }
}
