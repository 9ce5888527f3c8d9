//! Auto-discovery: reconnect to the remembered camera in the background.
//!
//! One cycle task runs at a time and walks through the discovery modes:
//!
//! 1. [`PassiveMonitoring`](DiscoveryMode::PassiveMonitoring): poll the
//!    host's connected peripherals for the camera reconnecting by itself.
//! 2. [`ActiveScanning`](DiscoveryMode::ActiveScanning): once the grace
//!    period is over, scan for the camera and retry after a delay on a miss
//!    or a failed connect.
//! 3. [`Connected`](DiscoveryMode::Connected): the connection is
//!    established, the cycle ends and a `ControlsReady` event is published.
//!
//! Starting a new cycle aborts the previous one, so the modes stay mutually
//! exclusive. Ticks are no-ops while the link holds a connection.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use shutterlink_domain::camera::CameraIdentity;
use shutterlink_domain::discovery::DiscoveryMode;
use shutterlink_domain::event::CameraEvent;

use crate::config::EngineConfig;
use crate::ports::{EventPublisher, GattTransport, PreferenceStore};
use crate::services::connection_manager::ConnectionManager;
use crate::services::identity_service::IdentityService;
use crate::services::link::CameraLink;

/// Background reconnection to the remembered camera.
pub struct AutoDiscovery<T, S, P> {
    link: Arc<CameraLink<T>>,
    identity: Arc<IdentityService<S>>,
    connections: Arc<ConnectionManager<T, S>>,
    publisher: P,
    config: EngineConfig,
    mode: watch::Sender<DiscoveryMode>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl<T, S, P> AutoDiscovery<T, S, P>
where
    T: GattTransport + 'static,
    S: PreferenceStore + 'static,
    P: EventPublisher + Send + Sync + 'static,
{
    pub fn new(
        link: Arc<CameraLink<T>>,
        identity: Arc<IdentityService<S>>,
        connections: Arc<ConnectionManager<T, S>>,
        publisher: P,
        config: EngineConfig,
    ) -> Self {
        Self {
            link,
            identity,
            connections,
            publisher,
            config,
            mode: watch::Sender::new(DiscoveryMode::Idle),
            task: Mutex::new(None),
        }
    }

    /// The current mode.
    #[must_use]
    pub fn mode(&self) -> DiscoveryMode {
        *self.mode.borrow()
    }

    /// Follow mode changes.
    #[must_use]
    pub fn watch_mode(&self) -> watch::Receiver<DiscoveryMode> {
        self.mode.subscribe()
    }

    fn task(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.task.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start a new cycle after `delay`, aborting any running one.
    pub fn start_after(self: &Arc<Self>, delay: Duration) {
        let mut task = self.task();
        if let Some(previous) = task.take() {
            previous.abort();
        }
        self.mode.send_replace(DiscoveryMode::Idle);
        let this = Arc::clone(self);
        *task = Some(tokio::spawn(async move { this.cycle(delay).await }));
        tracing::debug!(?delay, "auto-discovery scheduled");
    }

    /// Abort the running cycle and stop scanning. Idempotent.
    pub async fn stop(&self) {
        if let Some(previous) = self.task().take() {
            previous.abort();
        }
        self.mode.send_replace(DiscoveryMode::Idle);
        if let Err(err) = self.link.transport().stop_scan().await {
            tracing::debug!(%err, "stop scan failed");
        }
    }

    /// Record a connection established outside of discovery.
    pub fn mark_connected(&self) {
        if let Some(previous) = self.task().take() {
            previous.abort();
        }
        self.mode.send_replace(DiscoveryMode::Connected);
    }

    async fn cycle(&self, delay: Duration) {
        tokio::time::sleep(delay).await;

        let camera = match self.identity.camera_identity().await {
            Ok(Some(camera)) => camera,
            Ok(None) => {
                tracing::debug!("no camera remembered, discovery idle");
                self.mode.send_replace(DiscoveryMode::Idle);
                return;
            }
            Err(err) => {
                tracing::warn!(%err, "could not read remembered camera, discovery idle");
                self.mode.send_replace(DiscoveryMode::Idle);
                return;
            }
        };

        self.mode.send_replace(DiscoveryMode::PassiveMonitoring);
        tracing::info!(address = %camera.address, "monitoring for camera-initiated reconnect");
        let grace = self.config.active_scan_grace();
        if tokio::time::timeout(grace, self.monitor(&camera))
            .await
            .is_ok()
        {
            return;
        }

        self.mode.send_replace(DiscoveryMode::ActiveScanning);
        tracing::info!(address = %camera.address, "scanning for camera");
        self.scan(&camera).await;
    }

    /// Returns once the camera is connected.
    async fn monitor(&self, camera: &CameraIdentity) {
        let mut ticker = tokio::time::interval(self.config.passive_poll_interval());
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            if self.link.is_connected().await {
                continue;
            }
            let seen = match self.link.transport().connected_peripherals().await {
                Ok(connected) => connected.iter().any(|p| p.address == camera.address),
                Err(err) => {
                    tracing::debug!(%err, "could not list connected peripherals");
                    false
                }
            };
            if seen && self.connect(camera).await {
                return;
            }
        }
    }

    async fn scan(&self, camera: &CameraIdentity) {
        let window = self.config.active_scan_window();
        loop {
            if !self.link.is_connected().await {
                match self.link.transport().scan_for(&camera.address, window).await {
                    Ok(Some(_)) => {
                        if self.connect(camera).await {
                            return;
                        }
                    }
                    Ok(None) => tracing::debug!("camera not seen"),
                    Err(err) => tracing::warn!(%err, "scan failed"),
                }
            }
            tokio::time::sleep(self.config.active_scan_retry()).await;
        }
    }

    async fn connect(&self, camera: &CameraIdentity) -> bool {
        if let Err(failure) = self.connections.establish(camera).await {
            tracing::info!(%failure, "auto-connect failed");
            return false;
        }
        self.mode.send_replace(DiscoveryMode::Connected);
        if let Err(err) = self
            .publisher
            .publish(CameraEvent::controls_ready(camera.clone()))
            .await
        {
            tracing::warn!(%err, "could not publish controls-ready event");
        }
        true
    }
}
