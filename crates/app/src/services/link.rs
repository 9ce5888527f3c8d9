//! Camera link: the single owned connection context.
//!
//! [`CameraLink`] holds the process-wide [`ConnectionHandle`] slot. Every
//! component that talks to the camera goes through it, so:
//!
//! - at most one connection exists; connecting to the address already held
//!   returns the existing handle, connecting to another address is refused;
//! - characteristics are bound to the handle they were discovered on, and a
//!   write with a handle that is no longer current fails with
//!   [`LinkError::StaleCharacteristic`];
//! - whenever the slot empties (requested disconnect or a loss observed on
//!   the transport) a [`LinkEvent::Released`] is broadcast.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;

use shutterlink_domain::camera::CameraAddress;
use shutterlink_domain::protocol::WriteKind;

use crate::ports::{GattCharacteristic, GattService, GattTransport, TransportError};

/// One live transport-level connection.
///
/// The generation increases on every connect, so two handles to the same
/// camera from different connections never compare equal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionHandle {
    address: CameraAddress,
    generation: u64,
}

impl ConnectionHandle {
    #[must_use]
    pub fn address(&self) -> &CameraAddress {
        &self.address
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// A characteristic valid only for the connection it was discovered on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacteristicRef {
    connection: ConnectionHandle,
    characteristic: GattCharacteristic,
}

impl CharacteristicRef {
    pub(crate) fn new(connection: ConnectionHandle, characteristic: GattCharacteristic) -> Self {
        Self {
            connection,
            characteristic,
        }
    }

    #[must_use]
    pub fn connection(&self) -> &ConnectionHandle {
        &self.connection
    }

    #[must_use]
    pub fn uuid(&self) -> uuid::Uuid {
        self.characteristic.uuid
    }
}

/// Internal notifications about the connection slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// The slot was emptied.
    Released {
        address: CameraAddress,
        /// `true` when the transport reported the loss, `false` when a
        /// component asked for the disconnect.
        lost: bool,
    },
}

/// Connection-slot failures.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// Another camera holds the only connection slot.
    #[error("connection slot held by {active}")]
    Busy { active: CameraAddress },

    /// The operation needs a live connection and there is none.
    #[error("not connected")]
    NotConnected,

    /// The characteristic was discovered on a connection that has since
    /// been closed.
    #[error("characteristic belongs to a closed connection")]
    StaleCharacteristic,

    /// The operation did not complete in time.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The transport failed.
    #[error("transport failure")]
    Transport(#[from] TransportError),
}

#[derive(Debug, Default)]
struct Slot {
    current: Option<ConnectionHandle>,
    generation: u64,
}

/// Owner of the single connection to the camera.
pub struct CameraLink<T> {
    transport: T,
    slot: Mutex<Slot>,
    events: broadcast::Sender<LinkEvent>,
}

impl<T: GattTransport> CameraLink<T> {
    /// Wrap a transport.
    #[must_use]
    pub fn new(transport: T) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            transport,
            slot: Mutex::new(Slot::default()),
            events,
        }
    }

    /// Borrow the transport for operations that need no connection
    /// (scanning, listing connected peripherals).
    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Subscribe to slot notifications.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<LinkEvent> {
        self.events.subscribe()
    }

    /// The live connection, if any.
    pub async fn current(&self) -> Option<ConnectionHandle> {
        self.slot.lock().await.current.clone()
    }

    /// Whether a connection is live.
    pub async fn is_connected(&self) -> bool {
        self.slot.lock().await.current.is_some()
    }

    /// Connect to `address`, or return the live handle if it already
    /// designates `address`.
    ///
    /// A peripheral the host is already connected to (camera-initiated
    /// reconnect) is adopted without a new connect request.
    ///
    /// # Errors
    ///
    /// [`LinkError::Busy`] when another camera holds the slot,
    /// [`LinkError::Timeout`] when the connect does not finish within
    /// `timeout`, [`LinkError::Transport`] when the transport refuses.
    #[tracing::instrument(skip(self), fields(address = %address))]
    pub async fn connect(
        &self,
        address: &CameraAddress,
        timeout: Duration,
    ) -> Result<ConnectionHandle, LinkError> {
        let mut slot = self.slot.lock().await;
        if let Some(current) = &slot.current {
            if current.address == *address {
                tracing::debug!("reusing live connection");
                return Ok(current.clone());
            }
            return Err(LinkError::Busy {
                active: current.address.clone(),
            });
        }

        let already_connected = match self.transport.is_connected(address).await {
            Ok(connected) => connected,
            Err(err) => {
                tracing::debug!(%err, "could not query connection state, connecting anyway");
                false
            }
        };

        if already_connected {
            tracing::debug!("adopting connection opened by the host");
        } else {
            tokio::time::timeout(timeout, self.transport.connect(address))
                .await
                .map_err(|_| LinkError::Timeout(timeout))??;
        }

        slot.generation += 1;
        let handle = ConnectionHandle {
            address: address.clone(),
            generation: slot.generation,
        };
        slot.current = Some(handle.clone());
        tracing::info!(generation = handle.generation, "camera connected");
        Ok(handle)
    }

    /// Discover services on the live connection.
    ///
    /// # Errors
    ///
    /// [`LinkError::StaleCharacteristic`] when `handle` is not the live
    /// connection, [`LinkError::Transport`] when discovery fails.
    pub async fn discover_services(
        &self,
        handle: &ConnectionHandle,
    ) -> Result<Vec<GattService>, LinkError> {
        self.ensure_current(handle).await?;
        Ok(self.transport.discover_services(&handle.address).await?)
    }

    /// Write to a characteristic of the live connection.
    ///
    /// # Errors
    ///
    /// [`LinkError::StaleCharacteristic`] when the characteristic was
    /// discovered on another connection, [`LinkError::Transport`] when the
    /// write fails.
    pub async fn write(
        &self,
        target: &CharacteristicRef,
        data: &[u8],
        kind: WriteKind,
    ) -> Result<(), LinkError> {
        self.ensure_current(&target.connection).await?;
        self.transport
            .write(&target.connection.address, &target.characteristic, data, kind)
            .await?;
        Ok(())
    }

    /// Read a characteristic of the live connection.
    ///
    /// # Errors
    ///
    /// Same as [`write`](Self::write).
    pub async fn read(&self, target: &CharacteristicRef) -> Result<Vec<u8>, LinkError> {
        self.ensure_current(&target.connection).await?;
        Ok(self
            .transport
            .read(&target.connection.address, &target.characteristic)
            .await?)
    }

    /// Release the slot (if it holds `address`) and ask the transport to
    /// disconnect. Does not wait for confirmation.
    ///
    /// # Errors
    ///
    /// [`LinkError::Transport`] when the disconnect request fails. The slot
    /// is released regardless.
    #[tracing::instrument(skip(self), fields(address = %address))]
    pub async fn disconnect(&self, address: &CameraAddress) -> Result<(), LinkError> {
        let released = self.release(address).await;
        let result = self.transport.disconnect(address).await;
        if released {
            self.notify(address, false);
        }
        result.map_err(LinkError::from)
    }

    /// Like [`disconnect`](Self::disconnect), then wait until the transport
    /// confirms the peripheral is gone.
    ///
    /// # Errors
    ///
    /// [`LinkError::Timeout`] when no confirmation arrives within `timeout`,
    /// or the error of the disconnect request.
    pub async fn disconnect_confirmed(
        &self,
        address: &CameraAddress,
        timeout: Duration,
    ) -> Result<(), LinkError> {
        let mut changes = self.transport.connection_events();
        self.disconnect(address).await?;

        let confirmation = async {
            loop {
                if !self.transport.is_connected(address).await.unwrap_or(false) {
                    return;
                }
                match changes.recv().await {
                    Ok(change) if !change.connected && change.address == *address => return,
                    Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Err(broadcast::error::RecvError::Closed) => return,
                }
            }
        };

        tokio::time::timeout(timeout, confirmation)
            .await
            .map_err(|_| LinkError::Timeout(timeout))
    }

    /// Handle a loss observed on the transport. Returns whether the live
    /// connection was the one lost.
    ///
    /// Disconnect notifications arrive asynchronously, so one may belong to
    /// an earlier connection to the same camera. The slot is only released
    /// when the transport agrees the peripheral is gone.
    pub async fn connection_lost(&self, address: &CameraAddress) -> bool {
        let mut slot = self.slot.lock().await;
        let Some(current) = slot.current.as_ref().filter(|c| c.address == *address) else {
            return false;
        };
        if self.transport.is_connected(address).await.unwrap_or(false) {
            tracing::debug!(
                %address,
                generation = current.generation,
                "ignoring disconnect of an earlier connection"
            );
            return false;
        }
        slot.current = None;
        drop(slot);

        tracing::warn!(%address, "camera connection lost");
        self.notify(address, true);
        true
    }

    async fn release(&self, address: &CameraAddress) -> bool {
        let mut slot = self.slot.lock().await;
        if slot
            .current
            .as_ref()
            .is_some_and(|current| current.address == *address)
        {
            slot.current = None;
            true
        } else {
            false
        }
    }

    async fn ensure_current(&self, handle: &ConnectionHandle) -> Result<(), LinkError> {
        let slot = self.slot.lock().await;
        if slot.current.as_ref() == Some(handle) {
            Ok(())
        } else {
            Err(LinkError::StaleCharacteristic)
        }
    }

    fn notify(&self, address: &CameraAddress, lost: bool) {
        // no subscribers is fine
        let _ = self.events.send(LinkEvent::Released {
            address: address.clone(),
            lost,
        });
    }
}

impl<T: GattTransport + 'static> CameraLink<T> {
    /// Watch the transport's connection-state stream and release the slot
    /// when the live camera disconnects on its own.
    pub fn spawn_watcher(self: &Arc<Self>) -> JoinHandle<()> {
        let mut changes = self.transport.connection_events();
        let link = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(change) if !change.connected => {
                        link.connection_lost(&change.address).await;
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "connection watcher lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            tracing::debug!("connection watcher stopped");
        })
    }
}
