//! btleplug-backed [`GattTransport`].

use std::time::Duration;

use btleplug::api::{Central, CentralEvent, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, Peripheral, PeripheralId};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt as _;

use shutterlink_app::ports::{
    ConnectionStateChange, GattCharacteristic, GattService, GattTransport, PeripheralInfo,
    TransportError,
};
use shutterlink_domain::camera::CameraAddress;
use shutterlink_domain::protocol::WriteKind;

use crate::config::BleConfig;
use crate::error::BleError;
use crate::mapping;

/// GATT transport over one host BLE adapter.
pub struct BtleplugTransport {
    central: Adapter,
    events: broadcast::Sender<ConnectionStateChange>,
    forwarder: JoinHandle<()>,
}

impl BtleplugTransport {
    /// Open the configured host adapter and start forwarding its
    /// connection events.
    ///
    /// # Errors
    ///
    /// Returns [`BleError::NotAvailable`] when there is no adapter at the
    /// configured index, or [`BleError::Backend`] when the BLE stack fails.
    pub async fn new(config: &BleConfig) -> Result<Self, BleError> {
        let manager = Manager::new().await?;
        let central = manager
            .adapters()
            .await?
            .into_iter()
            .nth(config.adapter_index)
            .ok_or(BleError::NotAvailable {
                index: config.adapter_index,
            })?;

        let (events, _) = broadcast::channel(config.event_capacity);
        let forwarder = spawn_forwarder(central.clone(), events.clone()).await?;

        tracing::info!(adapter_index = config.adapter_index, "BLE adapter opened");
        Ok(Self {
            central,
            events,
            forwarder,
        })
    }

    /// Human-readable description of the host adapter, usually including
    /// its address.
    ///
    /// # Errors
    ///
    /// Returns [`BleError::Backend`] when the BLE stack fails.
    pub async fn adapter_info(&self) -> Result<String, BleError> {
        Ok(self.central.adapter_info().await?)
    }

    async fn find(&self, address: &CameraAddress) -> Result<Option<Peripheral>, BleError> {
        let peripherals = self.central.peripherals().await?;
        Ok(peripherals
            .into_iter()
            .find(|p| address.matches(&p.address().to_string())))
    }

    async fn require(&self, address: &CameraAddress) -> Result<Peripheral, TransportError> {
        self.find(address)
            .await?
            .ok_or_else(|| TransportError::PeripheralNotFound(address.clone()))
    }

    async fn info(peripheral: &Peripheral) -> Option<PeripheralInfo> {
        let address = mapping::address(peripheral.address()).ok()?;
        let name = match peripheral.properties().await {
            Ok(Some(props)) => props.local_name,
            Ok(None) => None,
            Err(err) => {
                tracing::trace!(%err, "could not read peripheral properties");
                None
            }
        };
        Some(PeripheralInfo { address, name })
    }

    async fn scan_inner(
        &self,
        address: &CameraAddress,
        window: Duration,
    ) -> Result<Option<PeripheralInfo>, BleError> {
        let mut events = self.central.events().await?;
        self.central.start_scan(ScanFilter::default()).await?;

        let deadline = tokio::time::Instant::now() + window;
        while tokio::time::Instant::now() < deadline {
            let remaining = deadline - tokio::time::Instant::now();
            match tokio::time::timeout(remaining, events.next()).await {
                Ok(Some(
                    CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id),
                )) => {
                    let Ok(peripheral) = self.central.peripheral(&id).await else {
                        continue;
                    };
                    if !address.matches(&peripheral.address().to_string()) {
                        continue;
                    }
                    if let Some(info) = Self::info(&peripheral).await {
                        tracing::debug!(%address, name = ?info.name, "camera seen");
                        return Ok(Some(info));
                    }
                }
                Ok(Some(_)) => {}
                Ok(None) | Err(_) => break,
            }
        }
        Ok(None)
    }
}

impl Drop for BtleplugTransport {
    fn drop(&mut self) {
        self.forwarder.abort();
    }
}

async fn spawn_forwarder(
    central: Adapter,
    sender: broadcast::Sender<ConnectionStateChange>,
) -> Result<JoinHandle<()>, BleError> {
    let mut events = central.events().await?;
    Ok(tokio::spawn(async move {
        while let Some(event) = events.next().await {
            let (id, connected) = match event {
                CentralEvent::DeviceConnected(id) => (id, true),
                CentralEvent::DeviceDisconnected(id) => (id, false),
                _ => continue,
            };
            let Some(address) = resolve_address(&central, &id).await else {
                continue;
            };
            tracing::debug!(%address, connected, "BLE connection state changed");
            // nobody listening is fine
            let _ = sender.send(ConnectionStateChange { address, connected });
        }
        tracing::debug!("BLE event stream ended");
    }))
}

async fn resolve_address(central: &Adapter, id: &PeripheralId) -> Option<CameraAddress> {
    let peripheral = central.peripheral(id).await.ok()?;
    mapping::address(peripheral.address()).ok()
}

impl GattTransport for BtleplugTransport {
    async fn connected_peripherals(&self) -> Result<Vec<PeripheralInfo>, TransportError> {
        let peripherals = self.central.peripherals().await.map_err(BleError::from)?;
        let mut connected = Vec::new();
        for peripheral in &peripherals {
            if !peripheral.is_connected().await.unwrap_or(false) {
                continue;
            }
            if let Some(info) = Self::info(peripheral).await {
                connected.push(info);
            }
        }
        Ok(connected)
    }

    async fn scan_for(
        &self,
        address: &CameraAddress,
        window: Duration,
    ) -> Result<Option<PeripheralInfo>, TransportError> {
        let result = self.scan_inner(address, window).await;
        if let Err(err) = self.central.stop_scan().await {
            tracing::warn!(%err, "failed to stop BLE scan");
        }
        Ok(result?)
    }

    async fn stop_scan(&self) -> Result<(), TransportError> {
        self.central.stop_scan().await.map_err(BleError::from)?;
        Ok(())
    }

    async fn is_connected(&self, address: &CameraAddress) -> Result<bool, TransportError> {
        match self.find(address).await? {
            Some(peripheral) => Ok(peripheral.is_connected().await.map_err(BleError::from)?),
            None => Ok(false),
        }
    }

    async fn connect(&self, address: &CameraAddress) -> Result<(), TransportError> {
        let peripheral = self.require(address).await?;
        peripheral.connect().await.map_err(BleError::from)?;
        Ok(())
    }

    async fn disconnect(&self, address: &CameraAddress) -> Result<(), TransportError> {
        let Some(peripheral) = self.find(address).await? else {
            return Ok(());
        };
        peripheral.disconnect().await.map_err(BleError::from)?;
        Ok(())
    }

    async fn discover_services(
        &self,
        address: &CameraAddress,
    ) -> Result<Vec<GattService>, TransportError> {
        let peripheral = self.require(address).await?;
        peripheral
            .discover_services()
            .await
            .map_err(BleError::from)?;
        Ok(peripheral.services().iter().map(mapping::service).collect())
    }

    async fn write(
        &self,
        address: &CameraAddress,
        characteristic: &GattCharacteristic,
        data: &[u8],
        kind: WriteKind,
    ) -> Result<(), TransportError> {
        let peripheral = self.require(address).await?;
        let target = find_characteristic(&peripheral, characteristic)?;
        peripheral
            .write(&target, data, mapping::write_type(kind))
            .await
            .map_err(BleError::from)?;
        Ok(())
    }

    async fn read(
        &self,
        address: &CameraAddress,
        characteristic: &GattCharacteristic,
    ) -> Result<Vec<u8>, TransportError> {
        let peripheral = self.require(address).await?;
        let target = find_characteristic(&peripheral, characteristic)?;
        Ok(peripheral.read(&target).await.map_err(BleError::from)?)
    }

    fn connection_events(&self) -> broadcast::Receiver<ConnectionStateChange> {
        self.events.subscribe()
    }
}

/// Look the characteristic up on the peripheral's current service table.
fn find_characteristic(
    peripheral: &Peripheral,
    characteristic: &GattCharacteristic,
) -> Result<btleplug::api::Characteristic, TransportError> {
    peripheral
        .characteristics()
        .into_iter()
        .find(|c| c.uuid == characteristic.uuid && c.service_uuid == characteristic.service_uuid)
        .ok_or(TransportError::CharacteristicNotFound(characteristic.uuid))
}
