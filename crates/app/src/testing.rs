//! In-memory implementations of the ports, for tests.
//!
//! [`FakeGatt`] plays a camera exposing the remote-shutter service. Failures
//! are scripted per characteristic and every transport call is recorded
//! together with the (possibly paused) tokio clock, so tests can assert both
//! the byte sequence and the delays between writes.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{Mutex as AsyncMutex, broadcast, mpsc};
use tokio::time::Instant;

use shutterlink_domain::camera::CameraAddress;
use shutterlink_domain::error::ShutterLinkError;
use shutterlink_domain::protocol::{PAIRING_CHAR, SERVICE_UUID, SHUTTER_CHAR, WriteKind, device_info};

use crate::ports::{
    CharacteristicProperties, ConnectionStateChange, GattCharacteristic, GattService,
    GattTransport, MessageTransport, PeripheralInfo, PreferenceStore, TransportError,
};
use crate::ports::preferences::keys;

/// Address of the camera every fake knows about.
///
/// # Panics
///
/// Never; the literal is a valid address.
#[must_use]
pub fn camera_address() -> CameraAddress {
    CameraAddress::parse("AA:BB:CC:DD:EE:FF").expect("valid literal address")
}

/// One recorded transport call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ConnectedPeripherals,
    Scan(CameraAddress),
    StopScan,
    Connect(CameraAddress),
    Disconnect(CameraAddress),
    Discover(CameraAddress),
    Write(RecordedWrite),
    Read(uuid::Uuid),
}

/// A write as seen by the fake camera.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedWrite {
    pub characteristic: uuid::Uuid,
    pub data: Vec<u8>,
    pub kind: WriteKind,
    pub at: Instant,
}

#[derive(Debug, Default)]
struct GattState {
    services: Vec<GattService>,
    advertising: Vec<PeripheralInfo>,
    host_connected: HashSet<CameraAddress>,
    hang_connects: bool,
    fail_connects: bool,
    fail_discovery: bool,
    ignore_disconnects: bool,
    write_failures: HashMap<uuid::Uuid, usize>,
    values: HashMap<uuid::Uuid, Vec<u8>>,
    calls: Vec<Call>,
}

/// Scripted GATT transport.
pub struct FakeGatt {
    state: Mutex<GattState>,
    events: broadcast::Sender<ConnectionStateChange>,
}

impl Default for FakeGatt {
    fn default() -> Self {
        let (events, _) = broadcast::channel(32);
        Self {
            state: Mutex::new(GattState::default()),
            events,
        }
    }
}

impl FakeGatt {
    /// A camera that exposes the remote-shutter service but is not
    /// advertising yet.
    #[must_use]
    pub fn with_camera() -> Self {
        let gatt = Self::default();
        gatt.set_services(camera_services());
        gatt
    }

    /// A camera that exposes the remote-shutter service and advertises
    /// under [`camera_address`].
    #[must_use]
    pub fn advertising_camera() -> Self {
        let gatt = Self::with_camera();
        gatt.advertise(&camera_address(), Some("EOS R6"));
        gatt
    }

    /// The shutter characteristic as the fake reports it.
    #[must_use]
    pub fn shutter_characteristic() -> GattCharacteristic {
        writable(SHUTTER_CHAR, SERVICE_UUID)
    }

    fn state(&self) -> MutexGuard<'_, GattState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_services(&self, services: Vec<GattService>) {
        self.state().services = services;
    }

    pub fn advertise(&self, address: &CameraAddress, name: Option<&str>) {
        self.state().advertising.push(PeripheralInfo {
            address: address.clone(),
            name: name.map(str::to_owned),
        });
    }

    pub fn stop_advertising(&self) {
        self.state().advertising.clear();
    }

    /// Mark `address` as connected at the host level without going through
    /// [`GattTransport::connect`], like a camera-initiated reconnect.
    pub fn set_host_connected(&self, address: &CameraAddress) {
        self.state().host_connected.insert(address.clone());
    }

    /// Make every connect attempt hang forever.
    pub fn hang_connects(&self) {
        self.state().hang_connects = true;
    }

    pub fn fail_connects(&self) {
        self.state().fail_connects = true;
    }

    pub fn fail_discovery(&self) {
        self.state().fail_discovery = true;
    }

    /// Accept disconnect requests without ever dropping the peripheral.
    pub fn ignore_disconnects(&self) {
        self.state().ignore_disconnects = true;
    }

    /// Fail the next `times` writes to `characteristic`.
    pub fn fail_writes(&self, characteristic: uuid::Uuid, times: usize) {
        self.state().write_failures.insert(characteristic, times);
    }

    pub fn set_value(&self, characteristic: uuid::Uuid, value: &[u8]) {
        self.state().values.insert(characteristic, value.to_vec());
    }

    /// Simulate the camera going away.
    pub fn drop_connection(&self, address: &CameraAddress) {
        self.state().host_connected.remove(address);
        let _ = self.events.send(ConnectionStateChange {
            address: address.clone(),
            connected: false,
        });
    }

    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    /// Number of recorded calls matching `predicate`.
    #[must_use]
    pub fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.state().calls.iter().filter(|call| predicate(call)).count()
    }

    /// Every successful write to `characteristic`, in order.
    #[must_use]
    pub fn writes_to(&self, characteristic: uuid::Uuid) -> Vec<RecordedWrite> {
        self.state()
            .calls
            .iter()
            .filter_map(|call| match call {
                Call::Write(write) if write.characteristic == characteristic => {
                    Some(write.clone())
                }
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.state().calls.push(call);
    }
}

impl GattTransport for FakeGatt {
    async fn connected_peripherals(&self) -> Result<Vec<PeripheralInfo>, TransportError> {
        let mut state = self.state();
        state.calls.push(Call::ConnectedPeripherals);
        Ok(state
            .host_connected
            .iter()
            .map(|address| PeripheralInfo {
                address: address.clone(),
                name: None,
            })
            .collect())
    }

    async fn scan_for(
        &self,
        address: &CameraAddress,
        window: Duration,
    ) -> Result<Option<PeripheralInfo>, TransportError> {
        let found = {
            let mut state = self.state();
            state.calls.push(Call::Scan(address.clone()));
            state
                .advertising
                .iter()
                .find(|peripheral| peripheral.address == *address)
                .cloned()
        };
        if found.is_none() {
            tokio::time::sleep(window).await;
        }
        self.record(Call::StopScan);
        Ok(found)
    }

    async fn stop_scan(&self) -> Result<(), TransportError> {
        self.record(Call::StopScan);
        Ok(())
    }

    async fn is_connected(&self, address: &CameraAddress) -> Result<bool, TransportError> {
        Ok(self.state().host_connected.contains(address))
    }

    async fn connect(&self, address: &CameraAddress) -> Result<(), TransportError> {
        let (hang, fail) = {
            let mut state = self.state();
            state.calls.push(Call::Connect(address.clone()));
            (state.hang_connects, state.fail_connects)
        };
        if hang {
            std::future::pending::<()>().await;
        }
        if fail {
            return Err(TransportError::PeripheralNotFound(address.clone()));
        }
        self.state().host_connected.insert(address.clone());
        let _ = self.events.send(ConnectionStateChange {
            address: address.clone(),
            connected: true,
        });
        Ok(())
    }

    async fn disconnect(&self, address: &CameraAddress) -> Result<(), TransportError> {
        let dropped = {
            let mut state = self.state();
            state.calls.push(Call::Disconnect(address.clone()));
            !state.ignore_disconnects && state.host_connected.remove(address)
        };
        if dropped {
            let _ = self.events.send(ConnectionStateChange {
                address: address.clone(),
                connected: false,
            });
        }
        Ok(())
    }

    async fn discover_services(
        &self,
        address: &CameraAddress,
    ) -> Result<Vec<GattService>, TransportError> {
        let mut state = self.state();
        state.calls.push(Call::Discover(address.clone()));
        if state.fail_discovery {
            return Err(TransportError::PeripheralNotFound(address.clone()));
        }
        Ok(state.services.clone())
    }

    async fn write(
        &self,
        _address: &CameraAddress,
        characteristic: &GattCharacteristic,
        data: &[u8],
        kind: WriteKind,
    ) -> Result<(), TransportError> {
        let mut state = self.state();
        if let Some(remaining) = state.write_failures.get_mut(&characteristic.uuid) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(TransportError::Backend("write rejected".into()));
            }
        }
        state.calls.push(Call::Write(RecordedWrite {
            characteristic: characteristic.uuid,
            data: data.to_vec(),
            kind,
            at: Instant::now(),
        }));
        Ok(())
    }

    async fn read(
        &self,
        _address: &CameraAddress,
        characteristic: &GattCharacteristic,
    ) -> Result<Vec<u8>, TransportError> {
        let mut state = self.state();
        state.calls.push(Call::Read(characteristic.uuid));
        state
            .values
            .get(&characteristic.uuid)
            .cloned()
            .ok_or(TransportError::CharacteristicNotFound(characteristic.uuid))
    }

    fn connection_events(&self) -> broadcast::Receiver<ConnectionStateChange> {
        self.events.subscribe()
    }
}

fn writable(uuid: uuid::Uuid, service_uuid: uuid::Uuid) -> GattCharacteristic {
    GattCharacteristic {
        uuid,
        service_uuid,
        properties: CharacteristicProperties {
            write: true,
            write_without_response: true,
            ..CharacteristicProperties::default()
        },
    }
}

fn readable(uuid: uuid::Uuid, service_uuid: uuid::Uuid) -> GattCharacteristic {
    GattCharacteristic {
        uuid,
        service_uuid,
        properties: CharacteristicProperties {
            read: true,
            ..CharacteristicProperties::default()
        },
    }
}

/// Services of a camera implementing the remote-shutter protocol, plus the
/// standard Device Information service.
#[must_use]
pub fn camera_services() -> Vec<GattService> {
    let device_information = uuid::Uuid::from_u128(0x0000_180a_0000_1000_8000_0080_5f9b_34fb);
    vec![
        GattService {
            uuid: device_information,
            characteristics: vec![
                readable(device_info::MANUFACTURER, device_information),
                readable(device_info::MODEL, device_information),
            ],
        },
        GattService {
            uuid: SERVICE_UUID,
            characteristics: vec![
                writable(PAIRING_CHAR, SERVICE_UUID),
                writable(SHUTTER_CHAR, SERVICE_UUID),
            ],
        },
    ]
}

/// [`PreferenceStore`] over a `HashMap`.
#[derive(Debug, Default)]
pub struct InMemoryPreferenceStore {
    values: Mutex<HashMap<String, String>>,
}

impl InMemoryPreferenceStore {
    /// A store that already remembers `camera`.
    #[must_use]
    pub fn remembering(address: &CameraAddress, name: &str) -> Self {
        let store = Self::default();
        {
            let mut values = store.values();
            values.insert(keys::CAMERA_ADDRESS.to_owned(), address.to_string());
            values.insert(keys::CAMERA_NAME.to_owned(), name.to_owned());
        }
        store
    }

    fn values(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.values.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn value(&self, key: &str) -> Option<String> {
        self.values().get(key).cloned()
    }

    pub fn insert(&self, key: &str, value: &str) {
        self.values().insert(key.to_owned(), value.to_owned());
    }
}

impl PreferenceStore for InMemoryPreferenceStore {
    async fn get(&self, key: &str) -> Result<Option<String>, ShutterLinkError> {
        Ok(self.value(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), ShutterLinkError> {
        self.insert(key, value);
        Ok(())
    }
}

/// [`MessageTransport`] backed by channels.
///
/// Tests push inbound payloads with [`push`](Self::push) and inspect what
/// the engine sent with [`sent`](Self::sent).
pub struct ChannelMessageTransport {
    inbound_tx: Mutex<Option<mpsc::UnboundedSender<(String, Vec<u8>)>>>,
    inbound_rx: AsyncMutex<mpsc::UnboundedReceiver<(String, Vec<u8>)>>,
    pending: AsyncMutex<VecDeque<(String, Vec<u8>)>>,
    sent: Mutex<Vec<(String, Vec<u8>)>>,
}

impl Default for ChannelMessageTransport {
    fn default() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            inbound_tx: Mutex::new(Some(tx)),
            inbound_rx: AsyncMutex::new(rx),
            pending: AsyncMutex::new(VecDeque::new()),
            sent: Mutex::new(Vec::new()),
        }
    }
}

impl ChannelMessageTransport {
    /// Deliver `payload` on `path` as if the companion device sent it.
    pub fn push(&self, path: &str, payload: &[u8]) {
        if let Some(tx) = self
            .inbound_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            let _ = tx.send((path.to_owned(), payload.to_vec()));
        }
    }

    /// Close the inbound side; pending payloads are still delivered.
    pub fn close(&self) {
        self.inbound_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    #[must_use]
    pub fn sent(&self) -> Vec<(String, Vec<u8>)> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl MessageTransport for ChannelMessageTransport {
    async fn send(&self, path: &str, payload: Vec<u8>) -> Result<(), ShutterLinkError> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((path.to_owned(), payload));
        Ok(())
    }

    async fn receive(&self, path: &str) -> Result<Option<Vec<u8>>, ShutterLinkError> {
        let mut pending = self.pending.lock().await;
        if let Some(index) = pending.iter().position(|(p, _)| p == path) {
            return Ok(pending.remove(index).map(|(_, payload)| payload));
        }
        let mut rx = self.inbound_rx.lock().await;
        while let Some((p, payload)) = rx.recv().await {
            if p == path {
                return Ok(Some(payload));
            }
            pending.push_back((p, payload));
        }
        Ok(None)
    }
}
