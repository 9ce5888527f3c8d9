//! Port definitions: traits that adapters implement.
//!
//! Ports are the boundaries between the session engine and the outside world.
//! They are defined here (in `app`) so that both the service layer and the
//! adapter layer can depend on them without creating circular dependencies.

pub mod event_bus;
pub mod gatt;
pub mod message;
pub mod preferences;

pub use event_bus::EventPublisher;
pub use gatt::{
    CharacteristicProperties, ConnectionStateChange, GattCharacteristic, GattService,
    GattTransport, PeripheralInfo, TransportError,
};
pub use message::MessageTransport;
pub use preferences::PreferenceStore;
