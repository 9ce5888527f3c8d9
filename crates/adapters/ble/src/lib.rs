//! # shutterlink-adapter-ble
//!
//! [`GattTransport`](shutterlink_app::ports::GattTransport) implementation
//! over [`btleplug`].
//!
//! ## How it works
//!
//! The transport picks one host adapter at startup and names peripherals by
//! their Bluetooth address. Every operation looks the peripheral up in the
//! adapter's cache, so a peripheral must have been seen by a scan (or be
//! connected already) before it can be connected to.
//!
//! A background task forwards the adapter's `DeviceConnected` and
//! `DeviceDisconnected` events as
//! [`ConnectionStateChange`](shutterlink_app::ports::ConnectionStateChange)s.
//!
//! ## Dependency rule
//!
//! Same as other adapters: depends on `shutterlink-app` and `shutterlink-domain`.

mod config;
mod error;
mod mapping;
mod transport;

pub use config::BleConfig;
pub use error::BleError;
pub use transport::BtleplugTransport;
