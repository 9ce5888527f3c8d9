//! # shutterlink-app
//!
//! Application layer: the BLE session engine and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement:
//!   - `GattTransport`: scan, connect, discover, read and write a peripheral
//!   - `PreferenceStore`: key/value persistence of identities
//!   - `MessageTransport`: path-addressed messages to/from the companion device
//!   - `EventPublisher`: events raised to the presentation layer
//! - Implement the **session engine** on top of them:
//!   - `CameraLink`: the single owned connection context
//!   - `ShutterSession`: connect, authenticate, trigger, disconnect per shot
//!   - `ConnectionManager` / `AutoDiscovery`: the stay-paired connection
//!   - `CameraController`: coordinates all of the above
//!   - `CommandRelay`: companion-device commands into shutter sessions
//! - Provide **in-process infrastructure** (event bus) that doesn't need IO
//!
//! ## Dependency rule
//! Depends on `shutterlink-domain` only (plus `tokio` for sync and timers).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod config;
pub mod event_bus;
pub mod ports;
pub mod services;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;
