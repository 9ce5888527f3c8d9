//! # shutterlink-domain
//!
//! Pure domain model for the shutterlink BLE remote-shutter engine.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, timestamps
//! - Define **camera identities** (remembered camera, local device name)
//! - Define the **GATT protocol**: UUIDs, pairing payload, shutter bytes
//! - Define **session outcomes** and their user-visible status strings
//! - Define the **discovery mode** that keeps reconnection mechanisms exclusive
//! - Define **events** raised upward and **relay messages** exchanged with
//!   the companion device
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod camera;
pub mod discovery;
pub mod event;
pub mod protocol;
pub mod relay;
pub mod session;
