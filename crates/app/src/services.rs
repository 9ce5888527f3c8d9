//! Application services: the session engine.
//!
//! Each service accepts port implementations via generic parameters
//! (constructor injection), keeping this layer decoupled from concrete
//! adapters. [`controller::CameraController`] wires them together.

pub mod auto_discovery;
pub mod command_relay;
pub mod connection_manager;
pub mod controller;
pub mod handshake;
pub mod identity_service;
pub mod link;
pub mod resolver;
pub mod shutter_session;
