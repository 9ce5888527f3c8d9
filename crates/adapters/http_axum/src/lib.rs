//! # shutterlink-adapter-http-axum
//!
//! HTTP adapter built on [axum](https://docs.rs/axum).
//!
//! ## Responsibilities
//! - Serve a small **JSON API** over the camera controller
//!   (`/api/status`, `/api/shutter`, `/api/pair`, `/api/disconnect`)
//! - Stream camera events as **Server-Sent Events** (`/api/events/stream`)
//! - Carry the companion relay: [`HttpMessageTransport`] implements the
//!   `MessageTransport` port on top of `POST /api/messages/{path}` and
//!   `GET /api/messages/{path}/stream`
//!
//! ## Dependency rule
//! Depends on `shutterlink-app` (for port traits and services) and
//! `shutterlink-domain` (for domain types used in request/response mapping).
//! Never leaks axum types into the domain.

pub mod api;
mod error;
pub mod messages;
pub mod router;
pub mod state;

pub use error::ApiError;
pub use messages::HttpMessageTransport;
