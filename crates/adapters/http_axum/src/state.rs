//! Shared application state for axum handlers.

use std::sync::Arc;

use shutterlink_app::event_bus::InProcessEventBus;
use shutterlink_app::services::controller::CameraController;

use crate::messages::HttpMessageTransport;

/// Application state shared across all axum handlers.
///
/// Generic over the controller's transport, preference store and event
/// publisher to avoid dynamic dispatch. `Clone` is implemented manually so
/// the underlying types themselves do not need to be `Clone`.
pub struct AppState<T, S, P> {
    pub controller: Arc<CameraController<T, S, P>>,
    /// Source of the `/api/events/stream` feed.
    pub event_bus: Arc<InProcessEventBus>,
    /// Inbound and outbound relay messages.
    pub messages: Arc<HttpMessageTransport>,
}

impl<T, S, P> Clone for AppState<T, S, P> {
    fn clone(&self) -> Self {
        Self {
            controller: Arc::clone(&self.controller),
            event_bus: Arc::clone(&self.event_bus),
            messages: Arc::clone(&self.messages),
        }
    }
}

impl<T, S, P> AppState<T, S, P> {
    pub fn new(
        controller: Arc<CameraController<T, S, P>>,
        event_bus: Arc<InProcessEventBus>,
        messages: Arc<HttpMessageTransport>,
    ) -> Self {
        Self {
            controller,
            event_bus,
            messages,
        }
    }
}
