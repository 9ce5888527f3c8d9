//! Event bus port: publish/subscribe for camera events.

use std::future::Future;

use shutterlink_domain::error::ShutterLinkError;
use shutterlink_domain::event::CameraEvent;

/// Publishes camera events to interested subscribers.
pub trait EventPublisher {
    /// Publish an event to all current subscribers.
    fn publish(
        &self,
        event: CameraEvent,
    ) -> impl Future<Output = Result<(), ShutterLinkError>> + Send;
}

impl<T: EventPublisher + Send + Sync> EventPublisher for std::sync::Arc<T> {
    fn publish(
        &self,
        event: CameraEvent,
    ) -> impl Future<Output = Result<(), ShutterLinkError>> + Send {
        (**self).publish(event)
    }
}
