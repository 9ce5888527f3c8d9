//! Message transport port: path-addressed byte messages exchanged with the
//! companion device.
//!
//! Framing and delivery guarantees belong to the implementation.

use std::future::Future;
use std::sync::Arc;

use shutterlink_domain::error::ShutterLinkError;

/// Send and receive opaque payloads on named paths.
pub trait MessageTransport: Send + Sync {
    /// Send `payload` on `path`.
    fn send(
        &self,
        path: &str,
        payload: Vec<u8>,
    ) -> impl Future<Output = Result<(), ShutterLinkError>> + Send;

    /// Wait for the next payload on `path`. `None` once the transport is
    /// closed.
    fn receive(
        &self,
        path: &str,
    ) -> impl Future<Output = Result<Option<Vec<u8>>, ShutterLinkError>> + Send;
}

impl<T: MessageTransport> MessageTransport for Arc<T> {
    fn send(
        &self,
        path: &str,
        payload: Vec<u8>,
    ) -> impl Future<Output = Result<(), ShutterLinkError>> + Send {
        (**self).send(path, payload)
    }

    fn receive(
        &self,
        path: &str,
    ) -> impl Future<Output = Result<Option<Vec<u8>>, ShutterLinkError>> + Send {
        (**self).receive(path)
    }
}
