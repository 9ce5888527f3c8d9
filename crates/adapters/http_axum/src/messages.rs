//! [`MessageTransport`] carried over HTTP.
//!
//! The companion device POSTs payloads to `/api/messages/{path}` and listens
//! for replies on `/api/messages/{path}/stream`. Inbound payloads are queued
//! on the relay's command path until the relay asks for them, and any other
//! inbound path is refused. Outbound payloads are broadcast to whoever is
//! streaming at the time.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, broadcast, mpsc};

use shutterlink_app::ports::MessageTransport;
use shutterlink_app::services::command_relay::RelayPaths;
use shutterlink_domain::error::ShutterLinkError;

/// Why an inbound payload was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MessageError {
    #[error("message transport is closed")]
    Closed,

    /// Nothing reads from this path.
    #[error("no inbox for {0}")]
    UnknownPath(String),

    /// The relay is not keeping up with the companion device.
    #[error("inbox for {0} is full")]
    Full(String),
}

/// A payload sent by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub path: String,
    pub payload: Vec<u8>,
}

struct Inbox {
    sender: mpsc::Sender<Vec<u8>>,
    receiver: Arc<AsyncMutex<mpsc::Receiver<Vec<u8>>>>,
}

#[derive(Default)]
struct Inboxes {
    closed: bool,
    by_path: HashMap<String, Inbox>,
}

pub struct HttpMessageTransport {
    inboxes: Mutex<Inboxes>,
    outbound: broadcast::Sender<OutboundMessage>,
}

impl HttpMessageTransport {
    /// Accept inbound payloads on the command path of `paths` only.
    /// `capacity` bounds both the inbound queue and the outbound broadcast.
    #[must_use]
    pub fn new(capacity: usize, paths: &RelayPaths) -> Self {
        let (outbound, _) = broadcast::channel(capacity);
        let by_path = HashMap::from([(paths.command.clone(), new_inbox(capacity))]);
        Self {
            inboxes: Mutex::new(Inboxes {
                closed: false,
                by_path,
            }),
            outbound,
        }
    }

    fn inboxes(&self) -> MutexGuard<'_, Inboxes> {
        self.inboxes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn receiver(&self, path: &str) -> Option<Arc<AsyncMutex<mpsc::Receiver<Vec<u8>>>>> {
        let inboxes = self.inboxes();
        let inbox = inboxes.by_path.get(path);
        if inbox.is_none() && !inboxes.closed {
            tracing::warn!(path, "receiving on a path with no inbox");
        }
        inbox.map(|inbox| Arc::clone(&inbox.receiver))
    }

    /// Queue a payload received from the companion device.
    ///
    /// # Errors
    ///
    /// [`MessageError::Closed`] after [`close`](Self::close),
    /// [`MessageError::UnknownPath`] when `path` is not the command path,
    /// [`MessageError::Full`] when the queue is full.
    pub fn deliver(&self, path: &str, payload: Vec<u8>) -> Result<(), MessageError> {
        let inboxes = self.inboxes();
        if inboxes.closed {
            return Err(MessageError::Closed);
        }
        let Some(inbox) = inboxes.by_path.get(path) else {
            return Err(MessageError::UnknownPath(path.to_owned()));
        };
        inbox.sender.try_send(payload).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => MessageError::Full(path.to_owned()),
            mpsc::error::TrySendError::Closed(_) => MessageError::Closed,
        })?;
        tracing::debug!(path, "inbound message queued");
        Ok(())
    }

    /// Subscribe to everything the engine sends from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<OutboundMessage> {
        self.outbound.subscribe()
    }

    /// Refuse new payloads. Receivers drain what is queued, then see the
    /// end of the stream.
    pub fn close(&self) {
        let mut inboxes = self.inboxes();
        inboxes.closed = true;
        inboxes.by_path.clear();
    }
}

fn new_inbox(capacity: usize) -> Inbox {
    let (sender, receiver) = mpsc::channel(capacity);
    Inbox {
        sender,
        receiver: Arc::new(AsyncMutex::new(receiver)),
    }
}

impl MessageTransport for HttpMessageTransport {
    async fn send(&self, path: &str, payload: Vec<u8>) -> Result<(), ShutterLinkError> {
        // nobody streaming means the companion is gone; the reply is dropped
        if self
            .outbound
            .send(OutboundMessage {
                path: path.to_owned(),
                payload,
            })
            .is_err()
        {
            tracing::debug!(path, "no listener for outbound message");
        }
        Ok(())
    }

    async fn receive(&self, path: &str) -> Result<Option<Vec<u8>>, ShutterLinkError> {
        let Some(receiver) = self.receiver(path) else {
            return Ok(None);
        };
        let mut receiver = receiver.lock().await;
        Ok(receiver.recv().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport(capacity: usize) -> HttpMessageTransport {
        HttpMessageTransport::new(capacity, &RelayPaths::default())
    }

    #[tokio::test]
    async fn should_receive_payload_delivered_before_receive() {
        let transport = transport(4);
        transport.deliver("/shutter_command", b"one".to_vec()).unwrap();

        let payload = transport.receive("/shutter_command").await.unwrap();

        assert_eq!(payload.as_deref(), Some(&b"one"[..]));
    }

    #[tokio::test]
    async fn should_refuse_payload_on_path_nobody_reads() {
        let transport = transport(4);

        let err = transport.deliver("/other", b"noise".to_vec()).unwrap_err();

        assert_eq!(err, MessageError::UnknownPath("/other".to_owned()));
        assert!(!transport.inboxes().by_path.contains_key("/other"));
        assert_eq!(transport.inboxes().by_path.len(), 1);
    }

    #[tokio::test]
    async fn should_end_receive_on_path_without_inbox() {
        let transport = transport(4);

        assert_eq!(transport.receive("/other").await.unwrap(), None);
        assert!(!transport.inboxes().by_path.contains_key("/other"));
    }

    #[tokio::test]
    async fn should_refuse_payload_when_inbox_full() {
        let transport = transport(1);
        transport.deliver("/shutter_command", b"one".to_vec()).unwrap();

        let err = transport
            .deliver("/shutter_command", b"two".to_vec())
            .unwrap_err();

        assert!(matches!(err, MessageError::Full(_)));
    }

    #[tokio::test]
    async fn should_end_receive_after_close() {
        let transport = Arc::new(transport(4));
        let waiting = {
            let transport = Arc::clone(&transport);
            tokio::spawn(async move { transport.receive("/shutter_command").await })
        };
        tokio::task::yield_now().await;

        transport.close();

        assert_eq!(waiting.await.unwrap().unwrap(), None);
        assert_eq!(
            transport.deliver("/shutter_command", b"late".to_vec()),
            Err(MessageError::Closed)
        );
    }

    #[tokio::test]
    async fn should_broadcast_sent_payloads() {
        let transport = transport(4);
        let mut outbound = transport.subscribe();

        transport
            .send("/shutter_response", b"{}".to_vec())
            .await
            .unwrap();

        let message = outbound.recv().await.unwrap();
        assert_eq!(message.path, "/shutter_response");
        assert_eq!(message.payload, b"{}");
    }

    #[tokio::test]
    async fn should_accept_send_without_listener() {
        let transport = transport(4);
        assert!(transport.send("/shutter_response", Vec::new()).await.is_ok());
    }
}
