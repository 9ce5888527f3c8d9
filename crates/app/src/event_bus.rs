//! Fan-out of [`CameraEvent`]s to in-process listeners such as the HTTP
//! event stream.

use tokio::sync::broadcast;

use shutterlink_domain::error::ShutterLinkError;
use shutterlink_domain::event::CameraEvent;

use crate::ports::EventPublisher;

/// Broadcasts every published [`CameraEvent`] to the listeners subscribed
/// at that moment. An event nobody listens to is dropped.
pub struct InProcessEventBus {
    sender: broadcast::Sender<CameraEvent>,
}

impl InProcessEventBus {
    /// `capacity` is how far a slow listener may fall behind before it
    /// starts missing events.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<CameraEvent> {
        self.sender.subscribe()
    }
}

impl EventPublisher for InProcessEventBus {
    async fn publish(&self, event: CameraEvent) -> Result<(), ShutterLinkError> {
        match self.sender.send(event) {
            Ok(listeners) => tracing::debug!(listeners, "camera event published"),
            Err(broadcast::error::SendError(event)) => {
                tracing::debug!(event_id = %event.id, "no listener for camera event");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shutterlink_domain::camera::{CameraAddress, CameraIdentity};
    use shutterlink_domain::event::CameraEventKind;

    fn controls_ready() -> CameraEvent {
        CameraEvent::controls_ready(CameraIdentity::new(
            CameraAddress::parse("AA:BB:CC:DD:EE:FF").unwrap(),
            Some("EOS R6"),
        ))
    }

    #[tokio::test]
    async fn should_hand_controls_ready_to_listener() {
        let bus = InProcessEventBus::new(4);
        let mut listener = bus.subscribe();

        bus.publish(controls_ready()).await.unwrap();

        let event = listener.recv().await.unwrap();
        assert!(matches!(
            event.kind,
            CameraEventKind::ControlsReady { camera } if camera.display_name == "EOS R6"
        ));
    }

    #[tokio::test]
    async fn should_drop_event_without_listener() {
        let bus = InProcessEventBus::new(4);

        assert!(bus.publish(controls_ready()).await.is_ok());
        assert!(bus.subscribe().try_recv().is_err());
    }

    #[tokio::test]
    async fn should_report_lag_to_slow_listener() {
        let bus = InProcessEventBus::new(1);
        let mut listener = bus.subscribe();

        bus.publish(controls_ready()).await.unwrap();
        let last = controls_ready();
        let last_id = last.id;
        bus.publish(last).await.unwrap();

        assert!(matches!(
            listener.recv().await,
            Err(broadcast::error::RecvError::Lagged(1))
        ));
        assert_eq!(listener.recv().await.unwrap().id, last_id);
    }
}
