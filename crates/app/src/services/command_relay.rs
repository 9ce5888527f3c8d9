//! Command relay: turns companion-device messages into shutter sessions
//! and reports the outcome back.

use shutterlink_domain::error::ShutterLinkError;
use shutterlink_domain::relay::{
    COMMAND_PATH, RESPONSE_PATH, RelayAction, RelayRequest, RelayResponse, RelayStatus,
};

use crate::ports::MessageTransport;
use crate::services::shutter_session::ShutterTrigger;

/// Paths the relay listens and answers on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayPaths {
    pub command: String,
    pub response: String,
}

impl Default for RelayPaths {
    fn default() -> Self {
        Self {
            command: COMMAND_PATH.to_owned(),
            response: RESPONSE_PATH.to_owned(),
        }
    }
}

pub struct CommandRelay<M, R> {
    transport: M,
    trigger: R,
    paths: RelayPaths,
}

impl<M: MessageTransport, R: ShutterTrigger> CommandRelay<M, R> {
    pub fn new(transport: M, trigger: R, paths: RelayPaths) -> Self {
        Self {
            transport,
            trigger,
            paths,
        }
    }

    /// Serve commands until the transport closes.
    ///
    /// # Errors
    ///
    /// Returns an error if receiving from the transport fails.
    pub async fn run(&self) -> Result<(), ShutterLinkError> {
        tracing::info!(path = %self.paths.command, "command relay listening");
        while let Some(payload) = self.transport.receive(&self.paths.command).await? {
            self.handle(&payload).await;
        }
        tracing::info!("command relay stopped, transport closed");
        Ok(())
    }

    /// Handle one inbound payload. Returns the status sent back, or `None`
    /// when the payload was not a request.
    pub async fn handle(&self, payload: &[u8]) -> Option<RelayStatus> {
        let request: RelayRequest = match serde_json::from_slice(payload) {
            Ok(request) => request,
            Err(err) => {
                tracing::warn!(%err, "dropping unparseable relay message");
                return None;
            }
        };
        tracing::info!(action = ?request.action, source = %request.source, "relay request");

        let status = match request.action {
            RelayAction::TriggerShutter => self.trigger.trigger().await.relay_status(),
            RelayAction::StatusUpdate => RelayStatus::StatusAcknowledged,
            RelayAction::Unknown => RelayStatus::ShutterError,
        };

        let response = RelayResponse::reply_to(&request, status);
        match serde_json::to_vec(&response) {
            Ok(bytes) => {
                if let Err(err) = self.transport.send(&self.paths.response, bytes).await {
                    tracing::warn!(%err, "could not send relay response");
                }
            }
            Err(err) => tracing::warn!(%err, "could not encode relay response"),
        }
        Some(status)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::testing::ChannelMessageTransport;
    use shutterlink_domain::id::SessionId;
    use shutterlink_domain::session::{SessionFailure, SessionReport};

    struct ScriptedTrigger {
        failure: Option<SessionFailure>,
        calls: AtomicUsize,
    }

    impl ScriptedTrigger {
        fn new(failure: Option<SessionFailure>) -> Self {
            Self {
                failure,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl ShutterTrigger for ScriptedTrigger {
        async fn trigger(&self) -> SessionReport {
            self.calls.fetch_add(1, Ordering::SeqCst);
            SessionReport {
                session_id: SessionId::new(),
                failure: self.failure,
                retried_authentication: false,
            }
        }
    }

    fn relay(
        failure: Option<SessionFailure>,
    ) -> (
        Arc<ChannelMessageTransport>,
        Arc<ScriptedTrigger>,
        CommandRelay<Arc<ChannelMessageTransport>, Arc<ScriptedTrigger>>,
    ) {
        let transport = Arc::new(ChannelMessageTransport::default());
        let trigger = Arc::new(ScriptedTrigger::new(failure));
        let relay = CommandRelay::new(
            Arc::clone(&transport),
            Arc::clone(&trigger),
            RelayPaths::default(),
        );
        (transport, trigger, relay)
    }

    fn sent_json(transport: &ChannelMessageTransport) -> Vec<(String, serde_json::Value)> {
        transport
            .sent()
            .into_iter()
            .map(|(path, bytes)| (path, serde_json::from_slice(&bytes).unwrap()))
            .collect()
    }

    #[tokio::test]
    async fn should_answer_successful_trigger() {
        let (transport, trigger, relay) = relay(None);

        let status = relay
            .handle(br#"{"action":"trigger_shutter","source":"watch","timestamp":1,"id":"42"}"#)
            .await;

        assert_eq!(status, Some(RelayStatus::ShutterSuccess));
        assert_eq!(trigger.calls.load(Ordering::SeqCst), 1);
        let sent = sent_json(&transport);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "/shutter_response");
        assert_eq!(sent[0].1["status"], "shutter_success");
        assert_eq!(sent[0].1["id"], "42");
        assert_eq!(sent[0].1["source"], "phone");
    }

    #[tokio::test]
    async fn should_answer_failed_trigger() {
        let (transport, _trigger, relay) = relay(Some(SessionFailure::DeviceNotFound));

        let status = relay.handle(br#"{"action":"trigger_shutter","id":1}"#).await;

        assert_eq!(status, Some(RelayStatus::ShutterFailed));
        assert_eq!(sent_json(&transport)[0].1["status"], "shutter_failed");
    }

    #[tokio::test]
    async fn should_acknowledge_status_update_without_triggering() {
        let (transport, trigger, relay) = relay(None);

        let status = relay.handle(br#"{"action":"status_update","id":"7"}"#).await;

        assert_eq!(status, Some(RelayStatus::StatusAcknowledged));
        assert_eq!(trigger.calls.load(Ordering::SeqCst), 0);
        assert_eq!(sent_json(&transport)[0].1["status"], "status_acknowledged");
    }

    #[tokio::test]
    async fn should_answer_unknown_action_with_error() {
        let (transport, trigger, relay) = relay(None);

        let status = relay.handle(br#"{"action":"zoom","id":"7"}"#).await;

        assert_eq!(status, Some(RelayStatus::ShutterError));
        assert_eq!(trigger.calls.load(Ordering::SeqCst), 0);
        assert_eq!(sent_json(&transport)[0].1["status"], "shutter_error");
    }

    #[tokio::test]
    async fn should_drop_unparseable_payload() {
        let (transport, trigger, relay) = relay(None);

        assert_eq!(relay.handle(b"not json").await, None);
        assert_eq!(trigger.calls.load(Ordering::SeqCst), 0);
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn should_serve_until_transport_closes() {
        let (transport, trigger, relay) = relay(None);
        transport.push("/shutter_command", br#"{"action":"trigger_shutter","id":"1"}"#);
        transport.push("/other", b"ignored");
        transport.push("/shutter_command", br#"{"action":"trigger_shutter","id":"2"}"#);
        transport.close();

        relay.run().await.unwrap();

        assert_eq!(trigger.calls.load(Ordering::SeqCst), 2);
        let ids: Vec<serde_json::Value> =
            sent_json(&transport).into_iter().map(|(_, v)| v["id"].clone()).collect();
        assert_eq!(ids, vec![serde_json::json!("1"), serde_json::json!("2")]);
    }
}
