//! Companion-device relay messages.
//!
//! The watch sends a JSON object on [`COMMAND_PATH`]; the phone answers on
//! [`RESPONSE_PATH`] echoing the request `id`.
//!
//! ```json
//! {"action": "trigger_shutter", "source": "watch", "timestamp": 1718000000000, "id": "42"}
//! {"action": "status_response", "status": "shutter_success", "source": "phone", "timestamp": 1718000000950, "id": "42"}
//! ```

use serde::{Deserialize, Serialize};

use crate::time::now_millis;

/// Message path for inbound commands.
pub const COMMAND_PATH: &str = "/shutter_command";

/// Message path for outbound responses.
pub const RESPONSE_PATH: &str = "/shutter_response";

/// What the companion device asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelayAction {
    TriggerShutter,
    StatusUpdate,
    #[serde(other)]
    Unknown,
}

/// Inbound request from the companion device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayRequest {
    pub action: RelayAction,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub timestamp: i64,
    /// Opaque correlation id, echoed verbatim.
    #[serde(default)]
    pub id: serde_json::Value,
}

/// Outcome reported back to the companion device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelayStatus {
    ShutterSuccess,
    ShutterFailed,
    ShutterError,
    StatusAcknowledged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseAction {
    StatusResponse,
}

/// Outbound response to the companion device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayResponse {
    pub action: ResponseAction,
    pub status: RelayStatus,
    pub source: String,
    pub timestamp: i64,
    pub id: serde_json::Value,
}

impl RelayResponse {
    /// Answer `request` with `status`, stamped now.
    #[must_use]
    pub fn reply_to(request: &RelayRequest, status: RelayStatus) -> Self {
        Self {
            action: ResponseAction::StatusResponse,
            status,
            source: "phone".to_owned(),
            timestamp: now_millis(),
            id: request.id.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_parse_trigger_request_from_watch() {
        let request: RelayRequest = serde_json::from_str(
            r#"{"action":"trigger_shutter","source":"watch","timestamp":1718000000000,"id":"42"}"#,
        )
        .unwrap();
        assert_eq!(request.action, RelayAction::TriggerShutter);
        assert_eq!(request.source, "watch");
        assert_eq!(request.timestamp, 1_718_000_000_000);
        assert_eq!(request.id, serde_json::json!("42"));
    }

    #[test]
    fn should_map_unrecognised_action_to_unknown() {
        let request: RelayRequest =
            serde_json::from_str(r#"{"action":"zoom_in","id":7}"#).unwrap();
        assert_eq!(request.action, RelayAction::Unknown);
        assert_eq!(request.id, serde_json::json!(7));
    }

    #[test]
    fn should_serialize_reply_with_echoed_id() {
        let request: RelayRequest =
            serde_json::from_str(r#"{"action":"status_update","id":"abc"}"#).unwrap();
        let reply = RelayResponse::reply_to(&request, RelayStatus::StatusAcknowledged);
        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(json["action"], "status_response");
        assert_eq!(json["status"], "status_acknowledged");
        assert_eq!(json["source"], "phone");
        assert_eq!(json["id"], "abc");
        assert!(json["timestamp"].as_i64().unwrap() > 0);
    }
}
