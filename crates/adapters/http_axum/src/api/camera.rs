//! JSON handlers driving the camera controller.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use shutterlink_app::ports::{EventPublisher, GattTransport, PreferenceStore};
use shutterlink_app::services::controller::ControllerStatus;
use shutterlink_domain::camera::{CameraAddress, CameraIdentity};
use shutterlink_domain::session::SessionReport;

use crate::error::ApiError;
use crate::state::AppState;

/// Request body for pairing a camera.
#[derive(Deserialize)]
pub struct PairRequest {
    pub address: String,
}

/// Outcome of a manual shutter press.
#[derive(Serialize)]
pub struct ShutterResponse {
    pub success: bool,
    pub status: &'static str,
    #[serde(flatten)]
    pub report: SessionReport,
}

impl From<SessionReport> for ShutterResponse {
    fn from(report: SessionReport) -> Self {
        Self {
            success: report.succeeded(),
            status: report.status_text(),
            report,
        }
    }
}

/// Possible responses from the disconnect endpoint.
pub enum DisconnectResponse {
    NoContent,
}

impl IntoResponse for DisconnectResponse {
    fn into_response(self) -> Response {
        match self {
            Self::NoContent => StatusCode::NO_CONTENT.into_response(),
        }
    }
}

/// `GET /api/status`
pub async fn status<T, S, P>(State(state): State<AppState<T, S, P>>) -> Json<ControllerStatus>
where
    T: GattTransport + 'static,
    S: PreferenceStore + 'static,
    P: EventPublisher + Send + Sync + 'static,
{
    Json(state.controller.status().await)
}

/// `POST /api/shutter`
///
/// Always `200 OK`: a failed shot is a valid outcome, reported in the body.
pub async fn shutter<T, S, P>(State(state): State<AppState<T, S, P>>) -> Json<ShutterResponse>
where
    T: GattTransport + 'static,
    S: PreferenceStore + 'static,
    P: EventPublisher + Send + Sync + 'static,
{
    let report = state.controller.run_session().await;
    Json(ShutterResponse::from(report))
}

/// `POST /api/pair`
pub async fn pair<T, S, P>(
    State(state): State<AppState<T, S, P>>,
    Json(req): Json<PairRequest>,
) -> Result<Json<CameraIdentity>, ApiError>
where
    T: GattTransport + 'static,
    S: PreferenceStore + 'static,
    P: EventPublisher + Send + Sync + 'static,
{
    let address = CameraAddress::parse(&req.address)?;
    let camera = state.controller.pair_address(&address).await?;
    Ok(Json(camera))
}

/// `POST /api/disconnect`
pub async fn disconnect<T, S, P>(
    State(state): State<AppState<T, S, P>>,
) -> Result<DisconnectResponse, ApiError>
where
    T: GattTransport + 'static,
    S: PreferenceStore + 'static,
    P: EventPublisher + Send + Sync + 'static,
{
    state.controller.disconnect().await?;
    Ok(DisconnectResponse::NoContent)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::Router;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use shutterlink_app::config::EngineConfig;
    use shutterlink_app::event_bus::InProcessEventBus;
    use shutterlink_app::services::controller::CameraController;
    use shutterlink_app::testing::{FakeGatt, InMemoryPreferenceStore, camera_address};
    use shutterlink_domain::camera::LocalIdentity;

    use shutterlink_app::services::command_relay::RelayPaths;

    use crate::messages::HttpMessageTransport;
    use crate::router::build;
    use crate::state::AppState;

    fn app(gatt: FakeGatt, store: InMemoryPreferenceStore) -> Router {
        let bus = Arc::new(InProcessEventBus::new(16));
        let controller = CameraController::new(
            gatt,
            store,
            Arc::clone(&bus),
            LocalIdentity::new("Pixel").unwrap(),
            EngineConfig::default(),
        );
        build(AppState::new(
            Arc::new(controller),
            bus,
            Arc::new(HttpMessageTransport::new(8, &RelayPaths::default())),
        ))
    }

    async fn json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post(uri: &str, body: Body) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(body)
            .unwrap()
    }

    #[tokio::test]
    async fn should_return_ok_when_health_check_called() {
        let response = app(FakeGatt::default(), InMemoryPreferenceStore::default())
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn should_report_remembered_camera_in_status() {
        let store = InMemoryPreferenceStore::remembering(&camera_address(), "EOS R6");

        let response = app(FakeGatt::with_camera(), store)
            .oneshot(
                Request::builder()
                    .uri("/api/status")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json(response).await;
        assert_eq!(body["connected"], false);
        assert_eq!(body["mode"], "idle");
        assert_eq!(body["camera"]["address"], "AA:BB:CC:DD:EE:FF");
    }

    #[tokio::test(start_paused = true)]
    async fn should_take_picture_when_shutter_posted() {
        let store = InMemoryPreferenceStore::remembering(&camera_address(), "EOS R6");

        let response = app(FakeGatt::advertising_camera(), store)
            .oneshot(post("/api/shutter", Body::empty()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["status"], "photo taken");
    }

    #[tokio::test(start_paused = true)]
    async fn should_report_failed_shot_with_ok_status() {
        let response = app(FakeGatt::advertising_camera(), InMemoryPreferenceStore::default())
            .oneshot(post("/api/shutter", Body::empty()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["status"], "no camera");
        assert_eq!(body["failure"], "device_not_found");
    }

    #[tokio::test]
    async fn should_reject_pair_with_empty_address() {
        let response = app(FakeGatt::default(), InMemoryPreferenceStore::default())
            .oneshot(post("/api/pair", Body::from(r#"{"address":"  "}"#)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test(start_paused = true)]
    async fn should_pair_advertising_camera() {
        let response = app(FakeGatt::advertising_camera(), InMemoryPreferenceStore::default())
            .oneshot(post(
                "/api/pair",
                Body::from(r#"{"address":"AA:BB:CC:DD:EE:FF"}"#),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json(response).await;
        assert_eq!(body["address"], "AA:BB:CC:DD:EE:FF");
    }

    #[tokio::test(start_paused = true)]
    async fn should_return_not_found_when_pairing_unseen_camera() {
        let response = app(FakeGatt::with_camera(), InMemoryPreferenceStore::default())
            .oneshot(post(
                "/api/pair",
                Body::from(r#"{"address":"AA:BB:CC:DD:EE:FF"}"#),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = json(response).await;
        assert_eq!(body["status"], "no camera");
    }

    #[tokio::test]
    async fn should_return_no_content_when_nothing_to_disconnect() {
        let response = app(FakeGatt::default(), InMemoryPreferenceStore::default())
            .oneshot(post("/api/disconnect", Body::empty()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }
}
