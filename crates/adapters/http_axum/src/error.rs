//! HTTP error response mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use shutterlink_domain::error::ValidationError;
use shutterlink_domain::session::SessionFailure;

use crate::messages::MessageError;

/// JSON error body returned by API endpoints.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<&'static str>,
}

/// Everything a handler can fail with.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Session(#[from] SessionFailure),

    #[error(transparent)]
    Message(#[from] MessageError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (code, status) = match &self {
            Self::Validation(_) => (StatusCode::BAD_REQUEST, None),
            Self::Session(SessionFailure::DeviceNotFound) => (
                StatusCode::NOT_FOUND,
                Some(SessionFailure::DeviceNotFound.status_text()),
            ),
            Self::Session(failure) => {
                tracing::warn!(%failure, "camera operation failed");
                (StatusCode::BAD_GATEWAY, Some(failure.status_text()))
            }
            Self::Message(MessageError::UnknownPath(_)) => (StatusCode::NOT_FOUND, None),
            Self::Message(MessageError::Full(_)) => (StatusCode::TOO_MANY_REQUESTS, None),
            Self::Message(MessageError::Closed) => (StatusCode::SERVICE_UNAVAILABLE, None),
        };

        (
            code,
            Json(ErrorBody {
                error: self.to_string(),
                status,
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_map_validation_error_to_bad_request() {
        let response = ApiError::from(ValidationError::EmptyAddress).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn should_map_missing_camera_to_not_found() {
        let response = ApiError::from(SessionFailure::DeviceNotFound).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn should_map_camera_failure_to_bad_gateway() {
        let response = ApiError::from(SessionFailure::AuthenticationFailed).into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn should_map_unknown_relay_path_to_not_found() {
        let response =
            ApiError::from(MessageError::UnknownPath("/other".to_owned())).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn should_map_full_inbox_to_too_many_requests() {
        let response =
            ApiError::from(MessageError::Full("/shutter_command".to_owned())).into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }
}
