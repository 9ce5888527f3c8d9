//! Companion relay over HTTP.
//!
//! `{path}` is the relay path without its leading slash, so
//! `/api/messages/shutter_command` feeds the `/shutter_command` path.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

use shutterlink_app::ports::{EventPublisher, GattTransport, PreferenceStore};

use crate::error::ApiError;
use crate::state::AppState;

/// Possible responses from the deliver endpoint.
pub enum DeliverResponse {
    Accepted,
}

impl IntoResponse for DeliverResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Accepted => StatusCode::ACCEPTED.into_response(),
        }
    }
}

fn relay_path(segment: &str) -> String {
    format!("/{segment}")
}

/// `POST /api/messages/{path}`
pub async fn deliver<T, S, P>(
    State(state): State<AppState<T, S, P>>,
    Path(path): Path<String>,
    body: Bytes,
) -> Result<DeliverResponse, ApiError>
where
    T: GattTransport + 'static,
    S: PreferenceStore + 'static,
    P: EventPublisher + Send + Sync + 'static,
{
    state.messages.deliver(&relay_path(&path), body.to_vec())?;
    Ok(DeliverResponse::Accepted)
}

/// `GET /api/messages/{path}/stream`
///
/// Payloads the engine sends on the path, one SSE `data:` frame each.
/// Payloads are expected to be UTF-8 JSON; invalid bytes are replaced.
pub async fn stream<T, S, P>(
    State(state): State<AppState<T, S, P>>,
    Path(path): Path<String>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, std::convert::Infallible>>>
where
    T: GattTransport + 'static,
    S: PreferenceStore + 'static,
    P: EventPublisher + Send + Sync + 'static,
{
    let path = relay_path(&path);
    let outbound = BroadcastStream::new(state.messages.subscribe()).filter_map(move |result| {
        match result {
            Ok(message) if message.path == path => Some(Ok(
                Event::default().data(String::from_utf8_lossy(&message.payload))
            )),
            Ok(_) => None,
            Err(BroadcastStreamRecvError::Lagged(n)) => {
                tracing::warn!(skipped = n, "relay listener lagged, some messages were dropped");
                None
            }
        }
    });

    Sse::new(outbound).keep_alive(KeepAlive::default())
}
