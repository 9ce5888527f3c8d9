//! JSON API handler modules.

#[allow(clippy::missing_errors_doc)]
pub mod camera;
#[allow(clippy::missing_errors_doc)]
pub mod messages;
pub mod sse;

use axum::Router;
use axum::routing::{get, post};

use shutterlink_app::ports::{EventPublisher, GattTransport, PreferenceStore};

use crate::state::AppState;

/// Build the `/api` sub-router.
pub fn routes<T, S, P>() -> Router<AppState<T, S, P>>
where
    T: GattTransport + 'static,
    S: PreferenceStore + 'static,
    P: EventPublisher + Send + Sync + 'static,
{
    Router::new()
        .route("/status", get(camera::status))
        .route("/shutter", post(camera::shutter))
        .route("/pair", post(camera::pair))
        .route("/disconnect", post(camera::disconnect))
        .route("/events/stream", get(sse::stream))
        .route("/messages/{path}", post(messages::deliver))
        .route("/messages/{path}/stream", get(messages::stream))
}
