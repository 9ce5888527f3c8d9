//! Axum router assembly.

use axum::Router;
use axum::routing::get;
use tower_http::trace::TraceLayer;

use shutterlink_app::ports::{EventPublisher, GattTransport, PreferenceStore};

use crate::state::AppState;

/// Build the top-level axum [`Router`].
///
/// Nests the API under `/api`. Includes a [`TraceLayer`] that logs each
/// HTTP request/response at the `DEBUG` level.
pub fn build<T, S, P>(state: AppState<T, S, P>) -> Router
where
    T: GattTransport + 'static,
    S: PreferenceStore + 'static,
    P: EventPublisher + Send + Sync + 'static,
{
    Router::new()
        .route("/health", get(health_check))
        .nest("/api", crate::api::routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
