//! # shutterlinkd: shutterlink daemon
//!
//! Composition root that wires all adapters together and starts the server.
//!
//! ## Responsibilities
//! - Load configuration (config file, env vars) and install the tracing subscriber
//! - Initialize the `SQLite` connection pool and run migrations
//! - Open the host BLE adapter
//! - Construct the camera controller, injecting adapters via port traits
//! - Run the companion command relay over the HTTP message transport
//! - Build the axum router, bind to a TCP port and serve
//! - Handle graceful shutdown (SIGINT), releasing the camera
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer. No domain logic belongs here.

mod config;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use shutterlink_adapter_ble::BtleplugTransport;
use shutterlink_adapter_http_axum::HttpMessageTransport;
use shutterlink_adapter_http_axum::router;
use shutterlink_adapter_http_axum::state::AppState;
use shutterlink_adapter_storage_sqlite_sqlx::pool::Config as StorageConfig;
use shutterlink_app::event_bus::InProcessEventBus;
use shutterlink_app::services::command_relay::CommandRelay;
use shutterlink_app::services::controller::CameraController;

use crate::config::Config;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.logging.filter)?)
        .init();

    // Database
    let db = StorageConfig {
        database_url: config.database_url().to_string(),
    }
    .build()
    .await?;
    let store = db.preference_store();

    // BLE
    let transport = BtleplugTransport::new(&config.ble).await?;
    let adapter = match transport.adapter_info().await {
        Ok(info) => Some(info),
        Err(err) => {
            tracing::warn!(%err, "could not describe BLE adapter");
            None
        }
    };

    // Engine
    let event_bus = Arc::new(InProcessEventBus::new(256));
    let controller = Arc::new(CameraController::new(
        transport,
        store,
        Arc::clone(&event_bus),
        config.local_identity()?,
        config.engine.clone(),
    ));
    if let Some(adapter) = adapter {
        if let Err(err) = controller.identity().remember_local_address(&adapter).await {
            tracing::warn!(%err, "could not store local adapter");
        }
    }
    controller.start();

    // Relay
    let relay_paths = config.relay.paths();
    let messages = Arc::new(HttpMessageTransport::new(config.relay.capacity, &relay_paths));
    let relay_task = config.relay.enabled.then(|| {
        let relay = CommandRelay::new(Arc::clone(&messages), Arc::clone(&controller), relay_paths);
        tokio::spawn(async move {
            if let Err(err) = relay.run().await {
                tracing::error!(%err, "command relay stopped");
            }
        })
    });

    // HTTP
    let state = AppState::new(
        Arc::clone(&controller),
        event_bus,
        Arc::clone(&messages),
    );
    let app = router::build(state);

    let bind_addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(%bind_addr, "shutterlinkd listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    messages.close();
    if let Some(task) = relay_task {
        if let Err(err) = task.await {
            tracing::warn!(%err, "command relay task did not finish cleanly");
        }
    }
    controller.shutdown().await;

    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("shutdown requested"),
        Err(err) => {
            tracing::error!(%err, "cannot listen for ctrl-c, running until killed");
            std::future::pending::<()>().await;
        }
    }
}
