//! HTTP server and CLI plumbing for shopseed.
//!
//! The server exposes one endpoint per seeding operation under `/api`, plus
//! `/api/setup/all`, which runs every stage in dependency order. Clients
//! (Postgres, text backend, image jobs, object storage) are built once in
//! [`state::AppState::build`] and shared by all requests.

pub mod config;
pub mod error;
pub mod logging;
pub mod response;
pub mod routes;
pub mod services;
pub mod setup;
pub mod state;

use std::sync::Arc;
use std::time::Duration;

use shopseed_store::Store;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};

pub use config::ServerConfig;
pub use error::{ApiError, ServerError};
pub use response::ApiResponse;
pub use routes::router;
pub use state::{AppState, SharedState};

/// Serve the API until Ctrl+C or SIGTERM.
pub async fn serve(config: ServerConfig) -> Result<(), ServerError> {
    let address = config.http.address();
    let state = Arc::new(AppState::build(config).await?);
    let app = router(state);

    let listener = TcpListener::bind(&address).await?;
    info!(event = "server_listening", address = %address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!(event = "server_stopped");
    Ok(())
}

/// Apply the schema and exit.
pub async fn migrate(config: ServerConfig) -> Result<(), ServerError> {
    let store = Store::connect(
        &config.database.url,
        config.database.max_connections,
        Duration::from_secs(config.database.acquire_timeout_secs),
    )
    .await?;
    store.migrate().await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!(event = "shutdown_requested", signal = "ctrl_c"),
            Err(err) => {
                error!(event = "signal_handler_failed", signal = "ctrl_c", error = %err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!(event = "shutdown_requested", signal = "sigterm");
            }
            Err(err) => {
                error!(event = "signal_handler_failed", signal = "sigterm", error = %err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
