//! # lens-server
//!
//! axum HTTP boundary over the audit [`Orchestrator`]. Handlers translate
//! JSON bodies into orchestrator calls and [`ApiError`] into status codes;
//! no audit logic lives here.

pub mod auth;
pub mod error;
mod handlers;

use std::sync::Arc;

use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::routing::{delete, get, post};
use lens_adapters::AdapterSet;
use lens_audit::Orchestrator;
use lens_config::{LensConfig, ServerConfig};
use lens_db::service::LensService;
use tokio::net::TcpListener;

pub use error::{ApiError, ServerError};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Orchestrator,
    pub server: Arc<ServerConfig>,
}

impl AppState {
    #[must_use]
    pub fn new(orchestrator: Orchestrator, server: ServerConfig) -> Self {
        Self {
            orchestrator,
            server: Arc::new(server),
        }
    }
}

/// Build the router. Health and service-info routes stay open; everything
/// else sits behind [`auth::require_api_key`].
pub fn build_app(state: AppState) -> Router {
    let protected = Router::new()
        .route("/audit", post(handlers::run_audit))
        .route("/audit/{request_id}", delete(handlers::cancel_audit))
        .route("/audit/{request_id}/status", get(handlers::audit_status))
        .route("/sites", post(handlers::create_site))
        .route("/sites/{site_id}", get(handlers::get_site))
        .route("/sites/{site_id}/report", get(handlers::site_report))
        .route("/sites/{site_id}/history", get(handlers::site_history))
        .route_layer(from_fn_with_state(state.clone(), auth::require_api_key));

    Router::new()
        .route("/", get(handlers::service_info))
        .route("/health", get(handlers::health))
        .route("/health/db", get(handlers::health_db))
        .merge(protected)
        .with_state(state)
}

/// Open the database, wire the adapters, recover interrupted audits, and
/// serve until Ctrl-C.
///
/// # Errors
///
/// Returns `ServerError` if any startup step fails or the listener dies.
pub async fn serve(config: &LensConfig) -> Result<(), ServerError> {
    let db = Arc::new(LensService::open(&config.database).await?);
    let adapters = AdapterSet::from_config(config)?;
    for source in config.unconfigured_sources() {
        tracing::warn!(source, "source is not configured; audits requesting it will fail");
    }

    let orchestrator = Orchestrator::new(db, adapters, &config.aggregator);
    let recovered = orchestrator.recover_interrupted().await?;
    if recovered > 0 {
        tracing::warn!(recovered, "marked audits interrupted by a restart as failed");
    }
    if !config.server.requires_auth() {
        tracing::warn!("server.api_key is empty; the API accepts unauthenticated requests");
    }

    let listener = TcpListener::bind(&config.server.bind)
        .await
        .map_err(|source| ServerError::Bind {
            addr: config.server.bind.clone(),
            source,
        })?;
    tracing::info!(addr = %listener.local_addr()?, "sitelens api listening");

    let app = build_app(AppState::new(orchestrator, config.server.clone()));
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("sitelens api stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "cannot listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
