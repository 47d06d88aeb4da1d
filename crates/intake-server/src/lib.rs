//! HTTP API for institution forms and submissions.
//!
//! ```text
//! GET    /health
//! GET    /api/forms/:institution_id
//! POST   /api/forms/:institution_id
//! GET    /api/forms/:institution_id/:form_id
//! PUT    /api/forms/:institution_id/:form_id
//! DELETE /api/forms/:institution_id/:form_id
//! POST   /api/forms/:institution_id/:form_id/fields
//! POST   /api/forms/:institution_id/:form_id/submit
//! GET    /api/forms/:institution_id/:form_id/submissions
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use intake_spec::{FormError, FormStore, RetryPolicy};
use thiserror::Error;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use auth::{MaybePrincipal, Principal};
pub use config::{AuthConfig, ServerConfig, StorageConfig, TokenGrant};
pub use error::ApiError;
pub use models::{ApiResponse, ErrorBody};

/// Shared handler state.
pub struct AppState {
    pub store: Arc<dyn FormStore>,
    pub retry: RetryPolicy,
    pub auth: AuthConfig,
}

impl AppState {
    pub fn new(store: Arc<dyn FormStore>, config: &ServerConfig) -> Self {
        Self {
            store,
            retry: config.retry.into(),
            auth: config.auth.clone(),
        }
    }

    /// Runs blocking store work off the async executor.
    pub async fn spawn<T, F>(&self, operation: &'static str, op: F) -> Result<T, ApiError>
    where
        T: Send + 'static,
        F: FnOnce(&dyn FormStore) -> Result<T, FormError> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || op(store.as_ref()))
            .await
            .map_err(|err| ApiError::Internal(format!("{operation} task failed: {err}")))?
            .map_err(ApiError::from)
    }

    /// Like [`AppState::spawn`], retrying transient failures with the
    /// configured policy.
    pub async fn run<T, F>(&self, operation: &'static str, op: F) -> Result<T, ApiError>
    where
        T: Send + 'static,
        F: Fn(&dyn FormStore) -> Result<T, FormError> + Send + 'static,
    {
        let retry = self.retry;
        self.spawn(operation, move |store| retry.run(operation, || op(store)))
            .await
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(routes::health::health_check))
        .nest("/api/forms", routes::forms::router())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Store(#[from] FormError),
    #[error("failed to bind {addr}")]
    Bind {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("server terminated")]
    Serve(#[source] std::io::Error),
}

/// Opens the configured store and serves until Ctrl-C.
pub async fn serve(config: ServerConfig) -> Result<(), ServerError> {
    let store = config.open_store()?;
    let app = build_router(Arc::new(AppState::new(store, &config)));

    let listener = TcpListener::bind(config.bind)
        .await
        .map_err(|source| ServerError::Bind {
            addr: config.bind,
            source,
        })?;
    tracing::info!(addr = %config.bind, storage = ?config.storage, "intake server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(ServerError::Serve)
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(%err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
