//! HTTP surface for the skyquery assistant.

mod error;
mod progress;
mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use skyquery_pipeline::Assistant;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

pub use error::ApiError;
pub use progress::{ProgressLog, FINISHED_RUN_RETENTION, PROGRESS_LOG_CAPACITY};

/// Request bodies above this size are rejected with 413.
pub const MAX_BODY_BYTES: usize = 64 * 1024;

#[derive(Clone, Debug)]
pub struct AppState {
    pub assistant: Arc<Assistant>,
    pub progress: ProgressLog,
}

impl AppState {
    /// `progress` should be the same log registered on the assistant's
    /// pipeline, otherwise `/progress` stays empty.
    pub fn new(assistant: Assistant, progress: ProgressLog) -> Self {
        Self {
            assistant: Arc::new(assistant),
            progress,
        }
    }
}

pub fn router(state: AppState) -> Router {
    routes::routes().with_state(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            )
            .layer(tower_http::map_response_body::MapResponseBodyLayer::new(axum::body::Body::new))
            .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES)),
    )
}

/// Serves until Ctrl-C.
pub async fn serve(addr: SocketAddr, state: AppState) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "skyquery server listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
