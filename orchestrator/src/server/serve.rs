//! HTTP server setup

use std::future::Future;
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::errors::PipeformError;
use crate::server::engine_guard::engine_guard;
use crate::server::handlers::{
    breakdown_handler, deploy_handler, deployments_handler, health_handler, roi_handler,
    savings_handler, version_handler,
};
use crate::server::state::ServerState;
use crate::storage::settings::ServerSettings;

/// Start the HTTP server
pub async fn serve(
    options: &ServerSettings,
    state: Arc<ServerState>,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<JoinHandle<Result<(), PipeformError>>, PipeformError> {
    let app = Router::new()
        // Health and version
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        // Deployments; the POST route requires a resolvable engine
        .route(
            "/deployments",
            post(deploy_handler)
                .route_layer(middleware::from_fn_with_state(state.clone(), engine_guard)),
        )
        .route("/deployments/recent", get(deployments_handler))
        // Cost reporting
        .route("/costs/savings", get(savings_handler))
        .route("/costs/roi", get(roi_handler))
        .route("/costs/breakdown", get(breakdown_handler))
        // State and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    let addr = format!("{}:{}", options.host, options.port);
    info!("Starting HTTP server on {}", addr);

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| PipeformError::ServerError(e.to_string()))?;

    let handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| PipeformError::ServerError(e.to_string()))
    });

    Ok(handle)
}
