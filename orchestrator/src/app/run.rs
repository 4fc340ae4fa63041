//! Main application run loop

use std::future::Future;
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{error, info};

use crate::app::options::AppOptions;
use crate::app::state::AppState;
use crate::errors::PipeformError;
use crate::server::serve::serve;
use crate::server::state::ServerState;

/// Run the orchestrator service
pub async fn run(
    options: AppOptions,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<(), PipeformError> {
    info!("Initializing Pipeform orchestrator...");

    let (shutdown_tx, _shutdown_rx): (broadcast::Sender<()>, _) = broadcast::channel(1);

    let app_state = AppState::init(&options).await?;

    let server_state = Arc::new(ServerState::new(
        app_state.factory.clone(),
        app_state.tracker.clone(),
        app_state.history.clone(),
        app_state.active.clone(),
        app_state.deploy_settings.clone(),
    ));

    let mut server_shutdown_rx = shutdown_tx.subscribe();
    let server_handle = serve(&options.settings.server, server_state, async move {
        let _ = server_shutdown_rx.recv().await;
    })
    .await?;

    shutdown_signal.await;
    info!("Shutdown signal received, shutting down...");

    let _ = shutdown_tx.send(());

    match tokio::time::timeout(options.max_shutdown_delay, server_handle).await {
        Ok(joined) => joined.map_err(|e| PipeformError::ShutdownError(e.to_string()))??,
        Err(_) => {
            error!(
                "Shutdown timed out after {:?}, forcing shutdown...",
                options.max_shutdown_delay
            );
            std::process::exit(1);
        }
    }

    info!("Shutdown complete");
    Ok(())
}
