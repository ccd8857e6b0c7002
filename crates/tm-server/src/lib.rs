//! tm-server: HTTP front end for the download pipeline.
//!
//! This crate exposes the pipeline over HTTP. It provides:
//!
//! - Axum router with `GET /download` and `GET /health`
//! - Streaming delivery that ties workspace cleanup to the response body
//! - Error-to-status mapping with JSON error bodies
//! - Request ID middleware and graceful shutdown via signal handling

pub mod context;
pub mod delivery;
pub mod error;
pub mod middleware;
pub mod router;
pub mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use tm_av::{FfmpegMuxer, ToolRegistry, YtDlpSource};
use tm_core::config::Config;
use tm_pipeline::Pipeline;
use tokio_util::sync::CancellationToken;

pub use crate::context::AppContext;

/// Start the tubemux server.
///
/// Discovers the external tools, builds the yt-dlp/ffmpeg pipeline, binds
/// the configured address, and serves until a shutdown signal arrives.
pub async fn start(config: Config) -> tm_core::Result<()> {
    for warning in config.validate() {
        tracing::warn!("Config warning: {warning}");
    }

    let tools = ToolRegistry::discover(&config.tools);
    let infos = tools.check_all();
    for info in &infos {
        if info.available {
            tracing::info!(
                "Tool found: {} ({})",
                info.name,
                info.version.as_deref().unwrap_or("unknown version")
            );
        } else {
            tracing::warn!("Tool not found: {}", info.name);
        }
    }

    let source = YtDlpSource::from_registry(&tools)?;
    let muxer = FfmpegMuxer::from_registry(&tools)?;

    let cancel = CancellationToken::new();
    let pipeline = Pipeline::new(Arc::new(source), Arc::new(muxer), &config)
        .with_shutdown(cancel.clone());

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| tm_core::Error::Internal(format!("Invalid server address: {e}")))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| tm_core::Error::Internal(format!("Failed to bind to {addr}: {e}")))?;

    tracing::info!("Starting server on {addr}");

    let ctx = AppContext::new(config, pipeline, infos);
    serve(listener, ctx, cancel).await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Serve the router on an already-bound listener until shutdown.
///
/// Returns when SIGINT/SIGTERM is received or `cancel` is triggered. The
/// token is cancelled on the way out so pending retries stop promptly.
pub async fn serve(
    listener: tokio::net::TcpListener,
    ctx: AppContext,
    cancel: CancellationToken,
) -> tm_core::Result<()> {
    let app = router::build_router(ctx);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel.clone()))
        .await
        .map_err(|e| tm_core::Error::Internal(format!("server error: {e}")))?;

    cancel.cancel();
    Ok(())
}

/// Wait for a shutdown signal (SIGINT or SIGTERM) or cancellation.
async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
        _ = cancel.cancelled() => {}
    }

    tracing::info!("Shutdown signal received");
}
