use std::sync::Arc;

use firebase_mcp::{AppState, Config, McpServer};
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing on stderr; stdout carries the protocol.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "firebase_mcp=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("Starting Firebase MCP server");

    // Load configuration and wire the backends
    let config = Config::from_env()?;
    let start = std::time::Instant::now();
    let state = Arc::new(AppState::from_config(&config)?);
    tracing::info!(
        elapsed_ms = start.elapsed().as_millis() as u64,
        project_id = %state.project_id,
        emulator = config.emulator_mode(),
        "Backends initialized",
    );

    let server = McpServer::new(state);

    // Run until stdin closes or a shutdown signal arrives
    tokio::select! {
        result = server.serve_stdio() => {
            result?;
            tracing::info!("Input stream closed");
        }
        _ = shutdown_signal() => {}
    }

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, shutting down");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down");
        }
    }
}
