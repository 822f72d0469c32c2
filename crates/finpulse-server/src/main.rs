//! finpulse-server - REST and WebSocket server binary.

use std::net::SocketAddr;
use std::sync::Arc;

use finpulse_core::{Engine, PipelineConfig, PipelineRuntime};
use finpulse_llm::ReasoningFactory;
use finpulse_server::{create_server, create_server_with_auth, AppState};
use tokio::signal;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
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

fn load_config() -> Result<PipelineConfig, Box<dyn std::error::Error>> {
    let config = match std::env::var("FINPULSE_CONFIG") {
        Ok(path) => {
            info!(path = %path, "Loading pipeline config from file");
            PipelineConfig::from_file(&path)?.apply_env()
        }
        Err(_) => PipelineConfig::from_env(),
    };
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    let json_logs = std::env::var("FINPULSE_LOG_JSON").is_ok();
    let filter = EnvFilter::from_default_env()
        .add_directive(Level::INFO.into())
        .add_directive("finpulse_server=debug".parse()?);
    if json_logs {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init();
    }

    // Get configuration from environment
    let host = std::env::var("FINPULSE_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = std::env::var("FINPULSE_PORT")
        .unwrap_or_else(|_| "8080".to_string())
        .parse()?;
    let require_auth = std::env::var("FINPULSE_REQUIRE_AUTH").is_ok();

    // Build the pipeline
    let config = load_config()?;
    let reasoning = ReasoningFactory::from_config(&config.reasoning)?;
    let engine = Arc::new(Engine::open(config, reasoning).await?);

    let mut runtime = PipelineRuntime::new(engine);
    runtime.start().await?;
    let state = AppState::with_runtime(runtime);

    // Create server with or without auth
    let app = if require_auth {
        info!("Authentication enabled");
        create_server_with_auth(state.clone())
    } else {
        info!("Authentication disabled");
        create_server(state.clone())
    };

    // Start server
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!(%addr, "Starting finpulse-server");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Serve with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            shutdown_signal().await;
            info!("Shutdown signal received, stopping pipeline...");
        })
        .await?;

    if let Some(mut runtime) = state.take_runtime().await {
        runtime.shutdown().await?;
    }

    info!("Server stopped cleanly");
    Ok(())
}
