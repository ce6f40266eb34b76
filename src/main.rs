use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::anyhow;
use axum_server::tls_rustls::RustlsConfig;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use voice_agent_gateway::{ServerConfig, server, state::AppState};

/// How long in-flight connections get to finish after a shutdown signal
const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(10);

/// Voice agent gateway - bridges browser voice clients to Gemini Live
#[derive(Parser, Debug)]
#[command(name = "voice-agent-gateway")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if it exists (must be done before config loading)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Must be installed before any TLS connection is attempted
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install default crypto provider"))?;

    let cli = Cli::parse();

    let config = if let Some(config_path) = cli.config {
        info!(path = %config_path.display(), "Loading configuration from file");
        ServerConfig::from_file(&config_path)?
    } else {
        ServerConfig::from_env()?
    };

    let address = config.address();
    let tls_config = config.tls.clone();
    info!(
        address = %address,
        model = %config.gemini_model,
        voice = %config.gemini_voice,
        "Starting voice agent gateway"
    );

    let app_state = AppState::new(config)?;
    let app = server::create_app(app_state.clone())?;

    let socket_addr: SocketAddr = address
        .parse()
        .map_err(|e| anyhow!("Invalid server address '{}': {}", address, e))?;

    let shutdown_state = app_state.clone();
    let on_shutdown = async move {
        server::shutdown_signal().await;
        shutdown_state.shutdown.cancel();
    };

    if let Some(tls) = tls_config {
        let rustls_config = RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path)
            .await
            .map_err(|e| {
                anyhow!(
                    "Failed to load TLS certificates from {} and {}: {}",
                    tls.cert_path.display(),
                    tls.key_path.display(),
                    e
                )
            })?;

        let handle = axum_server::Handle::new();
        let shutdown_handle = handle.clone();
        tokio::spawn(async move {
            on_shutdown.await;
            shutdown_handle.graceful_shutdown(Some(SHUTDOWN_GRACE_PERIOD));
        });

        info!(address = %socket_addr, "Server listening (TLS enabled)");
        axum_server::bind_rustls(socket_addr, rustls_config)
            .handle(handle)
            .serve(app.into_make_service_with_connect_info::<SocketAddr>())
            .await
            .map_err(|e| anyhow!("TLS server error: {}", e))?;
    } else {
        info!(address = %socket_addr, "Server listening");
        let listener = TcpListener::bind(&socket_addr).await?;
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(on_shutdown)
        .await?;
    }

    let drained = app_state.bridges.drain();
    info!(drained, "Server stopped");

    Ok(())
}
