// ITC Kids - Local Development Server

use std::net::SocketAddr;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use itckids_auth::{AuthProvider, ProfileTables};
use itckids_common::config::Config;
use itckids_supabase::{BackendConfig, BackendFactory};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.rust_log));
    if config.json_logs() {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .pretty()
            .init();
    }

    info!("Starting ITC Kids local development server");

    let backend_config = BackendConfig::from_env().map_err(|e| {
        error!("Failed to load backend configuration: {}", e);
        anyhow::anyhow!("Backend configuration failed: {}", e)
    })?;

    let backend = BackendFactory::create(backend_config).map_err(|e| {
        error!("Failed to create auth backend: {}", e);
        anyhow::anyhow!("Auth backend creation failed: {}", e)
    })?;

    let tables = ProfileTables::from_env();
    info!(roles = %tables.roles, admins = %tables.admins, students = %tables.students, "Profile tables configured");

    let auth = AuthProvider::new(backend, tables);
    let subscription = auth.init().await;

    info!(
        authenticated = auth.is_authenticated(),
        "Auth provider initialized"
    );

    let app = itckids_app::create_app(auth).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .into_inner(),
    );

    let addr = SocketAddr::new(config.host, config.port);

    info!("Server starting on http://{}", addr);
    info!("Health check available at http://{}/health", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    subscription.teardown();
    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        },
    }
}
