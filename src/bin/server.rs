use clap::Parser;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

use dockhand::cache::{CacheStore, ContainerListingCache, MemoryCacheStore, RedisCacheStore};
use dockhand::db::services::SeaOrmContainerStore;
use dockhand::docker::DockerClient;
use dockhand::server::config::ServerConfig;
use dockhand::server::logging::init_logging;
use dockhand::services::auth_service::TokenSettings;
use dockhand::services::container_service::ContainerService;
use dockhand::services::encryption_service::SecretBox;
use dockhand::ssh::SshCommandExecutor;
use dockhand::version::VERSION;
use dockhand::web::{AppState, create_axum_router};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long)]
    config: Option<String>,
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler.");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler.");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => warn!("Received Ctrl+C, shutting down."),
        _ = terminate => warn!("Received terminate signal, shutting down."),
    }
}

async fn build_cache_store(config: &ServerConfig) -> Arc<dyn CacheStore> {
    match &config.redis_url {
        Some(url) => match RedisCacheStore::connect(url).await {
            Ok(store) => Arc::new(store),
            Err(e) => {
                warn!(error = %e, "Redis unavailable, falling back to in-process cache.");
                Arc::new(MemoryCacheStore::new())
            }
        },
        None => {
            info!("No REDIS_URL configured, using in-process cache.");
            Arc::new(MemoryCacheStore::new())
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();

    let server_config = Arc::new(ServerConfig::load(args.config.as_deref())?);

    let _log_guard = init_logging(&server_config.log_dir);
    info!("Starting dockhand server, version: {}", VERSION);

    // --- Database ---
    let mut opt = ConnectOptions::new(server_config.database_url.clone());
    opt.max_connections(10).sqlx_logging(false);
    let db_pool: DatabaseConnection = Database::connect(opt).await?;
    sqlx::migrate!("./migrations")
        .run(db_pool.get_postgres_connection_pool())
        .await?;
    info!("Database migrations applied.");

    // --- Container service ---
    let secrets = SecretBox::from_hex_key(&server_config.ssh_key_encryption_key)?;
    let executor = Arc::new(SshCommandExecutor::new(server_config.ssh_config()));
    if !server_config.ssh_verify_host_key {
        warn!("SSH host key verification is disabled; any host identity will be accepted.");
    }
    let cache = ContainerListingCache::new(
        build_cache_store(&server_config).await,
        server_config.cache_ttl(),
    );
    let container_service = Arc::new(ContainerService::new(
        Arc::new(SeaOrmContainerStore::new(db_pool.clone())),
        DockerClient::new(executor),
        cache,
        secrets.clone(),
    ));

    let app_state = Arc::new(AppState {
        db_pool,
        tokens: TokenSettings::from_config(&server_config),
        config: server_config.clone(),
        secrets,
        container_service,
    });
    let app = create_axum_router(app_state);

    let listener = tokio::net::TcpListener::bind(&server_config.bind_address).await?;
    info!("HTTP server listening on {}", server_config.bind_address);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped.");
    Ok(())
}
