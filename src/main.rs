use std::net::SocketAddr;
use std::time::Duration;

use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use sea_orm_migration::MigratorTrait;
use tokio::signal;

use market_data_backend::{
    config::{Config, DatabaseConfig},
    logging, router, AppState,
};

const STARTUP_ATTEMPTS: u32 = 30;
const STARTUP_RETRY_DELAY: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    logging::init(&config.logger);

    tracing::info!(
        port = config.server.port,
        environment = ?config.logger.environment,
        identity_provider = %config.auth.identity_internal_url,
        session_cache = config.auth.session_cache_ttl.is_some(),
        "Starting market data backend"
    );

    let db = connect_with_retry(&config.database).await?;

    if config.database.run_migrations {
        tracing::info!("Running migrations...");
        migration::Migrator::up(&db, None).await?;
    }

    let port = config.server.port;
    let state = AppState::new(db.clone(), config)?;

    wait_for_identity_provider(&state).await;

    let app = router::build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Server listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped, closing database pool");
    db.close().await?;
    Ok(())
}

async fn connect_with_retry(config: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(config.url.clone());
    options
        .max_connections(config.max_open_conns)
        .min_connections(config.max_idle_conns.min(config.max_open_conns))
        .max_lifetime(config.conn_max_lifetime)
        .idle_timeout(config.conn_max_idle_time)
        .sqlx_logging(false);

    let mut attempt = 1;
    loop {
        tracing::info!("Connecting to database (attempt {}/{})...", attempt, STARTUP_ATTEMPTS);
        match Database::connect(options.clone()).await {
            Ok(db) => {
                db.ping().await?;
                tracing::info!("Database connection established");
                return Ok(db);
            }
            Err(e) if attempt < STARTUP_ATTEMPTS => {
                tracing::warn!(error = %e, "Database not reachable yet");
                attempt += 1;
                tokio::time::sleep(STARTUP_RETRY_DELAY).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// The service can start without the identity provider; protected routes
/// answer 401 until it is reachable.
async fn wait_for_identity_provider(state: &AppState) {
    for attempt in 1..=STARTUP_ATTEMPTS {
        if state.sessions.health_check().await {
            tracing::info!("Identity provider is ready");
            return;
        }
        tracing::debug!("Waiting for identity provider ({}/{})", attempt, STARTUP_ATTEMPTS);
        tokio::time::sleep(STARTUP_RETRY_DELAY).await;
    }
    tracing::warn!("Identity provider not ready, continuing anyway");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
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

    tracing::info!("Shutdown signal received");
}
