use roomhub::{
    create_router, AppConfig, AppState, InMemoryRoomRepository, PostgresRoomRepository,
    RoomRepository,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "roomhub=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting room subscription server");

    let config = AppConfig::from_env()?;

    let room_repository: Arc<dyn RoomRepository + Send + Sync> = match &config.database_url {
        Some(database_url) => {
            let pool = sqlx::PgPool::connect(database_url).await?;
            let repository = PostgresRoomRepository::new(pool);
            repository.ensure_schema().await?;
            info!("Using PostgreSQL room repository");
            Arc::new(repository)
        }
        None => {
            info!("No database configured, using in-memory room repository");
            Arc::new(InMemoryRoomRepository::new())
        }
    };

    let app_state = AppState::new(room_repository, config.hub.clone());
    let shutdown = app_state.shutdown.clone();
    let app = create_router(app_state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("Server running on http://{}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Waits for Ctrl-C, then ends every live subscription
async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested, closing subscriptions");
    shutdown.cancel();
}
