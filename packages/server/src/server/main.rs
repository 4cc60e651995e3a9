// Main entry point for API server

use std::sync::Arc;

use anyhow::{Context, Result};
use server_core::domains::notifications::channels::MessagingConfig;
use server_core::domains::notifications::outbox::PgOutbox;
use server_core::domains::notifications::{OutboxWorker, OutboxWorkerConfig};
use server_core::kernel::ServerDeps;
use server_core::server::build_app;
use server_core::Config;
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,server_core=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Mobile Blood-Draw Marketplace API");

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!("Configuration loaded");

    // Connect to database
    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Database connected");

    // Run migrations
    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;
    tracing::info!("Migrations complete");

    // Wire dependencies and build the application
    let deps = Arc::new(ServerDeps::from_config(&config, pool.clone()));
    let app = build_app(&config, deps.clone());

    // Start the outbox worker
    let cancel = CancellationToken::new();
    let worker = OutboxWorker::new(
        Arc::new(PgOutbox::new(pool)),
        deps.email.clone(),
        deps.sms.clone(),
        MessagingConfig {
            from_address: config.lead_email_from.clone(),
            public_site_url: config.public_site_url.clone(),
        },
        OutboxWorkerConfig::default(),
    );
    let worker_handle = {
        let cancel = cancel.clone();
        tokio::spawn(async move { worker.run(cancel).await })
    };

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Starting server on {}", addr);
    tracing::info!("Health check: http://localhost:{}/health", config.port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        })
        .await
        .context("Server error")?;

    // Drain the outbox worker before exiting
    cancel.cancel();
    let _ = worker_handle.await;

    Ok(())
}
