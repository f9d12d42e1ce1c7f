use anyhow::{Context, Result};
use axum::Router;
use std::{io::ErrorKind, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};
use tracing_subscriber::EnvFilter;

mod config;
mod db;
mod errors;
mod handlers;
mod middleware;
mod models;
mod routes;
mod services;
mod state;

use middleware::auth::TrustedHeaderAuthenticator;
use services::{
    history_service::HistoryService,
    object_store::{ObjectStore, S3ObjectStore},
    upload_service::UploadService,
};
use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // .env may carry RUST_LOG, so load it before logging starts
    dotenvy::dotenv().ok();

    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config + migrate flag ---
    let (cfg, migrate) = config::AppConfig::from_env_and_args()?;

    tracing::info!("Starting ai-image-api with config: {:?}", cfg);

    // --- Initialize SQLite connection ---
    let db = db::connect(
        &cfg.database_url,
        Duration::from_secs(cfg.db_acquire_timeout_secs),
    )
    .await?;
    db::run_migrations(&db).await?;

    // --- Handle migration mode ---
    if migrate {
        tracing::info!("Database migration complete.");
        db.close().await;
        return Ok(()); // exit after migration
    }

    // --- Initialize object store + services ---
    let store: Arc<dyn ObjectStore> = Arc::new(S3ObjectStore::connect(&cfg.s3).await);
    let authenticator = TrustedHeaderAuthenticator::new(&cfg.auth_header)
        .with_context(|| format!("invalid auth header name `{}`", cfg.auth_header))?;

    let state = AppState {
        db: db.clone(),
        store: store.clone(),
        uploads: UploadService::new(
            store,
            cfg.s3.bucket.clone(),
            cfg.public_endpoint.clone(),
            cfg.presign_expiry(),
        ),
        history: HistoryService::new(db.clone()),
        authenticator: Arc::new(authenticator),
        max_upload_bytes: cfg.max_upload_bytes,
    };

    // --- Build router ---
    let app: Router = routes::routes::routes(state)
        .layer(TimeoutLayer::new(Duration::from_secs(cfg.request_timeout_secs)))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutting down, closing database pool");
    db.close().await;

    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl-C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!("failed to listen for SIGTERM: {}", err);
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
