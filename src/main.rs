use anyhow::{Context, Result};
use axum::Router;
use std::{io::ErrorKind, sync::Arc};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::EnvFilter;

use crate::{
    config::{AppConfig, Backend},
    services::{
        gateway_service::GatewayService, object_store_client::ObjectStoreClient,
        remote_store::RemoteStore,
    },
};

mod config;
mod errors;
mod handlers;
mod models;
mod routes;
mod services;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Load .env (missing file is fine) ---
    let _ = dotenvy::dotenv();

    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config ---
    let cfg = AppConfig::from_env_and_args()?;

    tracing::info!("Starting blob-gateway with config: {:?}", cfg);

    // --- Initialize object store ---
    let store: Arc<dyn ObjectStoreClient> = match cfg.backend {
        Backend::S3 => Arc::new(
            RemoteStore::s3(&cfg.s3_settings())
                .with_context(|| format!("configuring S3 client for bucket {}", cfg.bucket))?,
        ),
        Backend::Memory => {
            tracing::warn!("Using in-memory object store; uploads are lost on exit");
            let (store, _signer) = RemoteStore::in_memory(cfg.bucket.clone());
            Arc::new(store)
        }
    };

    // --- Initialize core service ---
    let gateway = GatewayService::new(store, &cfg.gateway_settings());

    // --- Build router ---
    let app: Router = routes::routes::routes(gateway.max_upload_bytes())
        .with_state(gateway)
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

    Ok(())
}

/// Resolves on Ctrl-C; in-flight requests finish before the server exits.
async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
