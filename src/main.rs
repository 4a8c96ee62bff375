// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Sealdrop Contributors

use std::{env, net::SocketAddr, time::Duration};

use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use sealdrop::api::router;
use sealdrop::config;
use sealdrop::state::{AppState, SessionConfig, TransferPolicy};
use sealdrop::storage::{BlobStore, StoragePaths, TransferDatabase};
use sealdrop::sweeper::ExpirySweeper;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));

    let format = env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());
    if format == "json" {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u32(name: &str, default: u32) -> u32 {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[tokio::main]
async fn main() {
    init_tracing();

    // Storage: blob directory plus the embedded database.
    let data_dir =
        env::var(config::DATA_DIR_ENV).unwrap_or_else(|_| config::DEFAULT_DATA_DIR.to_string());
    let paths = StoragePaths::new(&data_dir);

    let db = TransferDatabase::open(&paths.database()).expect("Failed to open transfer database");
    let mut blobs = BlobStore::new(paths);
    blobs
        .initialize()
        .expect("Failed to initialize blob store");

    let secret = match env::var(config::SESSION_SECRET_ENV) {
        Ok(secret) => secret,
        Err(_) => {
            tracing::warn!(
                "SESSION_SECRET not set, using an insecure development secret"
            );
            "insecure-dev-secret".to_string()
        }
    };

    let policy = TransferPolicy {
        max_upload_bytes: env_u64(
            config::MAX_UPLOAD_BYTES_ENV,
            config::DEFAULT_MAX_UPLOAD_BYTES,
        ),
        default_retention_days: env_u32(
            config::DEFAULT_RETENTION_DAYS_ENV,
            config::DEFAULT_RETENTION_DAYS,
        ),
        default_storage_limit: env_u64(
            config::DEFAULT_STORAGE_LIMIT_ENV,
            config::DEFAULT_STORAGE_LIMIT_BYTES,
        ),
        public_base_url: env::var(config::PUBLIC_BASE_URL_ENV).unwrap_or_default(),
    };

    let state = AppState::new(db, blobs, SessionConfig { secret }).with_policy(policy);

    // Background expiry sweep with graceful shutdown.
    let shutdown = CancellationToken::new();
    let sweep_interval = Duration::from_secs(env_u64(config::SWEEP_INTERVAL_ENV, 60));
    let sweeper = ExpirySweeper::new(state.db.clone(), state.blobs.clone())
        .with_interval(sweep_interval);
    let sweeper_handle = tokio::spawn(sweeper.run(shutdown.clone()));

    let app = router(state);

    // Parse bind address
    let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = env::var("PORT")
        .unwrap_or_else(|_| "8080".to_string())
        .parse()
        .unwrap_or(8080);

    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .expect("Failed to parse bind address");

    tracing::info!(%addr, data_dir = %data_dir, "Sealdrop server listening (docs at /docs)");

    let handle = axum_server::Handle::new();
    {
        let handle = handle.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            tokio::signal::ctrl_c()
                .await
                .expect("Failed to listen for shutdown signal");
            tracing::info!("Shutdown signal received");
            shutdown.cancel();
            handle.graceful_shutdown(Some(Duration::from_secs(10)));
        });
    }

    axum_server::bind(addr)
        .handle(handle)
        .serve(app.into_make_service())
        .await
        .expect("HTTP server failed");

    let _ = sweeper_handle.await;
}
