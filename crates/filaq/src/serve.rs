// SPDX-FileCopyrightText: 2026 Filaq Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `filaq serve` command implementation.
//!
//! Wires SQLite storage, the queue engine, the snapshot fanout hub, the
//! notification pipeline, the background grace sweeper, and the HTTP/SSE
//! gateway. Supports graceful shutdown via Ctrl-C.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use filaq_config::model::FilaqConfig;
use filaq_core::FilaqError;
use filaq_engine::{spawn_sweeper, QueueEngine};
use filaq_fanout::FanoutHub;
use filaq_gateway::{start_server, GatewayState};
use filaq_notify::{LogDelivery, Notifier};
use filaq_storage::Database;

/// Runs the `filaq serve` command.
pub async fn run_serve(config: FilaqConfig) -> Result<(), FilaqError> {
    init_tracing(&config.server.log_level);

    info!("starting filaq serve");

    // Open storage. Migrations run on open; WAL is optional for setups
    // that keep the database on a network filesystem.
    let db = Database::open_with_options(
        &config.storage.database_path,
        config.storage.wal_mode,
    )
    .await?;
    info!(
        path = config.storage.database_path.as_str(),
        wal = config.storage.wal_mode,
        "database ready"
    );

    // Fanout hub and notifier are shared across the engine and gateway.
    let hub = Arc::new(FanoutHub::new());
    let notifier = Arc::new(Notifier::new(db.clone(), Arc::new(LogDelivery)));

    let engine = Arc::new(QueueEngine::new(
        db,
        config.queue.clone(),
        hub,
        notifier,
    ));

    if config.gateway.admin_token.is_none() {
        warn!("no gateway admin token configured -- staff routes will reject all requests");
    }

    // Install signal handler.
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for shutdown signal");
                return;
            }
            info!("shutdown signal received");
            cancel.cancel();
        });
    }

    // Spawn the grace-period sweeper.
    let sweeper = spawn_sweeper(
        engine.clone(),
        config.queue.sweep_interval_secs,
        cancel.clone(),
    );
    info!(
        interval_secs = config.queue.sweep_interval_secs,
        grace_minutes = config.queue.grace_minutes,
        trigger_position = config.queue.grace_trigger_position,
        "grace sweeper started"
    );

    // Serve HTTP until the cancellation token fires.
    let state = GatewayState::new(engine.clone(), config.gateway.admin_token.clone());
    let result = start_server(&config.gateway, state, cancel.clone()).await;

    // The server exits on cancellation or error; either way, stop the
    // sweeper before reporting.
    cancel.cancel();
    if let Err(e) = sweeper.await {
        warn!(error = %e, "sweeper task did not shut down cleanly");
    }

    match &result {
        Ok(()) => info!("filaq serve shutdown complete"),
        Err(e) => warn!(error = %e, "filaq serve exited with error"),
    }
    result
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("filaq={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
