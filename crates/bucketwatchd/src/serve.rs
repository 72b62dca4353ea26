//! `serve` mode: API server plus the periodic run loop.

use std::net::SocketAddr;

use tokio::sync::watch;
use tracing::{error, info};

use bucketwatch_api::{ApiState, build_router};
use bucketwatch_core::DaemonConfig;

use crate::wiring;

pub async fn run_server(config: DaemonConfig) -> anyhow::Result<()> {
    info!("bucketwatch daemon starting");

    let components = wiring::assemble(&config)?;

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── Start background tasks ─────────────────────────────────

    let schedule_handle = if config.schedule.enabled {
        let scheduler = components.scheduler.clone();
        Some(tokio::spawn(async move {
            scheduler.run(shutdown_rx).await;
        }))
    } else {
        info!("scheduled runs disabled");
        None
    };

    // ── Start API server ───────────────────────────────────────

    let router = build_router(ApiState {
        store: components.store,
        scheduler: components.scheduler,
        publisher: components.publisher,
        publish_on: config.pubsub.publish_on.clone(),
    });
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));

    info!(%addr, "API server starting");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Graceful shutdown on Ctrl-C.
    let server = axum::serve(listener, router).with_graceful_shutdown(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    server.await?;

    if let Some(handle) = schedule_handle {
        let _ = handle.await;
    }

    info!("bucketwatch daemon stopped");
    Ok(())
}
