use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;

use bookit::config::Config;
use bookit::engine::Engine;
use bookit::reaper;
use bookit::server::{self, ConnectionLimit, DRAIN_GRACE};

/// Resolves on ctrl-c, or SIGTERM where available.
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(e) => {
                tracing::warn!("cannot register SIGTERM handler: {e}");
                ctrl_c.await.ok();
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::parse();
    tracing_subscriber::fmt::init();
    config.validate()?;

    bookit::observability::init(config.metrics_port)?;

    let engine = Arc::new(Engine::open(&config.data_dir)?);
    tokio::spawn(reaper::run_compactor(engine.clone(), config.compact_interval));

    let addr = config.listen_addr();
    let listener = TcpListener::bind(&addr).await?;
    info!("bookit listening on {addr}");
    info!("  data_dir: {}", config.data_dir.display());
    info!("  resources: {}", engine.catalog().len());
    info!("  max_connections: {}", config.max_connections);
    info!(
        "  compaction: {}",
        match config.compact_interval {
            0 => "disabled".to_string(),
            secs => format!("every {secs}s"),
        }
    );

    let limit = ConnectionLimit::new(config.max_connections);
    server::serve(listener, engine, limit.clone(), shutdown_signal()).await;

    info!("draining {} open connections", limit.open_connections());
    if limit.drain(DRAIN_GRACE).await {
        info!("all connections drained");
    } else {
        tracing::warn!(
            "drain timeout, {} connections still open",
            limit.open_connections()
        );
    }

    info!("bookit stopped");
    Ok(())
}
