use std::net::SocketAddr;

use crate::command::Command;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: total commands handled. Labels: command, outcome.
pub const COMMANDS_TOTAL: &str = "bookit_commands_total";

/// Histogram: command latency in seconds. Labels: command.
pub const COMMAND_DURATION_SECONDS: &str = "bookit_command_duration_seconds";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: active TCP connections.
pub const CONNECTIONS_ACTIVE: &str = "bookit_connections_active";

/// Counter: total connections accepted.
pub const CONNECTIONS_TOTAL: &str = "bookit_connections_total";

/// Counter: connections rejected due to limit.
pub const CONNECTIONS_REJECTED_TOTAL: &str = "bookit_connections_rejected_total";

/// Counter: session tokens issued to browsers without a valid cookie.
pub const SESSIONS_ISSUED_TOTAL: &str = "bookit_sessions_issued_total";

/// Histogram: full-rewrite persistence pass duration in seconds.
pub const PERSIST_DURATION_SECONDS: &str = "bookit_persist_duration_seconds";

/// Gauge: reservations in the store after the last write.
pub const RESERVATIONS_STORED: &str = "bookit_reservations_stored";

/// Counter: reservations pruned by compaction.
pub const COMPACTION_REMOVED_TOTAL: &str = "bookit_compaction_removed_total";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), metrics_exporter_prometheus::BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Map a Command variant to a short label for metrics.
pub fn command_label(cmd: &Command) -> &'static str {
    match cmd {
        Command::Cookie { .. } => "cookie",
        Command::List => "list",
        Command::View { .. } => "view",
        Command::Book { .. } => "book",
        Command::Cancel { .. } => "cancel",
        Command::Claim { .. } => "claim",
        Command::Quit => "quit",
    }
}
