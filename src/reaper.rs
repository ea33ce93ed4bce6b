use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::engine::Engine;
use crate::model::now_secs;

/// Background task that compacts and rewrites the store every `interval_secs`
/// so expired reservations leave it even when nobody books.
pub async fn run_compactor(engine: Arc<Engine>, interval_secs: u64) {
    if interval_secs == 0 {
        info!("periodic compaction disabled");
        return;
    }
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
    // The first tick fires immediately.
    interval.tick().await;
    loop {
        interval.tick().await;
        match engine.compact_all(now_secs()).await {
            Ok(stats) if stats.removed() > 0 => info!(
                "compaction pruned {} reservations",
                stats.removed()
            ),
            Ok(_) => {}
            Err(e) => tracing::error!("compaction pass failed: {e}"),
        }
    }
}
