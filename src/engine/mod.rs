mod booking;
mod compaction;
mod error;
mod mutations;
mod queries;

pub use booking::{
    apply_booking, apply_cancel, apply_claim, outlook, sanitize_info, slots, status_of,
    validate_booking,
};
pub use compaction::{compact, CompactionStats};
pub use error::{EngineError, ValidationError};

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info};

use crate::catalog::{Catalog, CatalogError};
use crate::model::*;
use crate::store::ReservationStore;

pub type SharedTimeline = Arc<RwLock<Timeline>>;

/// Resource definitions file inside the data directory.
pub const OBJECTS_FILE: &str = "objects.txt";
/// Reservation store inside the data directory.
pub const RESERVATIONS_FILE: &str = "reservations.txt";

impl From<CatalogError> for EngineError {
    fn from(e: CatalogError) -> Self {
        EngineError::Storage(e.to_string())
    }
}

/// Process-wide booking state: the catalog, one timeline per referenced resource,
/// and the reservation store behind the commit lock.
///
/// Lock order: `commit` first, then timeline locks in catalog id order.
pub struct Engine {
    catalog: Catalog,
    timelines: DashMap<String, SharedTimeline>,
    /// Held across every mutation and its full-rewrite persistence pass.
    pub(super) commit: Mutex<ReservationStore>,
}

impl Engine {
    /// Build an engine from a catalog and whatever the store already holds.
    pub fn new(catalog: Catalog, store: ReservationStore) -> Result<Self, EngineError> {
        let loaded = store.load(&catalog)?;
        let count = loaded.len();

        let mut by_resource: HashMap<String, Timeline> = HashMap::new();
        for (resource_id, reservation) in loaded {
            by_resource.entry(resource_id).or_default().push(reservation);
        }

        let timelines = DashMap::new();
        for (resource_id, mut timeline) in by_resource {
            timeline.sort();
            timelines.insert(resource_id, Arc::new(RwLock::new(timeline)));
        }

        info!(
            "loaded {count} reservations from {}",
            store.path().display()
        );
        metrics::gauge!(crate::observability::RESERVATIONS_STORED).set(count as f64);

        Ok(Self {
            catalog,
            timelines,
            commit: Mutex::new(store),
        })
    }

    /// Load `objects.txt` and `reservations.txt` from `data_dir`.
    pub fn open(data_dir: &Path) -> Result<Self, EngineError> {
        let catalog = Catalog::load(&data_dir.join(OBJECTS_FILE))?;
        let store = ReservationStore::new(data_dir.join(RESERVATIONS_FILE));
        Self::new(catalog, store)
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Timeline for a catalog resource, created empty on first reference.
    pub fn get_timeline(&self, resource_id: &str) -> Option<SharedTimeline> {
        if !self.catalog.contains(resource_id) {
            return None;
        }
        if let Some(existing) = self.timelines.get(resource_id) {
            return Some(existing.value().clone());
        }
        Some(
            self.timelines
                .entry(resource_id.to_string())
                .or_default()
                .value()
                .clone(),
        )
    }

    pub(super) fn resolve_timeline(&self, resource_id: &str) -> Result<SharedTimeline, EngineError> {
        self.get_timeline(resource_id)
            .ok_or_else(|| EngineError::NotFound(resource_id.to_string()))
    }

    /// Compact every timeline and rewrite the store. Caller holds the commit lock.
    pub(super) async fn persist_locked(
        &self,
        store: &mut ReservationStore,
        now: Secs,
    ) -> Result<CompactionStats, EngineError> {
        let started = Instant::now();
        let mut stats = CompactionStats::default();
        let mut snapshot: Vec<(String, Vec<Reservation>)> = Vec::new();

        for resource_id in self.catalog.ids() {
            let Some(timeline) = self.timelines.get(resource_id).map(|e| e.value().clone()) else {
                continue;
            };
            let mut guard = timeline.write().await;
            let pruned = compact(&mut guard, now);
            stats.historical += pruned.historical;
            stats.trailing_open += pruned.trailing_open;
            if !guard.is_empty() {
                snapshot.push((resource_id.to_string(), guard.reservations.clone()));
            }
        }

        let written = store
            .write(snapshot.iter().map(|(id, rs)| (id.as_str(), rs.as_slice())))
            .inspect_err(|e| error!("persisting reservations failed: {e}"))?;

        metrics::histogram!(crate::observability::PERSIST_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());
        metrics::gauge!(crate::observability::RESERVATIONS_STORED).set(written as f64);
        if stats.removed() > 0 {
            metrics::counter!(crate::observability::COMPACTION_REMOVED_TOTAL)
                .increment(stats.removed() as u64);
            tracing::debug!(
                "compaction removed {} historical and {} trailing open reservations",
                stats.historical,
                stats.trailing_open
            );
        }
        Ok(stats)
    }
}
