use tracing::{debug, info};

use crate::model::*;

use super::booking::{apply_booking, apply_cancel, apply_claim, validate_booking};
use super::{CompactionStats, Engine, EngineError};

impl Engine {
    /// Book or extend. Starts now on a free resource, lengthens the caller's own
    /// frontier, or queues one second after someone else's.
    pub async fn book(
        &self,
        resource_id: &str,
        session: &str,
        duration_minutes: i64,
        info: &str,
        now: Secs,
    ) -> Result<Booking, EngineError> {
        let timeline = self.resolve_timeline(resource_id)?;
        let info = validate_booking(duration_minutes, info)?;

        let mut store = self.commit.lock().await;
        let booking = {
            let mut guard = timeline.write().await;
            apply_booking(&mut guard, session, duration_minutes, info, now)?
        };
        info!(
            "{resource_id}: {:?} [{}, {}) for {:?}",
            booking.kind,
            booking.reservation.span.start,
            booking.reservation.span.end,
            booking.reservation.info
        );

        self.persist_locked(&mut store, now).await?;
        Ok(booking)
    }

    /// Hand the caller's unexpired slot starting at `start` back as OPEN space.
    /// `Ok(None)` when nothing matched.
    pub async fn cancel(
        &self,
        resource_id: &str,
        session: &str,
        start: Secs,
        now: Secs,
    ) -> Result<Option<Reservation>, EngineError> {
        let timeline = self.resolve_timeline(resource_id)?;

        let mut store = self.commit.lock().await;
        let canceled = {
            let mut guard = timeline.write().await;
            apply_cancel(&mut guard, session, start, now)
        };
        let Some(canceled) = canceled else {
            debug!("{resource_id}: cancel of {start} matched nothing");
            return Ok(None);
        };
        info!(
            "{resource_id}: canceled [{}, {})",
            canceled.span.start, canceled.span.end
        );

        self.persist_locked(&mut store, now).await?;
        Ok(Some(canceled))
    }

    /// Take over the OPEN slot starting at `start`. `Ok(None)` when nothing matched.
    pub async fn claim(
        &self,
        resource_id: &str,
        session: &str,
        start: Secs,
        now: Secs,
    ) -> Result<Option<Reservation>, EngineError> {
        let timeline = self.resolve_timeline(resource_id)?;

        let mut store = self.commit.lock().await;
        let claimed = {
            let mut guard = timeline.write().await;
            apply_claim(&mut guard, session, start, now)
        };
        let Some(claimed) = claimed else {
            debug!("{resource_id}: claim of {start} matched nothing");
            return Ok(None);
        };
        info!(
            "{resource_id}: claimed [{}, {})",
            claimed.span.start, claimed.span.end
        );

        self.persist_locked(&mut store, now).await?;
        Ok(Some(claimed))
    }

    /// Run a persistence pass without any mutation.
    pub async fn compact_all(&self, now: Secs) -> Result<CompactionStats, EngineError> {
        let mut store = self.commit.lock().await;
        self.persist_locked(&mut store, now).await
    }
}
