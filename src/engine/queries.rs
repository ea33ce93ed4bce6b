use crate::model::*;

use super::booking::{outlook, slots, status_of};
use super::{Engine, EngineError};

impl Engine {
    pub async fn status_of(
        &self,
        resource_id: &str,
        session: &str,
        now: Secs,
    ) -> Result<ResourceStatus, EngineError> {
        let timeline = self.resolve_timeline(resource_id)?;
        let guard = timeline.read().await;
        Ok(status_of(&guard, session, now))
    }

    /// Every group with each of its resources' status for `session`.
    pub async fn overview(&self, session: &str, now: Secs) -> Vec<GroupSummary> {
        let mut groups = Vec::new();
        for (group, members) in self.catalog().grouped() {
            let mut resources = Vec::with_capacity(members.len());
            for resource in members {
                let timeline = self.timelines.get(&resource.id).map(|e| e.value().clone());
                let status = match timeline {
                    Some(timeline) => status_of(&*timeline.read().await, session, now),
                    None => ResourceStatus::default(),
                };
                resources.push(ResourceSummary {
                    id: resource.id.clone(),
                    name: resource.name.clone(),
                    status,
                });
            }
            groups.push(GroupSummary {
                group: group.to_string(),
                resources,
            });
        }
        groups
    }

    /// Details, live slots and booking outlook for one resource.
    pub async fn view(
        &self,
        resource_id: &str,
        session: &str,
        now: Secs,
    ) -> Result<TimelineView, EngineError> {
        let resource = self
            .catalog()
            .get(resource_id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(resource_id.to_string()))?;
        let timeline = self.resolve_timeline(resource_id)?;
        let guard = timeline.read().await;
        Ok(TimelineView {
            resource,
            now,
            slots: slots(&guard, session, now),
            outlook: outlook(&guard, session, now),
        })
    }

    /// Copy of a resource's reservations in start order.
    pub async fn reservations(&self, resource_id: &str) -> Result<Vec<Reservation>, EngineError> {
        let timeline = self.resolve_timeline(resource_id)?;
        let guard = timeline.read().await;
        let mut all = guard.reservations.clone();
        all.sort_by_key(|r| r.span.start);
        Ok(all)
    }
}
