use crate::model::*;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompactionStats {
    pub historical: usize,
    pub trailing_open: usize,
}

impl CompactionStats {
    pub fn removed(&self) -> usize {
        self.historical + self.trailing_open
    }
}

/// Prune a timeline before it is written out.
///
/// 1. Sort by start.
/// 2. Drop everything that ended before `now`, whoever holds it.
/// 3. Drop OPEN slots that nothing real follows. An OPEN slot with a real
///    reservation after it stays as a placeholder.
pub fn compact(timeline: &mut Timeline, now: Secs) -> CompactionStats {
    timeline.sort();

    let before = timeline.len();
    timeline.reservations.retain(|r| !r.span.is_historical(now));
    let historical = before - timeline.len();

    // Deletion candidates by index; a real reservation clears them.
    let mut candidates: Vec<usize> = Vec::new();
    for (idx, r) in timeline.reservations.iter().enumerate() {
        if r.holder.is_open() {
            candidates.push(idx);
        } else {
            candidates.clear();
        }
    }

    // Surviving candidates are a contiguous tail of the sorted vector.
    let trailing_open = candidates.len();
    if let Some(&first) = candidates.first() {
        timeline.reservations.truncate(first);
    }

    CompactionStats {
        historical,
        trailing_open,
    }
}
