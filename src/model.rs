use std::fmt;

use serde::Serialize;

/// Unix seconds.
pub type Secs = i64;

/// Holder string written for unclaimed slots.
pub const OPEN_SID: &str = "open";

/// Info placed on a slot taken over from OPEN.
pub const CLAIMED: &str = "Claimed";

pub fn now_secs() -> Secs {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as Secs)
        .unwrap_or(0)
}

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Span {
    pub start: Secs,
    pub end: Secs,
}

impl Span {
    pub fn new(start: Secs, end: Secs) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    pub fn duration_secs(&self) -> Secs {
        self.end - self.start
    }

    pub fn contains_instant(&self, t: Secs) -> bool {
        self.start <= t && t < self.end
    }

    /// Ends strictly before `now`.
    pub fn is_historical(&self, now: Secs) -> bool {
        self.end < now
    }
}

/// Who holds a reservation slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Holder {
    /// Unclaimed space left behind by a cancellation.
    Open,
    Session(String),
}

impl Holder {
    pub fn is_open(&self) -> bool {
        matches!(self, Holder::Open)
    }

    pub fn is_session(&self, token: &str) -> bool {
        matches!(self, Holder::Session(t) if t == token)
    }

    /// Inverse of `Display`: the store writes OPEN as `open`.
    pub fn parse(s: &str) -> Self {
        if s == OPEN_SID {
            Holder::Open
        } else {
            Holder::Session(s.to_string())
        }
    }
}

impl fmt::Display for Holder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Holder::Open => f.write_str(OPEN_SID),
            Holder::Session(token) => f.write_str(token),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reservation {
    pub holder: Holder,
    pub info: String,
    pub span: Span,
}

impl Reservation {
    pub fn new(holder: Holder, info: impl Into<String>, span: Span) -> Self {
        Self {
            holder,
            info: info.into(),
            span,
        }
    }
}

/// All reservations of one resource. Order is only guaranteed after `sort`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Timeline {
    pub reservations: Vec<Reservation>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, reservation: Reservation) {
        self.reservations.push(reservation);
    }

    pub fn sort(&mut self) {
        self.reservations.sort_by_key(|r| r.span.start);
    }

    pub fn len(&self) -> usize {
        self.reservations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reservations.is_empty()
    }

    /// Index of the unexpired reservation with the greatest end.
    /// Ties keep the earliest one in vector order.
    pub fn frontier(&self, now: Secs) -> Option<usize> {
        let mut best: Option<usize> = None;
        for (idx, r) in self.reservations.iter().enumerate() {
            if r.span.end <= now {
                continue;
            }
            match best {
                Some(b) if self.reservations[b].span.end >= r.span.end => {}
                _ => best = Some(idx),
            }
        }
        best
    }
}

/// A bookable resource from the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resource {
    pub id: String,
    pub name: String,
    pub description: String,
    pub group: String,
}

// ── Query result types ───────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ResourceStatus {
    pub reserved_until: Option<Secs>,
    pub is_yours: bool,
}

/// How a successful booking landed on the timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingKind {
    /// Resource was free; reservation starts now.
    Started,
    /// Caller already held the frontier; it was lengthened.
    Extended,
    /// Someone else holds the frontier; reservation starts after it.
    Queued,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Booking {
    pub reservation: Reservation,
    pub kind: BookingKind,
}

/// A reservation as seen by one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotState {
    Yours,
    Open,
    Reserved,
}

impl SlotState {
    /// Action the resource page offers for a slot in this state.
    pub fn action(self) -> Option<&'static str> {
        match self {
            SlotState::Yours => Some("cancel"),
            SlotState::Open => Some("claim"),
            SlotState::Reserved => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotInfo {
    pub start: Secs,
    pub end: Secs,
    pub info: String,
    pub state: SlotState,
    /// Starts after `now`.
    pub upcoming: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<&'static str>,
}

/// What a booking made now would do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outlook", rename_all = "snake_case")]
pub enum Outlook {
    Free,
    Extend { remaining_minutes: i64 },
    Queued { after: Secs, minutes_until: i64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimelineView {
    pub resource: Resource,
    pub now: Secs,
    pub slots: Vec<SlotInfo>,
    pub outlook: Outlook,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceSummary {
    pub id: String,
    pub name: String,
    #[serde(flatten)]
    pub status: ResourceStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupSummary {
    pub group: String,
    pub resources: Vec<ResourceSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn res(holder: Holder, start: Secs, end: Secs) -> Reservation {
        Reservation::new(holder, "", Span::new(start, end))
    }

    #[test]
    fn span_basics() {
        let s = Span::new(100, 200);
        assert_eq!(s.duration_secs(), 100);
        assert!(s.contains_instant(100));
        assert!(s.contains_instant(199));
        assert!(!s.contains_instant(200)); // half-open
    }

    #[test]
    fn span_historical_is_strict() {
        let s = Span::new(100, 200);
        assert!(!s.is_historical(200));
        assert!(s.is_historical(201));
    }

    #[test]
    fn holder_display_parse() {
        assert_eq!(Holder::Open.to_string(), "open");
        assert_eq!(Holder::parse("open"), Holder::Open);
        assert_eq!(Holder::parse("abc-_."), Holder::Session("abc-_.".into()));
        assert!(Holder::Session("s".into()).is_session("s"));
        assert!(!Holder::Open.is_session("open"));
    }

    #[test]
    fn timeline_sort_by_start() {
        let mut tl = Timeline::new();
        tl.push(res(Holder::Open, 300, 400));
        tl.push(res(Holder::Open, 100, 200));
        tl.push(res(Holder::Open, 200, 300));
        tl.sort();
        let starts: Vec<_> = tl.reservations.iter().map(|r| r.span.start).collect();
        assert_eq!(starts, vec![100, 200, 300]);
    }

    #[test]
    fn frontier_ignores_expired() {
        let mut tl = Timeline::new();
        tl.push(res(Holder::Session("a".into()), 0, 100));
        assert_eq!(tl.frontier(100), None);
        assert_eq!(tl.frontier(99), Some(0));
    }

    #[test]
    fn frontier_picks_greatest_end() {
        let mut tl = Timeline::new();
        tl.push(res(Holder::Session("a".into()), 0, 500));
        tl.push(res(Holder::Open, 501, 900));
        tl.push(res(Holder::Session("b".into()), 100, 200));
        assert_eq!(tl.frontier(50), Some(1));
    }

    #[test]
    fn frontier_empty_timeline() {
        assert_eq!(Timeline::new().frontier(0), None);
    }
}
