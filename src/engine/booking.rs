use crate::limits::*;
use crate::model::*;

use super::error::ValidationError;

/// Trim, and flatten control characters so the info always fits on one store line.
pub fn sanitize_info(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect::<String>()
        .trim()
        .to_string()
}

/// Check booking preconditions. Returns the sanitized info on success.
pub fn validate_booking(duration_minutes: i64, info: &str) -> Result<String, ValidationError> {
    let info = sanitize_info(info);
    if info.is_empty() {
        return Err(ValidationError::EmptyInfo);
    }
    if info.len() > MAX_INFO_LEN {
        return Err(ValidationError::InfoTooLong(info.len()));
    }
    if !(MIN_DURATION_MINUTES..=MAX_DURATION_MINUTES).contains(&duration_minutes) {
        return Err(ValidationError::DurationOutOfRange(duration_minutes));
    }
    Ok(info)
}

/// "Reserved until" and "is yours" for one session.
///
/// The first reservation the session holds right now wins outright. Otherwise the
/// latest end among unexpired, non-OPEN reservations is reported.
pub fn status_of(timeline: &Timeline, session: &str, now: Secs) -> ResourceStatus {
    let mut status = ResourceStatus::default();
    for r in &timeline.reservations {
        if r.span.end <= now {
            continue;
        }
        if r.span.start <= now && r.holder.is_session(session) {
            return ResourceStatus {
                reserved_until: Some(r.span.end),
                is_yours: true,
            };
        }
        if !r.holder.is_open() && status.reserved_until.is_none_or(|until| r.span.end > until) {
            status.reserved_until = Some(r.span.end);
        }
    }
    status
}

/// Attach a validated booking to the timeline's frontier.
///
/// Fails without touching the timeline when the resulting end would pass
/// [`MAX_TIMESTAMP`].
pub fn apply_booking(
    timeline: &mut Timeline,
    session: &str,
    duration_minutes: i64,
    info: String,
    now: Secs,
) -> Result<Booking, ValidationError> {
    let duration = duration_minutes * 60;
    let end_after = |start: Secs| {
        start
            .checked_add(duration)
            .filter(|end| *end <= MAX_TIMESTAMP)
            .ok_or(ValidationError::EndOutOfRange)
    };

    let booking = match timeline.frontier(now) {
        None => {
            let span = Span::new(now, end_after(now)?);
            let reservation = Reservation::new(Holder::Session(session.to_string()), info, span);
            timeline.push(reservation.clone());
            Booking {
                reservation,
                kind: BookingKind::Started,
            }
        }
        Some(idx) if timeline.reservations[idx].holder.is_session(session) => {
            let end = end_after(timeline.reservations[idx].span.end)?;
            let frontier = &mut timeline.reservations[idx];
            frontier.span.end = end;
            frontier.info = info;
            Booking {
                reservation: frontier.clone(),
                kind: BookingKind::Extended,
            }
        }
        Some(idx) => {
            // One second past the current holder's end.
            let start = timeline.reservations[idx]
                .span
                .end
                .checked_add(1)
                .ok_or(ValidationError::EndOutOfRange)?;
            let span = Span::new(start, end_after(start)?);
            let reservation = Reservation::new(Holder::Session(session.to_string()), info, span);
            timeline.push(reservation.clone());
            Booking {
                reservation,
                kind: BookingKind::Queued,
            }
        }
    };
    Ok(booking)
}

/// Release the session's unexpired slot starting at `start` back to OPEN.
pub fn apply_cancel(
    timeline: &mut Timeline,
    session: &str,
    start: Secs,
    now: Secs,
) -> Option<Reservation> {
    let slot = timeline.reservations.iter_mut().find(|r| {
        r.span.start == start && !r.span.is_historical(now) && r.holder.is_session(session)
    })?;
    slot.holder = Holder::Open;
    slot.info.clear();
    Some(slot.clone())
}

/// Take over the unexpired OPEN slot starting at `start`.
pub fn apply_claim(
    timeline: &mut Timeline,
    session: &str,
    start: Secs,
    now: Secs,
) -> Option<Reservation> {
    let slot = timeline.reservations.iter_mut().find(|r| {
        r.span.start == start && !r.span.is_historical(now) && r.holder.is_open()
    })?;
    slot.holder = Holder::Session(session.to_string());
    slot.info = CLAIMED.to_string();
    Some(slot.clone())
}

pub fn outlook(timeline: &Timeline, session: &str, now: Secs) -> Outlook {
    match timeline.frontier(now) {
        None => Outlook::Free,
        Some(idx) => {
            let frontier = &timeline.reservations[idx];
            let minutes = (frontier.span.end - now) / 60;
            if frontier.holder.is_session(session) {
                Outlook::Extend {
                    remaining_minutes: minutes,
                }
            } else {
                Outlook::Queued {
                    after: frontier.span.end,
                    minutes_until: minutes,
                }
            }
        }
    }
}

/// Unexpired reservations in start order, as seen by `session`.
pub fn slots(timeline: &Timeline, session: &str, now: Secs) -> Vec<SlotInfo> {
    let mut live: Vec<&Reservation> = timeline
        .reservations
        .iter()
        .filter(|r| !r.span.is_historical(now))
        .collect();
    live.sort_by_key(|r| r.span.start);
    live.into_iter()
        .map(|r| {
            let state = match &r.holder {
                Holder::Open => SlotState::Open,
                h if h.is_session(session) => SlotState::Yours,
                _ => SlotState::Reserved,
            };
            SlotInfo {
                start: r.span.start,
                end: r.span.end,
                info: r.info.clone(),
                state,
                upcoming: r.span.start > now,
                action: state.action(),
            }
        })
        .collect()
}
