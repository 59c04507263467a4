//! Free/busy interval computation.
//!
//! Converts a viewer's visible events into typed availability intervals,
//! then normalizes them against a request window: clip to the window, sort,
//! and merge so that the more conflicting type wins wherever intervals
//! overlap. The output is always sorted ascending, pairwise non-overlapping
//! and minimal, and normalization is idempotent.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::model::{
    Attendee, CalendarUserKind, Event, EventStatus, FreeBusyKind, FreeBusyTime, ShownAs,
    Transparency, ViewerContext,
};
use crate::store::TimeZoneSource;
use crate::visibility::consider_for_free_busy;

/// Availability type of one event.
///
/// Precedence: explicit TRANSPARENT marks the event free; the legacy
/// tri-state marker maps absent/temporary/free; then tentative status maps
/// to tentative-busy and cancelled to free. Events with neither status nor
/// transparency default to busy.
pub fn free_busy_kind(event: &Event) -> FreeBusyKind {
    if event.transparency == Some(Transparency::Transparent) {
        return FreeBusyKind::Free;
    }
    if let Some(shown_as) = event.shown_as {
        return match shown_as {
            ShownAs::Absent => FreeBusyKind::BusyUnavailable,
            ShownAs::Temporary => FreeBusyKind::BusyTentative,
            ShownAs::Free => FreeBusyKind::Free,
        };
    }
    match event.status {
        Some(EventStatus::Tentative) => FreeBusyKind::BusyTentative,
        Some(EventStatus::Cancelled) => FreeBusyKind::Free,
        _ => FreeBusyKind::Busy,
    }
}

/// One availability interval per event. Floating start/end times are
/// interpreted in `tz`.
pub fn to_free_busy_times(events: &[Event], tz: Tz) -> Vec<FreeBusyTime> {
    events
        .iter()
        .map(|event| FreeBusyTime {
            kind: free_busy_kind(event),
            start: event.start.resolve(tz),
            end: event.end.resolve(tz),
            event_id: Some(event.id.clone()),
        })
        .collect()
}

/// Clip intervals to `[from, until)` and merge overlaps.
///
/// Intervals entirely outside the window are dropped; boundary intervals are
/// raised to `from` / lowered to `until`. Where intervals overlap, the type
/// with the higher conflict severity wins for the overlapping sub-range, and
/// adjacent intervals of identical type are coalesced. With fewer than two
/// survivors after clipping, merging is a no-op.
pub fn normalize(
    intervals: Vec<FreeBusyTime>,
    from: DateTime<Utc>,
    until: DateTime<Utc>,
) -> Vec<FreeBusyTime> {
    let mut clipped: Vec<FreeBusyTime> = intervals
        .into_iter()
        .filter(|i| i.start < until && i.end > from)
        .map(|mut i| {
            if i.start < from {
                i.start = from;
            }
            if i.end > until {
                i.end = until;
            }
            i
        })
        .collect();

    if clipped.len() < 2 {
        return clipped;
    }

    clipped.sort_by(|a, b| (a.start, a.end).cmp(&(b.start, b.end)));
    merge(&clipped)
}

/// Sweep over the elementary segments between all interval boundaries; each
/// segment takes the covering interval with the highest severity, first one
/// winning ties. Touching segments of identical type coalesce.
fn merge(intervals: &[FreeBusyTime]) -> Vec<FreeBusyTime> {
    let mut bounds: Vec<DateTime<Utc>> = intervals
        .iter()
        .flat_map(|i| [i.start, i.end])
        .collect();
    bounds.sort();
    bounds.dedup();

    let mut merged: Vec<FreeBusyTime> = Vec::new();
    for pair in bounds.windows(2) {
        let (seg_start, seg_end) = (pair[0], pair[1]);

        let mut winner: Option<&FreeBusyTime> = None;
        for interval in intervals {
            if interval.start <= seg_start && interval.end >= seg_end {
                match winner {
                    Some(current) if interval.kind.severity() > current.kind.severity() => {
                        winner = Some(interval);
                    }
                    None => winner = Some(interval),
                    Some(_) => {}
                }
            }
        }
        // Gaps between disjoint intervals produce no output segment.
        let Some(winner) = winner else {
            continue;
        };

        if let Some(last) = merged.last_mut() {
            if last.end == seg_start && last.kind == winner.kind {
                last.end = seg_end;
                continue;
            }
        }
        merged.push(FreeBusyTime {
            kind: winner.kind,
            start: seg_start,
            end: seg_end,
            event_id: winner.event_id.clone(),
        });
    }
    merged
}

/// Full free/busy assembly for one viewer: visibility filter, interval
/// conversion, then window normalization.
///
/// The context's mask id excludes the event being edited from its own
/// availability; private events foreign to the viewer never contribute.
pub fn compute_free_busy(
    events: &[Event],
    ctx: &ViewerContext,
    from: DateTime<Utc>,
    until: DateTime<Utc>,
) -> Vec<FreeBusyTime> {
    let visible: Vec<Event> = events
        .iter()
        .filter(|e| consider_for_free_busy(e, &ctx.viewer_id, ctx.mask_id.as_deref()))
        .cloned()
        .collect();
    normalize(to_free_busy_times(&visible, ctx.tz), from, until)
}

/// Timezone used to interpret an attendee's floating times: internal
/// individuals use their configured zone, everyone else falls back to the
/// viewer's.
pub fn attendee_timezone(
    attendee: &Attendee,
    zones: &dyn TimeZoneSource,
    viewer_tz: Tz,
) -> Tz {
    match (&attendee.kind, &attendee.entity) {
        (CalendarUserKind::Individual, Some(entity)) => {
            zones.timezone_for(entity).unwrap_or(viewer_tz)
        }
        _ => viewer_tz,
    }
}
