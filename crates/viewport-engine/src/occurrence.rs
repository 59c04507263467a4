//! Occurrence resolution for recurring series.
//!
//! Targets a single occurrence by recurrence id, materializes virtual
//! occurrences from a master, shifts elapsed alarm triggers onto the next
//! in-range occurrence, and reduces a series group to the occurrences that
//! actually need a viewer's action.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::error::{EngineError, Result};
use crate::expand::OccurrenceCursor;
use crate::model::{Alarm, AlarmTrigger, Event, EventTime, RecurrenceId, ViewerContext};
use crate::store::EventStore;
use crate::visibility::has_read_permission;

/// Materialize a virtual occurrence of `master` at `nominal_start`.
///
/// The master's fields are copied, the recurrence rule and series id are
/// cleared, the exception sets are emptied, and start/end are re-anchored
/// at the nominal start preserving the master's duration.
pub fn materialize_occurrence(master: &Event, nominal_start: DateTime<Utc>, tz: Tz) -> Event {
    let duration = master.duration(tz);
    let mut occurrence = master.clone();
    occurrence.rrule = None;
    occurrence.series_id = None;
    occurrence.recurrence_id = Some(RecurrenceId::new(nominal_start));
    occurrence.change_exception_dates = BTreeSet::new();
    occurrence.delete_exception_dates = BTreeSet::new();
    occurrence.start = EventTime::Zoned(nominal_start);
    occurrence.end = EventTime::Zoned(nominal_start + duration);
    occurrence
}

/// Resolve one concrete occurrence of `master` by recurrence id.
///
/// Walks the ascending sequence until a nominal start matches the target
/// (range qualifier ignored). The first candidate past the target instant
/// stops the walk: a date removed via delete exceptions is absent from the
/// sequence and therefore resolves to `InvalidRecurrenceId`, never to the
/// next surviving occurrence.
pub fn resolve_occurrence(
    master: &Event,
    rid: &RecurrenceId,
    cursor: &OccurrenceCursor,
    tz: Tz,
) -> Result<Event> {
    for nominal in cursor.iter() {
        if RecurrenceId::new(nominal).matches(rid) {
            return Ok(materialize_occurrence(master, nominal, tz));
        }
        if nominal > rid.value {
            break;
        }
    }
    Err(EngineError::InvalidRecurrenceId(rid.value.to_rfc3339()))
}

/// Load a series master and resolve one of its occurrences for a viewer.
///
/// # Errors
/// `NotFound` when no event with `event_id` exists, `PermissionDenied` when
/// the viewer has no read standing on it, `InvalidRecurrenceId` when the id
/// targets no valid occurrence.
pub fn resolve_stored_occurrence(
    store: &dyn EventStore,
    event_id: &str,
    rid: &RecurrenceId,
    ctx: &ViewerContext,
) -> Result<Event> {
    let master = store
        .load_event(event_id)?
        .ok_or_else(|| EngineError::NotFound(format!("event {event_id}")))?;
    if !has_read_permission(&master, &ctx.viewer_id) {
        return Err(EngineError::PermissionDenied(format!(
            "viewer {} on event {event_id}",
            ctx.viewer_id
        )));
    }
    let cursor = OccurrenceCursor::for_master(&master, rid.value.min(master.start.resolve(ctx.tz)), ctx.tz)?;
    resolve_occurrence(&master, rid, &cursor, ctx.tz)
}

/// Move an elapsed trigger forward onto the next occurrence whose fire time
/// lands inside `[from, until)`.
///
/// `occurrences` must be the ascending sequence restarted after the
/// occurrence the trigger currently points at. On success the trigger's
/// recurrence id and fire time are rewritten and `true` is returned; when no
/// occurrence qualifies the trigger is left untouched and the caller's
/// in-range check will drop it.
pub fn shift_trigger_into_range(
    trigger: &mut AlarmTrigger,
    alarm: &Alarm,
    occurrences: impl Iterator<Item = DateTime<Utc>>,
    from: DateTime<Utc>,
    until: DateTime<Utc>,
) -> bool {
    for nominal in occurrences {
        let fire = alarm.trigger_time(nominal);
        if fire >= until {
            // Ascending starts mean ascending fire times; nothing later fits.
            return false;
        }
        if fire >= from {
            trigger.recurrence_id = Some(RecurrenceId::new(nominal));
            trigger.trigger_time = fire;
            return true;
        }
    }
    false
}

/// Fields compared when judging whether a change exception is an actual
/// reschedule rather than a cosmetic participation change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RescheduleField {
    Start,
    End,
    RecurrenceRange,
}

/// Configurable comparison set for [`reduce_to_actionable`].
#[derive(Debug, Clone)]
pub struct ReschedulePolicy {
    pub fields: Vec<RescheduleField>,
}

impl Default for ReschedulePolicy {
    fn default() -> Self {
        ReschedulePolicy {
            fields: vec![
                RescheduleField::Start,
                RescheduleField::End,
                RescheduleField::RecurrenceRange,
            ],
        }
    }
}

impl ReschedulePolicy {
    /// Whether `exception` materially differs from the virtual occurrence it
    /// overrides, on any of the configured fields.
    pub fn is_reschedule(&self, exception: &Event, virtual_occurrence: &Event, tz: Tz) -> bool {
        self.fields.iter().any(|field| match field {
            RescheduleField::Start => {
                exception.start.resolve(tz) != virtual_occurrence.start.resolve(tz)
            }
            RescheduleField::End => {
                exception.end.resolve(tz) != virtual_occurrence.end.resolve(tz)
            }
            RescheduleField::RecurrenceRange => {
                exception.recurrence_id.and_then(|r| r.range)
                    != virtual_occurrence.recurrence_id.and_then(|r| r.range)
            }
        })
    }
}

/// Reduce a series group (master plus change exceptions sharing a UID) to
/// the occurrences a viewer actually needs to act on.
///
/// Change exceptions that only differ from their virtual occurrence in
/// participation metadata are dropped; the master's change-exception dates
/// are trimmed to the survivors. Groups without a master, and singleton
/// groups, pass through unchanged.
pub fn reduce_to_actionable(group: Vec<Event>, tz: Tz, policy: &ReschedulePolicy) -> Vec<Event> {
    if group.len() < 2 {
        return group;
    }
    let Some(master) = group.iter().find(|e| e.is_series_master()).cloned() else {
        return group;
    };

    let mut kept_dates: BTreeSet<RecurrenceId> = BTreeSet::new();
    let mut kept: Vec<Event> = Vec::new();
    for event in group {
        if event.is_series_master() {
            continue;
        }
        let Some(rid) = event.recurrence_id else {
            kept.push(event);
            continue;
        };
        let virtual_occurrence = materialize_occurrence(&master, rid.value, tz);
        if policy.is_reschedule(&event, &virtual_occurrence, tz) {
            kept_dates.insert(rid);
            kept.push(event);
        }
    }

    let mut master = master;
    master
        .change_exception_dates
        .retain(|date| kept_dates.iter().any(|kept| kept.matches(date)));

    let mut reduced = Vec::with_capacity(kept.len() + 1);
    reduced.push(master);
    reduced.extend(kept);
    reduced
}
