//! Alarm trigger windowing.
//!
//! Selects the pending reminders that fall inside a requested time window,
//! re-targets triggers on recurring events to the correct occurrence, and
//! shifts elapsed triggers forward onto the next in-range occurrence. One
//! bad trigger never aborts the batch: it is logged and dropped. Upstream
//! storage failures abort the whole operation.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::Result;
use crate::expand::OccurrenceCursor;
use crate::model::{AlarmAction, AlarmTrigger, Folder, ViewerContext};
use crate::occurrence::{resolve_occurrence, shift_trigger_into_range};
use crate::store::{EventStore, FolderSource};
use crate::visibility::{choose_folder_id, consider_for_free_busy};

/// Window a batch of loaded triggers against `[from, until)`.
///
/// All referenced events are batch-loaded in a single store query. Per
/// trigger: the event must exist, be visible to the viewer, and still live
/// in the trigger's recorded folder; occurrence-targeted triggers are
/// re-resolved against the current recurrence set (a trigger whose stored
/// occurrence no longer exists is logged and dropped), and a fire time that
/// precedes the window start is shifted onto the next qualifying occurrence.
/// The surviving trigger must still fire inside the window.
pub fn window_triggers(
    triggers: Vec<AlarmTrigger>,
    store: &dyn EventStore,
    folders: &[Folder],
    ctx: &ViewerContext,
    from: DateTime<Utc>,
    until: DateTime<Utc>,
    action: Option<AlarmAction>,
) -> Result<Vec<AlarmTrigger>> {
    let ids: Vec<String> = triggers
        .iter()
        .map(|t| t.event_id.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let events = store.load_events(&ids)?;

    let viewer = &ctx.viewer_id;
    let mut windowed = Vec::new();
    for mut trigger in triggers {
        let Some(event) = events.get(&trigger.event_id) else {
            debug!(event = %trigger.event_id, alarm = %trigger.alarm_id, "trigger references missing event");
            continue;
        };
        if !consider_for_free_busy(event, viewer, None) {
            debug!(event = %event.id, alarm = %trigger.alarm_id, "trigger event not visible to viewer");
            continue;
        }
        let Some(folder_id) = choose_folder_id(event, viewer, folders) else {
            debug!(event = %event.id, alarm = %trigger.alarm_id, "trigger event not readable in any folder");
            continue;
        };
        if folder_id != trigger.folder_id {
            debug!(event = %event.id, alarm = %trigger.alarm_id, "trigger event moved out of recorded folder");
            continue;
        }
        let Some(alarm) = event.alarms.iter().find(|a| a.id == trigger.alarm_id).cloned() else {
            debug!(event = %event.id, alarm = %trigger.alarm_id, "alarm no longer attached to event");
            continue;
        };
        if action.is_some_and(|wanted| alarm.action != wanted) {
            continue;
        }

        if event.rrule.is_some() {
            let seed = match trigger.recurrence_id {
                Some(rid) => rid.value.min(from),
                None => from.min(trigger.trigger_time),
            };
            let cursor = match OccurrenceCursor::for_master(event, seed, ctx.tz) {
                Ok(cursor) => cursor,
                Err(err) => {
                    debug!(event = %event.id, error = %err, "unusable recurrence rule, dropping trigger");
                    continue;
                }
            };

            match trigger.recurrence_id {
                Some(rid) => match resolve_occurrence(event, &rid, &cursor, ctx.tz) {
                    Ok(occurrence) => {
                        let start = occurrence.start.resolve(ctx.tz);
                        trigger.trigger_time = alarm.trigger_time(start);
                        if trigger.trigger_time < from {
                            // Restart the sequence right after the current
                            // occurrence and advance into the window.
                            shift_trigger_into_range(
                                &mut trigger,
                                &alarm,
                                cursor.iter_after(start),
                                from,
                                until,
                            );
                        }
                    }
                    Err(err) => {
                        debug!(event = %event.id, error = %err, "stored occurrence no longer valid, dropping trigger");
                        continue;
                    }
                },
                None => {
                    if trigger.trigger_time < from {
                        shift_trigger_into_range(&mut trigger, &alarm, cursor.iter(), from, until);
                    }
                }
            }
        }

        // Re-check after all adjustments; a trigger that could not be
        // shifted into the window is dropped here.
        if trigger.trigger_time >= from && trigger.trigger_time < until {
            windowed.push(trigger);
        } else {
            debug!(event = %trigger.event_id, alarm = %trigger.alarm_id, "trigger outside requested window");
        }
    }
    Ok(windowed)
}

/// Load and window the viewer's pending triggers in one call.
pub fn window_pending_triggers(
    store: &dyn EventStore,
    folder_source: &dyn FolderSource,
    ctx: &ViewerContext,
    from: DateTime<Utc>,
    until: DateTime<Utc>,
    action: Option<AlarmAction>,
) -> Result<Vec<AlarmTrigger>> {
    let triggers = store.load_triggers(&ctx.viewer_id, until, action)?;
    let folders = folder_source.visible_folders(&ctx.viewer_id)?;
    window_triggers(triggers, store, &folders, ctx, from, until, action)
}
