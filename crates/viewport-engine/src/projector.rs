//! Event projection — the per-request result shaping pipeline.
//!
//! Processes raw stored events one at a time for a single viewer: visibility
//! filtering, folder stamping, derived flag computation, sync-cursor
//! tracking, anonymization, recurrence handling (in-range expansion or
//! userized exception-date views), and an incrementally enforced result
//! size guard. Consumed by every read-path query operation.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::{EngineError, Result};
use crate::expand::OccurrenceCursor;
use crate::model::{
    Classification, Event, EventFlags, Folder, RecurrenceId, SortKey, SortOrder, ViewerContext,
};
use crate::occurrence::materialize_occurrence;
use crate::store::{EventStore, SearchCriteria};
use crate::visibility::{choose_folder_id, consider_for_free_busy, has_read_permission};

/// Final projection result: the shaped event list plus the maximum observed
/// modification timestamp, used as a client-side sync cursor.
#[derive(Debug, Clone)]
pub struct Projection {
    pub events: Vec<Event>,
    pub max_timestamp: Option<DateTime<Utc>>,
}

/// Derived summary flags for one event.
pub fn compute_flags(event: &Event) -> EventFlags {
    let mut flags = EventFlags::default();
    if event.attachments > 0 {
        flags |= EventFlags::ATTACHMENTS;
    }
    if event.conferences > 0 {
        flags |= EventFlags::CONFERENCES;
    }
    if !event.alarms.is_empty() {
        flags |= EventFlags::ALARMS;
    }
    if !event.attendees.is_empty() {
        flags |= EventFlags::SCHEDULED;
    }
    if event.rrule.is_some() || event.series_id.is_some() {
        flags |= EventFlags::RECURRING;
    }
    flags
}

/// Strip everything the viewer has no standing to see, leaving only the
/// temporal extent. The event still occupies its slot in availability views.
fn anonymize(event: &mut Event) {
    event.summary = None;
    event.description = None;
    event.location = None;
    event.attendees.clear();
    event.alarms.clear();
    event.attachments = 0;
    event.conferences = 0;
    event.classification = Some(Classification::Private);
}

/// Per-request accumulator shaping events for one viewer.
pub struct EventProjector<'a> {
    ctx: &'a ViewerContext,
    folders: &'a [Folder],
    events: Vec<Event>,
    max_timestamp: Option<DateTime<Utc>>,
}

impl<'a> EventProjector<'a> {
    pub fn new(ctx: &'a ViewerContext, folders: &'a [Folder]) -> Self {
        EventProjector {
            ctx,
            folders,
            events: Vec::new(),
            max_timestamp: None,
        }
    }

    /// Process one stored event. `change_exceptions` are the stored
    /// overrides of this event's series, used for occurrence substitution
    /// and for userizing the master's exception-date sets.
    ///
    /// Invisible events are silently dropped; the size guard trips with
    /// `ResultSizeExceeded` as soon as the accumulated count crosses the
    /// context limit.
    pub fn process(&mut self, event: Event, change_exceptions: &[Event]) -> Result<()> {
        let Some(mut event) = self.shape(event) else {
            return Ok(());
        };

        if event.is_series_master() {
            if let Some((from, until)) = self.ctx.expansion {
                return self.expand_master(event, change_exceptions, from, until);
            }
            self.userize_exception_dates(&mut event, change_exceptions);
        }

        self.append(event)
    }

    /// The per-event shaping steps shared by stored events and substituted
    /// change exceptions: visibility drop (classification/mask rules plus
    /// the hidden-attendee flag), folder stamping, derived flag computation,
    /// max-timestamp tracking, and anonymization. `None` means the event is
    /// not visible to the viewer at all.
    fn shape(&mut self, event: Event) -> Option<Event> {
        let viewer = &self.ctx.viewer_id;

        if !consider_for_free_busy(&event, viewer, self.ctx.mask_id.as_deref()) {
            return None;
        }
        // The attendee hid this event from their own view.
        if event.attendee(viewer).is_some_and(|a| a.hidden) {
            return None;
        }

        let folder_id = match &self.ctx.folder_id {
            Some(folder_id) => folder_id.clone(),
            None => choose_folder_id(&event, viewer, self.folders)?,
        };

        let mut event = event;
        event.folder_id = Some(folder_id);

        if self.ctx.want_flags && event.flags.is_none() {
            event.flags = Some(compute_flags(&event));
        }

        if self.max_timestamp.is_none_or(|max| event.timestamp > max) {
            self.max_timestamp = Some(event.timestamp);
        }

        if !self.ctx.include_private && !has_read_permission(&event, viewer) {
            anonymize(&mut event);
        }

        Some(event)
    }

    /// Expand a series master into concrete occurrences overlapping
    /// `[from, until)`, substituting stored change exceptions and skipping
    /// occurrences the viewer was removed from. Substituted exceptions are
    /// shaped like any other stored event; a virtual occurrence inherits the
    /// already-shaped master's fields. Every emitted occurrence passes the
    /// size guard individually.
    fn expand_master(
        &mut self,
        master: Event,
        change_exceptions: &[Event],
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<()> {
        let tz = self.ctx.tz;
        // Seed early enough to catch an occurrence straddling the window start.
        let seed = from - master.duration(tz);
        let cursor = match OccurrenceCursor::for_master(&master, seed, tz) {
            Ok(cursor) => cursor,
            Err(err) => {
                debug!(event = %master.id, error = %err, "dropping master with unusable rule");
                return Ok(());
            }
        };

        let viewer = &self.ctx.viewer_id;
        for nominal in cursor.iter() {
            if nominal >= until {
                break;
            }
            let rid = RecurrenceId::new(nominal);
            let occurrence = match change_exceptions
                .iter()
                .find(|e| e.recurrence_id.is_some_and(|r| r.matches(&rid)))
            {
                Some(exception) => {
                    // Removed from this occurrence: it does not exist for them.
                    if master.attends(viewer) && !exception.attends(viewer) {
                        continue;
                    }
                    // The exception is its own stored record; it gets the
                    // full shaping the master already went through.
                    match self.shape(exception.clone()) {
                        Some(shaped) => shaped,
                        None => continue,
                    }
                }
                None => materialize_occurrence(&master, nominal, tz),
            };
            if occurrence.end.resolve(tz) <= from {
                continue;
            }
            self.append(occurrence)?;
        }
        Ok(())
    }

    /// Replace the master's exception-date sets with the viewer's view of
    /// them: a change exception the viewer no longer attends moves its date
    /// from the change set into the delete set.
    fn userize_exception_dates(&self, master: &mut Event, change_exceptions: &[Event]) {
        let viewer = &self.ctx.viewer_id;
        if !master.attends(viewer) {
            return;
        }
        for exception in change_exceptions {
            let Some(rid) = exception.recurrence_id else {
                continue;
            };
            if !exception.attends(viewer) {
                master.change_exception_dates.retain(|date| !date.matches(&rid));
                master.delete_exception_dates.insert(rid);
            }
        }
    }

    fn append(&mut self, event: Event) -> Result<()> {
        self.events.push(event);
        // Checked after every append to bound peak memory, not just at the end.
        if self.events.len() > self.ctx.max_results {
            return Err(EngineError::ResultSizeExceeded {
                limit: self.ctx.max_results,
            });
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Sort the accumulated events per the requested ordering (floating
    /// times resolved in the context timezone) and yield the projection.
    pub fn finish(mut self, order: SortOrder) -> Projection {
        let tz = self.ctx.tz;
        self.events.sort_by(|a, b| {
            let ordering = match order.key {
                SortKey::Start => a.start.resolve(tz).cmp(&b.start.resolve(tz)),
                SortKey::End => a.end.resolve(tz).cmp(&b.end.resolve(tz)),
                SortKey::Timestamp => a.timestamp.cmp(&b.timestamp),
                SortKey::Id => a.id.cmp(&b.id),
            };
            if order.descending {
                ordering.reverse()
            } else {
                ordering
            }
        });
        Projection {
            events: self.events,
            max_timestamp: self.max_timestamp,
        }
    }
}

/// Project a batch of stored events for one viewer in one call.
///
/// `change_exceptions` maps a master's id to its stored series overrides.
pub fn project(
    events: Vec<Event>,
    change_exceptions: &HashMap<String, Vec<Event>>,
    ctx: &ViewerContext,
    folders: &[Folder],
    order: SortOrder,
) -> Result<Projection> {
    let mut projector = EventProjector::new(ctx, folders);
    let empty: Vec<Event> = Vec::new();
    for event in events {
        let exceptions = change_exceptions.get(&event.id).unwrap_or(&empty);
        projector.process(event, exceptions)?;
    }
    Ok(projector.finish(order))
}

/// Search events through the storage seam and project the results.
///
/// Stored change exceptions among the search hits are routed to their
/// masters for substitution and userization instead of being projected as
/// standalone rows.
pub fn query_events(
    store: &dyn EventStore,
    criteria: &SearchCriteria,
    ctx: &ViewerContext,
    folders: &[Folder],
    order: SortOrder,
) -> Result<Projection> {
    let hits = store.search_events(criteria)?;

    let mut masters: Vec<Event> = Vec::new();
    let mut change_exceptions: HashMap<String, Vec<Event>> = HashMap::new();
    for event in hits {
        match &event.series_id {
            Some(series_id) if event.is_change_exception() => {
                change_exceptions
                    .entry(series_id.clone())
                    .or_default()
                    .push(event);
            }
            _ => masters.push(event),
        }
    }

    project(masters, &change_exceptions, ctx, folders, order)
}

/// Deleted-event markers matching the criteria, for sync clients paired with
/// [`Projection::max_timestamp`]. Only records the viewer had read standing
/// on are reported.
pub fn query_tombstones(
    store: &dyn EventStore,
    criteria: &SearchCriteria,
    ctx: &ViewerContext,
) -> Result<Vec<Event>> {
    let hits = store.search_tombstones(criteria)?;
    Ok(hits
        .into_iter()
        .filter(|e| has_read_permission(e, &ctx.viewer_id))
        .collect())
}
