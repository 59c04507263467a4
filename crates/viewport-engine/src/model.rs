//! Core calendar data model.
//!
//! Events, attendees, folders, recurrence identifiers, and the derived
//! value types (free/busy intervals, alarm triggers) produced by the query
//! shaping pipeline. Everything here is a read-side view: records are loaded
//! fresh per request and never mutated back into storage by this crate.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Default cap on accumulated result rows per request.
pub const DEFAULT_RESULT_LIMIT: usize = 1000;

/// A point in time that is either pinned to an instant or "floating"
/// (timezone-less wall-clock time, interpreted per viewer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventTime {
    Zoned(DateTime<Utc>),
    Floating(NaiveDateTime),
}

impl EventTime {
    /// Resolve to a concrete instant. Floating times are interpreted as
    /// wall-clock time in `tz`; an ambiguous or skipped local time falls
    /// back to the earliest valid mapping, then to a UTC reading.
    pub fn resolve(&self, tz: Tz) -> DateTime<Utc> {
        match self {
            EventTime::Zoned(instant) => *instant,
            EventTime::Floating(naive) => tz
                .from_local_datetime(naive)
                .earliest()
                .map(|local| local.with_timezone(&Utc))
                .unwrap_or_else(|| Utc.from_utc_datetime(naive)),
        }
    }

    pub fn is_floating(&self) -> bool {
        matches!(self, EventTime::Floating(_))
    }
}

/// "This and future" qualifier on a recurrence identifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum RangeQualifier {
    ThisAndFuture,
}

/// Identifies one occurrence of a recurring series by its nominal start
/// instant, with an optional range qualifier.
///
/// Ordering and set membership include the qualifier; [`RecurrenceId::matches`]
/// deliberately ignores it when comparing against a requested id.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct RecurrenceId {
    pub value: DateTime<Utc>,
    pub range: Option<RangeQualifier>,
}

impl RecurrenceId {
    pub fn new(value: DateTime<Utc>) -> Self {
        RecurrenceId { value, range: None }
    }

    pub fn with_range(value: DateTime<Utc>, range: RangeQualifier) -> Self {
        RecurrenceId {
            value,
            range: Some(range),
        }
    }

    /// Compare by nominal instant only, ignoring the range qualifier.
    pub fn matches(&self, other: &RecurrenceId) -> bool {
        self.value == other.value
    }
}

/// Event classification controlling cross-viewer visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Classification {
    Public,
    Confidential,
    Private,
}

/// RFC 5545 transparency: whether the event consumes free/busy time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transparency {
    Opaque,
    Transparent,
}

/// Legacy tri-state availability marker carried by imported events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShownAs {
    Absent,
    Temporary,
    Free,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventStatus {
    Confirmed,
    Tentative,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CalendarUserKind {
    Individual,
    Group,
    Resource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Participation {
    NeedsAction,
    Accepted,
    Declined,
    Tentative,
}

/// A participant of an event. Internal attendees (with an `entity` id) keep
/// a personal folder view of the event; external ones only carry a URI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attendee {
    pub entity: Option<String>,
    pub uri: Option<String>,
    pub kind: CalendarUserKind,
    pub partstat: Participation,
    pub folder_id: Option<String>,
    /// The attendee removed the event from their own view.
    pub hidden: bool,
}

impl Attendee {
    pub fn internal(entity: impl Into<String>) -> Self {
        Attendee {
            entity: Some(entity.into()),
            uri: None,
            kind: CalendarUserKind::Individual,
            partstat: Participation::NeedsAction,
            folder_id: None,
            hidden: false,
        }
    }
}

/// Alarm action kind, used to filter pending triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlarmAction {
    Display,
    Audio,
    Email,
}

/// A reminder definition attached to an event. The trigger fires
/// `offset_minutes` before the occurrence start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alarm {
    pub id: String,
    pub action: AlarmAction,
    pub offset_minutes: i64,
}

impl Alarm {
    /// Fire time for an occurrence starting at `occurrence_start`.
    pub fn trigger_time(&self, occurrence_start: DateTime<Utc>) -> DateTime<Utc> {
        occurrence_start - Duration::minutes(self.offset_minutes)
    }
}

/// Bitset of derived per-event summary flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EventFlags(pub u8);

impl EventFlags {
    pub const ATTACHMENTS: EventFlags = EventFlags(1);
    pub const CONFERENCES: EventFlags = EventFlags(1 << 1);
    pub const ALARMS: EventFlags = EventFlags(1 << 2);
    pub const SCHEDULED: EventFlags = EventFlags(1 << 3);
    pub const RECURRING: EventFlags = EventFlags(1 << 4);

    pub fn contains(self, other: EventFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for EventFlags {
    type Output = EventFlags;

    fn bitor(self, rhs: EventFlags) -> EventFlags {
        EventFlags(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for EventFlags {
    fn bitor_assign(&mut self, rhs: EventFlags) {
        self.0 |= rhs.0;
    }
}

/// A stored calendar event as loaded from storage.
///
/// A series master carries an `rrule` and no `recurrence_id`; a change
/// exception carries both `series_id` and `recurrence_id` and overrides one
/// occurrence. Occurrences that are not stored separately are virtual and
/// computed on demand from the master.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub series_id: Option<String>,
    pub recurrence_id: Option<RecurrenceId>,
    /// Static parent folder. `None` means the event lives in the attendees'
    /// personal folders instead.
    pub folder_id: Option<String>,
    /// Calendar user the loaded copy belongs to.
    pub calendar_user: Option<String>,
    pub created_by: String,
    pub organizer: Option<String>,
    pub attendees: Vec<Attendee>,
    pub start: EventTime,
    pub end: EventTime,
    pub classification: Option<Classification>,
    pub transparency: Option<Transparency>,
    pub shown_as: Option<ShownAs>,
    pub status: Option<EventStatus>,
    pub rrule: Option<String>,
    pub change_exception_dates: BTreeSet<RecurrenceId>,
    pub delete_exception_dates: BTreeSet<RecurrenceId>,
    /// Last modification instant, fed into the client sync cursor.
    pub timestamp: DateTime<Utc>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub attachments: u32,
    pub conferences: u32,
    pub alarms: Vec<Alarm>,
    /// Derived summary flags, when already loaded by storage.
    pub flags: Option<EventFlags>,
}

impl Event {
    pub fn is_series_master(&self) -> bool {
        self.rrule.is_some() && self.recurrence_id.is_none()
    }

    pub fn is_change_exception(&self) -> bool {
        self.series_id.is_some() && self.recurrence_id.is_some()
    }

    /// Event duration with floating endpoints resolved in `tz`.
    pub fn duration(&self, tz: Tz) -> Duration {
        self.end.resolve(tz) - self.start.resolve(tz)
    }

    /// Whether `viewer` appears as a non-hidden attendee.
    pub fn attends(&self, viewer: &str) -> bool {
        self.attendees
            .iter()
            .any(|a| a.entity.as_deref() == Some(viewer) && !a.hidden)
    }

    pub fn attendee(&self, viewer: &str) -> Option<&Attendee> {
        self.attendees
            .iter()
            .find(|a| a.entity.as_deref() == Some(viewer))
    }
}

impl Default for Event {
    fn default() -> Self {
        let epoch = Utc.timestamp_opt(0, 0).unwrap();
        Event {
            id: String::new(),
            series_id: None,
            recurrence_id: None,
            folder_id: None,
            calendar_user: None,
            created_by: String::new(),
            organizer: None,
            attendees: Vec::new(),
            start: EventTime::Zoned(epoch),
            end: EventTime::Zoned(epoch),
            classification: None,
            transparency: None,
            shown_as: None,
            status: None,
            rrule: None,
            change_exception_dates: BTreeSet::new(),
            delete_exception_dates: BTreeSet::new(),
            timestamp: epoch,
            summary: None,
            description: None,
            location: None,
            attachments: 0,
            conferences: 0,
            alarms: Vec::new(),
            flags: None,
        }
    }
}

/// Ordered access scope of one permission facet.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum AccessScope {
    None,
    Own,
    All,
}

/// A viewer's own permissions on one folder.
///
/// Field order is the documented ranking priority: the derived `Ord` gives
/// exactly the lexicographic comparison used to pick the best candidate
/// folder (read, then write, then delete, then folder admin level, then the
/// admin flag).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct FolderPermissions {
    pub read: AccessScope,
    pub write: AccessScope,
    pub delete: AccessScope,
    pub folder: u8,
    pub admin: bool,
}

impl FolderPermissions {
    pub fn none() -> Self {
        FolderPermissions {
            read: AccessScope::None,
            write: AccessScope::None,
            delete: AccessScope::None,
            folder: 0,
            admin: false,
        }
    }
}

/// A folder as seen by the requesting viewer, carrying the viewer's
/// precomputed own-permission tuple. Read-only in this crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Folder {
    pub id: String,
    pub owner: String,
    pub own_permissions: FolderPermissions,
}

/// Availability type of one free/busy interval, in ascending conflict
/// severity order: `Free < BusyTentative < Busy < BusyUnavailable`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FreeBusyKind {
    Free,
    BusyTentative,
    Busy,
    BusyUnavailable,
}

impl FreeBusyKind {
    /// Conflict severity; the higher value wins where intervals overlap.
    pub fn severity(self) -> u8 {
        match self {
            FreeBusyKind::Free => 0,
            FreeBusyKind::BusyTentative => 1,
            FreeBusyKind::Busy => 2,
            FreeBusyKind::BusyUnavailable => 3,
        }
    }
}

/// A typed availability interval derived from one source event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FreeBusyTime {
    pub kind: FreeBusyKind,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub event_id: Option<String>,
}

/// A pending reminder occurrence for a viewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlarmTrigger {
    pub event_id: String,
    pub recurrence_id: Option<RecurrenceId>,
    pub alarm_id: String,
    pub trigger_time: DateTime<Utc>,
    pub folder_id: String,
}

/// Sort key for the final projected result list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortKey {
    Start,
    End,
    Timestamp,
    Id,
}

/// Requested ordering of projected events. Floating times are compared
/// after resolution in the viewer's timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortOrder {
    pub key: SortKey,
    pub descending: bool,
}

impl Default for SortOrder {
    fn default() -> Self {
        SortOrder {
            key: SortKey::Start,
            descending: false,
        }
    }
}

/// Immutable per-call viewer context threaded through every operation.
///
/// Replaces ambient session state: timezone, privacy mode, the mask id used
/// to exclude an event from its own free/busy check, and the result guard
/// limit all travel here.
#[derive(Debug, Clone)]
pub struct ViewerContext {
    pub viewer_id: String,
    pub tz: Tz,
    /// When false, events the viewer has no read standing on are anonymized.
    pub include_private: bool,
    /// Event or series id excluded from consideration (the event being edited).
    pub mask_id: Option<String>,
    /// Compute derived flags for events that do not carry them yet.
    pub want_flags: bool,
    /// When set, series masters are expanded into concrete occurrences
    /// within this half-open window.
    pub expansion: Option<(DateTime<Utc>, DateTime<Utc>)>,
    /// Caller-supplied parent folder; skips per-event folder selection.
    pub folder_id: Option<String>,
    pub max_results: usize,
}

impl ViewerContext {
    pub fn new(viewer_id: impl Into<String>, tz: Tz) -> Self {
        ViewerContext {
            viewer_id: viewer_id.into(),
            tz,
            include_private: true,
            mask_id: None,
            want_flags: false,
            expansion: None,
            folder_id: None,
            max_results: DEFAULT_RESULT_LIMIT,
        }
    }
}
