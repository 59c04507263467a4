//! Collaborator seams for storage, folder and timezone lookups.
//!
//! The query shaping core treats persistence as a black box behind these
//! traits. Implementations are synchronous; any failure they report is
//! surfaced as [`EngineError::Upstream`](crate::EngineError::Upstream) and
//! aborts the whole operation rather than yielding partial results.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::error::Result;
use crate::model::{AlarmAction, AlarmTrigger, Event, Folder};

/// Search parameters for event queries.
#[derive(Debug, Clone, Default)]
pub struct SearchCriteria {
    pub folder_ids: Vec<String>,
    pub series_id: Option<String>,
    /// Half-open `[from, until)` window on the event extent.
    pub window: Option<(DateTime<Utc>, DateTime<Utc>)>,
}

/// Read access to persisted events, attendees and pending triggers.
pub trait EventStore {
    fn load_event(&self, id: &str) -> Result<Option<Event>>;

    /// Batch-load events by id in one query. Missing ids are simply absent
    /// from the returned map.
    fn load_events(&self, ids: &[String]) -> Result<HashMap<String, Event>>;

    fn search_events(&self, criteria: &SearchCriteria) -> Result<Vec<Event>>;

    /// Deleted-event markers matching the criteria, for sync clients.
    fn search_tombstones(&self, criteria: &SearchCriteria) -> Result<Vec<Event>>;

    /// Pending alarm triggers for a viewer whose stored fire time is before
    /// `until`, optionally restricted to one action kind.
    fn load_triggers(
        &self,
        viewer: &str,
        until: DateTime<Utc>,
        action: Option<AlarmAction>,
    ) -> Result<Vec<AlarmTrigger>>;
}

/// Folder metadata provider. Each returned folder carries the viewer's own
/// precomputed permission tuple.
pub trait FolderSource {
    fn visible_folders(&self, viewer: &str) -> Result<Vec<Folder>>;
}

/// Maps internal calendar users to their configured timezone.
pub trait TimeZoneSource {
    fn timezone_for(&self, entity: &str) -> Option<Tz>;
}
