//! Shared fixtures for integration tests: event/folder builders and an
//! in-memory store double.

#![allow(dead_code)]

use std::collections::HashMap;

use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::Tz;

use viewport_engine::error::{EngineError, Result};
use viewport_engine::model::{
    AccessScope, AlarmAction, AlarmTrigger, Attendee, Event, EventTime, Folder, FolderPermissions,
};
use viewport_engine::store::{EventStore, FolderSource, SearchCriteria, TimeZoneSource};

pub fn ts(year: i32, month: u32, day: u32, hour: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, min, 0).unwrap()
}

/// Minimal event owned and created by `creator`.
pub fn event(id: &str, creator: &str) -> Event {
    Event {
        id: id.to_string(),
        created_by: creator.to_string(),
        calendar_user: Some(creator.to_string()),
        ..Default::default()
    }
}

pub fn timed_event(id: &str, creator: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Event {
    Event {
        start: EventTime::Zoned(start),
        end: EventTime::Zoned(end),
        timestamp: start,
        ..event(id, creator)
    }
}

pub fn perms(
    read: AccessScope,
    write: AccessScope,
    delete: AccessScope,
    folder: u8,
    admin: bool,
) -> FolderPermissions {
    FolderPermissions {
        read,
        write,
        delete,
        folder,
        admin,
    }
}

pub fn read_all() -> FolderPermissions {
    perms(AccessScope::All, AccessScope::Own, AccessScope::Own, 0, false)
}

pub fn folder(id: &str, owner: &str, own_permissions: FolderPermissions) -> Folder {
    Folder {
        id: id.to_string(),
        owner: owner.to_string(),
        own_permissions,
    }
}

pub fn attendee_in_folder(entity: &str, folder_id: &str) -> Attendee {
    Attendee {
        folder_id: Some(folder_id.to_string()),
        ..Attendee::internal(entity)
    }
}

/// In-memory store double. Set `fail` to simulate an upstream outage.
#[derive(Default)]
pub struct MemoryStore {
    pub events: HashMap<String, Event>,
    pub tombstones: Vec<Event>,
    pub triggers: Vec<AlarmTrigger>,
    pub folders: Vec<Folder>,
    pub zones: HashMap<String, Tz>,
    pub fail: bool,
}

impl MemoryStore {
    pub fn with_events(events: Vec<Event>) -> Self {
        MemoryStore {
            events: events.into_iter().map(|e| (e.id.clone(), e)).collect(),
            ..Default::default()
        }
    }

    fn check(&self) -> Result<()> {
        if self.fail {
            return Err(EngineError::Upstream("storage offline".to_string()));
        }
        Ok(())
    }
}

impl EventStore for MemoryStore {
    fn load_event(&self, id: &str) -> Result<Option<Event>> {
        self.check()?;
        Ok(self.events.get(id).cloned())
    }

    fn load_events(&self, ids: &[String]) -> Result<HashMap<String, Event>> {
        self.check()?;
        Ok(ids
            .iter()
            .filter_map(|id| self.events.get(id).map(|e| (id.clone(), e.clone())))
            .collect())
    }

    fn search_events(&self, criteria: &SearchCriteria) -> Result<Vec<Event>> {
        self.check()?;
        Ok(self
            .events
            .values()
            .filter(|e| {
                criteria.folder_ids.is_empty()
                    || e.folder_id
                        .as_ref()
                        .is_some_and(|f| criteria.folder_ids.contains(f))
            })
            .cloned()
            .collect())
    }

    fn search_tombstones(&self, _criteria: &SearchCriteria) -> Result<Vec<Event>> {
        self.check()?;
        Ok(self.tombstones.clone())
    }

    fn load_triggers(
        &self,
        _viewer: &str,
        until: DateTime<Utc>,
        _action: Option<AlarmAction>,
    ) -> Result<Vec<AlarmTrigger>> {
        self.check()?;
        Ok(self
            .triggers
            .iter()
            .filter(|t| t.trigger_time < until)
            .cloned()
            .collect())
    }
}

impl FolderSource for MemoryStore {
    fn visible_folders(&self, _viewer: &str) -> Result<Vec<Folder>> {
        self.check()?;
        Ok(self.folders.clone())
    }
}

impl TimeZoneSource for MemoryStore {
    fn timezone_for(&self, entity: &str) -> Option<Tz> {
        self.zones.get(entity).copied()
    }
}
