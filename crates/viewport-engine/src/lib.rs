//! # viewport-engine
//!
//! Viewer-scoped calendar query shaping: turns raw stored events into the
//! exact event or time-interval view a specific calendar user is permitted
//! and expected to see.
//!
//! ## Modules
//!
//! - [`model`] — events, attendees, folders, recurrence ids, viewer context
//! - [`visibility`] — per-viewer visibility and ranked folder selection
//! - [`expand`] — restartable recurrence expansion over `rrule`
//! - [`occurrence`] — occurrence targeting, trigger shifting, actionable reduction
//! - [`freebusy`] — typed availability intervals and window normalization
//! - [`projector`] — the per-request result shaping pipeline
//! - [`alarm`] — pending reminder windowing
//! - [`store`] — collaborator seams (storage, folders, timezones)
//! - [`error`] — error types

pub mod alarm;
pub mod error;
pub mod expand;
pub mod freebusy;
pub mod model;
pub mod occurrence;
pub mod projector;
pub mod store;
pub mod visibility;

pub use alarm::{window_pending_triggers, window_triggers};
pub use error::{EngineError, Result};
pub use expand::OccurrenceCursor;
pub use freebusy::{compute_free_busy, free_busy_kind, normalize, to_free_busy_times};
pub use model::{
    AlarmTrigger, Event, EventFlags, Folder, FolderPermissions, FreeBusyKind, FreeBusyTime,
    RecurrenceId, SortOrder, ViewerContext,
};
pub use occurrence::{
    materialize_occurrence, reduce_to_actionable, resolve_occurrence, resolve_stored_occurrence,
    shift_trigger_into_range, ReschedulePolicy,
};
pub use projector::{project, query_events, query_tombstones, EventProjector, Projection};
pub use visibility::{choose_folder_id, consider_for_free_busy, has_read_permission};
