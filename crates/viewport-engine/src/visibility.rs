//! Per-viewer visibility and folder selection.
//!
//! Decides whether an event may be seen by a viewer at all, and which of
//! several candidate parent folders should be reported as its location.
//! Folder candidates are ranked by the viewer's own permission tuple; the
//! comparison is the derived lexicographic order on
//! [`FolderPermissions`](crate::model::FolderPermissions).

use crate::model::{AccessScope, Classification, Event, Folder};

/// Whether an event counts toward a viewer's free/busy at all.
///
/// `mask` excludes the event (or its whole series) currently being edited
/// from its own availability check. Public and confidential events always
/// count; private events only when the viewer is the event's calendar user,
/// organizer or an attendee. Unclassified events are treated as public.
pub fn consider_for_free_busy(event: &Event, viewer: &str, mask: Option<&str>) -> bool {
    if let Some(mask) = mask {
        if event.id == mask || event.series_id.as_deref() == Some(mask) {
            return false;
        }
    }
    match event.classification {
        None | Some(Classification::Public) | Some(Classification::Confidential) => true,
        Some(Classification::Private) => {
            event.calendar_user.as_deref() == Some(viewer)
                || event.organizer.as_deref() == Some(viewer)
                || event.attendee(viewer).is_some()
        }
    }
}

/// Whether the viewer's permissions on a folder let them see this event
/// there: full read access, or own-only read access on an event they created.
pub fn folder_view_allowed(folder: &Folder, event: &Event, viewer: &str) -> bool {
    match folder.own_permissions.read {
        AccessScope::All => true,
        AccessScope::Own => event.created_by == viewer,
        AccessScope::None => false,
    }
}

/// Select the folder the event should be reported under for this viewer.
///
/// A static folder is checked directly. For events living in per-attendee
/// personal folders, the viewer's own attendee folder wins unconditionally;
/// otherwise the best readable candidate among all attendees' folders is
/// chosen by permission ranking, the first candidate winning ties.
///
/// `None` means the event is not visible in any folder.
pub fn choose_folder_id(event: &Event, viewer: &str, folders: &[Folder]) -> Option<String> {
    if let Some(folder_id) = &event.folder_id {
        let folder = folders.iter().find(|f| &f.id == folder_id)?;
        return folder_view_allowed(folder, event, viewer).then(|| folder_id.clone());
    }

    // Own attendee folder: always the viewer's own data, no ranking needed.
    if let Some(own) = event.attendee(viewer) {
        if let Some(folder_id) = &own.folder_id {
            return Some(folder_id.clone());
        }
    }

    let mut best: Option<&Folder> = None;
    for attendee in &event.attendees {
        let Some(folder_id) = &attendee.folder_id else {
            continue;
        };
        let Some(folder) = folders.iter().find(|f| &f.id == folder_id) else {
            continue;
        };
        if !folder_view_allowed(folder, event, viewer) {
            continue;
        }
        match best {
            // Strict comparison: a total tie keeps the first candidate.
            Some(current) if folder.own_permissions > current.own_permissions => {
                best = Some(folder);
            }
            None => best = Some(folder),
            Some(_) => {}
        }
    }
    best.map(|f| f.id.clone())
}

/// Read standing on the event itself, independent of folder permissions:
/// calendar user, creator, attendee, or organizer.
pub fn has_read_permission(event: &Event, viewer: &str) -> bool {
    event.calendar_user.as_deref() == Some(viewer)
        || event.created_by == viewer
        || event.organizer.as_deref() == Some(viewer)
        || event.attendee(viewer).is_some()
}
