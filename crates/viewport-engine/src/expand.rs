//! Recurrence expansion — restartable occurrence sequences for a series.
//!
//! Wraps the `rrule` crate: the master's DTSTART, RRULE and delete-exception
//! dates are assembled into an iCalendar text block, parsed once, and
//! materialized up to a bounded horizon. The resulting cursor hands out any
//! number of independent ascending iterators; restarting after an arbitrary
//! instant never disturbs a previously obtained iterator.

use chrono::{DateTime, NaiveDateTime, Utc};
use chrono_tz::Tz;
use rrule::RRuleSet;

use crate::error::{EngineError, Result};
use crate::model::{Event, EventTime};

/// Hard cap on raw instances produced per rule, bounding unbounded rules.
pub const MAX_SCAN: u16 = 500;

fn ical_naive(naive: &NaiveDateTime) -> String {
    naive.format("%Y%m%dT%H%M%S").to_string()
}

fn ical_local(instant: DateTime<Utc>, tz: Tz) -> String {
    instant
        .with_timezone(&tz)
        .format("%Y%m%dT%H%M%S")
        .to_string()
}

/// A bounded, ascending sequence of nominal occurrence starts for one
/// series master, with delete-exception dates already removed.
#[derive(Debug, Clone)]
pub struct OccurrenceCursor {
    dates: Vec<DateTime<Utc>>,
}

impl OccurrenceCursor {
    /// Build the occurrence sequence for `master`, seeded at `seed`:
    /// occurrences starting before the seed instant are discarded.
    ///
    /// Floating start times and exception dates are interpreted in `tz`.
    ///
    /// # Errors
    /// `InvalidRule` when the master has no recurrence rule or the rule
    /// text does not parse.
    pub fn for_master(master: &Event, seed: DateTime<Utc>, tz: Tz) -> Result<Self> {
        let rule = master
            .rrule
            .as_deref()
            .ok_or_else(|| EngineError::InvalidRule(format!("event {} is not recurring", master.id)))?;
        if rule.is_empty() {
            return Err(EngineError::InvalidRule("empty RRULE string".to_string()));
        }

        let dtstart_ical = match &master.start {
            EventTime::Floating(naive) => ical_naive(naive),
            EventTime::Zoned(instant) => ical_local(*instant, tz),
        };

        let mut rrule_text = format!(
            "DTSTART;TZID={}:{}\nRRULE:{}",
            tz.name(),
            dtstart_ical,
            rule
        );

        // Delete exceptions become EXDATE lines so removed nominal instants
        // never appear in the sequence at all.
        if !master.delete_exception_dates.is_empty() {
            let exdates: Vec<String> = master
                .delete_exception_dates
                .iter()
                .map(|rid| ical_local(rid.value, tz))
                .collect();
            rrule_text.push_str(&format!("\nEXDATE;TZID={}:{}", tz.name(), exdates.join(",")));
        }

        let rrule_set: RRuleSet = rrule_text
            .parse()
            .map_err(|e| EngineError::InvalidRule(format!("{}", e)))?;

        // The instance cap counts raw instances before EXDATE filtering;
        // widen it so removed dates do not eat into the horizon.
        let scan = MAX_SCAN.saturating_add(master.delete_exception_dates.len() as u16);
        let mut dates: Vec<DateTime<Utc>> = rrule_set
            .all(scan)
            .dates
            .into_iter()
            .map(|dt| dt.with_timezone(&Utc))
            .collect();
        dates.retain(|d| *d >= seed);

        Ok(OccurrenceCursor { dates })
    }

    /// Fresh ascending iterator over all occurrences from the seed onward.
    pub fn iter(&self) -> impl Iterator<Item = DateTime<Utc>> + '_ {
        self.dates.iter().copied()
    }

    /// Fresh ascending iterator restarted strictly after `instant`.
    pub fn iter_after(&self, instant: DateTime<Utc>) -> impl Iterator<Item = DateTime<Utc>> + '_ {
        self.dates.iter().copied().filter(move |d| *d > instant)
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }
}
