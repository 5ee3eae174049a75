//! Filter engine: the event/term decision table followed by the date window.

use chrono::NaiveDate;
use insights_core::{InsightsError, InsightsResult};
use serde::{Deserialize, Serialize};

use crate::normalize::NormalizedEvent;

/// Sentinel option meaning "match everything".
pub const ALL: &str = "Todos";
/// Sentinel option meaning "the configured default event set".
pub const DEFAULT: &str = "Default";

/// Inclusive date window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> InsightsResult<Self> {
        if start > end {
            return Err(InsightsError::InvalidDateRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// Smallest range covering every row, or `None` for an empty table.
    pub fn covering(rows: &[NormalizedEvent]) -> Option<Self> {
        let start = rows.iter().map(|r| r.record.event_date).min()?;
        let end = rows.iter().map(|r| r.record.event_date).max()?;
        Some(Self { start, end })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// How a pair of event/term selections restricts the table.
///
/// Resolution order is significant: earlier cases win when the sentinels are
/// mixed with concrete selections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterPlan {
    /// Both selections contain [`ALL`].
    Unfiltered,
    /// Events contain [`DEFAULT`], terms contain [`ALL`].
    DefaultEvents,
    /// Events contain [`ALL`], terms do not.
    TermsOnly(Vec<String>),
    /// Events have neither sentinel, terms contain [`ALL`].
    EventsOnly(Vec<String>),
    /// Everything else: both memberships, using the raw selections.
    EventsAndTerms { events: Vec<String>, terms: Vec<String> },
}

impl FilterPlan {
    pub fn resolve(events: &[String], terms: &[String]) -> Self {
        let has = |list: &[String], needle: &str| list.iter().any(|s| s == needle);
        let events_all = has(events, ALL);
        let events_default = has(events, DEFAULT);
        let terms_all = has(terms, ALL);

        match (events_all, events_default, terms_all) {
            (true, _, true) => Self::Unfiltered,
            (_, true, true) => Self::DefaultEvents,
            (true, _, false) => Self::TermsOnly(terms.to_vec()),
            (false, false, true) => Self::EventsOnly(events.to_vec()),
            _ => Self::EventsAndTerms {
                events: events.to_vec(),
                terms: terms.to_vec(),
            },
        }
    }

    /// Whether a row passes the event/term stage. `default_events` must
    /// already be canonicalized.
    pub fn matches(&self, row: &NormalizedEvent, default_events: &[String]) -> bool {
        let event = row.record.event_name.as_str();
        let term = row.record.utm_term.as_deref();
        match self {
            Self::Unfiltered => true,
            Self::DefaultEvents => contains(default_events, event),
            Self::TermsOnly(terms) => term.is_some_and(|t| contains(terms, t)),
            Self::EventsOnly(events) => contains(events, event),
            Self::EventsAndTerms { events, terms } => {
                contains(events, event) && term.is_some_and(|t| contains(terms, t))
            }
        }
    }
}

fn contains(list: &[String], value: &str) -> bool {
    list.iter().any(|s| s == value)
}

/// Two-stage filter: plan first, then the date window, always.
pub fn apply_filters(
    rows: &[NormalizedEvent],
    plan: &FilterPlan,
    default_events: &[String],
    range: &DateRange,
) -> Vec<NormalizedEvent> {
    rows.iter()
        .filter(|r| plan.matches(r, default_events))
        .filter(|r| range.contains(r.record.event_date))
        .cloned()
        .collect()
}

/// Date stage alone, as used by the funnel cards.
pub fn restrict_to_range(rows: &[NormalizedEvent], range: &DateRange) -> Vec<NormalizedEvent> {
    rows.iter()
        .filter(|r| range.contains(r.record.event_date))
        .cloned()
        .collect()
}
