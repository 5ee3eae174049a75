//! Unique users per (date, event) for the landing page performance chart.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::normalize::NormalizedEvent;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    pub event_date: NaiveDate,
    pub event_name: String,
    pub unique_users: u64,
}

/// Returns `None` when there is nothing to plot, so the chart is suppressed
/// instead of drawn empty. Points are ordered by date, then event name.
pub fn unique_users_by_day(rows: &[NormalizedEvent]) -> Option<Vec<TimeSeriesPoint>> {
    let mut groups: BTreeMap<(NaiveDate, &str), HashSet<&str>> = BTreeMap::new();
    for row in rows {
        groups
            .entry((row.record.event_date, row.record.event_name.as_str()))
            .or_default()
            .insert(row.record.raw_user_id.as_str());
    }
    if groups.is_empty() {
        return None;
    }
    Some(
        groups
            .into_iter()
            .map(|((event_date, event_name), users)| TimeSeriesPoint {
                event_date,
                event_name: event_name.to_string(),
                unique_users: users.len() as u64,
            })
            .collect(),
    )
}
