//! Identity normalization: drops untracked visitors and swaps raw pseudo ids
//! for compact sequential surrogate keys.

use insights_core::EventRecord;
use serde::Serialize;
use std::collections::HashMap;

/// An event row carrying its surrogate user id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizedEvent {
    pub user_id: u32,
    #[serde(flatten)]
    pub record: EventRecord,
}

/// Bijection between raw pseudo ids and surrogate ids for one pipeline run.
#[derive(Debug, Clone, Default)]
pub struct IdentityMap {
    offset: u32,
    by_raw: HashMap<String, u32>,
    ordered: Vec<String>,
}

impl IdentityMap {
    pub fn new(offset: u32) -> Self {
        Self {
            offset,
            by_raw: HashMap::new(),
            ordered: Vec::new(),
        }
    }

    /// Returns the surrogate for `raw`, assigning the next one on first sight.
    fn assign(&mut self, raw: &str) -> u32 {
        if let Some(id) = self.by_raw.get(raw) {
            return *id;
        }
        let id = self.offset + self.ordered.len() as u32;
        self.by_raw.insert(raw.to_string(), id);
        self.ordered.push(raw.to_string());
        id
    }

    pub fn get(&self, raw: &str) -> Option<u32> {
        self.by_raw.get(raw).copied()
    }

    /// Raw id for a surrogate, if it was assigned in this run.
    pub fn raw_for(&self, user_id: u32) -> Option<&str> {
        let idx = user_id.checked_sub(self.offset)? as usize;
        self.ordered.get(idx).map(String::as_str)
    }

    /// Raw ids in assignment (first-seen) order.
    pub fn raw_ids(&self) -> &[String] {
        &self.ordered
    }

    pub fn offset(&self) -> u32 {
        self.offset
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }
}

/// Drops rows whose raw id equals `unknown_id` and attaches surrogate ids in
/// order of first appearance.
pub fn normalize_identities(
    records: &[EventRecord],
    unknown_id: &str,
    offset: u32,
) -> (IdentityMap, Vec<NormalizedEvent>) {
    let mut map = IdentityMap::new(offset);
    let rows = records
        .iter()
        .filter(|r| r.raw_user_id != unknown_id)
        .map(|r| NormalizedEvent {
            user_id: map.assign(&r.raw_user_id),
            record: r.clone(),
        })
        .collect();
    (map, rows)
}
