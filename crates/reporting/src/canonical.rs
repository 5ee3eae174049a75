//! Event-name canonicalization.

use std::collections::HashSet;

use crate::normalize::NormalizedEvent;

/// Maps raw event names onto the controlled vocabulary: everything is
/// lower-cased, and lead-capture variants collapse into one label.
#[derive(Debug, Clone)]
pub struct EventCanonicalizer {
    aliases: HashSet<String>,
    label: String,
}

impl EventCanonicalizer {
    pub fn new<I, S>(aliases: I, label: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let label = label.into().to_lowercase();
        Self {
            aliases: aliases
                .into_iter()
                .map(|a| a.as_ref().to_lowercase())
                .collect(),
            label,
        }
    }

    /// The label every alias collapses to.
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn canonicalize(&self, name: &str) -> String {
        let lowered = name.to_lowercase();
        if self.aliases.contains(&lowered) {
            self.label.clone()
        } else {
            lowered
        }
    }

    pub fn apply(&self, rows: &mut [NormalizedEvent]) {
        for row in rows {
            row.record.event_name = self.canonicalize(&row.record.event_name);
        }
    }
}
