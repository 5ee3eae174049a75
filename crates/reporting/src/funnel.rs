//! Funnel step cards: distinct users per lead-form step.

use insights_core::config::FunnelStepConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::canonical::EventCanonicalizer;
use crate::normalize::NormalizedEvent;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunnelStep {
    /// Canonical event name the step counts.
    pub event_name: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunnelCard {
    pub label: String,
    pub users: u64,
}

/// Ordered step list, keyed by canonical event names.
#[derive(Debug, Clone)]
pub struct FunnelCounter {
    steps: Vec<FunnelStep>,
}

impl FunnelCounter {
    pub fn new(steps: &[FunnelStepConfig], canonicalizer: &EventCanonicalizer) -> Self {
        Self {
            steps: steps
                .iter()
                .map(|s| FunnelStep {
                    event_name: canonicalizer.canonicalize(&s.key),
                    label: s.label.clone(),
                })
                .collect(),
        }
    }

    pub fn steps(&self) -> &[FunnelStep] {
        &self.steps
    }

    /// One card per step, in step order. `rows` must be the date-restricted
    /// table, not the user-filtered view.
    pub fn count(&self, rows: &[NormalizedEvent]) -> Vec<FunnelCard> {
        self.steps
            .iter()
            .map(|step| {
                let users: HashSet<&str> = rows
                    .iter()
                    .filter(|r| r.record.event_name == step.event_name)
                    .map(|r| r.record.raw_user_id.as_str())
                    .collect();
                FunnelCard {
                    label: step.label.clone(),
                    users: users.len() as u64,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize_identities;
    use crate::test_support::event;

    fn counter() -> FunnelCounter {
        let canon = EventCanonicalizer::new(["envio_leads_leadster"], "lead");
        FunnelCounter::new(&insights_core::config::PipelineConfig::default().funnel_steps, &canon)
    }

    #[test]
    fn test_step_keys_are_canonicalized() {
        let c = counter();
        assert_eq!(c.steps()[0].event_name, "etapa - 0 - iniciar");
        assert_eq!(c.steps()[4].event_name, "lead");
    }

    #[test]
    fn test_cards_preserve_step_order_and_count_distinct_users() {
        let canon = EventCanonicalizer::new(["envio_leads_leadster"], "lead");
        let records = vec![
            event("2025-01-01", "Etapa - 0 - Iniciar", "u1"),
            event("2025-01-01", "Etapa - 0 - Iniciar", "u1"),
            event("2025-01-01", "Etapa - 0 - Iniciar", "u2"),
            event("2025-01-01", "Etapa - 1 - name", "u2"),
            event("2025-01-01", "envio_leads_leadster", "u2"),
        ];
        let (_, mut rows) = normalize_identities(&records, "unknown", 1000);
        canon.apply(&mut rows);

        let cards = counter().count(&rows);
        let labels: Vec<_> = cards.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(
            labels,
            vec![
                "Iniciar Forms",
                "Preencher Nome",
                "Preencher E-mail",
                "Preencher Tel.",
                "Envio lead"
            ]
        );
        let users: Vec<_> = cards.iter().map(|c| c.users).collect();
        assert_eq!(users, vec![2, 1, 0, 0, 1]);
    }

    #[test]
    fn test_empty_table_yields_zero_cards() {
        let cards = counter().count(&[]);
        assert_eq!(cards.len(), 5);
        assert!(cards.iter().all(|c| c.users == 0));
    }
}
