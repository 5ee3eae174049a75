//! Landing page dashboard: runs the whole pipeline for one interaction and
//! returns every panel as plain data.

use chrono::NaiveDate;
use insights_core::config::PipelineConfig;
use insights_core::{EventRecord, InsightsError, InsightsResult, ProfileAttribute};
use insights_platform::Session;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

use crate::canonical::EventCanonicalizer;
use crate::filter::{self, apply_filters, restrict_to_range, DateRange, FilterPlan};
use crate::funnel::{FunnelCard, FunnelCounter};
use crate::normalize::{normalize_identities, NormalizedEvent};
use crate::profile::{ProfileAnalyzer, ProfileBreakdown};
use crate::timeseries::{unique_users_by_day, TimeSeriesPoint};
use crate::wordfreq::{TermPhrase, TextAnalyzer, WordCloud, WordCount};

/// Widget selections for one dashboard run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardQuery {
    #[serde(default = "default_event_selection")]
    pub events: Vec<String>,
    #[serde(default = "default_term_selection")]
    pub terms: Vec<String>,
    /// Defaults to the first date in the data.
    #[serde(default)]
    pub start: Option<NaiveDate>,
    /// Defaults to the last date in the data.
    #[serde(default)]
    pub end: Option<NaiveDate>,
    #[serde(default)]
    pub profile_attribute: Option<ProfileAttribute>,
}

fn default_event_selection() -> Vec<String> {
    vec![filter::DEFAULT.to_string()]
}

fn default_term_selection() -> Vec<String> {
    vec![filter::ALL.to_string()]
}

impl Default for DashboardQuery {
    fn default() -> Self {
        Self {
            events: default_event_selection(),
            terms: default_term_selection(),
            start: None,
            end: None,
            profile_attribute: None,
        }
    }
}

/// Choices offered by the sidebar widgets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterOptions {
    /// Sentinels followed by every canonical event name, first-seen order.
    pub event_choices: Vec<String>,
    /// `"Todos"` followed by every non-null UTM term, first-seen order.
    pub term_choices: Vec<String>,
    pub default_events: Vec<String>,
    pub min_date: Option<NaiveDate>,
    pub max_date: Option<NaiveDate>,
    pub profile_attributes: Vec<ProfileAttribute>,
}

/// One row of the filtered event log table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventLogRow {
    pub event_date: NaiveDate,
    pub user_id: u32,
    pub event_name: String,
    pub utm_term: Option<String>,
    pub phrase: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardReport {
    pub filter_options: FilterOptions,
    pub date_range: Option<DateRange>,
    pub tracked_users: usize,
    pub funnel: Vec<FunnelCard>,
    pub events: Vec<EventLogRow>,
    pub phrase_cloud: WordCloud,
    pub term_cloud: WordCloud,
    pub top_phrase_words: Vec<WordCount>,
    pub top_term_words: Vec<WordCount>,
    pub term_phrase_pairs: Vec<TermPhrase>,
    /// `None` when there is nothing to chart.
    pub timeseries: Option<Vec<TimeSeriesPoint>>,
    pub profile: Option<ProfileBreakdown>,
}

pub struct DashboardPipeline {
    unknown_user_id: String,
    surrogate_offset: u32,
    canonicalizer: EventCanonicalizer,
    default_events: Vec<String>,
    funnel: FunnelCounter,
    text: TextAnalyzer,
    profile: ProfileAnalyzer,
}

impl DashboardPipeline {
    pub fn from_config(cfg: &PipelineConfig) -> InsightsResult<Self> {
        let canonicalizer = EventCanonicalizer::new(&cfg.lead_aliases, cfg.lead_label.as_str());
        let default_events = cfg
            .default_events
            .iter()
            .map(|e| canonicalizer.canonicalize(e))
            .collect();
        let funnel = FunnelCounter::new(&cfg.funnel_steps, &canonicalizer);
        let text = TextAnalyzer::new(cfg.phrase_min_token_len, cfg.term_min_token_len, cfg.top_words)
            .map_err(|e| InsightsError::Config(format!("invalid token pattern: {e}")))?;
        let profile = ProfileAnalyzer::new(canonicalizer.label(), cfg.histogram_bins);

        Ok(Self {
            unknown_user_id: cfg.unknown_user_id.clone(),
            surrogate_offset: cfg.surrogate_offset,
            canonicalizer,
            default_events,
            funnel,
            text,
            profile,
        })
    }

    fn prepare(&self, records: &[EventRecord]) -> (usize, Vec<NormalizedEvent>) {
        let (identities, mut rows) =
            normalize_identities(records, &self.unknown_user_id, self.surrogate_offset);
        self.canonicalizer.apply(&mut rows);
        (identities.len(), rows)
    }

    /// Selected event names in row form. Sentinels pass through untouched.
    fn canonical_selection(&self, events: &[String]) -> Vec<String> {
        events
            .iter()
            .map(|e| {
                if e == filter::ALL || e == filter::DEFAULT {
                    e.clone()
                } else {
                    self.canonicalizer.canonicalize(e)
                }
            })
            .collect()
    }

    fn require(session: &Session) -> InsightsResult<()> {
        if session.authenticated {
            Ok(())
        } else {
            Err(InsightsError::Unauthenticated)
        }
    }

    pub fn options(&self, session: &Session, records: &[EventRecord]) -> InsightsResult<FilterOptions> {
        Self::require(session)?;
        let (_, rows) = self.prepare(records);
        Ok(self.filter_options(&rows))
    }

    fn filter_options(&self, rows: &[NormalizedEvent]) -> FilterOptions {
        let range = DateRange::covering(rows);

        let mut seen_events = HashSet::new();
        let mut seen_terms = HashSet::new();
        let mut event_choices = vec![filter::ALL.to_string(), filter::DEFAULT.to_string()];
        let mut term_choices = vec![filter::ALL.to_string()];
        for row in rows {
            if seen_events.insert(row.record.event_name.as_str()) {
                event_choices.push(row.record.event_name.clone());
            }
            if let Some(term) = row.record.utm_term.as_deref() {
                if seen_terms.insert(term) {
                    term_choices.push(term.to_string());
                }
            }
        }

        FilterOptions {
            event_choices,
            term_choices,
            default_events: self.default_events.clone(),
            min_date: range.map(|r| r.start),
            max_date: range.map(|r| r.end),
            profile_attributes: ProfileAttribute::ALL.to_vec(),
        }
    }

    pub fn run(
        &self,
        session: &Session,
        records: &[EventRecord],
        query: &DashboardQuery,
    ) -> InsightsResult<DashboardReport> {
        Self::require(session)?;
        metrics::counter!("pipeline.runs").increment(1);

        let (tracked_users, rows) = self.prepare(records);
        let filter_options = self.filter_options(&rows);
        let bounds = DateRange::covering(&rows);
        let date_range = match (query.start, query.end, bounds) {
            (Some(start), Some(end), _) => Some(DateRange::new(start, end)?),
            (Some(start), None, Some(b)) => Some(DateRange::new(start, b.end.max(start))?),
            (None, Some(end), Some(b)) => Some(DateRange::new(b.start.min(end), end)?),
            (None, None, b) => b,
            // A one-sided range over an empty table.
            (Some(day), None, None) | (None, Some(day), None) => Some(DateRange::new(day, day)?),
        };

        let Some(range) = date_range else {
            debug!("No events available, returning empty dashboard");
            return Ok(self.empty_report(filter_options, query));
        };

        let funnel = self.funnel.count(&restrict_to_range(&rows, &range));

        let events = self.canonical_selection(&query.events);
        let plan = FilterPlan::resolve(&events, &query.terms);
        let filtered = apply_filters(&rows, &plan, &self.default_events, &range);
        debug!(
            plan = ?plan,
            total = rows.len(),
            filtered = filtered.len(),
            "Filters applied"
        );

        let mut events: Vec<EventLogRow> = filtered
            .iter()
            .map(|r| EventLogRow {
                event_date: r.record.event_date,
                user_id: r.user_id,
                event_name: r.record.event_name.clone(),
                utm_term: r.record.utm_term.clone(),
                phrase: r.record.phrase.clone(),
            })
            .collect();
        events.sort_by_key(|e| e.event_date);

        let text = self.text.analyze(&filtered);

        Ok(DashboardReport {
            filter_options,
            date_range: Some(range),
            tracked_users,
            funnel,
            events,
            phrase_cloud: text.phrase_cloud,
            term_cloud: text.term_cloud,
            top_phrase_words: text.top_phrase_words,
            top_term_words: text.top_term_words,
            term_phrase_pairs: text.term_phrase_pairs,
            timeseries: unique_users_by_day(&filtered),
            profile: query
                .profile_attribute
                .map(|attr| self.profile.analyze(&filtered, attr)),
        })
    }

    fn empty_report(&self, filter_options: FilterOptions, query: &DashboardQuery) -> DashboardReport {
        DashboardReport {
            filter_options,
            date_range: None,
            tracked_users: 0,
            funnel: self.funnel.count(&[]),
            events: Vec::new(),
            phrase_cloud: WordCloud::default(),
            term_cloud: WordCloud::default(),
            top_phrase_words: Vec::new(),
            top_term_words: Vec::new(),
            term_phrase_pairs: Vec::new(),
            timeseries: None,
            profile: query
                .profile_attribute
                .map(|attr| self.profile.analyze(&[], attr)),
        }
    }
}
