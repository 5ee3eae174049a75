//! The landing page events query.
//!
//! Expects a GA4-style export table in ClickHouse:
//!
//! ```sql
//! CREATE TABLE events (
//!     event_date Date,
//!     event_timestamp Int64,          -- microseconds since epoch
//!     event_name String,
//!     user_pseudo_id String,
//!     event_params Nested(key String, string_value Nullable(String))
//! ) ENGINE = MergeTree()
//! PARTITION BY toYYYYMM(event_date)
//! ORDER BY (event_date, user_pseudo_id)
//! ```

use chrono::NaiveDate;
use insights_core::config::WarehouseConfig;
use insights_core::{InsightsError, InsightsResult, ProfileAttribute};
use sha2::{Digest, Sha256};

/// Event parameter carrying the UTM campaign term.
const TERM_PARAM: &str = "term";
/// Event parameter carrying the free-text phrase.
const PHRASE_PARAM: &str = "frase";

/// Rendered, parameterized events query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventQuery {
    table: String,
    min_event_date: NaiveDate,
    page_filter: String,
}

impl EventQuery {
    pub fn new(table: &str, min_event_date: NaiveDate, page_filter: &str) -> InsightsResult<Self> {
        if !is_identifier(table) {
            return Err(InsightsError::Config(format!(
                "invalid events table name: {table:?}"
            )));
        }
        Ok(Self {
            table: table.to_string(),
            min_event_date,
            page_filter: page_filter.to_string(),
        })
    }

    pub fn from_config(cfg: &WarehouseConfig) -> InsightsResult<Self> {
        let min_event_date = NaiveDate::parse_from_str(&cfg.min_event_date, "%Y-%m-%d")
            .map_err(|e| {
                InsightsError::Config(format!(
                    "invalid min_event_date {:?}: {e}",
                    cfg.min_event_date
                ))
            })?;
        Self::new(&cfg.table, min_event_date, &cfg.page_filter)
    }

    pub fn min_event_date(&self) -> NaiveDate {
        self.min_event_date
    }

    /// SQL text with `?` placeholders, bound in [`EventQuery::binds`] order.
    pub fn sql(&self) -> String {
        let mut per_user = vec![
            param_column(TERM_PARAM, "utm_term"),
            param_column(PHRASE_PARAM, "frase"),
        ];
        per_user.extend(ProfileAttribute::ALL.iter().map(|a| param_column(a.key(), a.key())));

        let mut selected = vec!["frases.utm_term".to_string(), "frases.frase".to_string()];
        selected.extend(ProfileAttribute::ALL.iter().map(|a| format!("frases.{}", a.key())));

        format!(
            "WITH
frases AS (
    SELECT
        user_pseudo_id,
        {per_user}
    FROM {table}
    ARRAY JOIN event_params
    WHERE event_date >= toDate(?)
    GROUP BY user_pseudo_id
),
eventos AS (
    SELECT DISTINCT
        event_date,
        formatDateTime(fromUnixTimestamp64Micro(event_timestamp), '%H:%i:%S') AS event_time,
        event_name,
        user_pseudo_id
    FROM {table}
    ARRAY JOIN event_params
    WHERE event_date >= toDate(?)
        AND event_params.string_value LIKE ?
)
SELECT
    toString(eventos.event_date) AS event_date,
    eventos.event_time AS event_time,
    eventos.event_name AS event_name,
    eventos.user_pseudo_id AS user_pseudo_id,
    {selected}
FROM eventos
LEFT JOIN frases ON frases.user_pseudo_id = eventos.user_pseudo_id
SETTINGS join_use_nulls = 1",
            per_user = per_user.join(",\n        "),
            selected = selected.join(",\n    "),
            table = self.table,
        )
    }

    /// Bound values, in placeholder order.
    pub fn binds(&self) -> [String; 3] {
        let date = self.min_event_date.format("%Y-%m-%d").to_string();
        [date.clone(), date, like_contains(&self.page_filter)]
    }

    /// Stable cache key for this query and its bound values.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.sql().as_bytes());
        for bind in self.binds() {
            hasher.update([0u8]);
            hasher.update(bind.as_bytes());
        }
        hex::encode(hasher.finalize())
    }
}

fn param_column(param: &str, alias: &str) -> String {
    format!("maxIf(event_params.string_value, event_params.key = '{param}') AS {alias}")
}

/// `LIKE` pattern matching any value that contains `needle` literally.
fn like_contains(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Plain or database-qualified identifier.
fn is_identifier(name: &str) -> bool {
    !name.is_empty()
        && name.split('.').count() <= 2
        && name.split('.').all(|part| {
            let mut chars = part.chars();
            matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
}
