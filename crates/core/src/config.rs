use serde::{Deserialize, Deserializer};

/// Root application configuration. Loaded from environment variables
/// with the prefix `LANDING_INSIGHTS__` and an optional TOML config file.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_node_id")]
    pub node_id: String,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub warehouse: WarehouseConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarehouseBackend {
    #[serde(rename = "clickhouse")]
    ClickHouse,
    Fixture,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WarehouseConfig {
    #[serde(default = "default_backend")]
    pub backend: WarehouseBackend,
    #[serde(default = "default_clickhouse_url")]
    pub url: String,
    #[serde(default = "default_clickhouse_db")]
    pub database: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_events_table")]
    pub table: String,
    /// Earliest partition date read by the query (`YYYY-MM-DD`).
    #[serde(default = "default_min_event_date")]
    pub min_event_date: String,
    /// Substring an event parameter must contain for the event to count as a
    /// landing page hit.
    #[serde(default = "default_page_filter")]
    pub page_filter: String,
    #[serde(default = "default_fixture_path")]
    pub fixture_path: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthConfig {
    /// Shared dashboard password.
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct FunnelStepConfig {
    pub key: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_unknown_user_id")]
    pub unknown_user_id: String,
    #[serde(default = "default_surrogate_offset")]
    pub surrogate_offset: u32,
    #[serde(default = "default_lead_label")]
    pub lead_label: String,
    #[serde(default = "default_lead_aliases", deserialize_with = "string_list")]
    pub lead_aliases: Vec<String>,
    #[serde(default = "default_events", deserialize_with = "string_list")]
    pub default_events: Vec<String>,
    #[serde(default = "default_funnel_steps")]
    pub funnel_steps: Vec<FunnelStepConfig>,
    #[serde(default = "default_phrase_min_token_len")]
    pub phrase_min_token_len: usize,
    #[serde(default = "default_term_min_token_len")]
    pub term_min_token_len: usize,
    #[serde(default = "default_top_words")]
    pub top_words: usize,
    #[serde(default = "default_histogram_bins")]
    pub histogram_bins: usize,
}

// Default functions
fn default_node_id() -> String {
    "insights-01".to_string()
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_http_port() -> u16 {
    8080
}
fn default_metrics_enabled() -> bool {
    true
}
fn default_metrics_port() -> u16 {
    9091
}
fn default_backend() -> WarehouseBackend {
    WarehouseBackend::ClickHouse
}
fn default_clickhouse_url() -> String {
    "http://localhost:8123".to_string()
}
fn default_clickhouse_db() -> String {
    "analytics".to_string()
}
fn default_events_table() -> String {
    "events".to_string()
}
fn default_min_event_date() -> String {
    "2024-12-12".to_string()
}
fn default_page_filter() -> String {
    "produtos.orbital.company".to_string()
}
fn default_fixture_path() -> String {
    "fixtures/events.json".to_string()
}
fn default_unknown_user_id() -> String {
    "unknown".to_string()
}
fn default_surrogate_offset() -> u32 {
    1000
}
fn default_lead_label() -> String {
    "lead".to_string()
}

/// Accepts a TOML array or a comma-separated string (environment variables).
fn string_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringList {
        List(Vec<String>),
        Joined(String),
    }

    Ok(match StringList::deserialize(deserializer)? {
        StringList::List(items) => items,
        StringList::Joined(joined) => joined
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
    })
}

fn default_lead_aliases() -> Vec<String> {
    ["envio_leads_leadster", "generate_lead", "envio_lead", "form_lead", "lead_submit"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_events() -> Vec<String> {
    ["first_visit", "user_engagement", "envio_leads_leadster"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_funnel_steps() -> Vec<FunnelStepConfig> {
    [
        ("Etapa - 0 - Iniciar", "Iniciar Forms"),
        ("Etapa - 1 - name", "Preencher Nome"),
        ("Etapa - 2 - email", "Preencher E-mail"),
        ("Etapa - 3 - phone", "Preencher Tel."),
        ("envio_leads_leadster", "Envio lead"),
    ]
    .iter()
    .map(|(key, label)| FunnelStepConfig {
        key: key.to_string(),
        label: label.to_string(),
    })
    .collect()
}
fn default_phrase_min_token_len() -> usize {
    4
}
fn default_term_min_token_len() -> usize {
    2
}
fn default_top_words() -> usize {
    20
}
fn default_histogram_bins() -> usize {
    20
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            http_port: default_http_port(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
            port: default_metrics_port(),
        }
    }
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            url: default_clickhouse_url(),
            database: default_clickhouse_db(),
            username: String::new(),
            password: String::new(),
            table: default_events_table(),
            min_event_date: default_min_event_date(),
            page_filter: default_page_filter(),
            fixture_path: default_fixture_path(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            unknown_user_id: default_unknown_user_id(),
            surrogate_offset: default_surrogate_offset(),
            lead_label: default_lead_label(),
            lead_aliases: default_lead_aliases(),
            default_events: default_events(),
            funnel_steps: default_funnel_steps(),
            phrase_min_token_len: default_phrase_min_token_len(),
            term_min_token_len: default_term_min_token_len(),
            top_words: default_top_words(),
            histogram_bins: default_histogram_bins(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            node_id: default_node_id(),
            api: ApiConfig::default(),
            metrics: MetricsConfig::default(),
            warehouse: WarehouseConfig::default(),
            auth: AuthConfig::default(),
            pipeline: PipelineConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from an optional TOML file, then environment variables.
    ///
    /// Environment values stay strings until serde sees the target field, so
    /// a secret like `007` keeps its leading zeros.
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(true));
        }
        let builder = builder.add_source(
            config::Environment::with_prefix("LANDING_INSIGHTS").separator("__"),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Parse configuration from TOML text. Used by tests and embedded setups.
    pub fn from_toml_str(text: &str) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::from_str(text, config::FileFormat::Toml))
            .build()?
            .try_deserialize()
    }
}
