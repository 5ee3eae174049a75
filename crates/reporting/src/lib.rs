//! Landing page reporting: identity normalization, event canonicalization,
//! filters, funnel cards, word frequencies, time series, and profile
//! conversion breakdowns.

pub mod canonical;
pub mod dashboard;
pub mod filter;
pub mod funnel;
pub mod normalize;
pub mod profile;
pub mod timeseries;
pub mod wordfreq;

pub use canonical::EventCanonicalizer;
pub use dashboard::{DashboardPipeline, DashboardQuery, DashboardReport, FilterOptions};
pub use filter::{DateRange, FilterPlan};
pub use funnel::FunnelCounter;
pub use normalize::{normalize_identities, IdentityMap, NormalizedEvent};
pub use profile::ProfileAnalyzer;
pub use wordfreq::TextAnalyzer;
