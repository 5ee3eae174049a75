//! Conversion rate and distribution per profile attribute value.

use insights_core::ProfileAttribute;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::normalize::NormalizedEvent;

/// Label of the bin that absorbs categories past the bin limit.
pub const OTHER_BIN: &str = "Outros";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionRow {
    pub value: String,
    pub total_users: u64,
    pub lead_users: u64,
    /// Percentage, two decimals. Zero when `total_users` is zero.
    pub conversion_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramBin {
    pub label: String,
    /// Numeric bounds, present only for numeric attributes.
    pub lower: Option<f64>,
    pub upper: Option<f64>,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileBreakdown {
    pub attribute: ProfileAttribute,
    pub conversion: Vec<ConversionRow>,
    pub distribution: Vec<HistogramBin>,
}

/// `100 * leads / total` rounded to two decimals; zero for an empty group.
pub fn conversion_rate(leads: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let rate = 100.0 * leads as f64 / total as f64;
    if rate.is_finite() {
        (rate * 100.0).round() / 100.0
    } else {
        0.0
    }
}

pub struct ProfileAnalyzer {
    lead_label: String,
    max_bins: usize,
}

impl ProfileAnalyzer {
    pub fn new(lead_label: impl Into<String>, max_bins: usize) -> Self {
        Self {
            lead_label: lead_label.into(),
            max_bins: max_bins.max(1),
        }
    }

    pub fn analyze(&self, rows: &[NormalizedEvent], attribute: ProfileAttribute) -> ProfileBreakdown {
        ProfileBreakdown {
            attribute,
            conversion: self.conversion(rows, attribute),
            distribution: self.distribution(rows, attribute),
        }
    }

    /// Rows ordered by attribute value. Rows without the attribute are skipped.
    pub fn conversion(&self, rows: &[NormalizedEvent], attribute: ProfileAttribute) -> Vec<ConversionRow> {
        let mut groups: BTreeMap<&str, (HashSet<&str>, HashSet<&str>)> = BTreeMap::new();
        for row in rows {
            let Some(value) = row.record.profile_value(attribute) else {
                continue;
            };
            let user = row.record.raw_user_id.as_str();
            let (all, leads) = groups.entry(value).or_default();
            all.insert(user);
            if row.record.event_name == self.lead_label {
                leads.insert(user);
            }
        }

        groups
            .into_iter()
            .map(|(value, (all, leads))| ConversionRow {
                value: value.to_string(),
                total_users: all.len() as u64,
                lead_users: leads.len() as u64,
                conversion_rate: conversion_rate(leads.len() as u64, all.len() as u64),
            })
            .collect()
    }

    /// Histogram over distinct (user, value) profile rows.
    pub fn distribution(&self, rows: &[NormalizedEvent], attribute: ProfileAttribute) -> Vec<HistogramBin> {
        let mut seen = HashSet::new();
        let values: Vec<&str> = rows
            .iter()
            .filter_map(|r| {
                let value = r.record.profile_value(attribute)?;
                seen.insert((r.record.raw_user_id.as_str(), value)).then_some(value)
            })
            .collect();
        if values.is_empty() {
            return Vec::new();
        }

        let numeric: Option<Vec<f64>> = values.iter().map(|v| v.trim().parse::<f64>().ok()).collect();
        match numeric {
            Some(nums) if nums.iter().all(|n| n.is_finite()) => self.numeric_bins(&nums),
            _ => self.category_bins(&values),
        }
    }

    fn numeric_bins(&self, nums: &[f64]) -> Vec<HistogramBin> {
        let min = nums.iter().copied().fold(f64::INFINITY, f64::min);
        let max = nums.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let distinct = nums.iter().map(|n| n.to_bits()).collect::<HashSet<_>>().len();
        let bins = self.max_bins.min(distinct).max(1);

        if min == max {
            return vec![HistogramBin {
                label: format_bound(min),
                lower: Some(min),
                upper: Some(max),
                count: nums.len() as u64,
            }];
        }

        let width = (max - min) / bins as f64;
        let mut counts = vec![0u64; bins];
        for n in nums {
            let idx = (((n - min) / width) as usize).min(bins - 1);
            counts[idx] += 1;
        }

        counts
            .into_iter()
            .enumerate()
            .map(|(i, count)| {
                let lower = min + width * i as f64;
                let upper = if i + 1 == bins { max } else { lower + width };
                HistogramBin {
                    label: format!("{} - {}", format_bound(lower), format_bound(upper)),
                    lower: Some(lower),
                    upper: Some(upper),
                    count,
                }
            })
            .collect()
    }

    fn category_bins(&self, values: &[&str]) -> Vec<HistogramBin> {
        let mut counts: HashMap<&str, u64> = HashMap::new();
        for v in values {
            *counts.entry(*v).or_default() += 1;
        }
        let mut sorted: Vec<(&str, u64)> = counts.into_iter().collect();
        sorted.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

        let mut bins: Vec<HistogramBin> = Vec::with_capacity(self.max_bins);
        let overflow = sorted.len() > self.max_bins;
        let keep = if overflow { self.max_bins - 1 } else { sorted.len() };
        for (label, count) in &sorted[..keep] {
            bins.push(HistogramBin {
                label: label.to_string(),
                lower: None,
                upper: None,
                count: *count,
            });
        }
        if overflow {
            bins.push(HistogramBin {
                label: OTHER_BIN.to_string(),
                lower: None,
                upper: None,
                count: sorted[keep..].iter().map(|(_, c)| c).sum(),
            });
        }
        bins
    }
}

fn format_bound(v: f64) -> String {
    if v.fract() == 0.0 {
        format!("{v:.0}")
    } else {
        format!("{v:.2}")
    }
}
