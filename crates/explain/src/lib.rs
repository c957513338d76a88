//! Explanation and summaries for scored listings.
//!
//! Breaks a Risk Score down into per-component contributions, and
//! aggregates scored listings by district and by street for display.

use std::collections::BTreeMap;

use landrisk_features::{classify_legal, classify_planning, listing_gap, Verdict};
use landrisk_model::{Component, RiskLevel, RiskThresholds, ScoredListing};
use landrisk_score::{quantile, ScoringContext};
use serde::{Deserialize, Serialize};

/// Label used for a missing address key.
pub const MISSING_KEY: &str = "N/A";

/// How much one component added to a Risk Score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Contribution {
    pub component: Component,

    pub label: &'static str,

    /// Stored value; `None` when unknown
    pub value: Option<f64>,

    /// Value used in the sum (neutral when unknown)
    pub value_used: f64,

    pub weight: f64,

    /// `weight * value_used`
    pub contribution: f64,
}

impl Contribution {
    pub fn is_substituted(&self) -> bool {
        self.value.is_none()
    }
}

/// A structured explanation of one listing's score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreExplanation {
    /// Short summary (1 line)
    pub summary: String,

    pub risk_score: f64,

    pub risk_level: RiskLevel,

    /// Dataset cut points; `None` when the dataset had no finite score
    pub thresholds: Option<RiskThresholds>,

    /// Largest contribution first
    pub contributions: Vec<Contribution>,

    /// Rule that decided the legal cue
    pub legal_cue: Verdict,

    /// Rule that decided the planning cue
    pub planning_cue: Verdict,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub listing_gap: Option<f64>,
}

/// Explain how a row's score was put together under `context`.
pub fn explain_score(row: &ScoredListing, context: &ScoringContext) -> ScoreExplanation {
    let weights = context.weights();
    let mut contributions: Vec<Contribution> = Component::ALL
        .iter()
        .map(|&component| {
            let value_used = row.components.value_for_scoring(component);
            let weight = weights.get(component);
            Contribution {
                component,
                label: component.label(),
                value: row.components.get(component),
                value_used,
                weight,
                contribution: weight * value_used,
            }
        })
        .collect();
    contributions.sort_by(|a, b| b.contribution.total_cmp(&a.contribution));

    let text = row.listing.description_text();
    ScoreExplanation {
        summary: summarize_risk(row, &contributions),
        risk_score: row.risk_score,
        risk_level: row.risk_level,
        thresholds: context.thresholds().copied(),
        contributions,
        legal_cue: classify_legal(text),
        planning_cue: classify_planning(text),
        listing_gap: row.components.listing_gap,
    }
}

/// One-line risk summary naming the components that drove the score.
pub fn summarize_risk(row: &ScoredListing, contributions: &[Contribution]) -> String {
    let level = match row.risk_level {
        RiskLevel::High => "HIGH RISK",
        RiskLevel::Medium => "MODERATE RISK",
        RiskLevel::Low => "LOW RISK",
        RiskLevel::NotAvailable => return "Risk not available".to_string(),
    };

    let drivers: Vec<&str> = contributions
        .iter()
        .filter(|c| !c.is_substituted() && c.value_used >= 0.5 && c.weight > 0.0)
        .map(|c| c.label)
        .collect();

    let unknown = contributions.iter().filter(|c| c.is_substituted()).count();
    let mut summary = if drivers.is_empty() {
        format!("{} ({:.3})", level, row.risk_score)
    } else {
        format!("{} ({:.3}): {}", level, row.risk_score, drivers.join(", "))
    };
    if unknown > 0 {
        summary.push_str(&format!(" [{} unknown]", unknown));
    }
    summary
}

/// Price and risk aggregates over a group of listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupStats {
    pub listings: usize,
    pub median_unit_price: Option<f64>,
    pub median_gov_price: Option<f64>,
    pub median_market_ref: Option<f64>,
    /// Median of MarketRef / GovPrice
    pub median_price_gap: Option<f64>,
    pub mean_risk: Option<f64>,
}

impl GroupStats {
    pub fn from_rows(rows: &[&ScoredListing]) -> Self {
        let collect = |f: fn(&ScoredListing) -> Option<f64>| -> Vec<f64> {
            rows.iter().filter_map(|r| f(r)).collect()
        };

        let risks = collect(|r| Some(r.risk_score).filter(|s| s.is_finite()));
        let mean_risk = if risks.is_empty() {
            None
        } else {
            Some(risks.iter().sum::<f64>() / risks.len() as f64)
        };

        Self {
            listings: rows.len(),
            median_unit_price: quantile(&collect(|r| r.listing.unit_price), 0.5),
            median_gov_price: quantile(&collect(|r| r.listing.gov_price), 0.5),
            median_market_ref: quantile(&collect(|r| r.listing.market_ref_price), 0.5),
            median_price_gap: quantile(
                &collect(|r| listing_gap(r.listing.market_ref_price, r.listing.gov_price)),
                0.5,
            ),
            mean_risk,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistrictSummary {
    pub district: String,
    #[serde(flatten)]
    pub stats: GroupStats,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreetSummary {
    pub district: String,
    pub ward: String,
    pub street: String,
    #[serde(flatten)]
    pub stats: GroupStats,
}

fn key(value: &Option<String>) -> String {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(MISSING_KEY)
        .to_string()
}

/// Aggregate listings per district, sorted by district name.
pub fn summarize_by_district(rows: &[ScoredListing]) -> Vec<DistrictSummary> {
    let mut groups: BTreeMap<String, Vec<&ScoredListing>> = BTreeMap::new();
    for row in rows {
        groups.entry(key(&row.listing.district)).or_default().push(row);
    }

    groups
        .into_iter()
        .map(|(district, members)| DistrictSummary {
            district,
            stats: GroupStats::from_rows(&members),
        })
        .collect()
}

/// Aggregate listings per street, keeping groups with at least
/// `min_listings` rows. Highest mean risk first.
pub fn summarize_streets(rows: &[ScoredListing], min_listings: usize) -> Vec<StreetSummary> {
    let mut groups: BTreeMap<(String, String, String), Vec<&ScoredListing>> = BTreeMap::new();
    for row in rows {
        let listing = &row.listing;
        groups
            .entry((key(&listing.district), key(&listing.ward), key(&listing.street)))
            .or_default()
            .push(row);
    }

    let mut summaries: Vec<StreetSummary> = groups
        .into_iter()
        .filter(|(_, members)| members.len() >= min_listings)
        .map(|((district, ward, street), members)| StreetSummary {
            district,
            ward,
            street,
            stats: GroupStats::from_rows(&members),
        })
        .collect();

    // Stable sort keeps the name order among equal risks; unknown risk last.
    summaries.sort_by(|a, b| {
        let a = a.stats.mean_risk.unwrap_or(f64::NEG_INFINITY);
        let b = b.stats.mean_risk.unwrap_or(f64::NEG_INFINITY);
        b.total_cmp(&a)
    });
    summaries
}
