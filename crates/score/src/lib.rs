//! Risk scoring for listing datasets.
//!
//! Scoring runs in two phases:
//! 1. `ScoringContext::build` looks at the whole dataset once and fixes the
//!    weight vector and the Q33/Q67 level thresholds. A dataset with no
//!    finite score (an empty one, say) has no thresholds and every level
//!    reads as N/A.
//! 2. `ScoringContext::score` maps one row's components to a score and a
//!    level using only that fixed context.
//!
//! `RiskEngine` ties extraction, the context cache and both phases together.

mod cache;

use std::sync::Arc;

use landrisk_features::extract_components;
use landrisk_model::{
    Component, Listing, ModelError, RiskComponents, RiskConfig, RiskLevel, RiskThresholds,
    ScoredListing, WeightVector,
};
use landrisk_weights::{component_weights, method_for, WeightingMethod};
use serde::Serialize;
use thiserror::Error;

pub use cache::{ContextCache, DatasetVersion, DEFAULT_CACHE_CAPACITY};

/// Errors from setting up a `RiskEngine`.
#[derive(Debug, Error, PartialEq)]
pub enum ScoreError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ModelError),
}

/// Weighting key for fixed, caller-supplied weights.
const FIXED_WEIGHTING: &str = "fixed";

/// Quantile with linear interpolation between closest ranks.
///
/// Non-finite values are ignored. Returns `None` when nothing finite is
/// left.
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(f64::total_cmp);

    let mut position = (sorted.len() - 1) as f64 * q.clamp(0.0, 1.0);
    // (n - 1) * (2/3) can land a hair off an integer rank.
    if (position - position.round()).abs() < 1e-9 {
        position = position.round();
    }

    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
}

/// Weighted sum of components, reading unknown components as neutral.
pub fn weighted_score(components: &RiskComponents, weights: &WeightVector) -> f64 {
    Component::ALL
        .iter()
        .map(|c| weights.get(*c) * components.value_for_scoring(*c))
        .sum()
}

/// Dataset-level state shared by every row of one snapshot.
///
/// Immutable once built. Rebuild it whenever the underlying rows change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoringContext {
    weighting: String,
    weights: WeightVector,
    thresholds: Option<RiskThresholds>,
    rows: usize,
}

impl ScoringContext {
    /// Derive weights with `method`, then the level thresholds.
    pub fn build(components: &[RiskComponents], method: &dyn WeightingMethod) -> Self {
        let weights = component_weights(method, components);
        Self::with_weights(components, weights, method.name())
    }

    /// Use the given weights and derive only the level thresholds.
    pub fn with_weights(
        components: &[RiskComponents],
        weights: WeightVector,
        weighting: &str,
    ) -> Self {
        let scores: Vec<f64> = components
            .iter()
            .map(|c| weighted_score(c, &weights))
            .collect();
        let thresholds = quantile(&scores, 1.0 / 3.0)
            .zip(quantile(&scores, 2.0 / 3.0))
            .map(|(q33, q67)| RiskThresholds { q33, q67 });

        match &thresholds {
            Some(t) => tracing::debug!(
                rows = components.len(),
                weighting,
                q33 = t.q33,
                q67 = t.q67,
                "Built scoring context"
            ),
            None => tracing::warn!(
                rows = components.len(),
                weighting,
                "No finite risk score, levels are not available"
            ),
        }

        Self {
            weighting: weighting.to_string(),
            weights,
            thresholds,
            rows: components.len(),
        }
    }

    pub fn weights(&self) -> &WeightVector {
        &self.weights
    }

    /// Q33/Q67 cut points; `None` when no row had a finite score.
    pub fn thresholds(&self) -> Option<&RiskThresholds> {
        self.thresholds.as_ref()
    }

    /// Name of the weighting that produced `weights`.
    pub fn weighting(&self) -> &str {
        &self.weighting
    }

    /// Number of rows the context was built from.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Score one row against this context.
    pub fn score(&self, components: &RiskComponents) -> (f64, RiskLevel) {
        let score = weighted_score(components, &self.weights);
        let level = match &self.thresholds {
            Some(thresholds) => thresholds.classify(score),
            None => RiskLevel::NotAvailable,
        };
        (score, level)
    }
}

/// Result of scoring a whole dataset.
#[derive(Debug, Clone)]
pub struct ScoredDataset {
    pub version: DatasetVersion,
    pub context: Arc<ScoringContext>,
    pub rows: Vec<ScoredListing>,
}

/// Scoring pipeline with a memoized context per dataset version.
#[derive(Debug)]
pub struct RiskEngine {
    config: RiskConfig,
    fixed_weights: Option<WeightVector>,
    cache: ContextCache,
}

impl RiskEngine {
    /// Validate `config` and create an engine with an empty cache.
    pub fn new(config: RiskConfig) -> Result<Self, ScoreError> {
        config.validate()?;
        let fixed_weights = config.explicit_weights()?;
        Ok(Self {
            config,
            fixed_weights,
            cache: ContextCache::new(),
        })
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    pub fn cache(&self) -> &ContextCache {
        &self.cache
    }

    /// Phase 0: per-row components, with the fraud scale fixed per dataset.
    pub fn components(&self, listings: &[Listing]) -> Vec<RiskComponents> {
        extract_components(listings, &self.config)
    }

    /// Phase 1: the context for these components, from cache if possible.
    pub fn context_for(&self, components: &[RiskComponents]) -> (DatasetVersion, Arc<ScoringContext>) {
        let weighting = self.weighting_key();
        let version = DatasetVersion::of(components, &weighting);

        let context = self.cache.get_or_build(version, || match &self.fixed_weights {
            Some(weights) => ScoringContext::with_weights(components, *weights, FIXED_WEIGHTING),
            None => {
                let method = method_for(self.config.method);
                ScoringContext::build(components, method.as_ref())
            }
        });

        (version, context)
    }

    /// Run all phases over a dataset.
    pub fn score_dataset(&self, listings: &[Listing]) -> ScoredDataset {
        let components = self.components(listings);
        let (version, context) = self.context_for(&components);

        let rows: Vec<ScoredListing> = listings
            .iter()
            .zip(components)
            .map(|(listing, components)| {
                let (risk_score, risk_level) = context.score(&components);
                ScoredListing {
                    listing: listing.clone(),
                    components,
                    risk_score,
                    risk_level,
                }
            })
            .collect();

        tracing::info!(
            rows = rows.len(),
            version = %version.short(),
            weighting = context.weighting(),
            "Scored dataset"
        );

        ScoredDataset {
            version,
            context,
            rows,
        }
    }

    /// Cache key part describing how weights are derived.
    fn weighting_key(&self) -> String {
        match &self.fixed_weights {
            Some(weights) => {
                let bits: Vec<String> = weights
                    .as_array()
                    .iter()
                    .map(|w| format!("{:016x}", w.to_bits()))
                    .collect();
                format!("{}:{}", FIXED_WEIGHTING, bits.join(","))
            }
            None => self.config.method.name().to_string(),
        }
    }
}
