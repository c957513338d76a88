//! Core domain model for landrisk listing analysis.
//!
//! This crate defines the fundamental types used throughout the system:
//! - `Listing`: one market listing row as read from a dataset
//! - `RiskComponents`: the four per-row risk signals
//! - `WeightVector`: dataset-wide component weights
//! - `RiskLevel`: Low, Medium, High by dataset tertiles
//! - `RiskConfig`: column mapping and scoring options
//! - `LandUseTaxBreakdown`: bracket-by-bracket land-use tax result

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Default saturation cap for the listing gap normalizer.
pub const DEFAULT_CAP_RATIO: f64 = 10.0;

/// Value read for an unknown component when a score is computed.
///
/// This is a scoring-time default only. The stored `RiskComponents` keep
/// `None` so "unknown" is never confused with "neutral evidence".
pub const NEUTRAL_COMPONENT_VALUE: f64 = 0.5;

/// Errors from building or validating model values.
#[derive(Debug, Error, PartialEq)]
pub enum ModelError {
    #[error("Ratio cap must be finite and greater than 1, got {0}")]
    InvalidCap(f64),

    #[error("Invalid weight for {component}: {value}")]
    InvalidWeight { component: Component, value: f64 },

    #[error("Weights must have a positive sum")]
    ZeroWeights,

    #[error("Unknown {kind}: {value}")]
    UnknownVariant { kind: &'static str, value: String },
}

/// One of the four risk signals that make up a Risk Score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Component {
    /// Legal status of the title, from listing text
    #[serde(rename = "S_legal")]
    Legal,
    /// Probability that the listing is fake
    #[serde(rename = "S_fake")]
    Fake,
    /// Log-scaled gap between listing price and government price
    #[serde(rename = "S_price")]
    Price,
    /// Planning or dispute exposure, from listing text
    #[serde(rename = "S_plan")]
    Plan,
}

impl Component {
    /// Fixed component order used for matrices and weight arrays.
    pub const ALL: [Component; 4] = [
        Component::Legal,
        Component::Fake,
        Component::Price,
        Component::Plan,
    ];

    /// Column name of this component in scored output.
    pub fn column(&self) -> &'static str {
        match self {
            Self::Legal => "S_legal",
            Self::Fake => "S_fake",
            Self::Price => "S_price",
            Self::Plan => "S_plan",
        }
    }

    /// Get a human-readable label for this component.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Legal => "Legal status",
            Self::Fake => "Fake listing",
            Self::Price => "Price discrepancy",
            Self::Plan => "Planning / dispute",
        }
    }

    /// Position of this component in `Component::ALL`.
    pub fn index(&self) -> usize {
        match self {
            Self::Legal => 0,
            Self::Fake => 1,
            Self::Price => 2,
            Self::Plan => 3,
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

/// A single market listing row.
///
/// Every field is optional: datasets vary in which columns they carry and
/// cells are frequently blank. Address keys are opaque to scoring.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    /// Listing unit price (million VND/m²)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_price: Option<f64>,

    /// Government reference land price (million VND/m²)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gov_price: Option<f64>,

    /// Fake-listing probability, on a 0-1 or 0-100 scale
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fraud_probability: Option<f64>,

    /// Free-form listing text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub district: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ward: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub street: Option<String>,

    /// Median market reference unit price for the location (million VND/m²)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_ref_price: Option<f64>,

    /// Land area (m²)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area_m2: Option<f64>,

    /// Total asking price (million VND)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_price: Option<f64>,
}

impl Listing {
    /// Create a listing with just the two prices set.
    pub fn new(unit_price: f64, gov_price: f64) -> Self {
        Self {
            unit_price: Some(unit_price),
            gov_price: Some(gov_price),
            ..Default::default()
        }
    }

    pub fn with_description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    pub fn with_fraud_probability(mut self, probability: f64) -> Self {
        self.fraud_probability = Some(probability);
        self
    }

    pub fn with_location(
        mut self,
        district: impl Into<String>,
        ward: impl Into<String>,
        street: impl Into<String>,
    ) -> Self {
        self.district = Some(district.into());
        self.ward = Some(ward.into());
        self.street = Some(street.into());
        self
    }

    /// Listing text, empty when absent.
    pub fn description_text(&self) -> &str {
        self.description.as_deref().unwrap_or("")
    }
}

/// The four risk signals derived for one listing.
///
/// `None` means the inputs for that component were missing or invalid.
/// It is never silently stored as zero or as the neutral value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskComponents {
    #[serde(rename = "S_legal")]
    pub legal: Option<f64>,

    #[serde(rename = "S_fake")]
    pub fake: Option<f64>,

    #[serde(rename = "S_price")]
    pub price: Option<f64>,

    #[serde(rename = "S_plan")]
    pub plan: Option<f64>,

    /// Raw `unit_price / gov_price`, before normalization
    #[serde(rename = "ListingGap")]
    pub listing_gap: Option<f64>,
}

impl RiskComponents {
    /// Stored value of a component; `None` is "unknown".
    pub fn get(&self, component: Component) -> Option<f64> {
        match component {
            Component::Legal => self.legal,
            Component::Fake => self.fake,
            Component::Price => self.price,
            Component::Plan => self.plan,
        }
    }

    /// Value read when scoring: unknown reads as `NEUTRAL_COMPONENT_VALUE`.
    pub fn value_for_scoring(&self, component: Component) -> f64 {
        self.get(component)
            .filter(|v| v.is_finite())
            .unwrap_or(NEUTRAL_COMPONENT_VALUE)
    }

    /// Component values in `Component::ALL` order.
    pub fn as_row(&self) -> Vec<Option<f64>> {
        Component::ALL.iter().map(|c| self.get(*c)).collect()
    }
}

/// Dataset-wide component weights, summing to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightVector {
    #[serde(rename = "S_legal")]
    pub legal: f64,

    #[serde(rename = "S_fake")]
    pub fake: f64,

    #[serde(rename = "S_price")]
    pub price: f64,

    #[serde(rename = "S_plan")]
    pub plan: f64,
}

impl Default for WeightVector {
    fn default() -> Self {
        Self::equal()
    }
}

impl WeightVector {
    /// Equal weight for every component.
    pub fn equal() -> Self {
        let w = 1.0 / Component::ALL.len() as f64;
        Self::from_array([w; 4])
    }

    /// Build from weights in `Component::ALL` order, without validation.
    pub fn from_array(weights: [f64; 4]) -> Self {
        Self {
            legal: weights[0],
            fake: weights[1],
            price: weights[2],
            plan: weights[3],
        }
    }

    /// Validate caller-supplied weights and rescale them to sum to 1.
    pub fn try_new(weights: [f64; 4]) -> Result<Self, ModelError> {
        for component in Component::ALL {
            let value = weights[component.index()];
            if !value.is_finite() || value < 0.0 {
                return Err(ModelError::InvalidWeight { component, value });
            }
        }

        let total: f64 = weights.iter().sum();
        if total <= 0.0 {
            return Err(ModelError::ZeroWeights);
        }

        Ok(Self::from_array(weights.map(|w| w / total)))
    }

    /// Build from a name → weight map; missing components weigh 0.
    pub fn from_map(map: &BTreeMap<Component, f64>) -> Result<Self, ModelError> {
        let mut weights = [0.0; 4];
        for (component, value) in map {
            weights[component.index()] = *value;
        }
        Self::try_new(weights)
    }

    pub fn get(&self, component: Component) -> f64 {
        match component {
            Component::Legal => self.legal,
            Component::Fake => self.fake,
            Component::Price => self.price,
            Component::Plan => self.plan,
        }
    }

    pub fn as_array(&self) -> [f64; 4] {
        [self.legal, self.fake, self.price, self.plan]
    }

    pub fn sum(&self) -> f64 {
        self.as_array().iter().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Component, f64)> + '_ {
        Component::ALL.into_iter().map(move |c| (c, self.get(c)))
    }
}

/// Categorical risk level by dataset tertiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    /// Score was not a finite number
    #[serde(rename = "N/A")]
    NotAvailable,
}

impl RiskLevel {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
            Self::NotAvailable => "N/A",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Q33/Q67 cut points of a dataset's Risk Score distribution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskThresholds {
    #[serde(rename = "Risk_Q33")]
    pub q33: f64,

    #[serde(rename = "Risk_Q67")]
    pub q67: f64,
}

impl RiskThresholds {
    /// Map a score to its level. Ties at a cut point go to the lower level.
    pub fn classify(&self, score: f64) -> RiskLevel {
        if !score.is_finite() {
            return RiskLevel::NotAvailable;
        }
        if score <= self.q33 {
            RiskLevel::Low
        } else if score <= self.q67 {
            RiskLevel::Medium
        } else {
            RiskLevel::High
        }
    }
}

/// A listing together with its components and final score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredListing {
    pub listing: Listing,

    pub components: RiskComponents,

    #[serde(rename = "Risk Score")]
    pub risk_score: f64,

    #[serde(rename = "Risk Level")]
    pub risk_level: RiskLevel,
}

/// Mapping from semantic role to the dataset column that carries it.
///
/// Column names drift between dataset versions, so every entry can be
/// overridden from a config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnMapping {
    pub unit_price: String,
    pub gov_price: String,
    pub fraud_probability: String,
    pub description: String,
    pub district: String,
    pub ward: String,
    pub street: String,
    pub market_ref_price: String,
    pub area_m2: String,
    pub total_price: String,
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self {
            unit_price: "Unit Price (million VND/m²)".to_string(),
            gov_price: "Gov Price 2026 Corrected (million VND/m²)".to_string(),
            fraud_probability: "Độ tin cậy tin ảo (%)".to_string(),
            description: "Listing Text".to_string(),
            district: "District".to_string(),
            ward: "Ward".to_string(),
            street: "Street".to_string(),
            market_ref_price: "Market Reference Unit Price (median, million VND/m²)".to_string(),
            area_m2: "Area (m²)".to_string(),
            total_price: "Price (million VND)".to_string(),
        }
    }
}

/// How fraud probabilities are scaled in a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FraudScale {
    /// Percent if the column's largest value exceeds 1, decided per dataset
    Auto,
    /// Already 0-1
    Unit,
    /// 0-100
    Percent,
}

impl Default for FraudScale {
    fn default() -> Self {
        Self::Auto
    }
}

impl FromStr for FraudScale {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "unit" => Ok(Self::Unit),
            "percent" => Ok(Self::Percent),
            _ => Err(ModelError::UnknownVariant {
                kind: "fraud scale",
                value: s.to_string(),
            }),
        }
    }
}

/// Weighting method used to derive a `WeightVector`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeightMethod {
    #[default]
    Critic,
    Equal,
}

impl WeightMethod {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Critic => "critic",
            Self::Equal => "equal",
        }
    }
}

impl FromStr for WeightMethod {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "critic" => Ok(Self::Critic),
            "equal" => Ok(Self::Equal),
            _ => Err(ModelError::UnknownVariant {
                kind: "weight method",
                value: s.to_string(),
            }),
        }
    }
}

/// Scoring configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    /// Dataset column names
    pub columns: ColumnMapping,

    /// Fraud probability scale
    pub fraud_scale: FraudScale,

    /// Listing gap at which the price component saturates at 1
    pub cap_ratio: f64,

    /// Weighting method
    pub method: WeightMethod,

    /// Fixed weights; when set they replace `method`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weights: Option<BTreeMap<Component, f64>>,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            columns: ColumnMapping::default(),
            fraud_scale: FraudScale::Auto,
            cap_ratio: DEFAULT_CAP_RATIO,
            method: WeightMethod::Critic,
            weights: None,
        }
    }
}

impl RiskConfig {
    pub fn with_method(mut self, method: WeightMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_cap_ratio(mut self, cap_ratio: f64) -> Self {
        self.cap_ratio = cap_ratio;
        self
    }

    pub fn with_fraud_scale(mut self, fraud_scale: FraudScale) -> Self {
        self.fraud_scale = fraud_scale;
        self
    }

    /// Check the options that would otherwise silently produce unknowns.
    pub fn validate(&self) -> Result<(), ModelError> {
        if !self.cap_ratio.is_finite() || self.cap_ratio <= 1.0 {
            return Err(ModelError::InvalidCap(self.cap_ratio));
        }
        self.explicit_weights()?;
        Ok(())
    }

    /// Fixed weights from config, validated and rescaled.
    pub fn explicit_weights(&self) -> Result<Option<WeightVector>, ModelError> {
        self.weights
            .as_ref()
            .map(WeightVector::from_map)
            .transpose()
    }
}

/// Relief applied to non-agricultural land-use tax.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReliefType {
    /// No relief
    None,
    /// Bracket 1 (within quota) is exempt
    ExemptWithinQuota,
    /// Bracket 1 is reduced by half
    Reduce50WithinQuota,
    /// The whole tax is exempt
    ExemptAll,
    /// The whole tax is reduced by half
    Reduce50All,
}

impl Default for ReliefType {
    fn default() -> Self {
        Self::None
    }
}

impl ReliefType {
    pub const ALL: [ReliefType; 5] = [
        ReliefType::None,
        ReliefType::ExemptWithinQuota,
        ReliefType::Reduce50WithinQuota,
        ReliefType::ExemptAll,
        ReliefType::Reduce50All,
    ];

    /// Multipliers for (bracket 1, brackets 2 and 3).
    pub fn factors(&self) -> (f64, f64) {
        match self {
            Self::None => (1.0, 1.0),
            Self::ExemptWithinQuota => (0.0, 1.0),
            Self::Reduce50WithinQuota => (0.5, 1.0),
            Self::ExemptAll => (0.0, 0.0),
            Self::Reduce50All => (0.5, 0.5),
        }
    }

    /// Config / CLI name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::ExemptWithinQuota => "exempt_within_quota",
            Self::Reduce50WithinQuota => "reduce50_within_quota",
            Self::ExemptAll => "exempt_all",
            Self::Reduce50All => "reduce50_all",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::None => "No relief",
            Self::ExemptWithinQuota => "Exempt within quota",
            Self::Reduce50WithinQuota => "50% off within quota",
            Self::ExemptAll => "Fully exempt",
            Self::Reduce50All => "50% off",
        }
    }
}

impl FromStr for ReliefType {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|r| r.name() == wanted)
            .ok_or_else(|| ModelError::UnknownVariant {
                kind: "relief type",
                value: s.to_string(),
            })
    }
}

/// Amounts split over the three land-use tax brackets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BracketSplit {
    /// Up to the quota
    pub within_quota: f64,
    /// Above the quota, up to three times the quota
    pub quota_to_triple: f64,
    /// Above three times the quota
    pub over_triple: f64,
}

impl BracketSplit {
    pub fn new(within_quota: f64, quota_to_triple: f64, over_triple: f64) -> Self {
        Self {
            within_quota,
            quota_to_triple,
            over_triple,
        }
    }

    pub fn total(&self) -> f64 {
        self.within_quota + self.quota_to_triple + self.over_triple
    }
}

/// Full breakdown of one non-agricultural land-use tax computation.
///
/// Both the pre-relief and post-relief amounts are kept so the applied
/// relief can be audited.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LandUseTaxBreakdown {
    /// Area per bracket (m²)
    pub area_m2: BracketSplit,

    /// Tax per bracket before relief (million VND)
    pub tax_before_relief: BracketSplit,

    /// Tax per bracket after relief (million VND)
    pub tax_after_relief: BracketSplit,

    pub total_before_relief: f64,

    pub total_after_relief: f64,

    pub relief: ReliefType,
}
