//! Feature extraction for listing risk analysis.
//!
//! Provides pure functions for computing the per-row risk components:
//! - Legal and planning cues from listing text (`text` rule tables)
//! - Log-scaled normalization of the listing/government price gap
//! - Fraud probability scaling, decided once per dataset

pub mod text;

use landrisk_model::{FraudScale, Listing, RiskComponents, RiskConfig};

pub use text::{
    classify_legal, classify_planning, legal_risk_score, planning_risk_score, Cue, Verdict,
};

/// Normalize a positive ratio into [0, 1] using log scaling.
///
/// `score = clamp(ln(ratio) / ln(cap), 0, 1)`. Ratios at or below 1 map to
/// 0 and ratios at or above `cap` map to 1. A missing, non-positive or
/// non-finite ratio is unknown (`None`), as is a cap that is not above 1.
pub fn normalize_log_ratio(ratio: Option<f64>, cap: f64) -> Option<f64> {
    let ratio = ratio.filter(|r| r.is_finite() && *r > 0.0)?;
    if !cap.is_finite() || cap <= 1.0 {
        return None;
    }
    Some((ratio.ln() / cap.ln()).clamp(0.0, 1.0))
}

/// Listing unit price over government price.
///
/// A government price that is not positive is treated as missing.
pub fn listing_gap(unit_price: Option<f64>, gov_price: Option<f64>) -> Option<f64> {
    let gov = gov_price.filter(|g| g.is_finite() && *g > 0.0)?;
    let unit = unit_price.filter(|u| u.is_finite())?;
    Some(unit / gov)
}

/// Resolve `FraudScale::Auto` against a dataset's fraud column.
///
/// The column is a percentage when its largest finite value exceeds 1.
pub fn resolve_fraud_scale<I>(scale: FraudScale, values: I) -> FraudScale
where
    I: IntoIterator<Item = Option<f64>>,
{
    match scale {
        FraudScale::Auto => {
            let max = values
                .into_iter()
                .flatten()
                .filter(|v| v.is_finite())
                .fold(f64::NEG_INFINITY, f64::max);
            if max > 1.0 {
                FraudScale::Percent
            } else {
                FraudScale::Unit
            }
        }
        resolved => resolved,
    }
}

/// Bring a fraud probability onto [0, 1].
///
/// `scale` should already be resolved; `Auto` is read as `Unit`.
pub fn scale_fraud_probability(value: Option<f64>, scale: FraudScale) -> Option<f64> {
    let value = value.filter(|v| v.is_finite())?;
    let value = match scale {
        FraudScale::Percent => value / 100.0,
        FraudScale::Unit | FraudScale::Auto => value,
    };
    Some(value.clamp(0.0, 1.0))
}

/// Compute the components of one listing with a resolved fraud scale.
pub fn components_for(listing: &Listing, fraud_scale: FraudScale, cap: f64) -> RiskComponents {
    let text = listing.description_text();
    let gap = listing_gap(listing.unit_price, listing.gov_price);

    RiskComponents {
        legal: Some(legal_risk_score(text)),
        fake: scale_fraud_probability(listing.fraud_probability, fraud_scale),
        price: normalize_log_ratio(gap, cap),
        plan: Some(planning_risk_score(text)),
        listing_gap: gap,
    }
}

/// Compute components for every listing in a dataset.
///
/// The fraud scale is decided once for the whole dataset so that rows are
/// never interpreted inconsistently.
pub fn extract_components(listings: &[Listing], config: &RiskConfig) -> Vec<RiskComponents> {
    let fraud_scale = resolve_fraud_scale(
        config.fraud_scale,
        listings.iter().map(|l| l.fraud_probability),
    );
    tracing::debug!(
        rows = listings.len(),
        fraud_scale = ?fraud_scale,
        cap = config.cap_ratio,
        "Extracting risk components"
    );

    listings
        .iter()
        .map(|listing| components_for(listing, fraud_scale, config.cap_ratio))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    const EPS: f64 = 1e-12;

    #[test]
    fn test_normalize_anchor_points() {
        assert_eq!(normalize_log_ratio(Some(1.0), 10.0), Some(0.0));
        assert_eq!(normalize_log_ratio(Some(10.0), 10.0), Some(1.0));
        assert_eq!(normalize_log_ratio(Some(0.5), 10.0), Some(0.0));
        assert_eq!(normalize_log_ratio(Some(250.0), 10.0), Some(1.0));
        let mid = normalize_log_ratio(Some(10f64.sqrt()), 10.0).unwrap();
        assert!((mid - 0.5).abs() < EPS);
    }

    #[test]
    fn test_normalize_unknown_inputs() {
        assert_eq!(normalize_log_ratio(None, 10.0), None);
        assert_eq!(normalize_log_ratio(Some(0.0), 10.0), None);
        assert_eq!(normalize_log_ratio(Some(-2.0), 10.0), None);
        assert_eq!(normalize_log_ratio(Some(f64::NAN), 10.0), None);
        assert_eq!(normalize_log_ratio(Some(f64::INFINITY), 10.0), None);
        assert_eq!(normalize_log_ratio(Some(3.0), 1.0), None);
    }

    #[test]
    fn test_listing_gap_non_positive_gov_is_missing() {
        assert_eq!(listing_gap(Some(300.0), Some(150.0)), Some(2.0));
        assert_eq!(listing_gap(Some(300.0), Some(0.0)), None);
        assert_eq!(listing_gap(Some(300.0), Some(-5.0)), None);
        assert_eq!(listing_gap(None, Some(150.0)), None);
        assert_eq!(listing_gap(Some(300.0), None), None);
    }

    #[test]
    fn test_fraud_scale_auto_detection() {
        let percent = [Some(12.0), None, Some(85.0)];
        let unit = [Some(0.12), Some(1.0), None];
        assert_eq!(resolve_fraud_scale(FraudScale::Auto, percent), FraudScale::Percent);
        assert_eq!(resolve_fraud_scale(FraudScale::Auto, unit), FraudScale::Unit);
        assert_eq!(resolve_fraud_scale(FraudScale::Auto, [None, None]), FraudScale::Unit);
        assert_eq!(resolve_fraud_scale(FraudScale::Unit, percent), FraudScale::Unit);
    }

    #[test]
    fn test_fraud_scaling_clamps() {
        assert_eq!(scale_fraud_probability(Some(85.0), FraudScale::Percent), Some(0.85));
        assert_eq!(scale_fraud_probability(Some(120.0), FraudScale::Percent), Some(1.0));
        assert_eq!(scale_fraud_probability(Some(-0.2), FraudScale::Unit), Some(0.0));
        assert_eq!(scale_fraud_probability(Some(f64::NAN), FraudScale::Unit), None);
    }

    #[test]
    fn test_extract_components_decides_scale_per_dataset() {
        let listings = vec![
            Listing::new(380.0, 190.0)
                .with_description("Sổ hồng riêng, không quy hoạch")
                .with_fraud_probability(0.5),
            Listing::new(190.0, 0.0).with_fraud_probability(40.0),
        ];
        let components = extract_components(&listings, &RiskConfig::default());

        // 40 > 1 makes the whole column a percentage, including the 0.5 row.
        assert_eq!(components[0].fake, Some(0.005));
        assert_eq!(components[1].fake, Some(0.4));

        assert_eq!(components[0].legal, Some(0.0));
        assert_eq!(components[0].plan, Some(0.0));
        assert_eq!(components[0].listing_gap, Some(2.0));
        assert!((components[0].price.unwrap() - 2f64.log10()).abs() < EPS);

        assert_eq!(components[1].legal, Some(0.5));
        assert_eq!(components[1].plan, Some(0.5));
        assert_eq!(components[1].listing_gap, None);
        assert_eq!(components[1].price, None);
    }

    proptest! {
        #[test]
        fn normalize_stays_in_unit_interval(ratio in 1e-6f64..1e6, cap in 1.01f64..1000.0) {
            let score = normalize_log_ratio(Some(ratio), cap).unwrap();
            prop_assert!((0.0..=1.0).contains(&score));
        }

        #[test]
        fn normalize_is_monotonic(a in 1e-6f64..1e6, b in 1e-6f64..1e6, cap in 1.01f64..1000.0) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            let s_lo = normalize_log_ratio(Some(lo), cap).unwrap();
            let s_hi = normalize_log_ratio(Some(hi), cap).unwrap();
            prop_assert!(s_lo <= s_hi);
        }
    }
}
