//! Tax and fee estimates for a land transaction.
//!
//! Three independent calculations, all in million VND:
//! - Registration fee on land
//! - Personal income tax on the transfer
//! - Progressive non-agricultural land-use tax, with relief
//!
//! Every function is total. Negative, NaN or infinite inputs are floored to
//! 0 instead of being rejected. Results are reference estimates only.

use landrisk_model::{BracketSplit, LandUseTaxBreakdown, Listing, ReliefType};
use serde::{Deserialize, Serialize};

/// Registration fee rate (0.5%).
pub const DEFAULT_REGISTRATION_RATE: f64 = 0.005;

/// Transfer income tax rate (2%).
pub const DEFAULT_TRANSFER_RATE: f64 = 0.02;

/// Residential land quota used when none is given (m²).
pub const DEFAULT_QUOTA_M2: f64 = 120.0;

/// Land-use tax rate within the quota (0.03%).
pub const RATE_WITHIN_QUOTA: f64 = 0.0003;

/// Land-use tax rate above the quota up to three times it (0.07%).
pub const RATE_QUOTA_TO_TRIPLE: f64 = 0.0007;

/// Land-use tax rate above three times the quota (0.15%).
pub const RATE_OVER_TRIPLE: f64 = 0.0015;

fn non_negative(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

/// Registration fee on land: `area * gov_price * rate`, 0 when exempt.
pub fn registration_fee_land(area_m2: f64, gov_price_per_m2: f64, rate: f64, exempt: bool) -> f64 {
    if exempt {
        return 0.0;
    }
    non_negative(area_m2) * non_negative(gov_price_per_m2) * non_negative(rate)
}

/// Income tax on a real-estate transfer: `price * rate`, 0 when exempt.
pub fn transfer_income_tax(transfer_price: f64, rate: f64, exempt: bool) -> f64 {
    if exempt {
        return 0.0;
    }
    non_negative(transfer_price) * non_negative(rate)
}

/// Split an area over the three land-use tax brackets.
///
/// With no usable quota the whole area falls in the first bracket.
pub fn bracket_areas(area_m2: f64, quota_m2: f64) -> BracketSplit {
    let area = non_negative(area_m2);
    let quota = non_negative(quota_m2);

    if quota <= 0.0 {
        return BracketSplit::new(area, 0.0, 0.0);
    }

    BracketSplit::new(
        area.min(quota),
        (area - quota).clamp(0.0, 2.0 * quota),
        (area - 3.0 * quota).max(0.0),
    )
}

/// Non-agricultural land-use tax, progressive over three brackets.
///
/// Relief is applied after the bracket amounts are computed; the breakdown
/// carries both sets of amounts.
pub fn non_agri_land_use_tax(
    area_m2: f64,
    gov_price_per_m2: f64,
    quota_m2: f64,
    relief: ReliefType,
) -> LandUseTaxBreakdown {
    let price = non_negative(gov_price_per_m2);
    let areas = bracket_areas(area_m2, quota_m2);

    let before = BracketSplit::new(
        areas.within_quota * price * RATE_WITHIN_QUOTA,
        areas.quota_to_triple * price * RATE_QUOTA_TO_TRIPLE,
        areas.over_triple * price * RATE_OVER_TRIPLE,
    );

    let (first, rest) = relief.factors();
    let after = BracketSplit::new(
        before.within_quota * first,
        before.quota_to_triple * rest,
        before.over_triple * rest,
    );

    LandUseTaxBreakdown {
        area_m2: areas,
        tax_before_relief: before,
        tax_after_relief: after,
        total_before_relief: before.total(),
        total_after_relief: after.total(),
        relief,
    }
}

/// Inputs for a whole-transaction estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaxInputs {
    pub area_m2: f64,
    /// Government land price (million VND/m²)
    pub gov_price_per_m2: f64,
    /// Total transfer price (million VND)
    pub transfer_price: f64,
    pub quota_m2: f64,
    pub registration_rate: f64,
    pub transfer_rate: f64,
    pub exempt_registration: bool,
    pub exempt_transfer: bool,
    pub land_use_relief: ReliefType,
}

impl Default for TaxInputs {
    fn default() -> Self {
        Self {
            area_m2: 80.0,
            gov_price_per_m2: 190.0,
            transfer_price: 8000.0,
            quota_m2: DEFAULT_QUOTA_M2,
            registration_rate: DEFAULT_REGISTRATION_RATE,
            transfer_rate: DEFAULT_TRANSFER_RATE,
            exempt_registration: false,
            exempt_transfer: false,
            land_use_relief: ReliefType::None,
        }
    }
}

impl TaxInputs {
    /// Defaults with area, government price and total price taken from a
    /// listing where it has them.
    pub fn from_listing(listing: &Listing) -> Self {
        let defaults = Self::default();
        let pick = |value: Option<f64>, fallback: f64| {
            value.filter(|v| v.is_finite()).unwrap_or(fallback)
        };

        Self {
            area_m2: pick(listing.area_m2, defaults.area_m2),
            gov_price_per_m2: pick(listing.gov_price, defaults.gov_price_per_m2),
            transfer_price: pick(listing.total_price, defaults.transfer_price),
            ..defaults
        }
    }
}

/// The three amounts for one transaction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaxEstimate {
    pub registration_fee: f64,
    pub transfer_tax: f64,
    /// Annual amount
    pub land_use_tax: LandUseTaxBreakdown,
    /// Registration fee + transfer tax + first year of land-use tax
    pub total_first_year: f64,
}

pub fn estimate_transaction(inputs: &TaxInputs) -> TaxEstimate {
    let registration_fee = registration_fee_land(
        inputs.area_m2,
        inputs.gov_price_per_m2,
        inputs.registration_rate,
        inputs.exempt_registration,
    );
    let transfer_tax = transfer_income_tax(
        inputs.transfer_price,
        inputs.transfer_rate,
        inputs.exempt_transfer,
    );
    let land_use_tax = non_agri_land_use_tax(
        inputs.area_m2,
        inputs.gov_price_per_m2,
        inputs.quota_m2,
        inputs.land_use_relief,
    );

    TaxEstimate {
        registration_fee,
        transfer_tax,
        total_first_year: registration_fee + transfer_tax + land_use_tax.total_after_relief,
        land_use_tax,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_registration_fee() {
        assert!(close(registration_fee_land(80.0, 190.0, DEFAULT_REGISTRATION_RATE, false), 76.0));
        assert_eq!(registration_fee_land(80.0, 190.0, DEFAULT_REGISTRATION_RATE, true), 0.0);
    }

    #[test]
    fn test_registration_fee_floors_invalid_input() {
        assert_eq!(registration_fee_land(-80.0, 190.0, 0.005, false), 0.0);
        assert_eq!(registration_fee_land(80.0, f64::NAN, 0.005, false), 0.0);
        assert_eq!(registration_fee_land(80.0, 190.0, -0.005, false), 0.0);
    }

    #[test]
    fn test_transfer_income_tax() {
        // 25 billion = 25 000 million VND
        assert!(close(transfer_income_tax(25_000.0, DEFAULT_TRANSFER_RATE, false), 500.0));
        assert_eq!(transfer_income_tax(25_000.0, DEFAULT_TRANSFER_RATE, true), 0.0);
        assert_eq!(transfer_income_tax(f64::INFINITY, DEFAULT_TRANSFER_RATE, false), 0.0);
    }

    #[test]
    fn test_bracket_areas() {
        assert_eq!(bracket_areas(500.0, 160.0), BracketSplit::new(160.0, 320.0, 20.0));
        assert_eq!(bracket_areas(200.0, 160.0), BracketSplit::new(160.0, 40.0, 0.0));
        assert_eq!(bracket_areas(100.0, 160.0), BracketSplit::new(100.0, 0.0, 0.0));
        assert_eq!(bracket_areas(480.0, 160.0), BracketSplit::new(160.0, 320.0, 0.0));
    }

    #[test]
    fn test_zero_quota_puts_everything_in_first_bracket() {
        assert_eq!(bracket_areas(500.0, 0.0), BracketSplit::new(500.0, 0.0, 0.0));
        assert_eq!(bracket_areas(500.0, -10.0), BracketSplit::new(500.0, 0.0, 0.0));
    }

    #[test]
    fn test_land_use_tax_brackets() {
        let tax = non_agri_land_use_tax(500.0, 100.0, 160.0, ReliefType::None);
        assert!(close(tax.tax_before_relief.within_quota, 4.8));
        assert!(close(tax.tax_before_relief.quota_to_triple, 22.4));
        assert!(close(tax.tax_before_relief.over_triple, 3.0));
        assert!(close(tax.total_before_relief, 30.2));
        assert_eq!(tax.tax_after_relief, tax.tax_before_relief);
        assert_eq!(tax.total_after_relief, tax.total_before_relief);
    }

    #[test]
    fn test_exempt_within_quota_only_zeroes_first_bracket() {
        let tax = non_agri_land_use_tax(500.0, 100.0, 160.0, ReliefType::ExemptWithinQuota);
        assert_eq!(tax.tax_after_relief.within_quota, 0.0);
        assert_eq!(tax.tax_after_relief.quota_to_triple, tax.tax_before_relief.quota_to_triple);
        assert_eq!(tax.tax_after_relief.over_triple, tax.tax_before_relief.over_triple);
        assert!(close(tax.total_after_relief, 25.4));
        assert!(close(tax.total_before_relief, 30.2));
        assert_eq!(tax.relief, ReliefType::ExemptWithinQuota);
    }

    #[test]
    fn test_other_relief_variants() {
        let half_first = non_agri_land_use_tax(500.0, 100.0, 160.0, ReliefType::Reduce50WithinQuota);
        assert!(close(half_first.total_after_relief, 2.4 + 22.4 + 3.0));

        let exempt = non_agri_land_use_tax(500.0, 100.0, 160.0, ReliefType::ExemptAll);
        assert_eq!(exempt.total_after_relief, 0.0);
        assert!(close(exempt.total_before_relief, 30.2));
        assert_eq!(exempt.area_m2, BracketSplit::new(160.0, 320.0, 20.0));

        let half = non_agri_land_use_tax(500.0, 100.0, 160.0, ReliefType::Reduce50All);
        assert!(close(half.total_after_relief, 15.1));
    }

    #[test]
    fn test_estimate_transaction() {
        let inputs = TaxInputs {
            area_m2: 80.0,
            gov_price_per_m2: 190.0,
            transfer_price: 8000.0,
            quota_m2: 120.0,
            exempt_transfer: true,
            ..Default::default()
        };
        let estimate = estimate_transaction(&inputs);
        assert!(close(estimate.registration_fee, 76.0));
        assert_eq!(estimate.transfer_tax, 0.0);
        // 80 m² within a 120 m² quota: 80 * 190 * 0.03%
        assert!(close(estimate.land_use_tax.total_after_relief, 4.56));
        assert!(close(estimate.total_first_year, 80.56));
    }

    #[test]
    fn test_inputs_from_listing() {
        let mut listing = Listing::new(250.0, 210.0);
        listing.area_m2 = Some(64.0);
        listing.total_price = Some(f64::NAN);

        let inputs = TaxInputs::from_listing(&listing);
        assert_eq!(inputs.area_m2, 64.0);
        assert_eq!(inputs.gov_price_per_m2, 210.0);
        assert_eq!(inputs.transfer_price, 8000.0);
        assert_eq!(inputs.quota_m2, DEFAULT_QUOTA_M2);
    }

    proptest! {
        #[test]
        fn bracket_areas_cover_the_area(area in 0.0f64..10_000.0, quota in 0.0f64..2_000.0) {
            let split = bracket_areas(area, quota);
            prop_assert!((split.total() - area).abs() < 1e-6);
            prop_assert!(split.within_quota >= 0.0);
            prop_assert!(split.quota_to_triple >= 0.0);
            prop_assert!(split.over_triple >= 0.0);
        }

        #[test]
        fn relief_never_increases_tax(
            area in 0.0f64..10_000.0,
            price in 0.0f64..1_000.0,
            quota in 0.0f64..2_000.0,
            index in 0usize..5,
        ) {
            let relief = ReliefType::ALL[index];
            let tax = non_agri_land_use_tax(area, price, quota, relief);
            prop_assert!(tax.total_after_relief <= tax.total_before_relief + 1e-12);
            let sum = tax.tax_before_relief.within_quota
                + tax.tax_before_relief.quota_to_triple
                + tax.tax_before_relief.over_triple;
            prop_assert!((tax.total_before_relief - sum).abs() < 1e-9);
        }
    }
}
