//! Objective weighting of risk components.
//!
//! Provides the `WeightingMethod` trait and its implementations:
//! - `Critic`: weights from dispersion and inter-column correlation
//! - `EqualWeights`: the same weight for every column

use landrisk_model::{Component, RiskComponents, WeightMethod, WeightVector};

/// Trait for deriving column weights from a dataset.
///
/// Implementations must return exactly `columns` non-negative weights
/// summing to 1, and must be deterministic for identical input.
pub trait WeightingMethod {
    /// Method name for logging.
    fn name(&self) -> &'static str;

    /// Weights for the first `columns` values of each row.
    ///
    /// A `None` cell is a missing value.
    fn weights(&self, rows: &[Vec<Option<f64>>], columns: usize) -> Vec<f64>;
}

/// Equal weights regardless of the data.
#[derive(Debug, Default, Clone, Copy)]
pub struct EqualWeights;

impl WeightingMethod for EqualWeights {
    fn name(&self) -> &'static str {
        "equal"
    }

    fn weights(&self, _rows: &[Vec<Option<f64>>], columns: usize) -> Vec<f64> {
        equal_weights(columns)
    }
}

/// CRITIC (Criteria Importance Through Intercriteria Correlation).
///
/// `C_j = std_j * Σ_k (1 - corr_jk)` and `w_j = C_j / Σ C`. Columns that
/// vary more and agree less with the others carry more weight.
#[derive(Debug, Default, Clone, Copy)]
pub struct Critic;

impl WeightingMethod for Critic {
    fn name(&self) -> &'static str {
        "critic"
    }

    fn weights(&self, rows: &[Vec<Option<f64>>], columns: usize) -> Vec<f64> {
        if columns == 0 {
            return Vec::new();
        }

        let matrix = complete_cases(rows, columns);
        if matrix.is_empty() {
            tracing::debug!(rows = rows.len(), "No complete rows, using equal weights");
            return equal_weights(columns);
        }

        let columns_data: Vec<Vec<f64>> = (0..columns)
            .map(|j| matrix.iter().map(|row| row[j]).collect())
            .collect();
        let means: Vec<f64> = columns_data.iter().map(|c| mean(c)).collect();
        let stds: Vec<f64> = columns_data
            .iter()
            .zip(&means)
            .map(|(c, m)| population_std(c, *m))
            .collect();

        let information: Vec<f64> = (0..columns)
            .map(|j| {
                let conflict: f64 = (0..columns)
                    .map(|k| {
                        1.0 - pearson(
                            &columns_data[j],
                            &columns_data[k],
                            (means[j], stds[j]),
                            (means[k], stds[k]),
                        )
                    })
                    .sum();
                stds[j] * conflict
            })
            .collect();

        let total: f64 = information.iter().sum();
        if !total.is_finite() || total <= 0.0 {
            tracing::debug!(
                complete_rows = matrix.len(),
                "No informative column, using equal weights"
            );
            return equal_weights(columns);
        }

        tracing::debug!(
            complete_rows = matrix.len(),
            dropped_rows = rows.len() - matrix.len(),
            "Computed CRITIC weights"
        );
        information.iter().map(|c| c / total).collect()
    }
}

/// Look up the implementation for a configured method.
pub fn method_for(method: WeightMethod) -> Box<dyn WeightingMethod + Send + Sync> {
    match method {
        WeightMethod::Critic => Box::new(Critic),
        WeightMethod::Equal => Box::new(EqualWeights),
    }
}

/// Derive a `WeightVector` over the four risk components of a dataset.
pub fn component_weights(method: &dyn WeightingMethod, components: &[RiskComponents]) -> WeightVector {
    let rows: Vec<Vec<Option<f64>>> = components.iter().map(|c| c.as_row()).collect();
    let weights = method.weights(&rows, Component::ALL.len());

    let mut array = [0.0; 4];
    for (slot, w) in array.iter_mut().zip(weights) {
        *slot = w;
    }
    WeightVector::from_array(array)
}

fn equal_weights(columns: usize) -> Vec<f64> {
    vec![1.0 / columns as f64; columns]
}

/// Rows whose first `columns` cells are all present and finite.
fn complete_cases(rows: &[Vec<Option<f64>>], columns: usize) -> Vec<Vec<f64>> {
    rows.iter()
        .filter(|row| row.len() >= columns)
        .filter_map(|row| {
            row[..columns]
                .iter()
                .map(|cell| cell.filter(|v| v.is_finite()))
                .collect::<Option<Vec<f64>>>()
        })
        .collect()
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Standard deviation with ddof = 0. Exactly 0 for a constant column.
fn population_std(values: &[f64], mean: f64) -> f64 {
    let first = values[0];
    if values.iter().all(|v| *v == first) {
        return 0.0;
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Pearson correlation; undefined (a constant column) reads as 0.
fn pearson(x: &[f64], y: &[f64], (mx, sx): (f64, f64), (my, sy): (f64, f64)) -> f64 {
    if sx == 0.0 || sy == 0.0 {
        return 0.0;
    }
    let covariance = x
        .iter()
        .zip(y)
        .map(|(a, b)| (a - mx) * (b - my))
        .sum::<f64>()
        / x.len() as f64;
    let corr = covariance / (sx * sy);
    if corr.is_finite() {
        corr.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn rows(data: &[[f64; 4]]) -> Vec<Vec<Option<f64>>> {
        data.iter().map(|r| r.iter().map(|v| Some(*v)).collect()).collect()
    }

    fn assert_close(actual: &[f64], expected: &[f64]) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-9, "{:?} != {:?}", actual, expected);
        }
    }

    #[test]
    fn test_critic_anticorrelated_pair() {
        let data = rows(&[[0.0, 1.0, 0.5, 0.2], [1.0, 0.0, 0.5, 0.2]]);
        let weights = Critic.weights(&data, 4);
        assert_close(&weights, &[0.5, 0.5, 0.0, 0.0]);
    }

    #[test]
    fn test_critic_zero_variance_is_equal() {
        let data = rows(&[[0.1, 0.5, 1.0, 0.3]; 5]);
        assert_close(&Critic.weights(&data, 4), &[0.25; 4]);
    }

    #[test]
    fn test_critic_no_complete_rows_is_equal() {
        let data = vec![
            vec![Some(0.1), None, Some(0.2), Some(0.3)],
            vec![Some(0.4), Some(0.2), Some(f64::NAN), Some(0.1)],
            vec![Some(0.4), Some(0.2)],
        ];
        assert_close(&Critic.weights(&data, 4), &[0.25; 4]);
        assert_close(&Critic.weights(&[], 3), &[1.0 / 3.0; 3]);
    }

    #[test]
    fn test_critic_drops_incomplete_rows() {
        let mut data = rows(&[[0.0, 1.0, 0.5, 0.2], [1.0, 0.0, 0.5, 0.2]]);
        data.push(vec![Some(100.0), None, Some(0.5), Some(0.2)]);
        assert_close(&Critic.weights(&data, 4), &[0.5, 0.5, 0.0, 0.0]);
    }

    #[test]
    fn test_critic_penalizes_redundant_column() {
        // Columns 0 and 1 are identical; column 2 is independent of both.
        let data = rows(&[
            [0.0, 0.0, 0.0, 0.5],
            [1.0, 1.0, 0.0, 0.5],
            [0.0, 0.0, 1.0, 0.5],
            [1.0, 1.0, 1.0, 0.5],
        ]);
        let weights = Critic.weights(&data, 4);
        assert!(weights[2] > weights[0]);
        assert!((weights[0] - weights[1]).abs() < 1e-12);
        assert_eq!(weights[3], 0.0);
    }

    #[test]
    fn test_equal_weights() {
        assert_eq!(EqualWeights.weights(&[], 4), vec![0.25; 4]);
        assert!(EqualWeights.weights(&[], 0).is_empty());
    }

    #[test]
    fn test_component_weights_uses_component_order() {
        let components = vec![
            RiskComponents {
                legal: Some(0.0),
                fake: Some(1.0),
                price: Some(0.5),
                plan: Some(0.2),
                listing_gap: None,
            },
            RiskComponents {
                legal: Some(1.0),
                fake: Some(0.0),
                price: Some(0.5),
                plan: Some(0.2),
                listing_gap: None,
            },
        ];
        let weights = component_weights(&Critic, &components);
        assert!((weights.legal - 0.5).abs() < 1e-9);
        assert!((weights.fake - 0.5).abs() < 1e-9);
        assert_eq!(weights.price, 0.0);

        let equal = component_weights(method_for(WeightMethod::Equal).as_ref(), &components);
        assert_eq!(equal, WeightVector::equal());
    }

    proptest! {
        #[test]
        fn critic_weights_sum_to_one(
            data in prop::collection::vec(prop::array::uniform4(0.0f64..1.0), 0..40)
        ) {
            let weights = Critic.weights(&rows(&data), 4);
            prop_assert_eq!(weights.len(), 4);
            prop_assert!(weights.iter().all(|w| *w >= 0.0));
            prop_assert!((weights.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        }

        #[test]
        fn critic_is_deterministic(
            data in prop::collection::vec(prop::array::uniform4(0.0f64..1.0), 1..20)
        ) {
            let rows = rows(&data);
            prop_assert_eq!(Critic.weights(&rows, 4), Critic.weights(&rows, 4));
        }
    }
}
