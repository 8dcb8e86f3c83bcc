use serde::{Deserialize, Serialize};

use crate::scoring::{Feature, FeatureVector};

/// Standardizes features to zero mean and unit variance.
///
/// Fit once on the training partition and stored with the model version, so
/// inference always uses the statistics captured at training time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: [f64; Feature::COUNT],
    scale: [f64; Feature::COUNT],
}

impl Default for StandardScaler {
    fn default() -> Self {
        Self {
            mean: [0.0; Feature::COUNT],
            scale: [1.0; Feature::COUNT],
        }
    }
}

impl StandardScaler {
    /// Population mean and standard deviation per feature. Constant features get scale 1.
    pub fn fit(rows: &[FeatureVector]) -> Self {
        if rows.is_empty() {
            return Self::default();
        }
        let n = rows.len() as f64;
        let mut mean = [0.0; Feature::COUNT];
        for row in rows {
            for (m, v) in mean.iter_mut().zip(row.as_slice()) {
                *m += v / n;
            }
        }

        let mut variance = [0.0; Feature::COUNT];
        for row in rows {
            for (i, v) in row.as_slice().iter().enumerate() {
                variance[i] += (v - mean[i]).powi(2) / n;
            }
        }

        let mut scale = [1.0; Feature::COUNT];
        for (s, var) in scale.iter_mut().zip(variance) {
            let std = var.sqrt();
            if std > f64::EPSILON {
                *s = std;
            }
        }

        Self { mean, scale }
    }

    pub fn transform(&self, row: &FeatureVector) -> [f64; Feature::COUNT] {
        let mut out = [0.0; Feature::COUNT];
        for (i, v) in row.as_slice().iter().enumerate() {
            out[i] = (v - self.mean[i]) / self.scale[i];
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_centers_and_scales() {
        let rows = vec![
            FeatureVector([0.0, 10.0, 5.0, 1.0]),
            FeatureVector([100.0, 30.0, 5.0, 3.0]),
        ];
        let scaler = StandardScaler::fit(&rows);

        let first = scaler.transform(&rows[0]);
        let second = scaler.transform(&rows[1]);
        assert!((first[0] + 1.0).abs() < 1e-9);
        assert!((second[0] - 1.0).abs() < 1e-9);
        assert!((first[1] + 1.0).abs() < 1e-9);
        // Constant column is centered but not divided by zero
        assert_eq!(first[2], 0.0);
        assert_eq!(second[2], 0.0);
    }

    #[test]
    fn test_transform_uses_fitted_statistics() {
        let scaler = StandardScaler::fit(&[
            FeatureVector([0.0; 4]),
            FeatureVector([20.0; 4]),
        ]);
        // Unseen value is scaled with the training statistics, not refit
        let out = scaler.transform(&FeatureVector([30.0; 4]));
        assert!((out[0] - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_fit_is_identity() {
        let scaler = StandardScaler::fit(&[]);
        let out = scaler.transform(&FeatureVector([4.0, 5.0, 6.0, 7.0]));
        assert_eq!(out, [4.0, 5.0, 6.0, 7.0]);
    }
}
