use serde::{Deserialize, Serialize};

use super::forest::ForestParams;

/// Classifier training and blending settings.
///
/// Example YAML:
/// ```yaml
/// classifier:
///   min_accuracy: 0.7
///   blend: 0.3
///   n_estimators: 100
///   seed: 42
/// ```
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields, default)]
pub struct ClassifierConfig {
    /// Held-out accuracy a new model needs before it is promoted, in (0, 1]
    pub min_accuracy: f64,

    /// Also reject a model that scores below the currently active one
    pub reject_regression: bool,

    /// Share of the final score taken from the classifier probability, in [0, 1]
    pub blend: f64,

    /// Number of trees in the ensemble
    pub n_estimators: usize,

    /// Depth cap per tree
    pub max_depth: usize,

    /// Seed for the train/held-out split and bootstrap sampling
    pub seed: u64,

    /// Fraction of labeled leads held out for accuracy, in (0, 1)
    pub test_fraction: f64,

    /// Fewest labeled leads a training run will accept
    pub min_training_samples: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            min_accuracy: 0.6,
            reject_regression: true,
            blend: 0.3,
            n_estimators: 100,
            max_depth: 8,
            seed: 42,
            test_fraction: 0.2,
            min_training_samples: 10,
        }
    }
}

impl ClassifierConfig {
    pub fn forest_params(&self) -> ForestParams {
        ForestParams {
            n_trees: self.n_estimators,
            max_depth: self.max_depth,
            min_samples_split: 2,
            seed: self.seed,
        }
    }
}

/// Validate classifier settings. Returns all errors at once.
pub fn validate_classifier(config: &ClassifierConfig) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();

    if !(config.min_accuracy > 0.0 && config.min_accuracy <= 1.0) {
        errors.push(format!(
            "classifier.min_accuracy: must be in (0, 1], got {}",
            config.min_accuracy
        ));
    }
    if !(0.0..=1.0).contains(&config.blend) {
        errors.push(format!("classifier.blend: must be in [0, 1], got {}", config.blend));
    }
    if config.n_estimators == 0 {
        errors.push("classifier.n_estimators: must be at least 1".to_string());
    }
    if config.max_depth == 0 {
        errors.push("classifier.max_depth: must be at least 1".to_string());
    }
    if !(config.test_fraction > 0.0 && config.test_fraction < 1.0) {
        errors.push(format!(
            "classifier.test_fraction: must be in (0, 1), got {}",
            config.test_fraction
        ));
    }
    if config.min_training_samples < 2 {
        errors.push("classifier.min_training_samples: must be at least 2".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(validate_classifier(&ClassifierConfig::default()).is_ok());
    }

    #[test]
    fn test_partial_parse_fills_defaults() {
        let config: ClassifierConfig = serde_saphyr::from_str("min_accuracy: 0.8\n").unwrap();
        assert_eq!(config.min_accuracy, 0.8);
        assert_eq!(config.n_estimators, 100);
        assert_eq!(config.seed, 42);
    }

    #[test]
    fn test_gate_must_be_a_fraction() {
        let config = ClassifierConfig {
            min_accuracy: 0.0,
            ..Default::default()
        };
        let errors = validate_classifier(&config).unwrap_err();
        assert!(errors[0].contains("classifier.min_accuracy"));

        let config = ClassifierConfig {
            min_accuracy: 1.0,
            ..Default::default()
        };
        assert!(validate_classifier(&config).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let config = ClassifierConfig {
            blend: 1.5,
            n_estimators: 0,
            test_fraction: 1.0,
            ..Default::default()
        };
        assert_eq!(validate_classifier(&config).unwrap_err().len(), 3);
    }
}
