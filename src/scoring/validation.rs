use super::config::ScoringConfig;
use super::engine::{MAX_SCORE, MIN_SCORE};
use super::features::Feature;
use super::tier::Tier;

/// Allowed drift of the weight sum from 1.0.
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Validate scoring configuration at startup.
/// Returns all validation errors at once (not just the first).
pub fn validate_scoring(config: &ScoringConfig) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();

    // Weights
    for feature in Feature::ALL {
        let weight = config.weights.get(feature);
        if !weight.is_finite() || weight < 0.0 {
            errors.push(format!(
                "scoring.weights.{}: must be a non-negative number, got {}",
                feature, weight
            ));
        }
    }
    let sum = config.weights.sum();
    if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
        errors.push(format!("scoring.weights: must sum to 1.0, got {}", sum));
    }

    // Thresholds
    let named = config.thresholds.descending();
    for (tier, floor) in named {
        if !(MIN_SCORE..=MAX_SCORE).contains(&floor) {
            errors.push(format!(
                "scoring.thresholds.{}: must be within [0, 100], got {}",
                tier, floor
            ));
        }
    }
    for pair in named.windows(2) {
        let (upper_tier, upper) = pair[0];
        let (lower_tier, lower) = pair[1];
        if upper <= lower {
            errors.push(format!(
                "scoring.thresholds: {} ({}) must be greater than {} ({})",
                upper_tier, upper, lower_tier, lower
            ));
        }
    }

    // Templates
    for tier in Tier::ALL {
        if config.templates.for_tier(tier).trim().is_empty() {
            errors.push(format!("scoring.templates.{}: must not be empty", tier));
        }
    }

    // Feature ranges
    for feature in Feature::ALL {
        let range = config.features.get(feature);
        if !range.min.is_finite() || range.min < 0.0 {
            errors.push(format!(
                "scoring.features.{}.min: must be non-negative, got {}",
                feature, range.min
            ));
        }
        if !range.max.is_finite() || range.max <= range.min {
            errors.push(format!(
                "scoring.features.{}.max: must be greater than min ({}), got {}",
                feature, range.min, range.max
            ));
        }
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
    use crate::scoring::{FeatureRange, Thresholds};

    #[test]
    fn test_valid_config() {
        assert!(validate_scoring(&ScoringConfig::default()).is_ok());
    }

    #[test]
    fn test_weight_sum_within_tolerance() {
        let mut config = ScoringConfig::default();
        config.weights.company_size += 1e-9;
        assert!(validate_scoring(&config).is_ok());
    }

    #[test]
    fn test_weights_must_sum_to_one() {
        let mut config = ScoringConfig::default();
        config.weights.email_opens = 0.5;
        let errors = validate_scoring(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("must sum to 1.0"));
    }

    #[test]
    fn test_negative_weight() {
        let mut config = ScoringConfig::default();
        config.weights.company_size = -0.2;
        config.weights.website_visits = 0.7;
        let errors = validate_scoring(&config).unwrap_err();
        assert!(errors[0].contains("scoring.weights.company_size"));
    }

    #[test]
    fn test_thresholds_must_strictly_decrease() {
        let mut config = ScoringConfig::default();
        config.thresholds = Thresholds {
            high: 50.0,
            medium: 50.0,
            low: 30.0,
        };
        let errors = validate_scoring(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("high (50) must be greater than medium (50)"));
    }

    #[test]
    fn test_threshold_out_of_range() {
        let mut config = ScoringConfig::default();
        config.thresholds.high = 120.0;
        let errors = validate_scoring(&config).unwrap_err();
        assert!(errors[0].contains("scoring.thresholds.high"));
    }

    #[test]
    fn test_empty_template() {
        let mut config = ScoringConfig::default();
        config.templates.medium = " ".to_string();
        let errors = validate_scoring(&config).unwrap_err();
        assert!(errors[0].contains("scoring.templates.medium"));
    }

    #[test]
    fn test_degenerate_feature_range() {
        let mut config = ScoringConfig::default();
        config.features.email_opens = FeatureRange::new(5.0, 5.0);
        let errors = validate_scoring(&config).unwrap_err();
        assert!(errors[0].contains("scoring.features.email_opens.max"));
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = ScoringConfig::default();
        config.weights.company_size = 0.9; // Error 1: sum
        config.thresholds.low = 60.0; // Error 2: medium <= low
        config.templates.none = String::new(); // Error 3
        let errors = validate_scoring(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
    }
}
