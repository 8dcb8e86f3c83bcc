use super::config::{FeatureWeights, ScoringConfig, TierTemplates};
use super::features::{Feature, FeatureExtractor, FeatureVector};
use super::tier::TierAssigner;
use super::validation::validate_scoring;
use crate::error::{LeadError, Result};

pub const MIN_SCORE: f64 = 0.0;
pub const MAX_SCORE: f64 = 100.0;

#[derive(Debug, Clone)]
pub struct FactorContribution {
    pub feature: Feature,
    pub value: f64,  // Normalized feature value (0-100)
    pub weight: f64, // Configured weight
    pub points: f64, // value * weight
}

#[derive(Debug, Clone)]
pub struct ScoreBreakdown {
    pub factors: Vec<FactorContribution>,
    /// Classifier probability blended in, if a model was active
    pub probability: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct ScoreResult {
    /// Final score in [0, 100]
    pub score: f64,
    /// Weighted-formula score before any blending
    pub base_score: f64,
    pub breakdown: ScoreBreakdown,
}

/// Deterministic linear formula over the feature vector.
#[derive(Debug, Clone)]
pub struct WeightedScorer {
    weights: FeatureWeights,
}

impl WeightedScorer {
    pub fn new(weights: FeatureWeights) -> Self {
        Self { weights }
    }

    /// `Σ feature[i] * weight[i]`, clipped to [0, 100].
    pub fn score(&self, features: &FeatureVector) -> ScoreResult {
        let factors: Vec<FactorContribution> = Feature::ALL
            .iter()
            .map(|&feature| {
                let value = features.get(feature);
                let weight = self.weights.get(feature);
                FactorContribution {
                    feature,
                    value,
                    weight,
                    points: value * weight,
                }
            })
            .collect();

        let score = clip_score(factors.iter().map(|f| f.points).sum());

        ScoreResult {
            score,
            base_score: score,
            breakdown: ScoreBreakdown {
                factors,
                probability: None,
            },
        }
    }
}

/// Blend a classifier probability into a weighted result.
///
/// `final = (1 - blend) * base + blend * 100 * probability`, clipped to [0, 100].
pub fn blend(result: ScoreResult, probability: f64, blend_weight: f64) -> ScoreResult {
    let probability = probability.clamp(0.0, 1.0);
    let blend_weight = blend_weight.clamp(0.0, 1.0);
    let score = clip_score(
        (1.0 - blend_weight) * result.base_score + blend_weight * MAX_SCORE * probability,
    );
    ScoreResult {
        score,
        base_score: result.base_score,
        breakdown: ScoreBreakdown {
            factors: result.breakdown.factors,
            probability: Some(probability),
        },
    }
}

fn clip_score(score: f64) -> f64 {
    if score.is_nan() {
        return MIN_SCORE;
    }
    score.clamp(MIN_SCORE, MAX_SCORE)
}

/// Extractor, scorer, tier assigner and template mapping built from one
/// validated `ScoringConfig`. Swapped as a unit on reload.
#[derive(Debug, Clone)]
pub struct ScoringPipeline {
    pub extractor: FeatureExtractor,
    pub scorer: WeightedScorer,
    pub tiers: TierAssigner,
    pub templates: TierTemplates,
}

impl ScoringPipeline {
    /// Validate `config` and build the components. Fails fast with every problem listed.
    pub fn new(config: &ScoringConfig) -> Result<Self> {
        validate_scoring(config).map_err(LeadError::from_problems)?;
        Ok(Self {
            extractor: FeatureExtractor::new(config.features.clone()),
            scorer: WeightedScorer::new(config.weights.clone()),
            tiers: TierAssigner::new(config.thresholds.clone()),
            templates: config.templates.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::{Thresholds, Tier};

    fn vector(values: [f64; 4]) -> FeatureVector {
        FeatureVector(values)
    }

    #[test]
    fn test_reference_lead_scores_medium() {
        let scorer = WeightedScorer::new(FeatureWeights::default());
        let result = scorer.score(&vector([100.0, 50.0, 40.0, 20.0]));

        // 100*0.3 + 50*0.2 + 40*0.25 + 20*0.25 = 30 + 10 + 10 + 5
        assert!((result.score - 55.0).abs() < 1e-9);
        assert_eq!(
            TierAssigner::new(Thresholds::default()).assign(result.score),
            Tier::Medium
        );
    }

    #[test]
    fn test_breakdown_lists_every_feature() {
        let scorer = WeightedScorer::new(FeatureWeights::default());
        let result = scorer.score(&vector([100.0, 50.0, 40.0, 20.0]));

        assert_eq!(result.breakdown.factors.len(), 4);
        let company = &result.breakdown.factors[0];
        assert_eq!(company.feature, Feature::CompanySize);
        assert!((company.points - 30.0).abs() < 1e-9);
        assert!(result.breakdown.probability.is_none());
    }

    #[test]
    fn test_score_stays_in_range() {
        let scorer = WeightedScorer::new(FeatureWeights::default());
        let grid = [0.0, 1.0, 33.3, 50.0, 99.9, 100.0];
        for a in grid {
            for b in grid {
                for c in grid {
                    for d in grid {
                        let score = scorer.score(&vector([a, b, c, d])).score;
                        assert!((MIN_SCORE..=MAX_SCORE).contains(&score));
                    }
                }
            }
        }
    }

    #[test]
    fn test_score_clips_out_of_range_input() {
        let scorer = WeightedScorer::new(FeatureWeights::default());
        assert_eq!(scorer.score(&vector([500.0; 4])).score, 100.0);
        assert_eq!(scorer.score(&vector([-50.0; 4])).score, 0.0);
        assert_eq!(scorer.score(&vector([f64::NAN; 4])).score, 0.0);
    }

    #[test]
    fn test_score_is_deterministic() {
        let scorer = WeightedScorer::new(FeatureWeights::default());
        let input = vector([12.5, 77.0, 3.25, 64.0]);
        let first = scorer.score(&input).score;
        for _ in 0..100 {
            assert_eq!(scorer.score(&input).score, first);
        }
    }

    #[test]
    fn test_blend_mixes_probability() {
        let scorer = WeightedScorer::new(FeatureWeights::default());
        let base = scorer.score(&vector([100.0, 50.0, 40.0, 20.0]));
        let blended = blend(base, 0.9, 0.5);

        // 0.5 * 55 + 0.5 * 90
        assert!((blended.score - 72.5).abs() < 1e-9);
        assert!((blended.base_score - 55.0).abs() < 1e-9);
        assert_eq!(blended.breakdown.probability, Some(0.9));
    }

    #[test]
    fn test_blend_zero_weight_keeps_base() {
        let scorer = WeightedScorer::new(FeatureWeights::default());
        let base = scorer.score(&vector([100.0, 50.0, 40.0, 20.0]));
        let blended = blend(base, 1.0, 0.0);
        assert!((blended.score - 55.0).abs() < 1e-9);
    }

    #[test]
    fn test_pipeline_rejects_invalid_config() {
        let mut config = ScoringConfig::default();
        config.weights.company_size = 0.9;
        let err = ScoringPipeline::new(&config).unwrap_err();
        assert!(matches!(err, LeadError::Validation(ref msg) if msg.contains("scoring.weights")));
    }
}
