pub mod config;
pub mod engine;
pub mod features;
pub mod tier;
pub mod validation;

pub use config::*;
pub use engine::{blend, ScoreResult, ScoringPipeline, WeightedScorer};
pub use features::{Feature, FeatureExtractor, FeatureVector};
pub use tier::{Tier, TierAssigner, Transition};
pub use validation::validate_scoring;
