pub mod config;
pub mod forest;
pub mod scaler;
pub mod storage;

pub use config::{validate_classifier, ClassifierConfig};
pub use forest::{ForestParams, RandomForest};
pub use scaler::StandardScaler;
pub use storage::{load_model, save_model};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{LeadError, Result};
use crate::scoring::FeatureVector;

/// One labeled lead for training.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingSample {
    pub features: FeatureVector,
    pub label: bool,
}

/// A trained classifier snapshot. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelVersion {
    pub version: u64,
    /// Held-out accuracy measured at training time
    pub accuracy: f64,
    pub trained_at: DateTime<Utc>,
    pub training_samples: usize,
    pub held_out_samples: usize,
    scaler: StandardScaler,
    forest: RandomForest,
}

impl ModelVersion {
    /// Conversion likelihood in [0, 1].
    pub fn predict_probability(&self, features: &FeatureVector) -> f64 {
        let row = self.scaler.transform(features);
        self.forest.predict_probability(&row).clamp(0.0, 1.0)
    }
}

/// Shuffle `0..n` with a fixed seed and split off the held-out partition.
/// The held-out side gets `ceil(n * test_fraction)` items, at least one on each side.
pub fn split_indices(n: usize, test_fraction: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    if n < 2 {
        return (indices, Vec::new());
    }
    let held_out = ((n as f64 * test_fraction).ceil() as usize).clamp(1, n - 1);
    let test = indices.split_off(n - held_out);
    (indices, test)
}

/// Fit a candidate model without promoting it.
pub fn train_candidate(
    samples: &[TrainingSample],
    config: &ClassifierConfig,
    version: u64,
) -> Result<ModelVersion> {
    if samples.len() < config.min_training_samples {
        return Err(LeadError::TrainingData(format!(
            "need at least {} labeled leads, have {}",
            config.min_training_samples,
            samples.len()
        )));
    }
    let positives = samples.iter().filter(|s| s.label).count();
    if positives == 0 || positives == samples.len() {
        return Err(LeadError::TrainingData(
            "need both converted and non-converted leads".to_string(),
        ));
    }

    let (train_idx, test_idx) = split_indices(samples.len(), config.test_fraction, config.seed);

    let train_features: Vec<FeatureVector> =
        train_idx.iter().map(|&i| samples[i].features).collect();
    let scaler = StandardScaler::fit(&train_features);
    let rows: Vec<_> = train_features.iter().map(|f| scaler.transform(f)).collect();
    let labels: Vec<bool> = train_idx.iter().map(|&i| samples[i].label).collect();
    let forest = RandomForest::fit(&rows, &labels, &config.forest_params());

    let mut model = ModelVersion {
        version,
        accuracy: 0.0,
        trained_at: Utc::now(),
        training_samples: train_idx.len(),
        held_out_samples: test_idx.len(),
        scaler,
        forest,
    };

    let correct = test_idx
        .iter()
        .filter(|&&i| (model.predict_probability(&samples[i].features) >= 0.5) == samples[i].label)
        .count();
    model.accuracy = if test_idx.is_empty() {
        0.0
    } else {
        correct as f64 / test_idx.len() as f64
    };

    Ok(model)
}

/// Result of a `retrain` call.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrainOutcome {
    pub promoted: bool,
    pub accuracy: f64,
    /// Version number given to this training run
    pub version: u64,
    /// Version serving predictions after the run
    pub active_version: Option<u64>,
}

/// Versioned classifier with a single active model.
///
/// Inference clones the active `Arc` under a short read lock, so it never
/// waits on training and never sees a half-built model. Promotion replaces
/// the `Arc` in one write.
pub struct Classifier {
    config: ClassifierConfig,
    active: RwLock<Option<Arc<ModelVersion>>>,
    next_version: AtomicU64,
}

impl Classifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self {
            config,
            active: RwLock::new(None),
            next_version: AtomicU64::new(1),
        }
    }

    /// Start with a previously persisted model active.
    pub fn with_model(config: ClassifierConfig, model: ModelVersion) -> Self {
        let next = model.version + 1;
        Self {
            config,
            active: RwLock::new(Some(Arc::new(model))),
            next_version: AtomicU64::new(next),
        }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    pub fn active(&self) -> Option<Arc<ModelVersion>> {
        self.active.read().clone()
    }

    pub fn active_version(&self) -> Option<u64> {
        self.active.read().as_ref().map(|m| m.version)
    }

    pub fn predict_probability(&self, features: &FeatureVector) -> Result<f64> {
        let model = self.active().ok_or(LeadError::ModelUnavailable)?;
        Ok(model.predict_probability(features))
    }

    /// Make `candidate` the active model if it passes the quality gate.
    pub fn promote(&self, candidate: ModelVersion) -> Result<Arc<ModelVersion>> {
        let reject = |reason: String| LeadError::ModelRejected {
            version: candidate.version,
            accuracy: candidate.accuracy,
            reason,
        };

        if candidate.accuracy < self.config.min_accuracy {
            return Err(reject(format!(
                "below required {:.3}",
                self.config.min_accuracy
            )));
        }

        let mut active = self.active.write();
        if let Some(current) = active.as_ref() {
            if current.version > candidate.version {
                return Err(reject(format!("newer model v{} is already active", current.version)));
            }
            if self.config.reject_regression && candidate.accuracy < current.accuracy {
                return Err(reject(format!(
                    "regresses from v{} ({:.3})",
                    current.version, current.accuracy
                )));
            }
        }

        let promoted = Arc::new(candidate);
        *active = Some(Arc::clone(&promoted));
        Ok(promoted)
    }

    /// Train on `samples` and promote the result if it passes the gate.
    ///
    /// A gate failure is not an error: the previous model stays active and the
    /// outcome reports `promoted: false`.
    pub fn retrain(&self, samples: &[TrainingSample]) -> Result<RetrainOutcome> {
        let version = self.next_version.fetch_add(1, Ordering::SeqCst);
        info!(version, samples = samples.len(), "Training classifier");

        let candidate = train_candidate(samples, &self.config, version)?;
        let accuracy = candidate.accuracy;
        info!(version, accuracy, "Classifier trained");

        match self.promote(candidate) {
            Ok(model) => {
                info!(version = model.version, accuracy, "Promoted classifier model");
                Ok(RetrainOutcome {
                    promoted: true,
                    accuracy,
                    version,
                    active_version: Some(model.version),
                })
            }
            Err(e @ LeadError::ModelRejected { .. }) => {
                warn!("{}", e);
                Ok(RetrainOutcome {
                    promoted: false,
                    accuracy,
                    version,
                    active_version: self.active_version(),
                })
            }
            Err(e) => Err(e),
        }
    }
}
