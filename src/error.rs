use thiserror::Error;

use crate::leads::{InteractionId, LeadId};
use crate::store::StoreError;

pub type Result<T> = std::result::Result<T, LeadError>;

/// Errors raised by the scoring core.
///
/// `ModelUnavailable` and `ModelRejected` never abort a recompute: the first
/// falls back to the weighted formula and the second keeps the previous model.
#[derive(Error, Debug)]
pub enum LeadError {
    /// Malformed input, rejected before any state change
    #[error("Invalid input: {0}")]
    Validation(String),

    /// A required feature is absent, scoring aborted
    #[error("Missing required feature: {feature}")]
    MissingFeature { feature: &'static str },

    /// No classifier model has been trained yet
    #[error("No trained model available")]
    ModelUnavailable,

    /// A training run failed the promotion gate
    #[error("Model v{version} rejected (accuracy {accuracy:.3}): {reason}")]
    ModelRejected {
        version: u64,
        accuracy: f64,
        reason: String,
    },

    /// Not enough labeled leads to train on
    #[error("Training data: {0}")]
    TrainingData(String),

    #[error("Lead {0} not found")]
    LeadNotFound(LeadId),

    #[error("Interaction {0} not found")]
    InteractionNotFound(InteractionId),

    /// Store unreachable or write failed
    #[error("Persistence error: {0}")]
    Persistence(#[from] StoreError),

    /// Notification send failed
    #[error("Dispatch error: {0}")]
    Dispatch(String),
}

impl LeadError {
    pub fn dispatch(msg: impl Into<String>) -> Self {
        Self::Dispatch(msg.into())
    }

    /// Join a list of validation problems into one error.
    pub fn from_problems(problems: Vec<String>) -> Self {
        Self::Validation(problems.join("; "))
    }
}
