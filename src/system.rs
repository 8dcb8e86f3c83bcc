use anyhow::Context;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::classifier::{load_model, save_model, Classifier, RetrainOutcome};
use crate::config::{self, Config};
use crate::dispatch::{ActionDispatcher, LogNotifier, Notifier, TemplateCatalog};
use crate::error::{LeadError, Result};
use crate::leads::{InteractionId, InteractionKind, Lead, LeadAttributes, LeadId};
use crate::processor::{InteractionProcessor, RecomputeOutcome, RecordedInteraction};
use crate::scoring::{ScoringConfig, ScoringPipeline, Tier};
use crate::store::{JsonFileStore, LeadStore, StoreError};

/// The assembled lead scoring system.
///
/// Share it behind an `Arc` to drive it from several tasks.
pub struct LeadSystem {
    processor: InteractionProcessor,
    classifier: Arc<Classifier>,
    dispatcher: Arc<ActionDispatcher>,
    model_path: Option<PathBuf>,
}

impl LeadSystem {
    /// Scoring reloads are checked against `catalog` so every tier keeps a template.
    pub fn new(
        store: Arc<dyn LeadStore>,
        scoring: &ScoringConfig,
        catalog: TemplateCatalog,
        classifier: Arc<Classifier>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self> {
        let dispatcher = Arc::new(ActionDispatcher::new(notifier));
        let processor = InteractionProcessor::new(
            store,
            ScoringPipeline::new(scoring)?,
            Arc::clone(&classifier),
            Arc::clone(&dispatcher),
        )
        .with_catalog(catalog)?;
        Ok(Self {
            processor,
            classifier,
            dispatcher,
            model_path: None,
        })
    }

    /// Persist promoted models to `path`.
    pub fn with_model_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.model_path = Some(path.into());
        self
    }

    /// Build the file-backed system described by `config`.
    ///
    /// The config must already be validated.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let data_path = config::data_path(config)?;
        let model_path = config::model_path(config)?;

        let store = JsonFileStore::open(&data_path)?;
        let classifier = match load_model(&model_path)? {
            Some(model) => {
                info!(version = model.version, accuracy = model.accuracy, "Loaded classifier model");
                Classifier::with_model(config.classifier.clone(), model)
            }
            None => Classifier::new(config.classifier.clone()),
        };
        let notifier = LogNotifier::new(config.notifications.templates.clone());

        let system = Self::new(
            Arc::new(store),
            &config.scoring,
            config.notifications.templates.clone(),
            Arc::new(classifier),
            Arc::new(notifier),
        )
        .context("Failed to build scoring pipeline")?;
        Ok(system.with_model_path(model_path))
    }

    pub async fn create_lead(&self, attributes: LeadAttributes) -> Result<RecomputeOutcome> {
        self.processor.create_lead(attributes).await
    }

    pub async fn record_interaction(
        &self,
        lead_id: LeadId,
        kind: InteractionKind,
        details: Option<String>,
    ) -> Result<RecordedInteraction> {
        self.processor.record_interaction(lead_id, kind, details).await
    }

    pub async fn replay_interaction(
        &self,
        interaction_id: InteractionId,
    ) -> Result<Option<RecomputeOutcome>> {
        self.processor.replay_interaction(interaction_id).await
    }

    pub fn get_lead(&self, lead_id: LeadId) -> Result<Lead> {
        self.processor.get_lead(lead_id)
    }

    pub fn get_score(&self, lead_id: LeadId) -> Result<(f64, Tier)> {
        self.processor.get_score(lead_id)
    }

    pub async fn set_conversion(&self, lead_id: LeadId, converted: bool) -> Result<Lead> {
        self.processor.set_conversion(lead_id, converted).await
    }

    pub fn list_leads(&self) -> Result<Vec<Lead>> {
        self.processor.list_leads()
    }

    pub fn reload_scoring(&self, config: &ScoringConfig) -> Result<()> {
        self.processor.reload_scoring(config)
    }

    pub fn active_model_version(&self) -> Option<u64> {
        self.classifier.active_version()
    }

    /// Train a new model from every labeled lead and promote it if it passes
    /// the gate. Training runs on the blocking pool; scoring keeps using the
    /// previous model until the swap.
    pub async fn retrain_model(&self) -> Result<RetrainOutcome> {
        let samples = self.processor.training_samples()?;
        let classifier = Arc::clone(&self.classifier);

        let outcome = tokio::task::spawn_blocking(move || classifier.retrain(&samples))
            .await
            .map_err(|e| LeadError::TrainingData(format!("training task failed: {}", e)))??;

        if outcome.promoted {
            self.persist_model()?;
        }
        Ok(outcome)
    }

    fn persist_model(&self) -> Result<()> {
        let (Some(path), Some(model)) = (self.model_path.as_ref(), self.classifier.active()) else {
            return Ok(());
        };
        save_model(path, &model).map_err(|e| {
            warn!("Model v{} is active but could not be saved: {:#}", model.version, e);
            LeadError::Persistence(StoreError::WriteFailed(format!("{:#}", e)))
        })?;
        info!(version = model.version, path = %path.display(), "Saved classifier model");
        Ok(())
    }

    /// Wait for in-flight notifications.
    pub async fn shutdown(&self) {
        self.dispatcher.drain().await;
    }
}
