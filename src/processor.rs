use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex as LeadLock, OwnedMutexGuard};
use tokio_retry::strategy::ExponentialBackoff;
use tokio_retry::RetryIf;
use tracing::{debug, info, warn};

use crate::classifier::{Classifier, TrainingSample};
use crate::dispatch::{validate_catalog, ActionDispatcher, ActionRequest, TemplateCatalog};
use crate::error::{LeadError, Result};
use crate::leads::{
    Interaction, InteractionId, InteractionKind, Lead, LeadAttributes, LeadId, NewInteraction,
};
use crate::scoring::{blend, ScoreResult, ScoringConfig, ScoringPipeline, Tier, Transition};
use crate::store::{LeadStore, StoreError};

/// Backoff for interaction log appends.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub base_millis: u64,
    pub max_delay: Duration,
    pub attempts: usize,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_millis: 100,
            max_delay: Duration::from_secs(5),
            attempts: 3,
        }
    }
}

impl RetryPolicy {
    fn strategy(&self) -> impl Iterator<Item = Duration> {
        ExponentialBackoff::from_millis(self.base_millis)
            .max_delay(self.max_delay)
            .take(self.attempts)
    }
}

/// What a recompute produced.
#[derive(Debug, Clone)]
pub struct RecomputeOutcome {
    /// Lead as persisted after the recompute
    pub lead: Lead,
    pub result: ScoreResult,
    pub transition: Option<Transition>,
}

/// Result of `record_interaction`.
#[derive(Debug, Clone)]
pub struct RecordedInteraction {
    pub interaction: Interaction,
    pub outcome: RecomputeOutcome,
}

type LockMap = Mutex<HashMap<LeadId, Arc<LeadLock<()>>>>;

/// Exclusive hold on one lead. Dropping it releases the lead and removes
/// the map entry once no other task is waiting on it.
struct LeadGuard<'a> {
    locks: &'a LockMap,
    id: LeadId,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for LeadGuard<'_> {
    fn drop(&mut self) {
        let mut locks = self.locks.lock();
        drop(self.guard.take());
        if locks.get(&self.id).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            locks.remove(&self.id);
        }
    }
}

/// Owns every lead mutation.
///
/// Recomputes for one lead are serialized through a per-lead async lock;
/// different leads never contend. The scoring pipeline is shared behind an
/// `Arc` that is cloned once per recompute and replaced whole on reload.
/// Store writes run on the blocking pool.
pub struct InteractionProcessor {
    store: Arc<dyn LeadStore>,
    pipeline: RwLock<Arc<ScoringPipeline>>,
    catalog: Option<TemplateCatalog>,
    classifier: Arc<Classifier>,
    dispatcher: Arc<ActionDispatcher>,
    locks: LockMap,
    retry: RetryPolicy,
}

impl InteractionProcessor {
    pub fn new(
        store: Arc<dyn LeadStore>,
        pipeline: ScoringPipeline,
        classifier: Arc<Classifier>,
        dispatcher: Arc<ActionDispatcher>,
    ) -> Self {
        Self {
            store,
            pipeline: RwLock::new(Arc::new(pipeline)),
            catalog: None,
            classifier,
            dispatcher,
            locks: Mutex::new(HashMap::new()),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Check tier template mappings against `catalog`, now and on every reload.
    pub fn with_catalog(mut self, catalog: TemplateCatalog) -> Result<Self> {
        validate_catalog(&catalog, &self.pipeline().templates).map_err(LeadError::from_problems)?;
        self.catalog = Some(catalog);
        Ok(self)
    }

    pub fn pipeline(&self) -> Arc<ScoringPipeline> {
        Arc::clone(&self.pipeline.read())
    }

    /// Validate `config` and swap it in. In-flight recomputes finish on the old one.
    pub fn reload_scoring(&self, config: &ScoringConfig) -> Result<()> {
        let pipeline = ScoringPipeline::new(config)?;
        if let Some(ref catalog) = self.catalog {
            validate_catalog(catalog, &pipeline.templates).map_err(LeadError::from_problems)?;
        }
        *self.pipeline.write() = Arc::new(pipeline);
        info!("Scoring configuration reloaded");
        Ok(())
    }

    async fn lock_lead(&self, id: LeadId) -> LeadGuard<'_> {
        let lock = Arc::clone(self.locks.lock().entry(id).or_default());
        let guard = lock.lock_owned().await;
        LeadGuard {
            locks: &self.locks,
            id,
            guard: Some(guard),
        }
    }

    /// Run a store write on the blocking pool.
    async fn write<T, F>(&self, op: F) -> std::result::Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&dyn LeadStore) -> std::result::Result<T, StoreError> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || op(store.as_ref()))
            .await
            .map_err(|e| StoreError::Unavailable(format!("store task failed: {}", e)))?
    }

    async fn save_lead(&self, lead: &Lead) -> Result<()> {
        let lead = lead.clone();
        self.write(move |store| store.upsert_lead(&lead)).await?;
        Ok(())
    }

    fn load_lead(&self, id: LeadId) -> Result<Lead> {
        self.store.get_lead(id)?.ok_or(LeadError::LeadNotFound(id))
    }

    /// Weighted score, blended with the classifier when a model is active.
    fn score(&self, pipeline: &ScoringPipeline, lead: &Lead) -> Result<ScoreResult> {
        let features = pipeline.extractor.extract(lead)?;
        let base = pipeline.scorer.score(&features);

        match self.classifier.predict_probability(&features) {
            Ok(probability) => Ok(blend(base, probability, self.classifier.config().blend)),
            Err(LeadError::ModelUnavailable) => {
                debug!(lead_id = %lead.id, "No classifier model, using weighted score");
                Ok(base)
            }
            Err(e) => {
                warn!(lead_id = %lead.id, "Classifier failed, using weighted score: {}", e);
                Ok(base)
            }
        }
    }

    fn emit(&self, pipeline: &ScoringPipeline, transition: &Transition, lead: &Lead) {
        info!(
            lead_id = %transition.lead_id,
            from = %transition.from,
            to = %transition.to,
            score = transition.score,
            "Tier transition"
        );
        self.dispatcher
            .dispatch(ActionRequest::for_transition(transition, lead, &pipeline.templates));
    }

    /// Score and store a new lead.
    ///
    /// The previous tier of a new lead counts as `none`, so a transition is
    /// only emitted when it starts above that.
    pub async fn create_lead(&self, attributes: LeadAttributes) -> Result<RecomputeOutcome> {
        attributes.validate().map_err(LeadError::from_problems)?;

        let pipeline = self.pipeline();
        let id = self.write(|store| store.next_lead_id()).await?;
        let mut lead = Lead::new(id, attributes, Utc::now());

        let result = self.score(&pipeline, &lead)?;
        lead.score = result.score;
        lead.tier = pipeline.tiers.assign(result.score);
        self.save_lead(&lead).await?;
        info!(lead_id = %id, score = lead.score, tier = %lead.tier, "Lead created");

        let transition = pipeline
            .tiers
            .transition(id, Tier::None, lead.tier, lead.score, None);
        if let Some(ref t) = transition {
            self.emit(&pipeline, t, &lead);
        }

        Ok(RecomputeOutcome {
            lead,
            result,
            transition,
        })
    }

    /// Log an interaction and rescore its lead.
    ///
    /// The log append happens first and is never undone. If scoring then
    /// fails, the error is returned and the lead is left as it was; the
    /// logged interaction is folded in by the next successful recompute.
    pub async fn record_interaction(
        &self,
        lead_id: LeadId,
        kind: InteractionKind,
        details: Option<String>,
    ) -> Result<RecordedInteraction> {
        let _guard = self.lock_lead(lead_id).await;

        let lead = self.load_lead(lead_id)?;
        let interaction = self
            .append_with_retry(NewInteraction {
                lead_id,
                kind,
                occurred_at: Utc::now(),
                details,
            })
            .await?;
        debug!(lead_id = %lead_id, interaction_id = %interaction.id, kind = %interaction.kind, "Interaction logged");

        let outcome = self.apply_pending(lead, Some(interaction.id)).await?;
        Ok(RecordedInteraction {
            interaction,
            outcome,
        })
    }

    /// Re-drive an interaction that is already in the log.
    ///
    /// Returns `None` when it has already been applied: no counter changes
    /// and nothing is dispatched.
    pub async fn replay_interaction(
        &self,
        interaction_id: InteractionId,
    ) -> Result<Option<RecomputeOutcome>> {
        let interaction = self
            .store
            .get_interaction(interaction_id)?
            .ok_or(LeadError::InteractionNotFound(interaction_id))?;

        let _guard = self.lock_lead(interaction.lead_id).await;

        let lead = self.load_lead(interaction.lead_id)?;
        if lead.applied_through.is_some_and(|applied| applied >= interaction_id) {
            debug!(interaction_id = %interaction_id, "Interaction already applied, skipping");
            return Ok(None);
        }

        self.apply_pending(lead, Some(interaction_id)).await.map(Some)
    }

    async fn append_with_retry(&self, interaction: NewInteraction) -> Result<Interaction> {
        let stored = RetryIf::spawn(
            self.retry.strategy(),
            || {
                let interaction = interaction.clone();
                self.write(move |store| store.append_interaction(interaction))
            },
            |e: &StoreError| {
                let retry = !matches!(e, StoreError::UnknownLead(_));
                if retry {
                    warn!("Interaction log append failed, retrying: {}", e);
                }
                retry
            },
        )
        .await?;
        Ok(stored)
    }

    /// Fold unapplied log entries into the counters, rescore, persist, dispatch.
    /// Caller must hold the lead's lock.
    async fn apply_pending(
        &self,
        mut lead: Lead,
        trigger: Option<InteractionId>,
    ) -> Result<RecomputeOutcome> {
        let pipeline = self.pipeline();
        let previous_tier = lead.tier;

        let pending = self.store.interactions_after(lead.id, lead.applied_through)?;
        for interaction in &pending {
            if !lead.engagement.record(&interaction.kind) {
                debug!(interaction_id = %interaction.id, kind = %interaction.kind, "Interaction type has no counter");
            }
            lead.applied_through = Some(interaction.id);
        }

        let result = self.score(&pipeline, &lead)?;
        lead.score = result.score;
        lead.tier = pipeline.tiers.assign(result.score);
        lead.touch(Utc::now());
        self.save_lead(&lead).await?;
        debug!(
            lead_id = %lead.id,
            applied = pending.len(),
            score = lead.score,
            tier = %lead.tier,
            "Lead rescored"
        );

        let transition = pipeline
            .tiers
            .transition(lead.id, previous_tier, lead.tier, lead.score, trigger);
        if let Some(ref t) = transition {
            self.emit(&pipeline, t, &lead);
        }

        Ok(RecomputeOutcome {
            lead,
            result,
            transition,
        })
    }

    pub fn get_lead(&self, lead_id: LeadId) -> Result<Lead> {
        self.load_lead(lead_id)
    }

    pub fn get_score(&self, lead_id: LeadId) -> Result<(f64, Tier)> {
        let lead = self.load_lead(lead_id)?;
        Ok((lead.score, lead.tier))
    }

    /// Record whether a lead converted. Training reads this label.
    pub async fn set_conversion(&self, lead_id: LeadId, converted: bool) -> Result<Lead> {
        let _guard = self.lock_lead(lead_id).await;

        let mut lead = self.load_lead(lead_id)?;
        lead.conversion_status = converted.into();
        lead.touch(Utc::now());
        self.save_lead(&lead).await?;
        info!(lead_id = %lead_id, converted, "Conversion status recorded");
        Ok(lead)
    }

    /// All leads, highest score first; ties go to the older lead.
    pub fn list_leads(&self) -> Result<Vec<Lead>> {
        let mut leads = self.store.list_leads()?;
        leads.sort_by(|a, b| {
            let score_cmp = b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal);
            if score_cmp != std::cmp::Ordering::Equal {
                return score_cmp;
            }
            a.created_at.cmp(&b.created_at)
        });
        Ok(leads)
    }

    /// Feature vectors and labels for every lead with a known outcome.
    /// Leads missing a required feature are skipped.
    pub fn training_samples(&self) -> Result<Vec<TrainingSample>> {
        let pipeline = self.pipeline();
        let mut samples = Vec::new();
        for lead in self.store.list_leads()? {
            let Some(label) = lead.conversion_status.label() else {
                continue;
            };
            match pipeline.extractor.extract(&lead) {
                Ok(features) => samples.push(TrainingSample { features, label }),
                Err(e) => debug!(lead_id = %lead.id, "Skipping lead for training: {}", e),
            }
        }
        Ok(samples)
    }
}
