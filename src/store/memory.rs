use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{LeadStore, StoreError};
use crate::leads::{Interaction, InteractionId, Lead, LeadId, NewInteraction};

pub const STORE_VERSION: u32 = 1;

/// Serializable contents of a store. Also the on-disk format of `JsonFileStore`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub version: u32,
    #[serde(default)]
    pub next_lead_id: u64,
    #[serde(default)]
    pub next_interaction_id: u64,
    #[serde(default)]
    pub leads: BTreeMap<LeadId, Lead>,
    #[serde(default)]
    pub interactions: Vec<Interaction>,
}

impl Default for StoreSnapshot {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreSnapshot {
    pub fn new() -> Self {
        Self {
            version: STORE_VERSION,
            next_lead_id: 1,
            next_interaction_id: 1,
            leads: BTreeMap::new(),
            interactions: Vec::new(),
        }
    }

    pub fn allocate_lead_id(&mut self) -> LeadId {
        let id = LeadId(self.next_lead_id.max(1));
        self.next_lead_id = id.0 + 1;
        id
    }

    pub fn upsert_lead(&mut self, lead: &Lead) {
        if lead.id.0 >= self.next_lead_id {
            self.next_lead_id = lead.id.0 + 1;
        }
        self.leads.insert(lead.id, lead.clone());
    }

    pub fn append_interaction(
        &mut self,
        interaction: NewInteraction,
    ) -> Result<Interaction, StoreError> {
        if !self.leads.contains_key(&interaction.lead_id) {
            return Err(StoreError::UnknownLead(interaction.lead_id));
        }
        let id = InteractionId(self.next_interaction_id.max(1));
        self.next_interaction_id = id.0 + 1;

        let stored = Interaction {
            id,
            lead_id: interaction.lead_id,
            kind: interaction.kind,
            occurred_at: interaction.occurred_at,
            details: interaction.details,
        };
        self.interactions.push(stored.clone());
        Ok(stored)
    }

    pub fn get_interaction(&self, id: InteractionId) -> Option<Interaction> {
        // Ids are assigned in append order, so the log is sorted by id
        self.interactions
            .binary_search_by_key(&id, |i| i.id)
            .ok()
            .map(|idx| self.interactions[idx].clone())
    }

    pub fn interactions_after(
        &self,
        lead_id: LeadId,
        after: Option<InteractionId>,
    ) -> Vec<Interaction> {
        let start = match after {
            Some(watermark) => self.interactions.partition_point(|i| i.id <= watermark),
            None => 0,
        };
        self.interactions[start..]
            .iter()
            .filter(|i| i.lead_id == lead_id)
            .cloned()
            .collect()
    }
}

/// In-process store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<StoreSnapshot>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        self.inner.read().clone()
    }

    /// Full interaction log for one lead, oldest first.
    pub fn interactions_for(&self, lead_id: LeadId) -> Vec<Interaction> {
        self.inner.read().interactions_after(lead_id, None)
    }
}

impl LeadStore for MemoryStore {
    fn next_lead_id(&self) -> Result<LeadId, StoreError> {
        Ok(self.inner.write().allocate_lead_id())
    }

    fn get_lead(&self, id: LeadId) -> Result<Option<Lead>, StoreError> {
        Ok(self.inner.read().leads.get(&id).cloned())
    }

    fn upsert_lead(&self, lead: &Lead) -> Result<(), StoreError> {
        self.inner.write().upsert_lead(lead);
        Ok(())
    }

    fn append_interaction(&self, interaction: NewInteraction) -> Result<Interaction, StoreError> {
        self.inner.write().append_interaction(interaction)
    }

    fn get_interaction(&self, id: InteractionId) -> Result<Option<Interaction>, StoreError> {
        Ok(self.inner.read().get_interaction(id))
    }

    fn interactions_after(
        &self,
        lead_id: LeadId,
        after: Option<InteractionId>,
    ) -> Result<Vec<Interaction>, StoreError> {
        Ok(self.inner.read().interactions_after(lead_id, after))
    }

    fn list_leads(&self) -> Result<Vec<Lead>, StoreError> {
        Ok(self.inner.read().leads.values().cloned().collect())
    }
}
