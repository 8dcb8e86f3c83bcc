pub mod file;
pub mod memory;

pub use file::JsonFileStore;
pub use memory::MemoryStore;

use thiserror::Error;

use crate::leads::{Interaction, InteractionId, Lead, LeadId, NewInteraction};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Lead {0} does not exist")]
    UnknownLead(LeadId),

    #[error("Corrupt store data: {0}")]
    Corrupt(String),
}

/// Read/write contract the scoring core needs from persistence.
///
/// Leads are only ever written by the interaction processor. Interactions are
/// append-only: there is no update or delete.
pub trait LeadStore: Send + Sync {
    /// Reserve the next lead identifier.
    fn next_lead_id(&self) -> Result<LeadId, StoreError>;

    fn get_lead(&self, id: LeadId) -> Result<Option<Lead>, StoreError>;

    fn upsert_lead(&self, lead: &Lead) -> Result<(), StoreError>;

    /// Append to the interaction log. The store assigns a monotonically
    /// increasing id. Fails with `UnknownLead` if the lead is not stored.
    fn append_interaction(&self, interaction: NewInteraction) -> Result<Interaction, StoreError>;

    fn get_interaction(&self, id: InteractionId) -> Result<Option<Interaction>, StoreError>;

    /// Log entries for `lead_id` with id greater than `after`, oldest first.
    fn interactions_after(
        &self,
        lead_id: LeadId,
        after: Option<InteractionId>,
    ) -> Result<Vec<Interaction>, StoreError>;

    /// Every stored lead. Only the training batch uses this.
    fn list_leads(&self) -> Result<Vec<Lead>, StoreError>;
}
