pub mod types;

pub use types::{
    ConversionStatus, Engagement, Interaction, InteractionId, InteractionKind, Lead,
    LeadAttributes, LeadId, NewInteraction,
};
