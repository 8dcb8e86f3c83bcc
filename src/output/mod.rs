pub mod formatter;

pub use formatter::{
    format_age, format_lead_detail, format_lead_table, format_retrain, format_score,
    format_tier, format_transition, format_tsv, should_use_colors,
};
