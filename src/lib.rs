pub mod classifier;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod leads;
pub mod logging;
pub mod output;
pub mod processor;
pub mod scoring;
pub mod store;
pub mod system;

pub use error::{LeadError, Result};
pub use system::LeadSystem;
