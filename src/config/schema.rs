use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::classifier::{validate_classifier, ClassifierConfig};
use crate::dispatch::{validate_catalog, TemplateCatalog};
use crate::scoring::{validate_scoring, ScoringConfig};

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub scoring: ScoringConfig,
    pub classifier: ClassifierConfig,
    pub store: StoreConfig,
    pub notifications: NotificationConfig,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// Lead and interaction data (default: ~/.config/lead-tier/leads.json)
    pub path: Option<PathBuf>,
    /// Active classifier model (default: ~/.config/lead-tier/model.json)
    pub model_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct NotificationConfig {
    pub templates: TemplateCatalog,
}

/// Validate the whole configuration, collecting every problem.
pub fn validate_config(config: &Config) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();

    if let Err(e) = validate_scoring(&config.scoring) {
        errors.extend(e);
    }
    if let Err(e) = validate_classifier(&config.classifier) {
        errors.extend(e);
    }
    if let Err(e) = validate_catalog(&config.notifications.templates, &config.scoring.templates) {
        errors.extend(e);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
