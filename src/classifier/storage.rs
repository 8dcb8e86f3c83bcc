use anyhow::{Context, Result};
use atomic_write_file::AtomicWriteFile;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::path::Path;

use super::ModelVersion;

const MODEL_FILE_FORMAT: u32 = 1;

#[derive(Serialize, Deserialize)]
struct ModelFile {
    format: u32,
    model: ModelVersion,
}

/// Load the persisted active model, if any.
pub fn load_model(path: &Path) -> Result<Option<ModelVersion>> {
    if !path.exists() {
        return Ok(None);
    }

    let file = File::open(path)
        .with_context(|| format!("Failed to open model file at {}", path.display()))?;
    let stored: ModelFile = serde_json::from_reader(file).context("Failed to load model")?;

    if stored.format != MODEL_FILE_FORMAT {
        anyhow::bail!("Unsupported model file format: {}", stored.format);
    }

    Ok(Some(stored.model))
}

/// Persist a promoted model atomically.
pub fn save_model(path: &Path, model: &ModelVersion) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
    }

    let mut file = AtomicWriteFile::open(path)
        .with_context(|| format!("Failed to open atomic write file at {}", path.display()))?;

    let stored = ModelFile {
        format: MODEL_FILE_FORMAT,
        model: model.clone(),
    };
    serde_json::to_writer(&mut file, &stored).context("Failed to serialize model")?;

    file.commit().context("Failed to save model")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{train_candidate, ClassifierConfig, TrainingSample};
    use crate::scoring::FeatureVector;
    use std::env;

    #[test]
    fn test_missing_model_file() {
        let temp_path = env::temp_dir().join("lead_tier_test_missing_model.json");
        let _ = fs::remove_file(&temp_path);
        assert!(load_model(&temp_path).unwrap().is_none());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let temp_path = env::temp_dir().join("lead_tier_test_model_roundtrip.json");
        let _ = fs::remove_file(&temp_path);

        let samples: Vec<TrainingSample> = (0..20)
            .map(|i| TrainingSample {
                features: FeatureVector([i as f64 * 5.0, 10.0, 10.0, 10.0]),
                label: i >= 10,
            })
            .collect();
        let config = ClassifierConfig {
            n_estimators: 5,
            ..Default::default()
        };
        let model = train_candidate(&samples, &config, 3).unwrap();

        save_model(&temp_path, &model).unwrap();
        let loaded = load_model(&temp_path).unwrap().unwrap();

        assert_eq!(loaded.version, 3);
        assert_eq!(loaded.training_samples, model.training_samples);
        let probe = FeatureVector([90.0, 10.0, 10.0, 10.0]);
        assert!((loaded.predict_probability(&probe) - model.predict_probability(&probe)).abs() < 1e-9);

        let _ = fs::remove_file(&temp_path);
    }
}
