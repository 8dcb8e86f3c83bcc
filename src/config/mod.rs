mod schema;

pub use schema::{validate_config, Config, NotificationConfig, StoreConfig};

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Get the config directory path (~/.config/lead-tier/)
pub fn get_config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".config").join("lead-tier"))
}

/// Get the default config file path (~/.config/lead-tier/config.yaml)
pub fn get_config_path() -> Result<PathBuf> {
    Ok(get_config_dir()?.join("config.yaml"))
}

/// Load configuration from a YAML file
///
/// # Arguments
///
/// * `path` - Optional path to config file. If None, uses the default path
///   (~/.config/lead-tier/config.yaml) and falls back to built-in defaults
///   when that file does not exist.
///
/// # Errors
///
/// Returns an error if:
/// - An explicitly given config file does not exist
/// - The config file cannot be read
/// - The YAML cannot be parsed
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                anyhow::bail!("Config file not found at {}", p.display());
            }
            p.to_path_buf()
        }
        None => {
            let default_path = get_config_path()?;
            if !default_path.exists() {
                return Ok(Config::default());
            }
            default_path
        }
    };

    parse_config_file(&config_path)
}

fn parse_config_file(config_path: &Path) -> Result<Config> {
    let config_content = fs::read_to_string(config_path)
        .with_context(|| format!("Failed to read config file at {}", config_path.display()))?;

    let config: Config = serde_saphyr::from_str(&config_content)
        .with_context(|| format!("Failed to parse config: invalid YAML in {}", config_path.display()))?;

    Ok(config)
}

/// Lead data file: configured path or ~/.config/lead-tier/leads.json
pub fn data_path(config: &Config) -> Result<PathBuf> {
    match config.store.path {
        Some(ref p) => Ok(p.clone()),
        None => Ok(get_config_dir()?.join("leads.json")),
    }
}

/// Model file: configured path or ~/.config/lead-tier/model.json
pub fn model_path(config: &Config) -> Result<PathBuf> {
    match config.store.model_path {
        Some(ref p) => Ok(p.clone()),
        None => Ok(get_config_dir()?.join("model.json")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn test_explicit_missing_file_is_error() {
        let path = env::temp_dir().join("lead_tier_test_no_such_config.yaml");
        let _ = fs::remove_file(&path);
        let err = load_config(Some(&path)).unwrap_err();
        assert!(err.to_string().contains("Config file not found"));
    }

    #[test]
    fn test_load_explicit_file() {
        let path = env::temp_dir().join("lead_tier_test_config.yaml");
        fs::write(
            &path,
            "store:\n  path: /var/lib/lead-tier/leads.json\nclassifier:\n  min_accuracy: 0.8\n",
        )
        .unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.classifier.min_accuracy, 0.8);
        assert_eq!(
            data_path(&config).unwrap(),
            PathBuf::from("/var/lib/lead-tier/leads.json")
        );

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_invalid_yaml_is_error() {
        let path = env::temp_dir().join("lead_tier_test_bad_config.yaml");
        fs::write(&path, "scoring: [unclosed\n").unwrap();
        let err = load_config(Some(&path)).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config"));
        let _ = fs::remove_file(&path);
    }
}
