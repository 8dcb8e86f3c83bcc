use anyhow::{Context, Result};
use atomic_write_file::AtomicWriteFile;
use parking_lot::Mutex;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use super::memory::{StoreSnapshot, STORE_VERSION};
use super::{LeadStore, StoreError};
use crate::leads::{Interaction, InteractionId, Lead, LeadId, NewInteraction};

/// Load a store snapshot from a JSON file
///
/// If the file doesn't exist, returns a new empty snapshot.
/// Unreadable JSON or an unsupported version is reported as `StoreError::Corrupt`.
pub fn load_snapshot(path: &Path) -> Result<StoreSnapshot> {
    if !path.exists() {
        return Ok(StoreSnapshot::new());
    }

    let file = File::open(path)
        .with_context(|| format!("Failed to open lead store at {}", path.display()))?;

    let snapshot: StoreSnapshot = serde_json::from_reader(file)
        .map_err(|e| StoreError::Corrupt(format!("{}: {}", path.display(), e)))?;

    if snapshot.version != STORE_VERSION {
        return Err(StoreError::Corrupt(format!(
            "unsupported lead store version {}",
            snapshot.version
        ))
        .into());
    }

    Ok(snapshot)
}

/// Save a store snapshot to a JSON file atomically
///
/// The file is never left half-written. Creates the parent directory if needed.
pub fn save_snapshot(path: &Path, snapshot: &StoreSnapshot) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
    }

    let mut file = AtomicWriteFile::open(path)
        .with_context(|| format!("Failed to open atomic write file at {}", path.display()))?;

    serde_json::to_writer_pretty(&mut file, snapshot).context("Failed to serialize lead store")?;

    file.commit().context("Failed to save lead store")?;

    Ok(())
}

/// Lead store backed by a single JSON file.
///
/// Every mutation is applied to a copy, written to disk, and only then made
/// visible. A failed write leaves both memory and disk as they were, so
/// retrying an append cannot duplicate it.
pub struct JsonFileStore {
    path: PathBuf,
    data: Mutex<StoreSnapshot>,
}

impl JsonFileStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let snapshot = load_snapshot(&path)?;
        Ok(Self {
            path,
            data: Mutex::new(snapshot),
        })
    }

    fn mutate<T>(
        &self,
        apply: impl FnOnce(&mut StoreSnapshot) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut data = self.data.lock();
        let mut next = data.clone();
        let out = apply(&mut next)?;
        save_snapshot(&self.path, &next).map_err(|e| StoreError::WriteFailed(format!("{:#}", e)))?;
        *data = next;
        Ok(out)
    }
}

impl LeadStore for JsonFileStore {
    fn next_lead_id(&self) -> Result<LeadId, StoreError> {
        self.mutate(|s| Ok(s.allocate_lead_id()))
    }

    fn get_lead(&self, id: LeadId) -> Result<Option<Lead>, StoreError> {
        Ok(self.data.lock().leads.get(&id).cloned())
    }

    fn upsert_lead(&self, lead: &Lead) -> Result<(), StoreError> {
        self.mutate(|s| {
            s.upsert_lead(lead);
            Ok(())
        })
    }

    fn append_interaction(&self, interaction: NewInteraction) -> Result<Interaction, StoreError> {
        self.mutate(|s| s.append_interaction(interaction))
    }

    fn get_interaction(&self, id: InteractionId) -> Result<Option<Interaction>, StoreError> {
        Ok(self.data.lock().get_interaction(id))
    }

    fn interactions_after(
        &self,
        lead_id: LeadId,
        after: Option<InteractionId>,
    ) -> Result<Vec<Interaction>, StoreError> {
        Ok(self.data.lock().interactions_after(lead_id, after))
    }

    fn list_leads(&self) -> Result<Vec<Lead>, StoreError> {
        Ok(self.data.lock().leads.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leads::{InteractionKind, LeadAttributes};
    use chrono::Utc;
    use std::env;

    #[test]
    fn test_load_missing_file_returns_empty() {
        let temp_path = env::temp_dir().join("lead_tier_test_missing_store.json");
        let _ = fs::remove_file(&temp_path);

        let snapshot = load_snapshot(&temp_path).unwrap();
        assert_eq!(snapshot.version, STORE_VERSION);
        assert!(snapshot.leads.is_empty());
        assert!(snapshot.interactions.is_empty());
    }

    #[test]
    fn test_reopen_sees_writes() {
        let temp_path = env::temp_dir().join("lead_tier_test_reopen_store.json");
        let _ = fs::remove_file(&temp_path);

        let lead_id = {
            let store = JsonFileStore::open(&temp_path).unwrap();
            let id = store.next_lead_id().unwrap();
            let mut lead = Lead::new(
                id,
                LeadAttributes {
                    company_name: "Globex".to_string(),
                    company_size: Some(250),
                    ..Default::default()
                },
                Utc::now(),
            );
            lead.score = 61.5;
            store.upsert_lead(&lead).unwrap();
            store
                .append_interaction(NewInteraction {
                    lead_id: id,
                    kind: InteractionKind::Other("webinar".to_string()),
                    occurred_at: Utc::now(),
                    details: Some("Q3 launch".to_string()),
                })
                .unwrap();
            id
        };

        let reopened = JsonFileStore::open(&temp_path).unwrap();
        let lead = reopened.get_lead(lead_id).unwrap().unwrap();
        assert_eq!(lead.company_name, "Globex");
        assert_eq!(lead.score, 61.5);

        let log = reopened.interactions_after(lead_id, None).unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].kind, InteractionKind::Other("webinar".to_string()));
        assert_eq!(log[0].details.as_deref(), Some("Q3 launch"));

        // Ids keep increasing after reopen
        assert_eq!(reopened.next_lead_id().unwrap(), LeadId(lead_id.0 + 1));

        let _ = fs::remove_file(&temp_path);
    }

    #[test]
    fn test_unsupported_version_rejected() {
        let temp_path = env::temp_dir().join("lead_tier_test_bad_version_store.json");
        fs::write(&temp_path, r#"{"version": 99}"#).unwrap();

        let err = load_snapshot(&temp_path).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::Corrupt(msg)) if msg.contains("unsupported lead store version 99")
        ));

        let _ = fs::remove_file(&temp_path);
    }

    #[test]
    fn test_malformed_store_is_corrupt() {
        let temp_path = env::temp_dir().join("lead_tier_test_malformed_store.json");
        fs::write(&temp_path, "{ not json").unwrap();

        let err = JsonFileStore::open(&temp_path).err().unwrap();
        assert!(matches!(err.downcast_ref::<StoreError>(), Some(StoreError::Corrupt(_))));

        let _ = fs::remove_file(&temp_path);
    }
}
