use std::collections::HashMap;
use std::fs;
use std::sync::{Arc, Mutex, PoisonError};

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

use crate::domain::{DataFormat, ProcessingStatus, UserId};
use crate::error::IngestError;
use crate::validators::ValidationNotes;

/// Durable per-upload entity. Field names are an external compatibility
/// contract and must not change.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingRecord {
    pub upload_id: String,
    pub user_id: String,
    pub original_filename: String,
    pub file_path: String,
    pub file_hash: String,
    pub file_format: DataFormat,
    pub file_size: u64,
    pub upload_timestamp: String,
    pub processing_status: ProcessingStatus,
    pub metadata: RecordMetadata,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordMetadata {
    pub validation_results: ValidationNotes,
    #[serde(default)]
    pub processing_notes: Vec<String>,
}

/// One JSON document per record, written atomically. Mutation is serialized
/// per upload id, so unrelated uploads never contend.
pub struct RecordStore {
    root: Utf8PathBuf,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl RecordStore {
    pub fn new(root: Utf8PathBuf) -> Self {
        Self {
            root,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Create the record exactly once, immediately after a successful write.
    /// A second create for the same upload id is an invariant violation.
    pub fn create(&self, record: &ProcessingRecord) -> Result<(), IngestError> {
        let cell = self.lock_cell(&record.upload_id);
        let _guard = cell.lock().unwrap_or_else(PoisonError::into_inner);

        fs::create_dir_all(self.root.as_std_path())
            .map_err(|err| IngestError::Filesystem(err.to_string()))?;
        let path = self.record_path(&record.upload_id);
        if path.as_std_path().exists() {
            return Err(IngestError::DuplicateRecord(record.upload_id.clone()));
        }
        self.write_document(&path, record)
    }

    pub fn get(&self, upload_id: &str) -> Result<ProcessingRecord, IngestError> {
        let path = self.record_path(upload_id);
        if !path.as_std_path().exists() {
            return Err(IngestError::RecordNotFound(upload_id.to_string()));
        }
        let content = fs::read_to_string(path.as_std_path())
            .map_err(|err| IngestError::Filesystem(err.to_string()))?;
        serde_json::from_str(&content).map_err(|err| IngestError::Filesystem(err.to_string()))
    }

    /// All records for one user, newest first by upload timestamp.
    pub fn list_by_user(&self, user: &UserId) -> Result<Vec<ProcessingRecord>, IngestError> {
        if !self.root.as_std_path().exists() {
            return Ok(Vec::new());
        }
        let mut records = Vec::new();
        let entries = fs::read_dir(self.root.as_std_path())
            .map_err(|err| IngestError::Filesystem(err.to_string()))?;
        for entry in entries {
            let entry = entry.map_err(|err| IngestError::Filesystem(err.to_string()))?;
            let path = entry.path();
            if path.extension().map(|ext| ext == "json").unwrap_or(false) {
                let content = fs::read_to_string(&path)
                    .map_err(|err| IngestError::Filesystem(err.to_string()))?;
                match serde_json::from_str::<ProcessingRecord>(&content) {
                    Ok(record) if record.user_id == user.as_str() => records.push(record),
                    Ok(_) => {}
                    Err(err) => {
                        tracing::warn!(path = %path.display(), %err, "skipping unreadable record");
                    }
                }
            }
        }
        records.sort_by(|a, b| b.upload_timestamp.cmp(&a.upload_timestamp));
        Ok(records)
    }

    /// Apply a state-machine transition. Terminal records reject any further
    /// transition instead of being silently overwritten.
    pub fn transition(
        &self,
        upload_id: &str,
        new_status: ProcessingStatus,
        note: Option<String>,
    ) -> Result<ProcessingRecord, IngestError> {
        let cell = self.lock_cell(upload_id);
        let _guard = cell.lock().unwrap_or_else(PoisonError::into_inner);

        let mut record = self.get(upload_id)?;
        if !record.processing_status.can_transition_to(new_status) {
            return Err(IngestError::InvalidTransition {
                upload_id: upload_id.to_string(),
                from: record.processing_status.to_string(),
                to: new_status.to_string(),
            });
        }
        record.processing_status = new_status;
        if let Some(note) = note {
            record.metadata.processing_notes.push(note);
        }
        self.write_document(&self.record_path(upload_id), &record)?;
        Ok(record)
    }

    fn record_path(&self, upload_id: &str) -> Utf8PathBuf {
        self.root.join(format!("{upload_id}.json"))
    }

    fn write_document(&self, path: &Utf8Path, record: &ProcessingRecord) -> Result<(), IngestError> {
        let content = serde_json::to_vec_pretty(record)
            .map_err(|err| IngestError::Filesystem(err.to_string()))?;
        let tmp_path = path.with_extension("json.tmp");
        fs::write(tmp_path.as_std_path(), &content)
            .map_err(|err| IngestError::Filesystem(err.to_string()))?;
        fs::rename(tmp_path.as_std_path(), path.as_std_path())
            .map_err(|err| IngestError::Filesystem(err.to_string()))?;
        Ok(())
    }

    fn lock_cell(&self, upload_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks
            .entry(upload_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
