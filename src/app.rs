use std::io::Read;

use chrono::Utc;

use crate::config::IngestConfig;
use crate::domain::{ProcessingStatus, UserId};
use crate::error::IngestError;
use crate::notify::{Notifier, StatusEvent};
use crate::records::{ProcessingRecord, RecordMetadata, RecordStore};
use crate::registry::{extension_of, FormatDescriptor, FormatRegistry};
use crate::storage::StorageWriter;
use crate::validators::{validate_content, Sample};

/// The ingestion pipeline: gate checks, content validation, durable storage
/// and record creation, in that order. Each stage fails fast; later stages
/// never run after a failure, and nothing is persisted for a rejected upload.
pub struct App<N: Notifier> {
    config: IngestConfig,
    registry: FormatRegistry,
    storage: StorageWriter,
    records: RecordStore,
    notifier: N,
}

impl<N: Notifier> App<N> {
    pub fn new(config: IngestConfig, notifier: N) -> Self {
        let registry = FormatRegistry::new(config.max_upload_bytes);
        let storage = StorageWriter::new(
            config.storage_root.clone(),
            config.write_chunk_bytes,
            config.min_disk_headroom_bytes,
        );
        let records = RecordStore::new(config.records_root.clone());
        Self {
            config,
            registry,
            storage,
            records,
            notifier,
        }
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Run one upload through the full pipeline and return its queued record.
    ///
    /// `declared_size` is the client-declared byte count; gate checks run
    /// against it before a single content byte is read, and the storage layer
    /// later enforces that the stream matches it exactly.
    pub fn ingest(
        &self,
        user: &UserId,
        declared_filename: &str,
        declared_mime: &str,
        declared_size: u64,
        reader: &mut dyn Read,
    ) -> Result<ProcessingRecord, IngestError> {
        if declared_filename.trim().is_empty() {
            return Err(IngestError::EmptyFilename);
        }
        if declared_size == 0 {
            return Err(IngestError::EmptyFile);
        }
        if declared_size > self.config.max_upload_bytes {
            return Err(IngestError::FileTooLarge {
                size: declared_size,
                limit: self.config.max_upload_bytes,
            });
        }

        let extension = extension_of(declared_filename)
            .ok_or_else(|| IngestError::UnsupportedExtension(declared_filename.to_string()))?;
        let descriptor = self
            .registry
            .lookup_extension(&extension)
            .ok_or_else(|| IngestError::UnsupportedExtension(extension.clone()))?;
        let format = descriptor.format;
        if !descriptor.mime_allowed(declared_mime) {
            // MIME is advisory; the content validators are authoritative.
            tracing::warn!(
                %format,
                declared_mime,
                "declared MIME type not in whitelist for extension"
            );
        }

        let (sample, truncated) = self.read_sample(reader, declared_size)?;
        let outcome = validate_content(
            format,
            declared_mime,
            Sample {
                bytes: &sample,
                truncated,
            },
            &self.config,
        )?;

        let uploaded_at = Utc::now();
        let stored = self.storage.write_stream(
            user,
            declared_filename,
            uploaded_at,
            &sample,
            reader,
            declared_size,
        )?;
        tracing::info!(
            upload_id = %stored.upload_id,
            format = %outcome.format,
            bytes = stored.bytes_written,
            "upload stored"
        );

        let record = ProcessingRecord {
            upload_id: stored.upload_id.clone(),
            user_id: user.as_str().to_string(),
            original_filename: declared_filename.to_string(),
            file_path: stored.path.to_string(),
            file_hash: stored.sha256,
            file_format: outcome.format,
            file_size: stored.bytes_written,
            upload_timestamp: uploaded_at.to_rfc3339(),
            processing_status: ProcessingStatus::Queued,
            metadata: RecordMetadata {
                validation_results: outcome.notes,
                processing_notes: Vec::new(),
            },
        };
        self.records.create(&record)?;
        self.notifier.notify(StatusEvent {
            upload_id: record.upload_id.clone(),
            status: record.processing_status,
            detected_format: Some(record.file_format),
        });

        Ok(record)
    }

    pub fn get_status(&self, upload_id: &str) -> Result<ProcessingRecord, IngestError> {
        self.records.get(upload_id)
    }

    pub fn list_history(&self, user: &UserId) -> Result<Vec<ProcessingRecord>, IngestError> {
        self.records.list_by_user(user)
    }

    pub fn supported_formats(&self) -> &[FormatDescriptor] {
        self.registry.descriptors()
    }

    /// Advance a record through its lifecycle and notify the consumer.
    pub fn transition(
        &self,
        upload_id: &str,
        status: ProcessingStatus,
        note: Option<String>,
    ) -> Result<ProcessingRecord, IngestError> {
        let record = self.records.transition(upload_id, status, note)?;
        self.notifier.notify(StatusEvent {
            upload_id: record.upload_id.clone(),
            status: record.processing_status,
            detected_format: Some(record.file_format),
        });
        Ok(record)
    }

    /// Buffer the validation prefix: up to `sample_prefix_bytes`, or the whole
    /// stream when it is shorter.
    fn read_sample(
        &self,
        reader: &mut dyn Read,
        declared_size: u64,
    ) -> Result<(Vec<u8>, bool), IngestError> {
        let cap = self.config.sample_prefix_bytes;
        let mut sample = Vec::with_capacity(cap.min(declared_size as usize));
        let mut buffer = vec![0u8; self.config.write_chunk_bytes.min(cap).max(1)];
        while sample.len() < cap {
            let want = buffer.len().min(cap - sample.len());
            let read = reader
                .read(&mut buffer[..want])
                .map_err(|err| IngestError::Storage(format!("upload stream failed: {err}")))?;
            if read == 0 {
                break;
            }
            sample.extend_from_slice(&buffer[..read]);
        }
        if sample.is_empty() {
            return Err(IngestError::EmptyFile);
        }
        let truncated = sample.len() >= cap && declared_size > sample.len() as u64;
        Ok((sample, truncated))
    }
}
