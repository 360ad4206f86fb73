use std::fs;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use directories::BaseDirs;
use serde::{Deserialize, Serialize};

use crate::error::IngestError;

pub const MAX_UPLOAD_BYTES: u64 = 5 * 1024 * 1024 * 1024;

/// On-disk config file shape. Every field is optional; missing fields fall
/// back to built-in defaults.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub storage_root: Option<String>,
    #[serde(default)]
    pub records_root: Option<String>,
    #[serde(default)]
    pub max_upload_bytes: Option<u64>,
    #[serde(default)]
    pub sampling_horizon_lines: Option<usize>,
    #[serde(default)]
    pub sample_prefix_bytes: Option<usize>,
    #[serde(default)]
    pub delimited_sample_rows: Option<usize>,
    #[serde(default)]
    pub write_chunk_bytes: Option<usize>,
    #[serde(default)]
    pub min_disk_headroom_bytes: Option<u64>,
    #[serde(default)]
    pub worker_limit: Option<usize>,
}

/// Immutable pipeline configuration, constructed once at startup and threaded
/// through the dispatcher, validators and storage writer.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub storage_root: Utf8PathBuf,
    pub records_root: Utf8PathBuf,
    pub max_upload_bytes: u64,
    /// Maximum lines/records a content validator inspects before declaring
    /// success.
    pub sampling_horizon_lines: usize,
    /// Size of the prefix buffered for content validation.
    pub sample_prefix_bytes: usize,
    /// Rows sampled by the delimited-text validator.
    pub delimited_sample_rows: usize,
    /// Chunk size for the streaming write/hash loop.
    pub write_chunk_bytes: usize,
    /// Free space that must remain on the storage disk after a write.
    pub min_disk_headroom_bytes: u64,
    /// Maximum uploads processed at a time by batch ingestion.
    pub worker_limit: usize,
}

impl IngestConfig {
    pub fn with_roots(storage_root: Utf8PathBuf, records_root: Utf8PathBuf) -> Self {
        Self {
            storage_root,
            records_root,
            max_upload_bytes: MAX_UPLOAD_BYTES,
            sampling_horizon_lines: 100,
            sample_prefix_bytes: 256 * 1024,
            delimited_sample_rows: 20,
            write_chunk_bytes: 64 * 1024,
            min_disk_headroom_bytes: 1024 * 1024 * 1024,
            worker_limit: 4,
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load config from `path`, or from `genomeai-ingest.json` in the current
    /// directory when present, or fall back to defaults entirely.
    pub fn resolve(path: Option<&str>) -> Result<IngestConfig, IngestError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from("genomeai-ingest.json"),
        };

        if path.is_none() && !config_path.exists() {
            return Self::resolve_config(ConfigFile::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| IngestError::ConfigRead(config_path.clone()))?;
        let config: ConfigFile = serde_json::from_str(&content)
            .map_err(|err| IngestError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: ConfigFile) -> Result<IngestConfig, IngestError> {
        let (default_storage, default_records) = default_roots()?;
        let storage_root = config
            .storage_root
            .map(Utf8PathBuf::from)
            .unwrap_or(default_storage);
        let records_root = config
            .records_root
            .map(Utf8PathBuf::from)
            .unwrap_or(default_records);

        let defaults = IngestConfig::with_roots(storage_root, records_root);
        Ok(IngestConfig {
            max_upload_bytes: config
                .max_upload_bytes
                .unwrap_or(defaults.max_upload_bytes)
                .min(MAX_UPLOAD_BYTES),
            sampling_horizon_lines: config
                .sampling_horizon_lines
                .unwrap_or(defaults.sampling_horizon_lines),
            sample_prefix_bytes: config
                .sample_prefix_bytes
                .unwrap_or(defaults.sample_prefix_bytes),
            delimited_sample_rows: config
                .delimited_sample_rows
                .unwrap_or(defaults.delimited_sample_rows),
            write_chunk_bytes: config
                .write_chunk_bytes
                .unwrap_or(defaults.write_chunk_bytes),
            min_disk_headroom_bytes: config
                .min_disk_headroom_bytes
                .unwrap_or(defaults.min_disk_headroom_bytes),
            worker_limit: config.worker_limit.unwrap_or(defaults.worker_limit).max(1),
            ..defaults
        })
    }
}

fn default_roots() -> Result<(Utf8PathBuf, Utf8PathBuf), IngestError> {
    let base = BaseDirs::new()
        .and_then(|dirs| {
            Utf8PathBuf::from_path_buf(
                dirs.home_dir()
                    .join(".local")
                    .join("share")
                    .join("genomeai-ingest"),
            )
            .ok()
        })
        .ok_or_else(|| IngestError::Filesystem("unable to resolve data directory".to_string()))?;
    Ok((base.join("uploads"), base.join("records")))
}
