use std::fs;
use std::io::{Read, Write};

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use sysinfo::Disks;
use tempfile::NamedTempFile;

use crate::domain::UserId;
use crate::error::IngestError;

/// Longest filename accepted after sanitization.
const MAX_FILENAME_LEN: usize = 255;
/// Attempts at finding a collision-free final path.
const MAX_KEY_ATTEMPTS: u32 = 100;

/// Hook point for an external scanner, invoked on the temp file before it
/// becomes visible. Returning an error discards the upload.
pub type ScanHook = Box<dyn Fn(&Utf8Path) -> Result<(), IngestError> + Send + Sync>;

/// Outcome of a durable write: where the bytes landed and what they hash to.
#[derive(Debug, Clone)]
pub struct StoredFile {
    pub upload_id: String,
    pub path: Utf8PathBuf,
    pub sha256: String,
    pub bytes_written: u64,
}

/// Streams upload bytes to a temp file, hashing in the same pass, then
/// atomically persists under a per-upload unique key.
pub struct StorageWriter {
    root: Utf8PathBuf,
    chunk_bytes: usize,
    min_headroom_bytes: u64,
    scan_hook: Option<ScanHook>,
}

impl StorageWriter {
    pub fn new(root: Utf8PathBuf, chunk_bytes: usize, min_headroom_bytes: u64) -> Self {
        Self {
            root,
            chunk_bytes: chunk_bytes.max(1),
            min_headroom_bytes,
            scan_hook: None,
        }
    }

    pub fn with_scan_hook(mut self, hook: ScanHook) -> Self {
        self.scan_hook = Some(hook);
        self
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Reject the write up front when the storage disk cannot hold the
    /// declared size plus the configured headroom.
    pub fn precheck_disk(&self, declared_size: u64) -> Result<(), IngestError> {
        let Some(available) = available_space(&self.root) else {
            tracing::warn!(root = %self.root, "could not determine disk space, skipping precheck");
            return Ok(());
        };
        let required = declared_size.saturating_add(self.min_headroom_bytes);
        if available < required {
            return Err(IngestError::InsufficientDiskSpace {
                available,
                required,
            });
        }
        Ok(())
    }

    /// Write `sample` (the prefix already consumed for validation) followed by
    /// the rest of `reader`, computing SHA-256 over everything in one pass.
    ///
    /// The stream must supply exactly `declared_size` bytes; a short or long
    /// stream is treated as a client abort and the temp file is discarded.
    pub fn write_stream(
        &self,
        user: &UserId,
        declared_filename: &str,
        uploaded_at: DateTime<Utc>,
        sample: &[u8],
        reader: &mut dyn Read,
        declared_size: u64,
    ) -> Result<StoredFile, IngestError> {
        fs::create_dir_all(self.root.as_std_path())
            .map_err(|err| IngestError::Storage(err.to_string()))?;
        self.precheck_disk(declared_size)?;

        let mut temp = self.create_temp()?;
        let mut hasher = Sha256::new();
        let mut total: u64 = 0;

        temp.write_all(sample)
            .map_err(|err| IngestError::Storage(err.to_string()))?;
        hasher.update(sample);
        total += sample.len() as u64;

        let mut buffer = vec![0u8; self.chunk_bytes];
        loop {
            let read = reader
                .read(&mut buffer)
                .map_err(|err| IngestError::Storage(format!("upload stream failed: {err}")))?;
            if read == 0 {
                break;
            }
            temp.write_all(&buffer[..read])
                .map_err(|err| IngestError::Storage(err.to_string()))?;
            hasher.update(&buffer[..read]);
            total += read as u64;
            if total > declared_size {
                return Err(IngestError::Storage(format!(
                    "stream exceeded declared size of {declared_size} bytes"
                )));
            }
        }
        if total != declared_size {
            return Err(IngestError::Storage(format!(
                "stream ended after {total} of {declared_size} declared bytes"
            )));
        }
        temp.flush()
            .map_err(|err| IngestError::Storage(err.to_string()))?;

        if let Some(hook) = &self.scan_hook {
            let temp_path = Utf8PathBuf::from_path_buf(temp.path().to_path_buf())
                .map_err(|_| IngestError::Storage("non-utf8 temp path".to_string()))?;
            hook(&temp_path)?;
        }

        let sanitized = sanitize_filename(declared_filename);
        let key = storage_key(user, uploaded_at, &sanitized);
        let (upload_id, path) = self.persist(temp, &key)?;

        Ok(StoredFile {
            upload_id,
            path,
            sha256: hex::encode(hasher.finalize()),
            bytes_written: total,
        })
    }

    fn create_temp(&self) -> Result<NamedTempFile, IngestError> {
        let build = || {
            tempfile::Builder::new()
                .prefix(".ingest")
                .tempfile_in(self.root.as_std_path())
        };
        // One internal retry for transient disk contention.
        build()
            .or_else(|_| build())
            .map_err(|err| IngestError::Storage(err.to_string()))
    }

    /// Place the temp file at its final path without clobbering. Concurrent
    /// uploads with identical keys fall through to counter-suffixed paths.
    fn persist(
        &self,
        mut temp: NamedTempFile,
        key: &str,
    ) -> Result<(String, Utf8PathBuf), IngestError> {
        let mut attempt = 0;
        let mut retried = false;
        while attempt < MAX_KEY_ATTEMPTS {
            let candidate = if attempt == 0 {
                key.to_string()
            } else {
                suffixed_key(key, attempt)
            };
            let target = self.root.join(&candidate);
            match temp.persist_noclobber(target.as_std_path()) {
                Ok(_) => return Ok((candidate, target)),
                Err(err) if err.error.kind() == std::io::ErrorKind::AlreadyExists => {
                    temp = err.file;
                    attempt += 1;
                }
                Err(err) if !retried => {
                    // One internal retry at the same path.
                    retried = true;
                    temp = err.file;
                }
                Err(err) => return Err(IngestError::Storage(err.to_string())),
            }
        }
        Err(IngestError::Storage(
            "could not allocate a unique storage path".to_string(),
        ))
    }
}

/// Strip path separators, `..` sequences, control and shell metacharacters,
/// and cap the length. Never returns an empty name.
pub fn sanitize_filename(declared: &str) -> String {
    let name = declared.rsplit(['/', '\\']).next().unwrap_or(declared);
    let mut sanitized = String::with_capacity(name.len());
    for ch in name.chars() {
        match ch {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '.' | '-' | '_' => sanitized.push(ch),
            ' ' => sanitized.push('_'),
            _ => {}
        }
    }
    while sanitized.contains("..") {
        sanitized = sanitized.replace("..", ".");
    }
    let sanitized = sanitized.trim_matches('.').to_string();
    let mut sanitized: String = sanitized.chars().take(MAX_FILENAME_LEN).collect();
    if sanitized.is_empty() {
        sanitized = "upload".to_string();
    }
    sanitized
}

/// `{userId}_{timestamp}_{sanitizedName}`, unique per upload.
fn storage_key(user: &UserId, uploaded_at: DateTime<Utc>, sanitized: &str) -> String {
    format!(
        "{}_{}_{}",
        user.as_str(),
        uploaded_at.format("%Y%m%d_%H%M%S_%6f"),
        sanitized
    )
}

fn suffixed_key(key: &str, attempt: u32) -> String {
    match key.rsplit_once('.') {
        Some((stem, extension)) => format!("{stem}-{attempt}.{extension}"),
        None => format!("{key}-{attempt}"),
    }
}

fn available_space(root: &Utf8Path) -> Option<u64> {
    let resolved = root
        .as_std_path()
        .canonicalize()
        .unwrap_or_else(|_| root.as_std_path().to_path_buf());
    let disks = Disks::new_with_refreshed_list();
    disks
        .iter()
        .filter(|disk| resolved.starts_with(disk.mount_point()))
        .max_by_key(|disk| disk.mount_point().as_os_str().len())
        .map(|disk| disk.available_space())
}
