//! Offline queue for payloads the backend could not accept.
//!
//! Records are appended as newline-delimited JSON to a file in the plugin's
//! data directory. When the backend is reachable again the whole file is read
//! back, parsed line by line and deleted, and the caller forwards the records
//! in batches of at most [`MAX_BATCH_SIZE`].
//!
//! # Design
//!
//! - **Append-only**: [`OfflinePayloadStore::append`] never touches the
//!   network, so the aggregator never waits on delivery.
//! - **Line isolation**: a corrupt line is skipped with a warning; the
//!   remaining lines are still delivered.
//! - **Single writer**: one process appends and drains its own file, so no
//!   file locking is done.
//!
//! # Example
//!
//! ```no_run
//! use musictime_plugin::offline::{batches, OfflinePayloadStore};
//! use musictime_plugin::types::SongSessionRecord;
//!
//! # async fn example(backend: &dyn musictime_plugin::clients::BackendClient) {
//! let store: OfflinePayloadStore<SongSessionRecord> =
//!     OfflinePayloadStore::new("/home/me/.software/songSessionData.json");
//!
//! let records = store.drain_if_online(backend).await;
//! for batch in batches(&records) {
//!     println!("would send {} records", batch.len());
//! }
//! # }
//! ```

use std::io::ErrorKind;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// Maximum number of records per outbound batch (backend body-size limit).
pub const MAX_BATCH_SIZE: usize = 50;

/// Errors that can occur while appending to the offline queue.
#[derive(Error, Debug)]
pub enum OfflineStoreError {
    /// File system I/O error.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Record could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Answers whether the backend is reachable right now.
#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    async fn is_online(&self) -> bool;
}

/// Append-only NDJSON queue of undelivered records.
#[derive(Debug, Clone)]
pub struct OfflinePayloadStore<T> {
    path: PathBuf,
    _record: PhantomData<fn() -> T>,
}

impl<T> OfflinePayloadStore<T>
where
    T: Serialize + DeserializeOwned + Send,
{
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _record: PhantomData,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether undelivered records exist on disk.
    pub async fn has_pending(&self) -> bool {
        fs::try_exists(&self.path).await.unwrap_or(false)
    }

    /// Appends one record as a JSON line.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be serialized or the file cannot
    /// be written.
    pub async fn append(&self, record: &T) -> Result<(), OfflineStoreError> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await.map_err(|source| self.io_error(source))?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|source| self.io_error(source))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|source| self.io_error(source))?;
        file.flush().await.map_err(|source| self.io_error(source))?;

        debug!(path = %self.path.display(), "record queued offline");
        Ok(())
    }

    /// Drains the queue when `probe` reports the backend reachable.
    ///
    /// Returns an empty list and leaves the file untouched when offline.
    pub async fn drain_if_online<P>(&self, probe: &P) -> Vec<T>
    where
        P: ConnectivityProbe + ?Sized,
    {
        if !self.has_pending().await {
            return Vec::new();
        }
        if !probe.is_online().await {
            debug!(path = %self.path.display(), "backend offline, keeping queued records");
            return Vec::new();
        }
        self.drain().await
    }

    /// Reads every parseable record and deletes the file.
    ///
    /// Lines are decoded one at a time, so a line with invalid UTF-8 is
    /// skipped like any other corrupt line. A file that cannot be read at all
    /// is deleted and yields no records.
    pub async fn drain(&self) -> Vec<T> {
        let content = match fs::read(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "unreadable offline queue, discarding");
                self.remove().await;
                return Vec::new();
            }
        };

        let mut records = Vec::new();
        for (index, line) in content.split(|byte| *byte == b'\n').enumerate() {
            let line = match std::str::from_utf8(line) {
                Ok(line) => line,
                Err(e) => {
                    warn!(line = index + 1, error = %e, "skipping non-UTF-8 offline record");
                    continue;
                }
            };
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<T>(trimmed) {
                Ok(record) => records.push(record),
                Err(e) => warn!(line = index + 1, error = %e, "skipping corrupt offline record"),
            }
        }

        self.remove().await;
        info!(
            path = %self.path.display(),
            records = records.len(),
            "offline queue drained"
        );
        records
    }

    async fn remove(&self) {
        if let Err(e) = fs::remove_file(&self.path).await {
            if e.kind() != ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %e, "failed to delete offline queue");
            }
        }
    }

    fn io_error(&self, source: std::io::Error) -> OfflineStoreError {
        OfflineStoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

/// Splits records into outbound batches of at most [`MAX_BATCH_SIZE`],
/// preserving order.
pub fn batches<T>(records: &[T]) -> std::slice::Chunks<'_, T> {
    records.chunks(MAX_BATCH_SIZE)
}
