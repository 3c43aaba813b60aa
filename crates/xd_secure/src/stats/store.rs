use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex;

use super::clock::Clock;
use super::record::CounterRecord;
use crate::error::ResponseError;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("counter file {path} is not accessible: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("counter file {path} is malformed: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("counter record could not be encoded: {0}")]
    Encode(#[source] serde_json::Error),
}

impl ResponseError for StoreError {}

/// Result of counting a generation.
#[derive(Debug)]
pub enum BumpOutcome {
    /// The record was updated and persisted.
    Counted(CounterRecord),
    /// The update failed; `record` is the last record known to be on disk.
    Stale {
        record: CounterRecord,
        error: StoreError,
    },
}

impl BumpOutcome {
    pub fn record(&self) -> &CounterRecord {
        match self {
            BumpOutcome::Counted(record) | BumpOutcome::Stale { record, .. } => record,
        }
    }

    pub fn warning(&self) -> Option<String> {
        match self {
            BumpOutcome::Counted(_) => None,
            BumpOutcome::Stale { error, .. } => Some(format!("stats not updated: {error}")),
        }
    }
}

/// File-backed generation counters.
///
/// Every operation holds one lock for its whole read-modify-write-persist
/// sequence, so concurrent requests in this process never lose an update.
/// The file is rewritten in place; a crash mid-write can leave it truncated.
pub struct CounterStore {
    path: PathBuf,
    clock: Arc<dyn Clock>,
    last_good: Mutex<CounterRecord>,
}

impl std::fmt::Debug for CounterStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CounterStore").field("path", &self.path).finish()
    }
}

impl CounterStore {
    /// Open the store at `path`, writing a zeroed record if the file is absent.
    ///
    /// A file that exists but does not parse is left untouched: the store
    /// still opens, and reads report the corruption.
    pub fn open<P: Into<PathBuf>>(path: P, clock: Arc<dyn Clock>) -> Result<Self, StoreError> {
        let path = path.into();
        let last_good = match std::fs::read(&path) {
            Ok(bytes) => match decode(&path, &bytes) {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!(error = %e, "counter file unreadable, starting from zero in memory");
                    CounterRecord::fresh(clock.today(), clock.now())
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => {
                let record = CounterRecord::fresh(clock.today(), clock.now());
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                        path: parent.to_path_buf(),
                        source,
                    })?;
                }
                std::fs::write(&path, encode(&record)?).map_err(|source| StoreError::Io {
                    path: path.clone(),
                    source,
                })?;
                tracing::info!(path = %path.display(), "initialized counter file");
                record
            }
            Err(source) => return Err(StoreError::Io { path, source }),
        };

        Ok(Self {
            path,
            clock,
            last_good: Mutex::new(last_good),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The current record as stored on disk.
    ///
    /// An absent file reads as a zeroed record dated today with no `ts`; it is
    /// not created.
    pub async fn read(&self) -> Result<CounterRecord, StoreError> {
        let mut last_good = self.last_good.lock().await;
        let record = self.load().await?;
        *last_good = record.clone();
        Ok(record)
    }

    /// Count one generation and persist the full record.
    pub async fn bump(&self) -> Result<CounterRecord, StoreError> {
        let mut last_good = self.last_good.lock().await;
        let mut record = self.load().await?;
        record.count_generation(self.clock.today(), self.clock.now());

        let bytes = encode(&record)?;
        tokio::fs::write(&self.path, bytes)
            .await
            .map_err(|source| StoreError::Io {
                path: self.path.clone(),
                source,
            })?;

        *last_good = record.clone();
        Ok(record)
    }

    /// [`Self::bump`], falling back to the last good record when it fails.
    pub async fn record_generation(&self) -> BumpOutcome {
        match self.bump().await {
            Ok(record) => BumpOutcome::Counted(record),
            Err(error) => {
                tracing::warn!(error = %error, "failed to update generation counters");
                let record = self.last_good.lock().await.clone();
                BumpOutcome::Stale { record, error }
            }
        }
    }

    async fn load(&self) -> Result<CounterRecord, StoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => decode(&self.path, &bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Ok(CounterRecord::unwritten(self.clock.today()))
            }
            Err(source) => Err(StoreError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

fn decode(path: &Path, bytes: &[u8]) -> Result<CounterRecord, StoreError> {
    serde_json::from_slice(bytes).map_err(|source| StoreError::Corrupt {
        path: path.to_path_buf(),
        source,
    })
}

fn encode(record: &CounterRecord) -> Result<Vec<u8>, StoreError> {
    serde_json::to_vec_pretty(record).map_err(StoreError::Encode)
}
