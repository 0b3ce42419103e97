//! File backend keeping all checkpoints in one JSON document

use super::backend::{KvBackend, Snapshot, StoredRecord};
use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;

const BACKUP_SUFFIX: &str = "backup";

#[derive(Debug, Serialize, Deserialize)]
struct Document {
    revision: u64,
    updated_at: DateTime<Utc>,
    entries: BTreeMap<String, StoredRecord>,
}

/// Checkpoints in a local JSON file
///
/// The previous document is kept next to it as `<file>.backup`. Writers
/// inside this process are serialized; revisions guard against other
/// processes sharing the file.
pub struct FileBackend {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileBackend {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    fn backup_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".");
        name.push(BACKUP_SUFFIX);
        PathBuf::from(name)
    }

    async fn load(&self) -> StoreResult<Option<Document>> {
        if !fs::try_exists(&self.path).await? {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path).await?;
        Ok(Some(serde_json::from_str(&content)?))
    }
}

#[async_trait]
impl KvBackend for FileBackend {
    async fn read(&self) -> StoreResult<Snapshot> {
        Ok(match self.load().await? {
            Some(doc) => Snapshot {
                entries: doc.entries,
                revision: Some(doc.revision),
            },
            None => Snapshot::default(),
        })
    }

    async fn write(
        &self,
        entries: &BTreeMap<String, StoredRecord>,
        expected: Option<u64>,
    ) -> StoreResult<u64> {
        let _guard = self.write_lock.lock().await;

        let current = self.load().await?.map(|doc| doc.revision);
        if current != expected {
            return Err(StoreError::Conflict { expected });
        }

        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).await?;
        }
        if current.is_some() {
            fs::copy(&self.path, self.backup_path()).await?;
            tracing::debug!("Created state backup");
        }

        let revision = expected.map_or(0, |r| r + 1);
        let doc = Document {
            revision,
            updated_at: Utc::now(),
            entries: entries.clone(),
        };
        fs::write(&self.path, serde_json::to_string_pretty(&doc)?).await?;
        tracing::debug!(path = %self.path.display(), revision, "Saved state document");
        Ok(revision)
    }
}
