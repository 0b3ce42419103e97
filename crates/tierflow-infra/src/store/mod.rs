//! Versioned checkpoints of cluster state
//!
//! One shared key/value object holds a record per cluster namespace. Each
//! record carries the schema version and the JSON-encoded [`State`]. Writes
//! are read-modify-write cycles retried on conflict; nothing is locked.

mod backend;
mod file;

pub use backend::{KvBackend, MemoryBackend, Snapshot, StoredRecord};
pub use file::FileBackend;

use crate::error::{StoreError, StoreResult};
use crate::state::{STATE_VERSION, State};
use std::sync::Arc;

const DEFAULT_MAX_ATTEMPTS: u32 = 5;

pub struct StateStore {
    backend: Arc<dyn KvBackend>,
    max_attempts: u32,
}

impl StateStore {
    pub fn new(backend: Arc<dyn KvBackend>) -> Self {
        Self {
            backend,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// State of `namespace`, `None` if it was never saved.
    pub async fn load(&self, namespace: &str) -> StoreResult<Option<State>> {
        let snapshot = self.backend.read().await?;
        let Some(record) = snapshot.entries.get(namespace) else {
            tracing::debug!(namespace, "No saved state");
            return Ok(None);
        };
        if record.version != STATE_VERSION {
            return Err(StoreError::VersionMismatch {
                namespace: namespace.to_string(),
                found: record.version.clone(),
                expected: STATE_VERSION,
            });
        }
        let state: State = serde_json::from_str(&record.state)?;
        Ok(Some(state))
    }

    /// Create or replace the record of `namespace`.
    pub async fn save(&self, namespace: &str, state: &State) -> StoreResult<()> {
        let record = StoredRecord {
            version: STATE_VERSION.to_string(),
            state: serde_json::to_string(state)?,
        };
        self.modify(namespace, |entries| {
            entries.insert(namespace.to_string(), record.clone());
        })
        .await?;
        tracing::debug!(namespace, "Saved state");
        Ok(())
    }

    /// Remove the record of `namespace`; removing a missing record is a no-op.
    pub async fn delete(&self, namespace: &str) -> StoreResult<()> {
        self.modify(namespace, |entries| {
            entries.remove(namespace);
        })
        .await?;
        tracing::debug!(namespace, "Deleted state");
        Ok(())
    }

    async fn modify<F>(&self, namespace: &str, mut change: F) -> StoreResult<()>
    where
        F: FnMut(&mut std::collections::BTreeMap<String, StoredRecord>) + Send,
    {
        for attempt in 1..=self.max_attempts {
            let mut snapshot = self.backend.read().await?;
            change(&mut snapshot.entries);
            match self
                .backend
                .write(&snapshot.entries, snapshot.revision)
                .await
            {
                Ok(_) => return Ok(()),
                Err(StoreError::Conflict { .. }) => {
                    tracing::debug!(namespace, attempt, "State object changed concurrently, retrying");
                }
                Err(e) => return Err(e),
            }
        }
        Err(StoreError::RetriesExhausted {
            namespace: namespace.to_string(),
            attempts: self.max_attempts,
        })
    }
}
