//! Key/value object holding the checkpoints of many clusters

use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Mutex;

/// Checkpoint of one cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub version: String,
    /// JSON-encoded state
    pub state: String,
}

/// Content of the shared object at one revision
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub entries: BTreeMap<String, StoredRecord>,
    /// `None` while the object does not exist
    pub revision: Option<u64>,
}

/// Shared object with optimistic concurrency
///
/// `write` replaces the whole object and must fail with
/// [`StoreError::Conflict`] when the stored revision is not `expected`.
#[async_trait]
pub trait KvBackend: Send + Sync {
    async fn read(&self) -> StoreResult<Snapshot>;

    /// Returns the new revision.
    async fn write(
        &self,
        entries: &BTreeMap<String, StoredRecord>,
        expected: Option<u64>,
    ) -> StoreResult<u64>;
}

/// In-process backend
#[derive(Default)]
pub struct MemoryBackend {
    inner: Mutex<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    snapshot: Snapshot,
    pending_conflicts: u32,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` writes fail as if someone else wrote first.
    pub fn inject_conflicts(&self, count: u32) {
        self.lock().pending_conflicts = count;
    }

    pub fn len(&self) -> usize {
        self.lock().snapshot.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl KvBackend for MemoryBackend {
    async fn read(&self) -> StoreResult<Snapshot> {
        Ok(self.lock().snapshot.clone())
    }

    async fn write(
        &self,
        entries: &BTreeMap<String, StoredRecord>,
        expected: Option<u64>,
    ) -> StoreResult<u64> {
        let mut inner = self.lock();
        if inner.pending_conflicts > 0 {
            inner.pending_conflicts -= 1;
            let bumped = inner.snapshot.revision.map_or(0, |r| r + 1);
            inner.snapshot.revision = Some(bumped);
            return Err(StoreError::Conflict { expected });
        }
        if inner.snapshot.revision != expected {
            return Err(StoreError::Conflict { expected });
        }
        let next = expected.map_or(0, |r| r + 1);
        inner.snapshot = Snapshot {
            entries: entries.clone(),
            revision: Some(next),
        };
        Ok(next)
    }
}
