//! Draft store: the process-wide map of in-progress form edits.
//!
//! The in-memory map is authoritative for the life of the process. Every change is
//! mirrored best-effort into a [`DraftStorage`] backend; storage failures are logged
//! and never reach callers.

mod keys;
mod merge;

pub use keys::*;
pub use merge::*;

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::StorageError;

/// Version of the persisted draft map layout.
pub const STORE_SCHEMA_VERSION: u32 = 1;

/// A locally persisted copy of one form's in-progress edits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftRecord {
    pub value: Value,
    pub updated_at: DateTime<Utc>,
    /// Shape version of the form that wrote this draft
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<u32>,
}

/// Serialized layout of the whole store, written as a single storage entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersistedDrafts {
    pub version: u32,
    #[serde(default)]
    pub drafts: BTreeMap<String, DraftRecord>,
}

/// Synchronous local key/value storage holding the serialized draft map.
pub trait DraftStorage: Send + Sync {
    /// Read the last written payload, if any.
    fn read(&self) -> Result<Option<String>, StorageError>;

    /// Replace the stored payload.
    fn write(&self, payload: &str) -> Result<(), StorageError>;
}

impl<T: DraftStorage + ?Sized> DraftStorage for Arc<T> {
    fn read(&self) -> Result<Option<String>, StorageError> {
        (**self).read()
    }

    fn write(&self, payload: &str) -> Result<(), StorageError> {
        (**self).write(payload)
    }
}

/// In-memory storage, used in tests and when no durable storage is wanted.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    payload: Mutex<Option<String>>,
    fail_writes: Mutex<bool>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage pre-seeded with a payload, as if written by an earlier process.
    #[cfg(test)]
    pub fn with_payload(payload: impl Into<String>) -> Self {
        Self {
            payload: Mutex::new(Some(payload.into())),
            fail_writes: Mutex::new(false),
        }
    }

    /// Make subsequent writes fail, simulating a full or disabled storage.
    #[cfg(test)]
    pub fn set_fail_writes(&self, fail: bool) {
        *lock(&self.fail_writes) = fail;
    }

    pub fn payload(&self) -> Option<String> {
        lock(&self.payload).clone()
    }
}

impl DraftStorage for MemoryStorage {
    fn read(&self) -> Result<Option<String>, StorageError> {
        Ok(self.payload())
    }

    fn write(&self, payload: &str) -> Result<(), StorageError> {
        if *lock(&self.fail_writes) {
            return Err(StorageError::Unavailable("quota exceeded".to_string()));
        }
        *lock(&self.payload) = Some(payload.to_string());
        Ok(())
    }
}

/// Lock a mutex, recovering the data if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

struct StoreState {
    drafts: BTreeMap<String, DraftRecord>,
    revision: u64,
}

/// Process-wide draft store.
pub struct DraftStore {
    state: Mutex<StoreState>,
    storage: Box<dyn DraftStorage>,
}

impl DraftStore {
    /// Open the store, loading every record the storage already holds.
    ///
    /// Unreadable or incompatible payloads start an empty store.
    pub fn open(storage: impl DraftStorage + 'static) -> Self {
        let drafts = match storage.read() {
            Ok(Some(payload)) => decode(&payload),
            Ok(None) => BTreeMap::new(),
            Err(e) => {
                tracing::warn!("Draft storage unavailable, starting in-memory only: {}", e);
                BTreeMap::new()
            }
        };
        tracing::debug!("Draft store opened with {} drafts", drafts.len());

        Self {
            state: Mutex::new(StoreState {
                drafts,
                revision: 0,
            }),
            storage: Box::new(storage),
        }
    }

    /// Store backed only by memory.
    pub fn in_memory() -> Self {
        Self::open(MemoryStorage::new())
    }

    /// Replace the draft under `key`, creating it if needed.
    pub fn set_draft(&self, key: &str, value: Value) {
        self.put(key, value, None);
    }

    /// Like [`DraftStore::set_draft`], tagging the record with the form's shape version.
    pub fn set_versioned_draft(&self, key: &str, value: Value, schema_version: Option<u32>) {
        self.put(key, value, schema_version);
    }

    fn put(&self, key: &str, value: Value, schema_version: Option<u32>) {
        let mut state = lock(&self.state);
        state.drafts.insert(
            key.to_string(),
            DraftRecord {
                value,
                updated_at: Utc::now(),
                schema_version,
            },
        );
        state.revision += 1;
        self.persist(&state);
    }

    pub fn get_draft(&self, key: &str) -> Option<DraftRecord> {
        lock(&self.state).drafts.get(key).cloned()
    }

    /// Remove the draft under `key`. Returns whether a draft was removed.
    pub fn clear_draft(&self, key: &str) -> bool {
        let mut state = lock(&self.state);
        if state.drafts.remove(key).is_none() {
            return false;
        }
        state.revision += 1;
        self.persist(&state);
        true
    }

    /// Remove every draft (global sign-out).
    pub fn clear_all(&self) {
        let mut state = lock(&self.state);
        let removed = state.drafts.len();
        state.drafts.clear();
        state.revision += 1;
        self.persist(&state);
        tracing::info!("Cleared all drafts ({} removed)", removed);
    }

    pub fn keys(&self) -> Vec<String> {
        lock(&self.state).drafts.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        lock(&self.state).drafts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Counter bumped on every change since the store was opened.
    pub fn revision(&self) -> u64 {
        lock(&self.state).revision
    }

    fn persist(&self, state: &StoreState) {
        let snapshot = PersistedDrafts {
            version: STORE_SCHEMA_VERSION,
            drafts: state.drafts.clone(),
        };
        let result = serde_json::to_string(&snapshot)
            .map_err(|e| StorageError::Serialize(e.to_string()))
            .and_then(|payload| self.storage.write(&payload));

        if let Err(e) = result {
            tracing::warn!("Draft not persisted (revision {}): {}", state.revision, e);
        }
    }
}

fn decode(payload: &str) -> BTreeMap<String, DraftRecord> {
    match serde_json::from_str::<PersistedDrafts>(payload) {
        Ok(persisted) if persisted.version == STORE_SCHEMA_VERSION => persisted.drafts,
        Ok(persisted) => {
            tracing::warn!(
                "Ignoring persisted drafts with unsupported version {} (expected {})",
                persisted.version,
                STORE_SCHEMA_VERSION
            );
            BTreeMap::new()
        }
        Err(e) => {
            tracing::warn!("Ignoring malformed persisted drafts: {}", e);
            BTreeMap::new()
        }
    }
}
