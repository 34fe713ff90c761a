//! Process-wide index of in-flight transfers.
//!
//! Every submitted record is registered under its `(source, destination)` pair
//! until it reaches a terminal state, across both directions. The registry is
//! only used for duplicate suppression and for routing abort requests; the
//! directories own scheduling.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::data::{Direction, TransferId, TransferRecord};
use crate::error::{Error, Result};

type Key = (String, String);

fn key_of(record: &TransferRecord) -> Key {
    (record.source().to_string(), record.destination().to_string())
}

#[derive(Debug, Default)]
pub struct TransferRegistry {
    entries: Mutex<HashMap<Key, Arc<TransferRecord>>>,
}

impl TransferRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Key, Arc<TransferRecord>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `record`, rejecting it if the same source and destination
    /// pair is already in flight.
    pub fn try_insert(&self, record: &Arc<TransferRecord>) -> Result<()> {
        let mut entries = self.lock();
        let key = key_of(record);
        if entries.contains_key(&key) {
            return Err(Error::DuplicateFound);
        }
        entries.insert(key, Arc::clone(record));
        Ok(())
    }

    /// Request abort of the transfer with `id`, returning its direction.
    /// `None` if unknown.
    pub fn abort(&self, id: TransferId) -> Option<Direction> {
        let record = self.get(id)?;
        record.request_abort();
        Some(record.direction())
    }

    /// Request abort of every registered transfer. Entries stay until their
    /// engines reach a terminal state.
    pub fn abort_all(&self) -> usize {
        let entries = self.lock();
        for record in entries.values() {
            record.request_abort();
        }
        entries.len()
    }

    /// Unregister `record`. A different record under the same key is left alone.
    pub fn remove(&self, record: &Arc<TransferRecord>) -> bool {
        let mut entries = self.lock();
        let key = key_of(record);
        match entries.get(&key) {
            Some(existing) if Arc::ptr_eq(existing, record) => {
                entries.remove(&key);
                true
            }
            _ => false,
        }
    }

    pub fn get(&self, id: TransferId) -> Option<Arc<TransferRecord>> {
        self.lock()
            .values()
            .find(|record| record.id() == id)
            .cloned()
    }

    pub fn contains(&self, source: &str, destination: &str) -> bool {
        self.lock()
            .contains_key(&(source.to_string(), destination.to_string()))
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
