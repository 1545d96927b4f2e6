//! In-memory implementation of the store traits

use crate::error::{StoreError, StoreResult};
use crate::id_generator::IdGenerator;
use crate::storage::{adapter, validate_identifier, ByteStore, ObjectId, PayloadReader, Store};
use bytes::Bytes;
use log::{debug, info};
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::io::Read;
use std::sync::{Arc, RwLock};

/// HashMap-backed byte store.
///
/// Buffer-native: payloads are held as [`Bytes`], and `view` hands out a
/// cheap clone, so readers never share a cursor.
pub struct MemoryByteStore {
    data: RwLock<HashMap<ObjectId, Bytes>>,
    generator: Arc<dyn IdGenerator>,
}

impl MemoryByteStore {
    pub fn new(generator: Arc<dyn IdGenerator>) -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
            generator,
        }
    }

    /// Number of live entries
    pub fn len(&self) -> StoreResult<usize> {
        Ok(self.data.read()?.len())
    }

    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.data.read()?.is_empty())
    }

    /// Total payload bytes across all live entries
    pub fn total_bytes(&self) -> StoreResult<u64> {
        Ok(self.data.read()?.values().map(|b| b.len() as u64).sum())
    }

    /// Drop every entry
    pub fn clear(&self) -> StoreResult<()> {
        self.data.write()?.clear();
        Ok(())
    }

    fn insert(&self, identifier: &str, buffer: Bytes) -> StoreResult<()> {
        let size = buffer.len();
        let mut data = self.data.write()?;
        match data.entry(identifier.to_string()) {
            Entry::Occupied(_) => Err(StoreError::Conflict(identifier.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(buffer);
                info!("Memory: Stored {} bytes under {}", size, identifier);
                Ok(())
            }
        }
    }
}

impl Store for MemoryByteStore {
    fn create(&self, stream: &mut dyn Read) -> StoreResult<ObjectId> {
        let buffer = adapter::to_buffer(stream)?;
        self.create_bytes(buffer)
    }

    fn create_with_id(&self, stream: &mut dyn Read, identifier: &str) -> StoreResult<()> {
        validate_identifier(identifier)?;
        let buffer = adapter::to_buffer(stream)?;
        self.insert(identifier, buffer)
    }

    fn read(&self, identifier: &str) -> StoreResult<PayloadReader> {
        adapter::read_via_view(self, identifier)
    }

    fn list(&self) -> StoreResult<HashSet<ObjectId>> {
        Ok(self.data.read()?.keys().cloned().collect())
    }

    fn delete(&self, identifier: &str) -> StoreResult<()> {
        validate_identifier(identifier)?;
        match self.data.write()?.remove(identifier) {
            Some(_) => {
                info!("Memory: Deleted {}", identifier);
                Ok(())
            }
            None => Err(StoreError::NotFound(identifier.to_string())),
        }
    }
}

impl ByteStore for MemoryByteStore {
    fn create_bytes(&self, buffer: Bytes) -> StoreResult<ObjectId> {
        let identifier = self.generator.generate();
        validate_identifier(&identifier)?;
        self.insert(&identifier, buffer)?;
        Ok(identifier)
    }

    fn create_bytes_with_id(&self, buffer: Bytes, identifier: &str) -> StoreResult<()> {
        validate_identifier(identifier)?;
        self.insert(identifier, buffer)
    }

    fn view(&self, identifier: &str) -> StoreResult<Bytes> {
        validate_identifier(identifier)?;
        let data = self.data.read()?;
        let buffer = data
            .get(identifier)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(identifier.to_string()))?;
        debug!("Memory: Viewed {} ({} bytes)", identifier, buffer.len());
        Ok(buffer)
    }
}

impl std::fmt::Debug for MemoryByteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.data.read().map(|d| d.len()).unwrap_or_default();
        f.debug_struct("MemoryByteStore")
            .field("entry_count", &count)
            .finish()
    }
}
