//! Content service layer over the store abstraction
//!
//! Higher-level callers store and load whole payloads here and get an MD5
//! checksum alongside, without touching streams or backend types.

use crate::error::StoreResult;
use crate::storage::{ByteStore, ObjectId};
use bytes::Bytes;
use log::{error, info};
use std::collections::HashSet;
use std::sync::Arc;

/// A loaded payload together with its checksum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Content {
    pub identifier: ObjectId,
    pub data: Bytes,
    /// Lowercase hex MD5 of `data`
    pub checksum: String,
}

/// Service that provides a clean interface to an injected byte store
pub struct ContentService {
    store: Arc<dyn ByteStore>,
}

/// Calculate the MD5 checksum of a payload as lowercase hex
pub fn calculate_checksum(data: &[u8]) -> String {
    hex::encode(md5::compute(data).0)
}

impl ContentService {
    pub fn new(store: Arc<dyn ByteStore>) -> Self {
        Self { store }
    }

    pub fn store(&self, data: &[u8]) -> StoreResult<ObjectId> {
        let checksum = calculate_checksum(data);
        let identifier = self
            .store
            .create_bytes(Bytes::copy_from_slice(data))
            .map_err(|e| {
                error!("Failed to store {} bytes: {}", data.len(), e);
                e
            })?;
        log_mdc::insert("identifier", identifier.as_str());
        info!("Stored content {} ({} bytes, md5 {})", identifier, data.len(), checksum);
        log_mdc::remove("identifier");
        Ok(identifier)
    }

    pub fn store_as(&self, data: &[u8], identifier: &str) -> StoreResult<()> {
        log_mdc::insert("identifier", identifier);
        let result = self
            .store
            .create_bytes_with_id(Bytes::copy_from_slice(data), identifier);
        match &result {
            Ok(()) => info!(
                "Stored content {} ({} bytes, md5 {})",
                identifier,
                data.len(),
                calculate_checksum(data)
            ),
            Err(e) => error!("Failed to store content {}: {}", identifier, e),
        }
        log_mdc::remove("identifier");
        result
    }

    pub fn load(&self, identifier: &str) -> StoreResult<Content> {
        let data = self.store.view(identifier)?;
        let checksum = calculate_checksum(&data);
        Ok(Content {
            identifier: identifier.to_string(),
            data,
            checksum,
        })
    }

    /// Compare the stored payload against a raw 16-byte MD5 digest
    pub fn verify(&self, identifier: &str, checksum: &[u8]) -> StoreResult<bool> {
        let data = self.store.view(identifier)?;
        let is_valid = md5::compute(&data).0.as_slice() == checksum;
        info!("Verified content {}: checksum verification = {}", identifier, is_valid);
        Ok(is_valid)
    }

    pub fn remove(&self, identifier: &str) -> StoreResult<()> {
        self.store.delete(identifier)?;
        info!("Removed content {}", identifier);
        Ok(())
    }

    pub fn identifiers(&self) -> StoreResult<HashSet<ObjectId>> {
        self.store.list()
    }
}
