//! Binary Storage Layer Abstraction
//!
//! This module provides an abstraction over binary storage backends,
//! allowing callers to save opaque payloads, read them back by identifier,
//! enumerate what is stored and delete entries, without knowing whether the
//! medium is a local directory, a database blob column or process memory.
//!
//! Two traits make up the contract:
//!
//! - [`Store`] -- sequential stream operations
//! - [`ByteStore`] -- buffer operations layered on top of [`Store`]
//!
//! A backend implements whichever primitive is native to its medium and
//! bridges the other through [`adapter`].

pub mod adapter;
pub mod config;
pub mod local_store;
pub mod memory_store;
pub mod sqlite_store;


use bytes::Bytes;
use std::collections::HashSet;
use std::io::Read;

use crate::error::{StoreError, StoreResult};

/// Object identifier type
pub type ObjectId = String;

/// Sequential reader handed out by [`Store::read`]
pub type PayloadReader = Box<dyn Read + Send>;

/// Stream-oriented binary store.
///
/// All implementations must satisfy these invariants:
/// - `create` consumes the whole stream and commits it before returning.
///   Readers never observe a partially written entry.
/// - Explicit-identifier creates are check-and-create atomic: of several
///   racing callers on one identifier exactly one wins, the rest get
///   `Conflict`.
/// - Every `read` yields an independent reader.
/// - `list` returns exactly the live identifiers.
/// - "Not found" and "already present" are reported as `NotFound` and
///   `Conflict`, never as I/O failures.
pub trait Store: Send + Sync {
    /// Store the stream under a freshly generated identifier and return it.
    fn create(&self, stream: &mut dyn Read) -> StoreResult<ObjectId>;

    /// Store the stream under the caller's identifier.
    ///
    /// Fails with `Conflict` if the identifier denotes a live entry.
    fn create_with_id(&self, stream: &mut dyn Read, identifier: &str) -> StoreResult<()>;

    /// Open an independent reader over the entry's bytes.
    fn read(&self, identifier: &str) -> StoreResult<PayloadReader>;

    /// All live identifiers.
    fn list(&self) -> StoreResult<HashSet<ObjectId>>;

    /// Remove the entry. Fails with `NotFound` if it is not live.
    fn delete(&self, identifier: &str) -> StoreResult<()>;
}

/// Random-access extension of [`Store`] operating on [`Bytes`] buffers.
///
/// The provided methods route through the stream primitives, so a
/// stream-native backend gets the buffer forms with an empty impl block.
/// Buffer-native backends override them and implement [`Store::read`] via
/// [`adapter::read_via_view`].
pub trait ByteStore: Store {
    fn create_bytes(&self, buffer: Bytes) -> StoreResult<ObjectId> {
        self.create(&mut adapter::to_reader(buffer))
    }

    fn create_bytes_with_id(&self, buffer: Bytes, identifier: &str) -> StoreResult<()> {
        validate_identifier(identifier)?;
        self.create_with_id(&mut adapter::to_reader(buffer), identifier)
    }

    /// A buffer holding the entry's bytes.
    fn view(&self, identifier: &str) -> StoreResult<Bytes> {
        let mut reader = self.read(identifier)?;
        adapter::to_buffer(&mut reader)
    }
}

/// Base identifier rules every backend enforces: non-empty and free of
/// control characters. The empty string stands in for an absent identifier.
pub fn validate_identifier(identifier: &str) -> StoreResult<()> {
    if identifier.is_empty() {
        return Err(StoreError::InvalidArgument("identifier must not be empty".to_string()));
    }
    if identifier.chars().any(char::is_control) {
        return Err(StoreError::InvalidArgument(format!(
            "identifier contains control characters: {:?}",
            identifier
        )));
    }
    Ok(())
}
