//! Buffer/stream bridging
//!
//! The canonical in-memory payload is a [`Bytes`] buffer. These functions
//! convert between it and sequential readers so that a backend implements
//! persistence once, in whichever form its medium prefers. Nothing here
//! holds state or touches a medium.

use bytes::{Buf, Bytes};
use std::io::Read;

use crate::error::StoreResult;
use crate::storage::{ByteStore, PayloadReader};

/// Expose a buffer as a sequential reader with its own cursor.
pub fn to_reader(buffer: Bytes) -> PayloadReader {
    Box::new(buffer.reader())
}

/// Drain a reader into a contiguous buffer.
pub fn to_buffer(stream: &mut dyn Read) -> StoreResult<Bytes> {
    let mut data = Vec::new();
    stream.read_to_end(&mut data)?;
    Ok(Bytes::from(data))
}

/// `Store::read` for buffer-native backends.
pub fn read_via_view<S: ByteStore + ?Sized>(store: &S, identifier: &str) -> StoreResult<PayloadReader> {
    let buffer = store.view(identifier)?;
    Ok(to_reader(buffer))
}
