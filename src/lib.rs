// src/lib.rs

pub mod config;
pub mod conformance;
pub mod error;
pub mod id_generator;
pub mod logging;
pub mod service;
pub mod storage;

pub use error::{ErrorKind, StoreError, StoreResult};
pub use id_generator::{CompactUuidGenerator, GeneratorKind, IdGenerator, UuidGenerator};
pub use storage::{ByteStore, ObjectId, PayloadReader, Store};
