use blob_store::config::AppConfig;
use blob_store::conformance::StoreFactory;
use blob_store::service::{calculate_checksum, ContentService};
use blob_store::storage::config::{StorageBackend, StorageConfig};
use blob_store::{ByteStore, ErrorKind, IdGenerator, ObjectId, PayloadReader, Store, StoreError, StoreResult, UuidGenerator};
use serial_test::serial;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::io::{Cursor, Read};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// A backend written outside the crate that only implements the stream
/// primitives and takes the buffer forms from the trait defaults.
struct StreamOnlyStore {
    entries: Mutex<HashMap<ObjectId, Vec<u8>>>,
    generator: Arc<dyn IdGenerator>,
}

impl StreamOnlyStore {
    fn insert(&self, stream: &mut dyn Read, identifier: &str) -> StoreResult<()> {
        blob_store::storage::validate_identifier(identifier)?;
        let mut data = Vec::new();
        stream.read_to_end(&mut data)?;
        match self.entries.lock()?.entry(identifier.to_string()) {
            Entry::Occupied(_) => Err(StoreError::Conflict(identifier.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(data);
                Ok(())
            }
        }
    }
}

impl Store for StreamOnlyStore {
    fn create(&self, stream: &mut dyn Read) -> StoreResult<ObjectId> {
        let identifier = self.generator.generate();
        self.insert(stream, &identifier)?;
        Ok(identifier)
    }

    fn create_with_id(&self, stream: &mut dyn Read, identifier: &str) -> StoreResult<()> {
        self.insert(stream, identifier)
    }

    fn read(&self, identifier: &str) -> StoreResult<PayloadReader> {
        blob_store::storage::validate_identifier(identifier)?;
        let entries = self.entries.lock()?;
        let data = entries
            .get(identifier)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(identifier.to_string()))?;
        Ok(Box::new(Cursor::new(data)))
    }

    fn list(&self) -> StoreResult<HashSet<ObjectId>> {
        Ok(self.entries.lock()?.keys().cloned().collect())
    }

    fn delete(&self, identifier: &str) -> StoreResult<()> {
        blob_store::storage::validate_identifier(identifier)?;
        self.entries
            .lock()?
            .remove(identifier)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(identifier.to_string()))
    }
}

impl ByteStore for StreamOnlyStore {}

struct StreamOnlyFactory;

impl StoreFactory for StreamOnlyFactory {
    fn store(&self) -> Arc<dyn ByteStore> {
        self.store_with_generator(Arc::new(UuidGenerator))
    }

    fn store_with_generator(&self, generator: Arc<dyn IdGenerator>) -> Arc<dyn ByteStore> {
        Arc::new(StreamOnlyStore {
            entries: Mutex::new(HashMap::new()),
            generator,
        })
    }
}

blob_store::byte_store_conformance_tests!(stream_only_backend, StreamOnlyFactory);

/// Hands out one shared cursor per entry, rewound on every `read`.
struct SharedCursorStore {
    inner: StreamOnlyStore,
    cursors: Mutex<HashMap<ObjectId, Arc<Mutex<Cursor<Vec<u8>>>>>>,
}

struct SharedReader(Arc<Mutex<Cursor<Vec<u8>>>>);

impl Read for SharedReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().read(buf)
    }
}

impl Store for SharedCursorStore {
    fn create(&self, stream: &mut dyn Read) -> StoreResult<ObjectId> {
        self.inner.create(stream)
    }

    fn create_with_id(&self, stream: &mut dyn Read, identifier: &str) -> StoreResult<()> {
        self.inner.create_with_id(stream, identifier)
    }

    fn read(&self, identifier: &str) -> StoreResult<PayloadReader> {
        let mut data = Vec::new();
        self.inner.read(identifier)?.read_to_end(&mut data)?;
        let cursor = self
            .cursors
            .lock()?
            .entry(identifier.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(Cursor::new(data))))
            .clone();
        cursor.lock()?.set_position(0);
        Ok(Box::new(SharedReader(cursor)))
    }

    fn list(&self) -> StoreResult<HashSet<ObjectId>> {
        self.inner.list()
    }

    fn delete(&self, identifier: &str) -> StoreResult<()> {
        self.cursors.lock()?.remove(identifier);
        self.inner.delete(identifier)
    }
}

impl ByteStore for SharedCursorStore {}

struct SharedCursorFactory;

impl StoreFactory for SharedCursorFactory {
    fn store(&self) -> Arc<dyn ByteStore> {
        self.store_with_generator(Arc::new(UuidGenerator))
    }

    fn store_with_generator(&self, generator: Arc<dyn IdGenerator>) -> Arc<dyn ByteStore> {
        Arc::new(SharedCursorStore {
            inner: StreamOnlyStore {
                entries: Mutex::new(HashMap::new()),
                generator,
            },
            cursors: Mutex::new(HashMap::new()),
        })
    }
}

#[test]
#[should_panic(expected = "second reader moved the first one's cursor")]
fn test_shared_cursor_backend_fails_reader_independence() {
    blob_store::conformance::readers_are_independent(&SharedCursorFactory);
}

/// A configured factory, the way an application would build stores.
struct ConfiguredFactory {
    root: TempDir,
    backend: StorageBackend,
    next: std::sync::atomic::AtomicUsize,
}

impl ConfiguredFactory {
    fn new(backend: StorageBackend) -> Self {
        Self {
            root: TempDir::new().unwrap(),
            backend,
            next: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    fn config(&self) -> StorageConfig {
        let n = self.next.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let base = self.root.path().join(format!("instance-{}", n));
        StorageConfig {
            backend: self.backend,
            base_path: base.join("files").to_string_lossy().into_owned(),
            db_path: base.join("blobs.sqlite").to_string_lossy().into_owned(),
            ..StorageConfig::default()
        }
    }
}

impl StoreFactory for ConfiguredFactory {
    fn store(&self) -> Arc<dyn ByteStore> {
        self.config().create_store().unwrap()
    }

    fn store_with_generator(&self, generator: Arc<dyn IdGenerator>) -> Arc<dyn ByteStore> {
        self.config().create_store_with_generator(generator).unwrap()
    }
}

#[test]
fn test_every_configured_backend_conforms() {
    for backend in [StorageBackend::Local, StorageBackend::Memory, StorageBackend::Sqlite] {
        blob_store::conformance::run_all(&ConfiguredFactory::new(backend));
    }
}

#[test]
fn test_content_service_over_configured_backends() {
    for backend in [StorageBackend::Local, StorageBackend::Memory, StorageBackend::Sqlite] {
        let factory = ConfiguredFactory::new(backend);
        let service = ContentService::new(factory.store());

        let id = service.store(b"End-to-end content").unwrap();
        let content = service.load(&id).unwrap();
        assert_eq!(content.data.as_ref(), b"End-to-end content");
        assert_eq!(content.checksum, calculate_checksum(b"End-to-end content"));

        let digest = md5::compute(b"End-to-end content");
        assert!(service.verify(&id, digest.as_slice()).unwrap());

        service.remove(&id).unwrap();
        assert!(service.identifiers().unwrap().is_empty());
        assert_eq!(service.load(&id).unwrap_err().kind(), ErrorKind::NotFound, "backend {}", backend);
    }
}

#[test]
fn test_local_entries_visible_across_instances() {
    let factory = ConfiguredFactory::new(StorageBackend::Local);
    let config = factory.config();

    let writer = config.create_store().unwrap();
    writer.create_with_id(&mut &b"shared on disk"[..], "shared").unwrap();

    let reader = config.create_store().unwrap();
    assert_eq!(reader.view("shared").unwrap().as_ref(), b"shared on disk");
    assert_eq!(
        reader.create_with_id(&mut &b"late"[..], "shared").unwrap_err().kind(),
        ErrorKind::Conflict
    );
}

#[test]
#[serial]
fn test_app_config_drives_backend_selection() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("blobstore.yaml");
    let db_path = dir.path().join("content.sqlite");
    std::fs::write(
        &config_path,
        format!(
            "storage:\n  backend: sqlite\n  db_path: '{}'\n  generator: compact\n",
            db_path.display()
        ),
    )
    .unwrap();

    let config = AppConfig::load_from(&config_path).unwrap();
    let store = config.storage.create_store().unwrap();
    let id = store.create(&mut &b"configured"[..]).unwrap();
    assert_eq!(id.len(), 32);
    assert!(db_path.exists());
}
