//! Behavioral test suite every [`ByteStore`] backend must pass
//!
//! A backend supplies a [`StoreFactory`] and either calls [`run_all`] from a
//! test or expands [`byte_store_conformance_tests!`](crate::byte_store_conformance_tests)
//! to get one `#[test]` per scenario:
//!
//! ```ignore
//! blob_store::byte_store_conformance_tests!(my_backend, MyFactory::new());
//! ```
//!
//! Every scenario panics on violation, so it can be used directly inside
//! test functions.

use crate::error::ErrorKind;
use crate::id_generator::IdGenerator;
use crate::storage::{ByteStore, ObjectId};
use bytes::{Buf, Bytes};
use std::collections::HashSet;
use std::io::Read;
use std::sync::{Arc, Barrier};
use std::thread;

/// Builds fresh, empty store instances for the suite.
pub trait StoreFactory {
    /// A new empty store using the backend's default generator.
    fn store(&self) -> Arc<dyn ByteStore>;

    /// A new empty store using `generator` for anonymous creates.
    fn store_with_generator(&self, generator: Arc<dyn IdGenerator>) -> Arc<dyn ByteStore>;
}

fn fixed(identifier: &'static str) -> Arc<dyn IdGenerator> {
    Arc::new(move || identifier.to_string())
}

fn read_all(store: &dyn ByteStore, identifier: &str) -> Vec<u8> {
    let mut reader = store
        .read(identifier)
        .unwrap_or_else(|e| panic!("read({:?}) failed: {}", identifier, e));
    let mut out = Vec::new();
    reader
        .read_to_end(&mut out)
        .unwrap_or_else(|e| panic!("draining read({:?}) failed: {}", identifier, e));
    out
}

fn assert_kind<T>(result: crate::error::StoreResult<T>, expected: ErrorKind, what: &str) {
    match result {
        Ok(_) => panic!("{} succeeded, expected {:?}", what, expected),
        Err(e) => assert_eq!(e.kind(), expected, "{} failed with {}", what, e),
    }
}

/// Deterministic pseudo-random payload (xorshift), so failures reproduce.
fn payload(len: usize, seed: u64) -> Vec<u8> {
    let mut state = seed | 1;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            state as u8
        })
        .collect()
}

pub fn list_empty<F: StoreFactory + ?Sized>(factory: &F) {
    let store = factory.store();
    assert!(store.list().unwrap().is_empty());
}

pub fn create_then_read<F: StoreFactory + ?Sized>(factory: &F) {
    let store = factory.store();
    let id = store.create(&mut &b"data"[..]).unwrap();
    assert_eq!(read_all(store.as_ref(), &id), b"data");
}

pub fn create_returns_distinct_identifiers<F: StoreFactory + ?Sized>(factory: &F) {
    let store = factory.store();
    let first = store.create(&mut &b""[..]).unwrap();
    let second = store.create(&mut &b""[..]).unwrap();
    assert_ne!(first, second);

    let expected: HashSet<ObjectId> = [first, second].into_iter().collect();
    assert_eq!(store.list().unwrap(), expected);
}

pub fn create_with_id_then_read<F: StoreFactory + ?Sized>(factory: &F) {
    let store = factory.store();
    store.create_with_id(&mut &b"explicit"[..], "fixed-id").unwrap();
    assert_eq!(read_all(store.as_ref(), "fixed-id"), b"explicit");
    assert!(store.list().unwrap().contains("fixed-id"));
}

pub fn create_with_duplicate_id_conflicts<F: StoreFactory + ?Sized>(factory: &F) {
    let store = factory.store();
    store.create_with_id(&mut &b"first payload"[..], "fixed-id").unwrap();

    assert_kind(
        store.create_with_id(&mut &b"second payload"[..], "fixed-id"),
        ErrorKind::Conflict,
        "duplicate create_with_id",
    );
    assert_kind(
        store.create_bytes_with_id(Bytes::from_static(b"third payload"), "fixed-id"),
        ErrorKind::Conflict,
        "duplicate create_bytes_with_id",
    );

    assert_eq!(read_all(store.as_ref(), "fixed-id"), b"first payload");
    assert_eq!(store.list().unwrap().len(), 1);
}

pub fn create_uses_injected_generator<F: StoreFactory + ?Sized>(factory: &F) {
    let store = factory.store_with_generator(fixed("abc"));
    let id = store.create(&mut &b"generated"[..]).unwrap();
    assert_eq!(id, "abc");
    assert_eq!(read_all(store.as_ref(), "abc"), b"generated");
}

pub fn generator_collision_conflicts<F: StoreFactory + ?Sized>(factory: &F) {
    let store = factory.store_with_generator(fixed("abc"));
    store.create(&mut &b"original"[..]).unwrap();

    assert_kind(store.create(&mut &b"replacement"[..]), ErrorKind::Conflict, "colliding create");
    assert_kind(
        store.create_bytes(Bytes::from_static(b"replacement")),
        ErrorKind::Conflict,
        "colliding create_bytes",
    );
    assert_eq!(read_all(store.as_ref(), "abc"), b"original");
}

pub fn missing_identifier_not_found<F: StoreFactory + ?Sized>(factory: &F) {
    let store = factory.store();
    let missing = "0f8fad5b-d9cb-469f-a165-70867728950e";
    assert_kind(store.read(missing), ErrorKind::NotFound, "read of missing entry");
    assert_kind(store.view(missing), ErrorKind::NotFound, "view of missing entry");
    assert_kind(store.delete(missing), ErrorKind::NotFound, "delete of missing entry");
}

pub fn empty_identifier_rejected<F: StoreFactory + ?Sized>(factory: &F) {
    let store = factory.store();
    assert_kind(store.create_with_id(&mut &b"data"[..], ""), ErrorKind::InvalidArgument, "create_with_id(\"\")");
    assert_kind(
        store.create_bytes_with_id(Bytes::from_static(b"data"), ""),
        ErrorKind::InvalidArgument,
        "create_bytes_with_id(\"\")",
    );
    assert_kind(store.read(""), ErrorKind::InvalidArgument, "read(\"\")");
    assert_kind(store.view(""), ErrorKind::InvalidArgument, "view(\"\")");
    assert_kind(store.delete(""), ErrorKind::InvalidArgument, "delete(\"\")");
    assert!(store.list().unwrap().is_empty(), "rejected calls left entries behind");

    let store = factory.store_with_generator(fixed(""));
    assert_kind(store.create(&mut &b"data"[..]), ErrorKind::InvalidArgument, "create with empty generated id");
    assert!(store.list().unwrap().is_empty());
}

pub fn delete_removes_entry<F: StoreFactory + ?Sized>(factory: &F) {
    let store = factory.store();
    let id = store.create(&mut &b"data"[..]).unwrap();
    let kept = store.create(&mut &b"kept"[..]).unwrap();
    assert!(store.list().unwrap().contains(&id));

    store.delete(&id).unwrap();
    assert!(!store.list().unwrap().contains(&id));
    assert_kind(store.read(&id), ErrorKind::NotFound, "read after delete");
    assert_kind(store.view(&id), ErrorKind::NotFound, "view after delete");
    assert_kind(store.delete(&id), ErrorKind::NotFound, "second delete");

    assert_eq!(read_all(store.as_ref(), &kept), b"kept");
}

pub fn buffer_and_stream_forms_interoperate<F: StoreFactory + ?Sized>(factory: &F) {
    let store = factory.store();
    let data = payload(4096, 7);

    let via_buffer = store.create_bytes(Bytes::from(data.clone())).unwrap();
    assert_eq!(read_all(store.as_ref(), &via_buffer), data);

    let via_stream = store.create(&mut data.as_slice()).unwrap();
    assert_eq!(store.view(&via_stream).unwrap().as_ref(), data.as_slice());

    store.create_bytes_with_id(Bytes::from_static(b"buffered"), "buffered-id").unwrap();
    assert_eq!(read_all(store.as_ref(), "buffered-id"), b"buffered");
    assert_eq!(store.view("buffered-id").unwrap(), Bytes::from_static(b"buffered"));
}

pub fn readers_are_independent<F: StoreFactory + ?Sized>(factory: &F) {
    let store = factory.store();
    let id = store.create(&mut &b"independent cursors"[..]).unwrap();

    let mut first = store.read(&id).unwrap();
    let mut prefix = [0u8; 11];
    first.read_exact(&mut prefix).unwrap();
    assert_eq!(&prefix, b"independent");

    // Drain a second reader while the first is still open.
    let mut second = store.read(&id).unwrap();
    let mut whole = Vec::new();
    second.read_to_end(&mut whole).unwrap();
    assert_eq!(whole, b"independent cursors");

    let mut rest = Vec::new();
    first.read_to_end(&mut rest).unwrap();
    assert_eq!(rest, b" cursors", "second reader moved the first one's cursor");

    let mut view = store.view(&id).unwrap();
    let again = store.view(&id).unwrap();
    view.advance(12);
    assert_eq!(view.as_ref(), b"cursors");
    assert_eq!(again.as_ref(), b"independent cursors");
    assert_eq!(store.view(&id).unwrap().as_ref(), b"independent cursors");
}

pub fn large_payload_roundtrip<F: StoreFactory + ?Sized>(factory: &F) {
    let store = factory.store();
    let data = payload(1 << 20, 42);
    let id = store.create(&mut data.as_slice()).unwrap();

    let back = read_all(store.as_ref(), &id);
    assert_eq!(back.len(), data.len());
    assert!(back == data, "payload differs after round trip");
}

pub fn concurrent_create_same_id_single_winner<F: StoreFactory + ?Sized>(factory: &F) {
    const CALLERS: usize = 8;
    let store = factory.store();
    let barrier = Arc::new(Barrier::new(CALLERS));

    let handles: Vec<_> = (0..CALLERS)
        .map(|i| {
            let store = Arc::clone(&store);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let data = payload(16 * 1024, i as u64 + 1);
                barrier.wait();
                let result = store.create_with_id(&mut data.as_slice(), "contended");
                result.map(|_| data)
            })
        })
        .collect();

    let mut winners = Vec::new();
    for handle in handles {
        match handle.join().expect("creator thread panicked") {
            Ok(data) => winners.push(data),
            Err(e) => assert_eq!(e.kind(), ErrorKind::Conflict, "loser failed with {}", e),
        }
    }

    assert_eq!(winners.len(), 1, "exactly one creator must win");
    assert_eq!(read_all(store.as_ref(), "contended"), winners[0]);
    assert_eq!(store.list().unwrap().len(), 1);
}

pub fn concurrent_anonymous_creates<F: StoreFactory + ?Sized>(factory: &F) {
    const CALLERS: usize = 8;
    const PER_CALLER: usize = 16;
    let store = factory.store();

    let handles: Vec<_> = (0..CALLERS)
        .map(|i| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                (0..PER_CALLER)
                    .map(|j| {
                        let body = format!("caller {} entry {}", i, j);
                        let id = store.create(&mut body.as_bytes()).unwrap();
                        (id, body)
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut created = Vec::new();
    for handle in handles {
        created.extend(handle.join().expect("creator thread panicked"));
    }

    let ids: HashSet<ObjectId> = created.iter().map(|(id, _)| id.clone()).collect();
    assert_eq!(ids.len(), CALLERS * PER_CALLER);
    assert_eq!(store.list().unwrap(), ids);
    for (id, body) in &created {
        assert_eq!(read_all(store.as_ref(), id), body.as_bytes());
    }
}

pub fn read_racing_delete_is_never_corrupt<F: StoreFactory + ?Sized>(factory: &F) {
    let store = factory.store();
    let data = payload(64 * 1024, 99);
    let ids: Vec<ObjectId> = (0..16)
        .map(|_| store.create(&mut data.as_slice()).unwrap())
        .collect();

    let deleter = {
        let store = Arc::clone(&store);
        let ids = ids.clone();
        thread::spawn(move || {
            for id in &ids {
                store.delete(id).unwrap();
            }
        })
    };

    for id in &ids {
        match store.view(id) {
            Ok(bytes) => assert!(bytes.as_ref() == data.as_slice(), "corrupt view of {}", id),
            Err(e) => assert_eq!(e.kind(), ErrorKind::NotFound, "view of {} failed with {}", id, e),
        }
    }

    deleter.join().expect("deleter thread panicked");
    assert!(store.list().unwrap().is_empty());
}

/// Run every scenario in sequence.
pub fn run_all<F: StoreFactory + ?Sized>(factory: &F) {
    list_empty(factory);
    create_then_read(factory);
    create_returns_distinct_identifiers(factory);
    create_with_id_then_read(factory);
    create_with_duplicate_id_conflicts(factory);
    create_uses_injected_generator(factory);
    generator_collision_conflicts(factory);
    missing_identifier_not_found(factory);
    empty_identifier_rejected(factory);
    delete_removes_entry(factory);
    buffer_and_stream_forms_interoperate(factory);
    readers_are_independent(factory);
    large_payload_roundtrip(factory);
    concurrent_create_same_id_single_winner(factory);
    concurrent_anonymous_creates(factory);
    read_racing_delete_is_never_corrupt(factory);
}

/// Expand into a module with one `#[test]` per conformance scenario.
///
/// `$factory` is evaluated once per test, so it may own per-test fixtures
/// such as temporary directories.
#[macro_export]
macro_rules! byte_store_conformance_tests {
    (@scenarios $factory:expr; $($scenario:ident),+ $(,)?) => {
        $(
            #[test]
            fn $scenario() {
                let factory = $factory;
                $crate::conformance::$scenario(&factory);
            }
        )+
    };
    ($name:ident, $factory:expr) => {
        mod $name {
            #[allow(unused_imports)]
            use super::*;

            $crate::byte_store_conformance_tests!(@scenarios $factory;
                list_empty,
                create_then_read,
                create_returns_distinct_identifiers,
                create_with_id_then_read,
                create_with_duplicate_id_conflicts,
                create_uses_injected_generator,
                generator_collision_conflicts,
                missing_identifier_not_found,
                empty_identifier_rejected,
                delete_removes_entry,
                buffer_and_stream_forms_interoperate,
                readers_are_independent,
                large_payload_roundtrip,
                concurrent_create_same_id_single_winner,
                concurrent_anonymous_creates,
                read_racing_delete_is_never_corrupt
            );
        }
    };
}
