//! SQLite implementation of the store traits
//!
//! Payloads live in a BLOB column keyed by identifier. The primary key makes
//! check-and-create atomic: a racing insert fails with a constraint
//! violation, which is reported as `Conflict`.
//!
//! Writes share one connection. For file databases `view` and `list` run
//! on pooled read-only connections, so a long read never holds the write
//! lock. An in-memory database is private to its connection, so there
//! every operation is serialized.

use crate::error::{StoreError, StoreResult};
use crate::id_generator::IdGenerator;
use crate::storage::{adapter, validate_identifier, ByteStore, ObjectId, PayloadReader, Store};
use bytes::Bytes;
use log::{debug, info};
use rusqlite::{params, Connection, ErrorCode, OpenFlags, OptionalExtension};
use std::collections::HashSet;
use std::io::Read;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Path value selecting a private in-memory database.
pub const IN_MEMORY: &str = ":memory:";

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS blobs (
    identifier TEXT PRIMARY KEY NOT NULL,
    payload BLOB NOT NULL
)";

/// Idle read-only connections to a file database.
struct ReaderPool {
    db_path: String,
    idle: Mutex<Vec<Connection>>,
}

impl ReaderPool {
    fn checkout(&self) -> StoreResult<Connection> {
        let idle = self.idle.lock()?.pop();
        match idle {
            Some(conn) => Ok(conn),
            None => {
                debug!("SQLite: Opening reader connection to {}", self.db_path);
                let flags = OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX;
                Ok(Connection::open_with_flags(&self.db_path, flags)?)
            }
        }
    }

    fn checkin(&self, conn: Connection) -> StoreResult<()> {
        self.idle.lock()?.push(conn);
        Ok(())
    }
}

/// Database-backed byte store.
pub struct SqliteByteStore {
    conn: Mutex<Connection>,
    readers: Option<ReaderPool>,
    generator: Arc<dyn IdGenerator>,
}

impl SqliteByteStore {
    /// Open (creating if needed) the database at `db_path`.
    ///
    /// `":memory:"` opens a private in-memory database. `wal_mode` is only
    /// applied to file databases.
    pub fn open(db_path: &str, wal_mode: bool, generator: Arc<dyn IdGenerator>) -> StoreResult<Self> {
        let conn = if db_path == IN_MEMORY {
            Connection::open_in_memory()?
        } else {
            if let Some(parent) = Path::new(db_path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            let conn = Connection::open(db_path)?;
            if wal_mode {
                let mode: String =
                    conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
                debug!("SQLite journal mode: {}", mode);
            }
            conn
        };
        conn.execute(SCHEMA, [])?;
        info!("Opened SQLite blob store at {}", db_path);

        let readers = (db_path != IN_MEMORY).then(|| ReaderPool {
            db_path: db_path.to_string(),
            idle: Mutex::new(Vec::new()),
        });

        Ok(Self {
            conn: Mutex::new(conn),
            readers,
            generator,
        })
    }

    /// Private in-memory database, mostly for tests.
    pub fn in_memory(generator: Arc<dyn IdGenerator>) -> StoreResult<Self> {
        Self::open(IN_MEMORY, false, generator)
    }

    /// Run a query on a reader connection, or on the shared connection for
    /// in-memory databases.
    fn with_reader<T>(&self, query: impl FnOnce(&Connection) -> rusqlite::Result<T>) -> StoreResult<T> {
        match &self.readers {
            Some(pool) => {
                let conn = pool.checkout()?;
                let result = query(&conn);
                pool.checkin(conn)?;
                Ok(result?)
            }
            None => {
                let conn = self.conn.lock()?;
                Ok(query(&conn)?)
            }
        }
    }

    fn insert(&self, identifier: &str, buffer: &[u8]) -> StoreResult<()> {
        let conn = self.conn.lock()?;
        let inserted = conn.execute(
            "INSERT INTO blobs (identifier, payload) VALUES (?1, ?2)",
            params![identifier, buffer],
        );
        match inserted {
            Ok(_) => {
                info!("SQLite: Stored {} bytes under {}", buffer.len(), identifier);
                Ok(())
            }
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                Err(StoreError::Conflict(identifier.to_string()))
            }
            Err(e) => Err(StoreError::Database(e)),
        }
    }
}

impl Store for SqliteByteStore {
    fn create(&self, stream: &mut dyn Read) -> StoreResult<ObjectId> {
        let buffer = adapter::to_buffer(stream)?;
        self.create_bytes(buffer)
    }

    fn create_with_id(&self, stream: &mut dyn Read, identifier: &str) -> StoreResult<()> {
        validate_identifier(identifier)?;
        let buffer = adapter::to_buffer(stream)?;
        self.insert(identifier, &buffer)
    }

    fn read(&self, identifier: &str) -> StoreResult<PayloadReader> {
        adapter::read_via_view(self, identifier)
    }

    fn list(&self) -> StoreResult<HashSet<ObjectId>> {
        self.with_reader(|conn| {
            let mut stmt = conn.prepare("SELECT identifier FROM blobs")?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
            rows.collect::<rusqlite::Result<HashSet<ObjectId>>>()
        })
    }

    fn delete(&self, identifier: &str) -> StoreResult<()> {
        validate_identifier(identifier)?;
        let conn = self.conn.lock()?;
        let removed = conn.execute("DELETE FROM blobs WHERE identifier = ?1", params![identifier])?;
        if removed == 0 {
            return Err(StoreError::NotFound(identifier.to_string()));
        }
        info!("SQLite: Deleted {}", identifier);
        Ok(())
    }
}

impl ByteStore for SqliteByteStore {
    fn create_bytes(&self, buffer: Bytes) -> StoreResult<ObjectId> {
        let identifier = self.generator.generate();
        validate_identifier(&identifier)?;
        self.insert(&identifier, &buffer)?;
        Ok(identifier)
    }

    fn create_bytes_with_id(&self, buffer: Bytes, identifier: &str) -> StoreResult<()> {
        validate_identifier(identifier)?;
        self.insert(identifier, &buffer)
    }

    fn view(&self, identifier: &str) -> StoreResult<Bytes> {
        validate_identifier(identifier)?;
        let payload: Option<Vec<u8>> = self.with_reader(|conn| {
            conn.query_row(
                "SELECT payload FROM blobs WHERE identifier = ?1",
                params![identifier],
                |row| row.get(0),
            )
            .optional()
        })?;
        payload
            .map(Bytes::from)
            .ok_or_else(|| StoreError::NotFound(identifier.to_string()))
    }
}
