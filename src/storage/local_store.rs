//! Local filesystem binary storage implementation
//!
//! One file per entry under the storage directory. Payloads are first
//! written to a staging file, synced, then published under their identifier
//! with a hard link. Linking fails if the target exists, which makes
//! check-and-create atomic across threads and processes sharing the
//! directory, and readers never see a half-written file.

use crate::error::{StoreError, StoreResult};
use crate::id_generator::IdGenerator;
use crate::storage::{validate_identifier, ByteStore, ObjectId, PayloadReader, Store};
use log::{debug, info, warn};
use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

/// Name of the default staging directory inside the storage directory.
/// Dot-prefixed so it can never collide with an identifier.
pub const STAGING_DIR: &str = ".staging";

/// Longest identifier accepted, in bytes (`NAME_MAX` on common filesystems).
pub const MAX_IDENTIFIER_LEN: usize = 255;

/// Filesystem-backed store.
///
/// Identifiers double as file names, so they are restricted to ASCII
/// letters, digits, `.`, `_` and `-`, may not start with `.`, and are at
/// most [`MAX_IDENTIFIER_LEN`] bytes long.
pub struct LocalFileStore {
    storage_path: PathBuf,
    temp_path: PathBuf,
    generator: Arc<dyn IdGenerator>,
}

impl LocalFileStore {
    /// Open (creating if needed) a store rooted at `storage_path`.
    ///
    /// `temp_path` must be on the same filesystem as `storage_path` and must
    /// not be `storage_path` itself; it defaults to `<storage_path>/.staging`.
    pub fn new(
        storage_path: impl Into<PathBuf>,
        temp_path: Option<PathBuf>,
        generator: Arc<dyn IdGenerator>,
    ) -> StoreResult<Self> {
        let storage_path = storage_path.into();
        let temp_path = temp_path.unwrap_or_else(|| storage_path.join(STAGING_DIR));

        fs::create_dir_all(&storage_path)?;
        fs::create_dir_all(&temp_path)?;
        if fs::canonicalize(&temp_path)? == fs::canonicalize(&storage_path)? {
            return Err(StoreError::InvalidArgument(format!(
                "staging directory must differ from storage directory: {}",
                temp_path.display()
            )));
        }
        info!(
            "Using storage directory {} (staging in {})",
            storage_path.display(),
            temp_path.display()
        );

        Ok(Self {
            storage_path,
            temp_path,
            generator,
        })
    }

    pub fn storage_path(&self) -> &Path {
        &self.storage_path
    }

    fn entry_path(&self, identifier: &str) -> PathBuf {
        self.storage_path.join(identifier)
    }

    fn check_identifier(identifier: &str) -> StoreResult<()> {
        validate_identifier(identifier)?;
        if identifier.len() > MAX_IDENTIFIER_LEN {
            return Err(StoreError::InvalidArgument(format!(
                "identifier longer than {} bytes",
                MAX_IDENTIFIER_LEN
            )));
        }
        if identifier.starts_with('.') {
            return Err(StoreError::InvalidArgument(format!(
                "identifier may not start with '.': {}",
                identifier
            )));
        }
        let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-');
        if !identifier.chars().all(allowed) {
            return Err(StoreError::InvalidArgument(format!(
                "identifier is not a valid file name: {}",
                identifier
            )));
        }
        Ok(())
    }

    /// Copy the stream into a fresh staging file and sync it to disk.
    fn stage(&self, stream: &mut dyn Read) -> StoreResult<(PathBuf, u64)> {
        let staged = self.temp_path.join(format!("{}.partial", Uuid::new_v4().simple()));
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&staged)?;

        let written = io::copy(stream, &mut file).and_then(|n| file.sync_all().map(|_| n));
        match written {
            Ok(size) => Ok((staged, size)),
            Err(e) => {
                drop(file);
                self.discard(&staged);
                Err(StoreError::Io(e))
            }
        }
    }

    fn discard(&self, staged: &Path) {
        if let Err(e) = fs::remove_file(staged) {
            warn!("Failed to remove staging file {}: {}", staged.display(), e);
        }
    }

    /// Link the staged file under its identifier. Fails with `Conflict` if
    /// the identifier was published first by someone else.
    fn publish(&self, staged: &Path, identifier: &str, size: u64) -> StoreResult<()> {
        let target = self.entry_path(identifier);
        let linked = fs::hard_link(staged, &target);
        self.discard(staged);

        match linked {
            Ok(()) => {
                self.sync_storage_dir()?;
                info!("Wrote {} bytes to {}", size, target.display());
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                Err(StoreError::Conflict(identifier.to_string()))
            }
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    /// Persist directory entries so a published name survives a crash.
    #[cfg(unix)]
    fn sync_storage_dir(&self) -> io::Result<()> {
        File::open(&self.storage_path)?.sync_all()
    }

    #[cfg(not(unix))]
    fn sync_storage_dir(&self) -> io::Result<()> {
        Ok(())
    }

    fn write_entry(&self, stream: &mut dyn Read, identifier: &str) -> StoreResult<()> {
        // Fail fast; the link in publish() is what actually decides.
        if self.entry_path(identifier).exists() {
            return Err(StoreError::Conflict(identifier.to_string()));
        }
        let (staged, size) = self.stage(stream)?;
        self.publish(&staged, identifier, size)
    }
}

impl Store for LocalFileStore {
    fn create(&self, stream: &mut dyn Read) -> StoreResult<ObjectId> {
        let identifier = self.generator.generate();
        Self::check_identifier(&identifier)?;
        self.write_entry(stream, &identifier)?;
        Ok(identifier)
    }

    fn create_with_id(&self, stream: &mut dyn Read, identifier: &str) -> StoreResult<()> {
        Self::check_identifier(identifier)?;
        self.write_entry(stream, identifier)
    }

    fn read(&self, identifier: &str) -> StoreResult<PayloadReader> {
        Self::check_identifier(identifier)?;
        let path = self.entry_path(identifier);
        match File::open(&path) {
            Ok(file) => {
                debug!("Opened {} for reading", path.display());
                Ok(Box::new(file))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(identifier.to_string()))
            }
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    fn list(&self) -> StoreResult<HashSet<ObjectId>> {
        let mut identifiers = HashSet::new();
        for entry in fs::read_dir(&self.storage_path)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            match entry.file_name().into_string() {
                Ok(name) if !name.starts_with('.') => {
                    identifiers.insert(name);
                }
                Ok(_) => {}
                Err(name) => warn!("Skipping non UTF-8 entry {:?}", name),
            }
        }
        Ok(identifiers)
    }

    fn delete(&self, identifier: &str) -> StoreResult<()> {
        Self::check_identifier(identifier)?;
        let path = self.entry_path(identifier);
        match fs::remove_file(&path) {
            Ok(()) => {
                info!("Deleted {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(identifier.to_string()))
            }
            Err(e) => Err(StoreError::Io(e)),
        }
    }
}

// Stream-native: the buffer forms come from the trait's bridging defaults.
impl ByteStore for LocalFileStore {}
