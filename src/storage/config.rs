//! Configuration for binary storage backends

use crate::error::StoreResult;
use crate::id_generator::{GeneratorKind, IdGenerator};
use crate::storage::{
    local_store::LocalFileStore, memory_store::MemoryByteStore, sqlite_store::SqliteByteStore,
    ByteStore,
};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;

/// Available binary storage backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Local,
    Memory,
    Sqlite,
}

impl std::str::FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" | "fs" | "file" => Ok(StorageBackend::Local),
            "memory" | "mem" | "mock" => Ok(StorageBackend::Memory),
            "sqlite" | "db" => Ok(StorageBackend::Sqlite),
            _ => Err(format!("Unknown storage backend: {}", s)),
        }
    }
}

impl std::fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackend::Local => write!(f, "local"),
            StorageBackend::Memory => write!(f, "memory"),
            StorageBackend::Sqlite => write!(f, "sqlite"),
        }
    }
}

/// Configuration for binary storage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Storage backend type
    pub backend: StorageBackend,
    /// Directory holding one file per entry (local backend)
    pub base_path: String,
    /// Staging directory; must share a filesystem with `base_path`
    pub temp_path: Option<String>,
    /// Database file (sqlite backend), `:memory:` for a private in-memory db
    pub db_path: String,
    /// Enable WAL journal mode for file databases
    pub wal_mode: bool,
    /// Identifier policy for anonymous creates
    pub generator: GeneratorKind,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            base_path: "./data/storage".to_string(),
            temp_path: None,
            db_path: "./data/blobs.sqlite".to_string(),
            wal_mode: true,
            generator: GeneratorKind::default(),
        }
    }
}

fn parse_env<T>(name: &str, fallback: T) -> T
where
    T: std::str::FromStr<Err = String> + std::fmt::Debug,
{
    match env::var(name) {
        Ok(raw) => match raw.parse::<T>() {
            Ok(value) => {
                info!("Using {} from environment: {:?}", name, value);
                value
            }
            Err(e) => {
                warn!("Invalid {} in environment: {}. Using {:?}.", name, e, fallback);
                fallback
            }
        },
        Err(_) => fallback,
    }
}

impl StorageConfig {
    /// Create a new storage configuration from environment variables
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Apply `STORAGE_*` environment variables on top of this configuration
    pub fn with_env_overrides(mut self) -> Self {
        self.backend = parse_env("STORAGE_BACKEND", self.backend);
        self.generator = parse_env("STORAGE_ID_GENERATOR", self.generator);

        if let Ok(dir) = env::var("STORAGE_DIRECTORY") {
            info!("Using storage directory from environment: {}", dir);
            self.base_path = dir;
        }
        if let Ok(dir) = env::var("STORAGE_TEMP_DIRECTORY") {
            info!("Using staging directory from environment: {}", dir);
            self.temp_path = Some(dir);
        }
        if let Ok(path) = env::var("STORAGE_DB_FILE") {
            info!("Using database path from environment: {}", path);
            self.db_path = path;
        }
        self
    }

    /// Create a storage instance based on the configuration, using the
    /// configured identifier generator
    pub fn create_store(&self) -> StoreResult<Arc<dyn ByteStore>> {
        self.create_store_with_generator(self.generator.build())
    }

    /// Create a storage instance with an explicitly injected generator
    pub fn create_store_with_generator(
        &self,
        generator: Arc<dyn IdGenerator>,
    ) -> StoreResult<Arc<dyn ByteStore>> {
        info!("Creating {} storage backend", self.backend);
        let store: Arc<dyn ByteStore> = match self.backend {
            StorageBackend::Local => Arc::new(LocalFileStore::new(
                &self.base_path,
                self.temp_path.as_ref().map(PathBuf::from),
                generator,
            )?),
            StorageBackend::Memory => Arc::new(MemoryByteStore::new(generator)),
            StorageBackend::Sqlite => {
                Arc::new(SqliteByteStore::open(&self.db_path, self.wal_mode, generator)?)
            }
        };
        Ok(store)
    }
}
