//! Identifier generation strategies
//!
//! Generators only produce tokens. Detecting a collision with a live entry
//! is the store's job, so a generator never consults the store.

use crate::storage::ObjectId;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Produces fresh identifiers for anonymous `create` calls.
pub trait IdGenerator: Send + Sync {
    fn generate(&self) -> ObjectId;
}

/// Random v4 UUID in canonical hyphenated form.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn generate(&self) -> ObjectId {
        Uuid::new_v4().hyphenated().to_string()
    }
}

/// Random v4 UUID with the hyphens stripped (32 hex digits).
#[derive(Debug, Clone, Copy, Default)]
pub struct CompactUuidGenerator;

impl IdGenerator for CompactUuidGenerator {
    fn generate(&self) -> ObjectId {
        Uuid::new_v4().simple().to_string()
    }
}

// Lets callers inject a closure, e.g. a fixed identifier in tests.
impl<F> IdGenerator for F
where
    F: Fn() -> ObjectId + Send + Sync,
{
    fn generate(&self) -> ObjectId {
        self()
    }
}

/// Generator policy selectable from configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeneratorKind {
    #[default]
    Canonical,
    Compact,
}

impl std::str::FromStr for GeneratorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "canonical" | "uuid" => Ok(GeneratorKind::Canonical),
            "compact" | "uuid_base" | "simple" => Ok(GeneratorKind::Compact),
            _ => Err(format!("Unknown identifier generator: {}", s)),
        }
    }
}

impl GeneratorKind {
    /// Build a generator instance for this policy
    pub fn build(&self) -> Arc<dyn IdGenerator> {
        match self {
            GeneratorKind::Canonical => Arc::new(UuidGenerator),
            GeneratorKind::Compact => Arc::new(CompactUuidGenerator),
        }
    }
}
