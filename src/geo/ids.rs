//! Tile identifier generation.

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};

use uuid::Uuid;

/// Source of box identifiers, injected into the tile grid builder.
///
/// Identifiers must be unique within one run; they end up in output file
/// names and in the ledger.
pub trait BoxIdGenerator: Send + Sync + Debug {
    /// Returns the next identifier.
    fn next_id(&self) -> String;
}

/// Time-ordered random identifiers (UUID v7). Used by default.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidIdGenerator;

impl BoxIdGenerator for UuidIdGenerator {
    fn next_id(&self) -> String {
        Uuid::now_v7().to_string()
    }
}

/// Deterministic `prefix-0001`, `prefix-0002`, ... identifiers.
#[derive(Debug)]
pub struct SequentialIdGenerator {
    prefix: String,
    next: AtomicU64,
}

impl SequentialIdGenerator {
    /// Creates a generator whose first id is `<prefix>-0001`.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(1),
        }
    }
}

impl Default for SequentialIdGenerator {
    fn default() -> Self {
        Self::new("tile")
    }
}

impl BoxIdGenerator for SequentialIdGenerator {
    fn next_id(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::SeqCst);
        format!("{}-{n:04}", self.prefix)
    }
}
