//! Split cache: learned per-operation batch ceilings.
//!
//! Maps an operation signature to the smallest size that has failed with an
//! oversized exchange. Requests at or above that size are split up front
//! instead of being attempted. Entries are created lazily on failure and are
//! never evicted; the cache lives as long as the client that owns it.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Class of call whose size behavior is assumed uniform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    /// Paged scan or fetch by identifiers.
    Scan,
    /// Dense search returning full records.
    Search,
    /// Hybrid search returning full records.
    HybridSearch,
    /// Dense search returning identifiers and scores only.
    SlimSearch,
    /// Hybrid search returning identifiers and scores only.
    SlimHybridSearch,
}

impl OperationKind {
    /// The identifier-only counterpart used by the enricher's first pass.
    pub fn slim(self) -> Self {
        match self {
            OperationKind::Search | OperationKind::SlimSearch => OperationKind::SlimSearch,
            OperationKind::HybridSearch | OperationKind::SlimHybridSearch => {
                OperationKind::SlimHybridSearch
            }
            OperationKind::Scan => OperationKind::Scan,
        }
    }
}

/// Cache key: operation kind plus the request shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OperationKey {
    pub kind: OperationKind,
    pub database: String,
    pub collection: String,
    /// Number of probes carried by one call (1 for scans).
    pub probes: usize,
    pub wants_vector: bool,
}

impl OperationKey {
    pub fn new(
        kind: OperationKind,
        database: &str,
        collection: &str,
        probes: usize,
        wants_vector: bool,
    ) -> Self {
        Self {
            kind,
            database: database.to_string(),
            collection: collection.to_string(),
            probes,
            wants_vector,
        }
    }
}

/// Ceilings assumed for keys that have never failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Ceilings {
    pub scan: usize,
    pub search: usize,
    pub slim_search: usize,
}

impl Default for Ceilings {
    fn default() -> Self {
        Self {
            scan: 32768,
            search: 16384,
            slim_search: 65536,
        }
    }
}

impl Ceilings {
    pub fn for_kind(&self, kind: OperationKind) -> usize {
        match kind {
            OperationKind::Scan => self.scan,
            OperationKind::Search | OperationKind::HybridSearch => self.search,
            OperationKind::SlimSearch | OperationKind::SlimHybridSearch => self.slim_search,
        }
    }
}

/// Store of learned ceilings, shared by every call of one client.
///
/// The cache is advisory: racing writers may cost an extra split but never
/// change results.
pub trait SplitCache: Send + Sync {
    /// Ceiling learned from an oversized failure, if any.
    fn learned(&self, key: &OperationKey) -> Option<usize>;

    /// Ceiling assumed when nothing has been learned for `key`.
    fn default_ceiling(&self, key: &OperationKey) -> usize;

    /// Record that a call of `attempted` items failed as oversized.
    fn record_failure(&self, key: &OperationKey, attempted: usize);

    /// Current ceiling for `key`.
    fn get(&self, key: &OperationKey) -> usize {
        self.learned(key)
            .unwrap_or_else(|| self.default_ceiling(key))
    }
}

/// In-memory split cache.
#[derive(Default)]
pub struct MemorySplitCache {
    /// Kind defaults for cache misses.
    ceilings: Ceilings,
    /// Learned ceilings keyed by operation signature.
    entries: RwLock<HashMap<OperationKey, usize>>,
}

impl MemorySplitCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ceilings(ceilings: Ceilings) -> Self {
        Self {
            ceilings,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Number of keys with a learned ceiling.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl SplitCache for MemorySplitCache {
    fn learned(&self, key: &OperationKey) -> Option<usize> {
        self.entries.read().get(key).copied()
    }

    fn default_ceiling(&self, key: &OperationKey) -> usize {
        self.ceilings.for_kind(key.kind)
    }

    fn record_failure(&self, key: &OperationKey, attempted: usize) {
        let attempted = attempted.max(1);
        let mut entries = self.entries.write();
        let entry = entries.entry(key.clone()).or_insert(attempted);
        if attempted < *entry {
            *entry = attempted;
        }
        tracing::info!(
            kind = ?key.kind,
            database = %key.database,
            collection = %key.collection,
            probes = key.probes,
            ceiling = *entry,
            "learned split ceiling"
        );
    }
}
