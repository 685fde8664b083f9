//! Snapshot cache for the generator.

use dashmap::DashMap;
use std::sync::Arc;

use crate::machine::state::{Fingerprint, Machine};

/// Result of applying one opcode to a parent snapshot: the machine
/// afterwards, the accumulated output, and the state fingerprint.
///
/// Holds no opcode text on purpose: two search paths can reach the same
/// fingerprint through different prefixes, and the committed program is
/// always reconstructed from the live path, never from the cache.
#[derive(Clone, Debug)]
pub struct SearchState {
    pub machine: Machine,
    pub output: Vec<u8>,
    pub fingerprint: Fingerprint,
}

/// Concurrent snapshot cache keyed by `(parent fingerprint, appended symbol)`.
///
/// A hit returns the memoized post-step state without touching an
/// interpreter. Values are shared immutably; inserts are synchronized, so
/// sibling expansion could be farmed out to worker threads without changing
/// the cache type.
#[derive(Default)]
pub struct SnapshotCache {
    entries: DashMap<(Fingerprint, u8), Arc<SearchState>>,
}

impl SnapshotCache {
    pub fn new() -> SnapshotCache {
        SnapshotCache {
            entries: DashMap::new(),
        }
    }

    pub fn get(&self, parent: &Fingerprint, symbol: u8) -> Option<Arc<SearchState>> {
        self.entries
            .get(&(*parent, symbol))
            .map(|entry| entry.value().clone())
    }

    pub fn insert(&self, parent: Fingerprint, symbol: u8, state: Arc<SearchState>) {
        self.entries.insert((parent, symbol), state);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
