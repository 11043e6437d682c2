//! Sharded symbol cache for literal and reserved names.
//!
//! Creating a [`Symbol`] normalizes and hashes its text. Generated code and
//! the runtime itself resolve the same literal names over and over, so the
//! table keeps one symbol per exact spelling and hands out cheap clones.
//!
//! # Thread Safety
//! Uses one `RwLock` per shard. Lookups of already-cached names only take a
//! read lock.

use super::Symbol;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const NUM_SHARDS: usize = 16;

/// Names every runtime resolves; cached when the table is created.
const RESERVED_NAMES: &[&str] = &[
    // Scope names
    "variables",
    "local",
    "arguments",
    "this",
    "super",
    "static",
    "request",
    "application",
    "session",
    "server",
    // Iteration pseudo-columns
    "recordCount",
    "currentRow",
    "columnList",
    // Class model
    "accessors",
    "extends",
    "implements",
    "onMissingMethod",
    "missingMethodName",
    "missingMethodArguments",
    "init",
    "name",
    "output",
    "$bx",
];

/// Per-spelling symbol cache.
pub struct SymbolTable {
    shards: [RwLock<FxHashMap<Box<str>, Symbol>>; NUM_SHARDS],
    /// Total cached symbols across all shards (O(1) `len()`).
    total_count: AtomicUsize,
}

impl SymbolTable {
    /// Create a table with the reserved runtime names already cached.
    pub fn new() -> Self {
        let table = Self::empty();
        for name in RESERVED_NAMES {
            table.intern(name);
        }
        table
    }

    /// Create a table with nothing cached.
    pub fn empty() -> Self {
        SymbolTable {
            shards: std::array::from_fn(|_| RwLock::new(FxHashMap::default())),
            total_count: AtomicUsize::new(0),
        }
    }

    #[inline]
    fn shard_for(text: &str) -> usize {
        let mut hash = 0u32;
        for byte in text.bytes().take(8) {
            hash = hash.wrapping_mul(31).wrapping_add(u32::from(byte));
        }
        (hash as usize) % NUM_SHARDS
    }

    /// Return the cached symbol for `text`, creating it on first use.
    ///
    /// Names that take the numeric fast path are never cached; building them
    /// is already allocation-free.
    pub fn intern(&self, text: &str) -> Symbol {
        let candidate_numeric = text.len() <= 3 && text.bytes().all(|b| b.is_ascii_digit());
        if candidate_numeric && !text.is_empty() {
            return Symbol::new(text);
        }

        let shard = &self.shards[Self::shard_for(text)];

        // Fast path: already cached
        if let Some(symbol) = shard.read().get(text) {
            return symbol.clone();
        }

        let mut guard = shard.write();

        // Double-check after acquiring write lock
        if let Some(symbol) = guard.get(text) {
            return symbol.clone();
        }

        let symbol = Symbol::new(text);
        guard.insert(text.into(), symbol.clone());
        self.total_count.fetch_add(1, Ordering::Relaxed);
        symbol
    }

    /// Look up a cached symbol without creating one.
    pub fn get(&self, text: &str) -> Option<Symbol> {
        self.shards[Self::shard_for(text)].read().get(text).cloned()
    }

    /// Number of cached spellings (O(1)).
    pub fn len(&self) -> usize {
        self.total_count.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every cached symbol. Symbols already handed out stay valid.
    pub fn clear(&self) {
        for shard in &self.shards {
            let mut guard = shard.write();
            let removed = guard.len();
            guard.clear();
            self.total_count.fetch_sub(removed, Ordering::Relaxed);
        }
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared symbol table owned by a runtime and handed to everything it creates.
#[derive(Clone, Default)]
pub struct SharedSymbolTable(Arc<SymbolTable>);

impl SharedSymbolTable {
    pub fn new() -> Self {
        SharedSymbolTable(Arc::new(SymbolTable::new()))
    }
}

impl std::ops::Deref for SharedSymbolTable {
    type Target = SymbolTable;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
