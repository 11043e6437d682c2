//! Case-insensitive binding namespaces.
//!
//! A [`Scope`] maps [`Symbol`]s to [`Value`]s in one of three orders: hash
//! order, insertion order, or case-insensitive sorted order. Structs are
//! unnamed scopes; the scopes of contexts (`variables`, `local`, ...) carry a
//! [`ScopeName`].
//!
//! `Scope` is a shared handle. Clones see the same bindings, and reads and
//! writes from several threads are safe; the handle takes a short
//! `parking_lot` lock per operation and never holds it while running user
//! code.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use cinder_ir::Symbol;
use indexmap::IndexMap;
use parking_lot::RwLock;
use rustc_hash::{FxBuildHasher, FxHashMap};

use crate::context::ExecutionContext;
use crate::errors::RuntimeResult;
use crate::value::Value;

/// Iteration order of a scope's keys.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ScopeOrder {
    /// Unspecified order; cheapest.
    Hashed,
    /// Insertion order.
    #[default]
    Linked,
    /// Case-insensitive key order.
    Sorted,
}

impl ScopeOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            ScopeOrder::Hashed => "hashed",
            ScopeOrder::Linked => "linked",
            ScopeOrder::Sorted => "sorted",
        }
    }

    pub fn parse(text: &str) -> Option<Self> {
        match text.to_ascii_lowercase().as_str() {
            "hashed" | "hash" => Some(ScopeOrder::Hashed),
            "linked" | "ordered" => Some(ScopeOrder::Linked),
            "sorted" => Some(ScopeOrder::Sorted),
            _ => None,
        }
    }
}

/// Names of the scopes a context can expose.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScopeName {
    Variables,
    Local,
    Arguments,
    This,
    Static,
    Request,
    Application,
    Session,
    Server,
}

impl ScopeName {
    pub const ALL: [ScopeName; 9] = [
        ScopeName::Variables,
        ScopeName::Local,
        ScopeName::Arguments,
        ScopeName::This,
        ScopeName::Static,
        ScopeName::Request,
        ScopeName::Application,
        ScopeName::Session,
        ScopeName::Server,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ScopeName::Variables => "variables",
            ScopeName::Local => "local",
            ScopeName::Arguments => "arguments",
            ScopeName::This => "this",
            ScopeName::Static => "static",
            ScopeName::Request => "request",
            ScopeName::Application => "application",
            ScopeName::Session => "session",
            ScopeName::Server => "server",
        }
    }

    /// The scope a symbol names, if any.
    pub fn from_symbol(symbol: &Symbol) -> Option<Self> {
        if symbol.is_numeric() {
            return None;
        }
        Self::ALL.into_iter().find(|name| symbol.matches(name.as_str()))
    }
}

impl fmt::Display for ScopeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hook run by [`Scope::assign`] before the value is stored.
///
/// Returns `Ok(true)` when the hook stored the value itself (for example by
/// running a user-written setter), `Ok(false)` to fall back to a plain put.
pub trait AssignHook: Send + Sync {
    fn assign(&self, ctx: &ExecutionContext<'_>, key: &Symbol, value: &Value)
        -> RuntimeResult<bool>;
}

enum Entries {
    Hashed(FxHashMap<Symbol, Value>),
    Linked(IndexMap<Symbol, Value, FxBuildHasher>),
    Sorted(BTreeMap<Symbol, Value>),
}

impl Entries {
    fn new(order: ScopeOrder) -> Self {
        match order {
            ScopeOrder::Hashed => Entries::Hashed(FxHashMap::default()),
            ScopeOrder::Linked => Entries::Linked(IndexMap::default()),
            ScopeOrder::Sorted => Entries::Sorted(BTreeMap::new()),
        }
    }

    fn get(&self, key: &Symbol) -> Option<&Value> {
        match self {
            Entries::Hashed(map) => map.get(key),
            Entries::Linked(map) => map.get(key),
            Entries::Sorted(map) => map.get(key),
        }
    }

    fn insert(&mut self, key: Symbol, value: Value) -> Option<Value> {
        match self {
            Entries::Hashed(map) => map.insert(key, value),
            Entries::Linked(map) => map.insert(key, value),
            Entries::Sorted(map) => map.insert(key, value),
        }
    }

    fn remove(&mut self, key: &Symbol) -> Option<Value> {
        match self {
            Entries::Hashed(map) => map.remove(key),
            Entries::Linked(map) => map.shift_remove(key),
            Entries::Sorted(map) => map.remove(key),
        }
    }

    fn len(&self) -> usize {
        match self {
            Entries::Hashed(map) => map.len(),
            Entries::Linked(map) => map.len(),
            Entries::Sorted(map) => map.len(),
        }
    }

    fn clear(&mut self) {
        match self {
            Entries::Hashed(map) => map.clear(),
            Entries::Linked(map) => map.clear(),
            Entries::Sorted(map) => map.clear(),
        }
    }

    fn pairs(&self) -> Vec<(Symbol, Value)> {
        match self {
            Entries::Hashed(map) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            Entries::Linked(map) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            Entries::Sorted(map) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        }
    }

    fn keys(&self) -> Vec<Symbol> {
        match self {
            Entries::Hashed(map) => map.keys().cloned().collect(),
            Entries::Linked(map) => map.keys().cloned().collect(),
            Entries::Sorted(map) => map.keys().cloned().collect(),
        }
    }
}

struct ScopeInner {
    name: Option<ScopeName>,
    order: ScopeOrder,
    entries: RwLock<Entries>,
    hook: OnceLock<Arc<dyn AssignHook>>,
}

/// Shared, ordered, case-insensitive map from symbol to value.
#[derive(Clone)]
pub struct Scope(Arc<ScopeInner>);

impl Scope {
    /// Create an unnamed scope (a struct).
    pub fn new(order: ScopeOrder) -> Self {
        Scope(Arc::new(ScopeInner {
            name: None,
            order,
            entries: RwLock::new(Entries::new(order)),
            hook: OnceLock::new(),
        }))
    }

    /// Create a named context scope.
    pub fn named(name: ScopeName, order: ScopeOrder) -> Self {
        Scope(Arc::new(ScopeInner {
            name: Some(name),
            order,
            entries: RwLock::new(Entries::new(order)),
            hook: OnceLock::new(),
        }))
    }

    pub fn hashed() -> Self {
        Self::new(ScopeOrder::Hashed)
    }

    pub fn linked() -> Self {
        Self::new(ScopeOrder::Linked)
    }

    pub fn sorted() -> Self {
        Self::new(ScopeOrder::Sorted)
    }

    /// Build an insertion-ordered struct from pairs.
    pub fn from_pairs<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<Symbol>,
    {
        let scope = Self::linked();
        for (key, value) in pairs {
            scope.put(key, value);
        }
        scope
    }

    #[inline]
    pub fn name(&self) -> Option<ScopeName> {
        self.0.name
    }

    #[inline]
    pub fn order(&self) -> ScopeOrder {
        self.0.order
    }

    /// Install the assignment hook. Only the first hook is kept.
    pub fn set_hook(&self, hook: Arc<dyn AssignHook>) -> bool {
        self.0.hook.set(hook).is_ok()
    }

    /// Read a binding. Never fails; absence is `None`.
    pub fn get(&self, key: &Symbol) -> Option<Value> {
        self.0.entries.read().get(key).cloned()
    }

    /// Store a binding, returning the previous value.
    ///
    /// An existing key keeps its original spelling and position.
    pub fn put(&self, key: impl Into<Symbol>, value: Value) -> Option<Value> {
        self.0.entries.write().insert(key.into(), value)
    }

    /// Store a binding only if the key is absent. Returns whether it was stored.
    pub fn put_if_absent(&self, key: impl Into<Symbol>, value: Value) -> bool {
        let key = key.into();
        let mut entries = self.0.entries.write();
        if entries.get(&key).is_some() {
            return false;
        }
        entries.insert(key, value);
        true
    }

    /// Store a binding through the assignment hook, if one is installed.
    pub fn assign(&self, ctx: &ExecutionContext<'_>, key: &Symbol, value: Value) -> RuntimeResult<()> {
        if let Some(hook) = self.0.hook.get() {
            if hook.assign(ctx, key, &value)? {
                return Ok(());
            }
        }
        self.put(key.clone(), value);
        Ok(())
    }

    pub fn remove(&self, key: &Symbol) -> Option<Value> {
        self.0.entries.write().remove(key)
    }

    pub fn contains_key(&self, key: &Symbol) -> bool {
        self.0.entries.read().get(key).is_some()
    }

    /// Copy every binding of `other` into this scope.
    ///
    /// Without `overwrite`, keys already present here keep their values.
    pub fn merge(&self, other: &Scope, overwrite: bool) {
        if Scope::ptr_eq(self, other) {
            return;
        }
        let incoming = other.entries();
        let mut entries = self.0.entries.write();
        for (key, value) in incoming {
            if overwrite || entries.get(&key).is_none() {
                entries.insert(key, value);
            }
        }
    }

    /// Keys in the scope's order.
    pub fn keys(&self) -> Vec<Symbol> {
        self.0.entries.read().keys()
    }

    /// Bindings in the scope's order.
    pub fn entries(&self) -> Vec<(Symbol, Value)> {
        self.0.entries.read().pairs()
    }

    pub fn len(&self) -> usize {
        self.0.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.0.entries.write().clear();
    }

    /// Whether two handles refer to the same scope.
    pub fn ptr_eq(a: &Scope, b: &Scope) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }

    /// Human-readable description used in diagnostics.
    pub fn describe(&self) -> String {
        match self.0.name {
            Some(name) => format!("the [{name}] scope"),
            None => "the struct".to_string(),
        }
    }
}

impl Default for Scope {
    fn default() -> Self {
        Self::linked()
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Vec<String> = self.keys().iter().map(ToString::to_string).collect();
        match self.0.name {
            Some(name) => write!(f, "Scope({name}, {keys:?})"),
            None => write!(f, "Struct({keys:?})"),
        }
    }
}
