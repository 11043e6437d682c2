//! Registry of built-in functions.
//!
//! The catalog itself lives outside the core; it registers handlers here.
//! `ExecutionContext::invoke` consults the registry before user scopes.

use std::fmt;
use std::sync::Arc;

use cinder_ir::Symbol;
use dashmap::DashMap;

use crate::context::ExecutionContext;
use crate::errors::RuntimeResult;
use crate::value::{Arguments, Value};

/// Handler of a built-in function.
pub type BuiltinHandler =
    Arc<dyn Fn(&ExecutionContext<'_>, Arguments) -> RuntimeResult<Value> + Send + Sync>;

/// A registered built-in.
pub struct Builtin {
    name: Symbol,
    handler: BuiltinHandler,
}

impl Builtin {
    pub fn name(&self) -> &Symbol {
        &self.name
    }

    pub fn call(&self, ctx: &ExecutionContext<'_>, args: Arguments) -> RuntimeResult<Value> {
        (self.handler)(ctx, args)
    }
}

impl fmt::Debug for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Builtin({})", self.name)
    }
}

/// Concurrent name → built-in map.
#[derive(Default)]
pub struct BuiltinRegistry {
    functions: DashMap<Symbol, Arc<Builtin>>,
}

impl BuiltinRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a built-in, replacing any previous one of the same name.
    pub fn register<F>(&self, name: impl Into<Symbol>, handler: F)
    where
        F: Fn(&ExecutionContext<'_>, Arguments) -> RuntimeResult<Value> + Send + Sync + 'static,
    {
        let name = name.into();
        let builtin = Arc::new(Builtin {
            name: name.clone(),
            handler: Arc::new(handler),
        });
        self.functions.insert(name, builtin);
    }

    /// Look up a built-in. The handle is cloned out so no lock is held
    /// while it runs.
    pub fn get(&self, name: &Symbol) -> Option<Arc<Builtin>> {
        self.functions.get(name).map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, name: &Symbol) -> bool {
        self.functions.contains_key(name)
    }

    pub fn remove(&self, name: &Symbol) -> bool {
        self.functions.remove(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}
