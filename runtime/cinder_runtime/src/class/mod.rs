//! Class instances.
//!
//! A [`ClassInstance`] has two scopes: `variables`, which holds everything
//! the class declares, and `this`, its public face. Single inheritance is a
//! doubly linked chain: a child owns its parent (`Arc`) and the parent keeps
//! a `Weak` back-reference, so the "bottom" (most derived) instance is
//! reached by following child links.
//!
//! # Lifecycle
//!
//! ```text
//! Declared ──set_parent / register_interface──▶ Linked
//!    │                                            │
//!    └──────────────────construct─────────────────┴──▶ Constructed ──▶ Live
//! ```
//!
//! Linking is only allowed before construction. [`ClassDefinition::instantiate`]
//! drives the whole sequence.
//!
//! # Thread Safety
//! Scopes are thread-safe per key. The instance adds no locking around
//! multi-field updates.

mod definition;
mod dispatch;
mod interface;
mod linking;
mod metadata;

use std::fmt;
use std::sync::{Arc, OnceLock, Weak};

use cinder_ir::Symbol;
use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use rustc_hash::{FxBuildHasher, FxHashMap};

use crate::errors::{invalid_state, RuntimeResult};
use crate::names::ClassNames;
use crate::scope::{Scope, ScopeName, ScopeOrder};
use crate::value::Value;

pub use definition::{ClassDefinition, ClassDefinitionBuilder, Initializer, Property};
pub use interface::InterfaceDefinition;

use dispatch::PropertySetterHook;

/// Shared handle to a class instance.
pub type ClassRef = Arc<ClassInstance>;

/// Lifecycle state of an instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClassState {
    Declared,
    Linked,
    Constructed,
    Live,
}

impl ClassState {
    pub fn as_str(self) -> &'static str {
        match self {
            ClassState::Declared => "declared",
            ClassState::Linked => "linked",
            ClassState::Constructed => "constructed",
            ClassState::Live => "live",
        }
    }
}

/// Synthesized accessor names, keyed by `get<Name>` / `set<Name>`.
#[derive(Debug, Default)]
pub(crate) struct AccessorIndex {
    pub(crate) getters: FxHashMap<Symbol, Property>,
    pub(crate) setters: FxHashMap<Symbol, Property>,
}

impl AccessorIndex {
    fn build<'a>(properties: impl Iterator<Item = &'a Property>) -> Self {
        let mut index = AccessorIndex::default();
        for property in properties {
            if property.getter {
                index.getters.insert(property.getter_name(), property.clone());
            }
            if property.setter {
                index.setters.insert(property.setter_name(), property.clone());
            }
        }
        index
    }
}

/// A live object of a user-defined class.
pub struct ClassInstance {
    definition: Arc<ClassDefinition>,
    variables: Scope,
    this: Scope,
    properties: RwLock<IndexMap<Symbol, Property, FxBuildHasher>>,
    annotations: Scope,
    documentation: Scope,
    parent: RwLock<Option<ClassRef>>,
    child: RwLock<Weak<ClassInstance>>,
    interfaces: RwLock<Vec<Arc<InterfaceDefinition>>>,
    /// Built on first accessor dispatch; reset when linking changes properties.
    accessors: RwLock<Option<Arc<AccessorIndex>>>,
    state: Mutex<ClassState>,
    can_output: OnceLock<bool>,
}

impl ClassInstance {
    /// Create an unlinked instance with the definition's functions declared.
    ///
    /// Public functions are also exposed through `this`.
    pub fn new(definition: Arc<ClassDefinition>) -> ClassRef {
        Arc::new_cyclic(|weak| {
            let variables = Scope::named(ScopeName::Variables, ScopeOrder::Linked);
            let this = Scope::named(ScopeName::This, ScopeOrder::Linked);
            this.set_hook(Arc::new(PropertySetterHook::new(weak.clone())));

            for function in definition.functions() {
                let value = Value::function(function.clone());
                if function.access().is_public() {
                    this.put(function.name().clone(), value.clone());
                }
                variables.put(function.name().clone(), value);
            }

            let properties = definition
                .properties()
                .iter()
                .map(|property| (property.name.clone(), property.clone()))
                .collect();
            let annotations = Scope::linked();
            annotations.merge(definition.annotations(), true);
            let documentation = Scope::linked();
            documentation.merge(definition.documentation(), true);

            ClassInstance {
                definition,
                variables,
                this,
                properties: RwLock::new(properties),
                annotations,
                documentation,
                parent: RwLock::new(None),
                child: RwLock::new(Weak::new()),
                interfaces: RwLock::new(Vec::new()),
                accessors: RwLock::new(None),
                state: Mutex::new(ClassState::Declared),
                can_output: OnceLock::new(),
            }
        })
    }

    pub fn name(&self) -> &Symbol {
        self.definition.name()
    }

    pub fn definition(&self) -> &Arc<ClassDefinition> {
        &self.definition
    }

    /// Everything the class declares, private members included.
    pub fn variables(&self) -> &Scope {
        &self.variables
    }

    /// The public scope.
    pub fn this_scope(&self) -> &Scope {
        &self.this
    }

    pub fn static_scope(&self) -> &Scope {
        self.definition.static_scope()
    }

    pub fn annotations(&self) -> &Scope {
        &self.annotations
    }

    pub fn documentation(&self) -> &Scope {
        &self.documentation
    }

    pub fn state(&self) -> ClassState {
        *self.state.lock()
    }

    pub fn parent(&self) -> Option<ClassRef> {
        self.parent.read().clone()
    }

    pub fn child(&self) -> Option<ClassRef> {
        self.child.read().upgrade()
    }

    /// The most derived instance of the chain.
    pub fn bottom(self: &Arc<Self>) -> ClassRef {
        let mut current = Arc::clone(self);
        while let Some(child) = current.child() {
            current = child;
        }
        current
    }

    /// Declared properties, parents' first.
    pub fn properties(&self) -> Vec<Property> {
        self.properties.read().values().cloned().collect()
    }

    pub fn property(&self, name: &Symbol) -> Option<Property> {
        self.properties.read().get(name).cloned()
    }

    pub fn interfaces(&self) -> Vec<Arc<InterfaceDefinition>> {
        self.interfaces.read().clone()
    }

    /// Whether the `accessors` annotation is on.
    pub(crate) fn accessors_enabled(&self, names: &ClassNames) -> bool {
        self.annotations
            .get(&names.accessors)
            .is_some_and(|value| value.cast_bool().unwrap_or(false))
    }

    /// Whether the class may write output, from its `output` annotation.
    pub fn can_output(&self) -> bool {
        *self.can_output.get_or_init(|| {
            self.annotations
                .get(&Symbol::new("output"))
                .map_or(true, |value| value.cast_bool().unwrap_or(true))
        })
    }

    pub(crate) fn accessor_index(&self) -> Arc<AccessorIndex> {
        if let Some(index) = self.accessors.read().as_ref() {
            return Arc::clone(index);
        }
        let mut slot = self.accessors.write();
        if let Some(index) = slot.as_ref() {
            return Arc::clone(index);
        }
        let index = Arc::new(AccessorIndex::build(self.properties.read().values()));
        *slot = Some(Arc::clone(&index));
        index
    }

    /// Move to `next` if the current state is one of `allowed`.
    fn transition(&self, allowed: &[ClassState], next: ClassState, operation: &str) -> RuntimeResult<()> {
        let mut state = self.state.lock();
        if !allowed.contains(&*state) {
            return Err(invalid_state(
                format!("class [{}]", self.name()),
                operation,
                state.as_str(),
            ));
        }
        *state = next;
        Ok(())
    }
}

impl fmt::Debug for ClassInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassInstance")
            .field("name", self.name())
            .field("state", &self.state())
            .field("parent", &self.parent().map(|parent| parent.name().clone()))
            .finish_non_exhaustive()
    }
}
