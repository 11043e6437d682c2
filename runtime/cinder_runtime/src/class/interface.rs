//! Interfaces: required members plus default implementations.

use std::sync::Arc;

use cinder_ir::Symbol;

use crate::scope::Scope;
use crate::value::{Function, Value};

#[derive(Debug)]
pub struct InterfaceDefinition {
    name: Symbol,
    abstract_methods: Vec<Symbol>,
    default_methods: Vec<Function>,
}

impl InterfaceDefinition {
    pub fn new(name: impl Into<Symbol>) -> Self {
        InterfaceDefinition {
            name: name.into(),
            abstract_methods: Vec::new(),
            default_methods: Vec::new(),
        }
    }

    /// Require implementors to define `name`.
    #[must_use]
    pub fn with_abstract(mut self, name: impl Into<Symbol>) -> Self {
        self.abstract_methods.push(name.into());
        self
    }

    /// Provide `function` to implementors that lack it.
    #[must_use]
    pub fn with_default(mut self, function: Function) -> Self {
        self.default_methods.push(function);
        self
    }

    pub fn build(self) -> Arc<InterfaceDefinition> {
        Arc::new(self)
    }

    pub fn name(&self) -> &Symbol {
        &self.name
    }

    pub fn abstract_methods(&self) -> &[Symbol] {
        &self.abstract_methods
    }

    pub fn default_methods(&self) -> &[Function] {
        &self.default_methods
    }

    pub(crate) fn metadata(&self) -> Scope {
        let meta = Scope::sorted();
        meta.put("name", Value::string(self.name.original()));
        let required: Vec<Value> = self
            .abstract_methods
            .iter()
            .map(|name| Value::string(name.original()))
            .collect();
        meta.put("abstractMethods", Value::array(required));
        let defaults: Vec<Value> = self
            .default_methods
            .iter()
            .map(|function| Value::Struct(function.metadata()))
            .collect();
        meta.put("defaultMethods", Value::array(defaults));
        meta
    }
}
