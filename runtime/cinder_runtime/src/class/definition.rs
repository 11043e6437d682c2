//! Compiled class shapes.

use std::fmt;
use std::sync::Arc;

use cinder_ir::Symbol;

use crate::context::ExecutionContext;
use crate::errors::RuntimeResult;
use crate::scope::{Scope, ScopeName, ScopeOrder};
use crate::value::{Function, Value};

use super::{ClassInstance, ClassRef, InterfaceDefinition};

/// Pseudo-constructor body: runs in the instance's class context.
pub type Initializer = Arc<dyn Fn(&ExecutionContext<'_>) -> RuntimeResult<()> + Send + Sync>;

/// A declared property.
#[derive(Clone, Debug)]
pub struct Property {
    pub name: Symbol,
    pub type_name: String,
    pub default: Option<Value>,
    pub getter: bool,
    pub setter: bool,
    pub annotations: Scope,
    pub documentation: Scope,
}

impl Property {
    pub fn new(name: impl Into<Symbol>) -> Self {
        Property {
            name: name.into(),
            type_name: "any".to_string(),
            default: None,
            getter: true,
            setter: true,
            annotations: Scope::linked(),
            documentation: Scope::linked(),
        }
    }

    #[must_use]
    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    #[must_use]
    pub fn with_type(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = type_name.into();
        self
    }

    #[must_use]
    pub fn without_getter(mut self) -> Self {
        self.getter = false;
        self
    }

    #[must_use]
    pub fn without_setter(mut self) -> Self {
        self.setter = false;
        self
    }

    #[must_use]
    pub fn with_annotation(self, key: impl Into<Symbol>, value: Value) -> Self {
        self.annotations.put(key, value);
        self
    }

    /// `get<Name>`.
    pub fn getter_name(&self) -> Symbol {
        Symbol::new(format!("get{}", self.name.original()))
    }

    /// `set<Name>`.
    pub fn setter_name(&self) -> Symbol {
        Symbol::new(format!("set{}", self.name.original()))
    }

    pub(crate) fn metadata(&self) -> Scope {
        let meta = Scope::sorted();
        meta.put("name", Value::string(self.name.original()));
        meta.put("type", Value::string(&self.type_name));
        meta.put("default", self.default.clone().unwrap_or(Value::Null));
        meta.put("annotations", Value::Struct(self.annotations.clone()));
        meta.put("documentation", Value::Struct(self.documentation.clone()));
        meta
    }
}

/// Everything the compiler knows about a class.
pub struct ClassDefinition {
    name: Symbol,
    path: String,
    imports: Vec<String>,
    annotations: Scope,
    documentation: Scope,
    properties: Vec<Property>,
    functions: Vec<Function>,
    static_scope: Scope,
    extends: Option<Arc<ClassDefinition>>,
    interfaces: Vec<Arc<InterfaceDefinition>>,
    initializer: Option<Initializer>,
}

impl ClassDefinition {
    pub fn builder(name: impl Into<Symbol>) -> ClassDefinitionBuilder {
        ClassDefinitionBuilder::new(name.into())
    }

    pub fn name(&self) -> &Symbol {
        &self.name
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn imports(&self) -> &[String] {
        &self.imports
    }

    pub fn annotations(&self) -> &Scope {
        &self.annotations
    }

    pub fn documentation(&self) -> &Scope {
        &self.documentation
    }

    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    pub fn functions(&self) -> &[Function] {
        &self.functions
    }

    /// Shared by every instance of the class.
    pub fn static_scope(&self) -> &Scope {
        &self.static_scope
    }

    pub fn extends(&self) -> Option<&Arc<ClassDefinition>> {
        self.extends.as_ref()
    }

    pub fn interfaces(&self) -> &[Arc<InterfaceDefinition>] {
        &self.interfaces
    }

    pub(crate) fn initializer(&self) -> Option<&Initializer> {
        self.initializer.as_ref()
    }

    /// Build a live instance: instantiate the parent chain, link it, register
    /// interfaces, then run the pseudo-constructor.
    #[tracing::instrument(level = "debug", skip_all, fields(class = %self.name))]
    pub fn instantiate(self: &Arc<Self>, ctx: &ExecutionContext<'_>) -> RuntimeResult<ClassRef> {
        let parent = match &self.extends {
            Some(definition) => Some(definition.instantiate(ctx)?),
            None => None,
        };
        let instance = ClassInstance::new(Arc::clone(self));
        if let Some(parent) = parent {
            instance.set_parent(parent)?;
        }
        for interface in &self.interfaces {
            instance.register_interface(interface)?;
        }
        instance.construct(ctx)?;
        Ok(instance)
    }
}

impl fmt::Debug for ClassDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassDefinition")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("properties", &self.properties.len())
            .field("functions", &self.functions.len())
            .finish_non_exhaustive()
    }
}

/// Builder for [`ClassDefinition`].
#[must_use]
pub struct ClassDefinitionBuilder {
    definition: ClassDefinition,
}

impl ClassDefinitionBuilder {
    fn new(name: Symbol) -> Self {
        ClassDefinitionBuilder {
            definition: ClassDefinition {
                name,
                path: String::new(),
                imports: Vec::new(),
                annotations: Scope::linked(),
                documentation: Scope::linked(),
                properties: Vec::new(),
                functions: Vec::new(),
                static_scope: Scope::named(ScopeName::Static, ScopeOrder::Hashed),
                extends: None,
                interfaces: Vec::new(),
                initializer: None,
            },
        }
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.definition.path = path.into();
        self
    }

    pub fn import(mut self, import: impl Into<String>) -> Self {
        self.definition.imports.push(import.into());
        self
    }

    pub fn annotation(self, key: impl Into<Symbol>, value: Value) -> Self {
        self.definition.annotations.put(key, value);
        self
    }

    pub fn documentation(self, key: impl Into<Symbol>, value: Value) -> Self {
        self.definition.documentation.put(key, value);
        self
    }

    pub fn property(mut self, property: Property) -> Self {
        self.definition.properties.push(property);
        self
    }

    pub fn function(mut self, function: Function) -> Self {
        self.definition.functions.push(function);
        self
    }

    pub fn extends(mut self, parent: Arc<ClassDefinition>) -> Self {
        self.definition
            .annotations
            .put("extends", Value::string(parent.name.original()));
        self.definition.extends = Some(parent);
        self
    }

    pub fn implements(mut self, interface: Arc<InterfaceDefinition>) -> Self {
        let names: Vec<String> = self
            .definition
            .interfaces
            .iter()
            .chain(std::iter::once(&interface))
            .map(|i| i.name().to_string())
            .collect();
        self.definition
            .annotations
            .put("implements", Value::string(names.join(",")));
        self.definition.interfaces.push(interface);
        self
    }

    pub fn initializer<F>(mut self, body: F) -> Self
    where
        F: Fn(&ExecutionContext<'_>) -> RuntimeResult<()> + Send + Sync + 'static,
    {
        self.definition.initializer = Some(Arc::new(body));
        self
    }

    pub fn build(self) -> Arc<ClassDefinition> {
        Arc::new(self.definition)
    }
}
