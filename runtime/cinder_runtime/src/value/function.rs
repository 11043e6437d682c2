//! User-defined functions and call arguments.

use std::fmt;
use std::sync::Arc;

use cinder_ir::Symbol;
use indexmap::IndexMap;
use rustc_hash::FxBuildHasher;

use crate::context::ExecutionContext;
use crate::errors::{missing_argument, RuntimeResult};
use crate::scope::{Scope, ScopeName, ScopeOrder};

use super::Value;

/// Compiled function body. Receives the function's own context.
pub type FunctionBody = Arc<dyn Fn(&ExecutionContext<'_>) -> RuntimeResult<Value> + Send + Sync>;

/// Visibility of a function.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Access {
    #[default]
    Public,
    Private,
    Package,
    Remote,
}

impl Access {
    /// Public and remote functions are visible through `this`.
    pub fn is_public(self) -> bool {
        matches!(self, Access::Public | Access::Remote)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Access::Public => "public",
            Access::Private => "private",
            Access::Package => "package",
            Access::Remote => "remote",
        }
    }
}

/// A declared parameter.
#[derive(Clone, Debug)]
pub struct Param {
    pub name: Symbol,
    pub type_name: String,
    pub required: bool,
    pub default: Option<Value>,
}

impl Param {
    pub fn new(name: impl Into<Symbol>) -> Self {
        Param {
            name: name.into(),
            type_name: "any".to_string(),
            required: false,
            default: None,
        }
    }

    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    #[must_use]
    pub fn with_type(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = type_name.into();
        self
    }

    #[must_use]
    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }
}

/// A callable with its declaration metadata.
#[derive(Clone)]
pub struct Function {
    name: Symbol,
    access: Access,
    params: Vec<Param>,
    return_type: String,
    annotations: Scope,
    documentation: Scope,
    body: FunctionBody,
}

impl Function {
    pub fn new<F>(name: impl Into<Symbol>, body: F) -> Self
    where
        F: Fn(&ExecutionContext<'_>) -> RuntimeResult<Value> + Send + Sync + 'static,
    {
        Function {
            name: name.into(),
            access: Access::Public,
            params: Vec::new(),
            return_type: "any".to_string(),
            annotations: Scope::linked(),
            documentation: Scope::linked(),
            body: Arc::new(body),
        }
    }

    #[must_use]
    pub fn with_access(mut self, access: Access) -> Self {
        self.access = access;
        self
    }

    #[must_use]
    pub fn with_param(mut self, param: Param) -> Self {
        self.params.push(param);
        self
    }

    #[must_use]
    pub fn with_return_type(mut self, return_type: impl Into<String>) -> Self {
        self.return_type = return_type.into();
        self
    }

    #[must_use]
    pub fn with_annotation(self, key: impl Into<Symbol>, value: Value) -> Self {
        self.annotations.put(key, value);
        self
    }

    #[must_use]
    pub fn with_documentation(self, key: impl Into<Symbol>, value: Value) -> Self {
        self.documentation.put(key, value);
        self
    }

    #[inline]
    pub fn name(&self) -> &Symbol {
        &self.name
    }

    #[inline]
    pub fn access(&self) -> Access {
        self.access
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn annotations(&self) -> &Scope {
        &self.annotations
    }

    pub(crate) fn call(&self, ctx: &ExecutionContext<'_>) -> RuntimeResult<Value> {
        (self.body)(ctx)
    }

    /// Build the `arguments` scope for a call.
    ///
    /// Declared parameters bind by position or by name and fall back to
    /// their defaults. Surplus positional values are keyed by their 1-based
    /// position; surplus named values keep their names.
    pub fn bind_arguments(&self, args: Arguments) -> RuntimeResult<Scope> {
        let scope = Scope::named(ScopeName::Arguments, ScopeOrder::Linked);
        match args {
            Arguments::None => self.bind_positional(&scope, Vec::new())?,
            Arguments::Positional(values) => self.bind_positional(&scope, values)?,
            Arguments::Named(mut values) => {
                for param in &self.params {
                    let value = values.shift_remove(&param.name);
                    self.bind_one(&scope, param, value)?;
                }
                for (key, value) in values {
                    scope.put(key, value);
                }
            }
        }
        Ok(scope)
    }

    fn bind_positional(&self, scope: &Scope, values: Vec<Value>) -> RuntimeResult<()> {
        let mut values = values.into_iter();
        for param in &self.params {
            self.bind_one(scope, param, values.next())?;
        }
        for (offset, value) in values.enumerate() {
            let position = self.params.len() + offset + 1;
            scope.put(Symbol::from_int(i64::try_from(position).unwrap_or(i64::MAX)), value);
        }
        Ok(())
    }

    fn bind_one(&self, scope: &Scope, param: &Param, value: Option<Value>) -> RuntimeResult<()> {
        match value.or_else(|| param.default.clone()) {
            Some(value) => {
                scope.put(param.name.clone(), value);
                Ok(())
            }
            None if param.required => Err(missing_argument(&self.name, &param.name)),
            None => Ok(()),
        }
    }

    /// Declaration metadata as a sorted struct.
    pub fn metadata(&self) -> Scope {
        let meta = Scope::sorted();
        meta.put("name", Value::string(self.name.original()));
        meta.put("access", Value::string(self.access.as_str()));
        meta.put("returnType", Value::string(&self.return_type));
        let params: Vec<Value> = self
            .params
            .iter()
            .map(|param| {
                let entry = Scope::sorted();
                entry.put("name", Value::string(param.name.original()));
                entry.put("type", Value::string(&param.type_name));
                entry.put("required", Value::Bool(param.required));
                if let Some(default) = &param.default {
                    entry.put("default", default.clone());
                }
                Value::Struct(entry)
            })
            .collect();
        meta.put("parameters", Value::array(params));
        meta.put("annotations", Value::Struct(self.annotations.clone()));
        meta.put("documentation", Value::Struct(self.documentation.clone()));
        meta
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.name)
            .field("access", &self.access)
            .field("params", &self.params.len())
            .finish_non_exhaustive()
    }
}

/// Arguments passed to a call.
#[derive(Clone, Debug, Default)]
pub enum Arguments {
    #[default]
    None,
    Positional(Vec<Value>),
    Named(IndexMap<Symbol, Value, FxBuildHasher>),
}

impl Arguments {
    pub fn positional(values: impl IntoIterator<Item = Value>) -> Self {
        Arguments::Positional(values.into_iter().collect())
    }

    pub fn named<K: Into<Symbol>>(pairs: impl IntoIterator<Item = (K, Value)>) -> Self {
        Arguments::Named(pairs.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn len(&self) -> usize {
        match self {
            Arguments::None => 0,
            Arguments::Positional(values) => values.len(),
            Arguments::Named(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// First argument by position, or the first named one.
    pub fn first(&self) -> Option<&Value> {
        match self {
            Arguments::None => None,
            Arguments::Positional(values) => values.first(),
            Arguments::Named(values) => values.values().next(),
        }
    }

    /// The argument at a 0-based `position`, or the named one called `name`.
    pub fn at_or_named(&self, position: usize, name: &Symbol) -> Option<&Value> {
        match self {
            Arguments::None => None,
            Arguments::Positional(values) => values.get(position),
            Arguments::Named(values) => values.get(name),
        }
    }

    /// The arguments as a script value: an array or a struct.
    pub fn to_value(&self) -> Value {
        match self {
            Arguments::None => Value::array(Vec::new()),
            Arguments::Positional(values) => Value::array(values.clone()),
            Arguments::Named(values) => {
                let scope = Scope::linked();
                for (key, value) in values {
                    scope.put(key.clone(), value.clone());
                }
                Value::Struct(scope)
            }
        }
    }
}
