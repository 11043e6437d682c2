//! Runtime values.
//!
//! # Heap Handles
//!
//! Strings and functions live behind `Heap<T>`, whose constructor is private
//! to this module; use the factory methods on `Value` (`Value::string`,
//! `Value::function`, ...). Arrays, structs and queries are shared, mutable
//! handles (`ArrayRef`, `Scope`, `QueryRef`); instances are `ClassRef`.
//!
//! # Thread Safety
//!
//! Every variant is `Send + Sync`. Mutable containers use `parking_lot`
//! locks internally.

mod array;
mod function;
mod query;

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

pub use array::ArrayRef;
pub use function::{Access, Arguments, Function, FunctionBody, Param};
pub use query::{Query, QueryRef};

use crate::class::ClassRef;
use crate::errors::{cast_failure, RuntimeResult};
use crate::scope::Scope;

/// Reference-counted, immutable heap value.
pub struct Heap<T: ?Sized>(Arc<T>);

impl<T> Heap<T> {
    fn new(value: T) -> Self {
        Heap(Arc::new(value))
    }
}

impl<T: ?Sized> Heap<T> {
    /// Whether two handles point at the same allocation.
    pub fn ptr_eq(a: &Heap<T>, b: &Heap<T>) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }
}

impl<T: ?Sized> Clone for Heap<T> {
    fn clone(&self) -> Self {
        Heap(Arc::clone(&self.0))
    }
}

impl<T: ?Sized> Deref for Heap<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for Heap<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

/// A dynamically typed runtime value.
#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Heap<str>),
    Array(ArrayRef),
    Struct(Scope),
    Query(QueryRef),
    Function(Heap<Function>),
    Instance(ClassRef),
}

impl Value {
    pub fn string(text: impl AsRef<str>) -> Self {
        Value::Str(Heap(Arc::from(text.as_ref())))
    }

    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(ArrayRef::new(items))
    }

    pub fn function(function: Function) -> Self {
        Value::Function(Heap::new(function))
    }

    pub fn query(query: Query) -> Self {
        Value::Query(QueryRef::new(query))
    }

    /// Name of the value's runtime type, as shown in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Bool(_) => "Boolean",
            Value::Int(_) => "Integer",
            Value::Float(_) => "Double",
            Value::Str(_) => "String",
            Value::Array(_) => "Array",
            Value::Struct(_) => "Struct",
            Value::Query(_) => "Query",
            Value::Function(_) => "Function",
            Value::Instance(_) => "Class",
        }
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    #[inline]
    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Function(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&Heap<Function>> {
        match self {
            Value::Function(function) => Some(function),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&Scope> {
        match self {
            Value::Struct(scope) => Some(scope),
            _ => None,
        }
    }

    pub fn as_instance(&self) -> Option<&ClassRef> {
        match self {
            Value::Instance(instance) => Some(instance),
            _ => None,
        }
    }

    /// Render a simple value as text. Complex values cannot be cast.
    pub fn cast_string(&self) -> RuntimeResult<String> {
        match self {
            Value::Null => Ok(String::new()),
            Value::Bool(b) => Ok(b.to_string()),
            Value::Int(n) => Ok(n.to_string()),
            Value::Float(x) => Ok(format_float(*x)),
            Value::Str(text) => Ok(text.to_string()),
            other => Err(cast_failure(other.type_name(), "String")),
        }
    }

    /// Truthiness of a value: booleans, numbers, and `true/false/yes/no` strings.
    pub fn cast_bool(&self) -> RuntimeResult<bool> {
        match self {
            Value::Bool(b) => Ok(*b),
            Value::Int(n) => Ok(*n != 0),
            Value::Float(x) => Ok(*x != 0.0),
            Value::Str(text) => match text.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" => Ok(true),
                "false" | "no" | "" => Ok(false),
                other => other
                    .parse::<f64>()
                    .map(|x| x != 0.0)
                    .map_err(|_| cast_failure("String", "Boolean")),
            },
            other => Err(cast_failure(other.type_name(), "Boolean")),
        }
    }
}

/// Integral doubles print without a fractional part.
fn format_float(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.0}")
    } else {
        value.to_string()
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => **a == **b,
            (Value::Array(a), Value::Array(b)) => ArrayRef::ptr_eq(a, b),
            (Value::Struct(a), Value::Struct(b)) => Scope::ptr_eq(a, b),
            (Value::Query(a), Value::Query(b)) => QueryRef::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Heap::ptr_eq(a, b),
            (Value::Instance(a), Value::Instance(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Int(n) => write!(f, "Int({n})"),
            Value::Float(x) => write!(f, "Float({x})"),
            Value::Str(text) => write!(f, "Str({:?})", &**text),
            Value::Array(array) => write!(f, "Array(len={})", array.len()),
            Value::Struct(scope) => write!(f, "{scope:?}"),
            Value::Query(query) => write!(f, "Query(rows={})", query.read().len()),
            Value::Function(function) => write!(f, "Function({})", function.name()),
            Value::Instance(instance) => write!(f, "Instance({})", instance.name()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Array(array) => write!(f, "[Array of {}]", array.len()),
            Value::Struct(scope) => write!(f, "[Struct of {}]", scope.len()),
            Value::Query(query) => write!(f, "[Query of {} rows]", query.read().len()),
            Value::Function(function) => write!(f, "[Function {}]", function.name()),
            Value::Instance(instance) => write!(f, "[Class {}]", instance.name()),
            simple => match simple.cast_string() {
                Ok(text) => f.write_str(&text),
                Err(_) => Err(fmt::Error),
            },
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(i64::from(n))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Value::string(text)
    }
}

impl From<String> for Value {
    fn from(text: String) -> Self {
        Value::string(text)
    }
}

impl From<Scope> for Value {
    fn from(scope: Scope) -> Self {
        Value::Struct(scope)
    }
}

impl From<ArrayRef> for Value {
    fn from(array: ArrayRef) -> Self {
        Value::Array(array)
    }
}

impl From<ClassRef> for Value {
    fn from(instance: ClassRef) -> Self {
        Value::Instance(instance)
    }
}
