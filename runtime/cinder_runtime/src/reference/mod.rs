//! Dynamic reference protocol.
//!
//! Every `a.b`, `a[b]` and `a.b()` in generated code goes through
//! [`Referenceable`], whatever `a` is. Implementations check, in order:
//! 1. the meta symbol `$bx`, which yields an introspection struct,
//! 2. an own member of that name (invoked if callable, `NotInvocable` if not),
//! 3. synthesized accessors (classes only),
//! 4. a user-defined missing-member hook (classes only),
//! 5. otherwise a failure, or null when `safe`.
//!
//! `safe` only converts lookup failures at this level. Errors raised by an
//! invoked body, and structural errors, always propagate.

use cinder_ir::Symbol;

use crate::context::ExecutionContext;
use crate::errors::{function_not_found, key_not_found, not_invocable, RuntimeError, RuntimeResult};
use crate::scope::Scope;
use crate::value::{ArrayRef, Arguments, QueryRef, Value};

/// Get, set and invoke members by name.
pub trait Referenceable {
    /// Read a member.
    fn dereference(&self, ctx: &ExecutionContext<'_>, key: &Symbol, safe: bool) -> RuntimeResult<Value>;

    /// Write a member. Returns the value the expression evaluates to.
    fn assign(&self, ctx: &ExecutionContext<'_>, key: &Symbol, value: Value) -> RuntimeResult<Value>;

    /// Call a member.
    fn dereference_and_invoke(
        &self,
        ctx: &ExecutionContext<'_>,
        key: &Symbol,
        args: Arguments,
        safe: bool,
    ) -> RuntimeResult<Value>;
}

/// Turn a lookup failure into null when `safe`. Structural errors stay.
pub fn miss(safe: bool, error: RuntimeError) -> RuntimeResult<Value> {
    if safe && !error.is_structural() {
        Ok(Value::Null)
    } else {
        Err(error)
    }
}

/// The struct returned for the meta symbol.
pub fn introspect(value: &Value) -> Scope {
    let data = Scope::sorted();
    data.put("type", Value::string(value.type_name()));
    let meta = match value {
        Value::Function(function) => function.metadata(),
        Value::Instance(instance) => instance.describe(),
        Value::Struct(scope) => length_meta(scope.len()),
        Value::Array(array) => length_meta(array.len()),
        Value::Query(query) => {
            let meta = length_meta(query.read().len());
            meta.put("columnList", Value::string(query.read().column_list()));
            meta
        }
        _ => Scope::sorted(),
    };
    data.put("meta", Value::Struct(meta));
    data
}

fn length_meta(length: usize) -> Scope {
    let meta = Scope::sorted();
    meta.put("length", Value::Int(i64::try_from(length).unwrap_or(i64::MAX)));
    meta
}

fn is_meta(ctx: &ExecutionContext<'_>, key: &Symbol) -> bool {
    *key == ctx.runtime().names().class.meta
}

/// Invoke a member value found by name; `NotInvocable` when it is not a function.
pub(crate) fn invoke_member(
    ctx: &ExecutionContext<'_>,
    key: &Symbol,
    member: &Value,
    args: Arguments,
    safe: bool,
) -> RuntimeResult<Value> {
    match member {
        Value::Function(function) => ctx.call_function(ctx, function, key, args, None),
        other => miss(safe, not_invocable(key, other.type_name())),
    }
}

impl Referenceable for Scope {
    fn dereference(&self, ctx: &ExecutionContext<'_>, key: &Symbol, safe: bool) -> RuntimeResult<Value> {
        if is_meta(ctx, key) {
            return Ok(Value::Struct(introspect(&Value::Struct(self.clone()))));
        }
        match self.get(key) {
            Some(value) => Ok(value),
            None => miss(safe, key_not_found(key, self.describe())),
        }
    }

    fn assign(&self, ctx: &ExecutionContext<'_>, key: &Symbol, value: Value) -> RuntimeResult<Value> {
        Scope::assign(self, ctx, key, value.clone())?;
        Ok(value)
    }

    fn dereference_and_invoke(
        &self,
        ctx: &ExecutionContext<'_>,
        key: &Symbol,
        args: Arguments,
        safe: bool,
    ) -> RuntimeResult<Value> {
        match self.get(key) {
            Some(member) => invoke_member(ctx, key, &member, args, safe),
            None => miss(safe, function_not_found(key)),
        }
    }
}

impl Referenceable for ArrayRef {
    fn dereference(&self, ctx: &ExecutionContext<'_>, key: &Symbol, safe: bool) -> RuntimeResult<Value> {
        if is_meta(ctx, key) {
            return Ok(Value::Struct(introspect(&Value::Array(self.clone()))));
        }
        match ArrayRef::position_of(key).and_then(|position| self.get(position)) {
            Some(value) => Ok(value),
            None => miss(safe, key_not_found(key, "the array")),
        }
    }

    fn assign(&self, _ctx: &ExecutionContext<'_>, key: &Symbol, value: Value) -> RuntimeResult<Value> {
        match ArrayRef::position_of(key) {
            Some(position) if self.set(position, value.clone()) => Ok(value),
            _ => Err(key_not_found(key, "the array")),
        }
    }

    fn dereference_and_invoke(
        &self,
        ctx: &ExecutionContext<'_>,
        key: &Symbol,
        args: Arguments,
        safe: bool,
    ) -> RuntimeResult<Value> {
        match ArrayRef::position_of(key).and_then(|position| self.get(position)) {
            Some(member) => invoke_member(ctx, key, &member, args, safe),
            None => miss(safe, function_not_found(key)),
        }
    }
}

impl Referenceable for QueryRef {
    /// Columns read the cell at the current row of the iteration, if any.
    fn dereference(&self, ctx: &ExecutionContext<'_>, key: &Symbol, safe: bool) -> RuntimeResult<Value> {
        if is_meta(ctx, key) {
            return Ok(Value::Struct(introspect(&Value::Query(self.clone()))));
        }
        let names = &ctx.runtime().names().iteration;
        let row = ctx.current_row(self);
        let query = self.read();
        let found = if *key == names.record_count {
            Some(Value::Int(i64::try_from(query.len()).unwrap_or(i64::MAX)))
        } else if *key == names.current_row {
            Some(Value::Int(i64::try_from(row + 1).unwrap_or(i64::MAX)))
        } else if *key == names.column_list {
            Some(Value::string(query.column_list()))
        } else {
            query.cell(key, row)
        };
        match found {
            Some(value) => Ok(value),
            None => miss(safe, key_not_found(key, "the query")),
        }
    }

    fn assign(&self, ctx: &ExecutionContext<'_>, key: &Symbol, value: Value) -> RuntimeResult<Value> {
        let row = ctx.current_row(self);
        if self.write().set_cell(key, row, value.clone()) {
            Ok(value)
        } else {
            Err(key_not_found(key, "the query"))
        }
    }

    fn dereference_and_invoke(
        &self,
        _ctx: &ExecutionContext<'_>,
        key: &Symbol,
        _args: Arguments,
        safe: bool,
    ) -> RuntimeResult<Value> {
        miss(safe, function_not_found(key))
    }
}

impl Referenceable for Value {
    fn dereference(&self, ctx: &ExecutionContext<'_>, key: &Symbol, safe: bool) -> RuntimeResult<Value> {
        match self {
            Value::Struct(scope) => scope.dereference(ctx, key, safe),
            Value::Array(array) => array.dereference(ctx, key, safe),
            Value::Query(query) => query.dereference(ctx, key, safe),
            Value::Instance(instance) => instance.dereference(ctx, key, safe),
            scalar if is_meta(ctx, key) => Ok(Value::Struct(introspect(scalar))),
            scalar => miss(safe, key_not_found(key, format!("a value of type {}", scalar.type_name()))),
        }
    }

    fn assign(&self, ctx: &ExecutionContext<'_>, key: &Symbol, value: Value) -> RuntimeResult<Value> {
        match self {
            Value::Struct(scope) => Referenceable::assign(scope, ctx, key, value),
            Value::Array(array) => array.assign(ctx, key, value),
            Value::Query(query) => query.assign(ctx, key, value),
            Value::Instance(instance) => Referenceable::assign(instance, ctx, key, value),
            scalar => Err(key_not_found(key, format!("a value of type {}", scalar.type_name()))),
        }
    }

    fn dereference_and_invoke(
        &self,
        ctx: &ExecutionContext<'_>,
        key: &Symbol,
        args: Arguments,
        safe: bool,
    ) -> RuntimeResult<Value> {
        match self {
            Value::Struct(scope) => scope.dereference_and_invoke(ctx, key, args, safe),
            Value::Array(array) => array.dereference_and_invoke(ctx, key, args, safe),
            Value::Query(query) => query.dereference_and_invoke(ctx, key, args, safe),
            Value::Instance(instance) => instance.dereference_and_invoke(ctx, key, args, safe),
            _ => miss(safe, function_not_found(key)),
        }
    }
}
