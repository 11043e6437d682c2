//! Member access on instances.

use std::sync::{Arc, Weak};

use cinder_ir::Symbol;

use crate::context::ExecutionContext;
use crate::errors::{key_not_found, method_not_found, missing_setter_argument, not_invocable, RuntimeResult};
use crate::reference::{introspect, miss, Referenceable};
use crate::scope::AssignHook;
use crate::value::{Arguments, Value};

use super::{ClassInstance, ClassRef};

impl Referenceable for ClassRef {
    fn dereference(&self, ctx: &ExecutionContext<'_>, key: &Symbol, safe: bool) -> RuntimeResult<Value> {
        let names = &ctx.runtime().names().class;
        if *key == names.meta {
            return Ok(Value::Struct(introspect(&Value::Instance(Arc::clone(self)))));
        }
        if let Some(value) = self.this.get(key) {
            return Ok(value);
        }
        // Declared properties read through the implicit getter, anchored at
        // the bottom class when accessors are on.
        if let Some(property) = self.property(key) {
            let bottom = self.bottom();
            let owner = if property.getter && bottom.accessors_enabled(names) {
                bottom
            } else {
                Arc::clone(self)
            };
            return Ok(owner.variables.get(key).unwrap_or(Value::Null));
        }
        miss(safe, key_not_found(key, format!("class [{}]", self.name())))
    }

    fn assign(&self, ctx: &ExecutionContext<'_>, key: &Symbol, value: Value) -> RuntimeResult<Value> {
        self.this.assign(ctx, key, value.clone())?;
        Ok(value)
    }

    /// Reached through `super`, an instance answers from its own
    /// `variables`, so base code sees base bindings.
    #[tracing::instrument(level = "trace", skip(self, ctx, args), fields(class = %self.name()))]
    fn dereference_and_invoke(
        &self,
        ctx: &ExecutionContext<'_>,
        key: &Symbol,
        args: Arguments,
        safe: bool,
    ) -> RuntimeResult<Value> {
        let scope = if self.child().is_some() {
            &self.variables
        } else {
            &self.this
        };
        if let Some(member) = scope.get(key) {
            return match member {
                Value::Function(function) => {
                    ctx.call_function(ctx, &function, key, args, Some(Arc::clone(self)))
                }
                other => miss(safe, not_invocable(key, other.type_name())),
            };
        }

        let names = &ctx.runtime().names().class;
        let bottom = self.bottom();
        if bottom.accessors_enabled(names) {
            let index = bottom.accessor_index();
            if let Some(property) = index.getters.get(key) {
                return Ok(bottom.variables.get(&property.name).unwrap_or(Value::Null));
            }
            if let Some(property) = index.setters.get(key) {
                let Some(value) = args.at_or_named(0, &property.name).cloned() else {
                    return miss(safe, missing_setter_argument(key));
                };
                bottom.variables.put(property.name.clone(), value);
                return Ok(Value::Instance(Arc::clone(self)));
            }
        }

        if let Some(Value::Function(handler)) = self.variables.get(&names.on_missing_method) {
            let hook_args = Arguments::named([
                (names.missing_method_name.clone(), Value::string(key.original())),
                (names.missing_method_arguments.clone(), args.to_value()),
            ]);
            return ctx.call_function(
                ctx,
                &handler,
                &names.on_missing_method,
                hook_args,
                Some(Arc::clone(self)),
            );
        }

        miss(safe, method_not_found(key, self.name()))
    }
}

/// Routes writes to a declared property through a user-written
/// `set<Name>` method, or through the implicit setter when accessors are on.
pub(super) struct PropertySetterHook {
    instance: Weak<ClassInstance>,
}

impl PropertySetterHook {
    pub(super) fn new(instance: Weak<ClassInstance>) -> Self {
        PropertySetterHook { instance }
    }
}

impl AssignHook for PropertySetterHook {
    fn assign(&self, ctx: &ExecutionContext<'_>, key: &Symbol, value: &Value) -> RuntimeResult<bool> {
        let Some(instance) = self.instance.upgrade() else {
            return Ok(false);
        };
        let Some(property) = instance.property(key) else {
            return Ok(false);
        };
        let setter = property.setter_name();
        if ctx.closest_function_name().is_some_and(|name| name == setter) {
            return Ok(false);
        }
        if let Some(Value::Function(function)) = instance.variables.get(&setter) {
            ctx.call_function(
                ctx,
                &function,
                &setter,
                Arguments::Positional(vec![value.clone()]),
                Some(Arc::clone(&instance)),
            )?;
            return Ok(true);
        }
        let bottom = instance.bottom();
        if property.setter && bottom.accessors_enabled(&ctx.runtime().names().class) {
            bottom.variables.put(key.clone(), value.clone());
            return Ok(true);
        }
        Ok(false)
    }
}
