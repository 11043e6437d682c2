//! Function invocation.

use cinder_ir::Symbol;

use crate::class::ClassRef;
use crate::errors::{function_not_found, not_invocable, stack_overflow, RuntimeResult};
use crate::scope::{Scope, ScopeName};
use crate::stack::ensure_sufficient_stack;
use crate::value::{Arguments, Function, Heap, Value};

use super::{ContextKind, ExecutionContext, FunctionFrame, Unit};

impl<'p> ExecutionContext<'p> {
    /// Call a function by name.
    ///
    /// Built-ins win over user functions. Otherwise the name is resolved
    /// with a nearby search and must name a function.
    pub fn invoke(&self, name: &Symbol, args: Arguments) -> RuntimeResult<Value> {
        if let Some(builtin) = self.runtime.builtins().get(name) {
            return builtin.call(self, args);
        }
        let found = self
            .search_nearby(name, false)
            .and_then(|found| found.value);
        match found {
            Some(Value::Function(function)) => self.call_function(
                self.function_parent(),
                &function,
                name,
                args,
                self.this_class(),
            ),
            _ => Err(function_not_found(name)),
        }
    }

    pub fn invoke_positional(&self, name: &Symbol, args: Vec<Value>) -> RuntimeResult<Value> {
        self.invoke(name, Arguments::Positional(args))
    }

    pub fn invoke_named<K: Into<Symbol>>(
        &self,
        name: &Symbol,
        args: impl IntoIterator<Item = (K, Value)>,
    ) -> RuntimeResult<Value> {
        self.invoke(name, Arguments::named(args))
    }

    /// Call a function value (a closure or a function passed around as data).
    pub fn invoke_value(&self, value: &Value, args: Arguments) -> RuntimeResult<Value> {
        match value {
            Value::Function(function) => {
                self.call_function(self, function, function.name(), args, self.this_class())
            }
            other => Err(not_invocable(&Symbol::new("<value>"), other.type_name())),
        }
    }

    /// Run `function` in a new function context under `parent`.
    ///
    /// The call is one level deeper than this context. `this` makes the call
    /// a method: the instance's scopes become visible and the instance is
    /// entered as the active unit.
    ///
    /// `parent` decides what the body can see. Its output goes to this
    /// context's top buffer when the call returns.
    #[tracing::instrument(level = "debug", skip_all, fields(function = %called_name, depth = self.call_depth + 1))]
    pub fn call_function(
        &self,
        parent: &ExecutionContext<'_>,
        function: &Heap<Function>,
        called_name: &Symbol,
        args: Arguments,
        this: Option<ClassRef>,
    ) -> RuntimeResult<Value> {
        let depth = self.call_depth + 1;
        if let Some(limit) = self.config().max_call_depth {
            if depth > limit {
                return Err(stack_overflow(limit));
            }
        }

        let arguments = function.bind_arguments(args)?;
        let frame = FunctionFrame {
            function: function.clone(),
            called_name: called_name.clone(),
            local: Scope::named(ScopeName::Local, self.config().default_scope_order),
            arguments,
            this,
        };
        let ctx = ExecutionContext::build(
            Some(parent),
            std::sync::Arc::clone(&self.runtime),
            ContextKind::Function(frame),
            depth,
        );
        let _unit = ctx.frame_instance().map(|instance| ctx.enter_unit(Unit::Class(instance)));

        let bus = self.runtime.interceptors();
        let points = &self.runtime.names().points;
        bus.announce_with(&points.pre_function_invoke, || ctx.call_data(None))?;

        let result = ensure_sufficient_stack(|| function.call(&ctx));
        ctx.flush_into(self);
        match result {
            Ok(value) => {
                bus.announce_with(&points.post_function_invoke, || ctx.call_data(Some(&value)))?;
                Ok(value)
            }
            Err(error) => {
                let announced = bus.announce_with(&points.on_exception, || {
                    let data = ctx.call_data(None);
                    data.put("exception", Value::Struct(error.to_struct()));
                    data
                });
                if let Err(failure) = announced {
                    tracing::warn!(error = %failure, "onException interceptor failed");
                }
                Err(error.with_note(format!("in function [{called_name}]")))
            }
        }
    }

    /// The context a plain function call hangs under: the nearest context
    /// that is not itself a function call.
    pub(crate) fn function_parent(&self) -> &ExecutionContext<'_> {
        match (&self.kind, self.parent) {
            (ContextKind::Function(_), Some(parent)) => parent.function_parent(),
            _ => self,
        }
    }

    fn frame_instance(&self) -> Option<ClassRef> {
        match &self.kind {
            ContextKind::Function(frame) => frame.this.clone(),
            _ => None,
        }
    }

    /// Interception data for the call running in this context.
    fn call_data(&self, result: Option<&Value>) -> Scope {
        let data = Scope::linked();
        if let ContextKind::Function(frame) = &self.kind {
            data.put("name", Value::string(frame.called_name.original()));
            data.put("function", Value::Function(frame.function.clone()));
            data.put("arguments", Value::Struct(frame.arguments.clone()));
        }
        if let Some(value) = result {
            data.put("result", value.clone());
        }
        data
    }
}
