//! Execution contexts.
//!
//! An [`ExecutionContext`] is one node of a parent-linked chain: the runtime
//! root, an application, a session, a request, a function call, a class
//! pseudo-constructor or a catch block. Children borrow their parent, so a
//! child can never outlive it, and the whole chain lives on the native stack
//! of the thread running it.
//!
//! Besides its kind, each context tracks four stacks of its own:
//! - **units**: templates and classes whose code is executing,
//! - **components**: structs describing active tag/component executions,
//! - **iterations**: cursors over queries being looped,
//! - **buffers**: output buffers; the bottom one is never popped.
//!
//! Resolution lives in `resolve`, calls in `invoke`, output in `buffer`.
//!
//! # Thread Safety
//! Contexts use `RefCell` and are `!Sync`. Each call chain owns its contexts;
//! everything they point at (scopes, values, the runtime) is shared safely.

mod buffer;
mod invoke;
mod kind;
mod resolve;

use std::cell::RefCell;
use std::sync::Arc;

use cinder_ir::Symbol;
use indexmap::IndexMap;
use rustc_hash::FxBuildHasher;
use smallvec::{smallvec, SmallVec};

use crate::application::{Application, Session};
use crate::class::ClassRef;
use crate::config::RuntimeConfig;
use crate::errors::{rethrow_outside_catch, unsupported_operation, RuntimeError, RuntimeResult};
use crate::runtime::Runtime;
use crate::scope::{Scope, ScopeName};
use crate::value::{Function, QueryRef, Value};

pub use buffer::OutputBuffer;
pub use kind::{ContextKind, ContextType, FunctionFrame, Template, Unit};
pub use resolve::ScopeSearchResult;

use kind::Cursor;

/// One node of the execution chain.
pub struct ExecutionContext<'p> {
    parent: Option<&'p ExecutionContext<'p>>,
    runtime: Arc<Runtime>,
    kind: ContextKind,
    call_depth: usize,
    units: RefCell<SmallVec<[Unit; 2]>>,
    components: RefCell<Vec<Scope>>,
    /// Keyed by query identity, in registration order.
    iterations: RefCell<IndexMap<usize, Cursor, FxBuildHasher>>,
    buffers: RefCell<SmallVec<[OutputBuffer; 1]>>,
}

impl ExecutionContext<'static> {
    /// Create a root context for `runtime`.
    pub fn root(runtime: Arc<Runtime>) -> Self {
        ExecutionContext::build(None, runtime, ContextKind::Runtime, 0)
    }
}

impl<'p> ExecutionContext<'p> {
    fn build(
        parent: Option<&'p ExecutionContext<'p>>,
        runtime: Arc<Runtime>,
        kind: ContextKind,
        call_depth: usize,
    ) -> Self {
        ExecutionContext {
            parent,
            runtime,
            kind,
            call_depth,
            units: RefCell::new(SmallVec::new()),
            components: RefCell::new(Vec::new()),
            iterations: RefCell::new(IndexMap::default()),
            buffers: RefCell::new(smallvec![OutputBuffer::new()]),
        }
    }

    /// Create a child context of the given kind.
    pub fn child(&self, kind: ContextKind) -> ExecutionContext<'_> {
        ExecutionContext::build(Some(self), Arc::clone(&self.runtime), kind, self.call_depth)
    }

    /// Child for an application, exposing its `application` scope.
    pub fn application_context(&self, application: Arc<Application>) -> ExecutionContext<'_> {
        self.child(ContextKind::Application(application))
    }

    /// Child for a session, exposing its `session` scope.
    pub fn session_context(&self, session: Arc<Session>) -> ExecutionContext<'_> {
        self.child(ContextKind::Session(session))
    }

    /// Child for one script run, with fresh `variables` and `request` scopes.
    pub fn request_context(&self) -> ExecutionContext<'_> {
        let order = self.config().default_scope_order;
        self.child(ContextKind::Request {
            variables: Scope::named(ScopeName::Variables, order),
            request: Scope::named(ScopeName::Request, order),
        })
    }

    /// Child for a catch block binding `variable` to `error`.
    pub fn catch_context(&self, variable: impl Into<Symbol>, error: RuntimeError) -> ExecutionContext<'_> {
        let data = error.to_struct();
        self.child(ContextKind::Catch {
            variable: variable.into(),
            error,
            data,
        })
    }

    #[inline]
    pub fn parent(&self) -> Option<&'p ExecutionContext<'p>> {
        self.parent
    }

    #[inline]
    pub fn kind(&self) -> &ContextKind {
        &self.kind
    }

    #[inline]
    pub fn runtime(&self) -> &Arc<Runtime> {
        &self.runtime
    }

    #[inline]
    pub fn call_depth(&self) -> usize {
        self.call_depth
    }

    pub fn config(&self) -> &RuntimeConfig {
        self.runtime.config()
    }

    /// A configuration setting by name.
    pub fn config_item(&self, key: &Symbol) -> Option<Value> {
        self.config().to_struct().get(key)
    }

    /// This context, then each parent up to the root.
    pub fn ancestors(&self) -> impl Iterator<Item = &ExecutionContext<'p>> {
        std::iter::successors(Some(self), |ctx| ctx.parent)
    }

    /// The nearest context (self included) of the given type.
    pub fn parent_of_type(&self, context_type: ContextType) -> Option<&ExecutionContext<'p>> {
        self.ancestors()
            .find(|ctx| ctx.kind.context_type() == context_type)
    }

    /// The instance whose code is running, if any.
    pub fn this_class(&self) -> Option<ClassRef> {
        self.ancestors().find_map(|ctx| match &ctx.kind {
            ContextKind::Function(frame) => frame.this.clone(),
            ContextKind::Class { instance } => Some(Arc::clone(instance)),
            _ => None,
        })
    }

    /// Name of the innermost function being executed.
    pub fn closest_function_name(&self) -> Option<Symbol> {
        self.ancestors().find_map(|ctx| match &ctx.kind {
            ContextKind::Function(frame) => Some(frame.called_name.clone()),
            _ => None,
        })
    }

    /// The error of the innermost catch block, to be raised again.
    pub fn rethrow(&self) -> RuntimeError {
        self.ancestors()
            .find_map(|ctx| match &ctx.kind {
                ContextKind::Catch { error, .. } => Some(error.clone()),
                _ => None,
            })
            .unwrap_or_else(rethrow_outside_catch)
    }

    /// Declare a function in the scope code running here defines into.
    pub fn register_function(&self, function: Function) -> RuntimeResult<()> {
        match &self.kind {
            ContextKind::Request { variables, .. } => {
                variables.put(function.name().clone(), Value::function(function));
                Ok(())
            }
            ContextKind::Function(frame) => {
                frame.local.put(function.name().clone(), Value::function(function));
                Ok(())
            }
            ContextKind::Class { instance } => {
                let name = function.name().clone();
                let public = function.access().is_public();
                let value = Value::function(function);
                if public {
                    instance.this_scope().put(name.clone(), value.clone());
                }
                instance.variables().put(name, value);
                Ok(())
            }
            ContextKind::Catch { .. } => match self.parent {
                Some(parent) => parent.register_function(function),
                None => Err(unsupported_operation("catch", "register functions")),
            },
            other => Err(unsupported_operation(
                other.context_type().as_str(),
                "register functions",
            )),
        }
    }

    // Units

    pub fn push_unit(&self, unit: Unit) {
        self.units.borrow_mut().push(unit);
    }

    pub fn pop_unit(&self) -> Option<Unit> {
        self.units.borrow_mut().pop()
    }

    /// Push `unit` until the returned guard is dropped.
    pub fn enter_unit(&self, unit: Unit) -> UnitGuard<'_, 'p> {
        self.push_unit(unit);
        UnitGuard { ctx: self }
    }

    /// The most recently entered unit, searching this context then its parents.
    pub fn find_closest_unit(&self) -> Option<Unit> {
        self.ancestors()
            .find_map(|ctx| ctx.units.borrow().last().cloned())
    }

    /// The first unit entered anywhere in the chain, closest to the root.
    pub fn find_base_unit(&self) -> Option<Unit> {
        self.parent
            .and_then(ExecutionContext::find_base_unit)
            .or_else(|| self.units.borrow().first().cloned())
    }

    /// Imports visible to the closest unit.
    pub fn current_imports(&self) -> Vec<String> {
        self.find_closest_unit()
            .map(|unit| unit.imports())
            .unwrap_or_default()
    }

    // Components

    pub fn push_component(&self, component: Scope) {
        self.components.borrow_mut().push(component);
    }

    pub fn pop_component(&self) -> Option<Scope> {
        self.components.borrow_mut().pop()
    }

    /// Active components of the whole chain, outermost first.
    pub fn components(&self) -> Vec<Scope> {
        let mut all = self.parent.map(ExecutionContext::components).unwrap_or_default();
        all.extend(self.components.borrow().iter().cloned());
        all
    }

    /// The nearest enclosing component called `name`.
    ///
    /// The innermost component (the one asking) is skipped.
    pub fn find_closest_component(&self, name: &Symbol) -> Option<Scope> {
        let key = Symbol::new("name");
        self.components()
            .into_iter()
            .rev()
            .skip(1)
            .find(|component| {
                component
                    .get(&key)
                    .and_then(|value| value.cast_string().ok())
                    .is_some_and(|text| name.matches(&text))
            })
    }

    // Iterations

    /// Start (or restart) iterating `query` at a 0-based row.
    pub fn register_iteration(&self, query: &QueryRef, row: usize) {
        let mut iterations = self.iterations.borrow_mut();
        iterations.shift_remove(&query.id());
        iterations.insert(
            query.id(),
            Cursor {
                query: query.clone(),
                row,
            },
        );
    }

    pub fn unregister_iteration(&self, query: &QueryRef) {
        self.iterations.borrow_mut().shift_remove(&query.id());
    }

    /// The 0-based row of `query`, or 0 if no context iterates it.
    pub fn current_row(&self, query: &QueryRef) -> usize {
        self.ancestors()
            .find_map(|ctx| ctx.iterations.borrow().get(&query.id()).map(|cursor| cursor.row))
            .unwrap_or(0)
    }

    /// Move `query` to its next row and return it.
    ///
    /// A query nobody iterates is registered here at row 1.
    pub fn advance(&self, query: &QueryRef) -> usize {
        for ctx in self.ancestors() {
            if let Some(cursor) = ctx.iterations.borrow_mut().get_mut(&query.id()) {
                cursor.row += 1;
                return cursor.row;
            }
        }
        self.register_iteration(query, 1);
        1
    }
}

/// Pops the entered unit when dropped.
pub struct UnitGuard<'a, 'p> {
    ctx: &'a ExecutionContext<'p>,
}

impl Drop for UnitGuard<'_, '_> {
    fn drop(&mut self) {
        self.ctx.pop_unit();
    }
}

#[cfg(test)]
mod tests;
