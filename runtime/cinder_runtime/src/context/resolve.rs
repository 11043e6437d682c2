//! Identifier resolution.
//!
//! Nearby search looks at, in order:
//! 1. active query iterations (most recent first),
//! 2. the context's own lexical scopes, in the kind's priority order,
//! 3. the scope names the context exposes (`local`, `variables`, ...),
//! 4. the parent, unless `shallow`.
//!
//! Function calls delegate to their declaring context with another nearby
//! search. Methods and pseudo-constructors delegate with a transcendent
//! search, so a caller's variables never leak into class code.
//!
//! Transcendent search only answers global scope names (`request`,
//! `session`, `application`, `server`) anywhere up the chain.

use cinder_ir::Symbol;
use smallvec::SmallVec;

use crate::errors::{scope_not_found, symbol_not_found, RuntimeResult};
use crate::scope::{Scope, ScopeName};
use crate::value::Value;

use super::{ContextKind, ExecutionContext};

/// Outcome of a resolution.
///
/// `scope` is the scope holding the binding, or the default scope on a
/// miss. `value` is absent on a miss.
#[derive(Clone, Debug, Default)]
pub struct ScopeSearchResult {
    pub scope: Option<Scope>,
    pub value: Option<Value>,
}

impl ScopeSearchResult {
    fn found(scope: Option<Scope>, value: Value) -> Self {
        ScopeSearchResult {
            scope,
            value: Some(value),
        }
    }

    pub fn is_found(&self) -> bool {
        self.value.is_some()
    }

    /// The value, or null on a miss.
    pub fn value_or_null(self) -> Value {
        self.value.unwrap_or(Value::Null)
    }
}

impl ExecutionContext<'_> {
    /// Resolve an identifier the way an unqualified read in code does.
    ///
    /// On a miss, returns `default` with no value when one is given, and
    /// fails with `SymbolNotFound` otherwise.
    #[tracing::instrument(level = "trace", skip(self, default), fields(kind = ?self.kind))]
    pub fn resolve_nearby(
        &self,
        name: &Symbol,
        default: Option<&Scope>,
        shallow: bool,
    ) -> RuntimeResult<ScopeSearchResult> {
        match self.search_nearby(name, shallow) {
            Some(found) => Ok(found),
            None => miss(name, default),
        }
    }

    /// Resolve against globally visible scope names only.
    pub fn resolve_global(
        &self,
        name: &Symbol,
        default: Option<&Scope>,
    ) -> RuntimeResult<ScopeSearchResult> {
        match self.search_global(name) {
            Some(found) => Ok(found),
            None => miss(name, default),
        }
    }

    /// The value of `name`; with `safe`, null instead of a resolution error.
    pub fn lookup(&self, name: &Symbol, safe: bool) -> RuntimeResult<Value> {
        match self.resolve_nearby(name, None, false) {
            Ok(found) => Ok(found.value_or_null()),
            Err(error) if safe && !error.is_structural() => Ok(Value::Null),
            Err(error) => Err(error),
        }
    }

    /// A global scope (`request`, `session`, `application`, `server`) by name.
    pub fn get_scope(&self, name: &Symbol) -> RuntimeResult<Scope> {
        self.ancestors()
            .find_map(|ctx| ctx.global_scope(name))
            .ok_or_else(|| scope_not_found(name))
    }

    /// Any scope the context (or, unless `shallow`, an ancestor) names.
    pub fn get_scope_nearby(&self, name: &Symbol, shallow: bool) -> RuntimeResult<Scope> {
        if let Some(scope) = self.named_scope(name) {
            return Ok(scope);
        }
        match self.parent {
            Some(parent) if !shallow => parent.get_scope_nearby(name, false),
            _ => Err(scope_not_found(name)),
        }
    }

    /// Where an unqualified assignment lands when the name is not yet bound.
    pub fn default_assignment_scope(&self) -> Scope {
        match &self.kind {
            ContextKind::Request { variables, .. } => variables.clone(),
            ContextKind::Function(frame) => frame.local.clone(),
            ContextKind::Class { instance } => instance.variables().clone(),
            ContextKind::Application(application) => application.scope(),
            ContextKind::Session(session) => session.scope().clone(),
            ContextKind::Runtime => self.runtime.server_scope().clone(),
            ContextKind::Catch { .. } => match self.parent {
                Some(parent) => parent.default_assignment_scope(),
                None => self.runtime.server_scope().clone(),
            },
        }
    }

    /// Assign to `name` wherever it is bound, or to the default scope.
    pub fn assign_nearby(&self, name: &Symbol, value: Value) -> RuntimeResult<Value> {
        let fallback = self.default_assignment_scope();
        let found = self.resolve_nearby(name, Some(&fallback), false)?;
        let target = found.scope.unwrap_or(fallback);
        target.assign(self, name, value.clone())?;
        Ok(value)
    }

    pub(super) fn search_nearby(&self, name: &Symbol, shallow: bool) -> Option<ScopeSearchResult> {
        if let Some(found) = self.search_iterations(name) {
            return Some(found);
        }
        for scope in self.lexical_scopes() {
            if let Some(value) = scope.get(name) {
                return Some(ScopeSearchResult::found(Some(scope), value));
            }
        }
        if let Some(value) = self.named_value(name) {
            return Some(ScopeSearchResult::found(None, value));
        }
        if shallow {
            return None;
        }
        let parent = self.parent?;
        if self.runs_class_code() {
            parent.search_global(name)
        } else {
            parent.search_nearby(name, false)
        }
    }

    fn search_global(&self, name: &Symbol) -> Option<ScopeSearchResult> {
        self.ancestors()
            .find_map(|ctx| ctx.global_scope(name))
            .map(|scope| ScopeSearchResult::found(None, Value::Struct(scope)))
    }

    /// Synthetic names and columns of the active iterations, newest first.
    ///
    /// The synthetic names always come from the newest cursor.
    fn search_iterations(&self, name: &Symbol) -> Option<ScopeSearchResult> {
        let iterations = self.iterations.borrow();
        let names = &self.runtime.names().iteration;
        let mut cursors = iterations.values().rev();
        let newest = cursors.next()?;
        let query = newest.query.read();
        let synthetic = if *name == names.record_count {
            Some(Value::Int(i64::try_from(query.len()).unwrap_or(i64::MAX)))
        } else if *name == names.current_row {
            Some(Value::Int(i64::try_from(newest.row + 1).unwrap_or(i64::MAX)))
        } else if *name == names.column_list {
            Some(Value::string(query.column_list()))
        } else {
            query.cell(name, newest.row)
        };
        drop(query);
        if let Some(value) = synthetic {
            return Some(ScopeSearchResult::found(None, value));
        }
        cursors
            .find_map(|cursor| cursor.query.read().cell(name, cursor.row))
            .map(|value| ScopeSearchResult::found(None, value))
    }

    /// Scopes searched for bare identifiers, highest priority first.
    fn lexical_scopes(&self) -> SmallVec<[Scope; 3]> {
        let mut scopes = SmallVec::new();
        match &self.kind {
            ContextKind::Request { variables, .. } => scopes.push(variables.clone()),
            ContextKind::Function(frame) => {
                scopes.push(frame.local.clone());
                scopes.push(frame.arguments.clone());
                if let Some(instance) = &frame.this {
                    scopes.push(instance.variables().clone());
                }
            }
            ContextKind::Class { instance } => scopes.push(instance.variables().clone()),
            _ => {}
        }
        scopes
    }

    /// Methods and pseudo-constructors.
    fn runs_class_code(&self) -> bool {
        match &self.kind {
            ContextKind::Function(frame) => frame.this.is_some(),
            ContextKind::Class { .. } => true,
            _ => false,
        }
    }

    /// Values this context exposes by name: its scopes, `this`, `super` and
    /// the catch variable.
    fn named_value(&self, name: &Symbol) -> Option<Value> {
        let class_names = &self.runtime.names().class;
        match &self.kind {
            ContextKind::Catch { variable, data, .. } if variable == name => {
                return Some(Value::Struct(data.clone()));
            }
            ContextKind::Function(frame) => {
                if let Some(instance) = &frame.this {
                    if ScopeName::from_symbol(name) == Some(ScopeName::This) {
                        return Some(Value::Instance(instance.clone()));
                    }
                    if *name == class_names.super_ {
                        return instance.parent().map(Value::Instance);
                    }
                }
            }
            ContextKind::Class { instance } => {
                if ScopeName::from_symbol(name) == Some(ScopeName::This) {
                    return Some(Value::Instance(instance.clone()));
                }
                if *name == class_names.super_ {
                    return instance.parent().map(Value::Instance);
                }
            }
            _ => {}
        }
        self.named_scope(name).map(Value::Struct)
    }

    /// Scopes this context exposes by name.
    fn named_scope(&self, name: &Symbol) -> Option<Scope> {
        let scope_name = ScopeName::from_symbol(name)?;
        match (&self.kind, scope_name) {
            (ContextKind::Request { variables, .. }, ScopeName::Variables) => Some(variables.clone()),
            (ContextKind::Function(frame), ScopeName::Local) => Some(frame.local.clone()),
            (ContextKind::Function(frame), ScopeName::Arguments) => Some(frame.arguments.clone()),
            (ContextKind::Function(frame), ScopeName::Variables) => {
                frame.this.as_ref().map(|instance| instance.variables().clone())
            }
            (ContextKind::Function(frame), ScopeName::This) => {
                frame.this.as_ref().map(|instance| instance.this_scope().clone())
            }
            (ContextKind::Function(frame), ScopeName::Static) => {
                frame.this.as_ref().map(|instance| instance.static_scope().clone())
            }
            (ContextKind::Class { instance }, ScopeName::Variables) => Some(instance.variables().clone()),
            (ContextKind::Class { instance }, ScopeName::This) => Some(instance.this_scope().clone()),
            (ContextKind::Class { instance }, ScopeName::Static) => Some(instance.static_scope().clone()),
            _ => self.global_scope(name),
        }
    }

    /// Scopes visible regardless of nesting.
    fn global_scope(&self, name: &Symbol) -> Option<Scope> {
        let scope_name = ScopeName::from_symbol(name)?;
        match (&self.kind, scope_name) {
            (ContextKind::Request { request, .. }, ScopeName::Request) => Some(request.clone()),
            (ContextKind::Session(session), ScopeName::Session) => Some(session.scope().clone()),
            (ContextKind::Application(application), ScopeName::Application) => {
                Some(application.scope())
            }
            (ContextKind::Runtime, ScopeName::Server) => Some(self.runtime.server_scope().clone()),
            _ => None,
        }
    }
}

fn miss(name: &Symbol, default: Option<&Scope>) -> RuntimeResult<ScopeSearchResult> {
    match default {
        Some(scope) => Ok(ScopeSearchResult {
            scope: Some(scope.clone()),
            value: None,
        }),
        None => Err(symbol_not_found(name)),
    }
}
