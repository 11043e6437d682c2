//! What a context represents, and the units and cursors it tracks.

use std::fmt;
use std::sync::Arc;

use cinder_ir::Symbol;

use crate::application::{Application, Session};
use crate::class::ClassRef;
use crate::errors::RuntimeError;
use crate::scope::Scope;
use crate::value::{Function, Heap, QueryRef};

/// The state of one function call.
#[derive(Clone)]
pub struct FunctionFrame {
    pub function: Heap<Function>,
    /// The name the function was called by, which may be an alias.
    pub called_name: Symbol,
    pub local: Scope,
    pub arguments: Scope,
    /// The instance a method runs against.
    pub this: Option<ClassRef>,
}

/// The role of a context in the chain.
#[derive(Clone)]
pub enum ContextKind {
    /// The root; exposes the `server` scope.
    Runtime,
    Application(Arc<Application>),
    Session(Arc<Session>),
    /// One script run.
    Request { variables: Scope, request: Scope },
    Function(FunctionFrame),
    /// A class pseudo-constructor.
    Class { instance: ClassRef },
    /// A catch block; `variable` is bound to `data`.
    Catch {
        variable: Symbol,
        error: RuntimeError,
        data: Scope,
    },
}

impl ContextKind {
    pub fn context_type(&self) -> ContextType {
        match self {
            ContextKind::Runtime => ContextType::Runtime,
            ContextKind::Application(_) => ContextType::Application,
            ContextKind::Session(_) => ContextType::Session,
            ContextKind::Request { .. } => ContextType::Request,
            ContextKind::Function(_) => ContextType::Function,
            ContextKind::Class { .. } => ContextType::Class,
            ContextKind::Catch { .. } => ContextType::Catch,
        }
    }
}

impl fmt::Debug for ContextKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextKind::Application(app) => write!(f, "Application({})", app.name()),
            ContextKind::Session(session) => write!(f, "Session({})", session.id()),
            ContextKind::Function(frame) => write!(f, "Function({})", frame.called_name),
            ContextKind::Class { instance } => write!(f, "Class({})", instance.name()),
            ContextKind::Catch { variable, .. } => write!(f, "Catch({variable})"),
            other => f.write_str(other.context_type().as_str()),
        }
    }
}

/// Context roles, for `parent_of_type`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ContextType {
    Runtime,
    Application,
    Session,
    Request,
    Function,
    Class,
    Catch,
}

impl ContextType {
    pub fn as_str(self) -> &'static str {
        match self {
            ContextType::Runtime => "runtime",
            ContextType::Application => "application",
            ContextType::Session => "session",
            ContextType::Request => "request",
            ContextType::Function => "function",
            ContextType::Class => "class",
            ContextType::Catch => "catch",
        }
    }
}

/// A loaded template.
#[derive(Clone, Debug, Default)]
pub struct Template {
    pub path: String,
    pub imports: Vec<String>,
}

impl Template {
    pub fn new(path: impl Into<String>) -> Self {
        Template {
            path: path.into(),
            imports: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_import(mut self, import: impl Into<String>) -> Self {
        self.imports.push(import.into());
        self
    }
}

/// Compiled code currently executing: a template or a class.
#[derive(Clone)]
pub enum Unit {
    Template(Arc<Template>),
    Class(ClassRef),
}

impl Unit {
    pub fn path(&self) -> String {
        match self {
            Unit::Template(template) => template.path.clone(),
            Unit::Class(instance) => instance.definition().path().to_string(),
        }
    }

    pub fn imports(&self) -> Vec<String> {
        match self {
            Unit::Template(template) => template.imports.clone(),
            Unit::Class(instance) => instance.definition().imports().to_vec(),
        }
    }

    pub fn as_class(&self) -> Option<&ClassRef> {
        match self {
            Unit::Class(instance) => Some(instance),
            Unit::Template(_) => None,
        }
    }
}

impl fmt::Debug for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unit::Template(template) => write!(f, "Template({})", template.path),
            Unit::Class(instance) => write!(f, "Class({})", instance.name()),
        }
    }
}

/// Position of an active iteration over a query. Rows are 0-based.
#[derive(Clone, Debug)]
pub(crate) struct Cursor {
    pub(crate) query: QueryRef,
    pub(crate) row: usize,
}
