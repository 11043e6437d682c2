//! Execution core of the Cinder scripting runtime.
//!
//! Compiled scripts run against this crate: they resolve identifiers and
//! call functions through an [`ExecutionContext`], read and write members
//! of any value through the [`Referenceable`] protocol, build objects as
//! [`ClassInstance`]s, and publish lifecycle events on the
//! [`InterceptorBus`].
//!
//! # Architecture
//!
//! - [`Runtime`]: process-wide state, built once and shared through `Arc`.
//! - [`ExecutionContext`]: a parent-linked chain of contexts (runtime,
//!   application, session, request, function, class, catch) that lives on
//!   the native stack of the thread running a script.
//! - [`Scope`]: the case-insensitive, thread-safe map behind every
//!   variable scope and struct.
//! - [`Value`]: the dynamic value model. Containers are shared handles.
//!
//! Identifiers are [`Symbol`]s from `cinder_ir`.

mod application;
mod builtins;
mod class;
mod config;
mod context;
pub mod errors;
mod interceptor;
mod names;
mod output;
mod reference;
mod runtime;
mod scope;
mod stack;
mod value;

pub use cinder_ir::{SharedSymbolTable, Symbol, SymbolOrigin, SymbolTable};

pub use application::{Application, Session};
pub use builtins::{Builtin, BuiltinHandler, BuiltinRegistry};
pub use class::{
    ClassDefinition, ClassDefinitionBuilder, ClassInstance, ClassRef, ClassState, Initializer,
    InterfaceDefinition, Property,
};
pub use config::{RuntimeConfig, DEFAULT_MAX_CALL_DEPTH};
pub use context::{
    ContextKind, ContextType, ExecutionContext, FunctionFrame, OutputBuffer, ScopeSearchResult,
    Template, Unit, UnitGuard,
};
pub use errors::{ErrorKind, RuntimeError, RuntimeResult};
pub use interceptor::{
    points, Interceptor, InterceptorBus, InterceptorHandle, InterceptorState, LoggingInterceptor,
};
pub use names::{CallPointNames, ClassNames, IterationNames, KnownSymbols};
pub use output::{buffer_sink, silent_sink, stdout_sink, OutputSink, SharedOutputSink};
pub use reference::{introspect, miss, Referenceable};
pub use runtime::{Runtime, RuntimeBuilder, VERSION};
pub use scope::{AssignHook, Scope, ScopeName, ScopeOrder};
pub use stack::ensure_sufficient_stack;
pub use value::{
    Access, Arguments, ArrayRef, Function, FunctionBody, Heap, Param, Query, QueryRef, Value,
};

use std::sync::Once;

static TRACING_INIT: Once = Once::new();

/// Install a `tracing` subscriber driven by `RUST_LOG`.
///
/// Does nothing when `RUST_LOG` is unset, when called again, or when the
/// embedder already installed a global subscriber.
///
/// ```bash
/// RUST_LOG=cinder_runtime=debug my-embedder script.cfm
/// RUST_LOG=cinder_runtime::context=trace my-embedder script.cfm
/// ```
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        if std::env::var("RUST_LOG").is_ok() {
            let filter = EnvFilter::from_default_env();
            let installed = tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_level(true))
                .with(filter)
                .try_init();
            if installed.is_err() {
                tracing::debug!("a global tracing subscriber is already installed");
            }
        }
    });
}
