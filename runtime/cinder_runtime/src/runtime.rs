//! The runtime: process-wide state shared by every execution context.
//!
//! A [`Runtime`] owns configuration, the symbol table and pre-interned
//! names, the interceptor bus, built-ins, the `server` scope, applications
//! and the output sink. It is always held in an `Arc`; contexts clone the
//! handle, never the state.

use std::sync::Arc;

use cinder_ir::{SharedSymbolTable, Symbol, SymbolTable};
use dashmap::DashMap;
use rayon::prelude::*;

use crate::application::Application;
use crate::builtins::BuiltinRegistry;
use crate::config::RuntimeConfig;
use crate::context::ExecutionContext;
use crate::errors::RuntimeResult;
use crate::interceptor::{points, InterceptorBus, InterceptorHandle, LoggingInterceptor};
use crate::names::KnownSymbols;
use crate::output::{stdout_sink, SharedOutputSink};
use crate::scope::{Scope, ScopeName, ScopeOrder};
use crate::value::Value;

/// Version reported in the `server` scope.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Shared runtime state.
pub struct Runtime {
    config: RuntimeConfig,
    symbols: SharedSymbolTable,
    names: KnownSymbols,
    interceptors: Arc<InterceptorBus>,
    builtins: BuiltinRegistry,
    server: Scope,
    applications: DashMap<Symbol, Arc<Application>>,
    output: SharedOutputSink,
}

impl Runtime {
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    #[inline]
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    #[inline]
    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    #[inline]
    pub fn names(&self) -> &KnownSymbols {
        &self.names
    }

    #[inline]
    pub fn interceptors(&self) -> &Arc<InterceptorBus> {
        &self.interceptors
    }

    #[inline]
    pub fn builtins(&self) -> &BuiltinRegistry {
        &self.builtins
    }

    /// The `server` scope, visible from every context.
    #[inline]
    pub fn server_scope(&self) -> &Scope {
        &self.server
    }

    #[inline]
    pub fn output(&self) -> &SharedOutputSink {
        &self.output
    }

    /// The application called `name`, created and started on first use.
    pub fn application(&self, name: impl Into<Symbol>) -> RuntimeResult<Arc<Application>> {
        let name = name.into();
        let application = Arc::clone(
            self.applications
                .entry(name.clone())
                .or_insert_with(|| Arc::new(Application::new(name, Arc::clone(&self.interceptors))))
                .value(),
        );
        application.startup()?;
        Ok(application)
    }

    /// Shut down and forget an application.
    pub fn remove_application(&self, name: &Symbol) -> RuntimeResult<bool> {
        match self.applications.remove(name) {
            Some((_, application)) => application.shutdown().map(|()| true),
            None => Ok(false),
        }
    }

    pub fn application_count(&self) -> usize {
        self.applications.len()
    }

    /// A root context for running code against this runtime.
    pub fn root_context(self: &Arc<Self>) -> ExecutionContext<'static> {
        ExecutionContext::root(Arc::clone(self))
    }

    /// Announce shutdown, stop every application in parallel and drop all
    /// interceptors.
    ///
    /// Every application is stopped even if one fails; the first failure is
    /// returned.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn shutdown(&self) -> RuntimeResult<()> {
        let announced = self
            .interceptors
            .announce_str(points::ON_RUNTIME_SHUTDOWN, &self.event_data());
        let applications: Vec<Arc<Application>> = self
            .applications
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        self.applications.clear();
        let stopped: RuntimeResult<()> = applications
            .par_iter()
            .map(|application| application.shutdown())
            .collect::<Vec<_>>()
            .into_iter()
            .collect();
        self.interceptors.clear();
        announced.and(stopped)
    }

    fn event_data(&self) -> Scope {
        Scope::from_pairs([
            ("server", Value::Struct(self.server.clone())),
            ("config", Value::Struct(self.config.to_struct())),
        ])
    }
}

/// Builder for [`Runtime`].
///
/// Defaults: [`RuntimeConfig::default`], stdout output and a fresh symbol
/// table.
#[must_use]
pub struct RuntimeBuilder {
    config: RuntimeConfig,
    output: Option<SharedOutputSink>,
    symbols: Option<SharedSymbolTable>,
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        RuntimeBuilder {
            config: RuntimeConfig::default(),
            output: None,
            symbols: None,
        }
    }

    /// Set the configuration.
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Set where root output goes.
    pub fn output(mut self, sink: SharedOutputSink) -> Self {
        self.output = Some(sink);
        self
    }

    /// Share a symbol table with other runtimes.
    pub fn symbols(mut self, symbols: SharedSymbolTable) -> Self {
        self.symbols = Some(symbols);
        self
    }

    /// Build the runtime, register the well-known interception points and
    /// announce `onRuntimeStart`.
    pub fn build(self) -> RuntimeResult<Arc<Runtime>> {
        let symbols = self.symbols.unwrap_or_default();
        let names = KnownSymbols::new(&symbols);
        let interceptors = Arc::new(InterceptorBus::new());
        interceptors.register_points(points::CORE_POINTS.iter().copied());
        if self.config.debug_mode {
            interceptors.subscribe(
                &InterceptorHandle::new(LoggingInterceptor),
                points::CORE_POINTS.iter().copied(),
            );
        }

        let server = Scope::named(ScopeName::Server, ScopeOrder::Hashed);
        let cinder = Scope::from_pairs([("version", Value::string(VERSION))]);
        server.put("cinder", Value::Struct(cinder));

        let runtime = Arc::new(Runtime {
            config: self.config,
            symbols,
            names,
            interceptors,
            builtins: BuiltinRegistry::new(),
            server,
            applications: DashMap::new(),
            output: self.output.unwrap_or_else(stdout_sink),
        });
        tracing::debug!(
            debug_mode = runtime.config.debug_mode,
            max_call_depth = ?runtime.config.max_call_depth,
            "runtime started"
        );
        runtime
            .interceptors
            .announce_str(points::ON_RUNTIME_START, &runtime.event_data())?;
        Ok(runtime)
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
