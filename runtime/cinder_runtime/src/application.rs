//! Applications and their sessions.
//!
//! An application owns an `application` scope and a concurrent map of
//! sessions. Lifecycle transitions are announced on the runtime's
//! interceptor bus; the announcement happens outside of any map lock.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use cinder_ir::Symbol;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use rayon::prelude::*;

use crate::errors::{invalid_state, RuntimeResult};
use crate::interceptor::{points, InterceptorBus};
use crate::scope::{Scope, ScopeName, ScopeOrder};
use crate::value::Value;

/// A running application.
pub struct Application {
    name: Symbol,
    bus: Arc<InterceptorBus>,
    started: AtomicBool,
    start_time: RwLock<Option<SystemTime>>,
    scope: RwLock<Scope>,
    sessions: DashMap<Symbol, Arc<Session>>,
    lifecycle: Mutex<()>,
}

impl Application {
    pub fn new(name: impl Into<Symbol>, bus: Arc<InterceptorBus>) -> Self {
        Application {
            name: name.into(),
            bus,
            started: AtomicBool::new(false),
            start_time: RwLock::new(None),
            scope: RwLock::new(Scope::named(ScopeName::Application, ScopeOrder::Hashed)),
            sessions: DashMap::new(),
            lifecycle: Mutex::new(()),
        }
    }

    pub fn name(&self) -> &Symbol {
        &self.name
    }

    /// The current `application` scope.
    pub fn scope(&self) -> Scope {
        self.scope.read().clone()
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    pub fn start_time(&self) -> Option<SystemTime> {
        *self.start_time.read()
    }

    /// Start the application. Starting twice is a no-op.
    pub fn startup(&self) -> RuntimeResult<()> {
        let _guard = self.lifecycle.lock();
        if self.is_started() {
            return Ok(());
        }
        *self.start_time.write() = Some(SystemTime::now());
        self.started.store(true, Ordering::Release);
        tracing::debug!(application = %self.name, "application started");
        self.bus.announce_str(points::ON_APPLICATION_START, &self.event_data())
    }

    /// End every session, swap in a fresh scope, and start again.
    pub fn restart(&self) -> RuntimeResult<()> {
        let stopped = {
            let _guard = self.lifecycle.lock();
            let announced = self
                .bus
                .announce_str(points::ON_APPLICATION_RESTART, &self.event_data());
            let stopped = self.shutdown_sessions();
            *self.scope.write() = Scope::named(ScopeName::Application, ScopeOrder::Hashed);
            self.started.store(false, Ordering::Release);
            announced.and(stopped)
        };
        stopped.and(self.startup())
    }

    /// Announce the end of the application and shut its sessions down.
    ///
    /// Sessions end and the application stops even when a subscriber fails;
    /// the first failure is returned afterwards.
    pub fn shutdown(&self) -> RuntimeResult<()> {
        let _guard = self.lifecycle.lock();
        if !self.is_started() {
            return Ok(());
        }
        let announced = self.bus.announce_str(points::ON_APPLICATION_END, &self.event_data());
        let stopped = self.shutdown_sessions();
        self.started.store(false, Ordering::Release);
        tracing::debug!(application = %self.name, "application stopped");
        announced.and(stopped)
    }

    /// End all sessions in parallel. The first failure is returned after
    /// every session has been removed.
    fn shutdown_sessions(&self) -> RuntimeResult<()> {
        let sessions: Vec<Arc<Session>> = self
            .sessions
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        self.sessions.clear();
        let results: Vec<RuntimeResult<()>> =
            sessions.par_iter().map(|session| session.shutdown()).collect();
        results.into_iter().collect()
    }

    /// The session for `id`, created and announced on first use.
    pub fn session(&self, id: impl Into<Symbol>) -> RuntimeResult<Arc<Session>> {
        if !self.is_started() {
            return Err(invalid_state(
                format!("application [{}]", self.name),
                "create sessions",
                "stopped",
            ));
        }
        let id = id.into();
        if let Some(existing) = self.sessions.get(&id) {
            return Ok(Arc::clone(existing.value()));
        }
        let mut created = false;
        let session = Arc::clone(
            self.sessions
                .entry(id.clone())
                .or_insert_with(|| {
                    created = true;
                    Arc::new(Session::new(id, Arc::clone(&self.bus)))
                })
                .value(),
        );
        if created {
            self.bus.announce_str(points::ON_SESSION_START, &session.event_data())?;
        }
        Ok(session)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Remove a session and announce its end.
    pub fn remove_session(&self, id: &Symbol) -> RuntimeResult<bool> {
        match self.sessions.remove(id) {
            Some((_, session)) => session.shutdown().map(|()| true),
            None => Ok(false),
        }
    }

    fn event_data(&self) -> Scope {
        Scope::from_pairs([
            ("name", Value::string(self.name.original())),
            ("application", Value::Struct(self.scope())),
        ])
    }
}

/// One user's state within an application.
pub struct Session {
    id: Symbol,
    scope: Scope,
    created: SystemTime,
    bus: Arc<InterceptorBus>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("scope", &self.scope)
            .field("created", &self.created)
            .finish_non_exhaustive()
    }
}

impl Session {
    fn new(id: Symbol, bus: Arc<InterceptorBus>) -> Self {
        Session {
            id,
            scope: Scope::named(ScopeName::Session, ScopeOrder::Hashed),
            created: SystemTime::now(),
            bus,
        }
    }

    pub fn id(&self) -> &Symbol {
        &self.id
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn created(&self) -> SystemTime {
        self.created
    }

    pub fn shutdown(&self) -> RuntimeResult<()> {
        self.bus.announce_str(points::ON_SESSION_END, &self.event_data())
    }

    fn event_data(&self) -> Scope {
        Scope::from_pairs([
            ("sessionId", Value::string(self.id.original())),
            ("session", Value::Struct(self.scope.clone())),
        ])
    }
}
