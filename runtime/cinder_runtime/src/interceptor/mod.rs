//! Interceptor bus: publish/subscribe keyed by interception point.
//!
//! A point is a known event name; a state is the subscriber list of one
//! point. Registration and removal of points and states are serialized on a
//! single mutex. `announce` never takes that mutex: it clones the state
//! handle out of the concurrent map and calls its subscribers.
//!
//! Announcing a point nobody registered a state for is a no-op, so
//! optional lifecycle events cost one map lookup.

pub mod points;
mod state;

use std::sync::Arc;

use cinder_ir::Symbol;
use dashmap::{DashMap, DashSet};
use parking_lot::Mutex;

use crate::errors::{interceptor_failure, RuntimeResult};
use crate::scope::Scope;

pub use state::{Interceptor, InterceptorHandle, InterceptorState};

/// Process-wide event registry, owned by a `Runtime`.
#[derive(Default)]
pub struct InterceptorBus {
    points: DashSet<Symbol>,
    states: DashMap<Symbol, Arc<InterceptorState>>,
    registration: Mutex<()>,
}

impl InterceptorBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare interception points.
    pub fn register_points<I, S>(&self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<Symbol>,
    {
        let _guard = self.registration.lock();
        for name in names {
            self.points.insert(name.into());
        }
    }

    /// Forget points and their states.
    pub fn remove_points<I, S>(&self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<Symbol>,
    {
        let _guard = self.registration.lock();
        for name in names {
            let name = name.into();
            self.points.remove(&name);
            self.states.remove(&name);
        }
    }

    pub fn has_point(&self, name: &Symbol) -> bool {
        self.points.contains(name)
    }

    pub fn point_names(&self) -> Vec<Symbol> {
        let mut names: Vec<Symbol> = self.points.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }

    /// Get or create the state for `name`, declaring the point if needed.
    pub fn register_state(&self, name: impl Into<Symbol>) -> Arc<InterceptorState> {
        let name = name.into();
        let _guard = self.registration.lock();
        if let Some(existing) = self.states.get(&name) {
            return Arc::clone(existing.value());
        }
        self.points.insert(name.clone());
        let state = Arc::new(InterceptorState::new(name.clone()));
        self.states.insert(name, Arc::clone(&state));
        tracing::debug!(point = %state.name(), "registered interceptor state");
        state
    }

    pub fn remove_state(&self, name: &Symbol) -> Option<Arc<InterceptorState>> {
        let _guard = self.registration.lock();
        self.states.remove(name).map(|(_, state)| state)
    }

    pub fn state(&self, name: &Symbol) -> Option<Arc<InterceptorState>> {
        self.states.get(name).map(|entry| Arc::clone(entry.value()))
    }

    pub fn has_state(&self, name: &Symbol) -> bool {
        self.states.contains_key(name)
    }

    /// Subscribe `handle` to each named state, creating states as needed.
    pub fn subscribe<I, S>(&self, handle: &InterceptorHandle, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<Symbol>,
    {
        for name in names {
            self.register_state(name).register(handle.clone());
        }
    }

    /// Remove `handle` from each named state.
    pub fn unsubscribe<I, S>(&self, handle: &InterceptorHandle, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<Symbol>,
    {
        for name in names {
            if let Some(state) = self.state(&name.into()) {
                state.unregister(handle);
            }
        }
    }

    /// Remove `handle` from every state.
    pub fn unsubscribe_all(&self, handle: &InterceptorHandle) {
        let states: Vec<Arc<InterceptorState>> =
            self.states.iter().map(|entry| Arc::clone(entry.value())).collect();
        for state in states {
            state.unregister(handle);
        }
    }

    /// Run every subscriber of `name` in order.
    ///
    /// Unregistered states are a no-op. The first subscriber error stops the
    /// announcement and is returned wrapped in `InterceptorFailure`.
    pub fn announce(&self, name: &Symbol, data: &Scope) -> RuntimeResult<()> {
        let Some(state) = self.state(name) else {
            return Ok(());
        };
        state.announce(data).map_err(|cause| {
            tracing::debug!(point = %name, error = %cause, "interceptor failed");
            interceptor_failure(name, cause)
        })
    }

    pub fn announce_str(&self, name: &str, data: &Scope) -> RuntimeResult<()> {
        self.announce(&Symbol::new(name), data)
    }

    /// Announce with lazily built data; `data` only runs when someone listens.
    pub fn announce_with(&self, name: &Symbol, data: impl FnOnce() -> Scope) -> RuntimeResult<()> {
        match self.state(name) {
            Some(state) if !state.is_empty() => self.announce(name, &data()),
            _ => Ok(()),
        }
    }

    /// Drop every point and state.
    pub fn clear(&self) {
        let _guard = self.registration.lock();
        self.states.clear();
        self.points.clear();
    }
}

/// Forwards every announcement to `tracing` at debug level.
#[derive(Clone, Copy, Debug, Default)]
pub struct LoggingInterceptor;

impl Interceptor for LoggingInterceptor {
    fn intercept(&self, point: &Symbol, data: &Scope) -> RuntimeResult<()> {
        tracing::debug!(point = %point, data = ?data, "interception");
        Ok(())
    }
}
