//! Subscriber lists for one interception point.

use std::fmt;
use std::sync::Arc;

use cinder_ir::Symbol;
use parking_lot::RwLock;

use crate::errors::RuntimeResult;
use crate::scope::Scope;

/// Something that reacts to announcements.
pub trait Interceptor: Send + Sync {
    fn intercept(&self, point: &Symbol, data: &Scope) -> RuntimeResult<()>;
}

impl<F> Interceptor for F
where
    F: Fn(&Symbol, &Scope) -> RuntimeResult<()> + Send + Sync,
{
    fn intercept(&self, point: &Symbol, data: &Scope) -> RuntimeResult<()> {
        self(point, data)
    }
}

/// A subscribed interceptor. Handles compare by identity.
#[derive(Clone)]
pub struct InterceptorHandle(Arc<dyn Interceptor>);

impl InterceptorHandle {
    pub fn new(interceptor: impl Interceptor + 'static) -> Self {
        InterceptorHandle(Arc::new(interceptor))
    }

    /// Wrap a closure. Gives the closure its signature for inference.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&Symbol, &Scope) -> RuntimeResult<()> + Send + Sync + 'static,
    {
        InterceptorHandle(Arc::new(f))
    }

    pub fn from_arc(interceptor: Arc<dyn Interceptor>) -> Self {
        InterceptorHandle(interceptor)
    }

    fn intercept(&self, point: &Symbol, data: &Scope) -> RuntimeResult<()> {
        self.0.intercept(point, data)
    }
}

impl PartialEq for InterceptorHandle {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.0), Arc::as_ptr(&other.0))
    }
}

impl Eq for InterceptorHandle {}

impl fmt::Debug for InterceptorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InterceptorHandle({:p})", Arc::as_ptr(&self.0))
    }
}

/// Ordered subscribers of one interception point.
pub struct InterceptorState {
    name: Symbol,
    subscribers: RwLock<Vec<InterceptorHandle>>,
}

impl InterceptorState {
    pub fn new(name: Symbol) -> Self {
        InterceptorState {
            name,
            subscribers: RwLock::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &Symbol {
        &self.name
    }

    /// Add a subscriber. Already-subscribed handles are not added twice.
    pub fn register(&self, handle: InterceptorHandle) -> bool {
        let mut subscribers = self.subscribers.write();
        if subscribers.contains(&handle) {
            return false;
        }
        subscribers.push(handle);
        true
    }

    pub fn unregister(&self, handle: &InterceptorHandle) -> bool {
        let mut subscribers = self.subscribers.write();
        let before = subscribers.len();
        subscribers.retain(|existing| existing != handle);
        subscribers.len() != before
    }

    pub fn len(&self) -> usize {
        self.subscribers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.read().is_empty()
    }

    /// Call subscribers in registration order, stopping at the first error.
    ///
    /// Works on a snapshot, so subscribers may subscribe or unsubscribe
    /// while being called.
    pub fn announce(&self, data: &Scope) -> RuntimeResult<()> {
        let snapshot = self.subscribers.read().clone();
        for subscriber in &snapshot {
            subscriber.intercept(&self.name, data)?;
        }
        Ok(())
    }
}
