//! Runtime configuration.

use crate::scope::{Scope, ScopeOrder};
use crate::value::Value;

/// Default limit on nested function calls.
pub const DEFAULT_MAX_CALL_DEPTH: usize = 2000;

/// Settings fixed when a runtime is built.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Subscribe the logging interceptor to every well-known point.
    pub debug_mode: bool,
    /// Nested call limit; `None` disables the check.
    pub max_call_depth: Option<usize>,
    /// Order of scopes created by the runtime for scripts.
    pub default_scope_order: ScopeOrder,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            debug_mode: false,
            max_call_depth: Some(DEFAULT_MAX_CALL_DEPTH),
            default_scope_order: ScopeOrder::Linked,
        }
    }
}

impl RuntimeConfig {
    /// Read `CINDER_DEBUG` and `CINDER_MAX_CALL_DEPTH` from the environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary variable source.
    ///
    /// Unparseable values keep their defaults. A call depth of `0` disables
    /// the limit.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(debug) = lookup("CINDER_DEBUG") {
            config.debug_mode = matches!(
                debug.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            );
        }
        if let Some(depth) = lookup("CINDER_MAX_CALL_DEPTH") {
            match depth.trim().parse::<usize>() {
                Ok(0) => config.max_call_depth = None,
                Ok(limit) => config.max_call_depth = Some(limit),
                Err(_) => tracing::warn!(value = %depth, "ignoring invalid CINDER_MAX_CALL_DEPTH"),
            }
        }
        if let Some(order) = lookup("CINDER_SCOPE_ORDER").and_then(|o| ScopeOrder::parse(&o)) {
            config.default_scope_order = order;
        }
        config
    }

    /// The configuration as a struct visible to scripts.
    pub fn to_struct(&self) -> Scope {
        let data = Scope::sorted();
        data.put("debugMode", Value::Bool(self.debug_mode));
        let depth = self
            .max_call_depth
            .and_then(|limit| i64::try_from(limit).ok())
            .map_or(Value::Null, Value::Int);
        data.put("maxCallDepth", depth);
        data.put("scopeOrder", Value::string(self.default_scope_order.as_str()));
        data
    }
}
