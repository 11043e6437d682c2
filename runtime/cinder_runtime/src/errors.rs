//! Runtime errors.
//!
//! `ErrorKind` is the structured category of every failure raised by the
//! core. Factory functions (e.g. `symbol_not_found()`) are the public way to
//! build errors; they fill in the kind from the names involved so the
//! diagnostic always carries the symbol and the scope or class it was looked
//! up in.
//!
//! Two kinds are structural: `InterfaceContractViolation` and
//! `RethrowOutsideCatch`. They always propagate, even through the "safe"
//! variants of the reference protocol.

use std::fmt;

use cinder_ir::Symbol;

use crate::scope::Scope;
use crate::value::Value;

/// Result of a runtime operation. Defaults to producing a `Value`.
pub type RuntimeResult<T = Value> = Result<T, RuntimeError>;

/// Typed error category.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ErrorKind {
    // Resolution
    #[error("symbol [{name}] is not defined in any visible scope")]
    SymbolNotFound { name: String },
    #[error("key [{key}] was not located in {container}")]
    KeyNotFound { key: String, container: String },
    #[error("function [{name}] not found")]
    FunctionNotFound { name: String },
    #[error("[{name}] is a {type_name} and cannot be invoked")]
    NotInvocable { name: String, type_name: String },
    #[error("scope [{name}] not found")]
    ScopeNotFound { name: String },

    // Class model
    #[error("missing argument for setter [{setter}]")]
    MissingSetterArgument { setter: String },
    #[error("class [{class}] does not implement [{member}] required by interface [{interface}]")]
    InterfaceContractViolation {
        class: String,
        interface: String,
        member: String,
    },
    #[error("{subject} cannot {operation} while {state}")]
    InvalidState {
        subject: String,
        operation: String,
        state: String,
    },

    // Control flow
    #[error("there is no exception to rethrow; rethrow is only valid inside a catch block")]
    RethrowOutsideCatch,
    #[error("{message}")]
    Thrown {
        error_type: String,
        message: String,
        detail: String,
    },

    // Calls
    #[error("required argument [{name}] is missing for function [{function}]")]
    MissingArgument { function: String, name: String },
    #[error("maximum call depth of {limit} exceeded")]
    StackOverflow { limit: usize },

    // Values
    #[error("cannot cast {from} to {to}")]
    CastFailure { from: String, to: String },

    // Runtime services
    #[error("errors announcing [{point}] interception")]
    InterceptorFailure { point: String },
    #[error("a {context} context cannot {operation}")]
    UnsupportedOperation { context: String, operation: String },

    /// Catch-all for errors without a structured kind.
    #[error("{message}")]
    Custom { message: String },
}

impl ErrorKind {
    /// Structural errors are programmer errors and ignore `safe`.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            ErrorKind::InterfaceContractViolation { .. } | ErrorKind::RethrowOutsideCatch
        )
    }

    /// Type name exposed to scripts through `RuntimeError::to_struct`.
    pub fn type_name(&self) -> &str {
        match self {
            ErrorKind::SymbolNotFound { .. } => "SymbolNotFound",
            ErrorKind::KeyNotFound { .. } => "KeyNotFound",
            ErrorKind::FunctionNotFound { .. } => "FunctionNotFound",
            ErrorKind::NotInvocable { .. } => "NotInvocable",
            ErrorKind::ScopeNotFound { .. } => "ScopeNotFound",
            ErrorKind::MissingSetterArgument { .. } => "MissingSetterArgument",
            ErrorKind::InterfaceContractViolation { .. } => "InterfaceContractViolation",
            ErrorKind::InvalidState { .. } => "InvalidState",
            ErrorKind::RethrowOutsideCatch => "RethrowOutsideCatch",
            ErrorKind::Thrown { error_type, .. } => error_type.as_str(),
            ErrorKind::MissingArgument { .. } => "MissingArgument",
            ErrorKind::StackOverflow { .. } => "StackOverflow",
            ErrorKind::CastFailure { .. } => "CastFailure",
            ErrorKind::InterceptorFailure { .. } => "InterceptorFailure",
            ErrorKind::UnsupportedOperation { .. } => "UnsupportedOperation",
            ErrorKind::Custom { .. } => "Custom",
        }
    }
}

/// A runtime failure.
#[derive(Clone, Debug)]
pub struct RuntimeError {
    /// Structured error category.
    pub kind: ErrorKind,
    /// Human-readable message; equals `kind.to_string()` for factory-built errors.
    pub message: String,
    /// The failure this one wraps (subscriber errors, errors inside calls).
    pub cause: Option<Box<RuntimeError>>,
    /// Context added while the error propagated, innermost first.
    pub notes: Vec<String>,
}

impl RuntimeError {
    /// Create an error with just a message.
    pub fn new(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::from_kind(ErrorKind::Custom {
            message: message.clone(),
        })
    }

    fn from_kind(kind: ErrorKind) -> Self {
        let message = kind.to_string();
        RuntimeError {
            kind,
            message,
            cause: None,
            notes: Vec::new(),
        }
    }

    /// Attach the error that caused this one.
    #[must_use]
    pub fn with_cause(mut self, cause: RuntimeError) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// Add a context note.
    #[must_use]
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    #[inline]
    pub fn is_structural(&self) -> bool {
        self.kind.is_structural()
    }

    pub fn type_name(&self) -> &str {
        self.kind.type_name()
    }

    /// The innermost error in the cause chain.
    pub fn root_cause(&self) -> &RuntimeError {
        let mut current = self;
        while let Some(cause) = &current.cause {
            current = cause;
        }
        current
    }

    /// Notes and causes rendered for diagnostics.
    pub fn detail(&self) -> String {
        let mut lines: Vec<String> = Vec::new();
        if let ErrorKind::Thrown { detail, .. } = &self.kind {
            if !detail.is_empty() {
                lines.push(detail.clone());
            }
        }
        lines.extend(self.notes.iter().cloned());
        let mut cause = self.cause.as_deref();
        while let Some(inner) = cause {
            lines.push(format!("caused by: {}", inner.message));
            cause = inner.cause.as_deref();
        }
        lines.join("\n")
    }

    /// The error as a struct visible to scripts (`message`, `type`, `detail`).
    pub fn to_struct(&self) -> Scope {
        let data = Scope::linked();
        data.put("message", Value::string(&self.message));
        data.put("type", Value::string(self.type_name()));
        data.put("detail", Value::string(self.detail()));
        data
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)?;
        for note in &self.notes {
            write!(f, "\n  note: {note}")?;
        }
        Ok(())
    }
}

impl std::error::Error for RuntimeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_deref()
            .map(|cause| cause as &(dyn std::error::Error + 'static))
    }
}

impl From<ErrorKind> for RuntimeError {
    fn from(kind: ErrorKind) -> Self {
        RuntimeError::from_kind(kind)
    }
}

// Factory functions

#[cold]
pub fn symbol_not_found(name: &Symbol) -> RuntimeError {
    RuntimeError::from_kind(ErrorKind::SymbolNotFound {
        name: name.to_string(),
    })
}

#[cold]
pub fn key_not_found(key: &Symbol, container: impl Into<String>) -> RuntimeError {
    RuntimeError::from_kind(ErrorKind::KeyNotFound {
        key: key.to_string(),
        container: container.into(),
    })
}

#[cold]
pub fn function_not_found(name: &Symbol) -> RuntimeError {
    RuntimeError::from_kind(ErrorKind::FunctionNotFound {
        name: name.to_string(),
    })
}

#[cold]
pub fn method_not_found(name: &Symbol, class: &Symbol) -> RuntimeError {
    function_not_found(name).with_note(format!("no method [{name}] on class [{class}]"))
}

#[cold]
pub fn not_invocable(name: &Symbol, type_name: &str) -> RuntimeError {
    RuntimeError::from_kind(ErrorKind::NotInvocable {
        name: name.to_string(),
        type_name: type_name.to_string(),
    })
}

#[cold]
pub fn scope_not_found(name: &Symbol) -> RuntimeError {
    RuntimeError::from_kind(ErrorKind::ScopeNotFound {
        name: name.to_string(),
    })
}

#[cold]
pub fn missing_setter_argument(setter: &Symbol) -> RuntimeError {
    RuntimeError::from_kind(ErrorKind::MissingSetterArgument {
        setter: setter.to_string(),
    })
}

#[cold]
pub fn interface_contract_violation(
    class: &Symbol,
    interface: &Symbol,
    member: &Symbol,
) -> RuntimeError {
    RuntimeError::from_kind(ErrorKind::InterfaceContractViolation {
        class: class.to_string(),
        interface: interface.to_string(),
        member: member.to_string(),
    })
}

#[cold]
pub fn invalid_state(subject: impl Into<String>, operation: &str, state: &str) -> RuntimeError {
    RuntimeError::from_kind(ErrorKind::InvalidState {
        subject: subject.into(),
        operation: operation.to_string(),
        state: state.to_string(),
    })
}

#[cold]
pub fn rethrow_outside_catch() -> RuntimeError {
    RuntimeError::from_kind(ErrorKind::RethrowOutsideCatch)
}

/// A user-level exception raised by script code.
#[cold]
pub fn thrown(
    error_type: impl Into<String>,
    message: impl Into<String>,
    detail: impl Into<String>,
) -> RuntimeError {
    RuntimeError::from_kind(ErrorKind::Thrown {
        error_type: error_type.into(),
        message: message.into(),
        detail: detail.into(),
    })
}

#[cold]
pub fn missing_argument(function: &Symbol, name: &Symbol) -> RuntimeError {
    RuntimeError::from_kind(ErrorKind::MissingArgument {
        function: function.to_string(),
        name: name.to_string(),
    })
}

#[cold]
pub fn stack_overflow(limit: usize) -> RuntimeError {
    RuntimeError::from_kind(ErrorKind::StackOverflow { limit })
}

#[cold]
pub fn cast_failure(from: &str, to: &str) -> RuntimeError {
    RuntimeError::from_kind(ErrorKind::CastFailure {
        from: from.to_string(),
        to: to.to_string(),
    })
}

#[cold]
pub fn interceptor_failure(point: &Symbol, cause: RuntimeError) -> RuntimeError {
    RuntimeError::from_kind(ErrorKind::InterceptorFailure {
        point: point.to_string(),
    })
    .with_cause(cause)
}

#[cold]
pub fn unsupported_operation(context: &str, operation: &str) -> RuntimeError {
    RuntimeError::from_kind(ErrorKind::UnsupportedOperation {
        context: context.to_string(),
        operation: operation.to_string(),
    })
}

#[cfg(test)]
mod tests;
