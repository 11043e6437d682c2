//! Inheritance, interfaces and pseudo-construction.

use std::sync::Arc;

use rustc_hash::FxHashSet;

use cinder_ir::Symbol;

use crate::context::{ContextKind, ExecutionContext, Unit};
use crate::errors::{interface_contract_violation, RuntimeResult};
use crate::value::Value;

use super::{ClassInstance, ClassRef, ClassState, InterfaceDefinition};

impl ClassInstance {
    /// Attach `parent` as this instance's base class.
    ///
    /// The child always wins: parent bindings are copied only where the
    /// child has none, and never over a property the child declares itself.
    /// `extends` and `implements` annotations stay with the class that
    /// declared them.
    #[tracing::instrument(level = "debug", skip_all, fields(class = %self.name(), parent = %parent.name()))]
    pub fn set_parent(self: &Arc<Self>, parent: ClassRef) -> RuntimeResult<()> {
        self.transition(
            &[ClassState::Declared, ClassState::Linked],
            ClassState::Linked,
            "attach a parent",
        )?;
        *parent.child.write() = Arc::downgrade(self);

        let own: FxHashSet<Symbol> = self
            .definition
            .properties()
            .iter()
            .map(|property| property.name.clone())
            .collect();
        for (key, value) in parent.variables.entries() {
            if !own.contains(&key) {
                self.variables.put_if_absent(key, value);
            }
        }
        for (key, value) in parent.this.entries() {
            if !own.contains(&key) {
                self.this.put_if_absent(key, value);
            }
        }

        {
            let mut merged = parent.properties.read().clone();
            let mut properties = self.properties.write();
            for (name, property) in properties.drain(..) {
                merged.insert(name, property);
            }
            *properties = merged;
        }

        for (key, value) in parent.annotations.entries() {
            if key.matches("extends") || key.matches("implements") {
                continue;
            }
            self.annotations.put_if_absent(key, value);
        }
        for (key, value) in parent.documentation.entries() {
            self.documentation.put_if_absent(key, value);
        }

        *self.parent.write() = Some(parent);
        *self.accessors.write() = None;
        Ok(())
    }

    /// Compose `interface` into this instance.
    ///
    /// Every abstract member must already be a function of the instance.
    /// Default members fill gaps in `variables`, and in `this` when public.
    pub fn register_interface(self: &Arc<Self>, interface: &Arc<InterfaceDefinition>) -> RuntimeResult<()> {
        for member in interface.abstract_methods() {
            let implemented = self
                .variables
                .get(member)
                .or_else(|| self.this.get(member))
                .is_some_and(|value| value.is_callable());
            if !implemented {
                return Err(interface_contract_violation(self.name(), interface.name(), member));
            }
        }
        self.transition(
            &[ClassState::Declared, ClassState::Linked],
            ClassState::Linked,
            "register an interface",
        )?;
        for function in interface.default_methods() {
            let value = Value::function(function.clone());
            if function.access().is_public() {
                self.this.put_if_absent(function.name().clone(), value.clone());
            }
            self.variables.put_if_absent(function.name().clone(), value);
        }
        self.interfaces.write().push(Arc::clone(interface));
        Ok(())
    }

    /// Assign property defaults, then run the pseudo-constructor with this
    /// instance as the active unit.
    #[tracing::instrument(level = "debug", skip_all, fields(class = %self.name()))]
    pub fn construct(self: &Arc<Self>, ctx: &ExecutionContext<'_>) -> RuntimeResult<()> {
        self.transition(
            &[ClassState::Declared, ClassState::Linked],
            ClassState::Constructed,
            "be constructed",
        )?;
        for property in self.properties() {
            if !self.variables.contains_key(&property.name) {
                self.variables
                    .put(property.name.clone(), property.default.unwrap_or(Value::Null));
            }
        }

        if let Some(initializer) = self.definition.initializer() {
            let class_ctx = ctx.child(ContextKind::Class {
                instance: Arc::clone(self),
            });
            let _unit = class_ctx.enter_unit(Unit::Class(Arc::clone(self)));
            let initialized = initializer(&class_ctx);
            class_ctx.flush(false);
            initialized?;
        }

        *self.state.lock() = ClassState::Live;
        Ok(())
    }
}
