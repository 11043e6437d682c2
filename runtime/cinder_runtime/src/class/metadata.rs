//! Class metadata.

use cinder_ir::Symbol;

use crate::scope::Scope;
use crate::value::Value;

use super::ClassInstance;

impl ClassInstance {
    /// Metadata of the class as a sorted struct.
    ///
    /// Includes the declared functions and properties, the merged
    /// annotations and documentation, implemented interfaces, and the
    /// parent's metadata under `extends`, recursively.
    pub fn describe(&self) -> Scope {
        let definition = &self.definition;
        let meta = Scope::sorted();
        let name = definition.name().original().into_owned();
        meta.put("name", Value::string(&name));
        meta.put("fullname", Value::string(full_name(&name, definition.path())));
        meta.put("path", Value::string(definition.path()));
        meta.put("type", Value::string("Component"));
        let hint = self
            .documentation
            .get(&Symbol::new("hint"))
            .or_else(|| self.annotations.get(&Symbol::new("hint")))
            .unwrap_or_else(|| Value::string(""));
        meta.put("hint", hint);
        meta.put("output", Value::Bool(self.can_output()));
        let accessors = self
            .annotations
            .get(&Symbol::new("accessors"))
            .is_some_and(|value| value.cast_bool().unwrap_or(false));
        meta.put("accessors", Value::Bool(accessors));
        meta.put("persistent", Value::Bool(false));

        let functions: Vec<Value> = definition
            .functions()
            .iter()
            .map(|function| Value::Struct(function.metadata()))
            .collect();
        meta.put("functions", Value::array(functions));
        let properties: Vec<Value> = definition
            .properties()
            .iter()
            .map(|property| Value::Struct(property.metadata()))
            .collect();
        meta.put("properties", Value::array(properties));
        meta.put("documentation", Value::Struct(self.documentation.clone()));
        meta.put("annotations", Value::Struct(self.annotations.clone()));

        let implements = Scope::sorted();
        for interface in self.interfaces.read().iter() {
            implements.put(interface.name().clone(), Value::Struct(interface.metadata()));
        }
        meta.put("implements", Value::Struct(implements));

        if let Some(parent) = self.parent() {
            meta.put("extends", Value::Struct(parent.describe()));
        }
        meta
    }
}

/// Dotted name derived from the source path, or the bare name without one.
pub(super) fn full_name(name: &str, path: &str) -> String {
    let trimmed = path.trim_start_matches(['/', '\\']);
    let stem = trimmed
        .rsplit_once('.')
        .map_or(trimmed, |(stem, _extension)| stem);
    if stem.is_empty() {
        return name.to_string();
    }
    stem.replace(['/', '\\'], ".")
}
