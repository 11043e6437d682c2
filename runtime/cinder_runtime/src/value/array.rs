//! Shared growable arrays with 1-based positions.

use std::sync::Arc;

use cinder_ir::Symbol;
use parking_lot::RwLock;

use super::Value;

/// Shared handle to a mutable array.
#[derive(Clone, Default)]
pub struct ArrayRef(Arc<RwLock<Vec<Value>>>);

impl ArrayRef {
    pub fn new(items: Vec<Value>) -> Self {
        ArrayRef(Arc::new(RwLock::new(items)))
    }

    pub fn len(&self) -> usize {
        self.0.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.read().is_empty()
    }

    /// Element at a 1-based position.
    pub fn get(&self, position: usize) -> Option<Value> {
        let index = position.checked_sub(1)?;
        self.0.read().get(index).cloned()
    }

    /// Store at a 1-based position, padding with nulls as needed.
    ///
    /// Returns `false` for position 0.
    pub fn set(&self, position: usize, value: Value) -> bool {
        let Some(index) = position.checked_sub(1) else {
            return false;
        };
        let mut items = self.0.write();
        if index >= items.len() {
            items.resize(index + 1, Value::Null);
        }
        items[index] = value;
        true
    }

    pub fn push(&self, value: Value) {
        self.0.write().push(value);
    }

    pub fn to_vec(&self) -> Vec<Value> {
        self.0.read().clone()
    }

    pub fn ptr_eq(a: &ArrayRef, b: &ArrayRef) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }

    /// The 1-based position a key names, if it is a positive integer.
    pub fn position_of(key: &Symbol) -> Option<usize> {
        let value = match key.as_int() {
            Some(value) => value,
            None => key.normalized().parse::<i64>().ok()?,
        };
        usize::try_from(value).ok().filter(|&position| position > 0)
    }
}
