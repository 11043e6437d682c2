//! Tabular query results.

use std::sync::Arc;

use cinder_ir::Symbol;
use indexmap::IndexMap;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use rustc_hash::FxBuildHasher;

use super::Value;

/// Ordered columns and rows of cells.
#[derive(Clone, Debug, Default)]
pub struct Query {
    columns: IndexMap<Symbol, usize, FxBuildHasher>,
    rows: Vec<Vec<Value>>,
}

impl Query {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Symbol>,
    {
        let mut map = IndexMap::default();
        for column in columns {
            let next = map.len();
            map.entry(column.into()).or_insert(next);
        }
        Query {
            columns: map,
            rows: Vec::new(),
        }
    }

    /// Append a row; missing trailing cells are null, surplus cells are dropped.
    pub fn add_row(&mut self, mut cells: Vec<Value>) {
        cells.resize(self.columns.len(), Value::Null);
        self.rows.push(cells);
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, column: &Symbol) -> bool {
        self.columns.contains_key(column)
    }

    /// Cell at a 0-based row.
    pub fn cell(&self, column: &Symbol, row: usize) -> Option<Value> {
        let index = *self.columns.get(column)?;
        self.rows.get(row).and_then(|cells| cells.get(index)).cloned()
    }

    /// Overwrite a cell. Returns `false` for an unknown column or row.
    pub fn set_cell(&mut self, column: &Symbol, row: usize, value: Value) -> bool {
        let Some(&index) = self.columns.get(column) else {
            return false;
        };
        match self.rows.get_mut(row).and_then(|cells| cells.get_mut(index)) {
            Some(cell) => {
                *cell = value;
                true
            }
            None => false,
        }
    }

    /// Comma-separated column names in declaration order.
    pub fn column_list(&self) -> String {
        self.columns
            .keys()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn columns(&self) -> impl Iterator<Item = &Symbol> {
        self.columns.keys()
    }
}

/// Shared handle to a query. Identity keys iteration cursors.
#[derive(Clone, Debug, Default)]
pub struct QueryRef(Arc<RwLock<Query>>);

impl QueryRef {
    pub fn new(query: Query) -> Self {
        QueryRef(Arc::new(RwLock::new(query)))
    }

    pub fn read(&self) -> RwLockReadGuard<'_, Query> {
        self.0.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, Query> {
        self.0.write()
    }

    /// Identity of the underlying table.
    pub fn id(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }

    pub fn ptr_eq(a: &QueryRef, b: &QueryRef) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }
}
