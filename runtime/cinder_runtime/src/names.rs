//! Pre-interned symbols for hot-path lookups.
//!
//! Resolution and dispatch compare against the same handful of names on
//! every call (`recordCount`, `super`, `onMissingMethod`, ...). These are
//! interned once when the runtime is built and cloned out of here.

use cinder_ir::{Symbol, SymbolTable};

use crate::interceptor::points;

/// Synthetic names answered by an active query iteration.
#[derive(Clone)]
pub struct IterationNames {
    pub record_count: Symbol,
    pub current_row: Symbol,
    pub column_list: Symbol,
}

/// Names used by class dispatch and metadata.
#[derive(Clone)]
pub struct ClassNames {
    pub meta: Symbol,
    pub super_: Symbol,
    pub accessors: Symbol,
    pub on_missing_method: Symbol,
    pub missing_method_name: Symbol,
    pub missing_method_arguments: Symbol,
}

/// Interception points announced on every call.
#[derive(Clone)]
pub struct CallPointNames {
    pub pre_function_invoke: Symbol,
    pub post_function_invoke: Symbol,
    pub on_exception: Symbol,
}

/// All pre-interned names of a runtime.
#[derive(Clone)]
pub struct KnownSymbols {
    pub iteration: IterationNames,
    pub class: ClassNames,
    pub points: CallPointNames,
}

impl KnownSymbols {
    pub fn new(table: &SymbolTable) -> Self {
        Self {
            iteration: IterationNames {
                record_count: table.intern("recordCount"),
                current_row: table.intern("currentRow"),
                column_list: table.intern("columnList"),
            },
            class: ClassNames {
                meta: table.intern("$bx"),
                super_: table.intern("super"),
                accessors: table.intern("accessors"),
                on_missing_method: table.intern("onMissingMethod"),
                missing_method_name: table.intern("missingMethodName"),
                missing_method_arguments: table.intern("missingMethodArguments"),
            },
            points: CallPointNames {
                pre_function_invoke: table.intern(points::PRE_FUNCTION_INVOKE),
                post_function_invoke: table.intern(points::POST_FUNCTION_INVOKE),
                on_exception: table.intern(points::ON_EXCEPTION),
            },
        }
    }
}
