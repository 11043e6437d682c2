//! Identifiers for the Cinder runtime.
//!
//! Every name-keyed map in the runtime is keyed by [`Symbol`]: an immutable,
//! case-insensitive identifier with a numeric fast path for short positional
//! names such as `1` or `42`. [`SymbolTable`] caches symbols for literal and
//! reserved names so hot paths clone an existing symbol instead of
//! re-normalizing text.

mod symbol;
mod table;

pub use symbol::{Symbol, SymbolOrigin};
pub use table::{SharedSymbolTable, SymbolTable};
