//! Stack growth for deeply nested calls.
//!
//! Every function call runs through `ensure_sufficient_stack`, so recursive
//! script code is bounded by the configured call depth rather than by the
//! native thread stack.
//!
//! On WASM targets, where stacker isn't available, the closure is called
//! directly.

/// Run `f`, growing the stack first when less than the red zone remains.
#[inline]
#[cfg(not(target_arch = "wasm32"))]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    /// Minimum stack space to keep available (100KB red zone).
    const RED_ZONE: usize = 100 * 1024;

    /// Stack space to allocate when growing (1MB).
    const STACK_PER_RECURSION: usize = 1024 * 1024;

    stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}

/// WASM version: call directly.
#[inline]
#[cfg(target_arch = "wasm32")]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    f()
}
