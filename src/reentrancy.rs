//! Debug-only reentrancy guard for combiner callbacks.
//!
//! A combiner function runs while its result ring is locked. If that
//! function calls back into `combine`, `advance` or `query_past` of its own
//! combiner it would deadlock on the ring. In debug builds the store marks the
//! callback window per thread and panics on any such nested entry, whichever
//! combiner it targets. In release builds this compiles to a zero-cost no-op.

#[cfg(debug_assertions)]
use core::cell::Cell;
use core::marker::PhantomData;

#[cfg(debug_assertions)]
thread_local! {
    static IN_CALLBACK: Cell<u32> = const { Cell::new(0) };
}

/// Assert that the current thread is not inside a combiner callback.
#[inline]
pub fn check(op: &'static str) {
    #[cfg(debug_assertions)]
    IN_CALLBACK.with(|d| {
        assert!(
            d.get() == 0,
            "reentrancy detected: {op} called from inside a combiner function"
        );
    });
    #[cfg(not(debug_assertions))]
    let _ = op;
}

/// Mark the current thread as running a combiner callback until the guard
/// drops.
#[inline]
pub fn enter_callback() -> CallbackGuard {
    #[cfg(debug_assertions)]
    IN_CALLBACK.with(|d| d.set(d.get() + 1));
    CallbackGuard { _nosend: PhantomData }
}

/// RAII guard returned by [`enter_callback`]. Tied to its thread.
pub struct CallbackGuard {
    _nosend: PhantomData<*mut ()>,
}

impl Drop for CallbackGuard {
    fn drop(&mut self) {
        #[cfg(debug_assertions)]
        IN_CALLBACK.with(|d| {
            debug_assert!(d.get() > 0);
            d.set(d.get() - 1);
        });
    }
}
