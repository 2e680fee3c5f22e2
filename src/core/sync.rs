//! Synchronization utilities for robust lock handling
//!
//! Converts lock poisoning into application errors instead of panicking, so a
//! panic on one worker thread cannot silently take down its siblings.

use std::sync::LockResult;

/// Unwrap a lock acquisition, mapping a poisoned lock to a domain error.
///
/// Works for `Mutex::lock` as well as `RwLock::read`/`write` results. The
/// `on_poison` constructor receives a diagnostic message describing the
/// poisoned state.
///
/// # Examples
/// ```
/// use std::sync::Mutex;
/// use metabus::core::sync::lock_or;
///
/// let mutex = Mutex::new(42);
/// let guard = lock_or(mutex.lock(), |msg| msg).unwrap();
/// assert_eq!(*guard, 42);
/// ```
pub fn lock_or<T, E>(result: LockResult<T>, on_poison: impl FnOnce(String) -> E) -> Result<T, E> {
    result.map_err(|poison| {
        on_poison(format!(
            "lock poisoned by a panic on another thread: {:?}",
            poison
        ))
    })
}
