//! # UI Surface Lock
//!
//! A recursive lock with a bounded wait, guarding everything that touches the widget tree.
//!
//! - The thread holding the lock may acquire it again; the lock is released when the
//!   outermost guard drops.
//! - Other threads wait until the deadline and then give up with [`LockTimeout`]. Callers
//!   skip their work instead of blocking the timer.
//!
//! Guards hand out `&T` only, so the protected state sits in a `RefCell` and nested callers
//! must use `try_borrow`/`try_borrow_mut`.

use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use std::time::Duration;
use thiserror::Error;

/// The lock could not be acquired within the allowed wait.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("UI lock not acquired within {waited:?}")]
pub struct LockTimeout {
    pub waited: Duration,
}

/// Scoped hold on a [`UiLock`]; released on drop. Not `Send`.
pub type UiGuard<'a, T> = ReentrantMutexGuard<'a, T>;

/// Reentrant lock with timed acquisition.
#[derive(Debug)]
pub struct UiLock<T> {
    inner: ReentrantMutex<T>,
}

impl<T> UiLock<T> {
    pub fn new(data: T) -> Self {
        Self {
            inner: ReentrantMutex::new(data),
        }
    }

    /// Acquire the lock, waiting at most `timeout` for another thread to release it.
    ///
    /// Re-acquisition from the owning thread always succeeds immediately.
    pub fn try_lock_for(&self, timeout: Duration) -> Result<UiGuard<'_, T>, LockTimeout> {
        self.inner
            .try_lock_for(timeout)
            .ok_or(LockTimeout { waited: timeout })
    }

    /// Whether any thread currently holds the lock.
    pub fn is_locked(&self) -> bool {
        self.inner.is_locked()
    }
}
