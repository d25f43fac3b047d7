//! Reference-counted activation guard.
//!
//! A [`ReferenceGuard`] lets any number of callers ask for a shared resource
//! (typically the hardware shutter) to be active. The activate side effect
//! runs when the hold count goes 0 → 1 and the deactivate side effect when it
//! returns 1 → 0; the raw number of acquire/release calls never matters.
//!
//! Holds are represented by [`ScopedHold`] tokens that release themselves
//! when dropped.
//!
//! # Example
//!
//! ```
//! use laser_shutter::ReferenceGuard;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! let opened = Arc::new(AtomicUsize::new(0));
//! let opened_in_cb = Arc::clone(&opened);
//! let guard = ReferenceGuard::new(
//!     move || {
//!         opened_in_cb.fetch_add(1, Ordering::SeqCst);
//!         Ok(())
//!     },
//!     || Ok(()),
//! );
//!
//! let a = guard.acquire().unwrap();
//! let b = guard.acquire().unwrap();
//! assert_eq!(opened.load(Ordering::SeqCst), 1);
//! drop(a);
//! assert!(guard.is_active());
//! drop(b);
//! assert!(!guard.is_active());
//! ```

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use log::{debug, warn};

use crate::error::{Error, Result};

type Transition = Box<dyn Fn() -> Result<()> + Send + Sync>;

struct GuardInner {
    /// Hold count. The lock is also held while a transition callback runs,
    /// so transitions never overlap.
    count: Mutex<u32>,
    activate: Option<Transition>,
    deactivate: Option<Transition>,
}

impl GuardInner {
    fn lock_count(&self) -> MutexGuard<'_, u32> {
        // The count is only written after a callback succeeds, so a panic
        // inside a callback leaves it consistent.
        self.count.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn release_one(&self) -> Result<()> {
        let mut count = self.lock_count();
        if *count == 0 {
            return Err(Error::invalid_state(
                "release on a guard with no outstanding holds",
            ));
        }
        *count -= 1;
        if *count == 0 {
            debug!("guard: last hold released, deactivating");
            if let Some(deactivate) = &self.deactivate {
                deactivate()?;
            }
        }
        Ok(())
    }
}

/// Counts concurrent holds on a resource and fires activate/deactivate at
/// the zero boundary.
///
/// Cloning yields another handle to the same count.
#[derive(Clone)]
pub struct ReferenceGuard {
    inner: Arc<GuardInner>,
}

impl ReferenceGuard {
    /// Creates a guard bound to the given transition callbacks.
    ///
    /// Callbacks run with the guard's internal lock held and must not call
    /// back into the same guard.
    pub fn new<A, D>(activate: A, deactivate: D) -> Self
    where
        A: Fn() -> Result<()> + Send + Sync + 'static,
        D: Fn() -> Result<()> + Send + Sync + 'static,
    {
        Self::from_parts(Some(Box::new(activate)), Some(Box::new(deactivate)))
    }

    /// Creates a guard that only counts, with no side effects.
    pub fn unbound() -> Self {
        Self::from_parts(None, None)
    }

    fn from_parts(activate: Option<Transition>, deactivate: Option<Transition>) -> Self {
        Self {
            inner: Arc::new(GuardInner {
                count: Mutex::new(0),
                activate,
                deactivate,
            }),
        }
    }

    /// Takes a hold, activating the resource if this is the first one.
    ///
    /// If activation fails the count is left untouched and the error is
    /// returned; no hold is created.
    pub fn acquire(&self) -> Result<ScopedHold> {
        let mut count = self.inner.lock_count();
        let next = count
            .checked_add(1)
            .ok_or_else(|| Error::invalid_state("hold count overflow"))?;
        if *count == 0 {
            debug!("guard: first hold acquired, activating");
            if let Some(activate) = &self.inner.activate {
                activate()?;
            }
        }
        *count = next;
        Ok(ScopedHold {
            guard: Arc::downgrade(&self.inner),
            released: false,
        })
    }

    /// Releases `hold` now instead of waiting for it to drop.
    ///
    /// Releasing an already-released hold is a no-op. A hold issued by a
    /// different guard is rejected with `InvalidState` and left untouched.
    pub fn release(&self, hold: &mut ScopedHold) -> Result<()> {
        if !std::ptr::eq(hold.guard.as_ptr(), Arc::as_ptr(&self.inner)) {
            return Err(Error::invalid_state("hold was issued by a different guard"));
        }
        hold.release()
    }

    /// Returns true while at least one hold is outstanding.
    pub fn is_active(&self) -> bool {
        *self.inner.lock_count() > 0
    }

    #[cfg(test)]
    fn hold_count(&self) -> u32 {
        *self.inner.lock_count()
    }
}

impl Default for ReferenceGuard {
    fn default() -> Self {
        Self::unbound()
    }
}

impl fmt::Debug for ReferenceGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReferenceGuard")
            .field("active", &self.is_active())
            .finish()
    }
}

/// One outstanding hold on a [`ReferenceGuard`].
///
/// Dropping the token releases the hold. Release happens at most once; later
/// calls to [`release`](ScopedHold::release) succeed without effect.
#[must_use = "the hold is released as soon as the ScopedHold is dropped"]
pub struct ScopedHold {
    guard: Weak<GuardInner>,
    released: bool,
}

impl ScopedHold {
    /// Releases the hold, deactivating the resource if it was the last one.
    ///
    /// Returns `InvalidState` if the guard that issued the hold no longer
    /// exists. Errors from the deactivate callback are passed through; the
    /// hold counts as released either way.
    pub fn release(&mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        let inner = self
            .guard
            .upgrade()
            .ok_or_else(|| Error::invalid_state("hold outlived the guard that issued it"))?;
        inner.release_one()
    }

    /// Returns true once the hold has been released.
    pub fn is_released(&self) -> bool {
        self.released
    }
}

impl Drop for ScopedHold {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if self.guard.strong_count() == 0 {
            self.released = true;
            debug!("guard: dropping hold after its guard was dropped");
            return;
        }
        if let Err(e) = self.release() {
            warn!("guard: failed to release hold on drop: {}", e);
        }
    }
}

impl fmt::Debug for ScopedHold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedHold")
            .field("released", &self.released)
            .finish()
    }
}
