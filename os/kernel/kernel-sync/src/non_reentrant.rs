use core::{
    cell::UnsafeCell,
    fmt,
    ops::{Deref, DerefMut},
    sync::atomic::{AtomicBool, Ordering},
};

/// Exclusive access to `T` for code that must never be re-entered.
///
/// On a single CPU without a scheduler the only way to observe the cell as
/// busy is to re-enter it, e.g. from an interrupt handler that fired while the
/// interrupted path was inside. Waiting would never finish, so [`enter`](Self::enter)
/// does not spin: it fails and lets the caller report the violation.
pub struct NonReentrant<T> {
    /// entry state
    /// * `false`: idle
    /// * `true`: a guard is alive
    active: AtomicBool,
    inner: UnsafeCell<T>,
}

// Safety: a single live guard at a time; only T: Send may cross threads.
unsafe impl<T: Send> Sync for NonReentrant<T> {}

/// Returned by [`NonReentrant::enter`] while another guard is alive.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Reentered;

impl fmt::Display for Reentered {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("non-reentrant section entered twice")
    }
}

impl<T> NonReentrant<T> {
    pub const fn new(inner: T) -> Self {
        Self {
            active: AtomicBool::new(false),
            inner: UnsafeCell::new(inner),
        }
    }

    /// Enter the section; fails immediately if it is already entered.
    ///
    /// # Errors
    /// [`Reentered`] if a guard returned by an earlier call is still alive.
    #[inline]
    pub fn enter(&self) -> Result<NonReentrantGuard<'_, T>, Reentered> {
        if self
            .active
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
        {
            Ok(NonReentrantGuard { cell: self })
        } else {
            Err(Reentered)
        }
    }

    /// Closure convenience, built on the guard.
    ///
    /// # Errors
    /// [`Reentered`] if the section is already entered; `f` is not called.
    #[inline]
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> Result<R, Reentered> {
        let mut g = self.enter()?;
        Ok(f(&mut g))
    }

    /// Whether a guard is currently alive.
    #[inline]
    pub fn is_entered(&self) -> bool {
        self.active.load(Ordering::Relaxed)
    }

    /// Mutable access when you have `&mut self` (no entry possible).
    #[inline]
    pub const fn get_mut(&mut self) -> &mut T {
        self.inner.get_mut()
    }

    #[inline]
    pub fn into_inner(self) -> T {
        self.inner.into_inner()
    }
}

pub struct NonReentrantGuard<'a, T> {
    cell: &'a NonReentrant<T>,
}

impl<T> Deref for NonReentrantGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        unsafe { &*self.cell.inner.get() }
    }
}

impl<T> DerefMut for NonReentrantGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.cell.inner.get() }
    }
}

impl<T> Drop for NonReentrantGuard<'_, T> {
    fn drop(&mut self) {
        // Release publishes the section's writes.
        self.cell.active.store(false, Ordering::Release);
    }
}
