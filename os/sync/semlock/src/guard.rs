use crate::{Result, SemLock};
use core::time::Duration;

/// Holds one acquisition of a [`SemLock`] and releases it on drop.
///
/// Release errors cannot surface from `drop`; they are logged. Call
/// [`unlock`](Self::unlock) to observe them.
#[must_use = "dropping the guard releases the lock immediately"]
#[derive(Debug)]
pub struct SemLockGuard<'a> {
    lock: &'a SemLock,
    released: bool,
}

impl SemLock {
    /// Blocks until acquired and returns a guard.
    ///
    /// # Errors
    /// See [`acquire`](Self::acquire).
    pub fn lock(&self) -> Result<SemLockGuard<'_>> {
        self.acquire(true, None)?;
        Ok(SemLockGuard::new(self))
    }

    /// A single non-blocking attempt.
    ///
    /// # Errors
    /// See [`acquire`](Self::acquire).
    pub fn try_lock(&self) -> Result<Option<SemLockGuard<'_>>> {
        Ok(self.acquire(false, None)?.then(|| SemLockGuard::new(self)))
    }

    /// Waits at most `timeout`.
    ///
    /// # Errors
    /// See [`acquire`](Self::acquire).
    pub fn lock_timeout(&self, timeout: Duration) -> Result<Option<SemLockGuard<'_>>> {
        Ok(self
            .acquire(true, Some(timeout))?
            .then(|| SemLockGuard::new(self)))
    }

    /// Closure convenience, built on the guard.
    ///
    /// # Errors
    /// Acquisition or release failures.
    pub fn with_lock<R>(&self, f: impl FnOnce() -> R) -> Result<R> {
        let guard = self.lock()?;
        let out = f();
        guard.unlock()?;
        Ok(out)
    }
}

impl<'a> SemLockGuard<'a> {
    const fn new(lock: &'a SemLock) -> Self {
        Self {
            lock,
            released: false,
        }
    }

    /// Releases now, reporting failures.
    ///
    /// # Errors
    /// See [`SemLock::release`].
    pub fn unlock(mut self) -> Result<()> {
        self.released = true;
        self.lock.release()
    }
}

impl Drop for SemLockGuard<'_> {
    fn drop(&mut self) {
        if !self.released
            && let Err(err) = self.lock.release()
        {
            log::warn!("releasing {:?} on drop failed: {err}", self.lock.kind());
        }
    }
}
