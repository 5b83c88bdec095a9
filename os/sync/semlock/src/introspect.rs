use crate::sys::RawSemaphore;
use crate::thread_ident;
use crate::{Result, SemLock};
use core::sync::atomic::Ordering;

impl SemLock {
    /// Acquisitions minus releases made through this instance.
    ///
    /// Can be negative for a semaphore that other processes released more
    /// often than this one acquired.
    #[must_use]
    pub fn count(&self) -> isize {
        self.count.load(Ordering::Acquire)
    }

    /// Whether the calling thread holds this lock.
    #[must_use]
    pub fn is_mine(&self) -> bool {
        self.count.load(Ordering::Acquire) > 0
            && self.owner.load(Ordering::Acquire) == thread_ident::current()
    }

    /// The semaphore's current value, never negative.
    ///
    /// # Errors
    /// [`SemLockError::Unsupported`](crate::SemLockError::Unsupported) where
    /// the OS cannot report it, [`Closed`](crate::SemLockError::Closed) and
    /// OS failures.
    pub fn value(&self) -> Result<u32> {
        self.sem()?.value()
    }

    /// Whether the semaphore's value is zero.
    ///
    /// Where no value can be read this probes by taking one unit and handing
    /// it straight back.
    ///
    /// # Errors
    /// [`Closed`](crate::SemLockError::Closed) and OS failures.
    pub fn is_zero(&self) -> Result<bool> {
        self.sem()?.is_zero()
    }
}
