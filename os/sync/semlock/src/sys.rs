//! # Platform wait primitive
//!
//! One contract, [`RawSemaphore`], with one implementation per OS family,
//! picked at build time and exported as [`Semaphore`]:
//!
//! * [`posix`]: `sem_open` named semaphores.
//! * [`windows`]: named kernel semaphores (`CreateSemaphoreW`).
//!
//! Closing is tied to `Drop`. Unlinking a name does not invalidate handles
//! that are already open.

use crate::wait::{Deadline, WaitOutcome};
use crate::{CancelToken, Result};

#[cfg(unix)]
pub mod posix;
#[cfg(windows)]
pub mod windows;

#[cfg(unix)]
pub use posix::Semaphore;
#[cfg(windows)]
pub use windows::Semaphore;

/// A semaphore handle flattened to an integer, for handing it to code that
/// reconstructs the lock (a `sem_t*` on POSIX, a `HANDLE` on Windows).
pub type RawSemHandle = usize;

/// The operations every platform semaphore provides.
pub trait RawSemaphore: Sized + Send + Sync {
    /// Creates a new named semaphore holding `value`, refusing to attach to
    /// an existing one.
    ///
    /// # Errors
    /// [`AlreadyExists`](crate::SemLockError::AlreadyExists) on a name
    /// collision, [`Resource`](crate::SemLockError::Resource) otherwise.
    fn create(name: &str, value: u32, maxvalue: u32) -> Result<Self>;

    /// Attaches to an existing named semaphore.
    ///
    /// # Errors
    /// [`NotFound`](crate::SemLockError::NotFound) if no such name exists.
    fn open(name: &str) -> Result<Self>;

    /// Takes ownership of a raw handle; `None` for a null handle.
    ///
    /// # Safety
    /// `handle` must be a live semaphore handle of this platform that no
    /// other owner will close.
    unsafe fn from_raw(handle: RawSemHandle) -> Option<Self>;

    fn as_raw(&self) -> RawSemHandle;

    /// Removes `name` from the OS namespace. A no-op where names vanish with
    /// their last handle.
    ///
    /// # Errors
    /// [`NotFound`](crate::SemLockError::NotFound) for unknown names.
    fn unlink(name: &str) -> Result<()>;

    /// Increments the value, waking one waiter.
    ///
    /// # Errors
    /// [`OverRelease`](crate::SemLockError::OverRelease) when the OS refuses
    /// to go past its maximum.
    fn post(&self) -> Result<()>;

    /// Decrements the value if that does not block.
    ///
    /// # Errors
    /// OS failures other than "would block".
    fn try_wait(&self) -> Result<bool>;

    /// Decrements the value, blocking until `deadline` (forever on `None`)
    /// or until `cancel` aborts.
    ///
    /// # Errors
    /// OS failures; timeouts and cancellation are [`WaitOutcome`]s.
    fn wait(&self, deadline: Option<Deadline>, cancel: &CancelToken) -> Result<WaitOutcome>;

    /// Current value, negative waiter counts reported as zero.
    ///
    /// # Errors
    /// [`Unsupported`](crate::SemLockError::Unsupported) where the OS cannot
    /// report it.
    fn value(&self) -> Result<u32>;

    /// Whether the value is zero.
    ///
    /// # Errors
    /// OS failures.
    fn is_zero(&self) -> Result<bool> {
        Ok(self.value()? == 0)
    }

    /// Best-effort check, before a [`post`](Self::post), that the value is
    /// still below `maxvalue`. Racy against other processes.
    ///
    /// # Errors
    /// [`OverRelease`](crate::SemLockError::OverRelease) if the post would
    /// exceed `maxvalue`.
    fn check_release(&self, maxvalue: u32) -> Result<()>;
}
