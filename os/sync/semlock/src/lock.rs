use crate::sys::{RawSemaphore, Semaphore};
use crate::thread_ident::{self, NO_THREAD};
use crate::wait::{Deadline, WaitOutcome};
use crate::{CancelToken, Result, SemLockError};
use core::sync::atomic::{AtomicIsize, AtomicU64, Ordering};
use core::time::Duration;

/// What a [`SemLock`] behaves as.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Kind {
    /// A lock the owning thread may take repeatedly; only the first
    /// acquisition and the last release reach the OS semaphore.
    RecursiveMutex = 0,
    /// A counting semaphore; every acquire and release reaches the OS.
    Semaphore = 1,
}

impl TryFrom<i32> for Kind {
    type Error = SemLockError;

    fn try_from(code: i32) -> Result<Self> {
        match code {
            0 => Ok(Self::RecursiveMutex),
            1 => Ok(Self::Semaphore),
            other => Err(SemLockError::UnknownKind(other)),
        }
    }
}

impl From<Kind> for i32 {
    fn from(kind: Kind) -> Self {
        kind as Self
    }
}

/// A process-local view of a shared OS semaphore.
///
/// The OS object is shared; everything else here is private to this
/// process:
///
/// * `count`: acquisitions minus releases made through this instance since
///   creation or the last [`after_fork`](Self::after_fork). It can go
///   negative for a semaphore that other processes release on our behalf.
/// * `owner`: the thread that made the latest acquisition; for a
///   [`Kind::RecursiveMutex`] with `count > 0` it is the only holder.
#[derive(Debug)]
pub struct SemLock {
    pub(crate) sem: Option<Semaphore>,
    pub(crate) kind: Kind,
    pub(crate) count: AtomicIsize,
    pub(crate) owner: AtomicU64,
    pub(crate) maxvalue: u32,
    pub(crate) name: Option<String>,
    pub(crate) cancel: CancelToken,
}

impl SemLock {
    pub(crate) fn from_parts(
        sem: Semaphore,
        kind: Kind,
        maxvalue: u32,
        name: Option<String>,
    ) -> Self {
        Self {
            sem: Some(sem),
            kind,
            count: AtomicIsize::new(0),
            owner: AtomicU64::new(NO_THREAD),
            maxvalue,
            name,
            cancel: CancelToken::new(),
        }
    }

    pub(crate) fn sem(&self) -> Result<&Semaphore> {
        self.sem.as_ref().ok_or(SemLockError::Closed)
    }

    #[must_use]
    pub const fn kind(&self) -> Kind {
        self.kind
    }

    #[must_use]
    pub const fn maxvalue(&self) -> u32 {
        self.maxvalue
    }

    /// The name the lock can be reopened by, if it was kept at creation.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The token [`acquire`](Self::acquire) observes. Cancel or interrupt a
    /// clone of it to abort waits on this lock.
    #[must_use]
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Acquires the lock, observing this lock's own [`CancelToken`].
    ///
    /// * `blocking == false`: a single non-blocking attempt.
    /// * `blocking == true, timeout == None`: waits until acquired.
    /// * `blocking == true, timeout == Some(t)`: waits at most `t`.
    ///
    /// Returns `Ok(false)` if the lock could not be taken in time.
    ///
    /// # Errors
    /// * [`SemLockError::Interrupted`] if the wait was cancelled.
    /// * [`SemLockError::Overflow`] if `timeout` is not below
    ///   [`MAX_TIMEOUT`](crate::MAX_TIMEOUT).
    /// * [`SemLockError::Closed`] and OS failures.
    pub fn acquire(&self, blocking: bool, timeout: Option<Duration>) -> Result<bool> {
        self.acquire_with(blocking, timeout, &self.cancel)
    }

    /// Like [`acquire`](Self::acquire), but observing `cancel` instead.
    ///
    /// # Errors
    /// See [`acquire`](Self::acquire).
    pub fn acquire_with(
        &self,
        blocking: bool,
        timeout: Option<Duration>,
        cancel: &CancelToken,
    ) -> Result<bool> {
        // Reentry never waits, so its timeout is not looked at.
        if self.kind == Kind::RecursiveMutex && self.is_mine() {
            self.count.fetch_add(1, Ordering::AcqRel);
            return Ok(true);
        }

        let deadline = match timeout {
            Some(t) if blocking => Some(Deadline::after(t)?),
            _ => None,
        };

        let sem = self.sem()?;
        let outcome = if blocking {
            sem.wait(deadline, cancel)?
        } else if sem.try_wait()? {
            WaitOutcome::Acquired
        } else {
            WaitOutcome::TimedOut
        };

        match outcome {
            WaitOutcome::Acquired => {
                self.owner.store(thread_ident::current(), Ordering::Release);
                self.count.fetch_add(1, Ordering::AcqRel);
                Ok(true)
            }
            WaitOutcome::TimedOut => Ok(false),
            WaitOutcome::Interrupted => Err(SemLockError::Interrupted),
        }
    }

    /// Releases one acquisition.
    ///
    /// For a [`Kind::RecursiveMutex`] only the calling owner may release, and
    /// only the last matching release reaches the OS. For a
    /// [`Kind::Semaphore`] the value is checked against
    /// [`maxvalue`](Self::maxvalue) first; that check is best-effort and can
    /// race with other processes.
    ///
    /// # Errors
    /// * [`SemLockError::OwnershipViolation`] for a mutex not held by the
    ///   calling thread.
    /// * [`SemLockError::OverRelease`] when the release would push the value
    ///   above the maximum.
    /// * [`SemLockError::Closed`] and OS failures.
    pub fn release(&self) -> Result<()> {
        let sem = self.sem()?;

        match self.kind {
            Kind::RecursiveMutex => {
                if !self.is_mine() {
                    return Err(SemLockError::OwnershipViolation);
                }
                if self.count.load(Ordering::Acquire) > 1 {
                    self.count.fetch_sub(1, Ordering::AcqRel);
                    return Ok(());
                }
                debug_assert_eq!(self.count.load(Ordering::Acquire), 1);

                // The next holder may win the semaphore as soon as it is
                // posted, so the local state has to be handed back first.
                let me = self.owner.swap(NO_THREAD, Ordering::AcqRel);
                self.count.store(0, Ordering::Release);
                if let Err(err) = sem.post() {
                    self.owner.store(me, Ordering::Release);
                    self.count.store(1, Ordering::Release);
                    return Err(err);
                }
                Ok(())
            }
            Kind::Semaphore => {
                sem.check_release(self.maxvalue)?;
                sem.post()?;
                self.count.fetch_sub(1, Ordering::AcqRel);
                Ok(())
            }
        }
    }
}
