use crate::wait::INTERRUPT_GRACE;
use core::fmt;
use core::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

/// Cooperative cancellation for blocking waits.
///
/// A token is shared (cheaply cloned) between the thread that waits and
/// whoever may want to abort the wait, such as a signal handler or a
/// supervisor thread.
///
/// * [`interrupt`](Self::interrupt) wakes waiters. After a short grace window
///   the waiter re-checks the token; if nobody cancelled it in the meantime
///   the interruption was transient and the wait resumes with the time that
///   is left.
/// * [`cancel`](Self::cancel) wakes waiters and makes them give up with
///   [`SemLockError::Interrupted`](crate::SemLockError::Interrupted). It stays
///   in effect until [`reset`](Self::reset).
///
/// Both requests only touch atomics (and, on Windows, signal an event), so
/// they may be issued from a POSIX signal handler.
#[derive(Clone, Default)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    cancelled: AtomicBool,
    /// Bumped on every wake request.
    interrupts: AtomicU64,
    #[cfg(windows)]
    event: std::sync::OnceLock<crate::sys::windows::Event>,
}

/// What a waiter should do after looking at its token.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum Interruption {
    /// Nothing happened since the last look.
    None,
    /// Woken, but not cancelled; keep waiting.
    Transient,
    /// Cancelled; stop waiting without acquiring.
    Abort,
}

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request that all current and future waits on this token abort.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.wake();
    }

    /// Wake current waiters without cancelling them.
    pub fn interrupt(&self) {
        self.wake();
    }

    /// Withdraw a previous [`cancel`](Self::cancel).
    pub fn reset(&self) {
        self.inner.cancelled.store(false, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    fn wake(&self) {
        self.inner.interrupts.fetch_add(1, Ordering::SeqCst);
        #[cfg(windows)]
        if let Some(event) = self.inner.event.get() {
            event.set();
        }
    }

    /// Snapshot of the wake counter, taken when a wait starts.
    pub(crate) fn generation(&self) -> u64 {
        self.inner.interrupts.load(Ordering::SeqCst)
    }

    /// Looks at the token and, if it was woken since `seen`, gives the
    /// requester [`INTERRUPT_GRACE`] to follow up with a cancellation.
    pub(crate) fn observe(&self, seen: &mut u64) -> Interruption {
        if self.is_cancelled() {
            return Interruption::Abort;
        }

        let now = self.generation();
        if now == *seen {
            return Interruption::None;
        }
        *seen = now;

        thread::sleep(INTERRUPT_GRACE);
        if self.is_cancelled() {
            log::trace!("wait cancelled after interruption");
            Interruption::Abort
        } else {
            log::trace!("transient interruption, resuming wait");
            Interruption::Transient
        }
    }

    /// The manual-reset event that [`wake`](Self::wake) signals, created on
    /// first use.
    #[cfg(windows)]
    pub(crate) fn event(&self) -> crate::Result<&crate::sys::windows::Event> {
        if let Some(event) = self.inner.event.get() {
            return Ok(event);
        }
        let created = crate::sys::windows::Event::new()?;
        // Losing the race drops (and closes) our copy.
        let _ = self.inner.event.set(created);
        self.inner
            .event
            .get()
            .ok_or(crate::SemLockError::Unsupported("cancellation event"))
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .field("interrupts", &self.generation())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiet_token_reports_nothing() {
        let token = CancelToken::new();
        let mut seen = token.generation();
        assert_eq!(token.observe(&mut seen), Interruption::None);
    }

    #[test]
    fn interrupt_alone_is_transient() {
        let token = CancelToken::new();
        let mut seen = token.generation();
        token.interrupt();
        assert_eq!(token.observe(&mut seen), Interruption::Transient);
        // consumed
        assert_eq!(token.observe(&mut seen), Interruption::None);
    }

    #[test]
    fn cancel_is_sticky_until_reset() {
        let token = CancelToken::new();
        let mut seen = token.generation();
        token.cancel();
        assert_eq!(token.observe(&mut seen), Interruption::Abort);
        assert_eq!(token.observe(&mut seen), Interruption::Abort);

        token.reset();
        assert!(!token.is_cancelled());
        assert_eq!(token.observe(&mut seen), Interruption::Transient);
        assert_eq!(token.observe(&mut seen), Interruption::None);
    }

    #[test]
    fn clones_share_state() {
        let token = CancelToken::new();
        let other = token.clone();
        other.cancel();
        assert!(token.is_cancelled());
    }
}
