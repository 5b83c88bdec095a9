//! # Bounded, cancellable waiting
//!
//! The platform layer blocks in one of two ways:
//!
//! * [`sliced_wait`]: a native timed wait, cut into slices of at most
//!   [`WAIT_SLICE`] so that a [`CancelToken`] is looked at regularly.
//! * [`poll_wait`]: repeated non-blocking attempts separated by sleeps that
//!   start at [`POLL_INITIAL_DELAY`] and double up to [`POLL_MAX_DELAY`],
//!   for platforms without a native timed wait.
//!
//! Both recompute the remaining time from the original [`Deadline`] on every
//! round, so spurious wake-ups and transient interruptions never extend the
//! total wait.

use crate::cancel::{CancelToken, Interruption};
use crate::{Result, SemLockError};
use core::time::Duration;
use std::thread;
use std::time::Instant;

/// First sleep of the polling fallback.
pub const POLL_INITIAL_DELAY: Duration = Duration::from_millis(1);

/// Longest sleep of the polling fallback.
pub const POLL_MAX_DELAY: Duration = Duration::from_millis(20);

/// Longest single native wait before the cancellation token is re-checked.
pub const WAIT_SLICE: Duration = Duration::from_millis(20);

/// Time given to the requester of an interruption to turn it into a
/// cancellation.
pub const INTERRUPT_GRACE: Duration = Duration::from_millis(1);

/// Exclusive upper bound for timeouts: half of the Windows `INFINITE`
/// sentinel, in milliseconds (about 24.8 days). Applied on every platform.
pub const MAX_TIMEOUT: Duration = Duration::from_millis(0x7FFF_FFFF);

const MAX_TIMEOUT_MS: f64 = 2_147_483_647.0;

/// Result of a blocking wait that did not fail.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum WaitOutcome {
    Acquired,
    TimedOut,
    Interrupted,
}

/// An absolute point on the monotonic clock after which a wait gives up.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Deadline(Instant);

impl Deadline {
    /// The deadline `timeout` from now.
    ///
    /// # Errors
    /// [`SemLockError::Overflow`] if `timeout` is not below [`MAX_TIMEOUT`].
    pub fn after(timeout: Duration) -> Result<Self> {
        if timeout >= MAX_TIMEOUT {
            return Err(SemLockError::Overflow);
        }
        Instant::now()
            .checked_add(timeout)
            .map(Self)
            .ok_or(SemLockError::Overflow)
    }

    /// Time left, zero once elapsed.
    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.0.saturating_duration_since(Instant::now())
    }

    #[must_use]
    pub fn has_elapsed(&self) -> bool {
        self.remaining().is_zero()
    }
}

/// Converts a timeout in (possibly fractional or negative) seconds.
///
/// Negative values behave as zero.
///
/// # Errors
/// [`SemLockError::Overflow`] for NaN and for values at or above
/// [`MAX_TIMEOUT`].
pub fn timeout_from_secs_f64(secs: f64) -> Result<Duration> {
    if secs.is_nan() || secs * 1000.0 >= MAX_TIMEOUT_MS {
        return Err(SemLockError::Overflow);
    }
    Ok(Duration::from_secs_f64(secs.max(0.0)))
}

/// Exponential-then-capped sleep schedule for [`poll_wait`].
#[derive(Debug, Clone)]
pub struct Backoff {
    delay: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new()
    }
}

impl Backoff {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            delay: POLL_INITIAL_DELAY,
        }
    }

    /// The next sleep, never longer than `remaining`.
    pub fn next_delay(&mut self, remaining: Option<Duration>) -> Duration {
        let delay = remaining.map_or(self.delay, |left| self.delay.min(left));
        self.delay = self.delay.saturating_mul(2).min(POLL_MAX_DELAY);
        delay
    }
}

/// Waits by polling `try_wait` until it succeeds, `deadline` passes or
/// `cancel` aborts.
///
/// `try_wait` is always called at least once, so an elapsed deadline behaves
/// like a non-blocking attempt.
///
/// # Errors
/// Whatever `try_wait` returns.
pub fn poll_wait<F>(
    mut try_wait: F,
    deadline: Option<Deadline>,
    cancel: &CancelToken,
) -> Result<WaitOutcome>
where
    F: FnMut() -> Result<bool>,
{
    let mut seen = cancel.generation();
    let mut backoff = Backoff::new();

    loop {
        if try_wait()? {
            return Ok(WaitOutcome::Acquired);
        }

        let remaining = match deadline {
            Some(deadline) => {
                let left = deadline.remaining();
                if left.is_zero() {
                    return Ok(WaitOutcome::TimedOut);
                }
                Some(left)
            }
            None => None,
        };

        if cancel.observe(&mut seen) == Interruption::Abort {
            return Ok(WaitOutcome::Interrupted);
        }

        thread::sleep(backoff.next_delay(remaining));
    }
}

/// Waits with a native timed wait, one slice at a time.
///
/// `timed_wait(slice)` blocks for at most `slice` and reports whether it
/// acquired. Returning `Ok(false)` early (a signal, a spurious wake-up) is
/// fine; the remaining time is recomputed from `deadline`.
///
/// # Errors
/// Whatever `timed_wait` returns.
pub fn sliced_wait<F>(
    mut timed_wait: F,
    deadline: Option<Deadline>,
    cancel: &CancelToken,
) -> Result<WaitOutcome>
where
    F: FnMut(Duration) -> Result<bool>,
{
    let mut seen = cancel.generation();

    loop {
        let slice = deadline.map_or(WAIT_SLICE, |d| d.remaining().min(WAIT_SLICE));
        if timed_wait(slice)? {
            return Ok(WaitOutcome::Acquired);
        }

        if deadline.is_some_and(|d| d.has_elapsed()) {
            return Ok(WaitOutcome::TimedOut);
        }

        if cancel.observe(&mut seen) == Interruption::Abort {
            return Ok(WaitOutcome::Interrupted);
        }
    }
}
