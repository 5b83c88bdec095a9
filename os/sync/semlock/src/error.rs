use std::io;

/// Errors reported by [`SemLock`](crate::SemLock) and the platform layer.
///
/// A failed non-blocking or timed acquisition is not an error; it is reported
/// as `Ok(false)`.
#[derive(Debug, thiserror::Error)]
pub enum SemLockError {
    #[error("a semaphore named {name:?} already exists")]
    AlreadyExists { name: String },
    #[error("no semaphore named {name:?} exists")]
    NotFound { name: String },
    #[error("the wait was interrupted by a cancellation request")]
    Interrupted,
    #[error("attempt to release recursive lock not owned by thread")]
    OwnershipViolation,
    #[error("semaphore or lock released too many times")]
    OverRelease,
    #[error("timeout is too large")]
    Overflow,
    #[error("{0} is not supported on this platform")]
    Unsupported(&'static str),
    #[error("unrecognized kind {0}")]
    UnknownKind(i32),
    #[error("invalid initial value {value} for maximum value {maxvalue}")]
    InvalidValue { value: u32, maxvalue: u32 },
    #[error("invalid semaphore name {name:?}")]
    InvalidName { name: String },
    #[error("the lock has no retained name to reopen it by")]
    Unnamed,
    #[error("the lock has been closed")]
    Closed,
    #[error("{op} failed")]
    Resource {
        op: &'static str,
        #[source]
        source: io::Error,
    },
}

impl SemLockError {
    /// Wraps the calling thread's last OS error (`errno` / `GetLastError`).
    pub(crate) fn last_os_error(op: &'static str) -> Self {
        Self::Resource {
            op,
            source: io::Error::last_os_error(),
        }
    }

    /// Whether this error is the cancellation outcome of a wait rather than
    /// a failure.
    #[must_use]
    pub const fn is_interrupted(&self) -> bool {
        matches!(self, Self::Interrupted)
    }

    /// The OS error code carried by a [`SemLockError::Resource`], if any.
    #[must_use]
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Self::Resource { source, .. } => source.raw_os_error(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interrupted_is_distinct_from_failures() {
        assert!(SemLockError::Interrupted.is_interrupted());
        assert!(!SemLockError::OverRelease.is_interrupted());
        assert!(!SemLockError::Overflow.is_interrupted());
    }

    #[test]
    fn resource_errors_keep_the_os_code() {
        let err = SemLockError::Resource {
            op: "sem_post",
            source: io::Error::from_raw_os_error(22),
        };
        assert_eq!(err.raw_os_error(), Some(22));
        assert_eq!(err.to_string(), "sem_post failed");
        assert_eq!(SemLockError::Closed.raw_os_error(), None);
    }

    #[test]
    fn messages_match_the_host_facing_wording() {
        assert_eq!(
            SemLockError::OverRelease.to_string(),
            "semaphore or lock released too many times"
        );
        assert_eq!(SemLockError::UnknownKind(7).to_string(), "unrecognized kind 7");
    }
}
