//! Construction, reconstruction, teardown and fork recovery of [`SemLock`]s.

use crate::lock::{Kind, SemLock};
use crate::sys::{RawSemHandle, RawSemaphore, Semaphore};
use crate::thread_ident::NO_THREAD;
use crate::{Result, SemLockError};
use core::sync::atomic::{AtomicU32, Ordering};
use log::debug;

/// Attempts at finding a free name in [`SemLock::create_anonymous`].
const ANONYMOUS_NAME_ATTEMPTS: u32 = 100;

static ANONYMOUS_COUNTER: AtomicU32 = AtomicU32::new(0);

/// Everything needed to attach to an existing lock from elsewhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SemLockIdentity {
    /// Raw handle, valid in the creating process (and its forks).
    pub handle: RawSemHandle,
    pub kind: Kind,
    pub maxvalue: u32,
    /// Present unless the name was unlinked at creation.
    pub name: Option<String>,
}

impl SemLock {
    /// Creates a new named OS semaphore holding `value`.
    ///
    /// With `unlink == true` the name is removed right after creation: the
    /// lock stays usable through its handle (and in forked children) but can
    /// never be opened by name, and [`name`](Self::name) is `None`.
    ///
    /// # Errors
    /// * [`SemLockError::InvalidValue`] if `maxvalue` is zero or below `value`.
    /// * [`SemLockError::AlreadyExists`] if `name` is taken.
    /// * [`SemLockError::InvalidName`] and OS failures.
    pub fn create(
        kind: Kind,
        value: u32,
        maxvalue: u32,
        name: &str,
        unlink: bool,
    ) -> Result<Self> {
        if maxvalue == 0 || value > maxvalue {
            return Err(SemLockError::InvalidValue { value, maxvalue });
        }

        // Dropping `sem` on a failed unlink closes the handle again.
        let sem = Semaphore::create(name, value, maxvalue)?;
        if unlink {
            Semaphore::unlink(name)?;
        }

        debug!("created {kind:?} {name:?} (value {value}, max {maxvalue}, unlinked: {unlink})");
        let name = (!unlink).then(|| name.to_owned());
        Ok(Self::from_parts(sem, kind, maxvalue, name))
    }

    /// Creates a lock under a generated name and unlinks it immediately.
    ///
    /// Such a lock is shared only through its handle: with forked children
    /// or via [`from_raw`](Self::from_raw).
    ///
    /// # Errors
    /// As [`create`](Self::create); [`SemLockError::AlreadyExists`] only if
    /// no free name was found after repeated attempts.
    pub fn create_anonymous(kind: Kind, value: u32, maxvalue: u32) -> Result<Self> {
        let pid = std::process::id();
        let mut last = None;
        for _ in 0..ANONYMOUS_NAME_ATTEMPTS {
            let n = ANONYMOUS_COUNTER.fetch_add(1, Ordering::Relaxed);
            let name = format!("/semlock-{pid}-{n}");
            match Self::create(kind, value, maxvalue, &name, true) {
                Err(err @ SemLockError::AlreadyExists { .. }) => last = Some(err),
                other => return other,
            }
        }
        Err(last.unwrap_or(SemLockError::AlreadyExists {
            name: format!("/semlock-{pid}-*"),
        }))
    }

    /// Attaches to the lock described by `identity` through its name.
    ///
    /// `kind` and `maxvalue` are taken from `identity` as given; they are
    /// not checked against the OS object.
    ///
    /// # Errors
    /// * [`SemLockError::Unnamed`] if `identity` carries no name.
    /// * [`SemLockError::NotFound`] if the name no longer exists.
    pub fn open(identity: &SemLockIdentity) -> Result<Self> {
        let name = identity.name.as_deref().ok_or(SemLockError::Unnamed)?;
        let sem = Semaphore::open(name)?;
        debug!("opened {:?} {name:?}", identity.kind);
        Ok(Self::from_parts(
            sem,
            identity.kind,
            identity.maxvalue,
            identity.name.clone(),
        ))
    }

    /// Attaches to the lock described by `identity` through its raw handle.
    ///
    /// # Safety
    /// `identity.handle` must be a live semaphore handle in this process
    /// that nothing else closes; the new lock takes ownership of it.
    ///
    /// # Errors
    /// [`SemLockError::Closed`] for a null handle.
    pub unsafe fn from_raw(identity: SemLockIdentity) -> Result<Self> {
        let sem = unsafe { Semaphore::from_raw(identity.handle) }.ok_or(SemLockError::Closed)?;
        debug!("attached {:?} to raw handle {:#x}", identity.kind, identity.handle);
        Ok(Self::from_parts(
            sem,
            identity.kind,
            identity.maxvalue,
            identity.name,
        ))
    }

    /// What [`open`](Self::open) or [`from_raw`](Self::from_raw) need to
    /// attach to this lock. The handle is `0` once closed.
    #[must_use]
    pub fn identity(&self) -> SemLockIdentity {
        SemLockIdentity {
            handle: self.sem.as_ref().map_or(0, RawSemaphore::as_raw),
            kind: self.kind,
            maxvalue: self.maxvalue,
            name: self.name.clone(),
        }
    }

    /// Closes the OS handle. Later calls are no-ops; the name, if any, stays
    /// published until [`unlink`] is called.
    pub fn close(&mut self) {
        if let Some(sem) = self.sem.take() {
            debug!("closing {:?} {:?}", self.kind, self.name);
            drop(sem);
        }
    }

    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.sem.is_none()
    }

    /// Forgets acquisitions made before a `fork`.
    ///
    /// The child inherits the OS value as it is; only the local count and
    /// owner are reset, so the child does not believe it holds locks taken by
    /// threads that only exist in the parent.
    pub fn after_fork(&self) {
        self.count.store(0, Ordering::Release);
        self.owner.store(NO_THREAD, Ordering::Release);
    }
}

/// Removes `name` from the OS namespace; open handles remain usable.
///
/// # Errors
/// [`SemLockError::NotFound`] for unknown names (POSIX), OS failures.
pub fn unlink(name: &str) -> Result<()> {
    Semaphore::unlink(name)?;
    debug!("unlinked {name:?}");
    Ok(())
}
