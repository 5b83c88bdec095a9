//! Windows kernel semaphores.
//!
//! Waits block in a single `WaitForMultipleObjects` on the semaphore and the
//! cancellation event of the caller's [`CancelToken`].

use super::{RawSemHandle, RawSemaphore};
use crate::cancel::Interruption;
use crate::wait::{Deadline, WaitOutcome};
use crate::{CancelToken, Result, SemLockError};
use core::fmt;
use core::ptr;
use std::ffi::OsStr;
use std::io;
use std::os::windows::ffi::OsStrExt;
use winapi::shared::minwindef::{DWORD, FALSE, TRUE};
use winapi::shared::winerror::{
    ERROR_ALREADY_EXISTS, ERROR_FILE_NOT_FOUND, ERROR_TOO_MANY_POSTS, WAIT_TIMEOUT,
};
use winapi::um::errhandlingapi::{GetLastError, SetLastError};
use winapi::um::handleapi::CloseHandle;
use winapi::um::synchapi::{
    CreateEventW, CreateSemaphoreW, OpenSemaphoreW, ReleaseSemaphore, ResetEvent, SetEvent,
    WaitForMultipleObjects, WaitForSingleObject,
};
use winapi::um::winbase::{INFINITE, WAIT_FAILED, WAIT_OBJECT_0};
use winapi::um::winnt::{HANDLE, LONG, SEMAPHORE_ALL_ACCESS};

/// An owned kernel handle, closed on drop.
struct Handle(HANDLE);

// Kernel handles may be used from any thread.
unsafe impl Send for Handle {}
unsafe impl Sync for Handle {}

impl Drop for Handle {
    fn drop(&mut self) {
        if unsafe { CloseHandle(self.0) } == 0 {
            log::warn!("CloseHandle failed: {}", io::Error::last_os_error());
        }
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({:p})", self.0)
    }
}

fn wide_name(name: &str) -> Result<Vec<u16>> {
    if name.contains('\0') {
        return Err(SemLockError::InvalidName {
            name: name.to_owned(),
        });
    }
    Ok(OsStr::new(name).encode_wide().chain(Some(0)).collect())
}

/// A named kernel semaphore.
#[derive(Debug)]
pub struct Semaphore {
    handle: Handle,
}

impl Semaphore {
    fn raw(&self) -> HANDLE {
        self.handle.0
    }
}

/// Rounds up so a wait never ends before its deadline.
fn wait_millis(deadline: Option<Deadline>) -> DWORD {
    deadline.map_or(INFINITE, |d| {
        let millis = d.remaining().as_nanos().div_ceil(1_000_000);
        DWORD::try_from(millis).unwrap_or(INFINITE - 1)
    })
}

impl RawSemaphore for Semaphore {
    fn create(name: &str, value: u32, maxvalue: u32) -> Result<Self> {
        let invalid = || SemLockError::InvalidValue { value, maxvalue };
        let initial = LONG::try_from(value).map_err(|_| invalid())?;
        let maximum = LONG::try_from(maxvalue).map_err(|_| invalid())?;
        let wide = wide_name(name)?;

        let raw = unsafe {
            SetLastError(0);
            CreateSemaphoreW(ptr::null_mut(), initial, maximum, wide.as_ptr())
        };
        if raw.is_null() {
            return Err(SemLockError::last_os_error("CreateSemaphoreW"));
        }
        let handle = Handle(raw);

        // CreateSemaphoreW hands back the existing object on a collision.
        if unsafe { GetLastError() } == ERROR_ALREADY_EXISTS {
            drop(handle);
            return Err(SemLockError::AlreadyExists {
                name: name.to_owned(),
            });
        }
        Ok(Self { handle })
    }

    fn open(name: &str) -> Result<Self> {
        let wide = wide_name(name)?;
        let raw = unsafe { OpenSemaphoreW(SEMAPHORE_ALL_ACCESS, FALSE, wide.as_ptr()) };
        if raw.is_null() {
            if unsafe { GetLastError() } == ERROR_FILE_NOT_FOUND {
                return Err(SemLockError::NotFound {
                    name: name.to_owned(),
                });
            }
            return Err(SemLockError::last_os_error("OpenSemaphoreW"));
        }
        Ok(Self {
            handle: Handle(raw),
        })
    }

    unsafe fn from_raw(handle: RawSemHandle) -> Option<Self> {
        let raw: HANDLE = ptr::with_exposed_provenance_mut(handle);
        if raw.is_null() {
            return None;
        }
        Some(Self {
            handle: Handle(raw),
        })
    }

    fn as_raw(&self) -> RawSemHandle {
        self.raw().expose_provenance()
    }

    fn unlink(_name: &str) -> Result<()> {
        // The name goes away with the last handle.
        Ok(())
    }

    fn post(&self) -> Result<()> {
        if unsafe { ReleaseSemaphore(self.raw(), 1, ptr::null_mut()) } == 0 {
            if unsafe { GetLastError() } == ERROR_TOO_MANY_POSTS {
                return Err(SemLockError::OverRelease);
            }
            return Err(SemLockError::last_os_error("ReleaseSemaphore"));
        }
        Ok(())
    }

    fn try_wait(&self) -> Result<bool> {
        match unsafe { WaitForSingleObject(self.raw(), 0) } {
            WAIT_OBJECT_0 => Ok(true),
            WAIT_TIMEOUT => Ok(false),
            _ => Err(SemLockError::last_os_error("WaitForSingleObject")),
        }
    }

    fn wait(&self, deadline: Option<Deadline>, cancel: &CancelToken) -> Result<WaitOutcome> {
        if self.try_wait()? {
            return Ok(WaitOutcome::Acquired);
        }

        let event = cancel.event()?;
        let handles = [self.raw(), event.raw()];
        let mut seen = cancel.generation();

        loop {
            if cancel.is_cancelled() {
                return Ok(WaitOutcome::Interrupted);
            }

            let res = unsafe {
                WaitForMultipleObjects(2, handles.as_ptr(), FALSE, wait_millis(deadline))
            };
            match res {
                WAIT_OBJECT_0 => return Ok(WaitOutcome::Acquired),
                // The timer may fire a tick early; only the deadline decides.
                WAIT_TIMEOUT if deadline.is_none_or(|d| d.has_elapsed()) => {
                    return Ok(WaitOutcome::TimedOut);
                }
                WAIT_TIMEOUT => {}
                WAIT_FAILED => return Err(SemLockError::last_os_error("WaitForMultipleObjects")),
                r if r == WAIT_OBJECT_0 + 1 => {
                    if cancel.observe(&mut seen) == Interruption::Abort {
                        return Ok(WaitOutcome::Interrupted);
                    }
                    event.reset();
                    if deadline.is_some_and(|d| d.has_elapsed()) {
                        return Ok(WaitOutcome::TimedOut);
                    }
                }
                other => {
                    return Err(SemLockError::Resource {
                        op: "WaitForMultipleObjects",
                        source: io::Error::other(format!("unrecognized wait result {other}")),
                    });
                }
            }
        }
    }

    fn value(&self) -> Result<u32> {
        // No direct query exists: take one unit and read the previous count
        // while giving it back.
        match unsafe { WaitForSingleObject(self.raw(), 0) } {
            WAIT_OBJECT_0 => {
                let mut previous: LONG = 0;
                if unsafe { ReleaseSemaphore(self.raw(), 1, &raw mut previous) } == 0 {
                    return Err(SemLockError::last_os_error("ReleaseSemaphore"));
                }
                Ok(u32::try_from(previous).unwrap_or(0) + 1)
            }
            WAIT_TIMEOUT => Ok(0),
            _ => Err(SemLockError::last_os_error("WaitForSingleObject")),
        }
    }

    fn check_release(&self, _maxvalue: u32) -> Result<()> {
        // The kernel enforces the maximum in `post`.
        Ok(())
    }
}

/// Manual-reset event used to wake waiters of a [`CancelToken`].
#[derive(Debug)]
pub struct Event {
    handle: Handle,
}

impl Event {
    pub(crate) fn new() -> Result<Self> {
        let raw = unsafe { CreateEventW(ptr::null_mut(), TRUE, FALSE, ptr::null()) };
        if raw.is_null() {
            return Err(SemLockError::last_os_error("CreateEventW"));
        }
        Ok(Self {
            handle: Handle(raw),
        })
    }

    pub(crate) fn set(&self) {
        unsafe { SetEvent(self.handle.0) };
    }

    pub(crate) fn reset(&self) {
        unsafe { ResetEvent(self.handle.0) };
    }

    fn raw(&self) -> HANDLE {
        self.handle.0
    }
}
