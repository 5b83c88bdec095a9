//! POSIX named semaphores (`sem_open` and friends).

use super::{RawSemHandle, RawSemaphore};
use crate::wait::{Deadline, WaitOutcome};
use crate::{CancelToken, Result, SemLockError};
use core::ptr::NonNull;
use std::ffi::CString;
use std::io;

/// Permissions of newly created semaphores.
const CREATE_MODE: libc::c_uint = 0o600;

/// An open `sem_t*`, closed on drop.
#[derive(Debug)]
pub struct Semaphore {
    sem: NonNull<libc::sem_t>,
}

// Semaphores are MT-safe.
unsafe impl Send for Semaphore {}
unsafe impl Sync for Semaphore {}

fn c_name(name: &str) -> Result<CString> {
    CString::new(name).map_err(|_| SemLockError::InvalidName {
        name: name.to_owned(),
    })
}

fn errno() -> i32 {
    io::Error::last_os_error().raw_os_error().unwrap_or(0)
}

/// Maps a failed `sem_open`/`sem_unlink` to the named error kinds.
fn name_error(op: &'static str, name: &str) -> SemLockError {
    let source = io::Error::last_os_error();
    match source.raw_os_error() {
        Some(libc::EEXIST) => SemLockError::AlreadyExists {
            name: name.to_owned(),
        },
        Some(libc::ENOENT) => SemLockError::NotFound {
            name: name.to_owned(),
        },
        _ => SemLockError::Resource { op, source },
    }
}

impl Semaphore {
    fn from_sem_open(ptr: *mut libc::sem_t, op: &'static str, name: &str) -> Result<Self> {
        if ptr == libc::SEM_FAILED {
            return Err(name_error(op, name));
        }
        NonNull::new(ptr)
            .map(|sem| Self { sem })
            .ok_or_else(|| name_error(op, name))
    }

    /// One bounded `sem_timedwait`. Timeouts and signals report `false`.
    #[cfg(not(any(target_vendor = "apple", feature = "polling-wait")))]
    fn timed_wait_for(&self, slice: core::time::Duration) -> Result<bool> {
        let mut abs = libc::timespec {
            tv_sec: 0,
            tv_nsec: 0,
        };
        if unsafe { libc::clock_gettime(libc::CLOCK_REALTIME, &raw mut abs) } < 0 {
            return Err(SemLockError::last_os_error("clock_gettime"));
        }

        let secs = libc::time_t::try_from(slice.as_secs()).map_err(|_| SemLockError::Overflow)?;
        let nanos =
            libc::c_long::try_from(slice.subsec_nanos()).map_err(|_| SemLockError::Overflow)?;
        abs.tv_sec = abs.tv_sec.checked_add(secs).ok_or(SemLockError::Overflow)?;
        abs.tv_nsec += nanos;
        if abs.tv_nsec >= 1_000_000_000 {
            abs.tv_nsec -= 1_000_000_000;
            abs.tv_sec = abs.tv_sec.checked_add(1).ok_or(SemLockError::Overflow)?;
        }

        if unsafe { libc::sem_timedwait(self.sem.as_ptr(), &raw const abs) } == 0 {
            return Ok(true);
        }
        match errno() {
            libc::ETIMEDOUT | libc::EINTR => Ok(false),
            _ => Err(SemLockError::last_os_error("sem_timedwait")),
        }
    }

    /// Non-destructive probe: take one unit and give it straight back.
    #[cfg(target_vendor = "apple")]
    fn probe_available(&self) -> Result<bool> {
        if self.try_wait()? {
            self.post()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

impl RawSemaphore for Semaphore {
    fn create(name: &str, value: u32, _maxvalue: u32) -> Result<Self> {
        let cname = c_name(name)?;
        let ptr = unsafe {
            libc::sem_open(
                cname.as_ptr(),
                libc::O_CREAT | libc::O_EXCL,
                CREATE_MODE,
                value,
            )
        };
        Self::from_sem_open(ptr, "sem_open", name)
    }

    fn open(name: &str) -> Result<Self> {
        let cname = c_name(name)?;
        let ptr = unsafe { libc::sem_open(cname.as_ptr(), 0) };
        Self::from_sem_open(ptr, "sem_open", name)
    }

    unsafe fn from_raw(handle: RawSemHandle) -> Option<Self> {
        NonNull::new(core::ptr::with_exposed_provenance_mut::<libc::sem_t>(handle))
            .map(|sem| Self { sem })
    }

    fn as_raw(&self) -> RawSemHandle {
        self.sem.as_ptr().expose_provenance()
    }

    fn unlink(name: &str) -> Result<()> {
        let cname = c_name(name)?;
        if unsafe { libc::sem_unlink(cname.as_ptr()) } < 0 {
            return Err(name_error("sem_unlink", name));
        }
        Ok(())
    }

    fn post(&self) -> Result<()> {
        if unsafe { libc::sem_post(self.sem.as_ptr()) } < 0 {
            if errno() == libc::EOVERFLOW {
                return Err(SemLockError::OverRelease);
            }
            return Err(SemLockError::last_os_error("sem_post"));
        }
        Ok(())
    }

    fn try_wait(&self) -> Result<bool> {
        loop {
            if unsafe { libc::sem_trywait(self.sem.as_ptr()) } == 0 {
                return Ok(true);
            }
            match errno() {
                libc::EAGAIN => return Ok(false),
                libc::EINTR => {}
                _ => return Err(SemLockError::last_os_error("sem_trywait")),
            }
        }
    }

    #[cfg(not(any(target_vendor = "apple", feature = "polling-wait")))]
    fn wait(&self, deadline: Option<Deadline>, cancel: &CancelToken) -> Result<WaitOutcome> {
        if self.try_wait()? {
            return Ok(WaitOutcome::Acquired);
        }
        crate::wait::sliced_wait(|slice| self.timed_wait_for(slice), deadline, cancel)
    }

    #[cfg(any(target_vendor = "apple", feature = "polling-wait"))]
    fn wait(&self, deadline: Option<Deadline>, cancel: &CancelToken) -> Result<WaitOutcome> {
        crate::wait::poll_wait(|| self.try_wait(), deadline, cancel)
    }

    #[cfg(not(target_vendor = "apple"))]
    fn value(&self) -> Result<u32> {
        let mut sval: libc::c_int = 0;
        if unsafe { libc::sem_getvalue(self.sem.as_ptr(), &raw mut sval) } < 0 {
            return Err(SemLockError::last_os_error("sem_getvalue"));
        }
        // Some implementations report waiters as a negative value.
        Ok(u32::try_from(sval).unwrap_or(0))
    }

    #[cfg(target_vendor = "apple")]
    fn value(&self) -> Result<u32> {
        Err(SemLockError::Unsupported("sem_getvalue"))
    }

    #[cfg(target_vendor = "apple")]
    fn is_zero(&self) -> Result<bool> {
        Ok(!self.probe_available()?)
    }

    #[cfg(not(target_vendor = "apple"))]
    fn check_release(&self, maxvalue: u32) -> Result<()> {
        // Not a guarantee: another process may post in between.
        if self.value()? >= maxvalue {
            return Err(SemLockError::OverRelease);
        }
        Ok(())
    }

    #[cfg(target_vendor = "apple")]
    fn check_release(&self, maxvalue: u32) -> Result<()> {
        // Without sem_getvalue only the binary case can be checked.
        if maxvalue == 1 && self.probe_available()? {
            return Err(SemLockError::OverRelease);
        }
        Ok(())
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        if unsafe { libc::sem_close(self.sem.as_ptr()) } < 0 {
            log::warn!("sem_close failed: {}", io::Error::last_os_error());
        }
    }
}
