//! Ctrl-C turns into a cancellation of the lock being waited on.

use semlock::CancelToken;
use std::io;
use std::sync::OnceLock;

static TOKEN: OnceLock<CancelToken> = OnceLock::new();

fn cancel_pending_wait() {
    if let Some(token) = TOKEN.get() {
        token.cancel();
    }
}

/// Routes Ctrl-C to `token`. Only the first registered token is used.
///
/// # Errors
/// Fails if the handler cannot be installed.
#[cfg(unix)]
pub fn cancel_on_ctrl_c(token: CancelToken) -> io::Result<()> {
    extern "C" fn on_sigint(_signum: libc::c_int) {
        // Atomics only; safe in a signal handler.
        cancel_pending_wait();
    }

    let _ = TOKEN.set(token);

    let mut action: libc::sigaction = unsafe { core::mem::zeroed() };
    action.sa_sigaction = on_sigint as extern "C" fn(libc::c_int) as libc::sighandler_t;
    // No SA_RESTART: a blocked sem_timedwait returns EINTR and re-checks.
    action.sa_flags = 0;
    if unsafe { libc::sigaction(libc::SIGINT, &raw const action, core::ptr::null_mut()) } != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Routes Ctrl-C to `token`. Only the first registered token is used.
///
/// # Errors
/// Fails if the handler cannot be installed.
#[cfg(windows)]
pub fn cancel_on_ctrl_c(token: CancelToken) -> io::Result<()> {
    use winapi::shared::minwindef::{BOOL, DWORD, FALSE, TRUE};
    use winapi::um::consoleapi::SetConsoleCtrlHandler;
    use winapi::um::wincon::CTRL_C_EVENT;

    unsafe extern "system" fn on_ctrl(ctrl_type: DWORD) -> BOOL {
        if ctrl_type == CTRL_C_EVENT {
            cancel_pending_wait();
            TRUE
        } else {
            FALSE
        }
    }

    let _ = TOKEN.set(token);

    if unsafe { SetConsoleCtrlHandler(Some(on_ctrl), TRUE) } == 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}
