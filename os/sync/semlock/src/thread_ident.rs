use core::sync::atomic::{AtomicU64, Ordering};

/// Owner value meaning "no thread".
pub const NO_THREAD: u64 = 0;

static NEXT_IDENT: AtomicU64 = AtomicU64::new(1);

std::thread_local! {
    static IDENT: u64 = NEXT_IDENT.fetch_add(1, Ordering::Relaxed);
}

/// A process-unique, non-zero identifier of the calling thread.
///
/// Identifiers are handed out on first use and never reused within a process.
/// A forked child inherits the identifier of the thread that called `fork`.
#[inline]
pub fn current() -> u64 {
    IDENT.with(|id| *id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn stable_within_a_thread() {
        assert_eq!(current(), current());
        assert_ne!(current(), NO_THREAD);
    }

    #[test]
    fn distinct_across_threads() {
        let here = current();
        let there = thread::spawn(current).join().unwrap();
        assert_ne!(here, there);
        assert_ne!(there, NO_THREAD);
    }
}
