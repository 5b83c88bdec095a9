#![allow(dead_code)]

use semlock::{Kind, SemLock};
use std::sync::atomic::{AtomicU32, Ordering};

static NEXT: AtomicU32 = AtomicU32::new(0);

/// Short enough for platforms that cap semaphore names at 31 bytes.
pub fn unique_name() -> String {
    let n = NEXT.fetch_add(1, Ordering::Relaxed);
    format!("/sl-{}-{n}", std::process::id())
}

/// Unlinks its name when dropped, so failing tests do not leak names.
pub struct Unlinker(pub String);

impl Drop for Unlinker {
    fn drop(&mut self) {
        let _ = semlock::unlink(&self.0);
    }
}

/// A lock whose name is kept for reopening, plus the guard cleaning it up.
pub fn named(kind: Kind, value: u32, maxvalue: u32) -> (SemLock, Unlinker) {
    let name = unique_name();
    let lock = SemLock::create(kind, value, maxvalue, &name, false).unwrap();
    (lock, Unlinker(name))
}

pub fn mutex() -> SemLock {
    SemLock::create_anonymous(Kind::RecursiveMutex, 1, 1).unwrap()
}

pub fn semaphore(value: u32, maxvalue: u32) -> SemLock {
    SemLock::create_anonymous(Kind::Semaphore, value, maxvalue).unwrap()
}
