mod common;

use semlock::{Kind, SemLockError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

#[test]
fn reentrant_acquisitions_touch_the_os_once() {
    const DEPTH: isize = 5;
    let m = common::mutex();

    for _ in 0..DEPTH {
        assert!(m.acquire(false, None).unwrap());
        // the OS semaphore went to zero on the first acquisition and stays there
        assert!(m.is_zero().unwrap());
    }
    assert_eq!(m.count(), DEPTH);

    for left in (1..DEPTH).rev() {
        m.release().unwrap();
        assert!(m.is_mine(), "still held with {left} acquisitions left");
        assert!(m.is_zero().unwrap());
    }

    m.release().unwrap();
    assert!(!m.is_mine());
    assert_eq!(m.count(), 0);
    assert!(!m.is_zero().unwrap());
}

#[test]
fn reentrant_acquire_never_waits() {
    let m = common::mutex();
    assert!(m.acquire(true, None).unwrap());
    // would block forever if it reached the OS semaphore
    assert!(m.acquire(true, None).unwrap());
    m.release().unwrap();
    m.release().unwrap();
}

#[test]
fn release_without_acquire_is_an_ownership_violation() {
    let m = common::mutex();
    assert!(matches!(m.release(), Err(SemLockError::OwnershipViolation)));
    assert_eq!(m.count(), 0);
}

#[test]
fn other_threads_cannot_release_or_take_it() {
    let m = common::mutex();
    assert!(m.acquire(true, None).unwrap());

    thread::scope(|s| {
        s.spawn(|| {
            assert!(!m.is_mine());
            assert!(matches!(m.release(), Err(SemLockError::OwnershipViolation)));
            assert!(!m.acquire(false, None).unwrap());
        });
    });

    assert!(m.is_mine());
    m.release().unwrap();

    thread::scope(|s| {
        s.spawn(|| {
            assert!(m.acquire(false, None).unwrap());
            m.release().unwrap();
        });
    });
}

#[test]
fn guard_releases_on_drop() {
    let m = common::mutex();
    {
        let _outer = m.lock().unwrap();
        let inner = m.try_lock().unwrap();
        assert!(inner.is_some());
        assert_eq!(m.count(), 2);
    }
    assert_eq!(m.count(), 0);
    assert!(!m.is_zero().unwrap());
}

#[test]
fn contended_increments_are_exclusive() {
    let threads = 4;
    let iters = 5_000;

    let m = Arc::new(common::mutex());
    assert_eq!(m.kind(), Kind::RecursiveMutex);
    let in_cs = Arc::new(AtomicUsize::new(0));
    let total = Arc::new(AtomicUsize::new(0));
    let start = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let m = Arc::clone(&m);
            let in_cs = Arc::clone(&in_cs);
            let total = Arc::clone(&total);
            let start = Arc::clone(&start);
            thread::spawn(move || {
                start.wait();
                for _ in 0..iters {
                    m.with_lock(|| {
                        let prev = in_cs.fetch_add(1, Ordering::SeqCst);
                        assert_eq!(prev, 0, "mutual exclusion violated");
                        total.fetch_add(1, Ordering::SeqCst);
                        in_cs.fetch_sub(1, Ordering::SeqCst);
                    })
                    .unwrap();
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(total.load(Ordering::SeqCst), threads * iters);
    assert_eq!(m.count(), 0);
    assert!(!m.is_zero().unwrap());
}

#[test]
fn handing_over_under_contention_never_strands_the_lock() {
    let threads = 2;
    let iters = 150_000;
    let patience = Duration::from_secs(2);

    let m = common::mutex();
    let start = Barrier::new(threads);

    thread::scope(|s| {
        for _ in 0..threads {
            s.spawn(|| {
                start.wait();
                for i in 0..iters {
                    assert!(
                        m.acquire(true, Some(patience)).unwrap(),
                        "lock stranded after {i} hand-overs (count {})",
                        m.count()
                    );
                    m.release().unwrap();
                }
            });
        }
    });

    assert_eq!(m.count(), 0);
    assert!(!m.is_mine());
    assert!(m.acquire(false, None).unwrap());
    m.release().unwrap();
}

#[test]
fn reentrant_acquire_ignores_its_timeout() {
    let m = common::mutex();
    assert!(m.acquire(true, None).unwrap());
    assert!(m.acquire(true, Some(Duration::from_secs(60 * 60 * 24 * 30))).unwrap());
    assert_eq!(m.count(), 2);
    m.release().unwrap();
    m.release().unwrap();

    // not reentrant any more: the timeout is checked again
    assert!(matches!(
        m.acquire(true, Some(Duration::from_secs(60 * 60 * 24 * 30))),
        Err(SemLockError::Overflow)
    ));
}
