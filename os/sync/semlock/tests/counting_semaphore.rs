mod common;

use semlock::SemLockError;
use std::thread;
use std::time::{Duration, Instant};

#[test]
fn non_blocking_acquire_on_exhausted_semaphore_returns_false() {
    let s = common::semaphore(0, 3);
    let start = Instant::now();
    assert!(!s.acquire(false, None).unwrap());
    assert!(start.elapsed() < Duration::from_millis(50));
    assert_eq!(s.count(), 0);
}

#[test]
fn timed_acquire_waits_about_the_timeout() {
    let s = common::semaphore(0, 1);
    let timeout = Duration::from_millis(100);

    let start = Instant::now();
    assert!(!s.acquire(true, Some(timeout)).unwrap());
    let took = start.elapsed();

    assert!(took >= timeout, "returned early after {took:?}");
    assert!(took < Duration::from_secs(1), "took {took:?}");
}

#[test]
fn zero_timeout_behaves_like_a_non_blocking_attempt() {
    let s = common::semaphore(1, 1);
    assert!(s.acquire(true, Some(Duration::ZERO)).unwrap());
    let start = Instant::now();
    assert!(!s.acquire(true, Some(Duration::ZERO)).unwrap());
    assert!(start.elapsed() < Duration::from_millis(50));
    s.release().unwrap();
}

#[test]
fn huge_timeouts_are_rejected() {
    let s = common::semaphore(0, 1);
    let err = s
        .acquire(true, Some(Duration::from_secs(60 * 60 * 24 * 30)))
        .unwrap_err();
    assert!(matches!(err, SemLockError::Overflow));
    assert_eq!(s.count(), 0);
}

#[test]
fn over_release_is_rejected_and_leaves_the_value() {
    let s = common::semaphore(1, 1);
    assert!(matches!(s.release(), Err(SemLockError::OverRelease)));
    assert!(!s.is_zero().unwrap());
    #[cfg(not(target_vendor = "apple"))]
    assert_eq!(s.value().unwrap(), 1);

    // still usable afterwards
    assert!(s.acquire(false, None).unwrap());
    assert!(s.is_zero().unwrap());
    s.release().unwrap();
}

#[cfg(not(target_vendor = "apple"))]
#[test]
fn value_stays_within_bounds() {
    let max = 3;
    let s = common::semaphore(max, max);
    assert_eq!(s.value().unwrap(), max);

    for expected in (0..max).rev() {
        assert!(s.acquire(false, None).unwrap());
        assert_eq!(s.value().unwrap(), expected);
    }
    assert!(!s.acquire(false, None).unwrap());
    assert_eq!(s.value().unwrap(), 0);
    assert_eq!(s.count(), 3);

    for expected in 1..=max {
        s.release().unwrap();
        assert_eq!(s.value().unwrap(), expected);
    }
    assert!(matches!(s.release(), Err(SemLockError::OverRelease)));
    assert_eq!(s.value().unwrap(), max);
    assert_eq!(s.count(), 0);
}

#[test]
fn count_goes_negative_when_releasing_for_others() {
    let s = common::semaphore(0, 2);
    s.release().unwrap();
    assert_eq!(s.count(), -1);
    assert!(s.acquire(false, None).unwrap());
    assert_eq!(s.count(), 0);
}

#[test]
fn any_thread_may_release_a_semaphore() {
    let s = common::semaphore(1, 1);
    assert!(s.acquire(true, None).unwrap());
    thread::scope(|sc| {
        sc.spawn(|| s.release().unwrap());
    });
    assert!(!s.is_zero().unwrap());
}

#[test]
fn release_wakes_a_blocked_waiter() {
    let s = common::semaphore(0, 1);
    thread::scope(|sc| {
        let waiter = sc.spawn(|| s.acquire(true, Some(Duration::from_secs(5))).unwrap());
        thread::sleep(Duration::from_millis(50));
        s.release().unwrap();
        assert!(waiter.join().unwrap());
    });
    assert!(s.is_zero().unwrap());
}

#[test]
fn lock_timeout_hands_out_guards_up_to_the_value() {
    let s = common::semaphore(2, 2);
    let a = s.lock_timeout(Duration::from_millis(10)).unwrap();
    let b = s.lock_timeout(Duration::from_millis(10)).unwrap();
    let c = s.lock_timeout(Duration::from_millis(10)).unwrap();
    assert!(a.is_some() && b.is_some());
    assert!(c.is_none());
    drop(a);
    assert!(s.try_lock().unwrap().is_some());
    b.unwrap().unlock().unwrap();
    assert_eq!(s.count(), 0);
}
