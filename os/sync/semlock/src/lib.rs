//! # Process-shareable semaphores and recursive mutexes
//!
//! This crate wraps native OS semaphores (POSIX named semaphores, Windows
//! kernel semaphores) into a single lock type, [`SemLock`], usable by
//! cooperating processes such as a worker pool.
//!
//! ## Overview
//!
//! A [`SemLock`] is either a **counting semaphore** or a **recursive mutex**
//! built on top of one. The OS object is the only state shared between
//! processes; each process keeps its own bookkeeping (acquisition count and
//! owning thread) next to its handle.
//!
//! ```text
//! process A                         process B
//! ┌──────────────────────┐          ┌──────────────────────┐
//! │ SemLock              │          │ SemLock              │
//! │  count, owner, kind  │          │  count, owner, kind  │
//! │  handle ─────────┐   │          │   ┌──────── handle   │
//! └──────────────────┼───┘          └───┼──────────────────┘
//!                    ▼                  ▼
//!              ┌──────────────────────────────┐
//!              │ named kernel semaphore       │
//!              │ (value ≤ maxvalue)           │
//!              └──────────────────────────────┘
//! ```
//!
//! ## Components
//!
//! * [`sys`]: the per-OS wait primitive behind the [`RawSemaphore`] contract,
//!   selected at build time.
//! * [`wait`] and [`CancelToken`]: bounded waits that can be aborted by a
//!   cooperative cancellation request.
//! * [`SemLock`]: acquire/release with reentrancy and over-release checks,
//!   plus construction, reconstruction, fork recovery and introspection.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use semlock::{Kind, SemLock};
//! use std::time::Duration;
//!
//! let lock = SemLock::create(Kind::Semaphore, 2, 2, "/pool-slots", false)?;
//!
//! // hand `identity` to a worker process, which attaches with `SemLock::open`
//! let identity = lock.identity();
//!
//! if lock.acquire(true, Some(Duration::from_millis(100)))? {
//!     // ... use the slot ...
//!     lock.release()?;
//! }
//!
//! semlock::unlink(identity.name.as_deref().unwrap_or("/pool-slots"))?;
//! # Ok::<(), semlock::SemLockError>(())
//! ```
//!
//! ## Features
//!
//! * `polling-wait`: on POSIX, always wait by polling `sem_trywait` with a
//!   capped exponential backoff instead of slicing `sem_timedwait`. Apple
//!   targets use polling regardless since they lack `sem_timedwait`.

#![allow(unsafe_code)]

mod cancel;
mod error;
mod guard;
mod introspect;
mod lifecycle;
mod lock;
pub mod sys;
mod thread_ident;
pub mod wait;

pub use cancel::CancelToken;
pub use error::SemLockError;
pub use guard::SemLockGuard;
pub use lifecycle::{SemLockIdentity, unlink};
pub use lock::{Kind, SemLock};
pub use sys::{RawSemHandle, RawSemaphore};
pub use wait::{MAX_TIMEOUT, timeout_from_secs_f64};

pub type Result<T, E = SemLockError> = core::result::Result<T, E>;
