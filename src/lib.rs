#![deny(unsafe_op_in_unsafe_fn)]
#![forbid(unreachable_pub)]

//! Cooperatively scheduled kernel threading core with priority donation.
//!
//! This library models the synchronization and scheduling heart of a
//! single-machine kernel: one logical execution unit, with interrupt
//! disable/restore as the only atomicity primitive. On that foundation it
//! builds blocking locks, condition variables, a timer-driven sleep facility,
//! a two-party rendezvous channel, and pluggable schedulers — FIFO, strict
//! priority, and ticket-weighted lottery — that propagate priority across
//! blocking dependencies (lock ownership and thread joins) to bound priority
//! inversion.
//!
//! # Quick Start
//!
//! ```ignore
//! use coop_threads::{Kernel, Lock, PriorityScheduler};
//!
//! let kernel = Kernel::builder()
//!     .scheduler(PriorityScheduler::new())
//!     .boot();
//!
//! let lock = Lock::new(&kernel);
//! let handle = {
//!     let lock = lock.clone();
//!     kernel.spawn(move || {
//!         lock.acquire();
//!         lock.release();
//!     })
//! };
//! handle.join().unwrap();
//! ```
//!
//! # Architecture
//!
//! The library is organized around several key abstractions:
//! - A simulated machine (interrupt controller, periodic timer, context
//!   switching) that guarantees exactly one kernel thread executes at a time
//! - An explicit [`Kernel`] context object constructed once and handed to
//!   every component; there is no global state, so independent kernels can
//!   coexist in one process
//! - Wait queues produced by the active scheduler, with optional priority
//!   transfer from waiters to the owning thread
//! - Synchronization primitives that never busy-wait: every blocked thread is
//!   suspended until another thread or the timer makes it ready

// Core modules
pub mod errors;
pub mod kernel;
pub mod machine;
pub mod sched;
pub mod sync;
pub mod thread;
pub mod time;

#[cfg(test)]
mod tests;

// ============================================================================
// Public API
// ============================================================================

// Kernel
pub use kernel::{Kernel, KernelBuilder};

// Machine
pub use machine::IntrLevel;

// Scheduler
pub use sched::{FifoScheduler, LotteryScheduler, PriorityScheduler, Scheduler, WaitQueue};

// Threads
pub use thread::{JoinHandle, ParkHandle, Thread, ThreadBuilder, ThreadId, ThreadState};

// Synchronization
pub use sync::{Condition, Lock, Rendezvous};

// Time
pub use time::Alarm;

// Errors
pub use errors::{JoinError, KernelError, KernelResult};
