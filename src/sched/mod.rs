//! Scheduling policies and wait queues.
//!
//! A scheduler is a factory for wait queues plus a priority store. Every
//! blocking structure in the kernel — the ready queue, lock waiter lists,
//! condition queues, join queues — is a [`WaitQueue`] obtained from the
//! active scheduler, so one policy governs all thread ordering.
//!
//! Three policies are provided:
//! - [`FifoScheduler`]: round-robin, no donation; the default
//! - [`PriorityScheduler`]: strict priority with transitive donation
//! - [`LotteryScheduler`]: ticket-weighted random selection; donations add

pub(crate) mod donation;
pub mod fifo;
pub mod lottery;
pub mod priority;
pub mod trait_def;

pub use fifo::FifoScheduler;
pub use lottery::LotteryScheduler;
pub use priority::PriorityScheduler;
pub use trait_def::{Scheduler, WaitQueue};
