//! Ticket-weighted lottery scheduling.
//!
//! Every thread holds a number of tickets equal to its effective priority.
//! Selection draws one uniformly random ticket across all waiters and runs
//! the holder, so over time each waiter wins in proportion to its share of
//! the ticket pool. Ticket counts can be astronomically large — only sums
//! and per-waiter counts are ever tracked, never individual tickets.
//!
//! Donation follows the same waiter-to-owner edges as the priority policy
//! but tickets add instead of taking the maximum: a thread holding a lock
//! wields its own tickets plus those of every thread blocked behind it,
//! transitively, saturating at [`TICKET_MAXIMUM`].

use super::donation::{DonatingQueue, DonationCore, SelectPolicy};
use super::trait_def::{Scheduler, WaitQueue};
use crate::thread::Thread;
use rand::SeedableRng;
use rand_pcg::Pcg64Mcg;
use std::sync::Arc;

/// Fewest tickets a thread can hold.
pub const TICKET_MINIMUM: u32 = 1;
/// Most tickets a thread can hold.
pub const TICKET_MAXIMUM: u32 = i32::MAX as u32;
/// Tickets given to new threads.
pub const TICKET_DEFAULT: u32 = 1;

const DEFAULT_SEED: u64 = 0xcafe_f00d_d15e_a5e5;

/// Scheduler that picks threads by weighted random draw.
pub struct LotteryScheduler {
    core: Arc<spin::Mutex<DonationCore>>,
}

impl LotteryScheduler {
    /// Create a lottery scheduler with the default seed.
    pub fn new() -> Self {
        Self::with_seed(DEFAULT_SEED)
    }

    /// Create a lottery scheduler drawing from a specific seed.
    ///
    /// Runs with the same seed and the same interleaving of queue
    /// operations make identical selections.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            core: Arc::new(spin::Mutex::new(DonationCore::new(
                SelectPolicy::Ticketed {
                    rng: Pcg64Mcg::seed_from_u64(seed),
                },
                TICKET_MINIMUM,
                TICKET_MAXIMUM,
                TICKET_DEFAULT,
            ))),
        }
    }
}

impl Default for LotteryScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for LotteryScheduler {
    fn new_wait_queue(&self, transfer_priority: bool) -> Box<dyn WaitQueue> {
        Box::new(DonatingQueue::new(self.core.clone(), transfer_priority))
    }

    fn priority_minimum(&self) -> u32 {
        self.core.lock().minimum()
    }

    fn priority_maximum(&self) -> u32 {
        self.core.lock().maximum()
    }

    fn priority_default(&self) -> u32 {
        self.core.lock().default_priority()
    }

    fn register(&self, thread: &Thread, priority: u32) {
        self.core.lock().register(thread, priority);
    }

    fn unregister(&self, thread: &Thread) {
        self.core.lock().unregister(thread.id());
    }

    fn priority_of(&self, thread: &Thread) -> u32 {
        self.core.lock().base_of(thread.id())
    }

    fn effective_priority_of(&self, thread: &Thread) -> u32 {
        self.core.lock().effective(thread.id())
    }

    fn set_priority(&self, thread: &Thread, priority: u32) {
        self.core.lock().set_base(thread.id(), priority);
    }

    fn increase_priority(&self, thread: &Thread) -> bool {
        self.core.lock().raise(thread.id())
    }

    fn decrease_priority(&self, thread: &Thread) -> bool {
        self.core.lock().lower(thread.id())
    }
}
