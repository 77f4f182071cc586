//! Strict priority scheduling with donation.
//!
//! Waiters are selected by effective priority, FIFO among equals. On
//! transfer-enabled queues, the effective priority of the owner is raised to
//! the maximum of its base priority and the effective priorities of its
//! waiters, transitively: if C waits on a resource held by B, and B waits on
//! a resource held by A, then C's priority reaches A. This bounds priority
//! inversion — a low-priority thread holding a lock a high-priority thread
//! needs runs at the high priority until it releases.

use super::donation::{DonatingQueue, DonationCore, SelectPolicy};
use super::trait_def::{Scheduler, WaitQueue};
use crate::thread::Thread;
use std::sync::Arc;

/// Lowest priority a thread can have.
pub const PRIORITY_MINIMUM: u32 = 0;
/// Highest priority a thread can have.
pub const PRIORITY_MAXIMUM: u32 = 7;
/// Priority assigned to new threads.
pub const PRIORITY_DEFAULT: u32 = 1;

/// Scheduler that always runs the highest effective priority thread.
pub struct PriorityScheduler {
    core: Arc<spin::Mutex<DonationCore>>,
}

impl PriorityScheduler {
    /// Create a new priority scheduler.
    pub fn new() -> Self {
        Self {
            core: Arc::new(spin::Mutex::new(DonationCore::new(
                SelectPolicy::Highest,
                PRIORITY_MINIMUM,
                PRIORITY_MAXIMUM,
                PRIORITY_DEFAULT,
            ))),
        }
    }
}

impl Default for PriorityScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for PriorityScheduler {
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
