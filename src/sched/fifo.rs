//! First-in, first-out scheduling.
//!
//! The simplest policy: threads run in arrival order and priority donation
//! never happens. Base priorities are still stored so the priority API
//! behaves uniformly across policies, but selection ignores them.

use super::priority::{PRIORITY_DEFAULT, PRIORITY_MAXIMUM, PRIORITY_MINIMUM};
use super::trait_def::{Scheduler, WaitQueue};
use crate::thread::{Thread, ThreadId};
use std::collections::BTreeMap;
use std::collections::VecDeque;
use std::sync::Arc;

/// Round-robin scheduler with FIFO wait queues.
pub struct FifoScheduler {
    priorities: Arc<spin::Mutex<BTreeMap<ThreadId, u32>>>,
}

impl FifoScheduler {
    /// Create a new FIFO scheduler.
    pub fn new() -> Self {
        Self {
            priorities: Arc::new(spin::Mutex::new(BTreeMap::new())),
        }
    }
}

impl Default for FifoScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for FifoScheduler {
    fn new_wait_queue(&self, _transfer_priority: bool) -> Box<dyn WaitQueue> {
        Box::new(FifoQueue {
            waiters: VecDeque::new(),
        })
    }

    fn priority_minimum(&self) -> u32 {
        PRIORITY_MINIMUM
    }

    fn priority_maximum(&self) -> u32 {
        PRIORITY_MAXIMUM
    }

    fn priority_default(&self) -> u32 {
        PRIORITY_DEFAULT
    }

    fn register(&self, thread: &Thread, priority: u32) {
        self.priorities
            .lock()
            .insert(thread.id(), priority.clamp(PRIORITY_MINIMUM, PRIORITY_MAXIMUM));
    }

    fn unregister(&self, thread: &Thread) {
        self.priorities.lock().remove(&thread.id());
    }

    fn priority_of(&self, thread: &Thread) -> u32 {
        self.priorities
            .lock()
            .get(&thread.id())
            .copied()
            .unwrap_or(PRIORITY_MINIMUM)
    }

    fn effective_priority_of(&self, thread: &Thread) -> u32 {
        // No donation under FIFO.
        self.priority_of(thread)
    }

    fn set_priority(&self, thread: &Thread, priority: u32) {
        if let Some(entry) = self.priorities.lock().get_mut(&thread.id()) {
            *entry = priority.clamp(PRIORITY_MINIMUM, PRIORITY_MAXIMUM);
        }
    }

    fn increase_priority(&self, thread: &Thread) -> bool {
        let mut priorities = self.priorities.lock();
        match priorities.get_mut(&thread.id()) {
            Some(p) if *p < PRIORITY_MAXIMUM => {
                *p += 1;
                true
            }
            _ => false,
        }
    }

    fn decrease_priority(&self, thread: &Thread) -> bool {
        let mut priorities = self.priorities.lock();
        match priorities.get_mut(&thread.id()) {
            Some(p) if *p > PRIORITY_MINIMUM => {
                *p -= 1;
                true
            }
            _ => false,
        }
    }
}

/// Arrival-ordered wait queue.
struct FifoQueue {
    waiters: VecDeque<Thread>,
}

impl WaitQueue for FifoQueue {
    fn enqueue(&mut self, thread: &Thread) {
        debug_assert!(
            !self.waiters.iter().any(|t| t == thread),
            "thread is already in this queue"
        );
        self.waiters.push_back(thread.clone());
    }

    fn dequeue(&mut self) -> Option<Thread> {
        self.waiters.pop_front()
    }

    fn set_owner(&mut self, _owner: Option<&Thread>) {
        // FIFO queues never transfer priority.
    }

    fn is_empty(&self) -> bool {
        self.waiters.is_empty()
    }
}
