//! Blocking sleep until a future clock tick.

use crate::kernel::{Kernel, KernelState};
use crate::thread::Thread;
use portable_atomic::{AtomicU64, Ordering};
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::Weak;

/// Timer-driven sleep facility; one per kernel.
///
/// Threads calling [`Alarm::wait_until`] are parked on a deadline-ordered
/// queue and made ready by the periodic timer interrupt — there is no
/// busy-waiting. A sleeping thread wakes on the first timer interrupt at or
/// after its deadline, never earlier and exactly once.
pub struct Alarm {
    kernel: Weak<KernelState>,
    sleepers: spin::Mutex<BinaryHeap<Reverse<AlarmEntry>>>,
    /// Breaks deadline ties in insertion order.
    next_seq: AtomicU64,
}

struct AlarmEntry {
    deadline: u64,
    seq: u64,
    thread: Thread,
}

impl PartialEq for AlarmEntry {
    fn eq(&self, other: &Self) -> bool {
        (self.deadline, self.seq) == (other.deadline, other.seq)
    }
}

impl Eq for AlarmEntry {}

impl PartialOrd for AlarmEntry {
    fn partial_cmp(&self, other: &Self) -> Option<core::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for AlarmEntry {
    fn cmp(&self, other: &Self) -> core::cmp::Ordering {
        (self.deadline, self.seq).cmp(&(other.deadline, other.seq))
    }
}

impl Alarm {
    pub(crate) fn new(kernel: &Kernel) -> Self {
        Self {
            kernel: std::sync::Arc::downgrade(&kernel.state),
            sleepers: spin::Mutex::new(BinaryHeap::new()),
            next_seq: AtomicU64::new(0),
        }
    }

    fn kernel(&self) -> Kernel {
        Kernel {
            state: self.kernel.upgrade().expect("kernel was dropped"),
        }
    }

    /// Block the calling thread for at least `ticks` clock ticks.
    ///
    /// The thread is made ready by the first timer interrupt at or after
    /// `now + ticks`. For `ticks <= 0` this returns immediately without
    /// blocking.
    pub fn wait_until(&self, ticks: i64) {
        if ticks <= 0 {
            return;
        }
        let kernel = self.kernel();
        let level = kernel.disable_interrupts();
        let deadline = kernel.ticks() + ticks as u64;
        let thread = kernel.current_thread();
        log::trace!(
            "thread '{}' sleeping until tick {}",
            thread.name(),
            deadline
        );
        self.sleepers.lock().push(Reverse(AlarmEntry {
            deadline,
            seq: self.next_seq.fetch_add(1, Ordering::AcqRel),
            thread,
        }));
        kernel.block_current();
        kernel.restore_interrupts(level);
    }

    /// The periodic timer interrupt handler.
    ///
    /// Readies every sleeper whose deadline has passed, in deadline order,
    /// then yields so a newly woken thread can be scheduled. Invoked by the
    /// machine timer, not by user code.
    pub fn timer_interrupt(&self) {
        let kernel = self.kernel();
        {
            let _intr = kernel.interrupts_off();
            self.service(kernel.ticks());
        }
        kernel.yield_now();
    }

    /// Ready all sleepers due at time `now`. Requires interrupts disabled.
    pub(crate) fn service(&self, now: u64) {
        let kernel = self.kernel();
        debug_assert!(!kernel.interrupts_enabled());
        let mut due = Vec::new();
        {
            let mut sleepers = self.sleepers.lock();
            while sleepers
                .peek()
                .map_or(false, |Reverse(entry)| entry.deadline <= now)
            {
                let Reverse(entry) = sleepers.pop().expect("peeked entry vanished");
                due.push(entry.thread);
            }
        }
        for thread in due {
            log::trace!("alarm waking thread '{}' at tick {}", thread.name(), now);
            kernel.ready_thread(&thread);
        }
    }

    /// Earliest pending deadline, if any thread is sleeping.
    pub(crate) fn earliest_deadline(&self) -> Option<u64> {
        self.sleepers
            .lock()
            .peek()
            .map(|Reverse(entry)| entry.deadline)
    }
}
