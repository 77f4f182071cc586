//! Condition variables built on interrupt control.

use super::lock::Lock;
use crate::sched::WaitQueue;
use std::sync::Arc;

/// A condition variable bound to one [`Lock`].
///
/// Every operation requires the calling thread to hold the associated lock.
/// [`Condition::sleep`] releases the lock and blocks as a single atomic step
/// with respect to interrupts: no other thread can observe the lock free,
/// acquire it, and deliver a wake before the sleeper is enqueued — the
/// classic lost-wakeup gap cannot open.
///
/// The waiter queue never transfers priority: sleeping on a condition does
/// not donate to whichever thread eventually signals it.
#[derive(Clone)]
pub struct Condition {
    inner: Arc<ConditionInner>,
}

struct ConditionInner {
    lock: Lock,
    waiters: spin::Mutex<Box<dyn WaitQueue>>,
}

impl Condition {
    /// Create a condition variable associated with `lock`.
    pub fn new(lock: &Lock) -> Self {
        let waiters = lock.kernel().scheduler().new_wait_queue(false);
        Self {
            inner: Arc::new(ConditionInner {
                lock: lock.clone(),
                waiters: spin::Mutex::new(waiters),
            }),
        }
    }

    /// The lock this condition is associated with.
    pub fn lock(&self) -> &Lock {
        &self.inner.lock
    }

    /// Atomically release the lock and block until woken, then reacquire
    /// the lock before returning.
    ///
    /// # Panics
    ///
    /// Panics if the calling thread does not hold the associated lock.
    pub fn sleep(&self) {
        assert!(
            self.inner.lock.is_held_by_current_thread(),
            "condition variable used without holding its lock"
        );
        let kernel = self.inner.lock.kernel().clone();
        let level = kernel.disable_interrupts();
        let current = kernel.current_thread();

        self.inner.lock.release();
        self.inner.waiters.lock().enqueue(&current);
        kernel.block_current();

        kernel.restore_interrupts(level);
        self.inner.lock.acquire();
    }

    /// Wake at most one sleeping thread.
    ///
    /// The woken thread becomes ready but does not run immediately; it
    /// reacquires the lock once scheduled.
    ///
    /// # Panics
    ///
    /// Panics if the calling thread does not hold the associated lock.
    pub fn wake(&self) {
        assert!(
            self.inner.lock.is_held_by_current_thread(),
            "condition variable used without holding its lock"
        );
        let kernel = self.inner.lock.kernel();
        let _intr = kernel.interrupts_off();
        if let Some(thread) = self.inner.waiters.lock().dequeue() {
            kernel.ready_thread(&thread);
        }
    }

    /// Wake every thread currently sleeping on this condition.
    ///
    /// Equivalent to repeated [`Condition::wake`] until the queue is empty;
    /// threads that enqueue afterwards are not affected.
    ///
    /// # Panics
    ///
    /// Panics if the calling thread does not hold the associated lock.
    pub fn wake_all(&self) {
        assert!(
            self.inner.lock.is_held_by_current_thread(),
            "condition variable used without holding its lock"
        );
        let kernel = self.inner.lock.kernel();
        let _intr = kernel.interrupts_off();
        let mut waiters = self.inner.waiters.lock();
        while let Some(thread) = waiters.dequeue() {
            kernel.ready_thread(&thread);
        }
    }
}
