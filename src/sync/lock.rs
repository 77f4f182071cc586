//! Mutual exclusion with direct handoff and priority transfer.

use crate::kernel::Kernel;
use crate::sched::WaitQueue;
use crate::thread::Thread;
use std::sync::Arc;

/// A blocking mutual exclusion lock.
///
/// At most one thread holds the lock at a time. Contending threads sleep on
/// a transfer-enabled wait queue, so under a donating scheduler the holder
/// runs with the priority (or tickets) of everything blocked behind it.
/// Release hands the lock directly to the next waiter chosen by the queue's
/// policy — the woken thread returns from [`Lock::acquire`] as the holder
/// without re-contending.
///
/// Handles are cheaply cloneable; all clones refer to the same lock.
///
/// # Panics
///
/// Re-acquiring a lock already held by the caller and releasing a lock the
/// caller does not hold are contract violations and panic.
#[derive(Clone)]
pub struct Lock {
    inner: Arc<LockInner>,
}

struct LockInner {
    kernel: Kernel,
    state: spin::Mutex<LockState>,
}

struct LockState {
    holder: Option<Thread>,
    waiters: Box<dyn WaitQueue>,
}

impl Lock {
    /// Create a lock on `kernel`.
    pub fn new(kernel: &Kernel) -> Self {
        let waiters = kernel.scheduler().new_wait_queue(true);
        Self {
            inner: Arc::new(LockInner {
                kernel: kernel.clone(),
                state: spin::Mutex::new(LockState {
                    holder: None,
                    waiters,
                }),
            }),
        }
    }

    pub(crate) fn kernel(&self) -> &Kernel {
        &self.inner.kernel
    }

    /// Acquire the lock, blocking until the calling thread holds it.
    pub fn acquire(&self) {
        let kernel = &self.inner.kernel;
        let _intr = kernel.interrupts_off();
        let current = kernel.current_thread();

        let mut state = self.inner.state.lock();
        assert!(
            state.holder.as_ref() != Some(&current),
            "thread '{}' re-acquired a lock it already holds",
            current.name()
        );
        if state.holder.is_none() {
            state.holder = Some(current.clone());
            state.waiters.set_owner(Some(&current));
        } else {
            state.waiters.enqueue(&current);
            drop(state);
            kernel.block_current();
            // Woken by release(); ownership was handed to us directly.
            debug_assert!(self.inner.state.lock().holder.as_ref() == Some(&current));
        }
    }

    /// Release the lock, waking the next waiter if any.
    pub fn release(&self) {
        let kernel = &self.inner.kernel;
        let _intr = kernel.interrupts_off();
        let current = kernel.current_thread();

        let mut state = self.inner.state.lock();
        assert!(
            state.holder.as_ref() == Some(&current),
            "thread '{}' released a lock it does not hold",
            current.name()
        );
        state.waiters.set_owner(None);
        match state.waiters.dequeue() {
            Some(next) => {
                state.holder = Some(next.clone());
                state.waiters.set_owner(Some(&next));
                drop(state);
                kernel.ready_thread(&next);
            }
            None => {
                state.holder = None;
            }
        }
    }

    /// Whether the calling thread holds this lock.
    pub fn is_held_by_current_thread(&self) -> bool {
        let kernel = &self.inner.kernel;
        let _intr = kernel.interrupts_off();
        let current = kernel.current_thread();
        self.inner.state.lock().holder.as_ref() == Some(&current)
    }
}
