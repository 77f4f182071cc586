//! Join and park handles.

use super::Thread;
use crate::errors::JoinError;
use crate::kernel::Kernel;

/// A handle for waiting on a thread's completion.
///
/// Joining blocks the caller until the target thread finishes. The join wait
/// goes through a priority-transferring wait queue owned by the target, so
/// under a donating scheduler a high-priority joiner lends its priority (or
/// tickets) to the thread it waits for.
pub struct JoinHandle {
    kernel: Kernel,
    thread: Thread,
}

impl JoinHandle {
    pub(crate) fn new(kernel: Kernel, thread: Thread) -> Self {
        Self { kernel, thread }
    }

    /// The thread this handle refers to.
    pub fn thread(&self) -> &Thread {
        &self.thread
    }

    /// Block until the thread finishes.
    ///
    /// Returns `Err(JoinError::Panicked)` if the thread's body panicked.
    ///
    /// # Panics
    ///
    /// Panics if called from the target thread itself.
    pub fn join(self) -> Result<(), JoinError> {
        let current = self.kernel.current_thread();
        assert!(
            current != self.thread,
            "thread '{}' attempted to join itself",
            current.name()
        );

        let level = self.kernel.disable_interrupts();
        if self.kernel.enqueue_joiner(&self.thread, &current) {
            self.kernel.block_current();
        }
        self.kernel.restore_interrupts(level);

        if self.thread.panicked() {
            Err(JoinError::Panicked)
        } else {
            Ok(())
        }
    }
}

/// A handle to a spawned but not yet runnable thread.
///
/// Parked threads are registered with the scheduler and may be placed on
/// wait queues, but consume no execution until unparked.
pub struct ParkHandle {
    kernel: Kernel,
    thread: Thread,
}

impl ParkHandle {
    pub(crate) fn new(kernel: Kernel, thread: Thread) -> Self {
        Self { kernel, thread }
    }

    /// The thread this handle refers to.
    pub fn thread(&self) -> &Thread {
        &self.thread
    }

    /// Make the thread eligible to run, consuming the park handle.
    pub fn unpark(self) -> JoinHandle {
        {
            let _intr = self.kernel.interrupts_off();
            self.kernel.ready_thread(&self.thread);
        }
        JoinHandle::new(self.kernel, self.thread)
    }
}
