//! Thread construction.

use super::handle::{JoinHandle, ParkHandle};
use crate::kernel::Kernel;

/// A builder for configuring and spawning kernel threads.
///
/// ```ignore
/// let handle = ThreadBuilder::new(&kernel)
///     .name("worker")
///     .priority(5)
///     .spawn(|| { /* thread work */ });
/// handle.join().unwrap();
/// ```
pub struct ThreadBuilder {
    kernel: Kernel,
    name: Option<String>,
    priority: Option<u32>,
}

impl ThreadBuilder {
    /// Create a builder for a thread on `kernel`.
    pub fn new(kernel: &Kernel) -> Self {
        Self {
            kernel: kernel.clone(),
            name: None,
            priority: None,
        }
    }

    /// Set the thread's debug name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the thread's initial base priority.
    ///
    /// The value is clamped to the active scheduler's priority bounds.
    pub fn priority(mut self, priority: u32) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Spawn the thread and make it eligible to run.
    ///
    /// The new thread does not run immediately; it is enqueued on the ready
    /// queue and executes once the scheduler selects it.
    pub fn spawn<F>(self, f: F) -> JoinHandle
    where
        F: FnOnce() + Send + 'static,
    {
        self.spawn_parked(f).unpark()
    }

    /// Spawn the thread in a parked state.
    ///
    /// The thread exists (it is registered with the scheduler and can be
    /// placed on wait queues) but will not run until the returned handle is
    /// unparked.
    pub fn spawn_parked<F>(self, f: F) -> ParkHandle
    where
        F: FnOnce() + Send + 'static,
    {
        let thread = self
            .kernel
            .create_thread(self.name, self.priority, Some(Box::new(f)));
        ParkHandle::new(self.kernel, thread)
    }
}
