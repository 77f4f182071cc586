//! Scheduler and wait queue trait definitions.

use crate::thread::Thread;

/// An ordered collection of threads waiting for a resource.
///
/// Queues are produced by [`Scheduler::new_wait_queue`]. A queue created with
/// `transfer_priority` participates in priority donation: while threads wait,
/// their effective priority flows to the thread recorded via
/// [`WaitQueue::set_owner`].
///
/// Every method must be called with interrupts disabled; queue state is part
/// of the kernel bookkeeping that the interrupt discipline makes atomic. A
/// thread may sit in at most one wait queue at a time, and a queue's owner is
/// never in its own waiting set.
pub trait WaitQueue: Send {
    /// Add `thread` to the waiting set.
    fn enqueue(&mut self, thread: &Thread);

    /// Remove and return the next thread according to the policy.
    ///
    /// Returns `None` when no threads are waiting. A thread whose priority
    /// changed while enqueued is re-ranked here, at selection time.
    fn dequeue(&mut self) -> Option<Thread>;

    /// Record which thread currently holds the guarded resource.
    ///
    /// On transfer-enabled queues this is the donation target; passing `None`
    /// revokes any donation immediately.
    fn set_owner(&mut self, owner: Option<&Thread>);

    /// Whether no threads are waiting.
    fn is_empty(&self) -> bool;
}

/// A scheduling policy.
///
/// Supplies wait queues, stores per-thread base priorities within its
/// configured bounds, and answers effective-priority queries that account
/// for donation. All methods require interrupts disabled; the [`Kernel`]
/// wrappers take care of that for the public surface.
///
/// [`Kernel`]: crate::Kernel
pub trait Scheduler: Send + Sync {
    /// Create a wait queue under this policy.
    fn new_wait_queue(&self, transfer_priority: bool) -> Box<dyn WaitQueue>;

    /// Lowest allowed base priority.
    fn priority_minimum(&self) -> u32;

    /// Highest allowed base priority.
    fn priority_maximum(&self) -> u32;

    /// Base priority given to threads that do not request one.
    fn priority_default(&self) -> u32;

    /// Start tracking `thread` with the given base priority (clamped).
    fn register(&self, thread: &Thread, priority: u32);

    /// Stop tracking a finished thread.
    fn unregister(&self, thread: &Thread);

    /// `thread`'s base priority.
    fn priority_of(&self, thread: &Thread) -> u32;

    /// `thread`'s effective priority including donations.
    ///
    /// Recomputed lazily: structural changes (queue membership, ownership,
    /// base priority) invalidate a memo that is refreshed on the next query
    /// or selection.
    fn effective_priority_of(&self, thread: &Thread) -> u32;

    /// Set `thread`'s base priority, clamping out-of-range values to the
    /// nearest bound.
    fn set_priority(&self, thread: &Thread, priority: u32);

    /// Raise `thread`'s base priority by one; `false` at the maximum.
    fn increase_priority(&self, thread: &Thread) -> bool;

    /// Lower `thread`'s base priority by one; `false` at the minimum.
    fn decrease_priority(&self, thread: &Thread) -> bool;
}
