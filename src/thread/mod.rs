//! Thread abstraction: handles, lifecycle states, and construction.
//!
//! A [`Thread`] is a cheaply cloneable handle to a schedulable unit of
//! execution. Handles carry identity and lifecycle state; scheduling
//! bookkeeping (base and effective priority, queue membership) lives in the
//! active scheduler, keyed by [`ThreadId`]. The kernel's thread table owns
//! the authoritative set of live threads — wait queues hold handles only.

use crate::machine::context::SwitchSlot;
use core::fmt;
use core::num::NonZeroU64;
use portable_atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

pub mod builder;
pub mod handle;

pub use builder::ThreadBuilder;
pub use handle::{JoinHandle, ParkHandle};

/// Unique identifier for threads.
///
/// Thread IDs are never reused and are guaranteed to be non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ThreadId(NonZeroU64);

impl ThreadId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(NonZeroU64::new(raw).expect("thread ids start at 1"))
    }

    /// Get the raw ID value.
    pub fn get(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Thread execution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ThreadState {
    /// Thread is eligible to run and sitting in the ready queue
    Ready = 0,
    /// Thread is currently executing
    Running = 1,
    /// Thread is blocked waiting for something
    Blocked = 2,
    /// Thread has finished execution
    Finished = 3,
}

impl ThreadState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => ThreadState::Ready,
            1 => ThreadState::Running,
            2 => ThreadState::Blocked,
            _ => ThreadState::Finished,
        }
    }
}

/// A handle to a kernel thread.
///
/// Handles are reference-counted; cloning is cheap and all clones refer to
/// the same thread.
#[derive(Clone)]
pub struct Thread {
    inner: Arc<ThreadInner>,
}

pub(crate) struct ThreadInner {
    id: ThreadId,
    name: String,
    state: AtomicU8,
    panicked: AtomicBool,
    slot: SwitchSlot,
    body: spin::Mutex<Option<Box<dyn FnOnce() + Send + 'static>>>,
    host_started: AtomicBool,
}

impl Thread {
    pub(crate) fn new(
        id: ThreadId,
        name: String,
        body: Option<Box<dyn FnOnce() + Send + 'static>>,
    ) -> Self {
        Self {
            inner: Arc::new(ThreadInner {
                id,
                name,
                state: AtomicU8::new(ThreadState::Blocked as u8),
                panicked: AtomicBool::new(false),
                slot: SwitchSlot::new(),
                body: spin::Mutex::new(body),
                host_started: AtomicBool::new(false),
            }),
        }
    }

    /// This thread's unique id.
    pub fn id(&self) -> ThreadId {
        self.inner.id
    }

    /// This thread's debug name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ThreadState {
        ThreadState::from_u8(self.inner.state.load(Ordering::Acquire))
    }

    pub(crate) fn set_state(&self, state: ThreadState) {
        self.inner.state.store(state as u8, Ordering::Release);
    }

    /// Whether this thread finished by panicking.
    pub fn panicked(&self) -> bool {
        self.inner.panicked.load(Ordering::Acquire)
    }

    pub(crate) fn mark_panicked(&self) {
        self.inner.panicked.store(true, Ordering::Release);
    }

    pub(crate) fn slot(&self) -> &SwitchSlot {
        &self.inner.slot
    }

    pub(crate) fn has_body(&self) -> bool {
        self.inner.body.lock().is_some()
    }

    pub(crate) fn take_body(&self) -> Option<Box<dyn FnOnce() + Send + 'static>> {
        self.inner.body.lock().take()
    }

    /// Claim the right to start this thread's host context.
    ///
    /// Returns `true` exactly once.
    pub(crate) fn claim_host_start(&self) -> bool {
        !self.inner.host_started.swap(true, Ordering::AcqRel)
    }
}

impl PartialEq for Thread {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Thread {}

impl fmt::Debug for Thread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Thread")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("state", &self.state())
            .finish()
    }
}
