//! Interrupt enable/disable state.
//!
//! Disabling interrupts is the only way to make a compound mutation of kernel
//! bookkeeping atomic: with interrupts off, the running thread cannot be
//! preempted by the timer, and since only one thread executes at a time, it
//! has the machine to itself. The controller only tracks the flag; the kernel
//! layers clock advancement and timer dispatch on top of `restore`.

use portable_atomic::{AtomicBool, Ordering};

/// Interrupt level returned by `disable` and consumed by `restore`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntrLevel {
    /// Interrupts are off.
    Off,
    /// Interrupts are on.
    On,
}

/// The machine's interrupt enable flag.
///
/// Critical sections bracket mutations with `disable`/`restore` pairs.
/// Nesting is supported: an inner `restore(Off)` leaves interrupts disabled,
/// and only the outermost `restore(On)` re-enables them.
pub struct InterruptController {
    enabled: AtomicBool,
}

impl InterruptController {
    /// Create a controller with interrupts enabled.
    pub(crate) fn new() -> Self {
        Self {
            enabled: AtomicBool::new(true),
        }
    }

    /// Whether interrupts are currently enabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Disable interrupts, returning the previous level.
    pub(crate) fn disable(&self) -> IntrLevel {
        if self.enabled.swap(false, Ordering::AcqRel) {
            IntrLevel::On
        } else {
            IntrLevel::Off
        }
    }

    /// Restore a previously saved level.
    ///
    /// Returns `true` when this call transitioned the machine from disabled
    /// to enabled — the point at which the kernel advances the clock and
    /// dispatches a due timer interrupt.
    pub(crate) fn restore(&self, level: IntrLevel) -> bool {
        match level {
            IntrLevel::On => !self.enabled.swap(true, Ordering::AcqRel),
            IntrLevel::Off => {
                self.enabled.store(false, Ordering::Release);
                false
            }
        }
    }
}
