//! Context switching for simulated kernel threads.
//!
//! Each kernel thread is backed by a host thread that spends its blocked time
//! parked on its own [`SwitchSlot`]. A context switch resumes the target slot
//! and parks the current one; since a slot holds at most one resume token,
//! exactly one kernel thread executes at any instant. Switches only happen
//! with interrupts disabled, so every thread parks and resumes at a point
//! where the interrupt flag reads "off".

use std::sync::{Condvar, Mutex};

/// One kernel thread's parking spot.
pub(crate) struct SwitchSlot {
    resumed: Mutex<bool>,
    cv: Condvar,
}

impl SwitchSlot {
    pub(crate) fn new() -> Self {
        Self {
            resumed: Mutex::new(false),
            cv: Condvar::new(),
        }
    }

    /// Deposit the resume token and wake the parked thread, if any.
    pub(crate) fn resume(&self) {
        let mut resumed = self.resumed.lock().unwrap_or_else(|e| e.into_inner());
        *resumed = true;
        self.cv.notify_one();
    }

    /// Park until a resume token arrives, then consume it.
    pub(crate) fn park(&self) {
        let mut resumed = self.resumed.lock().unwrap_or_else(|e| e.into_inner());
        while !*resumed {
            resumed = self.cv.wait(resumed).unwrap_or_else(|e| e.into_inner());
        }
        *resumed = false;
    }
}
