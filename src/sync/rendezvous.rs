//! Synchronous one-word exchange between paired threads.

use super::condvar::Condition;
use super::lock::Lock;
use crate::kernel::Kernel;
use std::sync::Arc;

/// A rendezvous channel pairing exactly one speaker with one listener per
/// exchange.
///
/// [`Rendezvous::speak`] does not return until some listener has consumed
/// exactly that word; [`Rendezvous::listen`] does not return until a speaker
/// has supplied one. With many concurrent speakers and listeners each
/// exchange is exclusive — no word reaches two listeners and no listener
/// takes two words per call. Any arrival order is safe, including bursts of
/// speakers before the first listener.
#[derive(Clone)]
pub struct Rendezvous {
    inner: Arc<RendezvousInner>,
}

struct RendezvousInner {
    lock: Lock,
    /// Speakers waiting for a free slot and a counted listener.
    speakers: Condition,
    /// Listeners waiting for a word to land in the slot.
    listeners: Condition,
    /// The publishing speaker waiting for its word to be consumed.
    delivered: Condition,
    state: spin::Mutex<SlotState>,
}

/// Mailbox state, mutated only while holding the rendezvous lock.
struct SlotState {
    /// The in-flight word; occupied between publish and consumption.
    slot: Option<i32>,
    speakers_waiting: usize,
    listeners_waiting: usize,
}

impl Rendezvous {
    /// Create a rendezvous channel on `kernel`.
    pub fn new(kernel: &Kernel) -> Self {
        let lock = Lock::new(kernel);
        Self {
            inner: Arc::new(RendezvousInner {
                speakers: Condition::new(&lock),
                listeners: Condition::new(&lock),
                delivered: Condition::new(&lock),
                lock,
                state: spin::Mutex::new(SlotState {
                    slot: None,
                    speakers_waiting: 0,
                    listeners_waiting: 0,
                }),
            }),
        }
    }

    /// Transfer `word` to exactly one listener, blocking until it is
    /// consumed.
    pub fn speak(&self, word: i32) {
        let rv = &self.inner;
        rv.lock.acquire();
        rv.state.lock().speakers_waiting += 1;

        // Wait for a free slot and at least one listener to pair with.
        loop {
            let state = rv.state.lock();
            if state.slot.is_none() && state.listeners_waiting > 0 {
                break;
            }
            drop(state);
            rv.speakers.sleep();
        }

        {
            let mut state = rv.state.lock();
            // Claim one listener and publish.
            state.listeners_waiting -= 1;
            state.slot = Some(word);
        }
        rv.listeners.wake();

        // The exchange completes once a listener empties the slot.
        while rv.state.lock().slot.is_some() {
            rv.delivered.sleep();
        }

        let speakers_left = {
            let mut state = rv.state.lock();
            state.speakers_waiting -= 1;
            state.speakers_waiting
        };
        if speakers_left > 0 {
            // The slot is free again; let the next speaker try to pair.
            rv.speakers.wake();
        }
        rv.lock.release();
    }

    /// Receive the word supplied by exactly one speaker, blocking until a
    /// speaker pairs with this call.
    pub fn listen(&self) -> i32 {
        let rv = &self.inner;
        rv.lock.acquire();

        {
            let mut state = rv.state.lock();
            state.listeners_waiting += 1;
            if state.speakers_waiting > 0 {
                drop(state);
                rv.speakers.wake();
            }
        }

        let word = loop {
            let mut state = rv.state.lock();
            if let Some(word) = state.slot.take() {
                break word;
            }
            drop(state);
            rv.listeners.sleep();
        };

        rv.delivered.wake();
        rv.lock.release();
        word
    }
}
