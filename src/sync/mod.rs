//! Blocking synchronization primitives.
//!
//! All primitives here suspend the calling thread instead of spinning, and
//! build their atomicity on interrupt disable/restore. [`Lock`] is the
//! foundation; [`Condition`] adds atomic release-and-block on top of a lock;
//! [`Rendezvous`] composes a lock and condition variables into a synchronous
//! one-word exchange between exactly one speaker and one listener.

pub mod condvar;
pub mod lock;
pub mod rendezvous;

pub use condvar::Condition;
pub use lock::Lock;
pub use rendezvous::Rendezvous;
