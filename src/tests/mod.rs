//! Kernel test suite.
//!
//! Scenario tests for the synchronization primitives and schedulers, split
//! the same way the modules are: `unit` covers single-primitive behavior,
//! `integration` covers cross-component scenarios (rendezvous pairing,
//! donation chains), `stress` runs high-contention interleavings, and
//! `property` checks statistical and bound invariants.

mod helpers;
mod stress;
mod unit;
