//! Shared helpers for the kernel test suite.

use crate::kernel::Kernel;
use crate::sched::{LotteryScheduler, PriorityScheduler};

/// Boot a kernel with the default FIFO policy and a short timer period.
pub(crate) fn boot_fifo() -> Kernel {
    Kernel::builder().timer_period(10).boot()
}

/// Boot a kernel scheduling by strict priority.
pub(crate) fn boot_priority() -> Kernel {
    Kernel::builder()
        .scheduler(PriorityScheduler::new())
        .timer_period(10)
        .boot()
}

/// Boot a kernel scheduling by lottery with a fixed seed.
pub(crate) fn boot_lottery(seed: u64) -> Kernel {
    Kernel::builder()
        .scheduler(LotteryScheduler::with_seed(seed))
        .timer_period(10)
        .boot()
}

/// Yield until `condition` holds, panicking if it never does.
pub(crate) fn spin_until(kernel: &Kernel, mut condition: impl FnMut() -> bool) {
    for _ in 0..10_000 {
        if condition() {
            return;
        }
        kernel.yield_now();
    }
    panic!("condition not reached after 10000 yields");
}
