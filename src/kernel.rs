//! The kernel context object.
//!
//! A [`Kernel`] bundles the machine (interrupt controller, timer), the active
//! scheduler, the ready queue, the thread table, and the alarm into one
//! explicit, cheaply cloneable context. Nothing in this crate is a global:
//! independent kernels can coexist in a single process, each with its own
//! clock and scheduling policy, which is how the test suite runs dozens of
//! isolated kernels side by side.
//!
//! Scheduling is cooperative. A thread runs until it blocks, yields, or is
//! interrupted by the periodic timer; making another thread ready never
//! preempts the running one immediately.

use crate::machine::timer::DEFAULT_TIMER_PERIOD;
use crate::machine::{InterruptController, IntrLevel, Timer};
use crate::sched::{FifoScheduler, Scheduler, WaitQueue};
use crate::thread::{JoinHandle, Thread, ThreadBuilder, ThreadId, ThreadState};
use crate::time::Alarm;
use portable_atomic::{AtomicU64, Ordering};
use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// Main kernel handle.
///
/// All clones refer to the same kernel instance. The handle is `Send` and
/// `Sync`; it is captured by every spawned thread body that needs to block,
/// yield, or sleep.
#[derive(Clone)]
pub struct Kernel {
    pub(crate) state: Arc<KernelState>,
}

pub(crate) struct KernelState {
    /// Active scheduling policy.
    scheduler: Box<dyn Scheduler>,
    /// Interrupt enable flag; the sole atomicity primitive.
    interrupts: InterruptController,
    /// Tick clock and periodic interrupt schedule.
    timer: Timer,
    /// The thread currently holding the execution unit.
    current: spin::Mutex<Option<Thread>>,
    /// Threads eligible to run, ordered by the scheduler's policy.
    ready: spin::Mutex<Box<dyn WaitQueue>>,
    /// Live threads and their join waiters.
    threads: spin::Mutex<BTreeMap<ThreadId, ThreadEntry>>,
    /// Timer-driven sleep facility; set once during boot.
    alarm: spin::Once<Alarm>,
    /// Next thread ID to assign. Starts from 1, never reused.
    next_id: AtomicU64,
}

struct ThreadEntry {
    thread: Thread,
    /// Transfer-enabled queue owned by the thread; joiners wait (and donate)
    /// here until the thread finishes.
    joiners: Box<dyn WaitQueue>,
}

/// Builder for a [`Kernel`].
pub struct KernelBuilder {
    scheduler: Option<Box<dyn Scheduler>>,
    timer_period: u64,
}

impl KernelBuilder {
    fn new() -> Self {
        Self {
            scheduler: None,
            timer_period: DEFAULT_TIMER_PERIOD,
        }
    }

    /// Select the scheduling policy. Defaults to [`FifoScheduler`].
    pub fn scheduler<S: Scheduler + 'static>(mut self, scheduler: S) -> Self {
        self.scheduler = Some(Box::new(scheduler));
        self
    }

    /// Set the interval between timer interrupts, in ticks.
    pub fn timer_period(mut self, ticks: u64) -> Self {
        self.timer_period = ticks;
        self
    }

    /// Construct the kernel and adopt the calling thread as its first thread.
    pub fn boot(self) -> Kernel {
        let scheduler = self
            .scheduler
            .unwrap_or_else(|| Box::new(FifoScheduler::new()));
        let ready = scheduler.new_wait_queue(false);
        let kernel = Kernel {
            state: Arc::new(KernelState {
                scheduler,
                interrupts: InterruptController::new(),
                timer: Timer::new(self.timer_period),
                current: spin::Mutex::new(None),
                ready: spin::Mutex::new(ready),
                threads: spin::Mutex::new(BTreeMap::new()),
                alarm: spin::Once::new(),
                next_id: AtomicU64::new(1),
            }),
        };

        let main = kernel.create_thread(Some("main".into()), None, None);
        main.set_state(ThreadState::Running);
        *kernel.state.current.lock() = Some(main);
        kernel.state.alarm.call_once(|| Alarm::new(&kernel));
        log::debug!(
            "kernel booted (timer period {} ticks)",
            kernel.state.timer.period()
        );
        kernel
    }
}

impl Kernel {
    /// Start configuring a kernel.
    pub fn builder() -> KernelBuilder {
        KernelBuilder::new()
    }

    /// Boot a kernel with the default FIFO scheduler and timer period.
    pub fn boot() -> Kernel {
        KernelBuilder::new().boot()
    }

    // ------------------------------------------------------------------
    // Interrupts
    // ------------------------------------------------------------------

    /// Disable interrupts, returning the previous level.
    pub fn disable_interrupts(&self) -> IntrLevel {
        self.state.interrupts.disable()
    }

    /// Restore a previously saved interrupt level.
    ///
    /// Re-enabling advances the clock by one tick; if that makes a timer
    /// interrupt due, the alarm handler runs on the current thread and then
    /// yields the processor.
    pub fn restore_interrupts(&self, level: IntrLevel) {
        if self.state.interrupts.restore(level) {
            self.after_enable();
        }
    }

    /// Whether interrupts are currently enabled.
    pub fn interrupts_enabled(&self) -> bool {
        self.state.interrupts.is_enabled()
    }

    /// RAII interrupt-disabled section.
    pub(crate) fn interrupts_off(&self) -> IntrGuard<'_> {
        IntrGuard {
            kernel: self,
            level: self.disable_interrupts(),
        }
    }

    /// Clock advancement and timer dispatch at the interrupt-enable edge.
    fn after_enable(&self) {
        if std::thread::panicking() {
            // Unwinding through a guard; do not schedule on a dying thread.
            return;
        }
        let now = self.state.timer.advance();
        if self.state.timer.is_due(now) {
            self.state.timer.acknowledge(now);
            if self.state.current.lock().is_some() {
                if let Some(alarm) = self.state.alarm.get() {
                    log::trace!("timer interrupt at tick {}", now);
                    alarm.timer_interrupt();
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Time
    // ------------------------------------------------------------------

    /// Current tick count.
    pub fn ticks(&self) -> u64 {
        self.state.timer.now()
    }

    /// The machine timer.
    pub fn timer(&self) -> &Timer {
        &self.state.timer
    }

    /// The timer-driven sleep facility.
    pub fn alarm(&self) -> &Alarm {
        self.state.alarm.get().expect("kernel not booted")
    }

    // ------------------------------------------------------------------
    // Threads
    // ------------------------------------------------------------------

    /// Spawn a thread with the default name and priority.
    pub fn spawn<F>(&self, f: F) -> JoinHandle
    where
        F: FnOnce() + Send + 'static,
    {
        ThreadBuilder::new(self).spawn(f)
    }

    /// The thread currently holding the execution unit.
    pub fn current_thread(&self) -> Thread {
        self.state
            .current
            .lock()
            .clone()
            .expect("called from a thread unknown to this kernel")
    }

    /// Yield the execution unit to the scheduler.
    ///
    /// The calling thread stays runnable and is rescheduled according to the
    /// active policy; with only one runnable thread this is a no-op.
    pub fn yield_now(&self) {
        let _intr = self.interrupts_off();
        let current = self.current_thread();
        current.set_state(ThreadState::Ready);
        self.state.ready.lock().enqueue(&current);
        let next = self.reschedule();
        self.switch_from(current, next);
    }

    pub(crate) fn create_thread(
        &self,
        name: Option<String>,
        priority: Option<u32>,
        body: Option<Box<dyn FnOnce() + Send + 'static>>,
    ) -> Thread {
        let id = ThreadId::new(self.state.next_id.fetch_add(1, Ordering::AcqRel));
        let name = name.unwrap_or_else(|| format!("thread-{}", id));
        let thread = Thread::new(id, name, body);

        let _intr = self.interrupts_off();
        let priority = priority.unwrap_or_else(|| self.state.scheduler.priority_default());
        self.state.scheduler.register(&thread, priority);
        let mut joiners = self.state.scheduler.new_wait_queue(true);
        joiners.set_owner(Some(&thread));
        self.state.threads.lock().insert(
            id,
            ThreadEntry {
                thread: thread.clone(),
                joiners,
            },
        );
        log::trace!("created thread {} '{}'", id, thread.name());
        thread
    }

    /// Mark `thread` eligible to run and enqueue it on the ready queue.
    ///
    /// Requires interrupts disabled. The thread does not run immediately.
    pub(crate) fn ready_thread(&self, thread: &Thread) {
        debug_assert!(!self.interrupts_enabled());
        thread.set_state(ThreadState::Ready);
        self.start_host_if_needed(thread);
        self.state.ready.lock().enqueue(thread);
        log::trace!("readied thread '{}'", thread.name());
    }

    /// Block the current thread until someone calls [`Self::ready_thread`].
    ///
    /// Must be called with interrupts disabled; the caller re-enables after
    /// this returns, which happens once the thread is rescheduled.
    pub(crate) fn block_current(&self) {
        assert!(
            !self.interrupts_enabled(),
            "blocking requires interrupts disabled"
        );
        let current = self.current_thread();
        current.set_state(ThreadState::Blocked);
        let next = self.reschedule();
        self.switch_from(current, next);
    }

    /// Enqueue `joiner` on `target`'s join queue.
    ///
    /// Returns `false` when the target has already finished.
    pub(crate) fn enqueue_joiner(&self, target: &Thread, joiner: &Thread) -> bool {
        debug_assert!(!self.interrupts_enabled());
        let mut threads = self.state.threads.lock();
        match threads.get_mut(&target.id()) {
            Some(entry) => {
                entry.joiners.enqueue(joiner);
                true
            }
            None => false,
        }
    }

    /// Terminate the current thread, waking its joiners.
    ///
    /// Never switches back; the caller's host context ends after this.
    pub(crate) fn finish_current(&self, panicked: bool) {
        let _level = self.disable_interrupts();
        let current = self.current_thread();
        if panicked {
            current.mark_panicked();
            log::warn!("thread '{}' panicked", current.name());
        }
        current.set_state(ThreadState::Finished);

        if let Some(mut entry) = self.state.threads.lock().remove(&current.id()) {
            while let Some(joiner) = entry.joiners.dequeue() {
                self.ready_thread(&joiner);
            }
            entry.joiners.set_owner(None);
        }
        self.state.scheduler.unregister(&current);
        log::trace!("thread '{}' finished", current.name());

        let next = self.reschedule();
        next.set_state(ThreadState::Running);
        *self.state.current.lock() = Some(next.clone());
        next.slot().resume();
        // Interrupts stay disabled; the resumed thread restores its own level.
    }

    // ------------------------------------------------------------------
    // Scheduling internals
    // ------------------------------------------------------------------

    /// Pick the next thread to run.
    ///
    /// When every thread is blocked, the machine idles: the clock jumps to
    /// the next timer boundary that delivers a pending timed wakeup. If no
    /// wakeup is pending either, the system is deadlocked.
    fn reschedule(&self) -> Thread {
        loop {
            if let Some(next) = self.state.ready.lock().dequeue() {
                return next;
            }
            let alarm = self.state.alarm.get().expect("kernel not booted");
            match alarm.earliest_deadline() {
                Some(deadline) => {
                    let now = self.state.timer.now();
                    let target = self.state.timer.boundary_at_or_after(deadline.max(now));
                    let now = self.state.timer.fast_forward(target);
                    self.state.timer.acknowledge(now);
                    log::trace!("machine idle; clock jumped to tick {}", now);
                    alarm.service(now);
                }
                None => {
                    let registered = self.state.threads.lock().len();
                    log::error!("every thread is blocked and no timed wakeup is pending");
                    panic!(
                        "deadlock: no runnable threads and no pending timed wakeups \
                         ({} threads registered)",
                        registered
                    );
                }
            }
        }
    }

    /// Hand the execution unit from `prev` to `next`.
    fn switch_from(&self, prev: Thread, next: Thread) {
        debug_assert!(!self.interrupts_enabled());
        if prev == next {
            next.set_state(ThreadState::Running);
            return;
        }
        log::trace!("context switch: '{}' -> '{}'", prev.name(), next.name());
        next.set_state(ThreadState::Running);
        *self.state.current.lock() = Some(next.clone());
        next.slot().resume();
        prev.slot().park();
        // Resumed: we are current again and interrupts are still disabled.
    }

    fn start_host_if_needed(&self, thread: &Thread) {
        if thread.has_body() && thread.claim_host_start() {
            let kernel = self.clone();
            let thread = thread.clone();
            let name = thread.name().to_string();
            std::thread::Builder::new()
                .name(name)
                .spawn(move || kernel.run_thread(thread))
                .expect("failed to spawn host thread");
        }
    }

    /// Host-side entry point of a spawned thread.
    fn run_thread(self, thread: Thread) {
        thread.slot().park();
        // Scheduled for the first time; interrupts are disabled from the
        // switch that resumed us.
        self.restore_interrupts(IntrLevel::On);
        let body = thread.take_body().expect("thread body already taken");
        let panicked = catch_unwind(AssertUnwindSafe(body)).is_err();
        self.finish_current(panicked);
    }

    // ------------------------------------------------------------------
    // Priorities
    // ------------------------------------------------------------------

    /// The active scheduling policy.
    pub fn scheduler(&self) -> &dyn Scheduler {
        self.state.scheduler.as_ref()
    }

    /// `thread`'s base priority.
    pub fn priority_of(&self, thread: &Thread) -> u32 {
        let _intr = self.interrupts_off();
        self.state.scheduler.priority_of(thread)
    }

    /// `thread`'s effective priority, including donations.
    pub fn effective_priority_of(&self, thread: &Thread) -> u32 {
        let _intr = self.interrupts_off();
        self.state.scheduler.effective_priority_of(thread)
    }

    /// Set `thread`'s base priority, clamped to the scheduler's bounds.
    pub fn set_priority(&self, thread: &Thread, priority: u32) {
        let _intr = self.interrupts_off();
        self.state.scheduler.set_priority(thread, priority);
    }

    /// Raise the calling thread's base priority by one.
    ///
    /// Returns `false` if it is already at the maximum.
    pub fn increase_priority(&self) -> bool {
        let _intr = self.interrupts_off();
        let current = self.current_thread();
        self.state.scheduler.increase_priority(&current)
    }

    /// Lower the calling thread's base priority by one.
    ///
    /// Returns `false` if it is already at the minimum.
    pub fn decrease_priority(&self) -> bool {
        let _intr = self.interrupts_off();
        let current = self.current_thread();
        self.state.scheduler.decrease_priority(&current)
    }
}

impl core::fmt::Debug for Kernel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Kernel")
            .field("ticks", &self.ticks())
            .field("interrupts_enabled", &self.interrupts_enabled())
            .finish()
    }
}

/// RAII interrupt-disabled critical section.
///
/// Restores the saved level exactly once on every exit path, including
/// panics.
pub(crate) struct IntrGuard<'a> {
    kernel: &'a Kernel,
    level: IntrLevel,
}

impl Drop for IntrGuard<'_> {
    fn drop(&mut self) {
        self.kernel.restore_interrupts(self.level);
    }
}
