//! Unit tests for locks, condition variables, the alarm, and priorities.

use super::helpers::{boot_fifo, boot_priority, spin_until};
use crate::errors::JoinError;
use crate::sync::{Condition, Lock};
use crate::thread::{ThreadBuilder, ThreadState};
use portable_atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

#[test]
fn spawn_and_join() {
    let kernel = boot_fifo();
    let counter = Arc::new(AtomicU64::new(0));
    let counter_clone = counter.clone();

    let handle = ThreadBuilder::new(&kernel)
        .name("worker")
        .spawn(move || {
            counter_clone.fetch_add(1, Ordering::SeqCst);
        });

    handle.join().expect("worker failed");
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[test]
fn join_reports_panicked_thread() {
    let kernel = boot_fifo();
    let handle = kernel.spawn(|| panic!("boom"));
    assert_eq!(handle.join(), Err(JoinError::Panicked));
}

#[test]
fn spawned_thread_runs_after_unpark_only() {
    let kernel = boot_fifo();
    let ran = Arc::new(AtomicU64::new(0));
    let ran_clone = ran.clone();

    let parked = ThreadBuilder::new(&kernel).name("parked").spawn_parked(move || {
        ran_clone.store(1, Ordering::SeqCst);
    });

    for _ in 0..5 {
        kernel.yield_now();
    }
    assert_eq!(ran.load(Ordering::SeqCst), 0);
    assert_eq!(parked.thread().state(), ThreadState::Blocked);

    parked.unpark().join().expect("parked thread failed");
    assert_eq!(ran.load(Ordering::SeqCst), 1);
}

#[test]
fn lock_provides_mutual_exclusion() {
    let kernel = boot_fifo();
    let lock = Lock::new(&kernel);
    // Non-atomic read-modify-write, with a yield inside the critical section
    // to invite interleaving; the lock must serialize it anyway.
    let counter = Arc::new(AtomicU64::new(0));
    let mut handles = Vec::new();

    for i in 0..8 {
        let (kernel, lock, counter) = (kernel.clone(), lock.clone(), counter.clone());
        let handle = ThreadBuilder::new(&kernel)
            .name(format!("locker-{}", i))
            .spawn(move || {
                for _ in 0..10 {
                    lock.acquire();
                    assert!(lock.is_held_by_current_thread());
                    let seen = counter.load(Ordering::SeqCst);
                    kernel.yield_now();
                    counter.store(seen + 1, Ordering::SeqCst);
                    lock.release();
                }
            });
        handles.push(handle);
    }

    for handle in handles {
        handle.join().expect("locker failed");
    }
    assert_eq!(counter.load(Ordering::SeqCst), 80);
}

#[test]
fn lock_is_not_held_by_other_threads() {
    let kernel = boot_fifo();
    let lock = Lock::new(&kernel);

    lock.acquire();
    assert!(lock.is_held_by_current_thread());

    let handle = {
        let lock = lock.clone();
        kernel.spawn(move || {
            assert!(!lock.is_held_by_current_thread());
        })
    };
    kernel.yield_now();
    lock.release();
    handle.join().expect("observer failed");
    assert!(!lock.is_held_by_current_thread());
}

#[test]
#[should_panic(expected = "re-acquired a lock it already holds")]
fn reentrant_acquire_is_fatal() {
    let kernel = boot_fifo();
    let lock = Lock::new(&kernel);
    lock.acquire();
    lock.acquire();
}

#[test]
#[should_panic(expected = "released a lock it does not hold")]
fn release_by_non_holder_is_fatal() {
    let kernel = boot_fifo();
    let lock = Lock::new(&kernel);
    lock.release();
}

#[test]
#[should_panic(expected = "without holding its lock")]
fn condition_wake_requires_the_lock() {
    let kernel = boot_fifo();
    let lock = Lock::new(&kernel);
    let condition = Condition::new(&lock);
    condition.wake();
}

#[test]
fn wake_readies_at_most_one_sleeper() {
    let kernel = boot_fifo();
    let lock = Lock::new(&kernel);
    let condition = Condition::new(&lock);
    let asleep = Arc::new(AtomicUsize::new(0));
    let woken = Arc::new(AtomicUsize::new(0));
    let mut handles = Vec::new();

    for i in 0..3 {
        let (lock, condition) = (lock.clone(), condition.clone());
        let (asleep, woken) = (asleep.clone(), woken.clone());
        handles.push(ThreadBuilder::new(&kernel).name(format!("sleeper-{}", i)).spawn(
            move || {
                lock.acquire();
                asleep.fetch_add(1, Ordering::SeqCst);
                condition.sleep();
                woken.fetch_add(1, Ordering::SeqCst);
                lock.release();
            },
        ));
    }

    spin_until(&kernel, || asleep.load(Ordering::SeqCst) == 3);

    lock.acquire();
    condition.wake();
    lock.release();
    spin_until(&kernel, || woken.load(Ordering::SeqCst) == 1);
    for _ in 0..20 {
        kernel.yield_now();
    }
    assert_eq!(woken.load(Ordering::SeqCst), 1);

    lock.acquire();
    condition.wake_all();
    lock.release();
    for handle in handles {
        handle.join().expect("sleeper failed");
    }
    assert_eq!(woken.load(Ordering::SeqCst), 3);
}

#[test]
fn wake_on_empty_condition_is_a_no_op() {
    let kernel = boot_fifo();
    let lock = Lock::new(&kernel);
    let condition = Condition::new(&lock);

    lock.acquire();
    condition.wake();
    condition.wake_all();
    lock.release();
}

#[test]
fn sleep_wake_handshake() {
    let kernel = boot_fifo();
    let lock = Lock::new(&kernel);
    let condition = Condition::new(&lock);
    let stage = Arc::new(AtomicUsize::new(0));

    let handle = {
        let (lock, condition, stage) = (lock.clone(), condition.clone(), stage.clone());
        kernel.spawn(move || {
            lock.acquire();
            stage.store(1, Ordering::SeqCst);
            condition.sleep();
            // The lock is held again after sleep returns.
            assert!(lock.is_held_by_current_thread());
            stage.store(2, Ordering::SeqCst);
            lock.release();
        })
    };

    spin_until(&kernel, || stage.load(Ordering::SeqCst) == 1);
    lock.acquire();
    condition.wake();
    lock.release();
    handle.join().expect("sleeper failed");
    assert_eq!(stage.load(Ordering::SeqCst), 2);
}

#[test]
fn alarm_returns_immediately_for_non_positive_waits() {
    let kernel = boot_fifo();
    let before = kernel.ticks();
    kernel.alarm().wait_until(0);
    kernel.alarm().wait_until(-25);
    // No timer interrupt was needed to get here.
    assert!(kernel.ticks() <= before + 1);
}

#[test]
fn alarm_wakes_at_or_after_the_deadline() {
    let kernel = boot_fifo();
    let start = kernel.ticks();
    kernel.alarm().wait_until(30);
    assert!(kernel.ticks() >= start + 30);
}

#[test]
fn alarm_wakes_sleepers_in_deadline_order() {
    let kernel = boot_fifo();
    let wake_log = Arc::new(spin::Mutex::new(Vec::new()));
    let mut handles = Vec::new();

    for (name, delay) in [("long", 150i64), ("short", 50), ("medium", 100)] {
        let (kernel, wake_log) = (kernel.clone(), wake_log.clone());
        handles.push(ThreadBuilder::new(&kernel).name(name).spawn(move || {
            let start = kernel.ticks();
            kernel.alarm().wait_until(delay);
            wake_log.lock().push((name, start, kernel.ticks()));
        }));
    }

    for handle in handles {
        handle.join().expect("sleeper failed");
    }

    let log = wake_log.lock();
    let order: Vec<&str> = log.iter().map(|(name, _, _)| *name).collect();
    assert_eq!(order, ["short", "medium", "long"]);
    for (name, start, woke) in log.iter() {
        let delay = match *name {
            "short" => 50,
            "medium" => 100,
            _ => 150,
        };
        assert!(
            woke - start >= delay,
            "{} woke after {} ticks, wanted at least {}",
            name,
            woke - start,
            delay
        );
    }
}

#[test]
fn alarm_wakes_each_sleeper_exactly_once() {
    let kernel = boot_fifo();
    let wakeups = Arc::new(AtomicUsize::new(0));
    let mut handles = Vec::new();

    for _ in 0..4 {
        let (kernel, wakeups) = (kernel.clone(), wakeups.clone());
        handles.push(kernel.clone().spawn(move || {
            kernel.alarm().wait_until(40);
            wakeups.fetch_add(1, Ordering::SeqCst);
        }));
    }
    for handle in handles {
        handle.join().expect("sleeper failed");
    }
    assert_eq!(wakeups.load(Ordering::SeqCst), 4);
}

#[test]
fn priority_changes_clamp_and_bound() {
    let kernel = boot_priority();
    let main = kernel.current_thread();

    kernel.set_priority(&main, 999);
    assert_eq!(kernel.priority_of(&main), 7);
    assert!(!kernel.increase_priority());
    assert!(kernel.decrease_priority());
    assert_eq!(kernel.priority_of(&main), 6);

    kernel.set_priority(&main, 0);
    assert!(!kernel.decrease_priority());
    assert!(kernel.increase_priority());
    assert_eq!(kernel.priority_of(&main), 1);
}

#[test]
fn current_thread_is_running() {
    let kernel = boot_fifo();
    let main = kernel.current_thread();
    assert_eq!(main.state(), ThreadState::Running);
    assert_eq!(main.name(), "main");
}
