//! Stress tests: high contention and adversarial interleavings.

use super::helpers::{boot_fifo, boot_lottery, spin_until};
use crate::sync::{Condition, Lock, Rendezvous};
use crate::thread::ThreadBuilder;
use portable_atomic::{AtomicU64, AtomicUsize, Ordering};
use std::collections::BTreeSet;
use std::sync::Arc;

#[test]
fn no_wakeup_is_lost_across_repeated_trials() {
    for trial in 0..10 {
        let kernel = boot_fifo();
        let lock = Lock::new(&kernel);
        let condition = Condition::new(&lock);
        let asleep = Arc::new(AtomicUsize::new(0));
        let woken = Arc::new(AtomicUsize::new(0));
        let sleepers = 6;
        let mut handles = Vec::new();

        for i in 0..sleepers {
            let (lock, condition) = (lock.clone(), condition.clone());
            let (asleep, woken) = (asleep.clone(), woken.clone());
            handles.push(
                ThreadBuilder::new(&kernel)
                    .name(format!("sleeper-{}-{}", trial, i))
                    .spawn(move || {
                        lock.acquire();
                        asleep.fetch_add(1, Ordering::SeqCst);
                        condition.sleep();
                        woken.fetch_add(1, Ordering::SeqCst);
                        lock.release();
                    }),
            );
        }

        spin_until(&kernel, || asleep.load(Ordering::SeqCst) == sleepers);

        // Wake one at a time with unrelated yields in between.
        for expected in 1..=sleepers {
            lock.acquire();
            condition.wake();
            lock.release();
            spin_until(&kernel, || woken.load(Ordering::SeqCst) == expected);
        }

        for handle in handles {
            handle.join().expect("sleeper failed");
        }
        assert_eq!(woken.load(Ordering::SeqCst), sleepers);
    }
}

#[test]
fn lock_survives_high_contention() {
    let kernel = boot_fifo();
    let lock = Lock::new(&kernel);
    let counter = Arc::new(AtomicU64::new(0));
    let thread_count = 10;
    let iterations = 100;
    let mut handles = Vec::new();

    for i in 0..thread_count {
        let (kernel, lock, counter) = (kernel.clone(), lock.clone(), counter.clone());
        handles.push(
            ThreadBuilder::new(&kernel)
                .name(format!("contender-{}", i))
                .spawn(move || {
                    for step in 0..iterations {
                        lock.acquire();
                        let seen = counter.load(Ordering::SeqCst);
                        if step % 7 == 0 {
                            kernel.yield_now();
                        }
                        counter.store(seen + 1, Ordering::SeqCst);
                        lock.release();
                    }
                }),
        );
    }

    for handle in handles {
        handle.join().expect("contender failed");
    }
    assert_eq!(counter.load(Ordering::SeqCst), thread_count * iterations);
}

#[test]
fn speaker_burst_drains_pairwise() {
    let kernel = boot_fifo();
    let rendezvous = Rendezvous::new(&kernel);
    let n = 12;
    let mut handles = Vec::new();

    // All speakers pile up before the first listener arrives.
    for word in 0..n {
        let rendezvous = rendezvous.clone();
        handles.push(kernel.spawn(move || rendezvous.speak(word)));
    }
    for _ in 0..20 {
        kernel.yield_now();
    }

    let mut heard = BTreeSet::new();
    for _ in 0..n {
        assert!(heard.insert(rendezvous.listen()), "word delivered twice");
    }
    assert_eq!(heard, (0..n).collect::<BTreeSet<i32>>());

    for handle in handles {
        handle.join().expect("speaker failed");
    }
}

#[test]
fn rendezvous_is_exact_under_lottery_interleavings() {
    for seed in [3, 17, 2026] {
        let kernel = boot_lottery(seed);
        let rendezvous = Rendezvous::new(&kernel);
        let heard = Arc::new(spin::Mutex::new(Vec::new()));
        let n = 10;
        let mut handles = Vec::new();

        // Interleave speaker and listener spawns; the lottery ready queue
        // scrambles execution order differently for every seed.
        for i in 0..n {
            let rendezvous_s = rendezvous.clone();
            handles.push(
                ThreadBuilder::new(&kernel)
                    .name(format!("speaker-{}", i))
                    .priority((i as u32 % 5) * 20 + 1)
                    .spawn(move || rendezvous_s.speak(i)),
            );
            let (rendezvous_l, heard) = (rendezvous.clone(), heard.clone());
            handles.push(
                ThreadBuilder::new(&kernel)
                    .name(format!("listener-{}", i))
                    .priority(((i as u32 + 3) % 5) * 20 + 1)
                    .spawn(move || {
                        let word = rendezvous_l.listen();
                        heard.lock().push(word);
                    }),
            );
        }

        for handle in handles {
            handle.join().expect("participant failed");
        }

        let heard = heard.lock();
        let distinct: BTreeSet<i32> = heard.iter().copied().collect();
        assert_eq!(heard.len(), n as usize, "seed {}", seed);
        assert_eq!(distinct, (0..n).collect::<BTreeSet<i32>>(), "seed {}", seed);
    }
}

#[test]
fn sleeping_threads_do_not_starve_the_clock() {
    let kernel = boot_fifo();
    let finished = Arc::new(AtomicUsize::new(0));
    let mut handles = Vec::new();

    for i in 0..6 {
        let (kernel, finished) = (kernel.clone(), finished.clone());
        handles.push(kernel.clone().spawn(move || {
            for _ in 0..3 {
                kernel.alarm().wait_until(10 + i as i64);
            }
            finished.fetch_add(1, Ordering::SeqCst);
        }));
    }

    for handle in handles {
        handle.join().expect("sleeper failed");
    }
    assert_eq!(finished.load(Ordering::SeqCst), 6);
}
