//! Donation graph shared by the priority and lottery schedulers.
//!
//! The graph records two kinds of edges: a waiting thread points at the
//! queue it blocks on, and a transfer-enabled queue points at the thread
//! owning the guarded resource. A thread's effective priority is an
//! aggregate over its base priority and the effective priorities of every
//! thread waiting on a queue it owns — maximum under the priority policy,
//! saturating sum under the lottery policy — so donations propagate
//! transitively through chains of locks and joins.
//!
//! Effective priorities are memoized per thread. Any structural change
//! (enqueue, dequeue, ownership change, base priority change) clears the
//! memo along the chain of owners above the changed thread; queries and
//! selections recompute on demand.

use super::trait_def::WaitQueue;
use crate::thread::{Thread, ThreadId};
use rand::Rng;
use rand_pcg::Pcg64Mcg;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

pub(crate) type QueueId = u64;

/// How waiters are selected and how donations combine.
pub(crate) enum SelectPolicy {
    /// Pick the waiter with the highest effective priority, FIFO among
    /// ties; donations take the maximum.
    Highest,
    /// Hold a lottery weighted by effective ticket counts; donations add.
    Ticketed { rng: Pcg64Mcg },
}

struct ThreadNode {
    base: u32,
    /// Memoized effective priority; `None` after a structural change.
    memo: Option<u32>,
    waiting_on: Option<QueueId>,
    owns: BTreeSet<QueueId>,
}

struct QueueNode {
    transfer: bool,
    owner: Option<ThreadId>,
    /// Arrival order; selection indexes into this.
    waiters: Vec<Thread>,
}

pub(crate) struct DonationCore {
    policy: SelectPolicy,
    minimum: u32,
    maximum: u32,
    default_priority: u32,
    threads: BTreeMap<ThreadId, ThreadNode>,
    queues: BTreeMap<QueueId, QueueNode>,
    next_queue: QueueId,
}

impl DonationCore {
    pub(crate) fn new(policy: SelectPolicy, minimum: u32, maximum: u32, default: u32) -> Self {
        debug_assert!(minimum <= default && default <= maximum);
        Self {
            policy,
            minimum,
            maximum,
            default_priority: default,
            threads: BTreeMap::new(),
            queues: BTreeMap::new(),
            next_queue: 0,
        }
    }

    pub(crate) fn minimum(&self) -> u32 {
        self.minimum
    }

    pub(crate) fn maximum(&self) -> u32 {
        self.maximum
    }

    pub(crate) fn default_priority(&self) -> u32 {
        self.default_priority
    }

    fn clamp(&self, priority: u32) -> u32 {
        priority.clamp(self.minimum, self.maximum)
    }

    pub(crate) fn register(&mut self, thread: &Thread, priority: u32) {
        let clamped = self.clamp(priority);
        let previous = self.threads.insert(
            thread.id(),
            ThreadNode {
                base: clamped,
                memo: Some(clamped),
                waiting_on: None,
                owns: BTreeSet::new(),
            },
        );
        debug_assert!(previous.is_none(), "thread registered twice");
    }

    pub(crate) fn unregister(&mut self, id: ThreadId) {
        if let Some(node) = self.threads.remove(&id) {
            debug_assert!(node.waiting_on.is_none(), "finished thread still waiting");
            for qid in node.owns {
                if let Some(queue) = self.queues.get_mut(&qid) {
                    queue.owner = None;
                }
            }
        }
    }

    pub(crate) fn new_queue(&mut self, transfer: bool) -> QueueId {
        let id = self.next_queue;
        self.next_queue += 1;
        self.queues.insert(
            id,
            QueueNode {
                transfer,
                owner: None,
                waiters: Vec::new(),
            },
        );
        id
    }

    pub(crate) fn remove_queue(&mut self, qid: QueueId) {
        if let Some(queue) = self.queues.remove(&qid) {
            debug_assert!(queue.waiters.is_empty(), "dropping a queue with waiters");
            for waiter in &queue.waiters {
                if let Some(node) = self.threads.get_mut(&waiter.id()) {
                    node.waiting_on = None;
                }
            }
            if let Some(owner) = queue.owner {
                if let Some(node) = self.threads.get_mut(&owner) {
                    node.owns.remove(&qid);
                }
                if queue.transfer {
                    self.invalidate_chain(owner);
                }
            }
        }
    }

    pub(crate) fn enqueue(&mut self, qid: QueueId, thread: &Thread) {
        let id = thread.id();
        {
            let node = self
                .threads
                .get_mut(&id)
                .expect("thread not registered with this scheduler");
            debug_assert!(
                node.waiting_on.is_none(),
                "thread is already in another wait queue"
            );
            node.waiting_on = Some(qid);
        }
        let queue = self.queues.get_mut(&qid).expect("wait queue was dropped");
        debug_assert!(
            queue.owner != Some(id),
            "a queue's owner cannot wait on its own queue"
        );
        queue.waiters.push(thread.clone());
        let (transfer, owner) = (queue.transfer, queue.owner);
        if transfer {
            if let Some(owner) = owner {
                self.invalidate_chain(owner);
            }
        }
    }

    pub(crate) fn dequeue(&mut self, qid: QueueId) -> Option<Thread> {
        let waiter_ids: Vec<ThreadId> = self
            .queues
            .get(&qid)
            .map(|q| q.waiters.iter().map(Thread::id).collect())
            .unwrap_or_default();
        if waiter_ids.is_empty() {
            return None;
        }

        let effective: Vec<u32> = waiter_ids.iter().map(|&id| self.effective(id)).collect();
        let index = match &mut self.policy {
            SelectPolicy::Highest => {
                // Strict `>` keeps the earliest arrival among equal priorities.
                let mut best = 0;
                for (i, &e) in effective.iter().enumerate().skip(1) {
                    if e > effective[best] {
                        best = i;
                    }
                }
                best
            }
            SelectPolicy::Ticketed { rng } => {
                let total: u64 = effective.iter().map(|&e| e as u64).sum();
                let draw = rng.gen_range(1..=total);
                let mut cumulative = 0u64;
                let mut chosen = effective.len() - 1;
                for (i, &e) in effective.iter().enumerate() {
                    cumulative += e as u64;
                    if draw <= cumulative {
                        chosen = i;
                        break;
                    }
                }
                log::trace!("lottery drew ticket {} of {}", draw, total);
                chosen
            }
        };

        let queue = self.queues.get_mut(&qid).expect("wait queue was dropped");
        let winner = queue.waiters.remove(index);
        let (transfer, owner) = (queue.transfer, queue.owner);
        self.threads
            .get_mut(&winner.id())
            .expect("dequeued thread not registered")
            .waiting_on = None;
        if transfer {
            if let Some(owner) = owner {
                self.invalidate_chain(owner);
            }
        }
        Some(winner)
    }

    pub(crate) fn set_owner(&mut self, qid: QueueId, owner: Option<&Thread>) {
        let (transfer, old) = {
            let queue = self.queues.get_mut(&qid).expect("wait queue was dropped");
            (queue.transfer, queue.owner.take())
        };
        if let Some(old) = old {
            if let Some(node) = self.threads.get_mut(&old) {
                node.owns.remove(&qid);
            }
        }
        if let Some(thread) = owner {
            let id = thread.id();
            self.threads
                .get_mut(&id)
                .expect("owner not registered with this scheduler")
                .owns
                .insert(qid);
            self.queues.get_mut(&qid).expect("wait queue was dropped").owner = Some(id);
        }
        if transfer {
            if let Some(old) = old {
                self.invalidate_chain(old);
            }
            if let Some(thread) = owner {
                self.invalidate_chain(thread.id());
            }
        }
    }

    pub(crate) fn queue_is_empty(&self, qid: QueueId) -> bool {
        self.queues.get(&qid).map_or(true, |q| q.waiters.is_empty())
    }

    pub(crate) fn base_of(&self, id: ThreadId) -> u32 {
        self.threads.get(&id).map_or(self.minimum, |n| n.base)
    }

    pub(crate) fn set_base(&mut self, id: ThreadId, priority: u32) {
        let clamped = self.clamp(priority);
        if let Some(node) = self.threads.get_mut(&id) {
            node.base = clamped;
        }
        self.invalidate_chain(id);
    }

    pub(crate) fn raise(&mut self, id: ThreadId) -> bool {
        let Some(node) = self.threads.get(&id) else {
            return false;
        };
        if node.base == self.maximum {
            return false;
        }
        let next = node.base + 1;
        self.set_base(id, next);
        true
    }

    pub(crate) fn lower(&mut self, id: ThreadId) -> bool {
        let Some(node) = self.threads.get(&id) else {
            return false;
        };
        if node.base == self.minimum {
            return false;
        }
        let next = node.base - 1;
        self.set_base(id, next);
        true
    }

    /// `id`'s effective priority, recomputing the memo if stale.
    pub(crate) fn effective(&mut self, id: ThreadId) -> u32 {
        let mut visiting = BTreeSet::new();
        self.effective_inner(id, &mut visiting)
    }

    fn effective_inner(&mut self, id: ThreadId, visiting: &mut BTreeSet<ThreadId>) -> u32 {
        let base = match self.threads.get(&id) {
            Some(node) => {
                if let Some(memo) = node.memo {
                    return memo;
                }
                node.base
            }
            None => return self.minimum,
        };
        if !visiting.insert(id) {
            // Donation cycle: the threads involved are deadlocked; breaking
            // the recursion at the base priority keeps the walk finite.
            return base;
        }

        let additive = matches!(self.policy, SelectPolicy::Ticketed { .. });
        let mut accumulated = base as u64;
        let owned: Vec<QueueId> = self.threads[&id].owns.iter().copied().collect();
        for qid in owned {
            let waiters: Vec<ThreadId> = match self.queues.get(&qid) {
                Some(queue) if queue.transfer => queue.waiters.iter().map(Thread::id).collect(),
                _ => continue,
            };
            for waiter in waiters {
                let donated = self.effective_inner(waiter, visiting) as u64;
                accumulated = if additive {
                    accumulated.saturating_add(donated)
                } else {
                    accumulated.max(donated)
                };
            }
        }
        visiting.remove(&id);

        let effective = accumulated.min(self.maximum as u64) as u32;
        if let Some(node) = self.threads.get_mut(&id) {
            node.memo = Some(effective);
        }
        effective
    }

    /// Clear memos from `id` up through the chain of owners donated to.
    fn invalidate_chain(&mut self, id: ThreadId) {
        let mut seen = BTreeSet::new();
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            if !seen.insert(current) {
                break;
            }
            let waiting_on = match self.threads.get_mut(&current) {
                Some(node) => {
                    node.memo = None;
                    node.waiting_on
                }
                None => break,
            };
            cursor = waiting_on
                .and_then(|qid| self.queues.get(&qid))
                .filter(|queue| queue.transfer)
                .and_then(|queue| queue.owner);
        }
    }
}

/// A wait queue backed by a [`DonationCore`].
pub(crate) struct DonatingQueue {
    core: Arc<spin::Mutex<DonationCore>>,
    id: QueueId,
}

impl DonatingQueue {
    pub(crate) fn new(core: Arc<spin::Mutex<DonationCore>>, transfer: bool) -> Self {
        let id = core.lock().new_queue(transfer);
        Self { core, id }
    }
}

impl WaitQueue for DonatingQueue {
    fn enqueue(&mut self, thread: &Thread) {
        self.core.lock().enqueue(self.id, thread);
    }

    fn dequeue(&mut self) -> Option<Thread> {
        self.core.lock().dequeue(self.id)
    }

    fn set_owner(&mut self, owner: Option<&Thread>) {
        self.core.lock().set_owner(self.id, owner);
    }

    fn is_empty(&self) -> bool {
        self.core.lock().queue_is_empty(self.id)
    }
}

impl Drop for DonatingQueue {
    fn drop(&mut self) {
        self.core.lock().remove_queue(self.id);
    }
}
