//! Per-page shared/exclusive lock manager.
//!
//! One mutex guards the whole lock table and the waits-for graph; blocked
//! transactions wait on a per-page condition variable. Before a requester is
//! allowed to block, the manager checks whether waiting would close a cycle
//! in the waits-for graph and, if so, aborts the requester instead.
//!
//! Waiters are a set, not a queue: wakeup order is not FIFO, and every
//! awoken waiter re-evaluates its grant condition from scratch.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use crate::error::{DbError, DbResult};
use crate::storage::page::PageId;
use crate::transaction::id::TransactionId;

/// Bound on a single condition wait. Purely a re-check interval for
/// spurious wakeups, not a cancellation mechanism.
const WAIT_INTERVAL: Duration = Duration::from_secs(1);

/// Lock modes a transaction can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockMode {
    Shared,
    Exclusive,
}

/// What a page's lock currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LockKind {
    None,
    Shared,
    Exclusive,
}

/// How a successful acquisition happened.
enum Granted {
    Fresh,
    Upgrade,
}

struct LockState {
    kind: LockKind,
    owners: HashSet<TransactionId>,
    waiters: HashSet<TransactionId>,
    cond: Arc<Condvar>,
}

impl LockState {
    fn new() -> Self {
        Self {
            kind: LockKind::None,
            owners: HashSet::new(),
            waiters: HashSet::new(),
            cond: Arc::new(Condvar::new()),
        }
    }

    fn holds(&self, tid: TransactionId) -> bool {
        self.owners.contains(&tid)
    }

    /// Grant table:
    ///
    /// | current   | requested | held by tid? | grant              |
    /// |-----------|-----------|--------------|--------------------|
    /// | None      | S or X    | -            | yes                |
    /// | Shared    | S         | any          | yes                |
    /// | Shared    | X         | sole owner   | yes (upgrade)      |
    /// | Shared    | X         | otherwise    | no                 |
    /// | Exclusive | S or X    | yes          | yes (re-entrant)   |
    /// | Exclusive | S or X    | no           | no                 |
    fn try_acquire(&mut self, tid: TransactionId, mode: LockMode) -> Option<Granted> {
        match (self.kind, mode) {
            (LockKind::None, LockMode::Shared) => {
                self.kind = LockKind::Shared;
                self.owners.insert(tid);
                Some(Granted::Fresh)
            }
            (LockKind::None, LockMode::Exclusive) => {
                self.kind = LockKind::Exclusive;
                self.owners.insert(tid);
                Some(Granted::Fresh)
            }
            (LockKind::Shared, LockMode::Shared) => {
                self.owners.insert(tid);
                Some(Granted::Fresh)
            }
            (LockKind::Shared, LockMode::Exclusive) => {
                if self.owners.len() == 1 && self.owners.contains(&tid) {
                    self.kind = LockKind::Exclusive;
                    Some(Granted::Upgrade)
                } else {
                    None
                }
            }
            (LockKind::Exclusive, _) => self.owners.contains(&tid).then_some(Granted::Fresh),
        }
    }

    /// Removes `tid` from the owners; returns true if it was an owner.
    fn release(&mut self, tid: TransactionId) -> bool {
        if self.owners.remove(&tid) {
            if self.owners.is_empty() {
                self.kind = LockKind::None;
            }
            true
        } else {
            false
        }
    }
}

struct LockTables {
    pages: HashMap<PageId, LockState>,
    /// Adjacency map of the waits-for graph: waiter -> transactions it is
    /// blocked behind. An entry exists only while its waiter is blocked.
    waits_for: HashMap<TransactionId, HashSet<TransactionId>>,
}

impl LockTables {
    /// True if any current owner can already reach `requester` through the
    /// waits-for graph; blocking `requester` behind that owner would close a
    /// cycle.
    fn closes_cycle(&self, requester: TransactionId) -> bool {
        let Some(owners) = self.waits_for.get(&requester) else {
            return false;
        };
        let mut visited = HashSet::new();
        let mut queue: VecDeque<TransactionId> = owners.iter().copied().collect();
        while let Some(current) = queue.pop_front() {
            if current == requester {
                return true;
            }
            if visited.insert(current) {
                if let Some(next) = self.waits_for.get(&current) {
                    queue.extend(next.iter().copied());
                }
            }
        }
        false
    }
}

pub struct LockManager {
    tables: Mutex<LockTables>,
}

impl LockManager {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(LockTables {
                pages: HashMap::new(),
                waits_for: HashMap::new(),
            }),
        }
    }

    pub fn acquire_shared(&self, tid: TransactionId, pid: PageId) -> DbResult<()> {
        self.acquire(tid, pid, LockMode::Shared)
    }

    pub fn acquire_exclusive(&self, tid: TransactionId, pid: PageId) -> DbResult<()> {
        self.acquire(tid, pid, LockMode::Exclusive)
    }

    /// Blocks until the lock is granted, or fails with
    /// [`DbError::TransactionAborted`] if waiting would deadlock.
    pub fn acquire(&self, tid: TransactionId, pid: PageId, mode: LockMode) -> DbResult<()> {
        let mut tables = self.tables.lock().unwrap();
        loop {
            let granted = tables
                .pages
                .entry(pid)
                .or_insert_with(LockState::new)
                .try_acquire(tid, mode);

            if let Some(grant) = granted {
                let state = tables.pages.get_mut(&pid).unwrap();
                state.waiters.remove(&tid);
                let cond = Arc::clone(&state.cond);
                tables.waits_for.remove(&tid);
                if matches!(grant, Granted::Upgrade) {
                    cond.notify_all();
                }
                return Ok(());
            }

            // Register as a waiter and point waits-for edges at every
            // current owner, replacing any edges from an earlier round.
            let owners: HashSet<TransactionId> = {
                let state = tables.pages.get_mut(&pid).unwrap();
                state.waiters.insert(tid);
                state.owners.iter().copied().filter(|&o| o != tid).collect()
            };
            tables.waits_for.insert(tid, owners);

            if tables.closes_cycle(tid) {
                let state = tables.pages.get_mut(&pid).unwrap();
                state.waiters.remove(&tid);
                tables.waits_for.remove(&tid);
                log::warn!("deadlock: aborting {} waiting for page {}", tid, pid);
                return Err(DbError::TransactionAborted(tid));
            }

            let cond = Arc::clone(&tables.pages.get(&pid).unwrap().cond);
            let (guard, _timed_out) = cond.wait_timeout(tables, WAIT_INTERVAL).unwrap();
            tables = guard;
        }
    }

    /// Releases `tid`'s lock on `pid` if held; otherwise a no-op. Outside of
    /// commit/abort this breaks two-phase locking, so only the buffer pool's
    /// completion path should reach for it.
    pub fn release(&self, tid: TransactionId, pid: PageId) {
        let mut tables = self.tables.lock().unwrap();
        if let Some(state) = tables.pages.get_mut(&pid) {
            if state.release(tid) {
                state.cond.notify_all();
            }
        }
    }

    /// Atomically releases every lock `tid` holds and scrubs it from the
    /// waits-for graph.
    pub fn release_all(&self, tid: TransactionId) {
        let mut tables = self.tables.lock().unwrap();
        for state in tables.pages.values_mut() {
            state.waiters.remove(&tid);
            if state.release(tid) {
                state.cond.notify_all();
            }
        }
        tables.waits_for.remove(&tid);
        for blocked_on in tables.waits_for.values_mut() {
            blocked_on.remove(&tid);
        }
    }

    pub fn holds_lock(&self, tid: TransactionId, pid: PageId) -> bool {
        let tables = self.tables.lock().unwrap();
        tables.pages.get(&pid).is_some_and(|s| s.holds(tid))
    }

    #[cfg(test)]
    fn waits_for_edges(&self, tid: TransactionId) -> usize {
        let tables = self.tables.lock().unwrap();
        tables.waits_for.get(&tid).map_or(0, |s| s.len())
    }
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::thread;

    fn pid(n: u32) -> PageId {
        PageId::new(1, n)
    }

    #[test]
    fn test_shared_locks_coexist() {
        let lm = LockManager::new();
        lm.acquire_shared(TransactionId(1), pid(0)).unwrap();
        lm.acquire_shared(TransactionId(2), pid(0)).unwrap();
        lm.acquire_shared(TransactionId(3), pid(0)).unwrap();
        assert!(lm.holds_lock(TransactionId(1), pid(0)));
        assert!(lm.holds_lock(TransactionId(3), pid(0)));
    }

    #[test]
    fn test_reentrant_acquires() {
        let lm = LockManager::new();
        let t = TransactionId(1);

        lm.acquire_exclusive(t, pid(0)).unwrap();
        // Exclusive holder may re-request either mode without blocking.
        lm.acquire_exclusive(t, pid(0)).unwrap();
        lm.acquire_shared(t, pid(0)).unwrap();

        lm.acquire_shared(t, pid(1)).unwrap();
        lm.acquire_shared(t, pid(1)).unwrap();
        assert!(lm.holds_lock(t, pid(1)));
    }

    #[test]
    fn test_upgrade_when_sole_shared_owner() {
        let lm = LockManager::new();
        let t = TransactionId(1);
        lm.acquire_shared(t, pid(0)).unwrap();
        // Sole shared owner upgrades in place, without blocking.
        lm.acquire_exclusive(t, pid(0)).unwrap();
        assert!(lm.holds_lock(t, pid(0)));

        // And another transaction now blocks on the page.
        let lm = Arc::new(lm);
        let lm2 = Arc::clone(&lm);
        let handle = thread::spawn(move || {
            let started = std::time::Instant::now();
            lm2.acquire_shared(TransactionId(2), pid(0)).unwrap();
            started.elapsed()
        });
        thread::sleep(Duration::from_millis(100));
        lm.release_all(t);
        let waited = handle.join().unwrap();
        assert!(waited >= Duration::from_millis(50));
    }

    #[test]
    fn test_exclusive_blocks_until_release() {
        let lm = Arc::new(LockManager::new());
        lm.acquire_exclusive(TransactionId(1), pid(0)).unwrap();

        let lm2 = Arc::clone(&lm);
        let handle = thread::spawn(move || {
            lm2.acquire_exclusive(TransactionId(2), pid(0)).unwrap();
            lm2.holds_lock(TransactionId(2), pid(0))
        });

        thread::sleep(Duration::from_millis(100));
        assert!(!lm.holds_lock(TransactionId(2), pid(0)));
        lm.release_all(TransactionId(1));
        assert!(handle.join().unwrap());
    }

    #[test]
    fn test_release_is_noop_when_not_held() {
        let lm = LockManager::new();
        lm.release(TransactionId(1), pid(0));
        assert!(!lm.holds_lock(TransactionId(1), pid(0)));
    }

    #[test]
    fn test_release_all_clears_everything() {
        let lm = LockManager::new();
        let t = TransactionId(1);
        lm.acquire_shared(t, pid(0)).unwrap();
        lm.acquire_exclusive(t, pid(1)).unwrap();
        lm.acquire_shared(t, pid(2)).unwrap();

        lm.release_all(t);
        assert!(!lm.holds_lock(t, pid(0)));
        assert!(!lm.holds_lock(t, pid(1)));
        assert!(!lm.holds_lock(t, pid(2)));
        assert_eq!(lm.waits_for_edges(t), 0);
    }

    #[test]
    fn test_deadlock_aborts_exactly_one() {
        let _ = env_logger::builder().is_test(true).try_init();

        let lm = Arc::new(LockManager::new());
        let barrier = Arc::new(Barrier::new(2));

        let spawn_side = |tid: u64, first: PageId, second: PageId, delay_ms: u64| {
            let lm = Arc::clone(&lm);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let t = TransactionId(tid);
                lm.acquire_shared(t, first).unwrap();
                barrier.wait();
                thread::sleep(Duration::from_millis(delay_ms));
                let result = lm.acquire_exclusive(t, second);
                if result.is_err() {
                    // The aborted side must tear down so the winner proceeds.
                    lm.release_all(t);
                }
                result
            })
        };

        let h1 = spawn_side(1, pid(1), pid(2), 0);
        let h2 = spawn_side(2, pid(2), pid(1), 50);

        let r1 = h1.join().unwrap();
        let r2 = h2.join().unwrap();

        let aborts = [&r1, &r2]
            .iter()
            .filter(|r| matches!(r, Err(DbError::TransactionAborted(_))))
            .count();
        assert_eq!(aborts, 1, "exactly one side must be deadlock-aborted");

        // The aborted transaction holds nothing.
        let loser = if r1.is_err() { TransactionId(1) } else { TransactionId(2) };
        assert!(!lm.holds_lock(loser, pid(1)));
        assert!(!lm.holds_lock(loser, pid(2)));
    }

    #[test]
    fn test_waiter_not_aborted_without_cycle() {
        let lm = Arc::new(LockManager::new());
        lm.acquire_exclusive(TransactionId(1), pid(0)).unwrap();

        let lm2 = Arc::clone(&lm);
        let handle = thread::spawn(move || lm2.acquire_shared(TransactionId(2), pid(0)));

        // A plain wait (no cycle) survives longer than one wait interval.
        thread::sleep(Duration::from_millis(1200));
        lm.release_all(TransactionId(1));
        assert!(handle.join().unwrap().is_ok());
    }
}
