//! Locking buffer pool.
//!
//! A bounded cache of pages keyed by [`PageId`]. Every page access goes
//! through the lock manager first, so a caller holding a returned page also
//! holds a legal page lock. The pool runs NO-STEAL: a dirty page is pinned
//! in memory until its transaction commits or aborts, and eviction only ever
//! discards clean pages.
//!
//! The pool-wide mutex covers cache structure only; it is never held across
//! disk I/O.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use crate::access::tuple::Tuple;
use crate::catalog::Catalog;
use crate::concurrency::lock::{LockManager, LockMode};
use crate::error::{DbError, DbResult};
use crate::storage::page::{PageId, PageRef};
use crate::storage::wal::LogManager;
use crate::transaction::id::TransactionId;

/// Pool capacity used when the caller has no opinion.
pub const DEFAULT_POOL_SIZE: usize = 50;

pub struct BufferPool {
    capacity: usize,
    pool: Mutex<HashMap<PageId, PageRef>>,
    lock_manager: LockManager,
    catalog: Arc<Catalog>,
    log: Arc<LogManager>,
}

impl BufferPool {
    pub fn new(capacity: usize, catalog: Arc<Catalog>, log: Arc<LogManager>) -> Self {
        Self {
            capacity,
            pool: Mutex::new(HashMap::with_capacity(capacity)),
            lock_manager: LockManager::new(),
            catalog,
            log,
        }
    }

    /// Fetches a page under the requested lock mode.
    ///
    /// Acquires the page lock first (which may block, or abort the
    /// transaction on deadlock), then serves from cache or reads through the
    /// table's file. Two concurrent misses for the same page resolve to a
    /// single cached entry: the pool is re-checked after the read.
    pub fn get_page(&self, tid: TransactionId, pid: PageId, mode: LockMode) -> DbResult<PageRef> {
        match mode {
            LockMode::Shared => self.lock_manager.acquire_shared(tid, pid)?,
            LockMode::Exclusive => self.lock_manager.acquire_exclusive(tid, pid)?,
        }

        if let Some(page) = self.pool.lock().get(&pid) {
            return Ok(Arc::clone(page));
        }

        let file = self.catalog.file(pid.table_id)?;
        let page = file.read_page(pid)?;

        let mut pool = self.pool.lock();
        if let Some(existing) = pool.get(&pid) {
            return Ok(Arc::clone(existing));
        }
        if pool.len() >= self.capacity {
            Self::evict(&mut pool)?;
        }
        pool.insert(pid, Arc::clone(&page));
        Ok(page)
    }

    /// Discards some clean page. Fails with [`DbError::BufferFull`] when
    /// every resident page is dirty.
    fn evict(pool: &mut HashMap<PageId, PageRef>) -> DbResult<()> {
        let victim = pool
            .iter()
            .find(|(_, page)| page.read().dirtied_by().is_none())
            .map(|(pid, _)| *pid);
        match victim {
            Some(pid) => {
                pool.remove(&pid);
                log::debug!("evicted clean page {}", pid);
                Ok(())
            }
            None => Err(DbError::BufferFull),
        }
    }

    /// Inserts `tuple` into `table_id` on behalf of `tid`, marking every
    /// page the table file touched as dirty and seating it in the pool.
    pub fn insert_tuple(
        &self,
        tid: TransactionId,
        table_id: u32,
        tuple: &mut Tuple,
    ) -> DbResult<()> {
        let file = self.catalog.file(table_id)?;
        let pages = file.insert_tuple(self, tid, tuple)?;
        self.seat_dirty(tid, pages)
    }

    /// Deletes `tuple` from its table on behalf of `tid`.
    pub fn delete_tuple(&self, tid: TransactionId, tuple: &Tuple) -> DbResult<()> {
        let rid = tuple.record_id().ok_or_else(|| {
            DbError::IllegalArgument("tuple has no record id, cannot delete".into())
        })?;
        let file = self.catalog.file(rid.page_id.table_id)?;
        let pages = file.delete_tuple(self, tid, tuple)?;
        self.seat_dirty(tid, pages)
    }

    /// Marks modified pages dirty and (re-)seats them in the pool, so that
    /// pages allocated mid-transaction become resident. A page marked dirty
    /// here stays resident until `transaction_complete`.
    fn seat_dirty(&self, tid: TransactionId, pages: Vec<PageRef>) -> DbResult<()> {
        for page in pages {
            let pid = {
                let mut guard = page.write();
                guard.mark_dirty(Some(tid));
                guard.id()
            };
            let mut pool = self.pool.lock();
            if !pool.contains_key(&pid) && pool.len() >= self.capacity {
                Self::evict(&mut pool)?;
            }
            pool.insert(pid, Arc::clone(&page));
        }
        Ok(())
    }

    /// Write-ahead flush of one page: if `pid` is cached and dirty, log the
    /// update with its before/after images, force the log, write the page
    /// through its table file, and only then mark the page clean with a
    /// fresh before-image.
    pub fn flush_page(&self, pid: PageId) -> DbResult<()> {
        let page = match self.pool.lock().get(&pid) {
            Some(page) => Arc::clone(page),
            None => return Ok(()),
        };

        let mut guard = page.write();
        if let Some(tid) = guard.dirtied_by() {
            self.log
                .log_update(tid, pid, guard.before_image_data(), guard.page_data())?;
            self.log.force()?;

            let file = self.catalog.file(pid.table_id)?;
            file.write_page(&*guard)?;
            log::debug!("flushed page {} dirtied by {}", pid, tid);

            guard.set_before_image();
            guard.mark_dirty(None);
        }
        Ok(())
    }

    /// Flushes every page dirtied by `tid`.
    pub fn flush_pages(&self, tid: TransactionId) -> DbResult<()> {
        for pid in self.dirty_pages_of(tid) {
            self.flush_page(pid)?;
        }
        Ok(())
    }

    /// Flushes every dirty page regardless of owner. This writes
    /// uncommitted data and therefore breaks NO-STEAL; it exists for
    /// shutdown and recovery tooling, not the normal commit path.
    pub fn flush_all_pages(&self) -> DbResult<()> {
        let pids: Vec<PageId> = self.pool.lock().keys().copied().collect();
        for pid in pids {
            self.flush_page(pid)?;
        }
        Ok(())
    }

    /// Drops `pid` from the pool without flushing it.
    pub fn discard_page(&self, pid: PageId) {
        self.pool.lock().remove(&pid);
    }

    /// Commit or abort `tid`'s page-level effects, then release all of its
    /// locks.
    ///
    /// On commit any still-dirty page is flushed (the façade normally
    /// already did this via `flush_pages`). On abort every page `tid`
    /// dirtied reverts in place to its before-image, as if the transaction
    /// had never touched it.
    pub fn transaction_complete(&self, tid: TransactionId, commit: bool) -> DbResult<()> {
        let pages: Vec<PageRef> = self.pool.lock().values().map(Arc::clone).collect();
        for page in pages {
            let (pid, mine) = {
                let guard = page.read();
                (guard.id(), guard.dirtied_by() == Some(tid))
            };
            if !mine {
                continue;
            }
            if commit {
                self.flush_page(pid)?;
            } else {
                page.write().restore_before_image();
                log::debug!("rolled back page {} for {}", pid, tid);
            }
        }
        self.lock_manager.release_all(tid);
        Ok(())
    }

    /// Releases a single page lock early. Unsafe with respect to two-phase
    /// locking: anything read or written through that page may become
    /// inconsistent. Commit and abort go through `transaction_complete`
    /// instead.
    pub fn release_page(&self, tid: TransactionId, pid: PageId) {
        self.lock_manager.release(tid, pid);
    }

    pub fn holds_lock(&self, tid: TransactionId, pid: PageId) -> bool {
        self.lock_manager.holds_lock(tid, pid)
    }

    /// Whether `pid` is currently resident. Callers use this to distinguish
    /// a never-written page from one living only in the cache.
    pub fn contains_page(&self, pid: PageId) -> bool {
        self.pool.lock().contains_key(&pid)
    }

    pub fn cached_pages(&self) -> usize {
        self.pool.lock().len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn dirty_pages_of(&self, tid: TransactionId) -> Vec<PageId> {
        self.pool
            .lock()
            .iter()
            .filter(|(_, page)| page.read().dirtied_by() == Some(tid))
            .map(|(pid, _)| *pid)
            .collect()
    }
}
